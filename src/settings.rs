//! Billiard settings
//!
//! Everything needed to rebuild a billiard from scratch: which map, which
//! plane, which table, and how far to iterate. Settings are plain serde
//! structs so they load from JSON files and travel to worker threads.

use crate::error::{BilliardError, Result};
use crate::hyperbolic_models::HyperbolicModel;
use crate::inner::PhaseMode;
use crate::table::{Ellipse, LpCircle, Polygon, Table};
use crate::Point;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Inner (chords inside the table) or outer (reflections outside it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Duality {
    #[default]
    Inner,
    Outer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plane {
    #[default]
    Affine,
    Hyperbolic,
}

/// Shape of the table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum TableSpec {
    LpCircle { p: f64 },
    Ellipse { a: f64, b: f64 },
    Polygon { vertices: Vec<Point> },
    RegularPolygon {
        sides: usize,
        radius: f64,
        #[serde(default)]
        rotation: f64,
    },
}

impl Default for TableSpec {
    fn default() -> Self {
        TableSpec::LpCircle { p: 2.0 }
    }
}

impl TableSpec {
    pub fn build(&self) -> Result<Arc<dyn Table>> {
        Ok(match self {
            TableSpec::LpCircle { p } => Arc::new(LpCircle::new(*p)?),
            TableSpec::Ellipse { a, b } => Arc::new(Ellipse::new(*a, *b)?),
            TableSpec::Polygon { vertices } => Arc::new(Polygon::new(vertices.clone())?),
            TableSpec::RegularPolygon {
                sides,
                radius,
                rotation,
            } => Arc::new(Polygon::regular(*sides, *radius, *rotation)?),
        })
    }

    pub fn is_polygon(&self) -> bool {
        matches!(
            self,
            TableSpec::Polygon { .. } | TableSpec::RegularPolygon { .. }
        )
    }
}

fn default_iterations() -> usize {
    100
}

fn default_affine_horizon() -> f64 {
    1000.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BilliardSettings {
    #[serde(default)]
    pub duality: Duality,
    #[serde(default)]
    pub plane: Plane,
    /// Model that hyperbolic states are reported in
    #[serde(default)]
    pub model: HyperbolicModel,
    #[serde(default)]
    pub phase_mode: PhaseMode,
    #[serde(default)]
    pub table: TableSpec,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Radius of the circle closing off affine outer regions
    #[serde(default = "default_affine_horizon")]
    pub affine_horizon: f64,
}

impl Default for BilliardSettings {
    fn default() -> Self {
        Self {
            duality: Duality::default(),
            plane: Plane::default(),
            model: HyperbolicModel::default(),
            phase_mode: PhaseMode::default(),
            table: TableSpec::default(),
            iterations: default_iterations(),
            affine_horizon: default_affine_horizon(),
        }
    }
}

impl BilliardSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        debug!(path = %path.display(), ?settings, "settings loaded");
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject combinations the engine cannot build.
    pub fn validate(&self) -> Result<()> {
        if self.plane == Plane::Hyperbolic {
            if self.duality == Duality::Inner {
                return Err(BilliardError::UnsupportedConfiguration(
                    "inner billiards are affine only".into(),
                ));
            }
            if !self.table.is_polygon() {
                return Err(BilliardError::UnsupportedConfiguration(
                    "hyperbolic outer billiards need a polygonal table".into(),
                ));
            }
        }
        if !(self.affine_horizon.is_finite() && self.affine_horizon > 0.0) {
            return Err(BilliardError::Config(format!(
                "affine horizon must be positive, got {}",
                self.affine_horizon
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_from_empty_object() {
        let settings = BilliardSettings::from_json("{}").unwrap();
        assert_eq!(settings, BilliardSettings::default());
        assert_eq!(settings.iterations, 100);
        assert_eq!(settings.affine_horizon, 1000.0);
    }

    #[test]
    fn test_tagged_table_shapes() {
        let json = r#"{
            "duality": "outer",
            "plane": "hyperbolic",
            "model": "klein",
            "table": {"shape": "regular_polygon", "sides": 3, "radius": 0.1}
        }"#;
        let settings = BilliardSettings::from_json(json).unwrap();
        assert_eq!(settings.duality, Duality::Outer);
        assert_eq!(settings.model, HyperbolicModel::Klein);
        assert_eq!(
            settings.table,
            TableSpec::RegularPolygon {
                sides: 3,
                radius: 0.1,
                rotation: 0.0
            }
        );
        assert_eq!(settings.table.build().unwrap().vertices().unwrap().len(), 3);
    }

    #[test]
    fn test_hyperbolic_inner_rejected() {
        let json = r#"{"plane": "hyperbolic", "table": {"shape": "ellipse", "a": 2.0, "b": 1.0}}"#;
        assert!(matches!(
            BilliardSettings::from_json(json),
            Err(BilliardError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        assert!(matches!(
            BilliardSettings::from_json("{\"iterations\": \"many\"}"),
            Err(BilliardError::Config(_))
        ));
    }

    #[test]
    fn test_load_and_save() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"duality": "outer", "table": {{"shape": "polygon", "vertices": [
                {{"x": 0.0, "y": 0.0}}, {{"x": 1.0, "y": 0.0}}, {{"x": 0.0, "y": 1.0}}
            ]}}}}"#
        )
        .unwrap();
        let settings = BilliardSettings::load(file.path()).unwrap();
        assert!(settings.table.is_polygon());

        let out = NamedTempFile::new().unwrap();
        settings.save(out.path()).unwrap();
        assert_eq!(BilliardSettings::load(out.path()).unwrap(), settings);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            BilliardSettings::load("/nonexistent/billiard.json"),
            Err(BilliardError::Io(_))
        ));
    }
}
