//! Billiard engine
//!
//! Ties settings to a concrete map. Any settings change rebuilds the whole
//! billiard; there is no incremental update path.

use crate::error::{BilliardError, Result};
use crate::hyperbolic_models::HyperbolicModel;
use crate::inner::{InnerBilliard, InnerState};
use crate::outer::{OuterBilliard, OuterState};
use crate::settings::{BilliardSettings, Duality, Plane};
use crate::table::Table;
use crate::Point;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BilliardState {
    Inner(InnerState),
    Outer(OuterState),
}

/// A computed orbit. When iteration stopped early, `error` says why and
/// `states` holds everything computed before that.
#[derive(Debug, Clone, PartialEq)]
pub struct Orbit {
    pub states: Vec<BilliardState>,
    pub error: Option<BilliardError>,
    pub cancelled: bool,
}

impl Orbit {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none() && !self.cancelled
    }
}

#[derive(Debug, Clone)]
pub enum Billiard {
    Inner(InnerBilliard),
    Outer(OuterBilliard),
}

impl Billiard {
    /// Build the billiard described by `settings` from scratch.
    pub fn from_settings(settings: &BilliardSettings) -> Result<Self> {
        settings.validate()?;
        let table = settings.table.build()?;
        let billiard = match settings.duality {
            Duality::Inner => Billiard::Inner(InnerBilliard::new(table, settings.phase_mode)),
            Duality::Outer => Billiard::Outer(OuterBilliard::new(
                table,
                settings.plane,
                settings.affine_horizon,
            )?),
        };
        info!(
            duality = ?settings.duality,
            plane = ?settings.plane,
            table = ?settings.table,
            "billiard rebuilt"
        );
        Ok(billiard)
    }

    pub fn table(&self) -> &dyn Table {
        match self {
            Billiard::Inner(b) => b.table(),
            Billiard::Outer(b) => b.table(),
        }
    }

    pub fn step(&self, state: &BilliardState) -> Result<BilliardState> {
        match (self, state) {
            (Billiard::Inner(b), BilliardState::Inner(s)) => Ok(BilliardState::Inner(b.next(s)?)),
            (Billiard::Outer(b), BilliardState::Outer(s)) => Ok(BilliardState::Outer(b.next(s)?)),
            _ => Err(mismatch(state)),
        }
    }

    pub fn step_back(&self, state: &BilliardState) -> Result<BilliardState> {
        match (self, state) {
            (Billiard::Inner(b), BilliardState::Inner(s)) => {
                Ok(BilliardState::Inner(b.previous(s)?))
            }
            (Billiard::Outer(b), BilliardState::Outer(s)) => {
                Ok(BilliardState::Outer(b.previous(s)?))
            }
            _ => Err(mismatch(state)),
        }
    }

    /// Iterate from `initial`, keeping the initial state as the first entry.
    pub fn play(&self, initial: BilliardState, iterations: usize) -> Orbit {
        self.play_until(initial, iterations, None)
    }

    /// Like [`Billiard::play`], checking `cancel` before every step.
    pub fn play_until(
        &self,
        initial: BilliardState,
        iterations: usize,
        cancel: Option<&AtomicBool>,
    ) -> Orbit {
        let mut states = Vec::with_capacity(iterations + 1);
        states.push(initial);
        let mut state = initial;
        for i in 0..iterations {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                debug!(completed = i, "orbit cancelled");
                return Orbit {
                    states,
                    error: None,
                    cancelled: true,
                };
            }
            match self.step(&state) {
                Ok(next) => {
                    states.push(next);
                    state = next;
                }
                Err(e) => {
                    warn!(iteration = i, error = %e, "orbit stopped early");
                    return Orbit {
                        states,
                        error: Some(e),
                        cancelled: false,
                    };
                }
            }
        }
        Orbit {
            states,
            error: None,
            cancelled: false,
        }
    }

    /// Plane coordinates of a state: the chord's start for inner billiards,
    /// the point itself (in `model` when hyperbolic) for outer ones.
    pub fn state_point(&self, state: &BilliardState, model: HyperbolicModel) -> Point {
        match state {
            BilliardState::Inner(s) => self.table().point(s.start_time),
            BilliardState::Outer(OuterState::Affine(p)) => *p,
            BilliardState::Outer(OuterState::Hyperbolic(h)) => h.resolve(model),
        }
    }

    /// Points to draw for an orbit. Inner orbits also get the final chord's end.
    pub fn orbit_points(&self, orbit: &Orbit, model: HyperbolicModel) -> Vec<Point> {
        let mut points: Vec<Point> = orbit
            .states
            .iter()
            .map(|s| self.state_point(s, model))
            .collect();
        if let Some(BilliardState::Inner(last)) = orbit.states.last() {
            points.push(self.table().point(last.end_time));
        }
        points
    }

    pub fn plane(&self) -> Plane {
        match self {
            Billiard::Inner(_) => Plane::Affine,
            Billiard::Outer(b) => b.plane(),
        }
    }
}

fn mismatch(state: &BilliardState) -> BilliardError {
    BilliardError::UnsupportedConfiguration(format!(
        "state {:?} does not match the billiard's duality",
        state
    ))
}
