//! Outer Billiards
//!
//! A point outside the table is reflected through the tangent point on its
//! right. For polygonal tables the map is piecewise: each vertex owns a
//! forward region whose points are reflected through it, and the image of
//! that region is the vertex's inverse region. In the hyperbolic plane the
//! reflections are Möbius half-turns of the Poincaré disk.
//!
//! The forward map is discontinuous along rays that extend the table's edges
//! past each vertex. Pulling those rays back under the inverse map produces
//! the singularity set, computed a batch at a time in parallel.

use crate::arc_region::ArcRegion;
use crate::error::{BilliardError, Result};
use crate::geometry::{ArcSegment, Circle, Segment};
use crate::hyperbolic_models::{ideal_arc, HyperPoint, HyperbolicGeodesic, HyperbolicModel};
use crate::mobius::MobiusTransformation;
use crate::settings::Plane;
use crate::table::Table;
use crate::Point;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Preimage pieces shorter than this are discarded.
const MIN_PIECE_LENGTH: f64 = 1e-7;

/// A point outside the table, in whichever plane the billiard lives in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OuterState {
    Affine(Point),
    Hyperbolic(HyperPoint),
}

impl OuterState {
    /// Coordinate as stored (model coordinates for hyperbolic points).
    pub fn point(&self) -> Point {
        match self {
            OuterState::Affine(p) => *p,
            OuterState::Hyperbolic(h) => h.coordinate,
        }
    }
}

/// The piece of the polygonal outer billiard map owned by one vertex
#[derive(Debug, Clone, Serialize)]
pub struct VertexRegion {
    pub vertex: Point,
    /// Points reflected through `vertex` by the forward map
    pub forward: ArcRegion,
    /// Image of `forward`; points sent back through `vertex` by the inverse map
    pub inverse: ArcRegion,
    #[serde(skip)]
    pub transformation: MobiusTransformation,
}

#[derive(Debug, Clone)]
pub struct OuterBilliard {
    plane: Plane,
    table: Arc<dyn Table>,
    regions: Vec<VertexRegion>,
    affine_horizon: f64,
}

impl OuterBilliard {
    /// Build the map for `table`. Polygonal tables get per-vertex regions;
    /// affine regions are closed off by a circle of radius `affine_horizon`,
    /// outside which the map falls back to supporting vertices.
    pub fn new(table: Arc<dyn Table>, plane: Plane, affine_horizon: f64) -> Result<Self> {
        let regions = match (plane, table.vertices()) {
            (Plane::Affine, Some(vertices)) => affine_regions(&vertices, affine_horizon)?,
            (Plane::Hyperbolic, Some(vertices)) => hyperbolic_regions(&vertices)?,
            (Plane::Affine, None) => Vec::new(),
            (Plane::Hyperbolic, None) => {
                return Err(BilliardError::UnsupportedConfiguration(
                    "hyperbolic outer billiards need a polygonal table".into(),
                ))
            }
        };
        info!(?plane, regions = regions.len(), "outer billiard built");
        Ok(Self {
            plane,
            table,
            regions,
            affine_horizon,
        })
    }

    pub fn plane(&self) -> Plane {
        self.plane
    }

    pub fn table(&self) -> &dyn Table {
        self.table.as_ref()
    }

    pub fn regions(&self) -> &[VertexRegion] {
        &self.regions
    }

    pub fn affine_horizon(&self) -> f64 {
        self.affine_horizon
    }

    /// Forward map on raw coordinates (Poincaré coordinates when hyperbolic).
    ///
    /// Affine points on or beyond the horizon circle are reflected through
    /// the supporting vertex directly.
    pub fn forward_map(&self, z: Point) -> Result<Point> {
        if self.regions.is_empty() || self.beyond_horizon(z) {
            let tangent = self.table.right_tangent_point(z)?;
            return Ok(tangent.point * 2.0 - z);
        }
        self.regions
            .iter()
            .find(|r| r.forward.contains_point(z))
            .map(|r| r.transformation.apply(z))
            .ok_or(BilliardError::NoForwardTransformation(z))
    }

    pub fn inverse_map(&self, z: Point) -> Result<Point> {
        if self.regions.is_empty() || self.beyond_horizon(z) {
            let tangent = self.table.left_tangent_point(z)?;
            return Ok(tangent.point * 2.0 - z);
        }
        self.regions
            .iter()
            .find(|r| r.inverse.contains_point(z))
            .map(|r| r.transformation.inverse().apply(z))
            .ok_or(BilliardError::NoInverseTransformation(z))
    }

    fn beyond_horizon(&self, z: Point) -> bool {
        self.plane == Plane::Affine && z.modulus() >= self.affine_horizon
    }

    pub fn next(&self, state: &OuterState) -> Result<OuterState> {
        self.map_state(state, |z| self.forward_map(z))
    }

    pub fn previous(&self, state: &OuterState) -> Result<OuterState> {
        self.map_state(state, |z| self.inverse_map(z))
    }

    fn map_state(
        &self,
        state: &OuterState,
        map: impl Fn(Point) -> Result<Point>,
    ) -> Result<OuterState> {
        match (self.plane, state) {
            (Plane::Affine, OuterState::Affine(p)) => Ok(OuterState::Affine(map(*p)?)),
            (Plane::Hyperbolic, OuterState::Hyperbolic(h)) => {
                let image = map(h.resolve(HyperbolicModel::Poincare))?;
                let image = HyperPoint::poincare(image)?.converted(h.model);
                Ok(OuterState::Hyperbolic(image))
            }
            (plane, state) => Err(BilliardError::UnsupportedConfiguration(format!(
                "state {:?} does not belong to the {:?} plane",
                state, plane
            ))),
        }
    }

    /// The rays along which the forward map is discontinuous: each edge
    /// extended past its head vertex.
    pub fn singular_rays(&self) -> Result<Vec<Segment>> {
        let vertices = self.table.vertices().ok_or_else(|| {
            BilliardError::UnsupportedConfiguration(
                "singularities are only defined for polygonal tables".into(),
            )
        })?;
        let n = vertices.len();
        (0..n)
            .map(|i| {
                let prev = vertices[(i + n - 1) % n];
                let v = vertices[i];
                match self.plane {
                    Plane::Affine => {
                        let far = ray_to_horizon(v, (v - prev).normalized(), self.affine_horizon);
                        Segment::line(v, far)
                    }
                    Plane::Hyperbolic => HyperbolicGeodesic::new(prev, v)?.right_tail(),
                }
            })
            .collect()
    }

    /// One pullback of `frontier` under the forward map.
    ///
    /// Each segment is cut where it crosses inverse-region boundaries and
    /// every piece is mapped by the inverse of the region holding its
    /// midpoint. Pieces that lie in no region are dropped.
    pub fn preimage_step(&self, frontier: &[Segment]) -> Vec<Segment> {
        frontier
            .par_iter()
            .flat_map(|segment| self.segment_preimage(segment))
            .collect()
    }

    fn segment_preimage(&self, segment: &Segment) -> Vec<Segment> {
        let cuts: Vec<Point> = self
            .regions
            .iter()
            .flat_map(|r| r.inverse.segments())
            .flat_map(|boundary| segment.intersect(boundary))
            .collect();

        segment
            .split(&cuts)
            .into_iter()
            .filter(|piece| piece.length() > MIN_PIECE_LENGTH)
            .filter_map(|piece| {
                let mid = piece.mid();
                let region = self.regions.iter().find(|r| r.inverse.contains_point(mid));
                let Some(region) = region else {
                    trace!(%mid, "preimage piece outside every region");
                    return None;
                };
                region.transformation.inverse().apply_segment(&piece).ok()
            })
            .filter(|image| image.length() > MIN_PIECE_LENGTH)
            .collect()
    }

    /// `n` successive pullbacks of the singular rays; batch `k` holds the
    /// points whose `k + 1`-th forward image lands on a singular ray.
    pub fn iterate_preimages(&self, n: usize) -> Result<Vec<Vec<Segment>>> {
        let mut frontier = self.singular_rays()?;
        let mut batches = Vec::with_capacity(n);
        for depth in 0..n {
            frontier = self.preimage_step(&frontier);
            debug!(depth, segments = frontier.len(), "preimage batch");
            batches.push(frontier.clone());
        }
        Ok(batches)
    }

    /// Forward regions shattered by the singular rays and their first
    /// `depth` pullbacks: cells on which the first `depth + 1` iterates are
    /// all continuous.
    ///
    /// Affine preimages stop short of the horizon circle, so cells near the
    /// horizon may be left uncut.
    pub fn cells(&self, depth: usize) -> Result<Vec<ArcRegion>> {
        // The singular rays themselves already bound the forward regions.
        let slices: Vec<Segment> = self.iterate_preimages(depth)?.into_iter().flatten().collect();
        let mut cells = Vec::new();
        for region in &self.regions {
            cells.extend(region.forward.shatter(&slices)?);
        }
        info!(depth, cells = cells.len(), "outer billiard cells");
        Ok(cells)
    }
}

/// Where the ray from `v` along unit `direction` leaves the disk of radius `horizon`.
fn ray_to_horizon(v: Point, direction: Point, horizon: f64) -> Point {
    let b = v.dot(direction);
    let s = -b + (b * b - v.modulus_squared() + horizon * horizon).sqrt();
    v + direction * s
}

fn affine_regions(vertices: &[Point], horizon: f64) -> Result<Vec<VertexRegion>> {
    let reach = vertices.iter().map(|v| v.modulus()).fold(0.0, f64::max);
    if !(horizon > 2.0 * reach) {
        return Err(BilliardError::Config(format!(
            "affine horizon {} must exceed twice the table's reach {}",
            horizon, reach
        )));
    }
    let circle = Circle::new(Point::ZERO, horizon);
    let n = vertices.len();
    (0..n)
        .map(|i| {
            let v = vertices[i];
            let incoming = (v - vertices[(i + n - 1) % n]).normalized();
            let outgoing = (vertices[(i + 1) % n] - v).normalized();
            let wedge = |d1: Point, d2: Point| -> Result<ArcRegion> {
                let a = ray_to_horizon(v, d1, horizon);
                let b = ray_to_horizon(v, d2, horizon);
                ArcRegion::new(vec![
                    Segment::line(v, a)?,
                    Segment::Arc(ArcSegment::between(&circle, a, b)?),
                    Segment::line(v, b)?,
                ])
            };
            Ok(VertexRegion {
                vertex: v,
                forward: wedge(incoming, outgoing)?,
                inverse: wedge(-incoming, -outgoing)?,
                transformation: MobiusTransformation::affine_point_reflection(v),
            })
        })
        .collect()
}

fn hyperbolic_regions(vertices: &[Point]) -> Result<Vec<VertexRegion>> {
    let n = vertices.len();
    (0..n)
        .map(|i| {
            let v = vertices[i];
            let incoming = HyperbolicGeodesic::new(vertices[(i + n - 1) % n], v)?;
            let outgoing = HyperbolicGeodesic::new(v, vertices[(i + 1) % n])?;
            let forward = ArcRegion::new(vec![
                incoming.right_tail()?,
                ideal_arc(incoming.ideal_end, outgoing.ideal_end)?,
                outgoing.forward_ray()?,
            ])?;
            let inverse = ArcRegion::new(vec![
                incoming.backward_ray()?,
                ideal_arc(incoming.ideal_start, outgoing.ideal_start)?,
                outgoing.left_tail()?,
            ])?;
            Ok(VertexRegion {
                vertex: v,
                forward,
                inverse,
                transformation: MobiusTransformation::point_reflection(v)?,
            })
        })
        .collect()
}
