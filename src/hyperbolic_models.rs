//! Hyperbolic Geometry Models
//!
//! Points of the hyperbolic plane carry one canonical coordinate plus the
//! model it is expressed in, and are converted on demand:
//!
//! - **Poincaré Disk**: Conformal, geodesics are arcs orthogonal to the boundary
//! - **Klein Disk**: Projective, geodesics are straight chords
//!
//! Radial conversions between the models and true hyperbolic distance:
//! Poincaré radius `p = tanh(d/2)`, Klein radius `k = tanh(d) = 2p / (1 + p²)`.

use crate::error::{BilliardError, Result};
use crate::geometry::{Circle, Segment};
use crate::{signed_angle, Point, EPSILON};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Which disk model a coordinate is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HyperbolicModel {
    #[default]
    Poincare,
    Klein,
}

/// Klein radius for a Poincaré radius.
pub fn poincare_to_klein(p: f64) -> f64 {
    2.0 * p / (1.0 + p * p)
}

/// Poincaré radius for a Klein radius.
pub fn klein_to_poincare(k: f64) -> f64 {
    k / (1.0 + (1.0 - k * k).max(0.0).sqrt())
}

/// Poincaré radius of a point at hyperbolic distance `d` from the origin.
pub fn true_to_poincare(d: f64) -> f64 {
    (d / 2.0).tanh()
}

/// Hyperbolic distance from the origin of a point at Poincaré radius `p`.
pub fn poincare_to_true(p: f64) -> f64 {
    2.0 * p.atanh()
}

/// Hyperbolic distance from the origin of a point at Klein radius `k`.
pub fn klein_to_true(k: f64) -> f64 {
    k.atanh()
}

/// Klein radius of a point at hyperbolic distance `d` from the origin.
pub fn true_to_klein(d: f64) -> f64 {
    d.tanh()
}

/// Poincaré to Klein: z_K = 2z_P / (1 + |z_P|²)
pub fn poincare_point_to_klein(z: Point) -> Point {
    z.scale(2.0 / (1.0 + z.modulus_squared()))
}

/// Klein to Poincaré: z_P = z_K / (1 + sqrt(1 - |z_K|²))
pub fn klein_point_to_poincare(z: Point) -> Point {
    let r_sq = z.modulus_squared();
    z.scale(1.0 / (1.0 + (1.0 - r_sq).max(0.0).sqrt()))
}

/// A point of the hyperbolic plane tagged with its model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperPoint {
    pub coordinate: Point,
    pub model: HyperbolicModel,
}

impl HyperPoint {
    /// Create a point; the coordinate must lie in the open unit disk.
    pub fn new(coordinate: Point, model: HyperbolicModel) -> Result<Self> {
        if coordinate.is_infinite() || coordinate.modulus_squared() >= 1.0 {
            return Err(BilliardError::PointOutsideDisk(coordinate));
        }
        Ok(Self { coordinate, model })
    }

    pub fn poincare(coordinate: Point) -> Result<Self> {
        Self::new(coordinate, HyperbolicModel::Poincare)
    }

    pub fn klein(coordinate: Point) -> Result<Self> {
        Self::new(coordinate, HyperbolicModel::Klein)
    }

    /// Point at hyperbolic distance `d` from the origin in direction `theta`.
    pub fn from_true_polar(d: f64, theta: f64, model: HyperbolicModel) -> Result<Self> {
        let r = match model {
            HyperbolicModel::Poincare => true_to_poincare(d),
            HyperbolicModel::Klein => true_to_klein(d),
        };
        Self::new(Point::polar(r, theta), model)
    }

    pub fn origin() -> Self {
        Self {
            coordinate: Point::ZERO,
            model: HyperbolicModel::Poincare,
        }
    }

    /// Coordinate of this point in `target`; never mutates.
    pub fn resolve(&self, target: HyperbolicModel) -> Point {
        match (self.model, target) {
            (HyperbolicModel::Poincare, HyperbolicModel::Klein) => {
                poincare_point_to_klein(self.coordinate)
            }
            (HyperbolicModel::Klein, HyperbolicModel::Poincare) => {
                klein_point_to_poincare(self.coordinate)
            }
            _ => self.coordinate,
        }
    }

    pub fn to_poincare(&self) -> Self {
        Self {
            coordinate: self.resolve(HyperbolicModel::Poincare),
            model: HyperbolicModel::Poincare,
        }
    }

    pub fn to_klein(&self) -> Self {
        Self {
            coordinate: self.resolve(HyperbolicModel::Klein),
            model: HyperbolicModel::Klein,
        }
    }

    pub fn converted(&self, target: HyperbolicModel) -> Self {
        Self {
            coordinate: self.resolve(target),
            model: target,
        }
    }

    /// Hyperbolic distance from the origin.
    pub fn true_radius(&self) -> f64 {
        let r = self.coordinate.modulus();
        match self.model {
            HyperbolicModel::Poincare => poincare_to_true(r),
            HyperbolicModel::Klein => klein_to_true(r),
        }
    }

    /// Hyperbolic distance between two points, in whatever models they carry.
    pub fn distance(&self, other: &Self) -> f64 {
        match (self.model, other.model) {
            (HyperbolicModel::Klein, HyperbolicModel::Klein) => {
                klein_distance(self.coordinate, other.coordinate)
            }
            _ => poincare_distance(
                self.resolve(HyperbolicModel::Poincare),
                other.resolve(HyperbolicModel::Poincare),
            ),
        }
    }
}

impl std::fmt::Display for HyperPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{:?}]", self.coordinate, self.model)
    }
}

/// d_H(z1, z2) = arcosh(1 + 2|z1 - z2|² / ((1 - |z1|²)(1 - |z2|²)))
pub fn poincare_distance(z1: Point, z2: Point) -> f64 {
    let diff_sq = (z1 - z2).modulus_squared();
    let denom = (1.0 - z1.modulus_squared()) * (1.0 - z2.modulus_squared());
    if denom <= 0.0 {
        return f64::INFINITY;
    }

    let arg = 1.0 + 2.0 * diff_sq / denom;
    if arg < 1.0 {
        0.0
    } else {
        (arg + (arg * arg - 1.0).sqrt()).ln()
    }
}

/// Cayley-Klein metric: cosh d = (1 - ⟨z1, z2⟩) / sqrt((1 - |z1|²)(1 - |z2|²))
pub fn klein_distance(z1: Point, z2: Point) -> f64 {
    let num = 1.0 - z1.dot(z2);
    let denom = ((1.0 - z1.modulus_squared()) * (1.0 - z2.modulus_squared())).sqrt();
    if denom <= 1e-15 {
        return f64::INFINITY;
    }

    let cosh_d = num / denom;
    if cosh_d <= 1.0 {
        0.0
    } else {
        (cosh_d + (cosh_d * cosh_d - 1.0).sqrt()).ln()
    }
}

/// The Poincaré geodesic through `p1` and `p2`, oriented from `p1` to `p2`.
///
/// Either a diameter of the disk or an arc of a circle orthogonal to the
/// unit circle. Endpoints may be ideal (on the unit circle).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperbolicGeodesic {
    pub p1: Point,
    pub p2: Point,
    /// Ideal point reached going backwards past `p1`
    pub ideal_start: Point,
    /// Ideal point reached going forwards past `p2`
    pub ideal_end: Point,
    pub is_diameter: bool,
    /// Supporting circle; `None` for diameters
    pub circle: Option<Circle>,
}

impl HyperbolicGeodesic {
    pub fn new(p1: Point, p2: Point) -> Result<Self> {
        for p in [p1, p2] {
            if p.is_infinite() || p.modulus() > 1.0 + EPSILON {
                return Err(BilliardError::PointOutsideDisk(p));
            }
        }
        if p1.distance(p2) < EPSILON {
            return Err(BilliardError::DegenerateSegment(p1));
        }

        let det = p1.cross(p2);
        if det.abs() < EPSILON * p1.distance(p2) {
            let u = (p2 - p1).normalized();
            return Ok(Self {
                p1,
                p2,
                ideal_start: -u,
                ideal_end: u,
                is_diameter: true,
                circle: None,
            });
        }

        // Orthogonality to the unit circle: p·c = (|p|² + 1) / 2 for p on the circle.
        let k1 = (p1.modulus_squared() + 1.0) / 2.0;
        let k2 = (p2.modulus_squared() + 1.0) / 2.0;
        let center = Point::new((k1 * p2.y - k2 * p1.y) / det, (p1.x * k2 - p2.x * k1) / det);
        let radius = (center.modulus_squared() - 1.0).max(0.0).sqrt();
        let circle = Circle::new(center, radius);

        let ideals = circle.intersect_circle(&Circle::unit());
        let (qa, qb) = match ideals.as_slice() {
            [a, b] => (*a, *b),
            _ => {
                return Err(BilliardError::NoIntersection(
                    "geodesic circle misses the unit circle".into(),
                ))
            }
        };
        let beyond_p2 = |q: Point| q.distance(p2) - q.distance(p1);
        let (ideal_start, ideal_end) = if beyond_p2(qa) < beyond_p2(qb) {
            (qb, qa)
        } else {
            (qa, qb)
        };

        Ok(Self {
            p1,
            p2,
            ideal_start,
            ideal_end,
            is_diameter: false,
            circle: Some(circle),
        })
    }

    pub fn between(a: &HyperPoint, b: &HyperPoint) -> Result<Self> {
        Self::new(
            a.resolve(HyperbolicModel::Poincare),
            b.resolve(HyperbolicModel::Poincare),
        )
    }

    /// Angle of the ideal start around the supporting circle (0 for diameters).
    pub fn start_angle(&self) -> f64 {
        match self.circle {
            Some(c) => (self.ideal_start - c.center).heading(),
            None => 0.0,
        }
    }

    pub fn end_angle(&self) -> f64 {
        match self.circle {
            Some(c) => (self.ideal_end - c.center).heading(),
            None => 0.0,
        }
    }

    /// The piece of this geodesic between two of its points.
    pub fn segment_between(&self, x: Point, y: Point) -> Result<Segment> {
        match self.circle {
            None => Segment::line(x, y),
            Some(c) => {
                let ax = (x - c.center).heading();
                let ay = (y - c.center).heading();
                let mid = c.point_at(ax + signed_angle(ay - ax) / 2.0);
                Segment::through(x, mid, y)
            }
        }
    }

    /// `p1` to `p2`
    pub fn central_segment(&self) -> Result<Segment> {
        self.segment_between(self.p1, self.p2)
    }

    /// `p2` to the ideal end
    pub fn right_tail(&self) -> Result<Segment> {
        self.segment_between(self.p2, self.ideal_end)
    }

    /// Ideal start to `p1`
    pub fn left_tail(&self) -> Result<Segment> {
        self.segment_between(self.ideal_start, self.p1)
    }

    /// `p1` through `p2` to the ideal end
    pub fn forward_ray(&self) -> Result<Segment> {
        self.segment_between(self.p1, self.ideal_end)
    }

    /// `p2` back through `p1` to the ideal start
    pub fn backward_ray(&self) -> Result<Segment> {
        self.segment_between(self.p2, self.ideal_start)
    }

    /// The whole geodesic, ideal point to ideal point.
    pub fn full_segment(&self) -> Result<Segment> {
        self.segment_between(self.ideal_start, self.ideal_end)
    }

    /// The same geodesic drawn in the Klein model: a straight chord.
    pub fn klein_chord(&self) -> Result<Segment> {
        Segment::line(
            poincare_point_to_klein(self.p1),
            poincare_point_to_klein(self.p2),
        )
    }
}

/// Ideal arc of the unit circle running counter-clockwise from `from` to `to`.
pub fn ideal_arc(from: Point, to: Point) -> Result<Segment> {
    let start = from.heading();
    let mut end = to.heading();
    while end <= start {
        end += 2.0 * PI;
    }
    Segment::arc(Point::ZERO, 1.0, start, end)
}
