//! Convex Billiard Tables
//!
//! A table is a closed convex curve parametrized counter-clockwise by
//! t ∈ [0, 1), together with its derivative and a containment predicate.
//! On top of those three the trait provides the tangent-point solver used by
//! outer billiards and the ray–boundary intersection used by inner billiards.

use crate::error::{BilliardError, Result};
use crate::{normalize_angle, signed_angle, Point};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::warn;

/// Maximum bisection steps for the tangent and ray solvers
const MAX_BISECTION_STEPS: usize = 100;

/// Angular tolerance at which a tangent line is accepted
const TANGENT_TOLERANCE: f64 = 1e-7;

/// Parameter offset used to bracket the ray solver away from its start
const RAY_BRACKET_OFFSET: f64 = 1e-7;

/// Which tangent line from an external point: the table lies on this side of
/// the directed ray from the point to the tangent point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn sign(self) -> f64 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }
}

/// A boundary parameter together with its point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TangentPoint {
    pub time: f64,
    pub point: Point,
}

/// A strictly convex, counter-clockwise, period-1 boundary curve
pub trait Table: Send + Sync + std::fmt::Debug {
    /// Boundary point at parameter `t`
    fn point(&self, t: f64) -> Point;

    /// Derivative of the parametrization at `t`
    fn tangent(&self, t: f64) -> Point;

    /// Strict interior test
    fn contains(&self, p: Point) -> bool;

    /// True when `t` sits on a corner of a non-smooth table.
    fn is_corner(&self, _t: f64) -> bool {
        false
    }

    /// Corner points, for polygonal tables.
    fn vertices(&self) -> Option<Vec<Point>> {
        None
    }

    fn tangent_heading(&self, t: f64) -> f64 {
        self.tangent(t).heading()
    }

    /// Signed angle between the chord from `p` to `point(t)` and the oriented
    /// tangent at `t`; zero exactly at the `side` tangent point.
    fn tangential_angle(&self, t: f64, p: Point, side: Side) -> f64 {
        let chord = self.point(t) - p;
        let tangent = self.tangent(t).scale(side.sign());
        signed_angle(chord.heading() - tangent.heading())
    }

    /// Tangent point from an external point, found by bisection between two
    /// half-period seeds derived from the polar angle of `p`.
    fn tangent_point(&self, p: Point, side: Side) -> Result<TangentPoint> {
        if self.contains(p) {
            return Err(BilliardError::PointInsideTable(p));
        }
        let base = normalize_angle(p.heading()) / (2.0 * PI);
        let mut lo = match side {
            Side::Left => base,
            Side::Right => base + 0.5,
        };
        let mut hi = lo + 0.5;

        let f_lo = self.tangential_angle(lo, p, side);
        let f_hi = self.tangential_angle(hi, p, side);
        if f_lo == 0.0 {
            return Ok(self.at(lo));
        }
        if f_hi == 0.0 {
            return Ok(self.at(hi));
        }
        if !(f_lo > 0.0 && f_hi < 0.0) {
            return Err(BilliardError::BadParametrization(format!(
                "tangent seeds from {} do not bracket a root ({:.3e}, {:.3e})",
                p, f_lo, f_hi
            )));
        }

        let mut mid = 0.5 * (lo + hi);
        for _ in 0..MAX_BISECTION_STEPS {
            mid = 0.5 * (lo + hi);
            let f = self.tangential_angle(mid, p, side);
            if f.abs() < TANGENT_TOLERANCE {
                return Ok(self.at(mid));
            }
            if f > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        warn!(point = %p, best = mid, "tangent bisection did not converge");
        Err(BilliardError::DidNotConverge {
            best: mid.rem_euclid(1.0),
        })
    }

    /// Tangent point with the table to the right of the ray from `p`.
    fn right_tangent_point(&self, p: Point) -> Result<TangentPoint> {
        self.tangent_point(p, Side::Right)
    }

    /// Tangent point with the table to the left of the ray from `p`.
    fn left_tangent_point(&self, p: Point) -> Result<TangentPoint> {
        self.tangent_point(p, Side::Left)
    }

    /// Parameter where the ray leaving `point(t)` with `heading` next meets
    /// the boundary. The ray must point into the table.
    fn intersect(&self, t: f64, heading: f64) -> Result<f64> {
        let origin = self.point(t);
        let angle = |s: f64| signed_angle((self.point(s) - origin).heading() - heading);

        let mut lo = t + RAY_BRACKET_OFFSET;
        let mut hi = t + 1.0 - RAY_BRACKET_OFFSET;
        let (g_lo, g_hi) = (angle(lo), angle(hi));
        if !(g_lo < 0.0 && g_hi > 0.0) {
            return Err(BilliardError::NoIntersection(format!(
                "ray from {} with heading {:.6} does not enter the table",
                origin, heading
            )));
        }
        for _ in 0..MAX_BISECTION_STEPS {
            let mid = 0.5 * (lo + hi);
            if hi - lo < 1e-15 {
                break;
            }
            if angle(mid) < 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok((0.5 * (lo + hi)).rem_euclid(1.0))
    }

    /// `n` evenly spaced boundary points, for drawing.
    fn sample(&self, n: usize) -> Vec<Point> {
        (0..n).map(|i| self.point(i as f64 / n as f64)).collect()
    }

    fn at(&self, t: f64) -> TangentPoint {
        let time = t.rem_euclid(1.0);
        TangentPoint {
            time,
            point: self.point(time),
        }
    }
}

/// sgn(v)|v|^e
fn signed_pow(v: f64, e: f64) -> f64 {
    v.signum() * v.abs().powf(e)
}

/// The superellipse |x|^p + |y|^p = 1; `p = 2` is the unit circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LpCircle {
    pub p: f64,
}

impl LpCircle {
    pub fn new(p: f64) -> Result<Self> {
        if !(p >= 1.0) || !p.is_finite() {
            return Err(BilliardError::Config(format!(
                "lp circle exponent must be at least 1, got {}",
                p
            )));
        }
        Ok(Self { p })
    }
}

impl Table for LpCircle {
    fn point(&self, t: f64) -> Point {
        let theta = 2.0 * PI * t;
        let e = 2.0 / self.p;
        Point::new(signed_pow(theta.cos(), e), signed_pow(theta.sin(), e))
    }

    fn tangent(&self, t: f64) -> Point {
        let theta = 2.0 * PI * t;
        let (s, c) = theta.sin_cos();
        let e = 2.0 / self.p;
        let v = Point::new(
            -e * c.abs().powf(e - 1.0) * s,
            e * s.abs().powf(e - 1.0) * c,
        )
        .scale(2.0 * PI);
        if v.is_infinite() || v.modulus() == 0.0 {
            // On an axis with p > 2 the tangent is perpendicular to that axis.
            if c.abs() < s.abs() {
                Point::new(-s.signum(), 0.0)
            } else {
                Point::new(0.0, c.signum())
            }
        } else {
            v
        }
    }

    fn contains(&self, q: Point) -> bool {
        q.x.abs().powf(self.p) + q.y.abs().powf(self.p) < 1.0
    }
}

/// Axis-aligned ellipse with semi-axes `a` and `b`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub a: f64,
    pub b: f64,
}

impl Ellipse {
    pub fn new(a: f64, b: f64) -> Result<Self> {
        if !(a > 0.0 && b > 0.0) {
            return Err(BilliardError::Config(format!(
                "ellipse semi-axes must be positive, got {} and {}",
                a, b
            )));
        }
        Ok(Self { a, b })
    }
}

impl Table for Ellipse {
    fn point(&self, t: f64) -> Point {
        let theta = 2.0 * PI * t;
        Point::new(self.a * theta.cos(), self.b * theta.sin())
    }

    fn tangent(&self, t: f64) -> Point {
        let theta = 2.0 * PI * t;
        Point::new(-self.a * theta.sin(), self.b * theta.cos()).scale(2.0 * PI)
    }

    fn contains(&self, p: Point) -> bool {
        (p.x / self.a).powi(2) + (p.y / self.b).powi(2) < 1.0
    }
}

/// Convex polygon, parametrized one edge per `1/n` of the period
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<Point>,
}

impl Polygon {
    /// Build from vertices in either cyclic order; stored counter-clockwise.
    pub fn new(mut vertices: Vec<Point>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(BilliardError::Config(format!(
                "polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        let n = vertices.len();
        let area: f64 = (0..n)
            .map(|i| vertices[i].cross(vertices[(i + 1) % n]))
            .sum();
        if area < 0.0 {
            vertices.reverse();
        }
        for i in 0..n {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            let c = vertices[(i + 2) % n];
            if (b - a).cross(c - b) <= 0.0 {
                return Err(BilliardError::Config(format!(
                    "polygon is not strictly convex at {}",
                    b
                )));
            }
        }
        Ok(Self { vertices })
    }

    /// Regular polygon with vertices at `radius·e^{i(rotation + 2πk/n)}`.
    pub fn regular(sides: usize, radius: f64, rotation: f64) -> Result<Self> {
        let vertices = (0..sides)
            .map(|k| Point::polar(radius, rotation + 2.0 * PI * k as f64 / sides as f64))
            .collect();
        Self::new(vertices)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex(&self, i: usize) -> Point {
        self.vertices[i % self.vertices.len()]
    }

    fn edge(&self, t: f64) -> (usize, f64) {
        let u = t.rem_euclid(1.0) * self.vertices.len() as f64;
        let i = (u.floor() as usize).min(self.vertices.len() - 1);
        (i, u - i as f64)
    }
}

impl Table for Polygon {
    fn point(&self, t: f64) -> Point {
        let (i, frac) = self.edge(t);
        self.vertex(i).lerp(self.vertex(i + 1), frac)
    }

    fn tangent(&self, t: f64) -> Point {
        let (i, _) = self.edge(t);
        (self.vertex(i + 1) - self.vertex(i)).scale(self.vertices.len() as f64)
    }

    fn contains(&self, p: Point) -> bool {
        (0..self.vertices.len()).all(|i| {
            let a = self.vertex(i);
            (self.vertex(i + 1) - a).cross(p - a) > 0.0
        })
    }

    fn is_corner(&self, t: f64) -> bool {
        let (_, frac) = self.edge(t);
        frac < 1e-9 || frac > 1.0 - 1e-9
    }

    fn vertices(&self) -> Option<Vec<Point>> {
        Some(self.vertices.clone())
    }

    /// The supporting vertex: every other vertex lies on `side` of the ray.
    fn tangent_point(&self, p: Point, side: Side) -> Result<TangentPoint> {
        if self.contains(p) {
            return Err(BilliardError::PointInsideTable(p));
        }
        let n = self.vertices.len();
        for i in 0..n {
            let v = self.vertices[i];
            let dir = v - p;
            let supports = self
                .vertices
                .iter()
                .all(|w| side.sign() * dir.cross(*w - p) >= -1e-12);
            if supports {
                return Ok(TangentPoint {
                    time: i as f64 / n as f64,
                    point: v,
                });
            }
        }
        Err(BilliardError::BadParametrization(format!(
            "no supporting vertex seen from {}",
            p
        )))
    }
}

type CurveFn = Box<dyn Fn(f64) -> Point + Send + Sync>;
type ContainsFn = Box<dyn Fn(Point) -> bool + Send + Sync>;

/// A table given directly by closures. Without a derivative the tangent is
/// estimated by central differences.
pub struct CurveTable {
    parametrization: CurveFn,
    derivative: Option<CurveFn>,
    containment: ContainsFn,
}

impl CurveTable {
    pub fn new(
        parametrization: impl Fn(f64) -> Point + Send + Sync + 'static,
        containment: impl Fn(Point) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            parametrization: Box::new(parametrization),
            derivative: None,
            containment: Box::new(containment),
        }
    }

    pub fn with_derivative(
        mut self,
        derivative: impl Fn(f64) -> Point + Send + Sync + 'static,
    ) -> Self {
        self.derivative = Some(Box::new(derivative));
        self
    }
}

impl std::fmt::Debug for CurveTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurveTable")
            .field("has_derivative", &self.derivative.is_some())
            .finish()
    }
}

impl Table for CurveTable {
    fn point(&self, t: f64) -> Point {
        (self.parametrization)(t)
    }

    fn tangent(&self, t: f64) -> Point {
        match &self.derivative {
            Some(d) => d(t),
            None => {
                let h = 1e-6;
                (self.point(t + h) - self.point(t - h)).scale(1.0 / (2.0 * h))
            }
        }
    }

    fn contains(&self, p: Point) -> bool {
        (self.containment)(p)
    }
}
