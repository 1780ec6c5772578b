//! Billiard Core: inner and outer billiard dynamics on convex tables
//!
//! Core library for the billiard dynamics engine: planar geometry, Möbius
//! transformations, hyperbolic models, convex tables, arc regions, and the
//! iterated inner/outer billiard maps built on top of them.

pub mod arc_region;
pub mod billiard;
pub mod error;
pub mod geometry;
pub mod hyperbolic_models;
pub mod inner;
pub mod logging;
pub mod mobius;
pub mod outer;
pub mod settings;
pub mod table;
pub mod worker;

pub use error::{BilliardError, Result};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Tolerance for geometric coincidence (shared endpoints, on-segment tests).
pub const EPSILON: f64 = 1e-9;

/// A point of the plane, doubling as a complex number.
///
/// Degenerate projective results (parallel lines, division by zero) are
/// represented by the infinity sentinel, see [`Point::is_infinite`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// x coordinate (real part)
    pub x: f64,
    /// y coordinate (imaginary part)
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };
    pub const ONE: Point = Point { x: 1.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Create a point from polar coordinates (r, θ).
    pub fn polar(r: f64, theta: f64) -> Self {
        Self {
            x: r * theta.cos(),
            y: r * theta.sin(),
        }
    }

    /// The point at infinity.
    pub fn infinity() -> Self {
        Self {
            x: f64::INFINITY,
            y: f64::INFINITY,
        }
    }

    /// True for the infinity sentinel and for any non-finite coordinate.
    pub fn is_infinite(&self) -> bool {
        !self.x.is_finite() || !self.y.is_finite()
    }

    /// |z|
    pub fn modulus(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// |z|²
    pub fn modulus_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Polar angle θ in (−π, π]
    pub fn heading(&self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn dot(&self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// z-component of the 3D cross product; positive when `other` lies to the left.
    pub fn cross(&self, other: Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn conj(&self) -> Self {
        Self::new(self.x, -self.y)
    }

    pub fn scale(&self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k)
    }

    /// Unit vector in the same direction (zero stays zero).
    pub fn normalized(&self) -> Self {
        let m = self.modulus();
        if m == 0.0 {
            *self
        } else {
            self.scale(1.0 / m)
        }
    }

    pub fn rotate(&self, angle: f64) -> Self {
        *self * Point::polar(1.0, angle)
    }

    pub fn distance(&self, other: Point) -> f64 {
        (*self - other).modulus()
    }

    /// Multiplicative inverse 1/z; the origin maps to infinity.
    pub fn inverse(&self) -> Self {
        Point::ONE / *self
    }

    pub fn midpoint(&self, other: Point) -> Self {
        (*self + other).scale(0.5)
    }

    pub fn lerp(&self, other: Point, t: f64) -> Self {
        *self + (other - *self).scale(t)
    }

    pub fn approx_eq(&self, other: Point, tolerance: f64) -> bool {
        if self.is_infinite() || other.is_infinite() {
            return self.is_infinite() && other.is_infinite();
        }
        self.distance(other) <= tolerance
    }

    pub fn to_complex(self) -> Complex64 {
        Complex64::new(self.x, self.y)
    }
}

impl From<Complex64> for Point {
    fn from(z: Complex64) -> Self {
        Point::new(z.re, z.im)
    }
}

impl From<Point> for Complex64 {
    fn from(p: Point) -> Self {
        p.to_complex()
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, k: f64) -> Point {
        self.scale(k)
    }
}

/// Complex multiplication
impl Mul for Point {
    type Output = Point;
    fn mul(self, rhs: Point) -> Point {
        Point::new(
            self.x * rhs.x - self.y * rhs.y,
            self.x * rhs.y + self.y * rhs.x,
        )
    }
}

/// Complex division; division by zero yields the infinity sentinel.
impl Div for Point {
    type Output = Point;
    fn div(self, rhs: Point) -> Point {
        let denom = rhs.modulus_squared();
        if denom == 0.0 {
            return Point::infinity();
        }
        Point::from(self.to_complex() / rhs.to_complex())
    }
}

impl Div<f64> for Point {
    type Output = Point;
    fn div(self, k: f64) -> Point {
        if k == 0.0 {
            return Point::infinity();
        }
        Point::new(self.x / k, self.y / k)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_infinite() {
            write!(f, "∞")
        } else {
            write!(f, "({:.4}, {:.4})", self.x, self.y)
        }
    }
}

/// Convert angle to range [0, 2π)
pub fn normalize_angle(theta: f64) -> f64 {
    let mut result = theta % (2.0 * PI);
    if result < 0.0 {
        result += 2.0 * PI;
    }
    result
}

/// Convert angle to range (−π, π]
pub fn signed_angle(theta: f64) -> f64 {
    let result = normalize_angle(theta);
    if result > PI {
        result - 2.0 * PI
    } else {
        result
    }
}
