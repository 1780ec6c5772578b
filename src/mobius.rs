//! Möbius Transformations
//!
//! Fractional-linear maps z ↦ (az + b) / (cz + d) of the extended plane.
//! Disk automorphisms built from these are the isometries of the Poincaré
//! disk; affine point reflections are the degenerate case c = 0.

use crate::error::{BilliardError, Result};
use crate::geometry::Segment;
use crate::Point;
use num_complex::Complex64;

/// Coefficients below this magnitude are treated as zero.
const COEFFICIENT_TOLERANCE: f64 = 1e-14;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MobiusTransformation {
    pub a: Complex64,
    pub b: Complex64,
    pub c: Complex64,
    pub d: Complex64,
}

impl MobiusTransformation {
    /// Create a transformation; fails when ad − bc = 0.
    pub fn new(a: Complex64, b: Complex64, c: Complex64, d: Complex64) -> Result<Self> {
        let m = Self { a, b, c, d };
        if m.determinant().norm() < COEFFICIENT_TOLERANCE {
            return Err(BilliardError::SingularTransformation);
        }
        Ok(m)
    }

    pub fn identity() -> Self {
        Self {
            a: Complex64::new(1.0, 0.0),
            b: Complex64::new(0.0, 0.0),
            c: Complex64::new(0.0, 0.0),
            d: Complex64::new(1.0, 0.0),
        }
    }

    /// z ↦ −z
    pub fn negation() -> Self {
        Self {
            a: Complex64::new(-1.0, 0.0),
            ..Self::identity()
        }
    }

    /// z ↦ z + t
    pub fn translation(t: Point) -> Self {
        Self {
            b: t.to_complex(),
            ..Self::identity()
        }
    }

    /// z ↦ e^{iθ} z
    pub fn rotation(theta: f64) -> Self {
        Self {
            a: Complex64::from_polar(1.0, theta),
            ..Self::identity()
        }
    }

    /// Affine point reflection z ↦ 2v − z.
    pub fn affine_point_reflection(v: Point) -> Self {
        Self {
            a: Complex64::new(-1.0, 0.0),
            b: v.to_complex() * 2.0,
            ..Self::identity()
        }
    }

    /// Disk automorphism sending `p` to 0: z ↦ (z − p) / (1 − p̄z).
    pub fn blaschke(p: Point) -> Result<Self> {
        Self::check_in_disk(p)?;
        let p = p.to_complex();
        Self::new(
            Complex64::new(1.0, 0.0),
            -p,
            -p.conj(),
            Complex64::new(1.0, 0.0),
        )
    }

    /// Involutive disk automorphism swapping 0 and `p`: z ↦ (p − z) / (1 − p̄z).
    pub fn point_inversion(p: Point) -> Result<Self> {
        Self::check_in_disk(p)?;
        let p = p.to_complex();
        Self::new(
            Complex64::new(-1.0, 0.0),
            p,
            -p.conj(),
            Complex64::new(1.0, 0.0),
        )
    }

    /// Hyperbolic half-turn about `v` in the Poincaré disk.
    pub fn point_reflection(v: Point) -> Result<Self> {
        let to_origin = Self::blaschke(v)?;
        Ok(to_origin
            .inverse()
            .compose(&Self::negation())
            .compose(&to_origin))
    }

    fn check_in_disk(p: Point) -> Result<()> {
        if p.is_infinite() || p.modulus_squared() >= 1.0 {
            return Err(BilliardError::PointOutsideDisk(p));
        }
        Ok(())
    }

    pub fn determinant(&self) -> Complex64 {
        self.a * self.d - self.b * self.c
    }

    /// Image of `z`; the pole maps to infinity and infinity maps to a/c.
    pub fn apply(&self, z: Point) -> Point {
        if z.is_infinite() {
            if self.c.norm() < COEFFICIENT_TOLERANCE {
                return Point::infinity();
            }
            return Point::from(self.a / self.c);
        }
        let z = z.to_complex();
        let den = self.c * z + self.d;
        if den.norm() < COEFFICIENT_TOLERANCE {
            return Point::infinity();
        }
        Point::from((self.a * z + self.b) / den)
    }

    /// The pole −d/c, if finite.
    pub fn pole(&self) -> Option<Point> {
        if self.c.norm() < COEFFICIENT_TOLERANCE {
            None
        } else {
            Some(Point::from(-self.d / self.c))
        }
    }

    /// `self ∘ other`: apply `other` first.
    pub fn compose(&self, other: &MobiusTransformation) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
        }
    }

    pub fn inverse(&self) -> Self {
        Self {
            a: self.d,
            b: -self.b,
            c: -self.c,
            d: self.a,
        }
    }

    /// Rescale so that ad − bc = 1; keeps long compositions well conditioned.
    pub fn normalized(&self) -> Self {
        let s = self.determinant().sqrt();
        Self {
            a: self.a / s,
            b: self.b / s,
            c: self.c / s,
            d: self.d / s,
        }
    }

    /// Roots of cz² + (d − a)z − b = 0; infinity is included when c = 0.
    ///
    /// The identity fixes everything and reports no points.
    pub fn fixed_points(&self) -> Vec<Point> {
        let m = self.normalized();
        let (a, b, c, d) = (m.a, m.b, m.c, m.d);
        if c.norm() < COEFFICIENT_TOLERANCE {
            let diff = d - a;
            if diff.norm() < COEFFICIENT_TOLERANCE {
                if b.norm() < COEFFICIENT_TOLERANCE {
                    return Vec::new();
                }
                return vec![Point::infinity()];
            }
            return vec![Point::from(b / diff), Point::infinity()];
        }
        let disc = (d - a) * (d - a) + 4.0 * b * c;
        let root = disc.sqrt();
        let first = Point::from(((a - d) + root) / (2.0 * c));
        if root.norm() < COEFFICIENT_TOLERANCE {
            return vec![first];
        }
        vec![first, Point::from(((a - d) - root) / (2.0 * c))]
    }

    /// Image of a line or arc segment, which is again a line or arc.
    pub fn apply_segment(&self, segment: &Segment) -> Result<Segment> {
        if let Some(pole) = self.pole() {
            if segment.contains_point(pole) {
                return Err(BilliardError::NoIntersection(format!(
                    "segment passes through the pole {}",
                    pole
                )));
            }
        }
        Segment::through(
            self.apply(segment.start()),
            self.apply(segment.mid()),
            self.apply(segment.end()),
        )
    }
}

impl Default for MobiusTransformation {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_singular_rejected() {
        let m = MobiusTransformation::new(c(1.0, 0.0), c(2.0, 0.0), c(2.0, 0.0), c(4.0, 0.0));
        assert!(matches!(m, Err(BilliardError::SingularTransformation)));
    }

    #[test]
    fn test_apply_pole_and_infinity() {
        let m = MobiusTransformation::new(c(1.0, 0.0), c(0.0, 0.0), c(1.0, 0.0), c(-1.0, 0.0))
            .unwrap();
        assert!(m.apply(Point::ONE).is_infinite());
        assert!(m.apply(Point::infinity()).approx_eq(Point::ONE, 1e-12));
        assert!(MobiusTransformation::identity()
            .apply(Point::infinity())
            .is_infinite());
    }

    #[test]
    fn test_blaschke_sends_point_to_origin() {
        let p = Point::new(0.3, -0.4);
        let b = MobiusTransformation::blaschke(p).unwrap();
        assert!(b.apply(p).modulus() < 1e-12);
        // Boundary maps to boundary.
        let q = b.apply(Point::polar(1.0, 0.7));
        assert!((q.modulus() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_point_inversion_swaps_origin() {
        let p = Point::new(-0.2, 0.5);
        let m = MobiusTransformation::point_inversion(p).unwrap();
        assert!(m.apply(Point::ZERO).approx_eq(p, 1e-12));
        assert!(m.apply(p).approx_eq(Point::ZERO, 1e-12));
        let z = Point::new(0.1, 0.1);
        assert!(m.apply(m.apply(z)).approx_eq(z, 1e-12));
    }

    #[test]
    fn test_point_reflection_fixes_center() {
        let v = Point::new(0.25, 0.1);
        let m = MobiusTransformation::point_reflection(v).unwrap();
        assert!(m.apply(v).approx_eq(v, 1e-12));
        let z = Point::new(-0.4, 0.3);
        assert!(m.apply(m.apply(z)).approx_eq(z, 1e-12));
    }

    #[test]
    fn test_outside_disk_rejected() {
        assert!(matches!(
            MobiusTransformation::blaschke(Point::new(1.0, 0.0)),
            Err(BilliardError::PointOutsideDisk(_))
        ));
        assert!(MobiusTransformation::point_inversion(Point::new(0.0, 2.0)).is_err());
    }

    #[test]
    fn test_fixed_points() {
        let v = Point::new(0.3, 0.2);
        let m = MobiusTransformation::point_reflection(v).unwrap();
        let fixed = m.fixed_points();
        assert!(fixed.iter().any(|p| p.approx_eq(v, 1e-9)));
        for p in &fixed {
            assert!(m.apply(*p).approx_eq(*p, 1e-9));
        }

        let t = MobiusTransformation::translation(Point::new(1.0, 0.0));
        let fixed = t.fixed_points();
        assert_eq!(fixed.len(), 1);
        assert!(fixed[0].is_infinite());
        assert!(MobiusTransformation::identity().fixed_points().is_empty());
    }

    #[test]
    fn test_affine_reflection() {
        let v = Point::new(1.0, 2.0);
        let m = MobiusTransformation::affine_point_reflection(v);
        assert!(m.apply(Point::ZERO).approx_eq(Point::new(2.0, 4.0), 1e-12));
        assert!(m.apply(v).approx_eq(v, 1e-12));
    }

    #[test]
    fn test_apply_segment_maps_line_to_arc() {
        let seg = Segment::line(Point::new(0.1, -0.5), Point::new(0.1, 0.5)).unwrap();
        let m = MobiusTransformation::blaschke(Point::new(0.3, 0.3)).unwrap();
        let image = m.apply_segment(&seg).unwrap();
        assert!(matches!(image, Segment::Arc(_)));
        assert!(image.contains_point(m.apply(Point::new(0.1, 0.0))));
    }
}
