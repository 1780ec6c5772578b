//! Planar Geometry Kernel
//!
//! Lines, circles and the two boundary segment kinds used by arc regions:
//! straight [`LineSegment`]s and counter-clockwise [`ArcSegment`]s.
//! Segments answer containment, intersection, splitting, and winding queries.

use crate::error::{BilliardError, Result};
use crate::{normalize_angle, signed_angle, Point, EPSILON};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Tolerance used when deciding whether two segment endpoints are shared.
pub const JOIN_TOLERANCE: f64 = 1e-6;

/// An infinite line through `origin` along `direction` (not necessarily unit).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub origin: Point,
    pub direction: Point,
}

impl Line {
    /// Line through two distinct points.
    pub fn through(a: Point, b: Point) -> Result<Self> {
        if a.distance(b) < EPSILON {
            return Err(BilliardError::DegenerateSegment(a));
        }
        Ok(Self {
            origin: a,
            direction: b - a,
        })
    }

    pub fn from_heading(origin: Point, heading: f64) -> Self {
        Self {
            origin,
            direction: Point::polar(1.0, heading),
        }
    }

    /// Signed side of `p`: positive to the left of the direction.
    pub fn side(&self, p: Point) -> f64 {
        self.direction.cross(p - self.origin)
    }

    /// Intersection point; parallel lines meet at infinity.
    pub fn intersect(&self, other: &Line) -> Point {
        let denom = self.direction.cross(other.direction);
        if denom.abs() < EPSILON * self.direction.modulus() * other.direction.modulus() {
            return Point::infinity();
        }
        let s = (other.origin - self.origin).cross(other.direction) / denom;
        self.origin + self.direction.scale(s)
    }

    /// Intersection, failing on parallel lines.
    pub fn intersect_checked(&self, other: &Line) -> Result<Point> {
        let p = self.intersect(other);
        if p.is_infinite() {
            return Err(BilliardError::NoIntersection("parallel lines".into()));
        }
        Ok(p)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Point, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn unit() -> Self {
        Self::new(Point::ZERO, 1.0)
    }

    /// The circle through three points; collinear points have none.
    pub fn from_three_points(a: Point, b: Point, c: Point) -> Result<Self> {
        let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
        let span = a.distance(b).max(a.distance(c));
        if d.abs() <= 1e-12 * span * span {
            return Err(BilliardError::NoIntersection("collinear points".into()));
        }
        let a2 = a.modulus_squared();
        let b2 = b.modulus_squared();
        let c2 = c.modulus_squared();
        let center = Point::new(
            (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
            (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
        );
        Ok(Self::new(center, center.distance(a)))
    }

    pub fn point_at(&self, angle: f64) -> Point {
        self.center + Point::polar(self.radius, angle)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.distance(self.center) < self.radius
    }

    /// Inversion through this circle; the center maps to infinity.
    pub fn invert(&self, p: Point) -> Point {
        let v = p - self.center;
        let m = v.modulus_squared();
        if m == 0.0 {
            return Point::infinity();
        }
        self.center + v.scale(self.radius * self.radius / m)
    }

    pub fn intersect_line(&self, line: &Line) -> Vec<Point> {
        let u = line.direction.normalized();
        let f = line.origin - self.center;
        let b = f.dot(u);
        let c = f.modulus_squared() - self.radius * self.radius;
        let disc = b * b - c;
        let tolerance = EPSILON * self.radius.max(1.0);
        if disc < -tolerance {
            Vec::new()
        } else if disc.abs() <= tolerance {
            vec![line.origin + u.scale(-b)]
        } else {
            let root = disc.sqrt();
            vec![
                line.origin + u.scale(-b - root),
                line.origin + u.scale(-b + root),
            ]
        }
    }

    pub fn intersect_circle(&self, other: &Circle) -> Vec<Point> {
        let delta = other.center - self.center;
        let d = delta.modulus();
        if d < EPSILON
            || d > self.radius + other.radius + EPSILON
            || d < (self.radius - other.radius).abs() - EPSILON
        {
            return Vec::new();
        }
        let a = (self.radius * self.radius - other.radius * other.radius + d * d) / (2.0 * d);
        let h_sq = self.radius * self.radius - a * a;
        let u = delta.scale(1.0 / d);
        let base = self.center + u.scale(a);
        if h_sq <= EPSILON * self.radius.max(1.0) {
            return vec![base];
        }
        let h = h_sq.sqrt();
        let n = Point::new(-u.y, u.x);
        vec![base + n.scale(h), base - n.scale(h)]
    }
}

/// Signed angle subtended at `p` by the straight path `a → b`.
pub fn chord_wind(a: Point, b: Point, p: Point) -> f64 {
    signed_angle((b - p).heading() - (a - p).heading())
}

/// Winding number of `p` about the closed polygon through `points`.
pub fn winding_number(points: &[Point], p: Point) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let total: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| chord_wind(*a, *b, p))
        .sum();
    total / (2.0 * PI)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: Point,
    pub end: Point,
}

impl LineSegment {
    pub fn new(start: Point, end: Point) -> Result<Self> {
        if start.is_infinite() || end.is_infinite() || start.distance(end) < EPSILON {
            return Err(BilliardError::DegenerateSegment(start));
        }
        Ok(Self { start, end })
    }

    pub fn line(&self) -> Line {
        Line {
            origin: self.start,
            direction: self.end - self.start,
        }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    pub fn heading(&self) -> f64 {
        (self.end - self.start).heading()
    }

    /// Fractional position of the projection of `p` along the segment.
    fn parameter(&self, p: Point) -> f64 {
        let d = self.end - self.start;
        (p - self.start).dot(d) / d.modulus_squared()
    }

    pub fn contains_point(&self, p: Point) -> bool {
        let s = self.parameter(p);
        let slack = EPSILON / self.length();
        if s < -slack || s > 1.0 + slack {
            return false;
        }
        self.line().side(p).abs() / self.length() < EPSILON
    }
}

/// A counter-clockwise circular arc; `end_angle ≥ start_angle` always.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcSegment {
    pub center: Point,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl ArcSegment {
    pub fn new(center: Point, radius: f64, start_angle: f64, end_angle: f64) -> Result<Self> {
        let mut end_angle = end_angle;
        while end_angle < start_angle {
            end_angle += 2.0 * PI;
        }
        while end_angle - start_angle > 2.0 * PI {
            end_angle -= 2.0 * PI;
        }
        if !(radius > 0.0) || radius * (end_angle - start_angle) < EPSILON {
            return Err(BilliardError::DegenerateSegment(
                center + Point::polar(radius, start_angle),
            ));
        }
        Ok(Self {
            center,
            radius,
            start_angle,
            end_angle,
        })
    }

    /// Counter-clockwise arc of `circle` from `from` to `to`.
    pub fn between(circle: &Circle, from: Point, to: Point) -> Result<Self> {
        Self::new(
            circle.center,
            circle.radius,
            (from - circle.center).heading(),
            (to - circle.center).heading(),
        )
    }

    pub fn circle(&self) -> Circle {
        Circle::new(self.center, self.radius)
    }

    pub fn sweep(&self) -> f64 {
        self.end_angle - self.start_angle
    }

    pub fn point_at(&self, angle: f64) -> Point {
        self.center + Point::polar(self.radius, angle)
    }

    pub fn start(&self) -> Point {
        self.point_at(self.start_angle)
    }

    pub fn end(&self) -> Point {
        self.point_at(self.end_angle)
    }

    pub fn mid(&self) -> Point {
        self.point_at(0.5 * (self.start_angle + self.end_angle))
    }

    /// Angular offset of `p` from the start, measured counter-clockwise.
    fn offset(&self, p: Point) -> f64 {
        normalize_angle((p - self.center).heading() - self.start_angle)
    }

    pub fn contains_point(&self, p: Point) -> bool {
        let tolerance = EPSILON * self.radius.max(1.0);
        if (p.distance(self.center) - self.radius).abs() > tolerance {
            return false;
        }
        let slack = tolerance / self.radius;
        let offset = self.offset(p);
        offset <= self.sweep() + slack || offset >= 2.0 * PI - slack
    }

    /// True when `p` lies strictly between this arc and its chord.
    fn in_circular_segment(&self, p: Point) -> bool {
        if !self.circle().contains(p) {
            return false;
        }
        let chord = Line {
            origin: self.start(),
            direction: self.end() - self.start(),
        };
        chord.side(p) * chord.side(self.mid()) > 0.0
    }
}

/// A boundary piece of an [`crate::arc_region::ArcRegion`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Line(LineSegment),
    Arc(ArcSegment),
}

impl Segment {
    pub fn line(start: Point, end: Point) -> Result<Self> {
        Ok(Segment::Line(LineSegment::new(start, end)?))
    }

    pub fn arc(center: Point, radius: f64, start_angle: f64, end_angle: f64) -> Result<Self> {
        Ok(Segment::Arc(ArcSegment::new(
            center,
            radius,
            start_angle,
            end_angle,
        )?))
    }

    /// The segment through `start`, `mid` and `end`: a line when they are
    /// collinear, else an arc. Arcs are stored counter-clockwise, so the
    /// result may run from `end` to `start`.
    pub fn through(start: Point, mid: Point, end: Point) -> Result<Self> {
        if start.is_infinite() || mid.is_infinite() || end.is_infinite() {
            return Err(BilliardError::NoIntersection("segment through infinity".into()));
        }
        let bend = (mid - start).cross(end - start);
        let span = start.distance(end).max(start.distance(mid));
        if bend.abs() <= 1e-10 * span * span {
            return Segment::line(start, end);
        }
        let circle = Circle::from_three_points(start, mid, end)?;
        if bend > 0.0 {
            Ok(Segment::Arc(ArcSegment::between(&circle, start, end)?))
        } else {
            Ok(Segment::Arc(ArcSegment::between(&circle, end, start)?))
        }
    }

    pub fn start(&self) -> Point {
        match self {
            Segment::Line(l) => l.start,
            Segment::Arc(a) => a.start(),
        }
    }

    pub fn end(&self) -> Point {
        match self {
            Segment::Line(l) => l.end,
            Segment::Arc(a) => a.end(),
        }
    }

    pub fn mid(&self) -> Point {
        match self {
            Segment::Line(l) => l.start.midpoint(l.end),
            Segment::Arc(a) => a.mid(),
        }
    }

    pub fn length(&self) -> f64 {
        match self {
            Segment::Line(l) => l.length(),
            Segment::Arc(a) => a.radius * a.sweep(),
        }
    }

    /// Direction of travel at the start point.
    pub fn start_heading(&self) -> f64 {
        match self {
            Segment::Line(l) => l.heading(),
            Segment::Arc(a) => a.start_angle + PI / 2.0,
        }
    }

    /// Direction of travel at the end point.
    pub fn end_heading(&self) -> f64 {
        match self {
            Segment::Line(l) => l.heading(),
            Segment::Arc(a) => a.end_angle + PI / 2.0,
        }
    }

    /// Signed total curvature along the segment.
    pub fn turning(&self) -> f64 {
        match self {
            Segment::Line(_) => 0.0,
            Segment::Arc(a) => a.sweep(),
        }
    }

    pub fn contains_point(&self, p: Point) -> bool {
        match self {
            Segment::Line(l) => l.contains_point(p),
            Segment::Arc(a) => a.contains_point(p),
        }
    }

    /// Signed angle swept by the segment as seen from `p`.
    pub fn wind(&self, p: Point) -> f64 {
        match self {
            Segment::Line(l) => chord_wind(l.start, l.end, p),
            Segment::Arc(a) => {
                let chord = chord_wind(a.start(), a.end(), p);
                if a.in_circular_segment(p) {
                    chord + 2.0 * PI
                } else {
                    chord
                }
            }
        }
    }

    /// Crossing points of the two segments. Two lines or circles meet at
    /// most twice; overlapping pieces of the same line or circle report none.
    pub fn intersect(&self, other: &Segment) -> Vec<Point> {
        let candidates = match (self, other) {
            (Segment::Line(a), Segment::Line(b)) => {
                let p = a.line().intersect(&b.line());
                if p.is_infinite() {
                    Vec::new()
                } else {
                    vec![p]
                }
            }
            (Segment::Line(l), Segment::Arc(a)) | (Segment::Arc(a), Segment::Line(l)) => {
                a.circle().intersect_line(&l.line())
            }
            (Segment::Arc(a), Segment::Arc(b)) => a.circle().intersect_circle(&b.circle()),
        };
        candidates
            .into_iter()
            .filter(|p| self.contains_point(*p) && other.contains_point(*p))
            .collect()
    }

    /// Split at the given points; points off the segment or at its ends are ignored.
    pub fn split(&self, points: &[Point]) -> Vec<Segment> {
        match self {
            Segment::Line(l) => {
                let mut cuts: Vec<f64> = points
                    .iter()
                    .filter(|p| l.contains_point(**p))
                    .map(|p| l.parameter(*p))
                    .collect();
                let slack = JOIN_TOLERANCE / l.length();
                cuts.retain(|s| *s > slack && *s < 1.0 - slack);
                cuts.sort_by(|a, b| a.total_cmp(b));
                cuts.dedup_by(|a, b| (*a - *b).abs() <= slack);

                let mut pieces = Vec::with_capacity(cuts.len() + 1);
                let mut from = l.start;
                for s in cuts {
                    let to = l.start.lerp(l.end, s);
                    if let Ok(piece) = LineSegment::new(from, to) {
                        pieces.push(Segment::Line(piece));
                        from = to;
                    }
                }
                if let Ok(piece) = LineSegment::new(from, l.end) {
                    pieces.push(Segment::Line(piece));
                }
                pieces
            }
            Segment::Arc(a) => {
                let sweep = a.sweep();
                let slack = JOIN_TOLERANCE / a.radius;
                let mut cuts: Vec<f64> = points
                    .iter()
                    .filter(|p| a.contains_point(**p))
                    .map(|p| a.offset(*p))
                    .filter(|o| *o > slack && *o < sweep - slack)
                    .collect();
                cuts.sort_by(|x, y| x.total_cmp(y));
                cuts.dedup_by(|x, y| (*x - *y).abs() <= slack);

                let mut pieces = Vec::with_capacity(cuts.len() + 1);
                let mut from = a.start_angle;
                for offset in cuts {
                    let to = a.start_angle + offset;
                    if let Ok(piece) = ArcSegment::new(a.center, a.radius, from, to) {
                        pieces.push(Segment::Arc(piece));
                        from = to;
                    }
                }
                if let Ok(piece) = ArcSegment::new(a.center, a.radius, from, a.end_angle) {
                    pieces.push(Segment::Arc(piece));
                }
                pieces
            }
        }
    }

    /// `n + 1` evenly spaced points from start to end, for drawing.
    pub fn sample(&self, n: usize) -> Vec<Point> {
        let n = n.max(1);
        (0..=n)
            .map(|i| {
                let f = i as f64 / n as f64;
                match self {
                    Segment::Line(l) => l.start.lerp(l.end, f),
                    Segment::Arc(a) => a.point_at(a.start_angle + f * a.sweep()),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_lines_meet_at_infinity() {
        let a = Line::through(Point::ZERO, Point::new(1.0, 0.0)).unwrap();
        let b = Line::through(Point::new(0.0, 1.0), Point::new(1.0, 1.0)).unwrap();
        assert!(a.intersect(&b).is_infinite());
        assert!(matches!(
            a.intersect_checked(&b),
            Err(BilliardError::NoIntersection(_))
        ));
    }

    #[test]
    fn test_degenerate_segment_rejected() {
        let p = Point::new(0.3, 0.3);
        assert!(matches!(
            LineSegment::new(p, p),
            Err(BilliardError::DegenerateSegment(_))
        ));
    }

    #[test]
    fn test_circle_from_three_points() {
        let c = Circle::from_three_points(
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(-1.0, 0.0),
        )
        .unwrap();
        assert!(c.center.modulus() < 1e-12);
        assert!((c.radius - 1.0).abs() < 1e-12);

        let collinear = Circle::from_three_points(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
        );
        assert!(collinear.is_err());
    }

    #[test]
    fn test_arc_normalizes_sweep() {
        let arc = ArcSegment::new(Point::ZERO, 1.0, 1.0, -1.0).unwrap();
        assert!(arc.end_angle >= arc.start_angle);
        assert!((arc.sweep() - (2.0 * PI - 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_line_segment_intersections() {
        let a = Segment::line(Point::new(-1.0, 0.0), Point::new(1.0, 0.0)).unwrap();
        let b = Segment::line(Point::new(0.0, -1.0), Point::new(0.0, 1.0)).unwrap();
        let c = Segment::line(Point::new(2.0, -1.0), Point::new(2.0, 1.0)).unwrap();
        let hits = a.intersect(&b);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].approx_eq(Point::ZERO, 1e-12));
        assert!(a.intersect(&c).is_empty());
    }

    #[test]
    fn test_arc_line_intersection() {
        let arc = Segment::arc(Point::ZERO, 1.0, 0.0, PI).unwrap();
        let chord = Segment::line(Point::new(-2.0, 0.5), Point::new(2.0, 0.5)).unwrap();
        assert_eq!(arc.intersect(&chord).len(), 2);
        let below = Segment::line(Point::new(-2.0, -0.5), Point::new(2.0, -0.5)).unwrap();
        assert!(arc.intersect(&below).is_empty());
    }

    #[test]
    fn test_overlapping_segments_report_no_points() {
        let a = Segment::line(Point::new(0.0, 0.0), Point::new(2.0, 0.0)).unwrap();
        let b = Segment::line(Point::new(1.0, 0.0), Point::new(3.0, 0.0)).unwrap();
        assert!(a.intersect(&b).is_empty());
        let upper = Segment::arc(Point::ZERO, 1.0, 0.0, PI).unwrap();
        let wide = Segment::arc(Point::ZERO, 1.0, 0.5, 1.5 * PI).unwrap();
        assert!(upper.intersect(&wide).is_empty());
        let crossing = Segment::arc(Point::new(1.0, 0.0), 1.0, 0.0, 2.0 * PI - 0.1).unwrap();
        assert_eq!(upper.intersect(&crossing).len(), 1);
    }

    #[test]
    fn test_split_line_segment() {
        let seg = Segment::line(Point::new(0.0, 0.0), Point::new(4.0, 0.0)).unwrap();
        let pieces = seg.split(&[Point::new(3.0, 0.0), Point::new(1.0, 0.0), Point::new(9.0, 0.0)]);
        assert_eq!(pieces.len(), 3);
        assert!(pieces[0].end().approx_eq(Point::new(1.0, 0.0), 1e-12));
        assert!(pieces[2].start().approx_eq(Point::new(3.0, 0.0), 1e-12));
    }

    #[test]
    fn test_split_arc_segment() {
        let seg = Segment::arc(Point::ZERO, 1.0, 0.0, PI).unwrap();
        let pieces = seg.split(&[Point::polar(1.0, PI / 2.0)]);
        assert_eq!(pieces.len(), 2);
        assert!(pieces[0].end().approx_eq(Point::new(0.0, 1.0), 1e-12));
    }

    #[test]
    fn test_arc_wind_inside_circular_segment() {
        let arc = Segment::arc(Point::ZERO, 1.0, 0.0, PI).unwrap();
        let half = 0.5f64.atan();
        let inside = arc.wind(Point::new(0.0, 0.5));
        assert!((inside - (PI + 2.0 * half)).abs() < 1e-9);
        let outside = arc.wind(Point::new(0.0, -0.5));
        assert!((outside - (PI - 2.0 * half)).abs() < 1e-9);
    }

    #[test]
    fn test_full_circle_winding() {
        let upper = Segment::arc(Point::ZERO, 1.0, 0.0, PI).unwrap();
        let lower = Segment::arc(Point::ZERO, 1.0, PI, 2.0 * PI).unwrap();
        let p = Point::new(0.2, -0.3);
        let total = upper.wind(p) + lower.wind(p);
        assert!((total - 2.0 * PI).abs() < 1e-9);
        let q = Point::new(3.0, 0.1);
        assert!((upper.wind(q) + lower.wind(q)).abs() < 1e-9);
    }

    #[test]
    fn test_through_three_points() {
        let line =
            Segment::through(Point::ZERO, Point::new(1.0, 1.0), Point::new(2.0, 2.0)).unwrap();
        assert!(matches!(line, Segment::Line(_)));
        let arc = Segment::through(
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(-1.0, 0.0),
        )
        .unwrap();
        match arc {
            Segment::Arc(a) => {
                assert!((a.radius - 1.0).abs() < 1e-12);
                assert!(a.contains_point(Point::new(0.0, 1.0)));
            }
            _ => panic!("expected arc"),
        }
    }

    #[test]
    fn test_polygon_winding_number() {
        let square = [
            Point::new(-1.0, -1.0),
            Point::new(1.0, -1.0),
            Point::new(1.0, 1.0),
            Point::new(-1.0, 1.0),
        ];
        assert!((winding_number(&square, Point::ZERO) - 1.0).abs() < 1e-12);
        assert!(winding_number(&square, Point::new(2.0, 2.0)).abs() < 1e-12);
    }
}
