//! Arc Regions
//!
//! A closed planar region bounded by a cycle of line and arc segments, each
//! traversed forwards or backwards. Regions canonicalize to counter-clockwise
//! orientation, answer point containment by winding number, and can be
//! shattered into sub-regions by slicing segments.

use crate::error::{BilliardError, Result};
use crate::geometry::{Segment, JOIN_TOLERANCE};
use crate::{signed_angle, Point};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Direction in which a boundary segment is walked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// start → end
    Forward,
    /// end → start
    Backward,
}

impl Orientation {
    pub fn sign(self) -> f64 {
        match self {
            Orientation::Forward => 1.0,
            Orientation::Backward => -1.0,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Orientation::Forward => Orientation::Backward,
            Orientation::Backward => Orientation::Forward,
        }
    }
}

fn oriented_start(segment: &Segment, orientation: Orientation) -> Point {
    match orientation {
        Orientation::Forward => segment.start(),
        Orientation::Backward => segment.end(),
    }
}

fn oriented_end(segment: &Segment, orientation: Orientation) -> Point {
    match orientation {
        Orientation::Forward => segment.end(),
        Orientation::Backward => segment.start(),
    }
}

/// Heading of travel when leaving the oriented start.
fn leaving_heading(segment: &Segment, orientation: Orientation) -> f64 {
    match orientation {
        Orientation::Forward => segment.start_heading(),
        Orientation::Backward => segment.end_heading() + PI,
    }
}

/// Heading of travel when arriving at the oriented end.
fn arriving_heading(segment: &Segment, orientation: Orientation) -> f64 {
    match orientation {
        Orientation::Forward => segment.end_heading(),
        Orientation::Backward => segment.start_heading() + PI,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcRegion {
    segments: Vec<Segment>,
    orientations: Vec<Orientation>,
}

impl ArcRegion {
    /// Build from an unordered bag of segments forming one closed cycle.
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        let mut region = Self {
            orientations: vec![Orientation::Forward; segments.len()],
            segments,
        };
        region.fix_orientation()?;
        region.rectify();
        Ok(region)
    }

    /// Build from segments already chained in cycle order.
    fn from_cycle(segments: Vec<Segment>, orientations: Vec<Orientation>) -> Self {
        Self {
            segments,
            orientations,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn orientations(&self) -> &[Orientation] {
        &self.orientations
    }

    /// Reorder the segments into a chain and assign each an orientation so
    /// consecutive segments share endpoints.
    pub fn fix_orientation(&mut self) -> Result<()> {
        if self.segments.len() < 2 {
            return Err(BilliardError::SegmentsDoNotLineUp);
        }
        let mut remaining: Vec<Segment> = self.segments[1..].to_vec();
        let mut ordered = vec![self.segments[0]];
        let mut orientations = vec![Orientation::Forward];
        let origin = self.segments[0].start();
        let mut cursor = self.segments[0].end();

        while !remaining.is_empty() {
            let next = remaining.iter().enumerate().find_map(|(i, s)| {
                if s.start().approx_eq(cursor, JOIN_TOLERANCE) {
                    Some((i, Orientation::Forward))
                } else if s.end().approx_eq(cursor, JOIN_TOLERANCE) {
                    Some((i, Orientation::Backward))
                } else {
                    None
                }
            });
            let (i, orientation) = next.ok_or(BilliardError::SegmentsDoNotLineUp)?;
            let segment = remaining.remove(i);
            cursor = oriented_end(&segment, orientation);
            ordered.push(segment);
            orientations.push(orientation);
        }
        if !cursor.approx_eq(origin, JOIN_TOLERANCE) {
            return Err(BilliardError::SegmentsDoNotLineUp);
        }

        self.segments = ordered;
        self.orientations = orientations;
        Ok(())
    }

    /// Total signed turning: curvature along segments plus corner angles.
    /// About 2π for a counter-clockwise cycle, −2π for a clockwise one.
    pub fn total_turning(&self) -> f64 {
        let n = self.segments.len();
        (0..n)
            .map(|i| {
                let (s, o) = (&self.segments[i], self.orientations[i]);
                let (next, next_o) = (&self.segments[(i + 1) % n], self.orientations[(i + 1) % n]);
                let corner =
                    signed_angle(leaving_heading(next, next_o) - arriving_heading(s, o));
                o.sign() * s.turning() + corner
            })
            .sum()
    }

    /// Walk the cycle in the opposite direction.
    pub fn reverse(&mut self) {
        self.segments.reverse();
        self.orientations.reverse();
        for o in &mut self.orientations {
            *o = o.flipped();
        }
    }

    /// Canonicalize to counter-clockwise orientation.
    pub fn rectify(&mut self) {
        if self.total_turning() < PI {
            self.reverse();
        }
    }

    pub fn on_boundary(&self, p: Point) -> bool {
        self.segments.iter().any(|s| s.contains_point(p))
    }

    /// Sum of signed angles subtended by the boundary, seen from `p`.
    pub fn winding(&self, p: Point) -> f64 {
        self.segments
            .iter()
            .zip(&self.orientations)
            .map(|(s, o)| o.sign() * s.wind(p))
            .sum()
    }

    /// Strict interior test; boundary points are outside.
    pub fn contains_point(&self, p: Point) -> bool {
        if p.is_infinite() || self.on_boundary(p) {
            return false;
        }
        self.winding(p) > PI
    }

    /// Segment joints in cycle order.
    pub fn corners(&self) -> Vec<Point> {
        self.segments
            .iter()
            .zip(&self.orientations)
            .map(|(s, o)| oriented_start(s, *o))
            .collect()
    }

    /// Boundary points in cycle order, `per_segment` steps per segment.
    pub fn boundary(&self, per_segment: usize) -> Vec<Point> {
        let mut points = Vec::new();
        for (s, o) in self.segments.iter().zip(&self.orientations) {
            let mut pts = s.sample(per_segment);
            if *o == Orientation::Backward {
                pts.reverse();
            }
            pts.pop();
            points.extend(pts);
        }
        points
    }

    /// Cut this region by each slice in turn and return the resulting pieces.
    pub fn shatter(&self, slices: &[Segment]) -> Result<Vec<ArcRegion>> {
        let mut regions = vec![self.clone()];
        for slice in slices {
            let mut next = Vec::with_capacity(regions.len() + 1);
            for region in &regions {
                next.extend(region.cut(slice)?);
            }
            regions = next;
        }
        Ok(regions)
    }

    fn cut(&self, slice: &Segment) -> Result<Vec<ArcRegion>> {
        let mut cut_points = Vec::new();
        let mut edges = Vec::new();
        for segment in &self.segments {
            let hits = segment.intersect(slice);
            edges.extend(segment.split(&hits));
            cut_points.extend(hits);
        }
        if cut_points.is_empty() {
            return Ok(vec![self.clone()]);
        }

        let inside: Vec<Segment> = slice
            .split(&cut_points)
            .into_iter()
            .filter(|piece| self.contains_point(piece.mid()))
            .collect();
        if inside.is_empty() {
            return Ok(vec![self.clone()]);
        }
        edges.extend(inside);

        let faces: Vec<ArcRegion> = find_faces(&edges)?
            .into_iter()
            .filter(|face| face.total_turning() > PI)
            .filter(|face| !self.segments.iter().any(|s| face.contains_point(s.mid())))
            .collect();
        debug!(pieces = faces.len(), "region cut");
        if faces.is_empty() {
            return Ok(vec![self.clone()]);
        }
        Ok(faces)
    }
}

/// A directed copy of an edge in the planar graph
#[derive(Debug, Clone, Copy)]
struct HalfEdge {
    edge: usize,
    orientation: Orientation,
    from: usize,
    to: usize,
}

/// Index of the vertex matching `p`, registering it when new.
fn vertex_index(vertices: &mut Vec<Point>, p: Point) -> usize {
    match vertices.iter().position(|v| v.approx_eq(p, JOIN_TOLERANCE)) {
        Some(i) => i,
        None => {
            vertices.push(p);
            vertices.len() - 1
        }
    }
}

/// Every face cycle of the planar graph formed by `edges`, walked with the
/// face on the left. Dangling edges are pruned first.
fn find_faces(edges: &[Segment]) -> Result<Vec<ArcRegion>> {
    let mut vertices: Vec<Point> = Vec::new();
    let ends: Vec<(usize, usize)> = edges
        .iter()
        .map(|e| {
            let a = vertex_index(&mut vertices, e.start());
            let b = vertex_index(&mut vertices, e.end());
            (a, b)
        })
        .collect();

    // Prune edges hanging off degree-one vertices until none remain.
    let mut alive: Vec<bool> = ends.iter().map(|(a, b)| a != b).collect();
    loop {
        let mut degree = vec![0usize; vertices.len()];
        for (i, (a, b)) in ends.iter().enumerate() {
            if alive[i] {
                degree[*a] += 1;
                degree[*b] += 1;
            }
        }
        let mut pruned = false;
        for (i, (a, b)) in ends.iter().enumerate() {
            if alive[i] && (degree[*a] < 2 || degree[*b] < 2) {
                alive[i] = false;
                pruned = true;
            }
        }
        if !pruned {
            break;
        }
    }

    let mut half_edges = Vec::new();
    for (i, (a, b)) in ends.iter().enumerate() {
        if alive[i] {
            half_edges.push(HalfEdge {
                edge: i,
                orientation: Orientation::Forward,
                from: *a,
                to: *b,
            });
            half_edges.push(HalfEdge {
                edge: i,
                orientation: Orientation::Backward,
                from: *b,
                to: *a,
            });
        }
    }

    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); vertices.len()];
    for (h, half) in half_edges.iter().enumerate() {
        outgoing[half.from].push(h);
    }

    // Leftmost turn keeps the face on the left of travel.
    let next_of = |h: usize| -> Option<usize> {
        let half = half_edges[h];
        let arrive = arriving_heading(&edges[half.edge], half.orientation);
        outgoing[half.to]
            .iter()
            .copied()
            .filter(|&g| !(half_edges[g].edge == half.edge && half_edges[g].to == half.from))
            .max_by(|&g1, &g2| {
                let turn = |g: usize| {
                    let e = half_edges[g];
                    signed_angle(leaving_heading(&edges[e.edge], e.orientation) - arrive)
                };
                turn(g1).total_cmp(&turn(g2))
            })
    };

    let mut visited = vec![false; half_edges.len()];
    let mut faces = Vec::new();
    for start in 0..half_edges.len() {
        if visited[start] {
            continue;
        }
        let mut segments = Vec::new();
        let mut orientations = Vec::new();
        let mut h = start;
        loop {
            if visited[h] {
                if h == start {
                    break;
                }
                return Err(BilliardError::SegmentsDoNotLineUp);
            }
            visited[h] = true;
            segments.push(edges[half_edges[h].edge]);
            orientations.push(half_edges[h].orientation);
            h = next_of(h).ok_or(BilliardError::SegmentsDoNotLineUp)?;
        }
        if segments.len() >= 2 {
            faces.push(ArcRegion::from_cycle(segments, orientations));
        }
    }
    Ok(faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_sides(counter_clockwise: bool) -> Vec<Segment> {
        let mut corners = vec![
            Point::new(-0.5, -0.5),
            Point::new(0.5, -0.5),
            Point::new(0.5, 0.5),
            Point::new(-0.5, 0.5),
        ];
        if !counter_clockwise {
            corners.reverse();
        }
        (0..4)
            .map(|i| Segment::line(corners[i], corners[(i + 1) % 4]).unwrap())
            .collect()
    }

    #[test]
    fn test_square_containment() {
        let region = ArcRegion::new(square_sides(true)).unwrap();
        assert!(region.contains_point(Point::new(0.0, 0.0)));
        assert!(!region.contains_point(Point::new(2.0, 2.0)));
        assert!(!region.contains_point(Point::new(0.5, 0.0))); // on boundary
    }

    #[test]
    fn test_orientation_is_canonicalized() {
        let ccw = ArcRegion::new(square_sides(true)).unwrap();
        let cw = ArcRegion::new(square_sides(false)).unwrap();
        assert!((ccw.total_turning() - 2.0 * PI).abs() < 1e-9);
        assert!((cw.total_turning() - 2.0 * PI).abs() < 1e-9);
        for i in -4..=4 {
            for j in -4..=4 {
                let p = Point::new(i as f64 * 0.3 + 0.01, j as f64 * 0.3 + 0.02);
                assert_eq!(ccw.contains_point(p), cw.contains_point(p));
            }
        }
    }

    #[test]
    fn test_shuffled_and_flipped_segments() {
        let mut sides = square_sides(true);
        sides.swap(1, 3);
        sides[2] = Segment::line(sides[2].end(), sides[2].start()).unwrap();
        let region = ArcRegion::new(sides).unwrap();
        assert!(region.contains_point(Point::new(0.1, -0.2)));
        assert!(region.orientations().contains(&Orientation::Backward));
        let corners = region.corners();
        assert_eq!(corners.len(), 4);
        for (a, b) in corners.iter().zip(corners.iter().cycle().skip(1)) {
            assert!((a.distance(*b) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_open_chain_rejected() {
        let mut sides = square_sides(true);
        sides.pop();
        assert!(matches!(
            ArcRegion::new(sides),
            Err(BilliardError::SegmentsDoNotLineUp)
        ));
    }

    #[test]
    fn test_half_disk_with_arc() {
        let arc = Segment::arc(Point::ZERO, 1.0, 0.0, PI).unwrap();
        let diameter = Segment::line(Point::new(-1.0, 0.0), Point::new(1.0, 0.0)).unwrap();
        let region = ArcRegion::new(vec![diameter, arc]).unwrap();
        assert!((region.total_turning() - 2.0 * PI).abs() < 1e-9);
        assert!(region.contains_point(Point::new(0.0, 0.9)));
        assert!(region.contains_point(Point::new(0.7, 0.1)));
        assert!(!region.contains_point(Point::new(0.0, -0.1)));
        assert!(!region.contains_point(Point::new(0.8, 0.8)));
    }

    #[test]
    fn test_shatter_by_diagonal() {
        let region = ArcRegion::new(square_sides(true)).unwrap();
        let diagonal = Segment::line(Point::new(-1.0, -1.0), Point::new(1.0, 1.0)).unwrap();
        let pieces = region.shatter(&[diagonal]).unwrap();
        assert_eq!(pieces.len(), 2);
        let below = Point::new(0.2, -0.2);
        let above = Point::new(-0.2, 0.2);
        assert_eq!(pieces.iter().filter(|r| r.contains_point(below)).count(), 1);
        assert_eq!(pieces.iter().filter(|r| r.contains_point(above)).count(), 1);
        for piece in &pieces {
            assert!(!(piece.contains_point(below) && piece.contains_point(above)));
        }
    }

    #[test]
    fn test_shatter_by_two_diagonals() {
        let region = ArcRegion::new(square_sides(true)).unwrap();
        let slices = [
            Segment::line(Point::new(-1.0, -1.0), Point::new(1.0, 1.0)).unwrap(),
            Segment::line(Point::new(-1.0, 1.0), Point::new(1.0, -1.0)).unwrap(),
        ];
        let pieces = region.shatter(&slices).unwrap();
        assert_eq!(pieces.len(), 4);
    }

    #[test]
    fn test_shatter_misses() {
        let region = ArcRegion::new(square_sides(true)).unwrap();
        let far = Segment::line(Point::new(2.0, -1.0), Point::new(2.0, 1.0)).unwrap();
        let pieces = region.shatter(&[far]).unwrap();
        assert_eq!(pieces.len(), 1);
        // A slice ending inside the region leaves it whole.
        let stub = Segment::line(Point::new(-1.0, 0.0), Point::new(0.0, 0.0)).unwrap();
        let pieces = region.shatter(&[stub]).unwrap();
        assert_eq!(pieces.len(), 1);
        assert!(pieces[0].contains_point(Point::new(0.2, 0.2)));
    }

    #[test]
    fn test_shatter_along_edge() {
        // Overlapping the bottom edge only touches the region at its corners.
        let region = ArcRegion::new(square_sides(true)).unwrap();
        let along = Segment::line(Point::new(-1.0, -0.5), Point::new(1.0, -0.5)).unwrap();
        let pieces = region.shatter(&[along]).unwrap();
        assert_eq!(pieces.len(), 1);
        assert!(pieces[0].contains_point(Point::new(0.1, -0.3)));
    }

    #[test]
    fn test_shatter_half_disk_by_arc() {
        let arc = Segment::arc(Point::ZERO, 1.0, 0.0, PI).unwrap();
        let diameter = Segment::line(Point::new(-1.0, 0.0), Point::new(1.0, 0.0)).unwrap();
        let region = ArcRegion::new(vec![diameter, arc]).unwrap();
        let inner = Segment::arc(Point::ZERO, 0.5, -0.5, PI + 0.5).unwrap();
        let pieces = region.shatter(&[inner]).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(
            pieces
                .iter()
                .filter(|r| r.contains_point(Point::new(0.0, 0.25)))
                .count(),
            1
        );
        assert_eq!(
            pieces
                .iter()
                .filter(|r| r.contains_point(Point::new(0.0, 0.75)))
                .count(),
            1
        );
    }
}
