//! Inner Billiards
//!
//! A ball travels along chords of the table and reflects off the boundary
//! with equal angles. A state is a chord, stored as the two boundary
//! parameters it joins.

use crate::error::{BilliardError, Result};
use crate::table::Table;
use crate::{normalize_angle, Point};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// Coordinates used to read and write a state's second phase-space component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseMode {
    /// Angle in (0, π) between the tangent at the start and the chord
    #[default]
    Angle,
    /// Boundary parameter of the chord's end
    Time,
}

/// A chord of the table from `point(start_time)` to `point(end_time)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InnerState {
    pub start_time: f64,
    pub end_time: f64,
}

impl InnerState {
    /// Both parameters are reduced to [0, 1).
    pub fn new(start_time: f64, end_time: f64) -> Self {
        Self {
            start_time: start_time.rem_euclid(1.0),
            end_time: end_time.rem_euclid(1.0),
        }
    }

    /// Build a state from a phase-space coordinate pair.
    pub fn from_phase(table: &dyn Table, t: f64, value: f64, mode: PhaseMode) -> Result<Self> {
        let end_time = match mode {
            PhaseMode::Time => value,
            PhaseMode::Angle => {
                if !(value > 0.0 && value < std::f64::consts::PI) {
                    return Err(BilliardError::Config(format!(
                        "launch angle must lie strictly between 0 and π, got {}",
                        value
                    )));
                }
                table.intersect(t, table.tangent_heading(t) + value)?
            }
        };
        Ok(Self::new(t, end_time))
    }

    /// The state's phase-space coordinates in the given mode.
    pub fn phase(&self, table: &dyn Table, mode: PhaseMode) -> (f64, f64) {
        match mode {
            PhaseMode::Time => (self.start_time, self.end_time),
            PhaseMode::Angle => {
                let (a, b) = self.chord(table);
                let angle =
                    normalize_angle((b - a).heading() - table.tangent_heading(self.start_time));
                (self.start_time, angle)
            }
        }
    }

    pub fn chord(&self, table: &dyn Table) -> (Point, Point) {
        (table.point(self.start_time), table.point(self.end_time))
    }

    /// The same chord travelled the other way.
    pub fn reversed(&self) -> Self {
        Self {
            start_time: self.end_time,
            end_time: self.start_time,
        }
    }
}

/// Inner billiard map on a convex table
#[derive(Debug, Clone)]
pub struct InnerBilliard {
    table: Arc<dyn Table>,
    phase_mode: PhaseMode,
}

impl InnerBilliard {
    pub fn new(table: Arc<dyn Table>, phase_mode: PhaseMode) -> Self {
        Self { table, phase_mode }
    }

    pub fn table(&self) -> &dyn Table {
        self.table.as_ref()
    }

    pub fn phase_mode(&self) -> PhaseMode {
        self.phase_mode
    }

    /// Reflect at the end of the chord and follow the new chord to the boundary.
    pub fn next(&self, state: &InnerState) -> Result<InnerState> {
        let table = self.table.as_ref();
        let exit = table.point(state.end_time);
        if table.is_corner(state.end_time) {
            return Err(BilliardError::PointOnVertex(exit));
        }

        let incoming = exit - table.point(state.start_time);
        if incoming.modulus() < crate::EPSILON {
            return Err(BilliardError::DegenerateSegment(exit));
        }
        let tangent = table.tangent(state.end_time).normalized();
        let outgoing = tangent.scale(2.0 * incoming.dot(tangent)) - incoming;

        let end_time = table.intersect(state.end_time, outgoing.heading())?;
        if table.is_corner(end_time) {
            return Err(BilliardError::PointOnVertex(table.point(end_time)));
        }
        trace!(from = state.end_time, to = end_time, "inner reflection");
        Ok(InnerState::new(state.end_time, end_time))
    }

    /// Inverse of [`InnerBilliard::next`], by time reversal.
    pub fn previous(&self, state: &InnerState) -> Result<InnerState> {
        Ok(self.next(&state.reversed())?.reversed())
    }

    pub fn from_phase(&self, t: f64, value: f64) -> Result<InnerState> {
        InnerState::from_phase(self.table.as_ref(), t, value, self.phase_mode)
    }

    pub fn phase(&self, state: &InnerState) -> (f64, f64) {
        state.phase(self.table.as_ref(), self.phase_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Ellipse, LpCircle, Polygon};
    use std::f64::consts::PI;

    fn circle() -> InnerBilliard {
        InnerBilliard::new(Arc::new(LpCircle::new(2.0).unwrap()), PhaseMode::Time)
    }

    #[test]
    fn test_diameter_is_period_two() {
        let billiard = circle();
        let mut state = InnerState::new(0.25, 0.75);
        for _ in 0..20 {
            state = billiard.next(&state).unwrap();
            let (a, b) = state.chord(billiard.table());
            assert!((a + b).modulus() < 1e-6, "chord stopped being a diameter");
        }
    }

    #[test]
    fn test_circle_rotation_number() {
        // A chord spanning a third of the circle advances by a third each bounce.
        let billiard = circle();
        let state = InnerState::new(0.0, 1.0 / 3.0);
        let next = billiard.next(&state).unwrap();
        assert!((next.start_time - 1.0 / 3.0).abs() < 1e-9);
        assert!((next.end_time - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_reflection_law_on_ellipse() {
        let table = Arc::new(Ellipse::new(2.0, 1.0).unwrap());
        let billiard = InnerBilliard::new(table.clone(), PhaseMode::Time);
        let state = InnerState::new(0.1, 0.55);
        let next = billiard.next(&state).unwrap();

        let hit = table.point(state.end_time);
        let tangent = table.tangent(state.end_time).normalized();
        let incoming = (hit - table.point(state.start_time)).normalized();
        let outgoing = (table.point(next.end_time) - hit).normalized();
        // Equal angles with the tangent, on opposite sides of the normal.
        assert!((incoming.dot(tangent) - outgoing.dot(tangent)).abs() < 1e-6);
        assert!((incoming.cross(tangent) + outgoing.cross(tangent)).abs() < 1e-6);
    }

    #[test]
    fn test_previous_undoes_next() {
        let table = Arc::new(Ellipse::new(1.5, 1.0).unwrap());
        let billiard = InnerBilliard::new(table, PhaseMode::Time);
        let state = InnerState::new(0.05, 0.4);
        let back = billiard.previous(&billiard.next(&state).unwrap()).unwrap();
        assert!((back.start_time - state.start_time).abs() < 1e-6);
        assert!((back.end_time - state.end_time).abs() < 1e-6);
    }

    #[test]
    fn test_phase_angle_round_trip() {
        let table = LpCircle::new(2.0).unwrap();
        let state = InnerState::from_phase(&table, 0.0, PI / 2.0, PhaseMode::Angle).unwrap();
        assert!((state.end_time - 0.5).abs() < 1e-9);
        let (t, angle) = state.phase(&table, PhaseMode::Angle);
        assert_eq!(t, 0.0);
        assert!((angle - PI / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_phase_angle_out_of_range() {
        let table = LpCircle::new(2.0).unwrap();
        assert!(InnerState::from_phase(&table, 0.0, PI, PhaseMode::Angle).is_err());
        assert!(InnerState::from_phase(&table, 0.0, -0.1, PhaseMode::Angle).is_err());
    }

    #[test]
    fn test_polygon_corner_exit() {
        let square = Polygon::regular(4, 1.0, PI / 4.0).unwrap();
        let billiard = InnerBilliard::new(Arc::new(square), PhaseMode::Time);
        // Chord ending exactly on the second vertex.
        let state = InnerState::new(0.125, 0.25);
        assert!(matches!(
            billiard.next(&state),
            Err(BilliardError::PointOnVertex(_))
        ));
    }

    #[test]
    fn test_polygon_bounce() {
        let square = Polygon::regular(4, 1.0, PI / 4.0).unwrap();
        let billiard = InnerBilliard::new(Arc::new(square), PhaseMode::Time);
        // Midpoint of the right edge to midpoint of the top edge and onwards
        // traces the inscribed diamond.
        let mut state = InnerState::new(0.125, 0.375);
        for _ in 0..4 {
            state = billiard.next(&state).unwrap();
            let frac = (state.end_time * 8.0).rem_euclid(2.0);
            assert!((frac - 1.0).abs() < 1e-6);
        }
    }
}
