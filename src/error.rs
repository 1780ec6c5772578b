//! Error taxonomy for the billiard engine
//!
//! Every failure is surfaced to the immediate caller. Orbit loops catch these
//! and stop early, keeping whatever was computed before the failure.

use crate::Point;
use thiserror::Error;

/// Billiard engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BilliardError {
    #[error("Degenerate segment: endpoints coincide at {0}")]
    DegenerateSegment(Point),

    #[error("No intersection: {0}")]
    NoIntersection(String),

    #[error("Ray passes through a table vertex at {0}")]
    PointOnVertex(Point),

    #[error("Point {0} lies inside the table")]
    PointInsideTable(Point),

    #[error("Bad parametrization: {0}")]
    BadParametrization(String),

    #[error("Bisection did not converge (best parameter {best})")]
    DidNotConverge { best: f64 },

    #[error("No forward transformation for {0}")]
    NoForwardTransformation(Point),

    #[error("No inverse transformation for {0}")]
    NoInverseTransformation(Point),

    #[error("Segments do not line up into a single cycle")]
    SegmentsDoNotLineUp,

    #[error("Unexpected intersection count: {0}")]
    UnexpectedIntersectionCount(usize),

    #[error("Singular Möbius transformation (ad - bc = 0)")]
    SingularTransformation,

    #[error("Point {0} is not strictly inside the unit disk")]
    PointOutsideDisk(Point),

    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("Worker pool has shut down")]
    WorkerClosed,

    #[error("Request {0} is already in flight")]
    DuplicateRequest(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BilliardError {
    fn from(e: std::io::Error) -> Self {
        BilliardError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for BilliardError {
    fn from(e: serde_json::Error) -> Self {
        BilliardError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BilliardError>;
