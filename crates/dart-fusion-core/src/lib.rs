//! Core geometry and scoring tables for dart strike fusion.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any camera model or detection pipeline: everything here works
//! in the normalized board plane, where radius 1.0 is the outer edge of the
//! double ring.

mod angle;
mod line;
mod polar;
mod rings;
mod score;
mod segments;

pub use angle::{
    circular_diff, circular_mean, circular_spread, circular_std, normalize_angle,
};
pub use line::{intersect_lines, BoardLine};
pub use polar::PolarCoord;
pub use rings::{Ring, RingRadiiTable};
pub use score::{score_polar, ScoreOutcome, BULL_SEGMENT};
pub use segments::{SegmentAngleTable, SEGMENT_ORDER, WEDGE_COUNT};

/// Errors raised when a board calibration table fails validation.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("ring radii must be strictly increasing (index {index})")]
    RingRadiiNotIncreasing { index: usize },
    #[error("ring radius out of range: {radius}")]
    RingRadiusOutOfRange { radius: f64 },
    #[error("segment table needs {WEDGE_COUNT} boundaries, got {got}")]
    WrongBoundaryCount { got: usize },
    #[error("segment boundaries must increase with at most one wraparound ({wraps} found)")]
    BoundariesNotMonotonic { wraps: usize },
    #[error("segment-20 index {index} out of range")]
    Segment20IndexOutOfRange { index: usize },
}
