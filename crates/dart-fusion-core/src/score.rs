use serde::{Deserialize, Serialize};

use crate::polar::PolarCoord;
use crate::rings::{Ring, RingRadiiTable};
use crate::segments::SegmentAngleTable;

/// Segment value reported for both bull rings.
pub const BULL_SEGMENT: u8 = 25;

/// Scored landing zone for one board-plane point.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    /// 1..=20 for a wedge, 25 for the bull, 0 for a miss.
    pub segment: u8,
    pub ring: Ring,
    pub multiplier: u8,
    pub score: u32,
}

impl ScoreOutcome {
    /// The no-detection outcome.
    pub fn miss() -> Self {
        Self {
            segment: 0,
            ring: Ring::Miss,
            multiplier: 0,
            score: 0,
        }
    }

    #[inline]
    pub fn is_miss(&self) -> bool {
        self.ring == Ring::Miss
    }

    /// Replace the segment, keeping ring and multiplier; used by wire
    /// adjudication which may only move a dart sideways into the adjacent
    /// wedge, never across a ring.
    pub fn with_segment(self, segment: u8) -> Self {
        Self {
            segment,
            score: u32::from(segment) * u32::from(self.multiplier),
            ..self
        }
    }
}

/// Map a polar landing position to its scored outcome.
///
/// Ring lookup walks the radii table from the center outward; the segment
/// comes from the calibrated wedge table. Bull rings ignore the angular
/// sector entirely and report segment 25, so the uniform
/// `segment * multiplier` rule yields the usual 50/25 points.
pub fn score_polar(
    polar: PolarCoord,
    rings: &RingRadiiTable,
    segments: &SegmentAngleTable,
    over_factor: f64,
) -> ScoreOutcome {
    let ring = rings.ring_at(polar.radius, over_factor);
    let (segment, multiplier) = match ring {
        Ring::Miss => (0, 0),
        Ring::BullInner => (BULL_SEGMENT, 2),
        Ring::BullOuter => (BULL_SEGMENT, 1),
        _ => (segments.segment_at(polar.theta), ring.multiplier()),
    };
    ScoreOutcome {
        segment,
        ring,
        multiplier,
        score: u32::from(segment) * u32::from(multiplier),
    }
}
