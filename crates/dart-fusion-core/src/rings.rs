use serde::{Deserialize, Serialize};

use crate::CalibrationError;

/// Concentric scoring zones, from the center outward.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ring {
    BullInner,
    BullOuter,
    SingleInner,
    Triple,
    SingleOuter,
    Double,
    Miss,
}

impl Ring {
    /// Scoring multiplier for the ring (0 for a miss).
    pub fn multiplier(self) -> u8 {
        match self {
            Ring::BullInner | Ring::Double => 2,
            Ring::Triple => 3,
            Ring::Miss => 0,
            _ => 1,
        }
    }
}

/// The six calibrated ring boundary radii in normalized board units,
/// ordered from the center outward:
/// bull-inner, bull-outer, triple-inner, triple-outer, double-inner,
/// double-outer. Strictly increasing; the outermost is 1.0 by construction
/// of the normalized frame, but any calibrated value is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RingRadiiTable {
    radii: [f64; 6],
}

// Regulation measurements in mm, wire width folded into each boundary so a
// dart resting on the wire scores the higher-value side.
const BULL_INNER_MM: f64 = 7.75;
const BULL_OUTER_MM: f64 = 17.4;
const TRIPLE_INNER_MM: f64 = 97.6;
const TRIPLE_OUTER_MM: f64 = 108.4;
const DOUBLE_INNER_MM: f64 = 160.6;
const DOUBLE_OUTER_MM: f64 = 171.4;

impl RingRadiiTable {
    /// Validate and build a table from six ascending radii.
    pub fn new(radii: [f64; 6]) -> Result<Self, CalibrationError> {
        for (index, pair) in radii.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(CalibrationError::RingRadiiNotIncreasing { index });
            }
        }
        for &radius in &radii {
            if !(radius > 0.0 && radius.is_finite() && radius <= 1.5) {
                return Err(CalibrationError::RingRadiusOutOfRange { radius });
            }
        }
        Ok(Self { radii })
    }

    /// Table for a regulation board.
    pub fn standard() -> Self {
        Self {
            radii: [
                BULL_INNER_MM / DOUBLE_OUTER_MM,
                BULL_OUTER_MM / DOUBLE_OUTER_MM,
                TRIPLE_INNER_MM / DOUBLE_OUTER_MM,
                TRIPLE_OUTER_MM / DOUBLE_OUTER_MM,
                DOUBLE_INNER_MM / DOUBLE_OUTER_MM,
                1.0,
            ],
        }
    }

    #[inline]
    pub fn radii(&self) -> &[f64; 6] {
        &self.radii
    }

    #[inline]
    pub fn double_outer(&self) -> f64 {
        self.radii[5]
    }

    /// Ring containing `radius`. Radii beyond `double_outer * over_factor`
    /// are off the board.
    pub fn ring_at(&self, radius: f64, over_factor: f64) -> Ring {
        let [bull_in, bull_out, triple_in, triple_out, double_in, double_out] = self.radii;
        if radius <= bull_in {
            Ring::BullInner
        } else if radius <= bull_out {
            Ring::BullOuter
        } else if radius < triple_in {
            Ring::SingleInner
        } else if radius <= triple_out {
            Ring::Triple
        } else if radius < double_in {
            Ring::SingleOuter
        } else if radius <= double_out * over_factor {
            Ring::Double
        } else {
            Ring::Miss
        }
    }

    /// Distance from `radius` to the nearest ring boundary.
    pub fn nearest_boundary_distance(&self, radius: f64) -> f64 {
        self.radii
            .iter()
            .map(|r| (radius - r).abs())
            .fold(f64::INFINITY, f64::min)
    }

    /// True when `radius` lies within `epsilon` of any ring boundary.
    #[inline]
    pub fn near_boundary(&self, radius: f64, epsilon: f64) -> bool {
        self.nearest_boundary_distance(radius) <= epsilon
    }
}
