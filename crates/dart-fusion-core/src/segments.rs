use serde::{Deserialize, Serialize};

use crate::angle::{circular_diff, normalize_angle};
use crate::CalibrationError;

/// Number of angular wedges on the board.
pub const WEDGE_COUNT: usize = 20;

/// Segment values clockwise from 20 at the top of the board.
pub const SEGMENT_ORDER: [u8; WEDGE_COUNT] = [
    20, 1, 18, 4, 13, 6, 10, 15, 2, 17, 3, 19, 7, 16, 8, 11, 14, 9, 12, 5,
];

/// Calibrated wedge boundaries for one board.
///
/// `boundaries[i]` is the lower (counter-clockwise ascending) edge of sector
/// `i`; sector `i` spans `[boundaries[i], boundaries[i+1])` circularly.
/// The list comes from per-board calibration, so it is validated rather than
/// assumed regular: ascending with at most one wraparound past 2π.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentAngleTable {
    boundaries: [f64; WEDGE_COUNT],
    segment_20_index: usize,
}

impl SegmentAngleTable {
    pub fn new(
        boundaries: Vec<f64>,
        segment_20_index: usize,
    ) -> Result<Self, CalibrationError> {
        let got = boundaries.len();
        let boundaries: [f64; WEDGE_COUNT] = boundaries
            .try_into()
            .map_err(|_| CalibrationError::WrongBoundaryCount { got })?;
        if segment_20_index >= WEDGE_COUNT {
            return Err(CalibrationError::Segment20IndexOutOfRange {
                index: segment_20_index,
            });
        }

        let normalized = boundaries.map(normalize_angle);
        let wraps = normalized
            .windows(2)
            .filter(|pair| pair[1] <= pair[0])
            .count();
        if wraps > 1 {
            return Err(CalibrationError::BoundariesNotMonotonic { wraps });
        }

        Ok(Self {
            boundaries: normalized,
            segment_20_index,
        })
    }

    /// Regular table with the 20-wedge centered at the top (π/2), i.e.
    /// boundaries offset 9° to either side of each wedge center.
    pub fn standard() -> Self {
        let start = 81.0_f64.to_radians();
        let step = 18.0_f64.to_radians();
        let mut boundaries = [0.0; WEDGE_COUNT];
        for (i, b) in boundaries.iter_mut().enumerate() {
            *b = normalize_angle(start + step * i as f64);
        }
        Self {
            boundaries,
            segment_20_index: 0,
        }
    }

    #[inline]
    pub fn boundaries(&self) -> &[f64; WEDGE_COUNT] {
        &self.boundaries
    }

    /// Sector index containing `theta` (circular containment).
    pub fn sector_at(&self, theta: f64) -> usize {
        let theta = normalize_angle(theta);
        for i in 0..WEDGE_COUNT {
            let lo = self.boundaries[i];
            let hi = self.boundaries[(i + 1) % WEDGE_COUNT];
            let inside = if lo <= hi {
                theta >= lo && theta < hi
            } else {
                theta >= lo || theta < hi
            };
            if inside {
                return i;
            }
        }
        // Numerically unreachable for a validated table; pin to the last
        // sector rather than panic on a boundary-exact float.
        log::warn!("no sector contained theta {theta}");
        WEDGE_COUNT - 1
    }

    /// Segment value of a sector index.
    ///
    /// Boundaries ascend counter-clockwise while the physical segment order
    /// runs clockwise, so the counter-clockwise step count from the 20-wedge
    /// indexes `SEGMENT_ORDER` backwards.
    pub fn segment_of_sector(&self, sector: usize) -> u8 {
        let steps =
            (self.segment_20_index as isize - sector as isize).rem_euclid(WEDGE_COUNT as isize);
        SEGMENT_ORDER[steps as usize]
    }

    /// Segment value at `theta`.
    pub fn segment_at(&self, theta: f64) -> u8 {
        self.segment_of_sector(self.sector_at(theta))
    }

    /// Nearest wedge boundary to `theta`: `(boundary_index, signed_diff)`
    /// where `signed_diff = circular_diff(theta, boundary)` (positive when
    /// `theta` is on the counter-clockwise side).
    pub fn nearest_boundary(&self, theta: f64) -> (usize, f64) {
        let mut best = (0, f64::INFINITY);
        for (i, &b) in self.boundaries.iter().enumerate() {
            let d = circular_diff(theta, b);
            if d.abs() < best.1.abs() {
                best = (i, d);
            }
        }
        best
    }

    /// Absolute angular distance from `theta` to the nearest wedge boundary.
    #[inline]
    pub fn boundary_distance(&self, theta: f64) -> f64 {
        self.nearest_boundary(theta).1.abs()
    }

    /// The sectors separated by boundary `i`: `(clockwise, counter_clockwise)`
    /// i.e. the sector just below the boundary and the one just above it.
    pub fn sectors_at_boundary(&self, boundary: usize) -> (usize, usize) {
        (
            (boundary + WEDGE_COUNT - 1) % WEDGE_COUNT,
            boundary % WEDGE_COUNT,
        )
    }
}
