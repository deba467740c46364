use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use dart_fusion_core::{BoardLine, PolarCoord};

/// Wire-occlusion side hint derived externally from barrel-edge asymmetry:
/// the side with the sharper intensity dropoff is occluded by the wire.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct WireSideHint {
    /// Board-plane angle (radians) pointing from the dart toward the wire.
    pub toward: f64,
    /// Hint confidence in `[0, 1]`.
    pub confidence: f64,
}

/// One camera's hypothesis for a single dart, in board-plane coordinates.
///
/// Produced once per camera per dart by the external detector and immutable
/// afterwards; the fusion call owns the slice for its duration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CameraCandidate {
    pub camera_id: String,
    /// Warped tip position.
    pub tip: Point2<f64>,
    /// Warped barrel axis, pointing from barrel toward tip.
    pub axis: Vector2<f64>,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(default)]
    pub wire_side_hint: Option<WireSideHint>,
    /// Number of barrel pixels supporting the axis fit.
    #[serde(default)]
    pub barrel_pixel_support: u32,
}

impl CameraCandidate {
    /// The infinite board-plane line through the tip along the axis.
    /// `None` when the detector handed over a degenerate axis.
    pub fn line(&self) -> Option<BoardLine> {
        BoardLine::new(self.tip, self.axis)
    }

    /// Polar position of the tip.
    #[inline]
    pub fn tip_polar(&self) -> PolarCoord {
        PolarCoord::from_cartesian(&self.tip)
    }
}
