//! Radial stability clamp.
//!
//! Weighted fusion can destabilize the radial coordinate exactly where it
//! matters most: near a ring boundary a 1-2% radial shift flips the
//! multiplier. When the weighted and best-pair radii disagree beyond a
//! threshold while the point sits inside the epsilon band of any ring
//! boundary, the clamp falls back to (or blends with) the best pair.

use log::debug;
use nalgebra::Point2;

use dart_fusion_core::{PolarCoord, RingRadiiTable};

use crate::config::{ClampMode, FusionConfig};
use crate::engine::FusionMethod;
use crate::triangulate::PairIntersection;

#[derive(Clone, Debug)]
pub(crate) struct ClampDecision {
    pub point: Point2<f64>,
    pub method: FusionMethod,
    pub applied: bool,
    pub radius_delta: f64,
}

/// Resolve the weighted point against the best pair.
///
/// `suppress` is set when board-edge miss evidence is present and the
/// configuration says a would-be miss must not be clamped back onto the
/// board.
pub(crate) fn radial_clamp(
    weighted: &Point2<f64>,
    best_pair: &PairIntersection,
    rings: &RingRadiiTable,
    cfg: &FusionConfig,
    suppress: bool,
) -> ClampDecision {
    let weighted_polar = PolarCoord::from_cartesian(weighted);
    let pair_radius = best_pair.point.coords.norm();
    let radius_delta = (weighted_polar.radius - pair_radius).abs();

    let keep = ClampDecision {
        point: *weighted,
        method: FusionMethod::Weighted,
        applied: false,
        radius_delta,
    };

    if !cfg.enable_radial_clamp || suppress {
        return keep;
    }
    if radius_delta <= cfg.clamp_radius_delta {
        return keep;
    }
    if !rings.near_boundary(weighted_polar.radius, cfg.ring_epsilon) {
        return keep;
    }

    debug!(
        "radial clamp: delta {radius_delta:.4} near ring boundary, mode {:?}",
        cfg.clamp_mode
    );
    match cfg.clamp_mode {
        ClampMode::BestPair => ClampDecision {
            point: best_pair.point,
            method: FusionMethod::ClampedBestPair,
            applied: true,
            radius_delta,
        },
        ClampMode::Hybrid => {
            let blended = 0.5 * (weighted_polar.radius + pair_radius);
            ClampDecision {
                point: PolarCoord::new(blended, weighted_polar.theta).to_cartesian(),
                method: FusionMethod::HybridClamp,
                applied: true,
                radius_delta,
            }
        }
    }
}
