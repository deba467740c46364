//! Wire-boundary adjudication.
//!
//! A dart whose angle falls within a fraction of a degree of a wedge wire
//! cannot be assigned by geometry alone: the triangulated angle is inside
//! the measurement noise. The external detector supplies per-camera
//! occlusion hints (the barrel edge facing the wire shows the sharper
//! intensity dropoff), and this stage turns them into a weighted side vote.
//! Only the segment number may change; radius, ring and multiplier are
//! untouchable here, and ties keep the side the geometry already implied.

use std::f64::consts::FRAC_PI_2;

use log::debug;

use dart_fusion_core::{circular_diff, PolarCoord, Ring, ScoreOutcome, SegmentAngleTable};

use crate::candidate::CameraCandidate;
use crate::config::FusionConfig;

#[derive(Clone, Copy, Debug)]
pub(crate) struct WireDecision {
    pub outcome: ScoreOutcome,
    /// Boundary proximity put the dart inside the outer hysteresis band.
    pub considered: bool,
    /// The segment was changed by the vote.
    pub changed: bool,
}

/// Adjudicate the segment assignment of `outcome` at `polar` using the
/// wire-side hints of the contributing cameras.
pub(crate) fn adjudicate_segment(
    outcome: ScoreOutcome,
    polar: PolarCoord,
    candidates: &[CameraCandidate],
    contributing: &[usize],
    segments: &SegmentAngleTable,
    cfg: &FusionConfig,
) -> WireDecision {
    let unchanged = WireDecision {
        outcome,
        considered: false,
        changed: false,
    };

    if !cfg.enable_wire_adjudication
        || outcome.is_miss()
        || matches!(outcome.ring, Ring::BullInner | Ring::BullOuter)
    {
        return unchanged;
    }

    let (boundary, signed) = segments.nearest_boundary(polar.theta);
    if signed.abs() > cfg.wire_outer_band_deg.to_radians() {
        return unchanged;
    }

    // Between the outer and inner bands the geometry still decides; the
    // hysteresis only opens the vote inside the hard zone.
    if signed.abs() > cfg.wire_inner_band_deg.to_radians() {
        return WireDecision {
            considered: true,
            ..unchanged
        };
    }

    // Side votes. A hint points from the dart toward the wire; comparing it
    // with the local counter-clockwise tangent tells whether the wire sits
    // at greater theta, which puts the dart on the clockwise side of it.
    let ccw_tangent = polar.theta + FRAC_PI_2;
    let mut ccw_weight = 0.0;
    let mut cw_weight = 0.0;
    for &i in contributing {
        let Some(hint) = candidates[i].wire_side_hint else {
            continue;
        };
        if hint.confidence <= 0.0 {
            continue;
        }
        let wire_is_ccw = circular_diff(hint.toward, ccw_tangent).abs() < FRAC_PI_2;
        if wire_is_ccw {
            cw_weight += hint.confidence;
        } else {
            ccw_weight += hint.confidence;
        }
    }

    let geometric_ccw = signed >= 0.0;
    let voted_ccw = if (ccw_weight - cw_weight).abs() < 1e-9 {
        geometric_ccw
    } else {
        ccw_weight > cw_weight
    };

    let (cw_sector, ccw_sector) = segments.sectors_at_boundary(boundary);
    let sector = if voted_ccw { ccw_sector } else { cw_sector };
    let segment = segments.segment_of_sector(sector);

    if segment == outcome.segment {
        return WireDecision {
            considered: true,
            ..unchanged
        };
    }

    debug!(
        "wire adjudication: segment {} -> {} at boundary {}",
        outcome.segment, segment, boundary
    );
    WireDecision {
        outcome: outcome.with_segment(segment),
        considered: true,
        changed: true,
    }
}
