//! Circular angular refinement near wedge boundaries.
//!
//! Close to a wire the wedge call hinges on a fraction of a degree, and the
//! per-camera tip angles carry more information than the fused point alone.
//! This stage blends a confidence-weighted circular mean of the per-camera
//! thetas with the best-pair prior, but only under strict agreement and
//! non-regression gates: it refines the angle or leaves it alone, it never
//! destabilizes it. The radius is untouched.

use log::debug;

use dart_fusion_core::{
    circular_diff, circular_mean, circular_spread, circular_std, PolarCoord, SegmentAngleTable,
    WEDGE_COUNT,
};

use crate::candidate::CameraCandidate;
use crate::config::FusionConfig;
use crate::triangulate::residual_at;

#[derive(Clone, Copy, Debug)]
pub(crate) struct AngularRefinement {
    /// Final theta (refined or the input, depending on `applied`).
    pub theta: f64,
    pub applied: bool,
    /// Circular standard deviation of the per-camera thetas.
    pub sigma: f64,
}

fn kept(polar: PolarCoord, sigma: f64) -> AngularRefinement {
    AngularRefinement {
        theta: polar.theta,
        applied: false,
        sigma,
    }
}

/// Wedge adjacency on the 20-sector ring.
fn sectors_adjacent(a: usize, b: usize) -> bool {
    let d = (a as isize - b as isize).rem_euclid(WEDGE_COUNT as isize);
    d <= 1 || d == WEDGE_COUNT as isize - 1
}

/// Refine the angular coordinate of `polar`.
///
/// `prior_theta` is the best-pair angle (the Bayesian-style prior),
/// `weighted_theta` the confidence-weighted fusion angle used as the
/// non-regression anchor. `weights` are the cameras that contributed to the
/// fusion, used both for the circular mean and for residual evaluation.
pub(crate) fn refine_theta(
    polar: PolarCoord,
    prior_theta: f64,
    weighted_theta: f64,
    candidates: &[CameraCandidate],
    weights: &[(usize, f64)],
    segments: &SegmentAngleTable,
    cfg: &FusionConfig,
) -> AngularRefinement {
    let cam_thetas: Vec<f64> = weights
        .iter()
        .map(|&(i, _)| candidates[i].tip_polar().theta)
        .collect();
    let sigma = circular_std(&cam_thetas);

    if !cfg.enable_angular_refine {
        return kept(polar, sigma);
    }
    if segments.boundary_distance(polar.theta) > cfg.near_wedge_band_deg.to_radians() {
        return kept(polar, sigma);
    }
    if weights.len() < cfg.refine_min_cameras {
        return kept(polar, sigma);
    }

    let spread = circular_spread(&cam_thetas);
    let max_spread = cfg.refine_max_spread_deg.to_radians();
    if spread > max_spread {
        debug!(
            "angular refine skipped: camera spread {:.2} deg over limit",
            spread.to_degrees()
        );
        return kept(polar, sigma);
    }

    // Confidence-weighted circular mean with the prior folded in at a fixed
    // fraction of the total mass.
    let total_conf: f64 = weights.iter().map(|&(i, _)| candidates[i].confidence).sum();
    let mut samples: Vec<(f64, f64)> = weights
        .iter()
        .map(|&(i, _)| {
            (
                candidates[i].tip_polar().theta,
                candidates[i].confidence * (1.0 - cfg.refine_prior_weight),
            )
        })
        .collect();
    samples.push((prior_theta, cfg.refine_prior_weight * total_conf));
    let Some(fused) = circular_mean(&samples) else {
        return kept(polar, sigma);
    };

    // Gate: the refined angle must stay close to the weighted fusion angle.
    if circular_diff(fused, weighted_theta).abs() > cfg.refine_max_delta_deg.to_radians() {
        debug!("angular refine rejected: delta from weighted theta over limit");
        return kept(polar, sigma);
    }

    // Gate: no residual regression beyond the allowed ratio, unless every
    // supporting condition for a soft worsening holds at once.
    let fused_residual = residual_at(&polar.with_theta(fused).to_cartesian(), candidates, weights);
    let prior_residual =
        residual_at(&polar.with_theta(prior_theta).to_cartesian(), candidates, weights);
    if fused_residual > prior_residual * cfg.refine_residual_ratio {
        let adjacent = sectors_adjacent(segments.sector_at(fused), segments.sector_at(polar.theta));
        let supported = cam_thetas
            .iter()
            .all(|&t| circular_diff(t, fused).abs() <= max_spread * 0.5);
        if !(adjacent && supported) {
            debug!(
                "angular refine rejected: residual {:.5} vs prior {:.5}",
                fused_residual, prior_residual
            );
            return kept(polar, sigma);
        }
    }

    AngularRefinement {
        theta: fused,
        applied: true,
        sigma,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    fn deg(d: f64) -> f64 {
        d.to_radians()
    }

    /// Camera whose tip sits at polar (r, theta) aiming inward.
    fn cand_at(id: &str, r: f64, theta: f64, confidence: f64) -> CameraCandidate {
        let tip = PolarCoord::new(r, theta).to_cartesian();
        CameraCandidate {
            camera_id: id.into(),
            tip,
            axis: Vector2::new(-tip.x, -tip.y),
            confidence,
            wire_side_hint: None,
            barrel_pixel_support: 100,
        }
    }

    fn segments() -> SegmentAngleTable {
        SegmentAngleTable::standard()
    }

    #[test]
    fn far_from_boundary_is_untouched() {
        let cands = vec![
            cand_at("cam0", 0.6, deg(90.0), 0.9),
            cand_at("cam1", 0.6, deg(91.0), 0.9),
        ];
        let weights = vec![(0, 0.9), (1, 0.9)];
        let polar = PolarCoord::new(0.6, deg(90.0));
        let r = refine_theta(
            polar,
            deg(90.5),
            deg(90.0),
            &cands,
            &weights,
            &segments(),
            &FusionConfig::default(),
        );
        assert!(!r.applied);
        assert_eq!(r.theta, polar.theta);
    }

    #[test]
    fn near_boundary_agreement_refines() {
        // Boundary at 81 deg; cameras cluster just above it.
        let cands = vec![
            cand_at("cam0", 0.6, deg(81.6), 0.9),
            cand_at("cam1", 0.6, deg(82.0), 0.9),
            cand_at("cam2", 0.6, deg(81.8), 0.9),
        ];
        let weights = vec![(0, 0.9), (1, 0.9), (2, 0.9)];
        let polar = PolarCoord::new(0.6, deg(82.2));
        let r = refine_theta(
            polar,
            deg(81.9),
            deg(82.2),
            &cands,
            &weights,
            &segments(),
            &FusionConfig::default(),
        );
        assert!(r.applied);
        // Refined theta sits inside the camera cluster, pulled toward it.
        assert!(r.theta > deg(81.5) && r.theta < deg(82.2));
    }

    #[test]
    fn wide_spread_blocks_refinement() {
        let cands = vec![
            cand_at("cam0", 0.6, deg(78.0), 0.9),
            cand_at("cam1", 0.6, deg(86.0), 0.9),
        ];
        let weights = vec![(0, 0.9), (1, 0.9)];
        let polar = PolarCoord::new(0.6, deg(81.5));
        let r = refine_theta(
            polar,
            deg(81.0),
            deg(81.5),
            &cands,
            &weights,
            &segments(),
            &FusionConfig::default(),
        );
        assert!(!r.applied);
    }

    #[test]
    fn single_camera_is_not_enough() {
        let cands = vec![cand_at("cam0", 0.6, deg(81.2), 0.9)];
        let weights = vec![(0, 0.9)];
        let polar = PolarCoord::new(0.6, deg(81.2));
        let r = refine_theta(
            polar,
            deg(81.2),
            deg(81.2),
            &cands,
            &weights,
            &segments(),
            &FusionConfig::default(),
        );
        assert!(!r.applied);
    }

    #[test]
    fn sigma_reflects_camera_scatter() {
        let cands = vec![
            cand_at("cam0", 0.6, deg(80.0), 0.9),
            cand_at("cam1", 0.6, deg(84.0), 0.9),
        ];
        let weights = vec![(0, 0.9), (1, 0.9)];
        let polar = PolarCoord::new(0.6, deg(82.0));
        let r = refine_theta(
            polar,
            deg(82.0),
            deg(82.0),
            &cands,
            &weights,
            &segments(),
            &FusionConfig::default(),
        );
        assert!(r.sigma > deg(1.0));
    }

    #[test]
    fn residual_regression_without_support_is_rejected() {
        // Both camera lines pass exactly through the prior point, so the
        // prior residual is zero and any angular move is a regression. One
        // camera theta sits too far from the fused angle for the soft
        // worsening exception, so the refinement must be discarded.
        let prior = PolarCoord::new(0.8, deg(81.05));
        let prior_point = prior.to_cartesian();
        let mk = |id: &str, tip_theta: f64| {
            let tip = PolarCoord::new(0.7, deg(tip_theta)).to_cartesian();
            CameraCandidate {
                camera_id: id.into(),
                tip,
                axis: prior_point - tip,
                confidence: 0.9,
                wire_side_hint: None,
                barrel_pixel_support: 100,
            }
        };
        let cands = vec![mk("cam0", 85.0), mk("cam1", 89.5)];
        let weights = vec![(0, 0.9), (1, 0.9)];
        let polar = PolarCoord::new(0.8, deg(81.0));
        let r = refine_theta(
            polar,
            prior.theta,
            deg(81.0),
            &cands,
            &weights,
            &segments(),
            &FusionConfig::default(),
        );
        assert!(!r.applied);
        assert_eq!(r.theta, polar.theta);
    }

    #[test]
    fn adjacency_wraps_the_ring() {
        assert!(sectors_adjacent(0, 19));
        assert!(sectors_adjacent(19, 0));
        assert!(sectors_adjacent(7, 8));
        assert!(!sectors_adjacent(3, 10));
    }
}
