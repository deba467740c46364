//! Recovery paths for darts the primary cascade would report as missed.
//!
//! Soft accept runs first: it retries the pairwise triangulation with a
//! lower per-camera confidence floor and accepts the result only when it
//! passes the same geometric gates the primary path uses. The strong-subset
//! recovery then re-runs the full primary fusion over only the individually
//! convincing cameras. Both paths are read-only with respect to calibration
//! and stage internals: they vary nothing but camera subsets and thresholds,
//! and every accepted result is tagged with its method.

use log::debug;

use dart_fusion_core::{circular_spread, PolarCoord};

use crate::candidate::CameraCandidate;
use crate::config::FusionConfig;
use crate::diag::StageEvent;
use crate::engine::{FusedPoint, FusionEngine, FusionMethod};
use crate::triangulate::{best_pair, pair_intersections};

impl FusionEngine {
    /// Relaxed-threshold retry. Returns the fused point and its confidence
    /// (the weakest participating camera).
    pub(crate) fn soft_accept(
        &self,
        candidates: &[CameraCandidate],
        cfg: &FusionConfig,
        baseline_residual: Option<f64>,
    ) -> Option<(FusedPoint, f64)> {
        if !cfg.enable_soft_accept {
            return None;
        }

        let relaxed: Vec<usize> = (0..candidates.len())
            .filter(|&i| {
                candidates[i].confidence >= cfg.relaxed_min_confidence
                    && candidates[i].line().is_some()
            })
            .collect();
        if relaxed.len() < 2 {
            return None;
        }

        let thetas: Vec<f64> = relaxed
            .iter()
            .map(|&i| candidates[i].tip_polar().theta)
            .collect();
        if circular_spread(&thetas) > cfg.relaxed_max_spread_deg.to_radians() {
            debug!("soft accept rejected: relaxed cameras disagree on theta");
            return None;
        }

        let pairs = pair_intersections(candidates, &relaxed, cfg);
        let best = best_pair(&pairs)?.clone();
        let polar = PolarCoord::from_cartesian(&best.point);

        // Board containment gate.
        if polar.radius > self.calibration.rings.double_outer() {
            debug!("soft accept rejected: point off board (r = {:.3})", polar.radius);
            return None;
        }

        // Residual sanity against the primary result, or a historical
        // reference when the primary path produced nothing.
        let reference = baseline_residual
            .filter(|r| *r > 1e-3)
            .unwrap_or(cfg.historical_residual);
        if best.residual > reference * cfg.relaxed_residual_ratio {
            debug!(
                "soft accept rejected: residual {:.4} vs reference {:.4}",
                best.residual, reference
            );
            self.sink.record(&StageEvent::SoftAccept {
                accepted: false,
                residual: best.residual,
            });
            return None;
        }

        self.sink.record(&StageEvent::SoftAccept {
            accepted: true,
            residual: best.residual,
        });

        let (i, j) = best.cameras;
        let confidence = relaxed
            .iter()
            .map(|&k| candidates[k].confidence)
            .fold(f64::INFINITY, f64::min);
        let theta_sigma = dart_fusion_core::circular_std(&[
            candidates[i].tip_polar().theta,
            candidates[j].tip_polar().theta,
        ]);

        Some((
            FusedPoint {
                point: best.point,
                polar,
                method: FusionMethod::SoftAccept,
                residual: best.residual,
                contributing: vec![i, j],
                weights: vec![
                    (i, candidates[i].confidence),
                    (j, candidates[j].confidence),
                ],
                theta_sigma,
                clamp_applied: false,
                angular_refined: false,
            },
            confidence,
        ))
    }

    /// Strong-camera subset recovery, including the single-camera fallback.
    pub(crate) fn strong_recovery(
        &self,
        candidates: &[CameraCandidate],
        cfg: &FusionConfig,
        baseline: Option<&FusedPoint>,
    ) -> Option<(FusedPoint, f64)> {
        if !cfg.enable_miss_recovery {
            return None;
        }

        let strong: Vec<usize> = (0..candidates.len())
            .filter(|&i| {
                candidates[i].confidence >= cfg.strong_min_confidence
                    && candidates[i].barrel_pixel_support >= cfg.strong_min_support
                    && candidates[i].line().is_some()
            })
            .collect();

        if strong.len() < 2 {
            if strong.len() == 1 && cfg.allow_single_camera {
                return self.single_camera(candidates, strong[0], cfg);
            }
            debug!("miss recovery: no strong cameras");
            return None;
        }

        let thetas: Vec<f64> = strong
            .iter()
            .map(|&i| candidates[i].tip_polar().theta)
            .collect();
        if circular_spread(&thetas) > cfg.strong_max_spread_deg.to_radians() {
            debug!("miss recovery rejected: strong cameras disagree on theta");
            self.sink.record(&StageEvent::MissRecovery {
                strong_cameras: strong.len(),
                accepted: false,
            });
            return None;
        }

        let Some(mut fused) = self.primary_fusion(candidates, &strong, cfg, false) else {
            self.sink.record(&StageEvent::MissRecovery {
                strong_cameras: strong.len(),
                accepted: false,
            });
            return None;
        };

        // Conservative ring guard: never land a recovered dart straight
        // onto a ring boundary.
        let ring_dist = self
            .calibration
            .rings
            .nearest_boundary_distance(fused.polar.radius);
        let reference = baseline
            .map(|b| b.residual)
            .filter(|r| *r > 1e-9)
            .unwrap_or(fused.residual.max(1e-9));
        let radius_limit =
            self.calibration.rings.double_outer() + cfg.max_radius_excess;

        let accepted = ring_dist >= cfg.ring_guard_margin
            && fused.residual <= reference * cfg.recovery_residual_ratio
            && fused.polar.radius <= radius_limit;

        self.sink.record(&StageEvent::MissRecovery {
            strong_cameras: strong.len(),
            accepted,
        });
        if !accepted {
            debug!(
                "miss recovery rejected: ring_dist {:.4}, residual {:.4}, radius {:.3}",
                ring_dist, fused.residual, fused.polar.radius
            );
            return None;
        }

        let confidence = self.vote_confidence(candidates, &strong, cfg);
        fused.method = FusionMethod::MissRecovery;
        Some((fused, confidence))
    }

    /// Score a lone strong camera directly from its (bias-corrected) tip.
    pub(crate) fn single_camera(
        &self,
        candidates: &[CameraCandidate],
        index: usize,
        cfg: &FusionConfig,
    ) -> Option<(FusedPoint, f64)> {
        let cand = &candidates[index];

        // Learn mode records the raw hypothesis for offline fitting; apply
        // mode rotates it by the fitted offset. Only this single-camera
        // path ever touches the bias stage.
        self.bias.record(&cand.camera_id, cand.tip_polar());
        let bias_rad = self.bias.correction(cand, cfg.max_bias_correction_deg);
        let corrected = self.bias.correct(cand, cfg.max_bias_correction_deg);
        let polar = corrected.tip_polar();

        let radius_limit =
            self.calibration.rings.double_outer() * cfg.over_radius_factor;
        if polar.radius > radius_limit {
            debug!(
                "single-camera fallback rejected: tip off board (r = {:.3})",
                polar.radius
            );
            return None;
        }

        self.sink.record(&StageEvent::SingleCamera {
            camera_id: cand.camera_id.clone(),
            bias_deg: -bias_rad.to_degrees(),
        });

        Some((
            FusedPoint {
                point: corrected.tip,
                polar,
                method: FusionMethod::SingleCamera,
                residual: 0.0,
                contributing: vec![index],
                weights: vec![(index, cand.confidence)],
                theta_sigma: 0.0,
                clamp_applied: false,
                angular_refined: false,
            },
            cand.confidence * cfg.single_camera_confidence_scale,
        ))
    }
}
