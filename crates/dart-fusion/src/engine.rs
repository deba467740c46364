//! The fusion engine: one synchronous cascade per dart.

use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use dart_fusion_core::{
    score_polar, PolarCoord, Ring, RingRadiiTable, ScoreOutcome, SegmentAngleTable,
};

use crate::angular::refine_theta;
use crate::bias::BiasStage;
use crate::candidate::CameraCandidate;
use crate::clamp::radial_clamp;
use crate::config::{ConfigError, ConfigHandle, FlagValue, FusionConfig};
use crate::diag::{CameraReport, DiagnosticsSink, FusionReport, NullSink, StageEvent};
use crate::triangulate::{best_pair, pair_intersections, residual_at, weighted_fusion};
use crate::wire::adjudicate_segment;

/// Validated per-board calibration consumed by the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoardCalibration {
    pub rings: RingRadiiTable,
    pub segments: SegmentAngleTable,
}

impl BoardCalibration {
    pub fn new(rings: RingRadiiTable, segments: SegmentAngleTable) -> Self {
        Self { rings, segments }
    }

    /// Regulation board with the 20-wedge at the top.
    pub fn standard() -> Self {
        Self {
            rings: RingRadiiTable::standard(),
            segments: SegmentAngleTable::standard(),
        }
    }
}

/// Which path produced the final answer. Every fallback is tagged so the
/// outcome stays auditable.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    Weighted,
    BestPair,
    ClampedBestPair,
    HybridClamp,
    SoftAccept,
    MissRecovery,
    SingleCamera,
    EdgeMiss,
    NoDetection,
}

impl FusionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weighted => "weighted",
            Self::BestPair => "best_pair",
            Self::ClampedBestPair => "clamped_best_pair",
            Self::HybridClamp => "hybrid_clamp",
            Self::SoftAccept => "soft_accept",
            Self::MissRecovery => "miss_recovery",
            Self::SingleCamera => "single_camera",
            Self::EdgeMiss => "edge_miss",
            Self::NoDetection => "no_detection",
        }
    }
}

impl std::fmt::Display for FusionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The finalized landing point. Exactly one is produced per dart; the
/// contributing set is empty only for a miss.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FusionResult {
    pub point: Point2<f64>,
    pub polar: PolarCoord,
    /// Circular standard deviation of the contributing cameras' tip angles.
    pub theta_sigma: f64,
    pub contributing: Vec<String>,
    pub residual: f64,
    pub method: FusionMethod,
}

/// Terminal artifact of one dart: the scored outcome plus the audited
/// fusion result and the additive diagnostic report.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DartOutcome {
    pub score: ScoreOutcome,
    pub confidence: f64,
    pub method: FusionMethod,
    pub fusion: FusionResult,
    pub report: FusionReport,
}

impl DartOutcome {
    pub fn is_miss(&self) -> bool {
        self.score.is_miss()
    }
}

/// Internal fused point shared between the primary path and recovery.
#[derive(Clone, Debug)]
pub(crate) struct FusedPoint {
    pub point: Point2<f64>,
    pub polar: PolarCoord,
    pub method: FusionMethod,
    pub residual: f64,
    /// Candidate indices that carried weight in this point.
    pub contributing: Vec<usize>,
    /// `(index, weight)` pairs used for residual evaluation.
    pub weights: Vec<(usize, f64)>,
    pub theta_sigma: f64,
    pub clamp_applied: bool,
    pub angular_refined: bool,
}

/// Multi-camera fusion and decision engine for one board.
pub struct FusionEngine {
    pub(crate) calibration: BoardCalibration,
    pub(crate) config: ConfigHandle,
    pub(crate) bias: BiasStage,
    pub(crate) sink: Box<dyn DiagnosticsSink>,
}

impl FusionEngine {
    pub fn new(calibration: BoardCalibration) -> Self {
        Self {
            calibration,
            config: ConfigHandle::default(),
            bias: BiasStage::Off,
            sink: Box::new(NullSink),
        }
    }

    pub fn with_config(mut self, config: FusionConfig) -> Self {
        self.config = ConfigHandle::new(config);
        self
    }

    pub fn with_bias(mut self, bias: BiasStage) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_diagnostics(mut self, sink: Box<dyn DiagnosticsSink>) -> Self {
        self.sink = sink;
        self
    }

    #[inline]
    pub fn calibration(&self) -> &BoardCalibration {
        &self.calibration
    }

    #[inline]
    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Operator-facing flag update (serialized copy-on-write swap).
    pub fn set_flag(&self, name: &str, value: FlagValue) -> Result<(), ConfigError> {
        self.config.set_flag(name, value)
    }

    /// Run the full cascade for one dart.
    pub fn score_dart(&self, candidates: &[CameraCandidate]) -> DartOutcome {
        let cfg = self.config.snapshot();

        let usable: Vec<usize> = (0..candidates.len())
            .filter(|&i| {
                candidates[i].confidence >= cfg.min_camera_confidence
                    && candidates[i].line().is_some()
            })
            .collect();

        let edge_pending = cfg.enable_edge_miss_override
            && self.edge_miss_evidence(candidates, &cfg).is_some();

        let primary = if usable.len() >= 2 {
            self.primary_fusion(
                candidates,
                &usable,
                &cfg,
                edge_pending && cfg.respect_miss_override,
            )
        } else {
            debug!(
                "primary triangulation degenerate: {} usable of {} cameras",
                usable.len(),
                candidates.len()
            );
            None
        };

        if let Some(fused) = &primary {
            let outcome = score_polar(
                fused.polar,
                &self.calibration.rings,
                &self.calibration.segments,
                cfg.over_radius_factor,
            );
            if !outcome.is_miss() {
                if outcome.ring == Ring::Double && edge_pending {
                    let (edge, off) = self
                        .edge_miss_evidence(candidates, &cfg)
                        .unwrap_or((0, 0));
                    self.sink.record(&StageEvent::EdgeMissOverride {
                        edge_cameras: edge,
                        off_board_cameras: off,
                    });
                    debug!("board-edge miss override ({edge} edge, {off} off-board tips)");
                    return self.miss_outcome(candidates, FusionMethod::EdgeMiss, 0.7, fused.point);
                }
                return self.finalize(candidates, &cfg, fused.clone(), outcome, None);
            }
            debug!("primary result off-board (r = {:.3})", fused.polar.radius);
        }

        // Recovery: soft accept first, then the strong-camera subset.
        let baseline_residual = primary.as_ref().map(|f| f.residual);
        if let Some((fused, confidence)) = self.soft_accept(candidates, &cfg, baseline_residual) {
            let outcome = score_polar(
                fused.polar,
                &self.calibration.rings,
                &self.calibration.segments,
                cfg.over_radius_factor,
            );
            if !outcome.is_miss() {
                return self.finalize(candidates, &cfg, fused, outcome, Some(confidence));
            }
        }
        if let Some((fused, confidence)) =
            self.strong_recovery(candidates, &cfg, primary.as_ref())
        {
            let outcome = score_polar(
                fused.polar,
                &self.calibration.rings,
                &self.calibration.segments,
                cfg.over_radius_factor,
            );
            if !outcome.is_miss() {
                return self.finalize(candidates, &cfg, fused, outcome, Some(confidence));
            }
        }

        self.miss_outcome(
            candidates,
            FusionMethod::NoDetection,
            0.0,
            Point2::origin(),
        )
    }

    /// Triangulate -> weighted fusion -> radial clamp -> angular refinement
    /// over the candidates at `indices`.
    pub(crate) fn primary_fusion(
        &self,
        candidates: &[CameraCandidate],
        indices: &[usize],
        cfg: &FusionConfig,
        suppress_clamp: bool,
    ) -> Option<FusedPoint> {
        let pairs = pair_intersections(candidates, indices, cfg);
        let best = best_pair(&pairs)?.clone();
        self.sink.record(&StageEvent::PairsTriangulated {
            pairs: pairs.len(),
            best_residual: best.residual,
        });

        let weighted = if cfg.enable_weighted_fusion {
            weighted_fusion(candidates, indices, cfg)
        } else {
            None
        };

        let (mut point, method, weights, clamp_applied) = match &weighted {
            Some(w) => {
                self.sink.record(&StageEvent::WeightedFused {
                    cameras: w.weights.len(),
                    residual: w.residual,
                });
                let decision =
                    radial_clamp(&w.point, &best, &self.calibration.rings, cfg, suppress_clamp);
                if decision.applied {
                    self.sink.record(&StageEvent::RadialClamp {
                        radius_delta: decision.radius_delta,
                        mode: cfg.clamp_mode,
                    });
                }
                (
                    decision.point,
                    decision.method,
                    w.weights.clone(),
                    decision.applied,
                )
            }
            None => {
                let (i, j) = best.cameras;
                let w = vec![
                    (i, candidates[i].confidence.min(cfg.weight_cap)),
                    (j, candidates[j].confidence.min(cfg.weight_cap)),
                ];
                (best.point, FusionMethod::BestPair, w, false)
            }
        };

        let mut polar = PolarCoord::from_cartesian(&point);
        let prior_theta = PolarCoord::from_cartesian(&best.point).theta;
        let weighted_theta = weighted
            .as_ref()
            .map(|w| PolarCoord::from_cartesian(&w.point).theta)
            .unwrap_or(prior_theta);

        let refinement = refine_theta(
            polar,
            prior_theta,
            weighted_theta,
            candidates,
            &weights,
            &self.calibration.segments,
            cfg,
        );
        if refinement.applied {
            self.sink
                .record(&StageEvent::AngularRefine { accepted: true });
            polar = polar.with_theta(refinement.theta);
            point = polar.to_cartesian();
        }

        // The clamp may have moved the point, so the audited residual is
        // evaluated at the final position.
        let residual = residual_at(&point, candidates, &weights);
        let contributing = weights.iter().map(|&(i, _)| i).collect();

        Some(FusedPoint {
            point,
            polar,
            method,
            residual,
            contributing,
            weights,
            theta_sigma: refinement.sigma,
            clamp_applied,
            angular_refined: refinement.applied,
        })
    }

    /// Board-edge miss evidence: `(edge, off_board)` tip counts when both
    /// thresholds are met.
    pub(crate) fn edge_miss_evidence(
        &self,
        candidates: &[CameraCandidate],
        cfg: &FusionConfig,
    ) -> Option<(usize, usize)> {
        let mut edge = 0;
        let mut off = 0;
        for cand in candidates {
            let r = cand.tip_polar().radius;
            if r > cfg.edge_radius {
                edge += 1;
            }
            if r > cfg.off_board_radius {
                off += 1;
            }
        }
        (edge >= 2 && off >= 1).then_some((edge, off))
    }

    /// Agreement-based confidence: unanimous camera segment votes score
    /// highest, a majority less, a split lowest.
    pub(crate) fn vote_confidence(
        &self,
        candidates: &[CameraCandidate],
        indices: &[usize],
        cfg: &FusionConfig,
    ) -> f64 {
        let votes: Vec<u8> = indices
            .iter()
            .map(|&i| {
                score_polar(
                    candidates[i].tip_polar(),
                    &self.calibration.rings,
                    &self.calibration.segments,
                    cfg.over_radius_factor,
                )
                .segment
            })
            .collect();
        let mut best_count = 0;
        for &v in &votes {
            let count = votes.iter().filter(|&&x| x == v).count();
            best_count = best_count.max(count);
        }
        if best_count == votes.len() && votes.len() >= 3 {
            0.95
        } else if best_count >= 2 {
            0.8
        } else {
            0.5
        }
    }

    /// Wire adjudication, report assembly and outcome packaging shared by
    /// every accepting path.
    fn finalize(
        &self,
        candidates: &[CameraCandidate],
        cfg: &FusionConfig,
        fused: FusedPoint,
        outcome: ScoreOutcome,
        confidence: Option<f64>,
    ) -> DartOutcome {
        let wire = adjudicate_segment(
            outcome,
            fused.polar,
            candidates,
            &fused.contributing,
            &self.calibration.segments,
            cfg,
        );
        if wire.considered {
            self.sink.record(&StageEvent::WireAdjudication {
                changed: wire.changed,
            });
        }

        let confidence = confidence
            .unwrap_or_else(|| self.vote_confidence(candidates, &fused.contributing, cfg));

        let report = FusionReport {
            cameras: self.camera_reports(candidates, &fused),
            clamp_applied: fused.clamp_applied,
            angular_refined: fused.angular_refined,
            wire_considered: wire.considered,
            wire_adjudicated: wire.changed,
        };

        DartOutcome {
            score: wire.outcome,
            confidence,
            method: fused.method,
            fusion: FusionResult {
                point: fused.point,
                polar: fused.polar,
                theta_sigma: fused.theta_sigma,
                contributing: fused
                    .contributing
                    .iter()
                    .map(|&i| candidates[i].camera_id.clone())
                    .collect(),
                residual: fused.residual,
                method: fused.method,
            },
            report,
        }
    }

    fn camera_reports(
        &self,
        candidates: &[CameraCandidate],
        fused: &FusedPoint,
    ) -> Vec<CameraReport> {
        candidates
            .iter()
            .enumerate()
            .map(|(i, cand)| {
                let weight = fused
                    .weights
                    .iter()
                    .find(|(idx, _)| *idx == i)
                    .map(|&(_, w)| w)
                    .unwrap_or(0.0);
                let residual = cand
                    .line()
                    .map(|l| l.perp_distance(&fused.point))
                    .unwrap_or(f64::NAN);
                CameraReport {
                    camera_id: cand.camera_id.clone(),
                    confidence: cand.confidence,
                    weight,
                    residual,
                    theta_deg: cand.tip_polar().theta.to_degrees(),
                }
            })
            .collect()
    }

    fn miss_outcome(
        &self,
        candidates: &[CameraCandidate],
        method: FusionMethod,
        confidence: f64,
        point: Point2<f64>,
    ) -> DartOutcome {
        let polar = PolarCoord::from_cartesian(&point);
        DartOutcome {
            score: ScoreOutcome::miss(),
            confidence,
            method,
            fusion: FusionResult {
                point,
                polar,
                theta_sigma: 0.0,
                contributing: Vec::new(),
                residual: 0.0,
                method,
            },
            report: FusionReport {
                cameras: candidates
                    .iter()
                    .map(|cand| CameraReport {
                        camera_id: cand.camera_id.clone(),
                        confidence: cand.confidence,
                        weight: 0.0,
                        residual: f64::NAN,
                        theta_deg: cand.tip_polar().theta.to_degrees(),
                    })
                    .collect(),
                ..FusionReport::default()
            },
        }
    }
}
