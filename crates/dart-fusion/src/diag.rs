//! Observability boundary: an injectable sink for stage-level events and an
//! additive per-camera report.
//!
//! Nothing in this module influences the decision already made; the report
//! and events exist so an operator can audit which method produced a score
//! and which cameras carried it.

use serde::{Deserialize, Serialize};

use crate::config::ClampMode;

/// One stage-level event emitted during a fusion run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage")]
pub enum StageEvent {
    PairsTriangulated {
        pairs: usize,
        best_residual: f64,
    },
    WeightedFused {
        cameras: usize,
        residual: f64,
    },
    RadialClamp {
        radius_delta: f64,
        mode: ClampMode,
    },
    AngularRefine {
        accepted: bool,
    },
    WireAdjudication {
        changed: bool,
    },
    EdgeMissOverride {
        edge_cameras: usize,
        off_board_cameras: usize,
    },
    SoftAccept {
        accepted: bool,
        residual: f64,
    },
    MissRecovery {
        strong_cameras: usize,
        accepted: bool,
    },
    SingleCamera {
        camera_id: String,
        bias_deg: f64,
    },
}

/// Consumer of stage events. The default sink drops everything.
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, event: &StageEvent);
}

/// Drops all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn record(&self, _event: &StageEvent) {}
}

/// Per-camera contribution to the final decision.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CameraReport {
    pub camera_id: String,
    pub confidence: f64,
    /// Weight used by the weighted fusion (0 when excluded).
    pub weight: f64,
    /// Perpendicular distance from the final point to this camera's line.
    pub residual: f64,
    /// Angle of this camera's tip, degrees.
    pub theta_deg: f64,
}

/// Additive diagnostic breakdown attached to every outcome.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FusionReport {
    pub cameras: Vec<CameraReport>,
    pub clamp_applied: bool,
    pub angular_refined: bool,
    pub wire_considered: bool,
    pub wire_adjudicated: bool,
}
