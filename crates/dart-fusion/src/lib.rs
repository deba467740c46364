//! Multi-camera fusion and decision engine for automated dart scoring.
//!
//! The external detector supplies, per camera, a directed barrel axis and a
//! tip position already warped into the normalized board plane, together
//! with a confidence score and an optional wire-occlusion side hint. This
//! crate turns those per-camera hypotheses into a single audited
//! `DartOutcome`:
//!
//! 1. pairwise line triangulation (best pair by residual),
//! 2. confidence-weighted fusion over all usable cameras,
//! 3. a radial stability clamp near ring boundaries,
//! 4. circular angular refinement near wedge boundaries,
//! 5. wire-boundary adjudication from occlusion hints,
//! 6. scoring against the calibrated ring/segment tables,
//!
//! with soft-accept and strong-subset recovery paths when the primary
//! cascade would report a miss, and a per-camera bias correction stage for
//! single-camera hypotheses. Every fallback is tagged in the outcome's
//! method so the result stays auditable.

mod angular;
mod bias;
mod candidate;
mod clamp;
mod config;
mod diag;
mod engine;
mod recover;
mod triangulate;
mod wire;

pub use bias::{BiasMap, BiasMapError, BiasObservation, BiasStage, ANGLE_BINS, RADIUS_BINS};
pub use candidate::{CameraCandidate, WireSideHint};
pub use config::{ClampMode, ConfigError, ConfigHandle, FlagValue, FusionConfig};
pub use diag::{CameraReport, DiagnosticsSink, FusionReport, NullSink, StageEvent};
pub use engine::{BoardCalibration, DartOutcome, FusionEngine, FusionMethod, FusionResult};
pub use triangulate::{PairIntersection, WeightedFusion};
