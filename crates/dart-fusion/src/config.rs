//! Runtime configuration for the fusion cascade.
//!
//! All thresholds and enable switches live in one explicit struct that is
//! passed into the engine, never in ambient globals. Operators set flags by
//! name through [`FusionConfig::apply_flag`], the only place where string
//! keys exist; unknown names are reported instead of ignored. Concurrent
//! detection threads read a copy-on-write snapshot via [`ConfigHandle`], so
//! a dart in flight always sees either the old or the new configuration in
//! full, never a torn mix.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// How the radial stability clamp resolves a disagreement near a ring
/// boundary.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampMode {
    /// Replace the weighted result with the best-pair result.
    #[default]
    BestPair,
    /// Blend the weighted and best-pair radii at the weighted theta.
    Hybrid,
}

/// Errors from the operator-facing flag surface.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unknown flag: {0}")]
    UnknownFlag(String),
    #[error("flag {flag} expects a {expected} value")]
    TypeMismatch {
        flag: &'static str,
        expected: &'static str,
    },
    #[error("flag {flag}: {reason}")]
    InvalidValue { flag: &'static str, reason: String },
}

/// A value supplied for a named flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// All tunables of the fusion cascade. Angular thresholds are degrees
/// (operator-facing); distances are normalized board units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    // Pairwise triangulation.
    pub min_camera_confidence: f64,
    /// Sine of the angle below which two axes count as parallel.
    pub parallel_eps: f64,
    /// Intersections farther out than this are discarded as spurious.
    pub max_intersection_radius: f64,

    // Confidence-weighted fusion.
    pub enable_weighted_fusion: bool,
    pub weighted_min_confidence: f64,
    pub weight_cap: f64,
    pub soft_include_weak: bool,
    pub soft_include_scale: f64,

    // Radial stability clamp.
    pub enable_radial_clamp: bool,
    pub clamp_mode: ClampMode,
    pub clamp_radius_delta: f64,
    pub ring_epsilon: f64,
    pub respect_miss_override: bool,

    // Board-edge miss override.
    pub enable_edge_miss_override: bool,
    pub edge_radius: f64,
    pub off_board_radius: f64,

    // Circular angular refinement.
    pub enable_angular_refine: bool,
    pub near_wedge_band_deg: f64,
    pub refine_min_cameras: usize,
    pub refine_max_spread_deg: f64,
    pub refine_prior_weight: f64,
    pub refine_max_delta_deg: f64,
    pub refine_residual_ratio: f64,

    // Wire-boundary adjudication.
    pub enable_wire_adjudication: bool,
    pub wire_outer_band_deg: f64,
    pub wire_inner_band_deg: f64,

    // Soft accept.
    pub enable_soft_accept: bool,
    pub relaxed_min_confidence: f64,
    pub relaxed_max_spread_deg: f64,
    pub relaxed_residual_ratio: f64,
    /// Residual reference when the primary path produced none.
    pub historical_residual: f64,

    // Strong-subset miss recovery.
    pub enable_miss_recovery: bool,
    pub strong_min_confidence: f64,
    pub strong_min_support: u32,
    pub strong_max_spread_deg: f64,
    pub recovery_residual_ratio: f64,
    pub ring_guard_margin: f64,
    pub max_radius_excess: f64,
    pub allow_single_camera: bool,
    pub single_camera_confidence_scale: f64,

    // Single-camera bias correction.
    pub max_bias_correction_deg: f64,

    // Scorer.
    pub over_radius_factor: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            min_camera_confidence: 0.15,
            parallel_eps: 1e-3,
            max_intersection_radius: 1.30,

            enable_weighted_fusion: true,
            weighted_min_confidence: 0.15,
            weight_cap: 1.0,
            soft_include_weak: false,
            soft_include_scale: 0.5,

            enable_radial_clamp: true,
            clamp_mode: ClampMode::BestPair,
            clamp_radius_delta: 0.030,
            ring_epsilon: 0.020,
            respect_miss_override: true,

            enable_edge_miss_override: true,
            edge_radius: 0.95,
            off_board_radius: 1.0,

            enable_angular_refine: true,
            near_wedge_band_deg: 2.0,
            refine_min_cameras: 2,
            refine_max_spread_deg: 6.0,
            refine_prior_weight: 0.35,
            refine_max_delta_deg: 8.0,
            refine_residual_ratio: 1.05,

            enable_wire_adjudication: true,
            wire_outer_band_deg: 0.50,
            wire_inner_band_deg: 0.25,

            enable_soft_accept: true,
            relaxed_min_confidence: 0.075,
            relaxed_max_spread_deg: 8.0,
            relaxed_residual_ratio: 1.40,
            historical_residual: 0.04,

            enable_miss_recovery: true,
            strong_min_confidence: 0.55,
            strong_min_support: 45,
            strong_max_spread_deg: 6.0,
            recovery_residual_ratio: 1.15,
            ring_guard_margin: 0.006,
            max_radius_excess: 0.012,
            allow_single_camera: true,
            single_camera_confidence_scale: 0.5,

            max_bias_correction_deg: 2.0,

            over_radius_factor: 1.05,
        }
    }
}

macro_rules! flag_table {
    ($self:ident, $name:ident, $value:ident;
     bools { $($bname:literal => $bfield:ident),* $(,)? }
     numbers { $($nname:literal => $nfield:ident : $nty:ty),* $(,)? }) => {
        match $name {
            $($bname => match $value {
                FlagValue::Bool(b) => { $self.$bfield = b; Ok(()) }
                _ => Err(ConfigError::TypeMismatch { flag: $bname, expected: "boolean" }),
            },)*
            $($nname => match $value {
                FlagValue::Number(n) => { $self.$nfield = n as $nty; Ok(()) }
                _ => Err(ConfigError::TypeMismatch { flag: $nname, expected: "numeric" }),
            },)*
            "clamp_mode" => match $value {
                FlagValue::Text(ref s) if s == "best_pair" => { $self.clamp_mode = ClampMode::BestPair; Ok(()) }
                FlagValue::Text(ref s) if s == "hybrid" => { $self.clamp_mode = ClampMode::Hybrid; Ok(()) }
                FlagValue::Text(s) => Err(ConfigError::InvalidValue {
                    flag: "clamp_mode",
                    reason: format!("unknown mode {s:?}"),
                }),
                _ => Err(ConfigError::TypeMismatch { flag: "clamp_mode", expected: "text" }),
            },
            other => Err(ConfigError::UnknownFlag(other.to_string())),
        }
    };
}

impl FusionConfig {
    /// Set one named flag. This adapter exists only at the configuration
    /// boundary; internal code reads typed fields.
    pub fn apply_flag(&mut self, name: &str, value: FlagValue) -> Result<(), ConfigError> {
        flag_table!(self, name, value;
            bools {
                "enable_weighted_fusion" => enable_weighted_fusion,
                "soft_include_weak" => soft_include_weak,
                "enable_radial_clamp" => enable_radial_clamp,
                "respect_miss_override" => respect_miss_override,
                "enable_edge_miss_override" => enable_edge_miss_override,
                "enable_angular_refine" => enable_angular_refine,
                "enable_wire_adjudication" => enable_wire_adjudication,
                "enable_soft_accept" => enable_soft_accept,
                "enable_miss_recovery" => enable_miss_recovery,
                "allow_single_camera" => allow_single_camera,
            }
            numbers {
                "min_camera_confidence" => min_camera_confidence: f64,
                "parallel_eps" => parallel_eps: f64,
                "max_intersection_radius" => max_intersection_radius: f64,
                "weighted_min_confidence" => weighted_min_confidence: f64,
                "weight_cap" => weight_cap: f64,
                "soft_include_scale" => soft_include_scale: f64,
                "clamp_radius_delta" => clamp_radius_delta: f64,
                "ring_epsilon" => ring_epsilon: f64,
                "edge_radius" => edge_radius: f64,
                "off_board_radius" => off_board_radius: f64,
                "near_wedge_band_deg" => near_wedge_band_deg: f64,
                "refine_min_cameras" => refine_min_cameras: usize,
                "refine_max_spread_deg" => refine_max_spread_deg: f64,
                "refine_prior_weight" => refine_prior_weight: f64,
                "refine_max_delta_deg" => refine_max_delta_deg: f64,
                "refine_residual_ratio" => refine_residual_ratio: f64,
                "wire_outer_band_deg" => wire_outer_band_deg: f64,
                "wire_inner_band_deg" => wire_inner_band_deg: f64,
                "relaxed_min_confidence" => relaxed_min_confidence: f64,
                "relaxed_max_spread_deg" => relaxed_max_spread_deg: f64,
                "relaxed_residual_ratio" => relaxed_residual_ratio: f64,
                "historical_residual" => historical_residual: f64,
                "strong_min_confidence" => strong_min_confidence: f64,
                "strong_min_support" => strong_min_support: u32,
                "strong_max_spread_deg" => strong_max_spread_deg: f64,
                "recovery_residual_ratio" => recovery_residual_ratio: f64,
                "ring_guard_margin" => ring_guard_margin: f64,
                "max_radius_excess" => max_radius_excess: f64,
                "single_camera_confidence_scale" => single_camera_confidence_scale: f64,
                "max_bias_correction_deg" => max_bias_correction_deg: f64,
                "over_radius_factor" => over_radius_factor: f64,
            })
    }
}

/// Read-mostly shared configuration.
///
/// Readers take an `Arc` snapshot once per dart; writers clone the current
/// value, mutate the clone, and swap the `Arc` under the write lock. A
/// reader therefore never observes a half-updated configuration.
#[derive(Debug)]
pub struct ConfigHandle {
    inner: RwLock<Arc<FusionConfig>>,
}

impl ConfigHandle {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            inner: RwLock::new(Arc::new(config)),
        }
    }

    /// Current full snapshot.
    pub fn snapshot(&self) -> Arc<FusionConfig> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Serialized copy-on-write update.
    pub fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut FusionConfig),
    {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = (**guard).clone();
        mutate(&mut next);
        *guard = Arc::new(next);
    }

    /// Set one named flag, swapping in a fresh snapshot on success.
    pub fn set_flag(&self, name: &str, value: FlagValue) -> Result<(), ConfigError> {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = (**guard).clone();
        next.apply_flag(name, value)?;
        *guard = Arc::new(next);
        Ok(())
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}
