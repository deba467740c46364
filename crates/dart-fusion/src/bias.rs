//! Per-camera angular bias correction for single-camera hypotheses.
//!
//! A hypothesis backed by a single camera has no triangulation constraint
//! and inherits that camera's systematic angular error in full. The bias
//! field is binned over the board (6 radius bins x 20 angle bins), fitted
//! offline from logged single-camera observations, and applied read-only at
//! detection time. Multi-camera hypotheses are never touched.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use log::{debug, warn};
use nalgebra::Rotation2;
use serde::{Deserialize, Serialize};

use dart_fusion_core::{circular_diff, PolarCoord};

use crate::candidate::CameraCandidate;

pub const RADIUS_BINS: usize = 6;
pub const ANGLE_BINS: usize = 20;

/// Errors loading or saving a bias map.
#[derive(thiserror::Error, Debug)]
pub enum BiasMapError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed bias map: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One logged single-camera hypothesis, as written by learn mode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BiasObservation {
    pub camera_id: String,
    pub radius: f64,
    pub theta_deg: f64,
}

/// Per-camera binned angular offsets in degrees.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BiasMap {
    cameras: BTreeMap<String, [[f64; ANGLE_BINS]; RADIUS_BINS]>,
}

fn bin_of(radius: f64, theta_deg: f64) -> (usize, usize) {
    let r = ((radius * RADIUS_BINS as f64) as usize).min(RADIUS_BINS - 1);
    let a = ((theta_deg.rem_euclid(360.0) / (360.0 / ANGLE_BINS as f64)) as usize)
        .min(ANGLE_BINS - 1);
    (r, a)
}

impl BiasMap {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, BiasMapError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), BiasMapError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Fitted offset in degrees for a camera at a board position, or `None`
    /// when the camera is unmapped.
    pub fn offset_deg(&self, camera_id: &str, radius: f64, theta_deg: f64) -> Option<f64> {
        let bins = self.cameras.get(camera_id)?;
        let (r, a) = bin_of(radius, theta_deg);
        Some(bins[r][a])
    }

    /// Fit a map from observations paired with their reference angle
    /// (degrees): each bin stores the mean signed error
    /// `observed - reference`.
    pub fn fit<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (BiasObservation, f64)>,
    {
        let mut sums: BTreeMap<String, [[(f64, u32); ANGLE_BINS]; RADIUS_BINS]> = BTreeMap::new();
        for (obs, reference_deg) in records {
            let err = circular_diff(obs.theta_deg.to_radians(), reference_deg.to_radians())
                .to_degrees();
            let (r, a) = bin_of(obs.radius, obs.theta_deg);
            let entry = sums
                .entry(obs.camera_id)
                .or_insert([[(0.0, 0); ANGLE_BINS]; RADIUS_BINS]);
            entry[r][a].0 += err;
            entry[r][a].1 += 1;
        }

        let mut map = Self::default();
        for (camera, grid) in sums {
            let mut bins = [[0.0; ANGLE_BINS]; RADIUS_BINS];
            for (r, row) in grid.iter().enumerate() {
                for (a, &(sum, count)) in row.iter().enumerate() {
                    if count > 0 {
                        bins[r][a] = sum / f64::from(count);
                    }
                }
            }
            map.cameras.insert(camera, bins);
        }
        map
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}

/// Runtime bias stage. Learn and apply are mutually exclusive.
pub enum BiasStage {
    Off,
    /// Append every single-camera hypothesis to a JSON-lines writer
    /// supplied by the caller, for offline fitting.
    Learn(Mutex<Box<dyn Write + Send>>),
    /// Correct single-camera hypotheses with a precomputed map.
    Apply(BiasMap),
}

impl Default for BiasStage {
    fn default() -> Self {
        Self::Off
    }
}

impl std::fmt::Debug for BiasStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => f.write_str("BiasStage::Off"),
            Self::Learn(_) => f.write_str("BiasStage::Learn"),
            Self::Apply(_) => f.write_str("BiasStage::Apply"),
        }
    }
}

impl BiasStage {
    /// Record a single-camera hypothesis in learn mode (no-op otherwise).
    pub(crate) fn record(&self, camera_id: &str, polar: PolarCoord) {
        let Self::Learn(writer) = self else {
            return;
        };
        let obs = BiasObservation {
            camera_id: camera_id.to_string(),
            radius: polar.radius,
            theta_deg: polar.theta.to_degrees(),
        };
        let Ok(line) = serde_json::to_string(&obs) else {
            return;
        };
        let mut guard = writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = writeln!(guard, "{line}") {
            warn!("bias learn log write failed: {err}");
        }
    }

    /// Correction angle in radians for a single-camera hypothesis, clamped
    /// to `max_deg`. Zero when off, learning, or the camera is unmapped.
    pub(crate) fn correction(&self, candidate: &CameraCandidate, max_deg: f64) -> f64 {
        let Self::Apply(map) = self else {
            return 0.0;
        };
        let polar = candidate.tip_polar();
        let Some(offset) =
            map.offset_deg(&candidate.camera_id, polar.radius, polar.theta.to_degrees())
        else {
            return 0.0;
        };
        let clamped = offset.clamp(-max_deg, max_deg);
        if clamped.abs() < 1e-3 {
            return 0.0;
        }
        debug!(
            "bias correction for {}: {:.2} deg",
            candidate.camera_id, clamped
        );
        // The map stores the camera's error, so the correction subtracts it.
        -clamped.to_radians()
    }

    /// Apply the correction by rotating the hypothesis about the board
    /// center: tip and axis turn together, the radius is preserved.
    pub(crate) fn correct(&self, candidate: &CameraCandidate, max_deg: f64) -> CameraCandidate {
        let angle = self.correction(candidate, max_deg);
        if angle == 0.0 {
            return candidate.clone();
        }
        let rot = Rotation2::new(angle);
        let mut out = candidate.clone();
        out.tip = rot * candidate.tip;
        out.axis = rot * candidate.axis;
        out
    }
}
