//! Command-line front end for the dart-fusion engine.
//!
//! `score` reads a JSON detect request (calibration + per-camera
//! candidates, optional flag overrides and bias map) and prints the
//! outcome JSON on stdout.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;
use serde::Deserialize;

use dart_fusion::{
    BiasMap, BiasMapError, BiasStage, BoardCalibration, CameraCandidate, ConfigError, FlagValue,
    FusionConfig, FusionEngine,
};
use dart_fusion_core::{CalibrationError, RingRadiiTable, SegmentAngleTable};

#[derive(Parser)]
#[command(name = "dart-fusion", about = "Score dart strikes from camera hypotheses")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score one dart from a JSON request file.
    Score {
        /// Path to the detect request JSON.
        request: PathBuf,
        /// Pretty-print the outcome.
        #[arg(long)]
        pretty: bool,
    },
    /// Print the default configuration as JSON.
    DefaultConfig,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    BiasMap(#[from] BiasMapError),
    #[error("request has no calibration for this board")]
    MissingCalibration,
}

/// Calibration payload as exported by the board-calibration tooling:
/// six ring radii (normalized) plus the wedge boundaries in degrees.
#[derive(Deserialize)]
struct CalibrationRequest {
    ring_radii: [f64; 6],
    segment_boundaries_deg: Vec<f64>,
    #[serde(default)]
    segment_20_index: usize,
}

#[derive(Deserialize)]
struct DetectRequest {
    calibration: Option<CalibrationRequest>,
    candidates: Vec<CameraCandidate>,
    #[serde(default)]
    flags: Vec<(String, FlagValue)>,
    #[serde(default)]
    bias_map: Option<PathBuf>,
}

fn build_engine(request: &DetectRequest) -> Result<FusionEngine, CliError> {
    let cal = request
        .calibration
        .as_ref()
        .ok_or(CliError::MissingCalibration)?;
    let rings = RingRadiiTable::new(cal.ring_radii)?;
    let boundaries = cal
        .segment_boundaries_deg
        .iter()
        .map(|d| d.to_radians())
        .collect();
    let segments = SegmentAngleTable::new(boundaries, cal.segment_20_index)?;

    let mut config = FusionConfig::default();
    for (name, value) in &request.flags {
        config.apply_flag(name, value.clone())?;
    }

    let mut engine =
        FusionEngine::new(BoardCalibration::new(rings, segments)).with_config(config);
    if let Some(path) = &request.bias_map {
        engine = engine.with_bias(BiasStage::Apply(BiasMap::load_json(path)?));
    }
    Ok(engine)
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Score { request, pretty } => {
            let raw = fs::read_to_string(&request)?;
            let request: DetectRequest = serde_json::from_str(&raw)?;
            let engine = build_engine(&request)?;

            info!("scoring dart from {} cameras", request.candidates.len());
            let outcome = engine.score_dart(&request.candidates);

            let json = if pretty {
                serde_json::to_string_pretty(&outcome)?
            } else {
                serde_json::to_string(&outcome)?
            };
            println!("{json}");
        }
        Command::DefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&FusionConfig::default())?);
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn request_json() -> String {
        let boundaries: Vec<f64> = (0..20).map(|i| 81.0 + 18.0 * i as f64).collect();
        serde_json::json!({
            "calibration": {
                "ring_radii": [0.0452, 0.1015, 0.5694, 0.6324, 0.9370, 1.0],
                "segment_boundaries_deg": boundaries,
                "segment_20_index": 0
            },
            "candidates": [
                { "camera_id": "cam0", "tip": [0.0, 0.6], "axis": [1.0, 0.2], "confidence": 0.9 },
                { "camera_id": "cam1", "tip": [0.0, 0.6], "axis": [-0.3, 1.0], "confidence": 0.9 }
            ],
            "flags": [["enable_wire_adjudication", false]]
        })
        .to_string()
    }

    #[test]
    fn request_parses_and_scores() {
        let request: DetectRequest = serde_json::from_str(&request_json()).unwrap();
        let engine = build_engine(&request).unwrap();
        let outcome = engine.score_dart(&request.candidates);
        assert_eq!(outcome.score.segment, 20);
        assert_eq!(outcome.score.multiplier, 3);
    }

    #[test]
    fn missing_calibration_is_an_error() {
        let request: DetectRequest =
            serde_json::from_str(r#"{ "calibration": null, "candidates": [] }"#).unwrap();
        assert!(matches!(
            build_engine(&request),
            Err(CliError::MissingCalibration)
        ));
    }

    #[test]
    fn unknown_flag_in_request_fails_loudly() {
        let mut request: DetectRequest = serde_json::from_str(&request_json()).unwrap();
        request
            .flags
            .push(("enable_hologram".into(), FlagValue::Bool(true)));
        assert!(matches!(build_engine(&request), Err(CliError::Config(_))));
    }

    #[test]
    fn bias_map_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bias.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, "{}", serde_json::json!({ "cameras": {} })).unwrap();

        let mut request: DetectRequest = serde_json::from_str(&request_json()).unwrap();
        request.bias_map = Some(path);
        assert!(build_engine(&request).is_ok());
    }
}
