//! End-to-end cascade scenarios: candidates in, audited outcome out.

use nalgebra::{Point2, Vector2};

use dart_fusion::{
    BiasMap, BiasStage, BoardCalibration, CameraCandidate, FlagValue, FusionEngine, FusionMethod,
    WireSideHint, ANGLE_BINS, RADIUS_BINS,
};
use dart_fusion_core::{PolarCoord, Ring, RingRadiiTable, SegmentAngleTable};

fn deg(d: f64) -> f64 {
    d.to_radians()
}

fn cand(id: &str, tip: Point2<f64>, axis: Vector2<f64>, confidence: f64) -> CameraCandidate {
    CameraCandidate {
        camera_id: id.into(),
        tip,
        axis,
        confidence,
        wire_side_hint: None,
        barrel_pixel_support: 100,
    }
}

/// Three cameras whose lines all pass exactly through `p`, tips at `p`.
fn agreeing_cameras(p: Point2<f64>, confidence: f64) -> Vec<CameraCandidate> {
    vec![
        cand("cam0", p, Vector2::new(1.0, 0.2), confidence),
        cand("cam1", p, Vector2::new(-0.3, 1.0), confidence),
        cand("cam2", p, Vector2::new(0.7, -0.6), confidence),
    ]
}

#[test]
fn three_agreeing_cameras_score_triple_twenty() {
    // Calibration whose triple band covers radius 0.80.
    let rings = RingRadiiTable::new([0.05, 0.10, 0.75, 0.85, 0.95, 1.0]).unwrap();
    let engine = FusionEngine::new(BoardCalibration::new(rings, SegmentAngleTable::standard()));

    let p = PolarCoord::new(0.80, deg(90.0)).to_cartesian();
    let outcome = engine.score_dart(&agreeing_cameras(p, 0.9));

    assert_eq!(outcome.score.segment, 20);
    assert_eq!(outcome.score.ring, Ring::Triple);
    assert_eq!(outcome.score.multiplier, 3);
    assert_eq!(outcome.score.score, 60);
    assert_eq!(outcome.method, FusionMethod::Weighted);
    // Unanimous three-camera agreement.
    assert_eq!(outcome.confidence, 0.95);
    assert_eq!(outcome.fusion.contributing.len(), 3);
    assert!(outcome.fusion.residual < 1e-9);
}

#[test]
fn clamp_keeps_weighted_when_radii_agree() {
    let engine = FusionEngine::new(BoardCalibration::standard());
    // Exact agreement right next to the triple-outer boundary.
    let p = PolarCoord::new(0.640, deg(90.0)).to_cartesian();
    let outcome = engine.score_dart(&agreeing_cameras(p, 0.9));
    assert_eq!(outcome.method, FusionMethod::Weighted);
    assert!(!outcome.report.clamp_applied);
}

#[test]
fn clamp_falls_back_to_best_pair_near_ring_boundary() {
    let engine = FusionEngine::new(BoardCalibration::standard());

    // cam0 and cam1 cross exactly at (0, 0.60) with zero residual; cam2's
    // line runs parallel to cam0 at y = 0.68, dragging the weighted radius
    // to 0.64, just outside the triple-outer boundary at ~0.632.
    let candidates = vec![
        cand("cam0", Point2::new(0.0, 0.60), Vector2::new(1.0, 0.0), 0.9),
        cand("cam1", Point2::new(0.0, 0.60), Vector2::new(0.0, 1.0), 0.9),
        cand("cam2", Point2::new(0.0, 0.68), Vector2::new(1.0, 0.0), 0.9),
    ];
    let outcome = engine.score_dart(&candidates);

    assert_eq!(outcome.method, FusionMethod::ClampedBestPair);
    assert!(outcome.report.clamp_applied);
    // The clamped point keeps the best-pair radius, which is inside the
    // triple band; the unclamped weighted radius would have scored a
    // single.
    assert_eq!(outcome.score.ring, Ring::Triple);
    assert_eq!(outcome.score.segment, 20);
}

#[test]
fn weak_cameras_recover_through_soft_accept() {
    let engine = FusionEngine::new(BoardCalibration::standard());

    // Confidence 0.10 is below the primary inclusion floor (0.15) but
    // above the relaxed floor, so the primary cascade is degenerate and
    // soft accept recovers the dart.
    let p = PolarCoord::new(0.50, deg(90.0)).to_cartesian();
    let outcome = engine.score_dart(&agreeing_cameras(p, 0.10));

    assert_eq!(outcome.method, FusionMethod::SoftAccept);
    assert_eq!(outcome.score.segment, 20);
    assert_eq!(outcome.score.ring, Ring::SingleInner);
    assert!((outcome.confidence - 0.10).abs() < 1e-12);
    assert!(!outcome.is_miss());
}

#[test]
fn strong_subset_recovers_after_weighted_blowout() {
    let engine = FusionEngine::new(BoardCalibration::standard());
    engine
        .set_flag("enable_soft_accept", FlagValue::Bool(false))
        .unwrap();

    // Two strong cameras agree at (0, 0.70); a third, weaker camera
    // reports a wild horizontal line at y = 2.0 which pushes the weighted
    // fusion far off the board.
    let mut candidates = vec![
        cand("cam0", Point2::new(0.0, 0.70), Vector2::new(1.0, 0.0), 0.9),
        cand("cam1", Point2::new(0.0, 0.70), Vector2::new(0.0, 1.0), 0.9),
        cand("cam2", Point2::new(0.0, 2.0), Vector2::new(1.0, 0.0), 0.5),
    ];
    candidates[2].barrel_pixel_support = 30;

    let outcome = engine.score_dart(&candidates);
    assert_eq!(outcome.method, FusionMethod::MissRecovery);
    assert_eq!(outcome.score.segment, 20);
    assert_eq!(outcome.score.ring, Ring::SingleOuter);
    assert_eq!(outcome.fusion.contributing, vec!["cam0", "cam1"]);
    assert_eq!(outcome.confidence, 0.8);
}

#[test]
fn single_camera_with_bias_map_is_corrected_and_tagged() {
    // cam0 consistently reads 0.4 degrees high everywhere.
    let bins = [[0.4; ANGLE_BINS]; RADIUS_BINS];
    let map: BiasMap =
        serde_json::from_value(serde_json::json!({ "cameras": { "cam0": bins } })).unwrap();
    let engine = FusionEngine::new(BoardCalibration::standard())
        .with_bias(BiasStage::Apply(map));

    let tip = PolarCoord::new(0.60, deg(90.0)).to_cartesian();
    let candidates = vec![cand("cam0", tip, Vector2::new(0.0, -1.0), 0.9)];
    let outcome = engine.score_dart(&candidates);

    assert_eq!(outcome.method, FusionMethod::SingleCamera);
    assert!((outcome.fusion.polar.theta.to_degrees() - 89.6).abs() < 1e-9);
    assert!((outcome.confidence - 0.45).abs() < 1e-12);
    assert_eq!(outcome.fusion.contributing, vec!["cam0"]);
}

#[test]
fn single_weak_camera_stays_a_miss() {
    let engine = FusionEngine::new(BoardCalibration::standard());
    let tip = PolarCoord::new(0.60, deg(90.0)).to_cartesian();
    let mut candidate = cand("cam0", tip, Vector2::new(0.0, -1.0), 0.9);
    candidate.barrel_pixel_support = 10; // below the strong-support floor

    let outcome = engine.score_dart(&[candidate]);
    assert!(outcome.is_miss());
    assert_eq!(outcome.method, FusionMethod::NoDetection);
    assert!(outcome.fusion.contributing.is_empty());
    assert_eq!(outcome.confidence, 0.0);
}

#[test]
fn conflicting_wire_hints_keep_the_geometric_segment() {
    let engine = FusionEngine::new(BoardCalibration::standard());

    // Both lines pass exactly through the 81-degree wire at radius 0.8;
    // the tips sit 7 degrees apart in theta, so angular refinement is
    // gated out and the wire vote decides -- but the hints conflict with
    // equal confidence, so the geometric side must win.
    let p = PolarCoord::new(0.80, deg(81.0)).to_cartesian();
    let tip0 = PolarCoord::new(0.72, deg(85.0)).to_cartesian();
    let tip1 = PolarCoord::new(0.72, deg(78.0)).to_cartesian();
    let mut cam0 = cand("cam0", tip0, p - tip0, 0.8);
    let mut cam1 = cand("cam1", tip1, p - tip1, 0.8);
    cam0.wire_side_hint = Some(WireSideHint {
        toward: deg(81.0 + 90.0),
        confidence: 0.6,
    });
    cam1.wire_side_hint = Some(WireSideHint {
        toward: deg(81.0 - 90.0),
        confidence: 0.6,
    });

    let outcome = engine.score_dart(&[cam0, cam1]);
    assert!(outcome.report.wire_considered);
    assert!(!outcome.report.wire_adjudicated);
    // Pre-adjudication side of the 81-degree wire is the 20-wedge, and the
    // ring/multiplier never change in adjudication.
    assert_eq!(outcome.score.segment, 20);
    assert_eq!(outcome.score.multiplier, 1);
    assert_eq!(outcome.score.ring, Ring::SingleOuter);
}

#[test]
fn unanimous_wire_hints_flip_the_segment_only() {
    let engine = FusionEngine::new(BoardCalibration::standard());

    let p = PolarCoord::new(0.80, deg(81.1)).to_cartesian();
    let tip0 = PolarCoord::new(0.74, deg(83.0)).to_cartesian();
    let tip1 = PolarCoord::new(0.74, deg(79.5)).to_cartesian();
    let wire_ccw = WireSideHint {
        toward: deg(81.1 + 90.0),
        confidence: 0.8,
    };
    let mut cam0 = cand("cam0", tip0, p - tip0, 0.8);
    let mut cam1 = cand("cam1", tip1, p - tip1, 0.8);
    cam0.wire_side_hint = Some(wire_ccw);
    cam1.wire_side_hint = Some(wire_ccw);

    let outcome = engine.score_dart(&[cam0, cam1]);
    assert!(outcome.report.wire_adjudicated);
    assert_eq!(outcome.score.segment, 1);
    assert_eq!(outcome.score.multiplier, 1);
}

#[test]
fn board_edge_evidence_overrides_a_double_to_miss() {
    let engine = FusionEngine::new(BoardCalibration::standard());

    // All three lines cross at (0, 0.97), inside the double band, but the
    // tips themselves sit at the rim or beyond it.
    let candidates = vec![
        cand("cam0", Point2::new(-0.35, 0.97), Vector2::new(1.0, 0.0), 0.9),
        cand("cam1", Point2::new(0.0, 0.99), Vector2::new(0.0, 1.0), 0.9),
        cand("cam2", Point2::new(0.1, 1.07), Vector2::new(1.0, 1.0), 0.9),
    ];
    let outcome = engine.score_dart(&candidates);

    assert!(outcome.is_miss());
    assert_eq!(outcome.method, FusionMethod::EdgeMiss);
    assert!((outcome.confidence - 0.7).abs() < 1e-12);
}

#[test]
fn unknown_flag_is_surfaced_not_ignored() {
    let engine = FusionEngine::new(BoardCalibration::standard());
    let err = engine
        .set_flag("enable_time_travel", FlagValue::Bool(true))
        .unwrap_err();
    assert!(err.to_string().contains("enable_time_travel"));
}

#[test]
fn concurrent_darts_see_whole_config_snapshots() {
    let engine = FusionEngine::new(BoardCalibration::standard());
    let p = PolarCoord::new(0.60, deg(90.0)).to_cartesian();
    let candidates = agreeing_cameras(p, 0.9);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    let outcome = engine.score_dart(&candidates);
                    // Whatever the flags say mid-flip, the dart scores
                    // through one coherent configuration.
                    assert_eq!(outcome.score.segment, 20);
                    assert!(!outcome.is_miss());
                }
            });
        }
        scope.spawn(|| {
            for i in 0..50 {
                engine
                    .set_flag("enable_angular_refine", FlagValue::Bool(i % 2 == 0))
                    .unwrap();
                engine
                    .set_flag("weight_cap", FlagValue::Number(0.5 + (i % 5) as f64 * 0.1))
                    .unwrap();
            }
        });
    });
}

#[test]
fn outcome_serializes_for_the_request_boundary() {
    let engine = FusionEngine::new(BoardCalibration::standard());
    let p = PolarCoord::new(0.45, deg(12.0)).to_cartesian();
    let outcome = engine.score_dart(&agreeing_cameras(p, 0.85));

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["method"], "weighted");
    assert_eq!(json["score"]["segment"], outcome.score.segment as i64);
    assert!(json["report"]["cameras"].as_array().unwrap().len() == 3);
}
