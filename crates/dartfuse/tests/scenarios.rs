use dartfuse::core::{CameraCalibration, Correspondence, Homography};
use dartfuse::{
    soft_accept, status_code, AxisQuality, BaselineResult, CameraDetection, DecisionOutcome,
    FusionEngine, FusionParams, SelectionAbstain, SelectionReason, SoftAcceptGate, ThrowInput,
    TriangulationDebug, SOFT_ACCEPT_METHOD,
};
use nalgebra::{Point2, Vector2};
use std::collections::BTreeMap;

/// Every camera sees the board through the same affine map:
/// pixel (u, v) -> board ((u - 500) / 400, (400 - v) / 400).
fn board_homography() -> Homography {
    Homography::from_array([
        [1.0 / 400.0, 0.0, -500.0 / 400.0],
        [0.0, -1.0 / 400.0, 1.0],
        [0.0, 0.0, 1.0],
    ])
}

fn to_pixel(p: Point2<f64>) -> Point2<f64> {
    Point2::new(500.0 + 400.0 * p.x, 400.0 - 400.0 * p.y)
}

fn grid_correspondences() -> Vec<Correspondence> {
    let h = board_homography();
    let mut out = Vec::new();
    for i in 0..5 {
        for j in 0..5 {
            let pixel = Point2::new(150.0 + 175.0 * i as f64, 50.0 + 175.0 * j as f64);
            out.push(Correspondence {
                pixel,
                board: h.apply(pixel).expect("finite"),
            });
        }
    }
    out
}

/// Dart whose tip lands at `tip` (board space), pointing along `dir`.
fn detection(tip: Point2<f64>, dir: Vector2<f64>) -> CameraDetection {
    CameraDetection {
        tip: Some(to_pixel(tip)),
        axis: Some(Vector2::new(dir.x, -dir.y)),
        inlier_ratio: 0.8,
        barrel_pixel_count: 150,
        barrel_aspect_ratio: 6.0,
        mask_quality: 0.7,
    }
}

fn quality(q: f64, inliers: u32, len: f64) -> AxisQuality {
    AxisQuality {
        quality: q,
        inlier_count: inliers,
        axis_length_px: len,
        valid: true,
    }
}

struct Throw {
    cameras: Vec<(&'static str, CameraDetection, AxisQuality)>,
    baseline: BaselineResult,
}

impl Throw {
    fn input(&self) -> ThrowInput {
        ThrowInput {
            baseline: self.baseline.clone(),
            detections: self
                .cameras
                .iter()
                .map(|(id, d, _)| (id.to_string(), d.clone()))
                .collect(),
            axis_quality: self
                .cameras
                .iter()
                .map(|(id, _, q)| (id.to_string(), *q))
                .collect(),
        }
    }

    fn calibrations(&self, with_points: bool) -> BTreeMap<String, CameraCalibration> {
        let points = if with_points {
            grid_correspondences()
        } else {
            Vec::new()
        };
        self.cameras
            .iter()
            .map(|(id, _, _)| {
                (
                    id.to_string(),
                    CameraCalibration::projective(board_homography(), points.clone()),
                )
            })
            .collect()
    }
}

fn hhs_params() -> FusionParams {
    FusionParams::default().with_flag("UseHHS", 1).unwrap()
}

fn sap_params() -> FusionParams {
    FusionParams::default()
        .with_flag("UseSoftAcceptPrevention", 1)
        .unwrap()
}

fn polar_point(angle_deg: f64, r: f64) -> Point2<f64> {
    let a = angle_deg.to_radians();
    Point2::new(-r * a.cos(), r * a.sin())
}

fn agreeing_bull_throw() -> Throw {
    let p = Point2::new(0.02, -0.01);
    let d = 0.004;
    let diag = Vector2::new(1.0, 1.0).normalize();
    let normal = Vector2::new(-1.0, 1.0).normalize();
    Throw {
        cameras: vec![
            (
                "cam0",
                detection(p + Vector2::new(0.0, d), Vector2::new(1.0, 0.0)),
                quality(0.8, 60, 80.0),
            ),
            (
                "cam1",
                detection(p + Vector2::new(d, 0.0), Vector2::new(0.0, 1.0)),
                quality(0.7, 55, 70.0),
            ),
            (
                "cam2",
                detection(p + normal * d, diag),
                quality(0.75, 50, 75.0),
            ),
        ],
        baseline: BaselineResult::from_coords(p, "tri"),
    }
}

#[test]
fn agreeing_cameras_confirm_baseline() {
    let throw = agreeing_bull_throw();
    let engine = FusionEngine::new(throw.calibrations(true), hhs_params());
    let input = throw.input();
    let decision = engine.evaluate(&input);

    assert_eq!(decision.outcome, DecisionOutcome::NoOverride);
    let report = decision.selection.as_ref().expect("hhs ran");
    assert_eq!(report.valid_cameras, ["cam0", "cam1", "cam2"]);
    let (idx, reason) = report.selected.expect("rule fired");
    assert_eq!(reason, SelectionReason::TriHighConfidence);
    let chosen = &report.candidates[idx];
    assert_eq!(chosen.features.inlier_cameras, 3);
    assert!((chosen.features.median_residual - 0.004).abs() < 1e-6);
    assert_eq!(report.abstain, Some(SelectionAbstain::BaselineConfirmed));

    let final_result = decision.final_result(&input.baseline);
    assert_eq!(final_result.score, 50);
    assert_eq!(final_result.method, "tri");
}

/// Two cameras whose axes are 4 degrees apart and cross at radius 0.95
/// on segment 20, each tip 0.015 past the crossing.
fn rescued_miss_throw() -> Throw {
    let ix = Point2::new(0.0, 0.95);
    let da = Vector2::new(88f64.to_radians().cos(), 88f64.to_radians().sin());
    let db = Vector2::new(92f64.to_radians().cos(), 92f64.to_radians().sin());
    let mut baseline = BaselineResult::from_coords(Point2::new(0.0, 1.2), "tri");
    baseline.segment = 0;
    baseline.multiplier = 0;
    baseline.score = 0;
    Throw {
        cameras: vec![
            ("cam0", detection(ix + da * 0.015, da), quality(0.55, 35, 40.0)),
            // weak camera: too few inliers for strict admission
            ("cam1", detection(ix + db * 0.015, db), quality(0.45, 10, 30.0)),
        ],
        baseline,
    }
}

#[test]
fn relaxed_triangulation_rescues_miss() {
    let throw = rescued_miss_throw();
    assert!(throw.baseline.is_miss());
    let engine = FusionEngine::new(throw.calibrations(false), sap_params());
    let decision = engine.evaluate(&throw.input());

    let patched = decision.outcome.patched().expect("soft accept");
    let r = &patched.result;
    assert_eq!(r.method, SOFT_ACCEPT_METHOD);
    assert_eq!((r.segment, r.multiplier, r.score), (20, 2, 40));
    assert!((r.coords - Point2::new(0.0, 0.95)).norm() < 1e-9);
    assert!((r.total_error - 0.03).abs() < 1e-9);
    assert_eq!(r.confidence, 0.45);
    let debug = r.debug.expect("debug record");
    assert!((debug.board_radius - 0.95).abs() < 1e-9);
    assert!((debug.angle_spread_deg - 4.0).abs() < 1e-6);

    let report = decision.soft_accept.as_ref().expect("sap ran");
    assert!(report.applied);
    assert_eq!(report.camera_ids(), ["cam0", "cam1"]);
    assert_eq!(report.failed_gate, None);
    assert_eq!(report.reference_residual, Some(0.04));
}

#[test]
fn soft_accept_gates_are_monotonic() {
    let throw = rescued_miss_throw();
    let cals = throw.calibrations(false);
    let input = throw.input();

    let base = sap_params();
    assert!(soft_accept(&input, &cals, &base).0.is_override());

    let mut spread = base.clone();
    spread.sap.max_spread_deg = 3.0;
    let (outcome, report) = soft_accept(&input, &cals, &spread);
    assert_eq!(outcome, DecisionOutcome::NoOverride);
    assert_eq!(report.failed_gate, Some(SoftAcceptGate::AngularAgreement));

    let mut radius = base.clone();
    radius.sap.board_outer_radius = 0.9;
    let (outcome, report) = soft_accept(&input, &cals, &radius);
    assert_eq!(outcome, DecisionOutcome::NoOverride);
    assert_eq!(report.failed_gate, Some(SoftAcceptGate::BoardContainment));

    let mut ratio = base.clone();
    ratio.sap.max_residual_ratio = 0.5;
    let (outcome, report) = soft_accept(&input, &cals, &ratio);
    assert_eq!(outcome, DecisionOutcome::NoOverride);
    assert_eq!(report.failed_gate, Some(SoftAcceptGate::ResidualRatio));

    // a tight baseline residual tightens the reference as well
    let mut tight = throw.input();
    tight.baseline.debug = Some(TriangulationDebug {
        median_residual: 0.01,
        ..TriangulationDebug::default()
    });
    let (_, report) = soft_accept(&tight, &cals, &base);
    assert_eq!(report.failed_gate, Some(SoftAcceptGate::ResidualRatio));

    let mut strict = base.clone();
    strict.set_flag("SAP_EnableWeakCamInclusion", 0).unwrap();
    let (_, report) = soft_accept(&input, &cals, &strict);
    assert_eq!(report.failed_gate, Some(SoftAcceptGate::CameraCount));
}

#[test]
fn soft_accept_needs_a_missed_baseline() {
    let mut throw = rescued_miss_throw();
    throw.baseline = BaselineResult::from_coords(Point2::new(0.0, 0.95), "tri");
    assert!(!throw.baseline.is_miss());
    let cals = throw.calibrations(false);

    let engine = FusionEngine::new(cals.clone(), sap_params());
    let decision = engine.evaluate(&throw.input());
    assert_eq!(decision.outcome, DecisionOutcome::NoOverride);
    assert!(decision.soft_accept.is_none());

    let (outcome, report) = soft_accept(&throw.input(), &cals, &sap_params());
    assert_eq!(outcome, DecisionOutcome::NoOverride);
    assert_eq!(report.failed_gate, Some(SoftAcceptGate::BaselineNotMiss));
}

#[test]
fn soft_accept_is_off_by_default() {
    let throw = rescued_miss_throw();
    let engine = FusionEngine::new(throw.calibrations(false), FusionParams::default());
    let decision = engine.evaluate(&throw.input());
    assert_eq!(decision.outcome, DecisionOutcome::NoOverride);
    assert!(decision.selection.is_none());
    assert!(decision.soft_accept.is_none());
}

/// Camera 0 sees the tip on the segment-20 centerline; camera 1's parallel
/// axis runs `offset` to the side.
fn single_camera_throw(offset: f64) -> Throw {
    let up = Vector2::new(0.0, 1.0);
    Throw {
        cameras: vec![
            (
                "camA",
                detection(Point2::new(0.0, 0.5), up),
                quality(0.65, 50, 60.0),
            ),
            (
                "camB",
                detection(Point2::new(offset, 0.48), up),
                quality(0.5, 0, 40.0),
            ),
        ],
        baseline: BaselineResult::from_coords(Point2::new(0.0, 0.52), "tri"),
    }
}

#[test]
fn single_camera_rule_rejects_far_second_camera() {
    let throw = single_camera_throw(0.03);
    let engine = FusionEngine::new(throw.calibrations(false), hhs_params());
    let decision = engine.evaluate(&throw.input());
    assert_eq!(decision.outcome, DecisionOutcome::NoOverride);

    let report = decision.selection.expect("hhs ran");
    let single = report
        .candidates
        .iter()
        .find(|c| c.kind.label() == "single_camA")
        .expect("single candidate");
    assert_eq!(single.features.axis_support, 50);
    assert_eq!(single.features.selection_quality(), 0.65);
    assert!((single.features.max_residual_excluding("camA") - 0.03).abs() < 1e-9);
    assert_eq!(report.abstain, Some(SelectionAbstain::NoRuleFired));
}

#[test]
fn single_camera_rule_overrides_when_cameras_agree() {
    let throw = single_camera_throw(0.02);
    let engine = FusionEngine::new(throw.calibrations(false), hhs_params());
    let decision = engine.evaluate(&throw.input());

    let patched = decision.outcome.patched().expect("override");
    assert_eq!(patched.result.method, "HHS_single_camA");
    assert!((patched.result.coords - Point2::new(0.0, 0.5)).norm() < 1e-9);
    let trace = patched.selection.as_ref().expect("trace");
    assert_eq!(trace.reason, SelectionReason::SingleAxisQuality);
    assert_eq!(trace.selected, "single_camA");
    assert_eq!(trace.baseline_wedge, 0);
    assert_eq!(trace.selected_wedge, 0);
    assert_eq!(trace.quality, 0.65);
}

#[test]
fn explicit_fallback_readopts_baseline() {
    let throw = single_camera_throw(0.03);
    let params = hhs_params().with_flag("HHS_FallbackToDev4", 0).unwrap();
    let engine = FusionEngine::new(throw.calibrations(false), params);
    let input = throw.input();
    let decision = engine.evaluate(&input);

    let patched = decision.outcome.patched().expect("override");
    assert_eq!(patched.result.method, "HHS_fallback_baseline");
    assert_eq!(patched.result.coords, input.baseline.coords);
    assert_eq!(patched.result.score, input.baseline.score);
    assert_eq!(
        patched.selection.as_ref().map(|t| t.reason),
        Some(SelectionReason::FallbackBaseline)
    );
}

/// Two low-quality cameras crossing at `ix`; baseline on segment 20.
fn pair_throw(ix: Point2<f64>) -> Throw {
    Throw {
        cameras: vec![
            (
                "camA",
                detection(ix + Vector2::new(0.02, 0.0), Vector2::new(1.0, 0.0)),
                quality(0.3, 20, 40.0),
            ),
            (
                "camB",
                detection(ix + Vector2::new(0.0, 0.02), Vector2::new(0.0, 1.0)),
                quality(0.3, 20, 40.0),
            ),
        ],
        baseline: BaselineResult::from_coords(Point2::new(0.0, 0.5), "tri"),
    }
}

#[test]
fn pair_in_neighbouring_wedge_overrides() {
    let ix = polar_point(102.0, 0.5);
    let throw = pair_throw(ix);
    let engine = FusionEngine::new(throw.calibrations(false), hhs_params());
    let decision = engine.evaluate(&throw.input());

    let patched = decision.outcome.patched().expect("override");
    assert_eq!(patched.result.method, "HHS_pair_camA_camB");
    assert_eq!((patched.result.segment, patched.result.score), (1, 1));
    let trace = patched.selection.as_ref().expect("trace");
    assert_eq!(trace.reason, SelectionReason::PairLowResidual);
    assert_eq!((trace.baseline_wedge, trace.selected_wedge), (0, 1));
    assert_eq!(trace.candidate_count, 4);
}

#[test]
fn wedge_guard_blocks_distant_pair() {
    let throw = pair_throw(Point2::new(0.5, 0.0));
    let engine = FusionEngine::new(throw.calibrations(false), hhs_params());
    let decision = engine.evaluate(&throw.input());

    assert_eq!(decision.outcome, DecisionOutcome::NoOverride);
    let report = decision.selection.expect("hhs ran");
    let guard = report.wedge_guard.expect("guard evaluated");
    assert!(!guard.passed);
    assert_eq!(guard.distance, 5);
    assert!(matches!(
        report.abstain,
        Some(SelectionAbstain::WedgeGuard { baseline: 0, selected: 5 })
    ));
}

#[test]
fn selector_can_be_disabled() {
    let throw = pair_throw(polar_point(102.0, 0.5));
    let params = hhs_params().with_flag("HHS_EnableRuleSelector", 0).unwrap();
    let engine = FusionEngine::new(throw.calibrations(false), params);
    let decision = engine.evaluate(&throw.input());
    assert_eq!(decision.outcome, DecisionOutcome::NoOverride);
    let report = decision.selection.expect("hhs ran");
    assert_eq!(report.candidates.len(), 4);
    assert_eq!(report.abstain, Some(SelectionAbstain::SelectorDisabled));
}

#[test]
fn one_valid_camera_abstains() {
    let mut throw = agreeing_bull_throw();
    throw.cameras[1].1.axis = None;
    throw.cameras[2].1.tip = None;
    let engine = FusionEngine::new(throw.calibrations(false), hhs_params());
    let decision = engine.evaluate(&throw.input());
    assert_eq!(decision.outcome, DecisionOutcome::NoOverride);
    assert_eq!(
        decision.selection.expect("hhs ran").abstain,
        Some(SelectionAbstain::TooFewCameras { valid: 1 })
    );
}

#[test]
fn decisions_are_deterministic_and_order_independent() {
    let throw = pair_throw(polar_point(102.0, 0.5));
    let engine = FusionEngine::new(throw.calibrations(true), hhs_params());
    let input = throw.input();
    let first = engine.evaluate(&input);
    let second = engine.evaluate(&input);
    assert_eq!(first, second);

    let mut reversed = throw.input();
    reversed.detections = throw
        .cameras
        .iter()
        .rev()
        .map(|(id, d, _)| (id.to_string(), d.clone()))
        .collect();
    assert_eq!(engine.evaluate(&reversed), first);
}

#[test]
fn unknown_flag_reports_error_code() {
    let mut params = FusionParams::default();
    let before = format!("{params:?}");
    let result = params.set_flag("HHS_Bogus", 3);
    assert_eq!(status_code(&result), -1);
    assert_eq!(format!("{params:?}"), before);
    assert_eq!(status_code(&params.set_flag("HHS_R1", 120)), 0);
}
