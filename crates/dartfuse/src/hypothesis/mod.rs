//! Hypothesis generation and selection.
//!
//! Competing estimates of the landing point are built from the baseline,
//! from every pair of camera axes and from every single camera's tip. Each
//! is scored against all camera axes and the rule selector picks at most
//! one to override the baseline.

mod features;

pub use features::CandidateFeatures;

use crate::inputs::{BaselineResult, ThrowInput};
use crate::outcome::{
    DecisionOutcome, PatchedResult, SelectionAbstain, SelectionReport, SelectionTrace,
    WedgeGuardCheck,
};
use crate::params::{FusionParams, HhsParams};
use crate::selector::{select_candidate, wedge_guard, SelectionReason};
use dartfuse_core::{
    intersect_lines, polar_angle_deg, score_point, warp_axis, wedge_index, AxisLine,
    AxisWarpParams, CameraCalibration, ScoreResult,
};
use features::compute_features;
use log::debug;
use nalgebra::Point2;
use serde::Serialize;
use std::collections::BTreeMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A camera whose axis made it into board space.
#[derive(Clone, Debug)]
pub struct CameraAxis {
    pub id: String,
    pub line: AxisLine,
    /// Axis quality `Q`, 0 when the camera has no valid evidence.
    pub quality: f64,
    pub inlier_count: u32,
    pub detection_quality: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CandidateKind {
    Baseline,
    Pair { a: String, b: String },
    Single { camera: String },
}

impl CandidateKind {
    /// `baseline`, `pair_<a>_<b>` or `single_<camera>`.
    pub fn label(&self) -> String {
        match self {
            CandidateKind::Baseline => "baseline".to_string(),
            CandidateKind::Pair { a, b } => format!("pair_{a}_{b}"),
            CandidateKind::Single { camera } => format!("single_{camera}"),
        }
    }
}

/// One hypothesis of the landing point in board space.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Candidate {
    pub kind: CandidateKind,
    pub coords: Point2<f64>,
    pub radius: f64,
    pub theta_deg: f64,
    pub score: ScoreResult,
    pub cameras_used: usize,
    pub features: CandidateFeatures,
}

impl Candidate {
    fn new(kind: CandidateKind, coords: Point2<f64>, cameras_used: usize) -> Self {
        Self {
            kind,
            coords,
            radius: coords.coords.norm(),
            theta_deg: polar_angle_deg(coords),
            score: score_point(coords),
            cameras_used,
            features: CandidateFeatures::default(),
        }
    }

    pub fn wedge(&self) -> usize {
        wedge_index(self.coords)
    }
}

/// Warp every camera that has a tip, an axis and a calibration.
///
/// Iterates in camera-id order; cameras whose warp fails are skipped.
pub fn prepare_cameras(
    input: &ThrowInput,
    calibrations: &BTreeMap<String, CameraCalibration>,
    params: &AxisWarpParams,
) -> Vec<CameraAxis> {
    let mut out = Vec::new();
    for (id, det) in &input.detections {
        let (Some(tip), Some(axis)) = (det.tip, det.axis) else {
            continue;
        };
        let Some(cal) = calibrations.get(id) else {
            continue;
        };
        let Some(line) = warp_axis(id, tip, axis, cal, params) else {
            debug!("camera {id}: axis warp failed");
            continue;
        };
        let (quality, inlier_count) = match input.axis_quality.get(id) {
            Some(q) if q.valid => (q.quality, q.inlier_count),
            _ => (0.0, 0),
        };
        out.push(CameraAxis {
            id: id.clone(),
            line,
            quality,
            inlier_count,
            detection_quality: det.detection_quality(),
        });
    }
    out
}

/// Build every enabled candidate and compute its features.
pub fn generate_candidates(
    baseline: &BaselineResult,
    cameras: &[CameraAxis],
    params: &HhsParams,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    if params.baseline_candidate && baseline.segment > 0 {
        candidates.push(Candidate::new(CandidateKind::Baseline, baseline.coords, cameras.len()));
    }

    if params.pair_candidates {
        for (i, a) in cameras.iter().enumerate() {
            for b in &cameras[i + 1..] {
                let Some(ix) = intersect_lines(a.line.start, a.line.end, b.line.start, b.line.end)
                else {
                    continue;
                };
                if ix.coords.norm() > params.max_candidate_radius {
                    continue;
                }
                let kind = CandidateKind::Pair {
                    a: a.id.clone(),
                    b: b.id.clone(),
                };
                candidates.push(Candidate::new(kind, ix, 2));
            }
        }
    }

    if params.single_candidates {
        for cam in cameras {
            let r = cam.line.tip.coords.norm();
            if r > params.max_candidate_radius || r < params.min_single_radius {
                continue;
            }
            let kind = CandidateKind::Single {
                camera: cam.id.clone(),
            };
            candidates.push(Candidate::new(kind, cam.line.tip, 1));
        }
    }

    let baseline_radius = baseline.radius();
    for c in &mut candidates {
        let own = match &c.kind {
            CandidateKind::Single { camera } => Some(camera.as_str()),
            _ => None,
        };
        c.features = compute_features(c.coords, own, cameras, baseline_radius, params);
    }
    candidates
}

fn patch_baseline(baseline: &BaselineResult, chosen: &Candidate, method: String) -> BaselineResult {
    let mut result = baseline.clone();
    result.coords = chosen.coords;
    result.segment = chosen.score.segment;
    result.multiplier = chosen.score.multiplier;
    result.score = chosen.score.score;
    result.method = method;
    result
}

fn method_tag(chosen: &Candidate, reason: SelectionReason) -> String {
    match reason {
        SelectionReason::FallbackBaseline => "HHS_fallback_baseline".to_string(),
        _ => format!("HHS_{}", chosen.kind.label()),
    }
}

/// Run hypothesis selection for one throw.
///
/// Never fails: every missing input or rejected selection ends in
/// [`DecisionOutcome::NoOverride`] with the reason in the report.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(cameras = input.detections.len()))
)]
pub fn select_hypothesis(
    input: &ThrowInput,
    calibrations: &BTreeMap<String, CameraCalibration>,
    params: &FusionParams,
) -> (DecisionOutcome, SelectionReport) {
    let hhs = &params.hhs;
    let mut report = SelectionReport::default();

    let cameras = prepare_cameras(input, calibrations, &params.axis);
    report.valid_cameras = cameras.iter().map(|c| c.id.clone()).collect();
    report.detection_quality = cameras
        .iter()
        .map(|c| (c.id.clone(), c.detection_quality))
        .collect();
    if cameras.len() < 2 {
        report.abstain = Some(SelectionAbstain::TooFewCameras {
            valid: cameras.len(),
        });
        return (DecisionOutcome::NoOverride, report);
    }

    let baseline = &input.baseline;
    let baseline_wedge = wedge_index(baseline.coords);
    report.candidates = generate_candidates(baseline, &cameras, hhs);
    debug!(
        "hhs: {} cameras, {} candidates, baseline wedge {baseline_wedge}",
        cameras.len(),
        report.candidates.len()
    );
    if report.candidates.is_empty() {
        report.abstain = Some(SelectionAbstain::NoCandidates);
        return (DecisionOutcome::NoOverride, report);
    }
    if !hhs.rule_selector {
        report.abstain = Some(SelectionAbstain::SelectorDisabled);
        return (DecisionOutcome::NoOverride, report);
    }

    let Some((idx, reason)) = select_candidate(&report.candidates, hhs) else {
        report.abstain = Some(SelectionAbstain::NoRuleFired);
        return (DecisionOutcome::NoOverride, report);
    };
    report.selected = Some((idx, reason));

    let chosen = &report.candidates[idx];
    let selected_wedge = chosen.wedge();
    let (passed, distance) = wedge_guard(baseline_wedge, selected_wedge, hhs.max_wedge_step);
    report.wedge_guard = Some(WedgeGuardCheck {
        baseline_wedge,
        selected_wedge,
        distance,
        passed,
    });
    if !passed {
        debug!("hhs: wedge guard rejected {} ({distance} wedges)", chosen.kind.label());
        report.abstain = Some(SelectionAbstain::WedgeGuard {
            baseline: baseline_wedge,
            selected: selected_wedge,
        });
        return (DecisionOutcome::NoOverride, report);
    }
    if reason == SelectionReason::TriHighConfidence {
        report.abstain = Some(SelectionAbstain::BaselineConfirmed);
        return (DecisionOutcome::NoOverride, report);
    }

    let method = method_tag(chosen, reason);
    debug!("hhs: override via {reason} -> {method}, score {}", chosen.score.score);
    let trace = SelectionTrace {
        selected: chosen.kind.label(),
        reason,
        candidate_count: report.candidates.len(),
        baseline_wedge,
        selected_wedge,
        residual: chosen.features.median_residual,
        axis_support: chosen.features.axis_support,
        quality: chosen.features.selection_quality(),
    };
    let patched = PatchedResult {
        result: patch_baseline(baseline, chosen, method),
        selection: Some(trace),
    };
    (DecisionOutcome::Override(Box::new(patched)), report)
}
