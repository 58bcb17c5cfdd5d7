//! Soft-accept rescue of throws the baseline records as a miss.
//!
//! Cameras are admitted with relaxed axis-quality thresholds, their warped
//! axes are re-intersected, and the result is accepted only if the camera
//! bearings agree, the intersection lies on the board and its residual is
//! comparable to a normal triangulation.

use crate::inputs::{BaselineResult, ThrowInput, TriangulationDebug};
use crate::outcome::{DecisionOutcome, PatchedResult};
use crate::params::{FusionParams, SapParams};
use dartfuse_core::{
    axis_bearing_deg, circular_arc_spread_deg, intersect_lines, score_point, warp_axis, AxisLine,
    CameraCalibration,
};
use log::debug;
use nalgebra::Point2;
use serde::Serialize;
use std::collections::BTreeMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

pub const SOFT_ACCEPT_METHOD: &str = "SoftAccept_RelaxedTriangulation";

/// A camera admitted under the relaxed thresholds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RelaxedCameraEvidence {
    pub camera_id: String,
    pub quality: f64,
    pub inlier_count: u32,
    pub axis_length_px: f64,
    pub bearing_deg: f64,
}

/// The check that stopped a soft-accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftAcceptGate {
    Disabled,
    BaselineNotMiss,
    CameraCount,
    AngularAgreement,
    AxisWarp,
    NoIntersection,
    BoardContainment,
    ResidualRatio,
}

impl std::fmt::Display for SoftAcceptGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SoftAcceptGate::Disabled => "disabled",
            SoftAcceptGate::BaselineNotMiss => "baseline_not_miss",
            SoftAcceptGate::CameraCount => "camera_count",
            SoftAcceptGate::AngularAgreement => "angular_agreement",
            SoftAcceptGate::AxisWarp => "axis_warp",
            SoftAcceptGate::NoIntersection => "no_intersection",
            SoftAcceptGate::BoardContainment => "board_containment",
            SoftAcceptGate::ResidualRatio => "residual_ratio",
        };
        f.write_str(s)
    }
}

/// Diagnostics of one soft-accept attempt.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SoftAcceptReport {
    pub cameras: Vec<RelaxedCameraEvidence>,
    pub spread_deg: Option<f64>,
    pub intersection: Option<Point2<f64>>,
    pub board_radius: Option<f64>,
    pub residual: Option<f64>,
    pub reference_residual: Option<f64>,
    pub failed_gate: Option<SoftAcceptGate>,
    pub applied: bool,
}

impl SoftAcceptReport {
    pub fn camera_ids(&self) -> Vec<&str> {
        self.cameras.iter().map(|c| c.camera_id.as_str()).collect()
    }

    fn fail(mut self, gate: SoftAcceptGate) -> (DecisionOutcome, Self) {
        debug!("sap: rejected at {gate}");
        self.failed_gate = Some(gate);
        (DecisionOutcome::NoOverride, self)
    }
}

/// Cameras passing the relaxed acceptance, in camera-id order.
pub fn relaxed_cameras(
    input: &ThrowInput,
    calibrations: &BTreeMap<String, CameraCalibration>,
    params: &SapParams,
) -> Vec<RelaxedCameraEvidence> {
    let mut out = Vec::new();
    for (id, q) in &input.axis_quality {
        if !q.valid {
            continue;
        }
        let soft_ok = q.quality >= params.min_quality && q.axis_length_px >= params.min_axis_length_px;
        let strict_ok = soft_ok && q.inlier_count >= params.min_inliers;
        if !(strict_ok || (params.weak_camera_inclusion && soft_ok)) {
            continue;
        }

        let (Some(cal), Some(det)) = (calibrations.get(id), input.detections.get(id)) else {
            continue;
        };
        let (Some(tip), Some(axis)) = (det.tip, det.axis) else {
            continue;
        };
        let Some(bearing) = axis_bearing_deg(tip, axis, cal, params.bearing_extent_px) else {
            continue;
        };
        out.push(RelaxedCameraEvidence {
            camera_id: id.clone(),
            quality: q.quality,
            inlier_count: q.inlier_count,
            axis_length_px: q.axis_length_px,
            bearing_deg: bearing,
        });
    }
    out
}

/// Pairwise intersection minimizing the summed distance to both tips.
fn best_intersection(lines: &[AxisLine]) -> Option<(Point2<f64>, f64)> {
    let mut best: Option<(Point2<f64>, f64)> = None;
    for (i, a) in lines.iter().enumerate() {
        for b in &lines[i + 1..] {
            let Some(ix) = intersect_lines(a.start, a.end, b.start, b.end) else {
                continue;
            };
            let err = (ix - a.end).norm() + (ix - b.end).norm();
            if best.map_or(true, |(_, e)| err < e) {
                best = Some((ix, err));
            }
        }
    }
    best
}

fn reference_residual(baseline: &BaselineResult, params: &SapParams) -> f64 {
    baseline
        .debug
        .map(|d| d.median_residual)
        .filter(|&r| r > params.reference_floor)
        .unwrap_or(params.historical_median_residual)
}

/// Try to rescue a missed throw.
///
/// Returns [`DecisionOutcome::NoOverride`] unless every gate passes.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(cameras = input.axis_quality.len()))
)]
pub fn soft_accept(
    input: &ThrowInput,
    calibrations: &BTreeMap<String, CameraCalibration>,
    params: &FusionParams,
) -> (DecisionOutcome, SoftAcceptReport) {
    let sap = &params.sap;
    let report = SoftAcceptReport::default();
    if !sap.enabled || !sap.relaxed_triangulation {
        return report.fail(SoftAcceptGate::Disabled);
    }
    let baseline = &input.baseline;
    if !baseline.is_miss() {
        return report.fail(SoftAcceptGate::BaselineNotMiss);
    }

    let mut report = SoftAcceptReport {
        cameras: relaxed_cameras(input, calibrations, sap),
        ..report
    };
    debug!("sap: relaxed cameras {:?}", report.camera_ids());
    if report.cameras.len() < sap.min_cameras {
        return report.fail(SoftAcceptGate::CameraCount);
    }

    let bearings: Vec<f64> = report.cameras.iter().map(|c| c.bearing_deg).collect();
    let spread = circular_arc_spread_deg(&bearings);
    report.spread_deg = Some(spread);
    if spread > sap.max_spread_deg {
        return report.fail(SoftAcceptGate::AngularAgreement);
    }

    let lines: Vec<AxisLine> = report
        .cameras
        .iter()
        .filter_map(|c| {
            let cal = calibrations.get(&c.camera_id)?;
            let det = input.detections.get(&c.camera_id)?;
            warp_axis(&c.camera_id, det.tip?, det.axis?, cal, &params.axis)
        })
        .collect();
    if lines.len() < 2 {
        return report.fail(SoftAcceptGate::AxisWarp);
    }

    let Some((ix, residual)) = best_intersection(&lines) else {
        return report.fail(SoftAcceptGate::NoIntersection);
    };
    let radius = ix.coords.norm();
    report.intersection = Some(ix);
    report.board_radius = Some(radius);
    report.residual = Some(residual);

    if sap.containment_gate && radius > sap.board_outer_radius {
        return report.fail(SoftAcceptGate::BoardContainment);
    }

    let reference = reference_residual(baseline, sap);
    report.reference_residual = Some(reference);
    if residual > reference * sap.max_residual_ratio {
        return report.fail(SoftAcceptGate::ResidualRatio);
    }

    let score = score_point(ix);
    let confidence = report
        .cameras
        .iter()
        .map(|c| c.quality)
        .fold(1.0, f64::min);

    let mut result = baseline.clone();
    result.coords = ix;
    result.segment = score.segment;
    result.multiplier = score.multiplier;
    result.score = score.score;
    result.method = SOFT_ACCEPT_METHOD.to_string();
    result.confidence = confidence;
    result.total_error = residual;
    result.debug = Some(TriangulationDebug {
        median_residual: residual,
        board_radius: radius,
        angle_spread_deg: spread,
        final_confidence: confidence,
    });
    debug!(
        "sap: accepted {} (r={radius:.3}, residual={residual:.4}, spread={spread:.2})",
        score.score
    );

    report.applied = true;
    let patched = PatchedResult {
        result,
        selection: None,
    };
    (DecisionOutcome::Override(Box::new(patched)), report)
}
