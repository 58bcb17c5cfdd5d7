//! Warp a camera's dart axis into normalized board space.
//!
//! Samples are taken along the pixel axis behind the tip, mapped through a
//! homography fitted locally to the calibration control points (or through
//! the camera warp when no homography can be fitted), and a robust line is
//! fitted to them. The tip itself always goes through the camera warp.

use crate::calibration::CameraCalibration;
use crate::homography::{fit_homography_ransac, RansacParams};
use crate::line_fit::{fit_line_huber, HuberLineParams};
use log::trace;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AxisWarpParams {
    /// Number of samples along the pixel axis, tip included.
    pub samples: usize,
    /// Pixel distance of the farthest sample behind the tip.
    pub extent_px: f64,
    /// Length (board units) of the segment drawn back from the warped tip.
    pub segment_back: f64,
    pub ransac: RansacParams,
    pub line: HuberLineParams,
}

impl Default for AxisWarpParams {
    fn default() -> Self {
        Self {
            samples: 21,
            extent_px: 200.0,
            segment_back: 2.0,
            ransac: RansacParams::default(),
            line: HuberLineParams::default(),
        }
    }
}

/// A camera's dart axis in board space.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisLine {
    pub camera_id: String,
    /// Warped tip.
    pub tip: Point2<f64>,
    /// Unit direction pointing from the flight toward the tip.
    pub direction: Vector2<f64>,
    pub start: Point2<f64>,
    pub end: Point2<f64>,
}

/// How the axis samples were mapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleMapping {
    LocalHomography,
    DirectWarp,
}

fn unit(v: Vector2<f64>) -> Option<Vector2<f64>> {
    let n = v.norm();
    (n.is_finite() && n > 1e-12).then(|| v / n)
}

fn warp_samples(
    samples: &[Point2<f64>],
    cal: &CameraCalibration,
    params: &RansacParams,
) -> Option<(Vec<Point2<f64>>, SampleMapping)> {
    let (pixel, board): (Vec<_>, Vec<_>) = cal
        .correspondences
        .iter()
        .map(|c| (c.pixel, c.board))
        .unzip();

    if let Some(fit) = fit_homography_ransac(&pixel, &board, params) {
        let mapped: Option<Vec<_>> = samples.iter().map(|&p| fit.homography.apply(p)).collect();
        if let Some(mapped) = mapped {
            return Some((mapped, SampleMapping::LocalHomography));
        }
    }
    let mapped: Option<Vec<_>> = samples.iter().map(|&p| cal.to_board(p)).collect();
    mapped.map(|m| (m, SampleMapping::DirectWarp))
}

/// Same as [`warp_axis`], also reporting which sample mapping was used.
pub fn warp_axis_with_mapping(
    camera_id: &str,
    tip_px: Point2<f64>,
    direction_px: Vector2<f64>,
    cal: &CameraCalibration,
    params: &AxisWarpParams,
) -> Option<(AxisLine, SampleMapping)> {
    let v = unit(direction_px)?;
    let n = params.samples.max(2);
    let samples: Vec<_> = (0..n)
        .map(|t| {
            let frac = t as f64 / (n - 1) as f64;
            tip_px - v * (params.extent_px * (1.0 - frac))
        })
        .collect();

    let (warped, mapping) = warp_samples(&samples, cal, &params.ransac)?;
    let line = fit_line_huber(&warped, &params.line)?;

    let mut direction = unit(line.direction)?;
    // first sample is farthest from the tip
    if direction.dot(&(warped[n - 1] - warped[0])) < 0.0 {
        direction = -direction;
    }

    let tip = cal.to_board(tip_px)?;
    trace!(
        "axis {camera_id}: tip=({:.4}, {:.4}) dir=({:.4}, {:.4}) via {mapping:?}",
        tip.x,
        tip.y,
        direction.x,
        direction.y
    );
    Some((
        AxisLine {
            camera_id: camera_id.to_string(),
            tip,
            direction,
            start: tip - direction * params.segment_back,
            end: tip,
        },
        mapping,
    ))
}

/// Warp a pixel tip and axis direction into a board-space [`AxisLine`].
///
/// Returns `None` for a zero direction, non-finite warps or a degenerate fit.
pub fn warp_axis(
    camera_id: &str,
    tip_px: Point2<f64>,
    direction_px: Vector2<f64>,
    cal: &CameraCalibration,
    params: &AxisWarpParams,
) -> Option<AxisLine> {
    warp_axis_with_mapping(camera_id, tip_px, direction_px, cal, params).map(|(line, _)| line)
}

/// Board-space bearing of the axis in degrees: the angle of
/// `warp(tip) - warp(tip - extent * dir)`.
pub fn axis_bearing_deg(
    tip_px: Point2<f64>,
    direction_px: Vector2<f64>,
    cal: &CameraCalibration,
    extent_px: f64,
) -> Option<f64> {
    let v = unit(direction_px)?;
    let tip = cal.to_board(tip_px)?;
    let back = cal.to_board(tip_px - v * extent_px)?;
    let d = tip - back;
    Some(d.y.atan2(d.x).to_degrees())
}
