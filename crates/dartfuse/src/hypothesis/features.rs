use super::CameraAxis;
use crate::params::HhsParams;
use dartfuse_core::{perpendicular_distance, ring_boundary_distance, upper_median};
use nalgebra::Point2;
use serde::Serialize;
use std::collections::BTreeMap;

/// Evidence for one candidate, gathered over every valid camera.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CandidateFeatures {
    /// Upper median of the per-camera residuals.
    pub median_residual: f64,
    /// Cameras whose residual is strictly below `r1`.
    pub inlier_cameras: usize,
    /// Perpendicular distance to each camera's axis line.
    pub residuals: BTreeMap<String, f64>,
    pub axis_support: u32,
    pub quality_sum: f64,
    pub quality_max: f64,
    /// Quality of the producing camera, single-camera candidates only.
    pub own_quality: Option<f64>,
    pub ring_boundary_distance: f64,
    pub radial_delta: f64,
}

impl CandidateFeatures {
    /// Quality used when ranking candidates: the producing camera's own
    /// quality if there is one, else the best over all cameras.
    pub fn selection_quality(&self) -> f64 {
        self.own_quality.unwrap_or(self.quality_max)
    }

    /// Largest residual over cameras other than `camera`; 0 if none.
    pub fn max_residual_excluding(&self, camera: &str) -> f64 {
        self.residuals
            .iter()
            .filter(|(id, _)| id.as_str() != camera)
            .map(|(_, r)| *r)
            .fold(0.0, f64::max)
    }
}

pub(crate) fn compute_features(
    coords: Point2<f64>,
    own_camera: Option<&str>,
    cameras: &[CameraAxis],
    baseline_radius: f64,
    params: &HhsParams,
) -> CandidateFeatures {
    let mut f = CandidateFeatures::default();
    for cam in cameras {
        let line = &cam.line;
        let res = perpendicular_distance(coords, line.end, line.direction);
        f.residuals.insert(cam.id.clone(), res);
        if res < params.r1 {
            f.inlier_cameras += 1;
        }

        f.quality_sum += cam.quality;
        f.quality_max = f.quality_max.max(cam.quality);

        // camera's axis must point roughly toward the candidate
        if cam.inlier_count > 0
            && (coords - line.tip).dot(&line.direction) > -params.axis_support_slack
        {
            f.axis_support += cam.inlier_count;
        }

        if own_camera == Some(cam.id.as_str()) {
            f.own_quality = Some(cam.quality);
        }
    }

    let values: Vec<f64> = f.residuals.values().copied().collect();
    f.median_residual = upper_median(&values).unwrap_or(0.0);
    let radius = coords.coords.norm();
    f.ring_boundary_distance = ring_boundary_distance(radius);
    f.radial_delta = (radius - baseline_radius).abs();
    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use dartfuse_core::AxisLine;
    use nalgebra::Vector2;

    fn cam(id: &str, tip: Point2<f64>, dir: Vector2<f64>, q: f64, inliers: u32) -> CameraAxis {
        let direction = dir.normalize();
        CameraAxis {
            id: id.to_string(),
            line: AxisLine {
                camera_id: id.to_string(),
                tip,
                direction,
                start: tip - direction * 2.0,
                end: tip,
            },
            quality: q,
            inlier_count: inliers,
            detection_quality: 0.5,
        }
    }

    #[test]
    fn residuals_inliers_and_quality() {
        let cams = [
            cam("a", Point2::new(0.3, 0.0), Vector2::new(1.0, 0.0), 0.7, 50),
            cam("b", Point2::new(0.31, 0.01), Vector2::new(0.0, 1.0), 0.5, 20),
            cam("c", Point2::new(0.3, 0.2), Vector2::new(1.0, 0.0), 0.9, 0),
        ];
        let f = compute_features(Point2::new(0.3, 0.0), None, &cams, 0.29, &HhsParams::default());
        assert_eq!(f.residuals["a"], 0.0);
        assert!((f.residuals["b"] - 0.01).abs() < 1e-12);
        assert!((f.residuals["c"] - 0.2).abs() < 1e-12);
        assert_eq!(f.inlier_cameras, 2);
        assert!((f.median_residual - 0.01).abs() < 1e-12);
        assert!((f.quality_sum - 2.1).abs() < 1e-12);
        assert_eq!(f.quality_max, 0.9);
        assert!((f.radial_delta - 0.01).abs() < 1e-12);
        assert_eq!(f.own_quality, None);
        // b points +y from y=0.01, candidate sits 0.01 behind: still within slack
        assert_eq!(f.axis_support, 70);
    }

    #[test]
    fn axis_support_ignores_cameras_pointing_away() {
        let cams = [cam("a", Point2::new(0.5, 0.0), Vector2::new(1.0, 0.0), 0.7, 50)];
        let behind = compute_features(Point2::new(0.3, 0.0), None, &cams, 0.0, &HhsParams::default());
        assert_eq!(behind.axis_support, 0);
        let ahead = compute_features(Point2::new(0.6, 0.0), None, &cams, 0.0, &HhsParams::default());
        assert_eq!(ahead.axis_support, 50);
    }

    #[test]
    fn own_quality_and_other_residuals() {
        let cams = [
            cam("a", Point2::new(0.3, 0.0), Vector2::new(1.0, 0.0), 0.65, 50),
            cam("b", Point2::new(0.3, 0.03), Vector2::new(1.0, 0.0), 0.9, 50),
        ];
        let f = compute_features(Point2::new(0.3, 0.0), Some("a"), &cams, 0.3, &HhsParams::default());
        assert_eq!(f.own_quality, Some(0.65));
        assert_eq!(f.selection_quality(), 0.65);
        assert!((f.max_residual_excluding("a") - 0.03).abs() < 1e-12);
    }
}
