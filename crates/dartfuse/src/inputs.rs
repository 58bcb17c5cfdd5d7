//! Per-throw inputs produced by the upstream detection pipeline.

use dartfuse_core::ScoreResult;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw per-camera detection of one dart. Any field may be missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraDetection {
    /// Tip position in pixels.
    pub tip: Option<Point2<f64>>,
    /// Principal axis direction in pixels, pointing from the flight to the tip.
    pub axis: Option<Vector2<f64>>,
    pub inlier_ratio: f64,
    pub barrel_pixel_count: u32,
    pub barrel_aspect_ratio: f64,
    pub mask_quality: f64,
}

impl CameraDetection {
    /// Blend of axis inlier ratio, barrel size and barrel elongation in
    /// `[0.1, 1]`, halved when no barrel pixels were found.
    pub fn detection_quality(&self) -> f64 {
        let inlier = self.inlier_ratio.clamp(0.3, 1.0);
        let pixels = (self.barrel_pixel_count as f64 / 200.0).min(1.0);
        let aspect = (self.barrel_aspect_ratio / 8.0).min(1.0);
        let q = (0.5 * inlier + 0.3 * pixels + 0.2 * aspect).max(0.1);
        if self.barrel_pixel_count == 0 {
            q * 0.5
        } else {
            q
        }
    }
}

/// Axis-quality evidence for one camera.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisQuality {
    /// Quality score `Q` in `[0, 1]`.
    pub quality: f64,
    pub inlier_count: u32,
    pub axis_length_px: f64,
    pub valid: bool,
}

/// Debug record of a triangulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriangulationDebug {
    pub median_residual: f64,
    pub board_radius: f64,
    pub angle_spread_deg: f64,
    pub final_confidence: f64,
}

/// Result of the primary triangulation, possibly patched by an override.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaselineResult {
    pub coords: Point2<f64>,
    pub segment: u8,
    pub multiplier: u8,
    pub score: u16,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub total_error: f64,
    #[serde(default)]
    pub per_camera: BTreeMap<String, ScoreResult>,
    #[serde(default)]
    pub debug: Option<TriangulationDebug>,
}

impl BaselineResult {
    /// Baseline scored from its own coordinates with the polar mapper.
    pub fn from_coords(coords: Point2<f64>, method: impl Into<String>) -> Self {
        let s = dartfuse_core::score_point(coords);
        Self {
            coords,
            segment: s.segment,
            multiplier: s.multiplier,
            score: s.score,
            method: method.into(),
            confidence: 0.0,
            total_error: 0.0,
            per_camera: BTreeMap::new(),
            debug: None,
        }
    }

    #[inline]
    pub fn is_miss(&self) -> bool {
        self.multiplier == 0
    }

    pub fn radius(&self) -> f64 {
        self.coords.coords.norm()
    }
}

/// Everything known about one throw. Camera maps are ordered by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThrowInput {
    pub baseline: BaselineResult,
    #[serde(default)]
    pub detections: BTreeMap<String, CameraDetection>,
    #[serde(default)]
    pub axis_quality: BTreeMap<String, AxisQuality>,
}
