//! Per-camera ellipse calibration of the board rings.

use crate::board::SECTOR_COUNT;
use crate::warp::Correspondence;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Ellipse in pixel space: center, full axis lengths, rotation in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EllipseData {
    pub center: Point2<f64>,
    pub width: f64,
    pub height: f64,
    pub rotation_deg: f64,
}

impl EllipseData {
    /// Polar radius of the ellipse at `angle_rad`, relative to its own axes.
    pub fn radius_at_angle(&self, angle_rad: f64) -> f64 {
        let a = self.width / 2.0;
        let b = self.height / 2.0;
        let theta = angle_rad - self.rotation_deg.to_radians();
        let (sin_t, cos_t) = theta.sin_cos();
        let denom = ((b * cos_t).powi(2) + (a * sin_t).powi(2)).sqrt();
        if denom < 1e-6 {
            return 0.0;
        }
        a * b / denom
    }

    /// First crossing of the ray `origin + t * (cos, sin)`, `t > 0`.
    pub fn ray_intersection(&self, origin: Point2<f64>, angle_rad: f64) -> Option<Point2<f64>> {
        let a = self.width / 2.0;
        let b = self.height / 2.0;
        if a <= 0.0 || b <= 0.0 {
            return None;
        }
        let (sin_r, cos_r) = self.rotation_deg.to_radians().sin_cos();
        let dir = Vector2::new(angle_rad.cos(), angle_rad.sin());

        // ray in ellipse-local coordinates
        let o = origin - self.center;
        let u0 = o.x * cos_r + o.y * sin_r;
        let v0 = -o.x * sin_r + o.y * cos_r;
        let du = dir.x * cos_r + dir.y * sin_r;
        let dv = -dir.x * sin_r + dir.y * cos_r;

        let qa = du * du / (a * a) + dv * dv / (b * b);
        let qb = 2.0 * (u0 * du / (a * a) + v0 * dv / (b * b));
        let qc = u0 * u0 / (a * a) + v0 * v0 / (b * b) - 1.0;
        let disc = qb * qb - 4.0 * qa * qc;
        if disc < 0.0 || qa.abs() < 1e-15 {
            return None;
        }
        let sq = disc.sqrt();
        let t1 = (-qb + sq) / (2.0 * qa);
        let t2 = (-qb - sq) / (2.0 * qa);
        let t = [t1.min(t2), t1.max(t2)].into_iter().find(|&t| t > 0.0)?;
        Some(origin + dir * t)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EllipseCalibrationError {
    #[error("expected {expected} segment boundary angles, got {got}")]
    SegmentAngleCount { expected: usize, got: usize },
    #[error("segment-20 index {0} out of range")]
    Segment20Index(usize),
    #[error("non-finite segment boundary angle at {0}")]
    NonFiniteAngle(usize),
}

/// Calibrated ring ellipses plus measured sector boundaries for one camera.
///
/// `segment_angles[i]` (radians, pixel frame) is the boundary where pixel
/// wedge `i` starts; wedge `i` ends at `segment_angles[(i + 1) % 20]`.
/// `segment_20_index` is the wedge that holds segment 20.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EllipseCalibration {
    pub center: Point2<f64>,
    pub segment_angles: Vec<f64>,
    pub segment_20_index: usize,
    #[serde(default)]
    pub outer_double: Option<EllipseData>,
    #[serde(default)]
    pub inner_double: Option<EllipseData>,
    #[serde(default)]
    pub outer_triple: Option<EllipseData>,
    #[serde(default)]
    pub inner_triple: Option<EllipseData>,
    #[serde(default)]
    pub bull: Option<EllipseData>,
    #[serde(default)]
    pub bullseye: Option<EllipseData>,
}

impl EllipseCalibration {
    pub fn validate(&self) -> Result<(), EllipseCalibrationError> {
        if self.segment_angles.len() != SECTOR_COUNT {
            return Err(EllipseCalibrationError::SegmentAngleCount {
                expected: SECTOR_COUNT,
                got: self.segment_angles.len(),
            });
        }
        if self.segment_20_index >= SECTOR_COUNT {
            return Err(EllipseCalibrationError::Segment20Index(self.segment_20_index));
        }
        if let Some(i) = self.segment_angles.iter().position(|a| !a.is_finite()) {
            return Err(EllipseCalibrationError::NonFiniteAngle(i));
        }
        Ok(())
    }

    /// Board sector index for pixel wedge `i`.
    #[inline]
    pub fn board_index(&self, pixel_wedge: usize) -> usize {
        (pixel_wedge + SECTOR_COUNT - self.segment_20_index % SECTOR_COUNT) % SECTOR_COUNT
    }

    /// Warp control points: every ring crossed at every sector boundary,
    /// two interpolated mid-rings in the single beds, plus the center.
    pub fn board_correspondences(&self) -> Vec<Correspondence> {
        let rings = [
            (self.outer_double, 170.0 / 170.0),
            (self.inner_double, 162.0 / 170.0),
            (self.outer_triple, 107.0 / 170.0),
            (self.inner_triple, 99.0 / 170.0),
            (self.bull, 16.0 / 170.0),
            (self.bullseye, 6.35 / 170.0),
        ];
        let mut out = Vec::new();
        for (ellipse, radius) in rings {
            let Some(ellipse) = ellipse else { continue };
            for (idx, &angle) in self.segment_angles.iter().enumerate() {
                if let Some(pixel) = ellipse.ray_intersection(self.center, angle) {
                    out.push(Correspondence {
                        pixel,
                        board: self.boundary_board_point(idx, radius),
                    });
                }
            }
        }

        let mid_rings = [
            (self.bull, self.inner_triple, (16.0 + 99.0) / 2.0 / 170.0),
            (self.outer_triple, self.inner_double, (107.0 + 162.0) / 2.0 / 170.0),
        ];
        for (inner, outer, radius) in mid_rings {
            let (Some(inner), Some(outer)) = (inner, outer) else {
                continue;
            };
            for (idx, &angle) in self.segment_angles.iter().enumerate() {
                let (Some(pi), Some(po)) = (
                    inner.ray_intersection(self.center, angle),
                    outer.ray_intersection(self.center, angle),
                ) else {
                    continue;
                };
                out.push(Correspondence {
                    pixel: nalgebra::center(&pi, &po),
                    board: self.boundary_board_point(idx, radius),
                });
            }
        }

        out.push(Correspondence {
            pixel: self.center,
            board: Point2::origin(),
        });
        out
    }

    fn boundary_board_point(&self, pixel_wedge: usize, radius: f64) -> Point2<f64> {
        // clockwise from the top, boundary 0 is 9 degrees left of segment 20's center
        let cw = (self.board_index(pixel_wedge) as f64 * 18.0 - 9.0).to_radians();
        Point2::new(radius * cw.sin(), radius * cw.cos())
    }
}
