//! Pixel-to-board mappings.
//!
//! A camera's warp takes pixel coordinates into normalized board space
//! (bullseye at the origin, outer double edge at radius 1). The usual warp
//! is a thin-plate spline through calibration control points; a plain
//! projective map is also accepted.

use crate::Homography;
use nalgebra::{DMatrix, Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Errors raised while fitting a warp.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum WarpError {
    #[error("need at least {needed} control points, got {got}")]
    TooFewControlPoints { needed: usize, got: usize },
    #[error("pixel/board control point counts differ ({pixel} vs {board})")]
    MismatchedControlPoints { pixel: usize, board: usize },
    #[error("thin-plate system could not be solved")]
    SingularSystem,
}

/// One calibration control point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub pixel: Point2<f64>,
    pub board: Point2<f64>,
}

fn tps_kernel(r: f64) -> f64 {
    if r < 1e-10 {
        return 0.0;
    }
    r * r * r.ln()
}

/// Thin-plate spline `f(p) = a0 + a1*x + a2*y + sum_i w_i * U(|p - c_i|)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThinPlateSpline {
    centers: Vec<Point2<f64>>,
    weights: Vec<Vector2<f64>>,
    affine: [Vector2<f64>; 3],
}

impl ThinPlateSpline {
    /// Fit an interpolating spline through `pixel[i] -> board[i]`.
    pub fn fit(pixel: &[Point2<f64>], board: &[Point2<f64>]) -> Result<Self, WarpError> {
        if pixel.len() != board.len() {
            return Err(WarpError::MismatchedControlPoints {
                pixel: pixel.len(),
                board: board.len(),
            });
        }
        let n = pixel.len();
        if n < 4 {
            return Err(WarpError::TooFewControlPoints { needed: 4, got: n });
        }

        // [K P; P^T 0] [w; a] = [v; 0]
        let m = n + 3;
        let mut l = DMatrix::<f64>::zeros(m, m);
        let mut rhs = DMatrix::<f64>::zeros(m, 2);
        for i in 0..n {
            for j in 0..n {
                l[(i, j)] = tps_kernel((pixel[i] - pixel[j]).norm());
            }
            l[(i, n)] = 1.0;
            l[(i, n + 1)] = pixel[i].x;
            l[(i, n + 2)] = pixel[i].y;
            l[(n, i)] = 1.0;
            l[(n + 1, i)] = pixel[i].x;
            l[(n + 2, i)] = pixel[i].y;
            rhs[(i, 0)] = board[i].x;
            rhs[(i, 1)] = board[i].y;
        }

        let sol = l
            .svd(true, true)
            .solve(&rhs, 1e-12)
            .map_err(|_| WarpError::SingularSystem)?;
        if sol.iter().any(|v| !v.is_finite()) {
            return Err(WarpError::SingularSystem);
        }

        let weights = (0..n)
            .map(|i| Vector2::new(sol[(i, 0)], sol[(i, 1)]))
            .collect();
        let affine = [0, 1, 2].map(|k| Vector2::new(sol[(n + k, 0)], sol[(n + k, 1)]));

        Ok(Self {
            centers: pixel.to_vec(),
            weights,
            affine,
        })
    }

    pub fn control_points(&self) -> &[Point2<f64>] {
        &self.centers
    }

    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let mut out = self.affine[0] + self.affine[1] * p.x + self.affine[2] * p.y;
        for (c, w) in self.centers.iter().zip(&self.weights) {
            out += w * tps_kernel((p - c).norm());
        }
        Point2::from(out)
    }
}

/// A camera's pixel-to-board mapping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoardWarp {
    ThinPlate(ThinPlateSpline),
    Projective { h: Homography },
}

impl BoardWarp {
    /// Map a pixel to normalized board space; `None` for non-finite results.
    pub fn to_board(&self, px: Point2<f64>) -> Option<Point2<f64>> {
        let p = match self {
            BoardWarp::ThinPlate(tps) => tps.apply(px),
            BoardWarp::Projective { h } => h.apply(px)?,
        };
        (p.x.is_finite() && p.y.is_finite()).then_some(p)
    }
}
