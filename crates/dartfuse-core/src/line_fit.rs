//! Robust 2D line fitting.
//!
//! Iteratively reweighted least squares with Huber weights: each pass fits
//! a total-least-squares line (weighted PCA), then downweights samples whose
//! perpendicular residual exceeds `delta`.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HuberLineParams {
    /// Huber threshold on perpendicular residual.
    pub delta: f64,
    pub max_iters: usize,
    /// Stop once the anchor moves less than this between passes.
    pub point_eps: f64,
    /// Stop once the direction turns less than this (radians) between passes.
    pub angle_eps: f64,
}

impl Default for HuberLineParams {
    fn default() -> Self {
        Self {
            delta: 1.345,
            max_iters: 30,
            point_eps: 0.01,
            angle_eps: 0.01,
        }
    }
}

/// Line through `point` along unit `direction`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FittedLine {
    pub point: Point2<f64>,
    pub direction: Vector2<f64>,
}

#[inline]
fn huber_weight(r: f64, delta: f64) -> f64 {
    if r <= delta {
        1.0
    } else {
        delta / r
    }
}

fn weighted_pca_line(points: &[Point2<f64>], weights: &[f64]) -> Option<FittedLine> {
    let wsum: f64 = weights.iter().sum();
    if wsum <= 1e-12 {
        return None;
    }
    let mut c = Vector2::zeros();
    for (p, w) in points.iter().zip(weights) {
        c += p.coords * *w;
    }
    c /= wsum;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (p, w) in points.iter().zip(weights) {
        let d = p.coords - c;
        sxx += w * d.x * d.x;
        sxy += w * d.x * d.y;
        syy += w * d.y * d.y;
    }
    if sxx + syy <= 1e-24 {
        return None;
    }

    // major axis of the 2x2 scatter matrix
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let direction = Vector2::new(theta.cos(), theta.sin());
    Some(FittedLine {
        point: Point2::from(c),
        direction,
    })
}

/// Fit a line robustly. Needs at least two distinct points.
///
/// The returned direction is unit length; its sign is arbitrary.
pub fn fit_line_huber(points: &[Point2<f64>], params: &HuberLineParams) -> Option<FittedLine> {
    if points.len() < 2 {
        return None;
    }
    let mut weights = vec![1.0; points.len()];
    let mut line = weighted_pca_line(points, &weights)?;

    for _ in 0..params.max_iters {
        let normal = Vector2::new(-line.direction.y, line.direction.x);
        for (w, p) in weights.iter_mut().zip(points) {
            let r = normal.dot(&(p - line.point)).abs();
            *w = huber_weight(r, params.delta);
        }
        let next = weighted_pca_line(points, &weights)?;

        let moved = (next.point - line.point).norm();
        let cos = next.direction.dot(&line.direction).abs().min(1.0);
        let turned = cos.acos();
        line = next;
        if moved < params.point_eps && turned < params.angle_eps {
            break;
        }
    }

    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn recovers_clean_line() {
        let pts: Vec<_> = (0..21)
            .map(|i| Point2::new(0.3 + 0.05 * i as f64, -0.2 + 0.02 * i as f64))
            .collect();
        let line = fit_line_huber(&pts, &HuberLineParams::default()).expect("fit");
        let expected = Vector2::new(0.05, 0.02).normalize();
        assert_abs_diff_eq!(line.direction.dot(&expected).abs(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(line.direction.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn downweights_far_outlier() {
        let mut pts: Vec<_> = (0..20).map(|i| Point2::new(i as f64, 0.0)).collect();
        pts.push(Point2::new(10.0, 6.0));
        let params = HuberLineParams {
            delta: 0.5,
            ..HuberLineParams::default()
        };
        let robust = fit_line_huber(&pts, &params).expect("fit");
        let plain = weighted_pca_line(&pts, &vec![1.0; pts.len()]).expect("fit");
        assert!(robust.direction.y.abs() < plain.direction.y.abs());
        assert!(robust.point.y.abs() < plain.point.y.abs());
    }

    #[test]
    fn degenerate_input_fails() {
        let p = Point2::new(1.0, 1.0);
        assert!(fit_line_huber(&[p], &HuberLineParams::default()).is_none());
        assert!(fit_line_huber(&[p, p, p], &HuberLineParams::default()).is_none());
    }
}
