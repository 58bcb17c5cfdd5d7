//! Small planar helpers shared by the hypothesis and soft-accept stages.

use nalgebra::{Point2, Vector2};

const PARALLEL_EPS: f64 = 1e-10;

/// Intersect the infinite lines through `(p1, p2)` and `(p3, p4)`.
///
/// Returns `None` for (near-)parallel lines.
pub fn intersect_lines(
    p1: Point2<f64>,
    p2: Point2<f64>,
    p3: Point2<f64>,
    p4: Point2<f64>,
) -> Option<Point2<f64>> {
    let denom = (p1.x - p2.x) * (p3.y - p4.y) - (p1.y - p2.y) * (p3.x - p4.x);
    if denom.abs() < PARALLEL_EPS {
        return None;
    }
    let t = ((p1.x - p3.x) * (p3.y - p4.y) - (p1.y - p3.y) * (p3.x - p4.x)) / denom;
    Some(Point2::new(p1.x + t * (p2.x - p1.x), p1.y + t * (p2.y - p1.y)))
}

/// Perpendicular distance from `p` to the line through `anchor` along unit `dir`.
#[inline]
pub fn perpendicular_distance(p: Point2<f64>, anchor: Point2<f64>, dir: Vector2<f64>) -> f64 {
    let normal = Vector2::new(-dir.y, dir.x);
    normal.dot(&(p - anchor)).abs()
}

/// Upper median (`sorted[n / 2]`) of a slice; `None` when empty.
pub fn upper_median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(sorted[sorted.len() / 2])
}

/// Wrap an angle in degrees into `[0, 360)`.
#[inline]
pub fn wrap_deg(angle: f64) -> f64 {
    let a = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if a >= 360.0 {
        0.0
    } else {
        a
    }
}

/// Angular extent of a set of bearings on the circle.
///
/// Computed as 360 minus the largest gap between consecutive sorted
/// bearings. Fewer than two bearings have zero spread.
pub fn circular_arc_spread_deg(bearings_deg: &[f64]) -> f64 {
    if bearings_deg.len() < 2 {
        return 0.0;
    }
    let mut sorted: Vec<f64> = bearings_deg.iter().map(|&a| wrap_deg(a)).collect();
    sorted.sort_by(f64::total_cmp);

    let first = sorted[0];
    let last = sorted[sorted.len() - 1];
    let mut max_gap = first + 360.0 - last;
    for pair in sorted.windows(2) {
        max_gap = max_gap.max(pair[1] - pair[0]);
    }
    360.0 - max_gap
}

/// Smallest absolute difference between two angles in radians, in `[0, PI]`.
#[inline]
pub fn angular_distance_rad(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(std::f64::consts::TAU);
    d.min(std::f64::consts::TAU - d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn intersects_perpendicular_lines() {
        let ix = intersect_lines(
            Point2::new(-1.0, 0.5),
            Point2::new(1.0, 0.5),
            Point2::new(0.25, -2.0),
            Point2::new(0.25, 3.0),
        )
        .expect("lines cross");
        assert_abs_diff_eq!(ix.x, 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(ix.y, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn parallel_lines_do_not_intersect() {
        let ix = intersect_lines(
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 2.0),
        );
        assert!(ix.is_none());
    }

    #[test]
    fn perpendicular_distance_ignores_position_along_line() {
        let dir = Vector2::new(1.0, 0.0);
        let anchor = Point2::new(0.0, 0.0);
        assert_abs_diff_eq!(
            perpendicular_distance(Point2::new(5.0, -0.3), anchor, dir),
            0.3,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            perpendicular_distance(Point2::new(-7.0, -0.3), anchor, dir),
            0.3,
            epsilon = 1e-12
        );
    }

    #[test]
    fn upper_median_picks_upper_middle() {
        assert_eq!(upper_median(&[]), None);
        assert_eq!(upper_median(&[3.0, 1.0]), Some(3.0));
        assert_eq!(upper_median(&[0.5, 0.1, 0.3]), Some(0.3));
    }

    #[test]
    fn arc_spread_handles_wraparound() {
        assert_abs_diff_eq!(circular_arc_spread_deg(&[358.0, 3.0]), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(circular_arc_spread_deg(&[-2.0, 3.0]), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(circular_arc_spread_deg(&[10.0, 20.0, 15.0]), 10.0, epsilon = 1e-9);
        assert_eq!(circular_arc_spread_deg(&[42.0]), 0.0);
    }

    #[test]
    fn angular_distance_wraps() {
        let d = angular_distance_rad(0.1, std::f64::consts::TAU - 0.1);
        assert_abs_diff_eq!(d, 0.2, epsilon = 1e-12);
    }
}
