//! Dartboard layout in normalized board space.
//!
//! Conventions: the bullseye is the origin, the outer edge of the double ring
//! is radius 1, `+y` points at segment 20. Polar angles are measured as
//! `atan2(y, -x)` in degrees, so segment 20 sits at 90 and segments run
//! clockwise in [`SEGMENT_ORDER`].

use crate::geometry::wrap_deg;
use nalgebra::Point2;

/// Segment numbers clockwise from the top.
pub const SEGMENT_ORDER: [u8; 20] = [
    20, 1, 18, 4, 13, 6, 10, 15, 2, 17, 3, 19, 7, 16, 8, 11, 14, 9, 12, 5,
];

pub const SECTOR_COUNT: usize = 20;
pub const SECTOR_WIDTH_DEG: f64 = 18.0;
/// Rotation that puts the start of the segment-20 sector at 0.
pub const SECTOR_OFFSET_DEG: f64 = -90.0 + 9.0;

// Scoring radii in mm, widened by the wire thickness.
const BULLSEYE_RADIUS_MM: f64 = 7.75;
const OUTER_BULL_RADIUS_MM: f64 = 17.4;
const TRIPLE_INNER_RADIUS_MM: f64 = 97.6;
const TRIPLE_OUTER_RADIUS_MM: f64 = 108.4;
const DOUBLE_INNER_RADIUS_MM: f64 = 160.6;
const DOUBLE_OUTER_RADIUS_MM: f64 = 171.4;

pub const BULLSEYE_NORM: f64 = BULLSEYE_RADIUS_MM / DOUBLE_OUTER_RADIUS_MM;
pub const OUTER_BULL_NORM: f64 = OUTER_BULL_RADIUS_MM / DOUBLE_OUTER_RADIUS_MM;
pub const TRIPLE_INNER_NORM: f64 = TRIPLE_INNER_RADIUS_MM / DOUBLE_OUTER_RADIUS_MM;
pub const TRIPLE_OUTER_NORM: f64 = TRIPLE_OUTER_RADIUS_MM / DOUBLE_OUTER_RADIUS_MM;
pub const DOUBLE_INNER_NORM: f64 = DOUBLE_INNER_RADIUS_MM / DOUBLE_OUTER_RADIUS_MM;
pub const DOUBLE_OUTER_NORM: f64 = 1.0;

/// Tolerance band beyond the double ring before a point counts as a miss.
pub const MISS_TOLERANCE: f64 = 1.05;

/// Nominal ring radii (6.35, 16, 99, 107, 162, 170 mm over 170 mm).
///
/// Used for ring-boundary proximity features, not for scoring.
pub const RING_BOUNDARY_RADII: [f64; 6] = [
    6.35 / 170.0,
    16.0 / 170.0,
    99.0 / 170.0,
    107.0 / 170.0,
    162.0 / 170.0,
    1.0,
];

/// Distance from radius `r` to the closest nominal ring boundary.
pub fn ring_boundary_distance(r: f64) -> f64 {
    RING_BOUNDARY_RADII
        .iter()
        .map(|b| (r - b).abs())
        .fold(f64::INFINITY, f64::min)
}

/// Polar angle of a board point in degrees, `[0, 360)`.
#[inline]
pub fn polar_angle_deg(p: Point2<f64>) -> f64 {
    wrap_deg(p.y.atan2(-p.x).to_degrees())
}

/// Angle rotated so that sector 0 (segment 20) starts at 0.
#[inline]
pub(crate) fn sector_relative_deg(angle_deg: f64) -> f64 {
    wrap_deg(angle_deg + SECTOR_OFFSET_DEG)
}

/// Sector index in `[0, 20)` for a polar angle in degrees.
pub fn wedge_index_for_angle(angle_deg: f64) -> usize {
    let rel = sector_relative_deg(angle_deg);
    ((rel / SECTOR_WIDTH_DEG) as usize) % SECTOR_COUNT
}

/// Sector index in `[0, 20)` of a board point.
pub fn wedge_index(p: Point2<f64>) -> usize {
    wedge_index_for_angle(polar_angle_deg(p))
}

/// Circular distance between two sector indices (0..=10).
pub fn wedge_distance(a: usize, b: usize) -> usize {
    let d = a.abs_diff(b) % SECTOR_COUNT;
    d.min(SECTOR_COUNT - d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_of_board_is_segment_20() {
        let idx = wedge_index(Point2::new(0.0, 0.5));
        assert_eq!(idx, 0);
        assert_eq!(SEGMENT_ORDER[idx], 20);
    }

    #[test]
    fn left_and_right_sectors() {
        // -x is segment 11, +x is segment 6
        assert_eq!(SEGMENT_ORDER[wedge_index(Point2::new(-0.5, 0.0))], 11);
        assert_eq!(SEGMENT_ORDER[wedge_index(Point2::new(0.5, 0.0))], 6);
        assert_eq!(SEGMENT_ORDER[wedge_index(Point2::new(0.0, -0.5))], 3);
    }

    #[test]
    fn wedge_distance_wraps_around() {
        assert_eq!(wedge_distance(19, 0), 1);
        assert_eq!(wedge_distance(0, 19), 1);
        assert_eq!(wedge_distance(3, 5), 2);
        assert_eq!(wedge_distance(0, 10), 10);
        assert_eq!(wedge_distance(7, 7), 0);
    }

    #[test]
    fn ring_distance_uses_nearest_boundary() {
        let d = ring_boundary_distance(0.6);
        assert!((d - (0.6 - 99.0 / 170.0)).abs() < 1e-12);
        assert!(ring_boundary_distance(1.0) < 1e-12);
    }
}
