//! Map a board position to a dart score.
//!
//! Two variants: [`score_from_polar`] works in normalized board space and is
//! what every fusion stage uses; [`score_from_ellipse`] scores a single
//! camera's pixel tip directly against its ring ellipses.

use crate::board::{
    polar_angle_deg, sector_relative_deg, BULLSEYE_NORM, DOUBLE_INNER_NORM, DOUBLE_OUTER_NORM,
    MISS_TOLERANCE, OUTER_BULL_NORM, SECTOR_COUNT, SECTOR_WIDTH_DEG, SEGMENT_ORDER,
    TRIPLE_INNER_NORM, TRIPLE_OUTER_NORM,
};
use crate::ellipse::{EllipseCalibration, EllipseData};
use crate::geometry::angular_distance_rad;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Boundary distance reported for both bull zones.
const BULL_BOUNDARY_DEG: f64 = 9.0;
/// Confidence attached to ellipse-based scores.
const ELLIPSE_CONFIDENCE: f64 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    InnerBull,
    OuterBull,
    Triple,
    Double,
    SingleInner,
    SingleOuter,
    /// Ellipse scoring without an inner triple ring to split the single bed.
    Single,
    Miss,
}

impl Zone {
    pub fn as_str(self) -> &'static str {
        match self {
            Zone::InnerBull => "inner_bull",
            Zone::OuterBull => "outer_bull",
            Zone::Triple => "triple",
            Zone::Double => "double",
            Zone::SingleInner => "single_inner",
            Zone::SingleOuter => "single_outer",
            Zone::Single => "single",
            Zone::Miss => "miss",
        }
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored position. The outer bull reports segment 0 with score 25; the
/// inner bull reports segment 25, multiplier 2.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub segment: u8,
    pub multiplier: u8,
    pub score: u16,
    pub zone: Zone,
    /// Angular distance to the nearest sector edge.
    pub boundary_distance_deg: f64,
    pub confidence: Option<f64>,
}

impl ScoreResult {
    fn inner_bull() -> Self {
        Self {
            segment: 25,
            multiplier: 2,
            score: 50,
            zone: Zone::InnerBull,
            boundary_distance_deg: BULL_BOUNDARY_DEG,
            confidence: None,
        }
    }

    fn outer_bull() -> Self {
        Self {
            segment: 0,
            multiplier: 1,
            score: 25,
            zone: Zone::OuterBull,
            boundary_distance_deg: BULL_BOUNDARY_DEG,
            confidence: None,
        }
    }

    fn miss() -> Self {
        Self {
            segment: 0,
            multiplier: 0,
            score: 0,
            zone: Zone::Miss,
            boundary_distance_deg: 0.0,
            confidence: None,
        }
    }

    fn sector(segment: u8, multiplier: u8, zone: Zone, boundary_distance_deg: f64) -> Self {
        Self {
            segment,
            multiplier,
            score: segment as u16 * multiplier as u16,
            zone,
            boundary_distance_deg,
            confidence: None,
        }
    }

    #[inline]
    pub fn is_miss(&self) -> bool {
        self.multiplier == 0
    }
}

/// Score a polar position in normalized board space.
///
/// `angle_deg` follows [`polar_angle_deg`]; `r` is the distance from the
/// bullseye with the outer double edge at 1.
pub fn score_from_polar(angle_deg: f64, r: f64) -> ScoreResult {
    if r <= BULLSEYE_NORM {
        return ScoreResult::inner_bull();
    }
    if r <= OUTER_BULL_NORM {
        return ScoreResult::outer_bull();
    }
    let outer_limit = DOUBLE_OUTER_NORM * MISS_TOLERANCE;
    if r > outer_limit {
        return ScoreResult::miss();
    }

    let rel = sector_relative_deg(angle_deg);
    let idx = ((rel / SECTOR_WIDTH_DEG) as usize) % SECTOR_COUNT;
    let within = rel % SECTOR_WIDTH_DEG;
    let boundary = within.min(SECTOR_WIDTH_DEG - within);
    let segment = SEGMENT_ORDER[idx];

    let (multiplier, zone) = if r >= DOUBLE_INNER_NORM {
        (2, Zone::Double)
    } else if (TRIPLE_INNER_NORM..=TRIPLE_OUTER_NORM).contains(&r) {
        (3, Zone::Triple)
    } else if r < TRIPLE_INNER_NORM {
        (1, Zone::SingleInner)
    } else {
        (1, Zone::SingleOuter)
    };
    ScoreResult::sector(segment, multiplier, zone, boundary)
}

/// Score a point in normalized board space.
#[inline]
pub fn score_point(p: Point2<f64>) -> ScoreResult {
    score_from_polar(polar_angle_deg(p), p.coords.norm())
}

fn angle_in_wedge(a: f64, lo: f64, hi: f64) -> bool {
    use std::f64::consts::TAU;
    let (a, lo, hi) = (a.rem_euclid(TAU), lo.rem_euclid(TAU), hi.rem_euclid(TAU));
    if lo <= hi {
        a >= lo && a < hi
    } else {
        a >= lo || a < hi
    }
}

/// Pixel wedge containing `angle`, or the wedge whose center is nearest.
fn locate_wedge(angles: &[f64], angle: f64) -> usize {
    let n = angles.len();
    if let Some(i) = (0..n).find(|&i| angle_in_wedge(angle, angles[i], angles[(i + 1) % n])) {
        return i;
    }
    // inconsistent boundaries: nearest wedge center instead of no segment
    (0..n)
        .map(|i| {
            let lo = angles[i];
            let hi = angles[(i + 1) % n];
            let span = (hi - lo).rem_euclid(std::f64::consts::TAU);
            (i, angular_distance_rad(angle, lo + span / 2.0))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(0, |(i, _)| i)
}

/// Score a pixel tip against one camera's ring ellipses.
///
/// Expects a validated calibration (20 boundary angles).
pub fn score_from_ellipse(tip_px: Point2<f64>, cal: &EllipseCalibration) -> ScoreResult {
    let d = tip_px - cal.center;
    let dist = d.norm();
    let angle = d.y.atan2(d.x);
    let ring_radius = |e: Option<EllipseData>| e.map(|e| e.radius_at_angle(angle));

    if ring_radius(cal.bullseye).is_some_and(|r| dist <= r) {
        return ScoreResult::inner_bull();
    }
    if ring_radius(cal.bull).is_some_and(|r| dist <= r) {
        return ScoreResult::outer_bull();
    }
    if ring_radius(cal.outer_double).is_some_and(|r| dist > r * MISS_TOLERANCE) {
        return ScoreResult::miss();
    }

    let (segment, boundary) = if cal.segment_angles.len() == SECTOR_COUNT {
        let found = locate_wedge(&cal.segment_angles, angle);
        let lo = cal.segment_angles[found];
        let hi = cal.segment_angles[(found + 1) % SECTOR_COUNT];
        let boundary = angular_distance_rad(angle, lo)
            .min(angular_distance_rad(angle, hi))
            .to_degrees();
        (SEGMENT_ORDER[cal.board_index(found)], boundary)
    } else {
        (0, 0.0)
    };

    let band = |inner: Option<EllipseData>, outer: Option<EllipseData>| match (
        ring_radius(inner),
        ring_radius(outer),
    ) {
        (Some(ri), Some(ro)) => dist >= ri && dist <= ro,
        _ => false,
    };

    let (multiplier, zone) = if band(cal.inner_triple, cal.outer_triple) {
        (3, Zone::Triple)
    } else if band(cal.inner_double, cal.outer_double) {
        (2, Zone::Double)
    } else {
        match ring_radius(cal.inner_triple) {
            Some(r) if dist < r => (1, Zone::SingleInner),
            Some(_) => (1, Zone::SingleOuter),
            None => (1, Zone::Single),
        }
    };

    let mut result = ScoreResult::sector(segment, multiplier, zone, boundary);
    result.confidence = Some(ELLIPSE_CONFIDENCE);
    result
}
