//! Board geometry and per-camera mappings for multi-camera dart scoring.
//!
//! This crate is purely geometric: board layout and score mapping, pixel to
//! board warps, robust homography and line fitting, and the axis warper that
//! turns a camera's tip and axis into a board-space line. It knows nothing
//! about hypotheses or fusion policy; see the `dartfuse` crate for that.

mod axis;
mod board;
mod calibration;
mod ellipse;
mod geometry;
mod homography;
mod line_fit;
mod logger;
mod scoring;
mod warp;

pub use axis::{
    axis_bearing_deg, warp_axis, warp_axis_with_mapping, AxisLine, AxisWarpParams, SampleMapping,
};
pub use board::{
    polar_angle_deg, ring_boundary_distance, wedge_distance, wedge_index, wedge_index_for_angle,
    BULLSEYE_NORM, DOUBLE_INNER_NORM, DOUBLE_OUTER_NORM, MISS_TOLERANCE, OUTER_BULL_NORM,
    RING_BOUNDARY_RADII, SECTOR_COUNT, SECTOR_WIDTH_DEG, SEGMENT_ORDER, TRIPLE_INNER_NORM,
    TRIPLE_OUTER_NORM,
};
pub use calibration::{CalibrationError, CalibrationSource, CameraCalibration};
pub use ellipse::{EllipseCalibration, EllipseCalibrationError, EllipseData};
pub use geometry::{
    angular_distance_rad, circular_arc_spread_deg, intersect_lines, perpendicular_distance,
    upper_median, wrap_deg,
};
pub use homography::{
    estimate_homography, fit_homography_ransac, homography_from_4pt, Homography,
    RansacHomography, RansacParams,
};
pub use line_fit::{fit_line_huber, FittedLine, HuberLineParams};
pub use scoring::{score_from_ellipse, score_from_polar, score_point, ScoreResult, Zone};
pub use warp::{BoardWarp, Correspondence, ThinPlateSpline, WarpError};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity, LoggerTaken};
