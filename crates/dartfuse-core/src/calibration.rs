//! Per-camera calibration: a pixel-to-board warp and the control points it
//! was built from.

use crate::ellipse::{EllipseCalibration, EllipseCalibrationError};
use crate::warp::{BoardWarp, Correspondence, ThinPlateSpline, WarpError};
use crate::Homography;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error(transparent)]
    Warp(#[from] WarpError),
    #[error(transparent)]
    Ellipse(#[from] EllipseCalibrationError),
}

/// Fitted calibration of one camera.
///
/// `correspondences` are kept alongside the warp: axis warping fits its own
/// local homography from them.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraCalibration {
    pub warp: BoardWarp,
    pub correspondences: Vec<Correspondence>,
    pub ellipse: Option<EllipseCalibration>,
}

impl CameraCalibration {
    /// Thin-plate warp through the given control points.
    pub fn from_correspondences(correspondences: Vec<Correspondence>) -> Result<Self, WarpError> {
        let (pixel, board): (Vec<_>, Vec<_>) =
            correspondences.iter().map(|c| (c.pixel, c.board)).unzip();
        let tps = ThinPlateSpline::fit(&pixel, &board)?;
        Ok(Self {
            warp: BoardWarp::ThinPlate(tps),
            correspondences,
            ellipse: None,
        })
    }

    /// Thin-plate warp through control points sampled from the ring ellipses.
    pub fn from_ellipse(ellipse: EllipseCalibration) -> Result<Self, CalibrationError> {
        ellipse.validate()?;
        let mut cal = Self::from_correspondences(ellipse.board_correspondences())?;
        cal.ellipse = Some(ellipse);
        Ok(cal)
    }

    /// Plain projective warp. `correspondences` may be empty.
    pub fn projective(h: Homography, correspondences: Vec<Correspondence>) -> Self {
        Self {
            warp: BoardWarp::Projective { h },
            correspondences,
            ellipse: None,
        }
    }

    #[inline]
    pub fn to_board(&self, px: Point2<f64>) -> Option<Point2<f64>> {
        self.warp.to_board(px)
    }
}

/// Serialized form of a calibration, fitted on load.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalibrationSource {
    Correspondences {
        points: Vec<Correspondence>,
    },
    Ellipse(EllipseCalibration),
    Homography {
        h: Homography,
        #[serde(default)]
        points: Vec<Correspondence>,
    },
}

impl CalibrationSource {
    pub fn build(self) -> Result<CameraCalibration, CalibrationError> {
        match self {
            CalibrationSource::Correspondences { points } => {
                Ok(CameraCalibration::from_correspondences(points)?)
            }
            CalibrationSource::Ellipse(e) => CameraCalibration::from_ellipse(e),
            CalibrationSource::Homography { h, points } => {
                Ok(CameraCalibration::projective(h, points))
            }
        }
    }
}
