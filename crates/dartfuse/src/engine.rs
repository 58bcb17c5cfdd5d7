use crate::hypothesis::select_hypothesis;
use crate::inputs::ThrowInput;
use crate::outcome::{DecisionOutcome, FusionDecision};
use crate::params::FusionParams;
use crate::soft_accept::soft_accept;
use dartfuse_core::{CalibrationSource, CameraCalibration};
use log::{debug, warn};
use std::collections::BTreeMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Per-throw fusion: hypothesis selection, then soft-accept when the
/// baseline is still a miss.
///
/// Holds only immutable configuration and calibrations, so one engine can
/// be shared across threads.
#[derive(Clone, Debug)]
pub struct FusionEngine {
    calibrations: BTreeMap<String, CameraCalibration>,
    params: FusionParams,
}

impl FusionEngine {
    pub fn new(calibrations: BTreeMap<String, CameraCalibration>, params: FusionParams) -> Self {
        Self {
            calibrations,
            params,
        }
    }

    /// Fit every serialized calibration; cameras that fail to fit are
    /// skipped with a warning.
    pub fn from_sources(
        sources: impl IntoIterator<Item = (String, CalibrationSource)>,
        params: FusionParams,
    ) -> Self {
        let mut calibrations = BTreeMap::new();
        for (id, src) in sources {
            match src.build() {
                Ok(cal) => {
                    calibrations.insert(id, cal);
                }
                Err(e) => warn!("camera {id}: calibration rejected: {e}"),
            }
        }
        Self::new(calibrations, params)
    }

    pub fn params(&self) -> &FusionParams {
        &self.params
    }

    pub fn calibrations(&self) -> &BTreeMap<String, CameraCalibration> {
        &self.calibrations
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(method = %input.baseline.method))
    )]
    pub fn evaluate(&self, input: &ThrowInput) -> FusionDecision {
        let mut decision = FusionDecision {
            outcome: DecisionOutcome::NoOverride,
            selection: None,
            soft_accept: None,
        };

        if self.params.hhs.enabled {
            let (outcome, report) = select_hypothesis(input, &self.calibrations, &self.params);
            decision.outcome = outcome;
            decision.selection = Some(report);
        }

        if !decision.outcome.is_override() && self.params.sap.enabled && input.baseline.is_miss()
        {
            let (outcome, report) = soft_accept(input, &self.calibrations, &self.params);
            decision.outcome = outcome;
            decision.soft_accept = Some(report);
        }

        debug!(
            "throw: baseline {} -> {}",
            input.baseline.score,
            decision.final_result(&input.baseline).score
        );
        decision
    }
}
