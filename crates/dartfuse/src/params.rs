use crate::error::ConfigError;
use dartfuse_core::AxisWarpParams;
use serde::{Deserialize, Serialize};

/// Flag thresholds in hundredths map to normalized board units as
/// `value / 100 * 0.01`.
const RESIDUAL_FLAG_SCALE: f64 = 0.01 / 100.0;
const QUALITY_FLAG_SCALE: f64 = 1.0 / 100.0;

/// Hypothesis generation and rule selection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HhsParams {
    /// Master switch. Off by default.
    pub enabled: bool,
    pub single_candidates: bool,
    pub pair_candidates: bool,
    pub baseline_candidate: bool,
    /// When off, candidates and features are still computed and reported
    /// but nothing is selected.
    pub rule_selector: bool,
    /// When no rule fires: keep the baseline silently (`true`) or re-adopt
    /// it as an explicit `HHS_fallback_baseline` override.
    pub silent_fallback: bool,
    /// Inlier residual; also the baseline residual cap for rule 1.
    pub r1: f64,
    /// Max residual of a single-camera candidate against every other camera.
    pub r2: f64,
    /// Max residual of a pairwise candidate.
    pub r3: f64,
    /// Minimum axis support for a single-camera candidate.
    pub a1: u32,
    /// Minimum camera quality for a single-camera candidate.
    pub q1: f64,
    /// Candidates farther from the bull than this are dropped.
    pub max_candidate_radius: f64,
    /// Single-camera tips closer to the bull than this are dropped.
    pub min_single_radius: f64,
    /// Half-plane slack for axis support: `dot(candidate - tip, dir) > -slack`.
    pub axis_support_slack: f64,
    /// Largest allowed circular wedge distance between selection and baseline.
    pub max_wedge_step: usize,
}

impl Default for HhsParams {
    fn default() -> Self {
        Self {
            enabled: false,
            single_candidates: true,
            pair_candidates: true,
            baseline_candidate: true,
            rule_selector: true,
            silent_fallback: true,
            r1: 150.0 * RESIDUAL_FLAG_SCALE,
            r2: 250.0 * RESIDUAL_FLAG_SCALE,
            r3: 200.0 * RESIDUAL_FLAG_SCALE,
            a1: 40,
            q1: 0.60,
            max_candidate_radius: 1.3,
            min_single_radius: 0.01,
            axis_support_slack: 0.05,
            max_wedge_step: 1,
        }
    }
}

/// Relaxed soft-accept settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SapParams {
    /// Master switch. Off by default.
    pub enabled: bool,
    pub relaxed_triangulation: bool,
    /// Admit cameras that miss only the inlier-count requirement.
    pub weak_camera_inclusion: bool,
    pub containment_gate: bool,
    pub min_quality: f64,
    pub min_inliers: u32,
    pub min_axis_length_px: f64,
    pub min_cameras: usize,
    /// Cap on the circular arc spanned by camera bearings.
    pub max_spread_deg: f64,
    pub board_outer_radius: f64,
    /// Best residual must not exceed this multiple of the reference residual.
    pub max_residual_ratio: f64,
    /// Reference residual used when the baseline carries none.
    pub historical_median_residual: f64,
    /// Baseline residuals at or below this are treated as absent.
    pub reference_floor: f64,
    /// Pixel distance behind the tip used for bearings.
    pub bearing_extent_px: f64,
}

impl Default for SapParams {
    fn default() -> Self {
        Self {
            enabled: false,
            relaxed_triangulation: true,
            weak_camera_inclusion: true,
            containment_gate: true,
            min_quality: 0.40,
            min_inliers: 30,
            min_axis_length_px: 22.0,
            min_cameras: 2,
            max_spread_deg: 8.0,
            board_outer_radius: 1.0,
            max_residual_ratio: 1.40,
            historical_median_residual: 0.04,
            reference_floor: 0.001,
            bearing_extent_px: 200.0,
        }
    }
}

/// Full fusion configuration, built once and shared by every evaluation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionParams {
    pub hhs: HhsParams,
    pub sap: SapParams,
    pub axis: AxisWarpParams,
}

impl FusionParams {
    /// Names accepted by [`FusionParams::set_flag`].
    pub const FLAG_NAMES: [&'static str; 15] = [
        "UseHHS",
        "HHS_EnableSingleCameraCandidates",
        "HHS_EnablePairCandidates",
        "HHS_EnableTriCandidate",
        "HHS_EnableRuleSelector",
        "HHS_FallbackToDev4",
        "HHS_R1",
        "HHS_R2",
        "HHS_R3",
        "HHS_A1",
        "HHS_Q1",
        "UseSoftAcceptPrevention",
        "SAP_EnableRelaxedTriangulation",
        "SAP_EnableWeakCamInclusion",
        "SAP_EnableBoardContainmentGate",
    ];

    /// Apply one named integer flag. Unknown names leave `self` unchanged.
    ///
    /// Boolean flags treat any non-zero value as on. `HHS_R*` take
    /// hundredths (150 means 0.015 board units), `HHS_Q1` takes hundredths
    /// of quality, `HHS_A1` is a raw count (negative clamps to 0).
    pub fn set_flag(&mut self, name: &str, value: i32) -> Result<(), ConfigError> {
        let on = value != 0;
        let hhs = &mut self.hhs;
        let sap = &mut self.sap;
        match name {
            "UseHHS" => hhs.enabled = on,
            "HHS_EnableSingleCameraCandidates" => hhs.single_candidates = on,
            "HHS_EnablePairCandidates" => hhs.pair_candidates = on,
            "HHS_EnableTriCandidate" => hhs.baseline_candidate = on,
            "HHS_EnableRuleSelector" => hhs.rule_selector = on,
            "HHS_FallbackToDev4" => hhs.silent_fallback = on,
            "HHS_R1" => hhs.r1 = value as f64 * RESIDUAL_FLAG_SCALE,
            "HHS_R2" => hhs.r2 = value as f64 * RESIDUAL_FLAG_SCALE,
            "HHS_R3" => hhs.r3 = value as f64 * RESIDUAL_FLAG_SCALE,
            "HHS_A1" => hhs.a1 = value.max(0) as u32,
            "HHS_Q1" => hhs.q1 = value as f64 * QUALITY_FLAG_SCALE,
            "UseSoftAcceptPrevention" => sap.enabled = on,
            "SAP_EnableRelaxedTriangulation" => sap.relaxed_triangulation = on,
            "SAP_EnableWeakCamInclusion" => sap.weak_camera_inclusion = on,
            "SAP_EnableBoardContainmentGate" => sap.containment_gate = on,
            _ => return Err(ConfigError::UnknownKey(name.to_string())),
        }
        log::debug!("flag {name} = {value}");
        Ok(())
    }

    /// Builder-style [`FusionParams::set_flag`].
    pub fn with_flag(mut self, name: &str, value: i32) -> Result<Self, ConfigError> {
        self.set_flag(name, value)?;
        Ok(self)
    }
}
