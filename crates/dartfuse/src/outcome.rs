use crate::hypothesis::Candidate;
use crate::inputs::BaselineResult;
use crate::selector::SelectionReason;
use crate::soft_accept::SoftAcceptReport;
use serde::Serialize;
use std::collections::BTreeMap;

/// Trace attached to an override chosen by hypothesis selection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectionTrace {
    /// Candidate label, e.g. `pair_cam1_cam2`.
    pub selected: String,
    pub reason: SelectionReason,
    pub candidate_count: usize,
    pub baseline_wedge: usize,
    pub selected_wedge: usize,
    pub residual: f64,
    pub axis_support: u32,
    pub quality: f64,
}

/// Baseline clone with replacement position, score and method.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PatchedResult {
    pub result: BaselineResult,
    pub selection: Option<SelectionTrace>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum DecisionOutcome {
    /// The baseline stands.
    NoOverride,
    Override(Box<PatchedResult>),
}

impl DecisionOutcome {
    pub fn is_override(&self) -> bool {
        matches!(self, DecisionOutcome::Override(_))
    }

    pub fn patched(&self) -> Option<&PatchedResult> {
        match self {
            DecisionOutcome::NoOverride => None,
            DecisionOutcome::Override(p) => Some(p),
        }
    }
}

/// Why hypothesis selection produced no override.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionAbstain {
    TooFewCameras { valid: usize },
    NoCandidates,
    SelectorDisabled,
    NoRuleFired,
    WedgeGuard { baseline: usize, selected: usize },
    BaselineConfirmed,
}

/// Wedge guard verdict for a selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct WedgeGuardCheck {
    pub baseline_wedge: usize,
    pub selected_wedge: usize,
    pub distance: usize,
    pub passed: bool,
}

/// Diagnostics from one hypothesis-selection pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SelectionReport {
    pub valid_cameras: Vec<String>,
    pub detection_quality: BTreeMap<String, f64>,
    pub candidates: Vec<Candidate>,
    /// Index into `candidates` and the rule that picked it.
    pub selected: Option<(usize, SelectionReason)>,
    pub wedge_guard: Option<WedgeGuardCheck>,
    pub abstain: Option<SelectionAbstain>,
}

/// Engine output for one throw.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FusionDecision {
    pub outcome: DecisionOutcome,
    pub selection: Option<SelectionReport>,
    pub soft_accept: Option<SoftAcceptReport>,
}

impl FusionDecision {
    /// The result to record: the override if any, else `baseline`.
    pub fn final_result<'a>(&'a self, baseline: &'a BaselineResult) -> &'a BaselineResult {
        match &self.outcome {
            DecisionOutcome::NoOverride => baseline,
            DecisionOutcome::Override(p) => &p.result,
        }
    }
}
