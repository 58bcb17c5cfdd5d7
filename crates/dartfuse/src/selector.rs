//! Priority-ordered selection rules.
//!
//! Each rule looks at the full candidate list on its own; the first rule
//! that returns a candidate wins.

use crate::hypothesis::{Candidate, CandidateKind};
use crate::params::HhsParams;
use dartfuse_core::wedge_distance;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    #[serde(rename = "tri_high_conf")]
    TriHighConfidence,
    SingleAxisQuality,
    PairLowResidual,
    FallbackBaseline,
}

impl SelectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionReason::TriHighConfidence => "tri_high_conf",
            SelectionReason::SingleAxisQuality => "single_axis_quality",
            SelectionReason::PairLowResidual => "pair_low_residual",
            SelectionReason::FallbackBaseline => "fallback_baseline",
        }
    }
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait SelectionRule {
    fn reason(&self) -> SelectionReason;

    /// Index of the chosen candidate, if this rule fires.
    fn select(&self, candidates: &[Candidate], params: &HhsParams) -> Option<usize>;
}

fn baseline_index(candidates: &[Candidate]) -> Option<usize> {
    candidates
        .iter()
        .position(|c| c.kind == CandidateKind::Baseline)
}

/// Baseline confirmed by at least two inlier cameras and a low residual.
pub struct BaselineHighConfidence;

impl SelectionRule for BaselineHighConfidence {
    fn reason(&self) -> SelectionReason {
        SelectionReason::TriHighConfidence
    }

    fn select(&self, candidates: &[Candidate], params: &HhsParams) -> Option<usize> {
        let idx = baseline_index(candidates)?;
        let f = &candidates[idx].features;
        (f.inlier_cameras >= 2 && f.median_residual <= params.r1).then_some(idx)
    }
}

/// Best-quality single-camera tip with strong axis support that every
/// other camera's axis passes close to.
pub struct SingleAxisQuality;

impl SelectionRule for SingleAxisQuality {
    fn reason(&self) -> SelectionReason {
        SelectionReason::SingleAxisQuality
    }

    fn select(&self, candidates: &[Candidate], params: &HhsParams) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, c) in candidates.iter().enumerate() {
            let CandidateKind::Single { camera } = &c.kind else {
                continue;
            };
            let f = &c.features;
            let quality = f.selection_quality();
            if f.axis_support < params.a1 || quality < params.q1 {
                continue;
            }
            if f.max_residual_excluding(camera) > params.r2 {
                continue;
            }
            if best.map_or(true, |(_, q)| quality > q) {
                best = Some((i, quality));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// Pairwise intersection with the lowest residual under `r3`.
pub struct PairLowResidual;

impl SelectionRule for PairLowResidual {
    fn reason(&self) -> SelectionReason {
        SelectionReason::PairLowResidual
    }

    fn select(&self, candidates: &[Candidate], params: &HhsParams) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, c) in candidates.iter().enumerate() {
            if !matches!(c.kind, CandidateKind::Pair { .. }) {
                continue;
            }
            let r = c.features.median_residual;
            if r <= params.r3 && best.map_or(true, |(_, b)| r < b) {
                best = Some((i, r));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// Explicit re-adoption of the baseline; silent fallback never fires.
pub struct BaselineFallback;

impl SelectionRule for BaselineFallback {
    fn reason(&self) -> SelectionReason {
        SelectionReason::FallbackBaseline
    }

    fn select(&self, candidates: &[Candidate], params: &HhsParams) -> Option<usize> {
        if params.silent_fallback {
            return None;
        }
        baseline_index(candidates)
    }
}

/// Rules in priority order.
pub fn default_rules() -> [&'static dyn SelectionRule; 4] {
    [
        &BaselineHighConfidence,
        &SingleAxisQuality,
        &PairLowResidual,
        &BaselineFallback,
    ]
}

/// First rule that fires, with the index of its candidate.
pub fn select_candidate(
    candidates: &[Candidate],
    params: &HhsParams,
) -> Option<(usize, SelectionReason)> {
    default_rules()
        .into_iter()
        .find_map(|rule| rule.select(candidates, params).map(|i| (i, rule.reason())))
}

/// Whether `selected` is within `max_step` wedges of `baseline`, and the
/// circular distance between them.
pub fn wedge_guard(baseline: usize, selected: usize, max_step: usize) -> (bool, usize) {
    let d = wedge_distance(baseline, selected);
    (d <= max_step, d)
}
