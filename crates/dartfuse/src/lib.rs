//! Multi-camera dart score fusion.
//!
//! Given a baseline triangulated result and per-camera tip/axis detections,
//! [`FusionEngine::evaluate`] decides whether the baseline stands or is
//! replaced:
//!
//! - hypothesis selection builds baseline, pairwise and single-camera
//!   candidates, scores them against every camera axis and applies a
//!   priority-ordered rule list guarded by a one-wedge safety check;
//! - soft-accept re-triangulates throws recorded as a miss with relaxed
//!   camera admission and strict geometric gates.
//!
//! Both stages are off by default; enable them with
//! [`FusionParams::set_flag`] (`UseHHS`, `UseSoftAcceptPrevention`).
//!
//! ```
//! use dartfuse::{FusionEngine, FusionParams};
//! use std::collections::BTreeMap;
//!
//! let mut params = FusionParams::default();
//! params.set_flag("UseHHS", 1).unwrap();
//! let engine = FusionEngine::new(BTreeMap::new(), params);
//! assert!(engine.params().hhs.enabled);
//! ```

mod engine;
mod error;
mod hypothesis;
mod inputs;
mod outcome;
mod params;
mod selector;
mod soft_accept;

pub use engine::FusionEngine;
pub use error::{status_code, ConfigError};
pub use hypothesis::{
    generate_candidates, prepare_cameras, select_hypothesis, CameraAxis, Candidate,
    CandidateFeatures, CandidateKind,
};
pub use inputs::{AxisQuality, BaselineResult, CameraDetection, ThrowInput, TriangulationDebug};
pub use outcome::{
    DecisionOutcome, FusionDecision, PatchedResult, SelectionAbstain, SelectionReport,
    SelectionTrace, WedgeGuardCheck,
};
pub use params::{FusionParams, HhsParams, SapParams};
pub use selector::{
    default_rules, select_candidate, wedge_guard, BaselineFallback, BaselineHighConfidence,
    PairLowResidual, SelectionReason, SelectionRule, SingleAxisQuality,
};
pub use soft_accept::{
    relaxed_cameras, soft_accept, RelaxedCameraEvidence, SoftAcceptGate, SoftAcceptReport,
    SOFT_ACCEPT_METHOD,
};

pub use dartfuse_core as core;
