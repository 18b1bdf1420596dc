//! The ledger (`state.json`) and the aggregated external state.
//!
//! The ledger is append-only for `done_steps` and `invariants`; the
//! `last_verify_*` fields are overwritten by every verification run. Accept
//! is gated on them, so the gate lives here next to the data it reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const PASS: &str = "PASS";
pub const FAIL: &str = "FAIL";

/// One accepted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneStep {
    pub step_id: String,
    pub result: String,
    pub timestamp: String,
}

/// Machine-written record of completed steps, invariants, and the last
/// verification outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    pub repo: String,
    #[serde(default)]
    pub done_steps: Vec<DoneStep>,
    #[serde(default)]
    pub invariants: Vec<String>,
    #[serde(default)]
    pub last_verified: Option<String>,
    #[serde(default)]
    pub last_verify_status: Option<String>,
    #[serde(default)]
    pub last_verify_step: Option<String>,
    #[serde(default)]
    pub last_verify_timestamp: Option<String>,
}

impl Ledger {
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            done_steps: Vec::new(),
            invariants: Vec::new(),
            last_verified: None,
            last_verify_status: None,
            last_verify_step: None,
            last_verify_timestamp: None,
        }
    }

    /// Record a verification outcome. Both PASS and FAIL are recorded.
    pub fn record_verification(&mut self, step_id: &str, passed: bool, timestamp: String) {
        self.last_verify_status = Some(if passed { PASS } else { FAIL }.to_string());
        self.last_verify_step = Some(step_id.to_string());
        self.last_verify_timestamp = Some(timestamp);
    }

    /// Append a completed step and refresh `last_verified`.
    pub fn push_done(&mut self, step_id: &str, result: &str, timestamp: String) {
        self.done_steps.push(DoneStep {
            step_id: step_id.to_string(),
            result: result.to_string(),
            timestamp: timestamp.clone(),
        });
        self.last_verified = Some(timestamp);
    }

    pub fn is_done(&self, step_id: &str) -> bool {
        self.done_steps.iter().any(|step| step.step_id == step_id)
    }

    /// Append criteria not already present. Returns how many were new.
    pub fn merge_invariants(&mut self, criteria: &[String]) -> usize {
        let mut added = 0;
        for criterion in criteria {
            if !self.invariants.iter().any(|existing| existing == criterion) {
                self.invariants.push(criterion.clone());
                added += 1;
            }
        }
        added
    }

    /// The acceptance gate: last verification must be PASS for this exact
    /// step id. Any mismatch is a hard block with no override.
    pub fn accept_gate(&self, step_id: &str) -> Result<(), AcceptBlock> {
        match self.last_verify_status.as_deref() {
            Some(PASS) => {}
            Some(FAIL) => {
                return Err(AcceptBlock::LastVerifyFailed {
                    step: self.last_verify_step.clone().unwrap_or_default(),
                });
            }
            _ => return Err(AcceptBlock::NotVerified),
        }
        match self.last_verify_step.as_deref() {
            Some(verified) if verified == step_id => Ok(()),
            verified => Err(AcceptBlock::StepMismatch {
                verified: verified.unwrap_or("none").to_string(),
                current: step_id.to_string(),
            }),
        }
    }
}

/// Why `wrapper accept` refuses to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptBlock {
    /// No verification has been recorded at all.
    NotVerified,
    /// The last verification failed.
    LastVerifyFailed { step: String },
    /// The last verification was for a different step.
    StepMismatch { verified: String, current: String },
}

impl std::fmt::Display for AcceptBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotVerified => write!(f, "No successful verification found."),
            Self::LastVerifyFailed { step } => {
                write!(f, "Last verification FAILED for step: {step}")
            }
            Self::StepMismatch { verified, current } => {
                write!(
                    f,
                    "Last verified step: {verified}\nCurrent step: {current}\n\nStep mismatch."
                )
            }
        }
    }
}

/// Reduced view of another repo's ledger, keyed by repo name.
pub type ExternalState = BTreeMap<String, ExternalRepo>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRepo {
    #[serde(default)]
    pub done_steps: Vec<String>,
    #[serde(default)]
    pub invariants: Vec<String>,
    /// Optional hand-maintained flag; `baseline_verified` unblocks feature
    /// work that depends on this repo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ExternalRepo {
    pub fn is_baseline_verified(&self) -> bool {
        self.status.as_deref() == Some("baseline_verified")
    }
}
