//! Verdict vocabulary and the precedence rule every pipeline resolves through.
//!
//! Missing inputs always win: when any required input is absent the verdict
//! is the pipeline's missing state and the blocker list mirrors the missing
//! inputs. Otherwise the ordered blocker checks decide between the ready
//! state and `BLOCKED`.
use crate::util::dedupe;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Ready,
    ReadyForRetest,
    Pass,
    Fail,
    NeedsRealSession,
    Pending,
    MissingInputs,
    Blocked,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Ready => "READY",
            Verdict::ReadyForRetest => "READY_FOR_RETEST",
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::NeedsRealSession => "NEEDS_REAL_SESSION",
            Verdict::Pending => "PENDING",
            Verdict::MissingInputs => "MISSING_INPUTS",
            Verdict::Blocked => "BLOCKED",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        let verdict = match token.trim().to_ascii_uppercase().as_str() {
            "READY" => Verdict::Ready,
            "READY_FOR_RETEST" => Verdict::ReadyForRetest,
            "PASS" => Verdict::Pass,
            "FAIL" => Verdict::Fail,
            "NEEDS_REAL_SESSION" => Verdict::NeedsRealSession,
            "PENDING" => Verdict::Pending,
            "MISSING_INPUTS" => Verdict::MissingInputs,
            "BLOCKED" => Verdict::Blocked,
            _ => return None,
        };
        Some(verdict)
    }

    /// Process exit code for a report carrying this verdict.
    pub fn exit_code(self) -> u8 {
        match self {
            Verdict::Ready | Verdict::ReadyForRetest | Verdict::Pass => 0,
            Verdict::NeedsRealSession => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved outcome of one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub verdict: Verdict,
    pub blockers: Vec<String>,
    pub missing_inputs: Vec<String>,
    pub warnings: Vec<String>,
}

/// Collects missing inputs, blockers and warnings in evaluation order.
#[derive(Debug, Default)]
pub struct Assessment {
    missing_inputs: Vec<String>,
    blockers: Vec<String>,
    warnings: Vec<String>,
}

impl Assessment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(&mut self, present: bool, message: impl Into<String>) {
        if !present {
            self.missing_inputs.push(message.into());
        }
    }

    pub fn block(&mut self, message: impl Into<String>) {
        self.blockers.push(message.into());
    }

    pub fn block_if(&mut self, condition: bool, message: impl Into<String>) {
        if condition {
            self.block(message);
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Apply the precedence rule.
    pub fn resolve(self, ready: Verdict, missing: Verdict) -> Summary {
        let missing_inputs = dedupe(self.missing_inputs);
        let warnings = dedupe(self.warnings);
        if !missing_inputs.is_empty() {
            return Summary {
                verdict: missing,
                blockers: missing_inputs.clone(),
                missing_inputs,
                warnings,
            };
        }
        let blockers = dedupe(self.blockers);
        let verdict = if blockers.is_empty() {
            ready
        } else {
            Verdict::Blocked
        };
        Summary {
            verdict,
            blockers,
            missing_inputs,
            warnings,
        }
    }
}

/// Verdict token for display, `unknown` when a report carried none.
pub fn or_unknown(verdict: Option<&str>) -> &str {
    verdict.unwrap_or("unknown")
}
