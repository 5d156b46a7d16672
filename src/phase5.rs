//! Phase 5 closure: roll adapter and consumer reports up into blockers,
//! closure status and an external handoff packet.
pub mod blockers;
pub mod closure;
pub mod closure_status;
pub mod handoff;

use crate::verdict::Verdict;

pub const BLOCKERS_REPORT: &str = "phase5-blockers-readiness.md";
pub const CLOSURE_STATUS_REPORT: &str = "phase5-execution-closure-status.md";
pub const CLOSURE_RUN_REPORT: &str = "phase5-execution-closure-run-report.md";

pub const MISSING_BLOCKERS_REPORT: &str = "Missing Phase 5 blockers readiness report";
pub const MISSING_UNBLOCK_REPORT: &str = "Missing consumer startup unblock status report";

/// Whether a parsed verdict token equals `expected`, ignoring case.
pub fn verdict_is(verdict: Option<&str>, expected: Verdict) -> bool {
    verdict.is_some_and(|token| token.trim().eq_ignore_ascii_case(expected.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_comparison_ignores_case() {
        assert!(verdict_is(Some("ready"), Verdict::Ready));
        assert!(!verdict_is(Some("READY"), Verdict::ReadyForRetest));
        assert!(!verdict_is(None, Verdict::Ready));
    }
}
