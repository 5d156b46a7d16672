//! Mock consumer validation built on package-install smoke results.
//!
//! `package-smoke` installs the packed package into a throwaway consumer
//! repository and records one summary per mode. The A/B report and the mock
//! startup triage read those summaries back; the triage variant writes reports
//! with the same kinds and facts as the live consumer pipelines so the phase 5
//! readers accept either.
pub mod ab_report;
pub mod package_smoke;
pub mod startup_triage;

use crate::util::{capture_first, labeled_value};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Evidence schema version written by the gate.
pub const EVIDENCE_VERSION: &str = "2.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SmokeMode {
    Block,
    Minimal,
}

impl SmokeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SmokeMode::Block => "block",
            SmokeMode::Minimal => "minimal",
        }
    }

    /// Exit code every stage command must return in this mode.
    pub fn expected_exit_code(self) -> i32 {
        match self {
            SmokeMode::Block => 1,
            SmokeMode::Minimal => 0,
        }
    }

    pub fn expected_outcome(self) -> &'static str {
        match self {
            SmokeMode::Block => "BLOCK",
            SmokeMode::Minimal => "PASS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SmokeStatus {
    Pass,
    Fail,
    Unknown,
}

/// One ``- <label> exit: `N` (OUTCOME)`` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageExit {
    pub label: String,
    pub exit_code: Option<i32>,
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeAssessment {
    pub mode: SmokeMode,
    pub file: String,
    pub exists: bool,
    pub status: SmokeStatus,
    pub stages: Vec<StageExit>,
}

impl SmokeAssessment {
    /// Block mode must block at every stage; minimal mode must pass at every stage.
    pub fn is_expected(&self) -> bool {
        self.exists
            && self.status == SmokeStatus::Pass
            && !self.stages.is_empty()
            && self.stages.iter().all(|stage| {
                stage.exit_code == Some(self.mode.expected_exit_code())
                    && stage.outcome.as_deref() == Some(self.mode.expected_outcome())
            })
    }

    pub fn step_id(&self) -> String {
        format!("mock-package-smoke-{}", self.mode.as_str())
    }
}

pub fn parse_smoke_status(markdown: &str) -> SmokeStatus {
    match labeled_value(markdown, "Status")
        .map(|value| value.to_ascii_uppercase())
        .as_deref()
    {
        Some(value) if value.starts_with("PASS") => SmokeStatus::Pass,
        Some(value) if value.starts_with("FAIL") => SmokeStatus::Fail,
        _ => SmokeStatus::Unknown,
    }
}

pub fn parse_stage_exit(markdown: &str, label: &str) -> StageExit {
    let pattern = format!(
        r"(?mi)^\s*-\s*{}\s+exit:\s*`?(-?\d+)`?\s*\(([^)]+)\)",
        regex::escape(label)
    );
    let captures = Regex::new(&pattern)
        .ok()
        .and_then(|re| re.captures(markdown));
    let exit_code = captures
        .as_ref()
        .and_then(|caps| caps.get(1))
        .and_then(|value| value.as_str().parse().ok());
    let outcome = captures
        .as_ref()
        .and_then(|caps| caps.get(2))
        .map(|value| value.as_str().trim().to_ascii_uppercase())
        .filter(|value| !value.is_empty());
    StageExit {
        label: label.to_string(),
        exit_code,
        outcome,
    }
}

pub fn assess_smoke_summary(
    mode: SmokeMode,
    file: &str,
    markdown: Option<&str>,
    labels: &[&str],
) -> SmokeAssessment {
    let Some(markdown) = markdown else {
        return SmokeAssessment {
            mode,
            file: file.to_string(),
            exists: false,
            status: SmokeStatus::Unknown,
            stages: Vec::new(),
        };
    };
    SmokeAssessment {
        mode,
        file: file.to_string(),
        exists: true,
        status: parse_smoke_status(markdown),
        stages: labels
            .iter()
            .map(|label| parse_stage_exit(markdown, label))
            .collect(),
    }
}

/// Metadata pulled from an `.ai_evidence.json` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceAssessment {
    pub file: String,
    pub exists: bool,
    pub parse_error: Option<String>,
    pub version: Option<String>,
    pub stage: Option<String>,
    pub outcome: Option<String>,
}

impl EvidenceAssessment {
    pub fn is_healthy(&self) -> bool {
        self.exists
            && self.parse_error.is_none()
            && self.version.as_deref() == Some(EVIDENCE_VERSION)
            && self.stage.as_deref().is_some_and(|stage| !stage.is_empty())
            && self.outcome.as_deref().is_some_and(|outcome| !outcome.is_empty())
    }
}

fn string_at(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub fn parse_evidence(file: &str, raw: &str) -> EvidenceAssessment {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => EvidenceAssessment {
            file: file.to_string(),
            exists: true,
            parse_error: None,
            version: string_at(&value, "/version"),
            stage: string_at(&value, "/snapshot/stage"),
            outcome: string_at(&value, "/snapshot/outcome"),
        },
        Err(err) => EvidenceAssessment {
            file: file.to_string(),
            exists: true,
            parse_error: Some(err.to_string()),
            ..EvidenceAssessment::default()
        },
    }
}

pub fn assess_evidence(path: &Path, file: &str) -> Result<EvidenceAssessment> {
    if !path.is_file() {
        return Ok(EvidenceAssessment {
            file: file.to_string(),
            ..EvidenceAssessment::default()
        });
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(parse_evidence(file, &raw))
}

/// `- Smoke mode: \`block\`` as recorded by `package-smoke`.
pub fn parse_smoke_mode(markdown: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^\s*-\s*Smoke mode:\s*`?([a-z]+)`?").ok()?;
    capture_first(&re, markdown)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: [&str; 3] = ["pre-commit", "pre-push", "ci"];

    fn summary(status: &str, exit: i32, outcome: &str) -> String {
        format!(
            "# Package Install Smoke Report\n\n- Smoke mode: `block`\n- Status: {status}\n\
             - pre-commit exit: `{exit}` ({outcome})\n- pre-push exit: `{exit}` ({outcome})\n\
             - ci exit: `{exit}` ({outcome})\n"
        )
    }

    #[test]
    fn block_summary_matches_expected_mode() {
        let markdown = summary("PASS", 1, "BLOCK");
        let assessment = assess_smoke_summary(SmokeMode::Block, "block.md", Some(&markdown), &LABELS);
        assert_eq!(assessment.status, SmokeStatus::Pass);
        assert_eq!(assessment.stages[2].exit_code, Some(1));
        assert!(assessment.is_expected());
        assert_eq!(parse_smoke_mode(&markdown).as_deref(), Some("block"));

        let as_minimal =
            assess_smoke_summary(SmokeMode::Minimal, "block.md", Some(&markdown), &LABELS);
        assert!(!as_minimal.is_expected());
    }

    #[test]
    fn outcome_is_case_insensitive_and_missing_stage_fails() {
        let markdown = "- Status: pass\n- pre-commit exit: 0 (pass)\n- pre-push exit: `0` (PASS)\n";
        let assessment = assess_smoke_summary(SmokeMode::Minimal, "m.md", Some(markdown), &LABELS);
        assert_eq!(assessment.status, SmokeStatus::Pass);
        assert_eq!(assessment.stages[0].outcome.as_deref(), Some("PASS"));
        assert_eq!(assessment.stages[2].exit_code, None);
        assert!(!assessment.is_expected());
    }

    #[test]
    fn failed_or_absent_summary_is_not_expected() {
        let failed = summary("FAIL", 1, "BLOCK");
        assert!(!assess_smoke_summary(SmokeMode::Block, "b.md", Some(&failed), &LABELS).is_expected());
        let absent = assess_smoke_summary(SmokeMode::Block, "b.md", None, &LABELS);
        assert!(!absent.exists);
        assert_eq!(absent.status, SmokeStatus::Unknown);
        assert!(!absent.is_expected());
    }

    #[test]
    fn evidence_requires_v2_1_snapshot() {
        let healthy = parse_evidence(
            "e.json",
            r#"{"version":"2.1","snapshot":{"stage":"CI","outcome":"PASS"}}"#,
        );
        assert!(healthy.is_healthy());

        let old = parse_evidence("e.json", r#"{"version":"2.0","snapshot":{}}"#);
        assert_eq!(old.version.as_deref(), Some("2.0"));
        assert!(!old.is_healthy());

        let broken = parse_evidence("e.json", "{not json");
        assert!(broken.exists);
        assert!(broken.parse_error.is_some());
        assert!(!broken.is_healthy());
    }

    #[test]
    fn parsers_are_total() {
        assert_eq!(parse_smoke_status("unrelated"), SmokeStatus::Unknown);
        assert_eq!(parse_stage_exit("unrelated", "ci").exit_code, None);
        assert_eq!(parse_smoke_mode("unrelated"), None);
    }
}
