//! Adapter readiness: reduces the real-session report to READY / BLOCKED / PENDING.
use super::real_session::{self, ParsedRealSessionReport, ValidationResult};
use crate::cli::AdapterReadinessArgs;
use crate::context::{RunContext, RunOutcome};
use crate::markdown::MarkdownDoc;
use crate::report::{write_report, LoadedReport, ReportEnvelope};
use crate::verdict::{Assessment, Summary, Verdict};
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const KIND: &str = "adapter-readiness";
pub const MISSING_REPORT: &str = "Missing Adapter adapter report";
const NODE_BLOCKER: &str = "Adapter adapter runtime reports `node: command not found`.";

/// Subset of the real-session report that readiness depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParsedAdapterReport {
    pub validation_result: Option<ValidationResult>,
    pub node_command_not_found: bool,
}

impl From<ParsedRealSessionReport> for ParsedAdapterReport {
    fn from(report: ParsedRealSessionReport) -> Self {
        Self {
            validation_result: report.validation_result,
            node_command_not_found: report.node_command_not_found,
        }
    }
}

pub fn parse_adapter_report(markdown: &str) -> ParsedAdapterReport {
    real_session::parse_real_session_report(markdown).into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdapterStatus {
    Pass,
    Fail,
    Missing,
}

impl AdapterStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AdapterStatus::Pass => "PASS",
            AdapterStatus::Fail => "FAIL",
            AdapterStatus::Missing => "MISSING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterEntry {
    pub name: String,
    pub status: AdapterStatus,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterReadinessSummary {
    pub summary: Summary,
    pub adapters: Vec<AdapterEntry>,
}

pub fn summarize_adapter_readiness(adapter: Option<&ParsedAdapterReport>) -> AdapterReadinessSummary {
    let mut assessment = Assessment::new();
    assessment.require(adapter.is_some(), MISSING_REPORT);
    let Some(adapter) = adapter else {
        return AdapterReadinessSummary {
            summary: assessment.resolve(Verdict::Ready, Verdict::Pending),
            adapters: vec![AdapterEntry {
                name: "adapter".to_string(),
                status: AdapterStatus::Missing,
                notes: vec!["No Adapter diagnostics report was provided.".to_string()],
            }],
        };
    };

    let mut notes = Vec::new();
    let mut status = AdapterStatus::Pass;
    if adapter.validation_result != Some(ValidationResult::Pass) {
        let result = adapter.validation_result.map_or("unknown", ValidationResult::as_str);
        status = AdapterStatus::Fail;
        notes.push(format!("Adapter validation result is {result}"));
        assessment.block(format!("Adapter adapter validation is {result}"));
    }
    if adapter.node_command_not_found {
        status = AdapterStatus::Fail;
        notes.push("Adapter runtime reports node command resolution failures.".to_string());
        assessment.block(NODE_BLOCKER);
    }
    if notes.is_empty() {
        notes.push("Adapter adapter diagnostics are healthy.".to_string());
    }
    AdapterReadinessSummary {
        summary: assessment.resolve(Verdict::Ready, Verdict::Pending),
        adapters: vec![AdapterEntry {
            name: "adapter".to_string(),
            status,
            notes,
        }],
    }
}

/// Facts carried by the readiness sidecar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAdapterReadiness {
    pub verdict: Option<String>,
}

pub fn render_adapter_readiness(
    generated_at: &str,
    adapter_report_path: &str,
    has_adapter_report: bool,
    readiness: &AdapterReadinessSummary,
) -> String {
    let summary = &readiness.summary;
    let mut doc = MarkdownDoc::new("Adapter Readiness");
    doc.field("generated_at", generated_at);
    doc.field("verdict", summary.verdict);

    doc.section("Inputs");
    doc.input("adapter_report", adapter_report_path, has_adapter_report);

    doc.section("Adapter Status");
    for adapter in &readiness.adapters {
        doc.field(&adapter.name, adapter.status.as_str());
        for note in &adapter.notes {
            doc.line(format!("  - {note}"));
        }
    }

    doc.section("Missing Inputs");
    doc.bullets_or_none(&summary.missing_inputs);
    doc.section("Blockers");
    doc.bullets_or_none(&summary.blockers);

    doc.section("Next Actions");
    if summary.verdict == Verdict::Ready {
        doc.bullet("Adapter diagnostics are healthy.");
        doc.bullet("Keep this report attached to rollout validation evidence.");
    } else {
        if !has_adapter_report {
            doc.bullet(format!(
                "Generate the Adapter report: `vtriage adapter-real-session-report --out {adapter_report_path}`"
            ));
        }
        if summary
            .blockers
            .iter()
            .any(|item| item.contains("Adapter adapter validation") || item.contains("node: command not found"))
        {
            doc.bullet("Run the adapter hook runtime validation playbook, then regenerate this readiness report.");
        }
    }
    doc.finish()
}

pub fn run(ctx: &RunContext, args: &AdapterReadinessArgs) -> Result<RunOutcome> {
    let report = LoadedReport::load(&ctx.resolve(&args.adapter_report))?;
    let parsed = report
        .parse_with(real_session::KIND, real_session::parse_real_session_report)
        .map(ParsedAdapterReport::from);
    let readiness = summarize_adapter_readiness(parsed.as_ref());
    let adapter_report_path = args.adapter_report.display().to_string();
    let markdown = render_adapter_readiness(
        &ctx.generated_at,
        &adapter_report_path,
        report.exists(),
        &readiness,
    );
    let verdict = readiness.summary.verdict;
    let facts = ParsedAdapterReadiness {
        verdict: Some(verdict.as_str().to_string()),
    };
    let envelope = ReportEnvelope::from_summary(KIND, &ctx.generated_at, &readiness.summary, &facts)?;
    let out = ctx.resolve(&args.out);
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!(
            "adapter readiness report generated at {} (verdict={verdict})",
            out.display()
        ),
        verdict.exit_code(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::parse_verdict_from_markdown;

    #[test]
    fn missing_report_is_pending() {
        let readiness = summarize_adapter_readiness(None);
        assert_eq!(readiness.summary.verdict, Verdict::Pending);
        assert_eq!(readiness.summary.missing_inputs, vec![MISSING_REPORT]);
        assert_eq!(readiness.adapters[0].status, AdapterStatus::Missing);
    }

    #[test]
    fn healthy_report_is_ready() {
        let parsed = parse_adapter_report(
            "- Validation result: PASS\n- Any `bash: node: command not found`: NO\n",
        );
        let readiness = summarize_adapter_readiness(Some(&parsed));
        assert_eq!(readiness.summary.verdict, Verdict::Ready);
        assert!(readiness.summary.blockers.is_empty());
        assert_eq!(
            readiness.adapters[0].notes,
            vec!["Adapter adapter diagnostics are healthy."]
        );
    }

    #[test]
    fn unknown_result_and_node_failure_both_block() {
        let parsed = parse_adapter_report("bash: node: command not found\n");
        let readiness = summarize_adapter_readiness(Some(&parsed));
        assert_eq!(readiness.summary.verdict, Verdict::Blocked);
        assert_eq!(
            readiness.summary.blockers,
            vec!["Adapter adapter validation is unknown", NODE_BLOCKER]
        );
    }

    #[test]
    fn ready_iff_no_blockers_over_all_inputs() {
        for result in [None, Some(ValidationResult::Pass), Some(ValidationResult::Fail)] {
            for node in [false, true] {
                let parsed = ParsedAdapterReport {
                    validation_result: result,
                    node_command_not_found: node,
                };
                let readiness = summarize_adapter_readiness(Some(&parsed));
                assert_eq!(
                    readiness.summary.verdict == Verdict::Ready,
                    readiness.summary.blockers.is_empty()
                );
                assert_eq!(
                    readiness.summary.verdict == Verdict::Ready,
                    result == Some(ValidationResult::Pass) && !node
                );
            }
        }
    }

    #[test]
    fn rendered_ready_report_parses_as_ready() {
        let parsed = ParsedAdapterReport {
            validation_result: Some(ValidationResult::Pass),
            node_command_not_found: false,
        };
        let readiness = summarize_adapter_readiness(Some(&parsed));
        let markdown = render_adapter_readiness(
            "2026-01-01T00:00:00.000Z",
            ".audit-reports/adapter/adapter-real-session-report.md",
            true,
            &readiness,
        );
        assert_eq!(parse_verdict_from_markdown(&markdown).as_deref(), Some("READY"));
        assert!(markdown.contains("- adapter: PASS\n  - Adapter adapter diagnostics are healthy."));
        assert!(markdown.ends_with('\n'));
    }
}
