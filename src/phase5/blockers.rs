//! Phase 5 blockers readiness from the adapter real-session and consumer triage reports.
use super::verdict_is;
use crate::adapter::real_session::{self, ParsedRealSessionReport, ValidationResult};
use crate::cli::Phase5BlockersArgs;
use crate::consumer::triage::{self, ParsedTriageReport};
use crate::context::{RunContext, RunOutcome};
use crate::markdown::MarkdownDoc;
use crate::report::{write_report, LoadedReport, ReportEnvelope};
use crate::util::yes_no;
use crate::verdict::{or_unknown, Assessment, Summary, Verdict};
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const KIND: &str = "phase5-blockers-readiness";
pub const MISSING_ADAPTER_REPORT: &str = "Missing Adapter real-session report";
pub const MISSING_TRIAGE_REPORT: &str = "Missing consumer startup triage report";
const NODE_BLOCKER: &str = "Adapter runtime still reports node command resolution failures";

#[derive(Debug, Clone, Copy, Default)]
pub struct BlockersInputs<'a> {
    pub adapter: Option<&'a ParsedRealSessionReport>,
    pub triage: Option<&'a ParsedTriageReport>,
    pub require_adapter_report: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockersSummary {
    pub summary: Summary,
    pub adapter_validation_result: Option<ValidationResult>,
    pub consumer_triage_verdict: Option<String>,
}

pub fn summarize_phase5_blockers(inputs: BlockersInputs<'_>) -> BlockersSummary {
    let mut assessment = Assessment::new();
    assessment.require(
        !inputs.require_adapter_report || inputs.adapter.is_some(),
        MISSING_ADAPTER_REPORT,
    );
    assessment.require(inputs.triage.is_some(), MISSING_TRIAGE_REPORT);

    let adapter_validation_result = inputs.adapter.and_then(|adapter| adapter.validation_result);
    let consumer_triage_verdict = inputs.triage.and_then(|triage| triage.verdict.clone());

    if let Some(adapter) = inputs.adapter {
        if adapter.validation_result != Some(ValidationResult::Pass) {
            assessment.block(format!(
                "Adapter real-session validation is {}",
                adapter
                    .validation_result
                    .map_or("unknown", ValidationResult::as_str)
            ));
        }
        assessment.block_if(adapter.node_command_not_found, NODE_BLOCKER);
    }
    if let Some(triage) = inputs.triage {
        if !verdict_is(triage.verdict.as_deref(), Verdict::Ready) {
            assessment.block(format!(
                "Consumer startup triage verdict is {}",
                or_unknown(triage.verdict.as_deref())
            ));
        }
        for step in &triage.required_failed_steps {
            assessment.block(format!("Consumer triage required step failed: {step}"));
        }
    }

    BlockersSummary {
        summary: assessment.resolve(Verdict::Ready, Verdict::MissingInputs),
        adapter_validation_result,
        consumer_triage_verdict,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPhase5Blockers {
    pub verdict: Option<String>,
}

pub fn parse_phase5_blockers(markdown: &str) -> ParsedPhase5Blockers {
    ParsedPhase5Blockers {
        verdict: crate::report::parse_verdict_from_markdown(markdown),
    }
}

pub struct BlockersReport<'a> {
    pub generated_at: &'a str,
    pub adapter_report_path: &'a str,
    pub consumer_triage_report_path: &'a str,
    pub has_adapter_report: bool,
    pub has_consumer_triage_report: bool,
    pub require_adapter_report: bool,
    pub blockers: &'a BlockersSummary,
}

pub fn render_phase5_blockers(report: &BlockersReport<'_>) -> String {
    let summary = &report.blockers.summary;
    let mut doc = MarkdownDoc::new("Phase 5 Blockers Readiness");
    doc.field("generated_at", report.generated_at);
    doc.field("verdict", summary.verdict);

    doc.section("Inputs");
    doc.input("adapter_report", report.adapter_report_path, report.has_adapter_report);
    doc.field("adapter_required", yes_no(report.require_adapter_report));
    doc.input(
        "consumer_triage_report",
        report.consumer_triage_report_path,
        report.has_consumer_triage_report,
    );

    doc.section("Signals");
    doc.field(
        "adapter_validation_result",
        report
            .blockers
            .adapter_validation_result
            .map_or("unknown", ValidationResult::as_str),
    );
    doc.field(
        "consumer_triage_verdict",
        or_unknown(report.blockers.consumer_triage_verdict.as_deref()),
    );

    doc.section("Missing Inputs");
    doc.bullets_or_none(&summary.missing_inputs);
    doc.section("Blockers");
    doc.bullets_or_none(&summary.blockers);

    doc.section("Next Actions");
    if summary.verdict == Verdict::Ready {
        doc.bullet("Phase 5 blockers are clear for execution closure.");
        doc.bullet("Attach this report to release/rollout notes.");
        if !report.has_adapter_report {
            doc.bullet("Optional: generate the adapter real-session report for diagnostics traceability (`vtriage adapter-real-session-report`).");
        }
        return doc.finish();
    }
    if !report.has_adapter_report && report.require_adapter_report {
        doc.bullet(format!(
            "Generate the adapter report: `vtriage adapter-real-session-report --out {}`",
            report.adapter_report_path
        ));
    }
    if !report.has_consumer_triage_report {
        doc.bullet("Generate the consumer triage report: `vtriage consumer-startup-triage --repo <owner>/<repo> --skip-workflow-lint`");
    }
    if summary.blockers.iter().any(|item| item == NODE_BLOCKER) {
        doc.bullet("Repeat the adapter hook runtime validation in a real session and regenerate the reports.");
    }
    if summary
        .blockers
        .iter()
        .any(|item| item.starts_with("Consumer startup triage") || item.starts_with("Consumer triage required step"))
    {
        doc.bullet("Resolve failed consumer triage steps and rerun `vtriage consumer-startup-triage` to refresh status.");
    }
    doc.finish()
}

pub fn run(ctx: &RunContext, args: &Phase5BlockersArgs) -> Result<RunOutcome> {
    let adapter_report = LoadedReport::load(&ctx.resolve(&args.adapter_report))?;
    let triage_report = LoadedReport::load(&ctx.resolve(&args.consumer_triage_report))?;
    let adapter =
        adapter_report.parse_with(real_session::KIND, real_session::parse_real_session_report);
    let triage = triage_report.parse_with(triage::KIND, triage::parse_triage_report);
    if adapter.is_none() && !args.require_adapter_report {
        tracing::debug!(path = %adapter_report.path.display(), "adapter report absent; adapter checks skipped");
    }

    let blockers = summarize_phase5_blockers(BlockersInputs {
        adapter: adapter.as_ref(),
        triage: triage.as_ref(),
        require_adapter_report: args.require_adapter_report,
    });
    let markdown = render_phase5_blockers(&BlockersReport {
        generated_at: &ctx.generated_at,
        adapter_report_path: &args.adapter_report.display().to_string(),
        consumer_triage_report_path: &args.consumer_triage_report.display().to_string(),
        has_adapter_report: adapter_report.exists(),
        has_consumer_triage_report: triage_report.exists(),
        require_adapter_report: args.require_adapter_report,
        blockers: &blockers,
    });
    let summary = &blockers.summary;
    let facts = ParsedPhase5Blockers {
        verdict: Some(summary.verdict.as_str().to_string()),
    };
    let envelope = ReportEnvelope::from_summary(KIND, &ctx.generated_at, summary, &facts)?;
    let out = ctx.resolve(&args.out);
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!(
            "phase5 blockers readiness generated at {} (verdict={})",
            out.display(),
            summary.verdict
        ),
        summary.verdict.exit_code(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(result: Option<ValidationResult>, node: bool) -> ParsedRealSessionReport {
        ParsedRealSessionReport {
            validation_result: result,
            re_test_required: None,
            node_command_not_found: node,
        }
    }

    fn triage(verdict: &str, failed: &[&str]) -> ParsedTriageReport {
        ParsedTriageReport {
            verdict: Some(verdict.to_string()),
            required_failed_steps: failed.iter().map(|step| step.to_string()).collect(),
        }
    }

    #[test]
    fn required_adapter_report_is_a_missing_input() {
        let triage = triage("READY", &[]);
        let result = summarize_phase5_blockers(BlockersInputs {
            adapter: None,
            triage: Some(&triage),
            require_adapter_report: true,
        });
        assert_eq!(result.summary.verdict, Verdict::MissingInputs);
        assert_eq!(result.summary.blockers, vec![MISSING_ADAPTER_REPORT]);

        let missing_both = summarize_phase5_blockers(BlockersInputs {
            require_adapter_report: true,
            ..BlockersInputs::default()
        });
        assert_eq!(
            missing_both.summary.missing_inputs,
            vec![MISSING_ADAPTER_REPORT, MISSING_TRIAGE_REPORT]
        );
    }

    #[test]
    fn absent_optional_adapter_report_skips_adapter_checks() {
        let triage = triage("READY", &[]);
        let result = summarize_phase5_blockers(BlockersInputs {
            adapter: None,
            triage: Some(&triage),
            require_adapter_report: false,
        });
        assert_eq!(result.summary.verdict, Verdict::Ready);
    }

    #[test]
    fn blockers_follow_check_order() {
        let adapter = adapter(Some(ValidationResult::Fail), true);
        let triage = triage("BLOCKED", &["ci-artifacts", "support-bundle"]);
        let result = summarize_phase5_blockers(BlockersInputs {
            adapter: Some(&adapter),
            triage: Some(&triage),
            require_adapter_report: false,
        });
        assert_eq!(
            result.summary.blockers,
            vec![
                "Adapter real-session validation is FAIL",
                NODE_BLOCKER,
                "Consumer startup triage verdict is BLOCKED",
                "Consumer triage required step failed: ci-artifacts",
                "Consumer triage required step failed: support-bundle",
            ]
        );
    }

    #[test]
    fn ready_iff_no_blockers_truth_table() {
        for mask in 0u32..16 {
            let bit = |n: u32| mask & (1 << n) != 0;
            let adapter = adapter(
                if bit(0) { Some(ValidationResult::Fail) } else { Some(ValidationResult::Pass) },
                bit(1),
            );
            let failed: &[&str] = if bit(3) { &["auth-check"] } else { &[] };
            let triage = triage(if bit(2) { "BLOCKED" } else { "READY" }, failed);
            let result = summarize_phase5_blockers(BlockersInputs {
                adapter: Some(&adapter),
                triage: Some(&triage),
                require_adapter_report: true,
            });
            assert_eq!(
                result.summary.verdict == Verdict::Ready,
                result.summary.blockers.is_empty(),
                "mask {mask:04b}"
            );
            assert_eq!(result.summary.blockers.is_empty(), mask == 0, "mask {mask:04b}");
        }
    }

    #[test]
    fn rendered_report_round_trips_verdict() {
        let triage = triage("READY", &[]);
        let blockers = summarize_phase5_blockers(BlockersInputs {
            adapter: None,
            triage: Some(&triage),
            require_adapter_report: false,
        });
        let markdown = render_phase5_blockers(&BlockersReport {
            generated_at: "2026-01-01T00:00:00.000Z",
            adapter_report_path: "adapter.md",
            consumer_triage_report_path: "triage.md",
            has_adapter_report: false,
            has_consumer_triage_report: true,
            require_adapter_report: false,
            blockers: &blockers,
        });
        assert!(markdown.contains("- adapter_report: `adapter.md` (missing)"));
        assert!(markdown.contains("- adapter_required: NO"));
        assert!(markdown.contains("- consumer_triage_verdict: READY"));
        assert_eq!(parse_phase5_blockers(&markdown).verdict.as_deref(), Some("READY"));
    }
}
