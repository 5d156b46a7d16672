//! Phase 5 execution closure status.
use super::{verdict_is, MISSING_BLOCKERS_REPORT, MISSING_UNBLOCK_REPORT};
use crate::cli::ClosureStatusArgs;
use crate::context::{RunContext, RunOutcome};
use crate::markdown::MarkdownDoc;
use crate::report::{write_report, LoadedReport, ReportEnvelope};
use crate::util::yes_no;
use crate::verdict::{or_unknown, Assessment, Summary, Verdict};
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const KIND: &str = "phase5-execution-closure-status";
pub const MISSING_ADAPTER_READINESS: &str = "Missing adapter readiness report";

/// Verdict tokens read from each input; `None` when absent or unparseable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureVerdicts {
    pub phase5_blockers: Option<String>,
    pub consumer_unblock: Option<String>,
    pub adapter_readiness: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClosureInputs<'a> {
    pub has_blockers_report: bool,
    pub has_unblock_report: bool,
    pub has_adapter_readiness: bool,
    pub require_adapter_readiness: bool,
    pub verdicts: Option<&'a ClosureVerdicts>,
}

pub fn summarize_closure_status(inputs: ClosureInputs<'_>) -> Summary {
    let empty = ClosureVerdicts::default();
    let verdicts = inputs.verdicts.unwrap_or(&empty);
    let mut assessment = Assessment::new();
    assessment.require(inputs.has_blockers_report, MISSING_BLOCKERS_REPORT);
    assessment.require(inputs.has_unblock_report, MISSING_UNBLOCK_REPORT);
    assessment.require(
        !inputs.require_adapter_readiness || inputs.has_adapter_readiness,
        MISSING_ADAPTER_READINESS,
    );

    if inputs.has_blockers_report && !verdict_is(verdicts.phase5_blockers.as_deref(), Verdict::Ready) {
        assessment.block(format!(
            "Phase 5 blockers readiness verdict is {}",
            or_unknown(verdicts.phase5_blockers.as_deref())
        ));
    }
    if inputs.has_unblock_report
        && !verdict_is(verdicts.consumer_unblock.as_deref(), Verdict::ReadyForRetest)
    {
        assessment.block(format!(
            "Consumer startup unblock verdict is {}",
            or_unknown(verdicts.consumer_unblock.as_deref())
        ));
    }
    if inputs.has_adapter_readiness
        && !verdict_is(verdicts.adapter_readiness.as_deref(), Verdict::Ready)
    {
        let verdict = or_unknown(verdicts.adapter_readiness.as_deref());
        if inputs.require_adapter_readiness {
            assessment.block(format!("Adapter readiness verdict is {verdict}"));
        } else {
            assessment.warn(format!(
                "Adapter readiness is {verdict} (not required in current mode)"
            ));
        }
    }

    assessment.resolve(Verdict::Ready, Verdict::MissingInputs)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedClosureStatus {
    pub verdict: Option<String>,
}

pub fn parse_closure_status(markdown: &str) -> ParsedClosureStatus {
    ParsedClosureStatus {
        verdict: crate::report::parse_verdict_from_markdown(markdown),
    }
}

pub struct ClosureStatusReport<'a> {
    pub generated_at: &'a str,
    pub blockers_report: (&'a str, bool),
    pub unblock_report: (&'a str, bool),
    pub adapter_readiness_report: (&'a str, bool),
    pub require_adapter_readiness: bool,
    pub verdicts: &'a ClosureVerdicts,
    pub summary: &'a Summary,
}

pub fn render_closure_status(report: &ClosureStatusReport<'_>) -> String {
    let summary = report.summary;
    let mut doc = MarkdownDoc::new("Phase 5 Execution Closure Status");
    doc.field("generated_at", report.generated_at);
    doc.field("verdict", summary.verdict);

    doc.section("Inputs");
    doc.input("phase5_blockers_report", report.blockers_report.0, report.blockers_report.1);
    doc.input("consumer_unblock_report", report.unblock_report.0, report.unblock_report.1);
    doc.input(
        "adapter_readiness_report",
        report.adapter_readiness_report.0,
        report.adapter_readiness_report.1,
    );
    doc.field("adapter_readiness_required", yes_no(report.require_adapter_readiness));

    doc.section("Parsed Verdicts");
    doc.field("phase5_blockers", or_unknown(report.verdicts.phase5_blockers.as_deref()));
    doc.field("consumer_unblock", or_unknown(report.verdicts.consumer_unblock.as_deref()));
    doc.field("adapter_readiness", or_unknown(report.verdicts.adapter_readiness.as_deref()));

    doc.section("Missing Inputs");
    doc.bullets_or_none(&summary.missing_inputs);
    doc.section("Blockers");
    doc.bullets_or_none(&summary.blockers);
    doc.section("Warnings");
    doc.bullets_or_none(&summary.warnings);

    doc.section("Next Actions");
    match summary.verdict {
        Verdict::Ready => {
            doc.bullet("Phase 5 execution closure is clear. Attach this report and its inputs to the release notes.");
            doc.bullet("Generate the external handoff packet: `vtriage phase5-external-handoff`.");
        }
        Verdict::MissingInputs => {
            if !report.blockers_report.1 {
                doc.bullet("Generate the blockers report: `vtriage phase5-blockers-readiness`.");
            }
            if !report.unblock_report.1 {
                doc.bullet("Generate the unblock report: `vtriage consumer-startup-unblock-status` or `vtriage mock-consumer-startup-triage`.");
            }
            if report.require_adapter_readiness && !report.adapter_readiness_report.1 {
                doc.bullet("Generate the adapter readiness report: `vtriage adapter-readiness`.");
            }
        }
        _ => {
            doc.bullet("Resolve the blockers above and regenerate the input reports.");
            doc.bullet("Rerun `vtriage phase5-execution-closure-status` to refresh closure status.");
        }
    }
    doc.finish()
}

pub fn run(ctx: &RunContext, args: &ClosureStatusArgs) -> Result<RunOutcome> {
    let blockers = LoadedReport::load(&ctx.resolve(&args.phase5_blockers_report))?;
    let unblock = LoadedReport::load(&ctx.resolve(&args.consumer_unblock_report))?;
    let adapter = LoadedReport::load(&ctx.resolve(&args.adapter_readiness_report))?;
    let verdicts = ClosureVerdicts {
        phase5_blockers: blockers.verdict(),
        consumer_unblock: unblock.verdict(),
        adapter_readiness: adapter.verdict(),
    };
    let summary = summarize_closure_status(ClosureInputs {
        has_blockers_report: blockers.exists(),
        has_unblock_report: unblock.exists(),
        has_adapter_readiness: adapter.exists(),
        require_adapter_readiness: args.require_adapter_readiness,
        verdicts: Some(&verdicts),
    });

    let blockers_path = args.phase5_blockers_report.display().to_string();
    let unblock_path = args.consumer_unblock_report.display().to_string();
    let adapter_path = args.adapter_readiness_report.display().to_string();
    let markdown = render_closure_status(&ClosureStatusReport {
        generated_at: &ctx.generated_at,
        blockers_report: (&blockers_path, blockers.exists()),
        unblock_report: (&unblock_path, unblock.exists()),
        adapter_readiness_report: (&adapter_path, adapter.exists()),
        require_adapter_readiness: args.require_adapter_readiness,
        verdicts: &verdicts,
        summary: &summary,
    });
    let facts = ParsedClosureStatus {
        verdict: Some(summary.verdict.as_str().to_string()),
    };
    let envelope = ReportEnvelope::from_summary(KIND, &ctx.generated_at, &summary, &facts)?;
    let out = ctx.resolve(&args.out);
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!(
            "phase5 execution closure status generated at {} (verdict={})",
            out.display(),
            summary.verdict
        ),
        summary.verdict.exit_code(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn verdicts(blockers: &str, unblock: &str, adapter: Option<&str>) -> ClosureVerdicts {
        ClosureVerdicts {
            phase5_blockers: Some(blockers.to_string()),
            consumer_unblock: Some(unblock.to_string()),
            adapter_readiness: adapter.map(str::to_string),
        }
    }

    fn inputs(verdicts: &ClosureVerdicts, require_adapter: bool) -> ClosureInputs<'_> {
        ClosureInputs {
            has_blockers_report: true,
            has_unblock_report: true,
            has_adapter_readiness: verdicts.adapter_readiness.is_some(),
            require_adapter_readiness: require_adapter,
            verdicts: Some(verdicts),
        }
    }

    #[test]
    fn missing_reports_win_over_blockers() {
        let summary = summarize_closure_status(ClosureInputs {
            require_adapter_readiness: true,
            ..ClosureInputs::default()
        });
        assert_eq!(summary.verdict, Verdict::MissingInputs);
        assert_eq!(
            summary.missing_inputs,
            vec![MISSING_BLOCKERS_REPORT, MISSING_UNBLOCK_REPORT, MISSING_ADAPTER_READINESS]
        );
        assert_eq!(summary.blockers, summary.missing_inputs);
    }

    #[test]
    fn unblock_must_be_ready_for_retest() {
        let verdicts = verdicts("READY", "READY", None);
        let summary = summarize_closure_status(inputs(&verdicts, false));
        assert_eq!(summary.verdict, Verdict::Blocked);
        assert_eq!(summary.blockers, vec!["Consumer startup unblock verdict is READY"]);
    }

    #[test]
    fn optional_adapter_readiness_only_warns() {
        let verdicts = verdicts("READY", "READY_FOR_RETEST", Some("PENDING"));
        let summary = summarize_closure_status(inputs(&verdicts, false));
        assert_eq!(summary.verdict, Verdict::Ready);
        assert_eq!(
            summary.warnings,
            vec!["Adapter readiness is PENDING (not required in current mode)"]
        );

        let summary = summarize_closure_status(inputs(&verdicts, true));
        assert_eq!(summary.verdict, Verdict::Blocked);
        assert_eq!(summary.blockers, vec!["Adapter readiness verdict is PENDING"]);
    }

    #[test]
    fn ready_iff_no_blockers_truth_table() {
        for mask in 0u32..8 {
            let bit = |n: u32| mask & (1 << n) != 0;
            let verdicts = verdicts(
                if bit(0) { "BLOCKED" } else { "READY" },
                if bit(1) { "BLOCKED" } else { "READY_FOR_RETEST" },
                Some(if bit(2) { "BLOCKED" } else { "READY" }),
            );
            let summary = summarize_closure_status(inputs(&verdicts, true));
            assert_eq!(summary.verdict == Verdict::Ready, summary.blockers.is_empty());
            assert_eq!(summary.blockers.is_empty(), mask == 0, "mask {mask:03b}");
        }
    }

    fn write(root: &Path, rel: &str, verdict: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, format!("# Report\n\n- verdict: {verdict}\n")).expect("write");
    }

    #[test]
    fn run_reads_markdown_verdicts() {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "p5/blockers.md", "READY");
        write(dir.path(), "p5/unblock.md", "READY_FOR_RETEST");
        let ctx = RunContext::new(dir.path().to_path_buf(), default_config(), "2026-01-01T00:00:00.000Z");
        let args = ClosureStatusArgs {
            phase5_blockers_report: PathBuf::from("p5/blockers.md"),
            consumer_unblock_report: PathBuf::from("p5/unblock.md"),
            adapter_readiness_report: PathBuf::from("p5/adapter.md"),
            require_adapter_readiness: false,
            out: PathBuf::from("p5/status.md"),
        };
        let outcome = run(&ctx, &args).expect("run");
        assert_eq!(outcome.exit_code, 0);

        let report = LoadedReport::load(&dir.path().join("p5/status.md")).expect("load");
        assert_eq!(report.verdict().as_deref(), Some("READY"));
        assert!(report.text().contains("- adapter_readiness_report: `p5/adapter.md` (missing)"));
        assert!(report.text().contains("- adapter_readiness: unknown"));
        assert_eq!(parse_closure_status(report.text()).verdict.as_deref(), Some("READY"));
    }
}
