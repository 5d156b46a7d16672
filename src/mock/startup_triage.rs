//! Startup triage and unblock reports derived from mock package smoke runs.
use super::{assess_smoke_summary, SmokeAssessment, SmokeMode};
use crate::cli::MockTriageArgs;
use crate::consumer::triage::{self, ParsedTriageReport, TriageReport};
use crate::consumer::unblock::{self, ParsedUnblockStatus};
use crate::context::{RunContext, RunOutcome};
use crate::markdown::MarkdownDoc;
use crate::plan::{required_failures, StepExecution, StepStatus};
use crate::report::{read_if_exists, write_report, ReportEnvelope};
use crate::verdict::{Assessment, Summary, Verdict};
use anyhow::Result;

fn execution(assessment: &SmokeAssessment) -> StepExecution {
    let expected = assessment.is_expected();
    StepExecution {
        id: assessment.step_id(),
        required: true,
        command: format!("vtriage package-smoke --mode {}", assessment.mode.as_str()),
        exit_code: None,
        status: if expected {
            StepStatus::Passed
        } else {
            StepStatus::Failed
        },
        output: assessment.file.clone(),
    }
}

pub fn mock_executions(assessments: &[SmokeAssessment]) -> Vec<StepExecution> {
    assessments.iter().map(execution).collect()
}

pub fn summarize_mock_triage(executions: &[StepExecution]) -> Summary {
    let mut assessment = Assessment::new();
    for id in required_failures(executions) {
        assessment.block(format!("Required step failed: {id}"));
    }
    assessment.resolve(Verdict::Ready, Verdict::MissingInputs)
}

/// Unblock state follows the triage verdict.
pub fn summarize_mock_unblock(triage: &Summary, failed_steps: &[String]) -> Summary {
    let mut assessment = Assessment::new();
    for id in failed_steps {
        assessment.block(format!("Mock package smoke step failed: {id}"));
    }
    assessment.block_if(
        failed_steps.is_empty() && triage.verdict != Verdict::Ready,
        format!("Consumer startup triage verdict is {}", triage.verdict),
    );
    assessment.resolve(Verdict::ReadyForRetest, Verdict::MissingInputs)
}

pub struct MockUnblockReport<'a> {
    pub generated_at: &'a str,
    pub repo: &'a str,
    pub triage_report_path: &'a str,
    pub block_summary: &'a SmokeAssessment,
    pub minimal_summary: &'a SmokeAssessment,
    pub summary: &'a Summary,
}

pub fn render_mock_unblock(report: &MockUnblockReport<'_>) -> String {
    let summary = report.summary;
    let mut doc = MarkdownDoc::new("Consumer Startup Unblock Status");
    doc.field("generated_at", report.generated_at);
    doc.code_field("target_repo", report.repo);
    doc.field("source", "mock_consumer_package_smoke");
    doc.field("verdict", summary.verdict);

    doc.section("Inputs");
    doc.code_field("triage_report", report.triage_report_path);
    doc.input(
        "smoke_block_summary",
        &report.block_summary.file,
        report.block_summary.exists,
    );
    doc.input(
        "smoke_minimal_summary",
        &report.minimal_summary.file,
        report.minimal_summary.exists,
    );

    doc.section("Blockers");
    doc.bullets_or_none(&summary.blockers);

    doc.section("Next Actions");
    if summary.verdict == Verdict::ReadyForRetest {
        doc.bullet("Startup unblock criteria are clear for retest in approved consumer context.");
    } else {
        doc.bullet("Resolve mock package smoke failures and regenerate startup triage outputs.");
    }
    doc.finish()
}

pub fn run(ctx: &RunContext, args: &MockTriageArgs) -> Result<RunOutcome> {
    let triage_path = args.out_dir.join(triage::TRIAGE_REPORT);
    let unblock_path = args.out_dir.join(triage::UNBLOCK_REPORT);
    if args.dry_run {
        let lines = [
            "mock consumer startup triage dry-run plan:".to_string(),
            format!("- block-summary: {}", args.block_summary.display()),
            format!("- minimal-summary: {}", args.minimal_summary.display()),
            format!("- triage-report: {}", triage_path.display()),
            format!("- unblock-report: {}", unblock_path.display()),
        ];
        return Ok(RunOutcome::new(lines.join("\n"), 0));
    }

    let labels: Vec<&str> = ctx.config.smoke.stages.iter().map(|stage| stage.id.as_str()).collect();
    let mut assessments = Vec::with_capacity(2);
    for (mode, path) in [
        (SmokeMode::Block, &args.block_summary),
        (SmokeMode::Minimal, &args.minimal_summary),
    ] {
        let text = read_if_exists(&ctx.resolve(path))?;
        assessments.push(assess_smoke_summary(
            mode,
            &path.display().to_string(),
            text.as_deref(),
            &labels,
        ));
    }

    let executions = mock_executions(&assessments);
    let triage_summary = summarize_mock_triage(&executions);
    let failed_steps = required_failures(&executions);
    let triage_markdown = triage::render_triage_report(&TriageReport {
        source: "mock_consumer_package_smoke",
        generated_at: &ctx.generated_at,
        repo: &args.repo,
        out_dir: &args.out_dir.display().to_string(),
        summary: &triage_summary,
        required_failed_steps: &failed_steps,
        executions: &executions,
        steps: &[],
    });
    let triage_facts = ParsedTriageReport {
        verdict: Some(triage_summary.verdict.as_str().to_string()),
        required_failed_steps: failed_steps.clone(),
    };
    let triage_out = ctx.resolve(&triage_path);
    write_report(
        &triage_out,
        &triage_markdown,
        &ReportEnvelope::from_summary(triage::KIND, &ctx.generated_at, &triage_summary, &triage_facts)?,
    )?;

    let unblock_summary = summarize_mock_unblock(&triage_summary, &failed_steps);
    let unblock_markdown = render_mock_unblock(&MockUnblockReport {
        generated_at: &ctx.generated_at,
        repo: &args.repo,
        triage_report_path: &triage_path.display().to_string(),
        block_summary: &assessments[0],
        minimal_summary: &assessments[1],
        summary: &unblock_summary,
    });
    let unblock_facts = ParsedUnblockStatus {
        verdict: Some(unblock_summary.verdict.as_str().to_string()),
        startup_failure_runs: None,
        startup_stalled_runs: None,
        blockers: unblock_summary.blockers.clone(),
    };
    let unblock_out = ctx.resolve(&unblock_path);
    write_report(
        &unblock_out,
        &unblock_markdown,
        &ReportEnvelope::from_summary(unblock::KIND, &ctx.generated_at, &unblock_summary, &unblock_facts)?,
    )?;

    Ok(RunOutcome::new(
        format!(
            "mock consumer startup triage generated at {} (verdict={})\n\
             mock consumer startup unblock status generated at {} (verdict={})",
            triage_out.display(),
            triage_summary.verdict,
            unblock_out.display(),
            unblock_summary.verdict
        ),
        triage_summary.verdict.exit_code(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::consumer::triage::parse_triage_report;
    use crate::consumer::unblock::parse_unblock_status;
    use crate::report::LoadedReport;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn args() -> MockTriageArgs {
        MockTriageArgs {
            repo: "mock/consumer".to_string(),
            out_dir: PathBuf::from("phase5"),
            block_summary: PathBuf::from("smoke/block/summary.md"),
            minimal_summary: PathBuf::from("smoke/minimal/summary.md"),
            dry_run: false,
        }
    }

    fn write_summary(root: &std::path::Path, mode: &str, exit: i32, outcome: &str) {
        let dir = root.join("smoke").join(mode);
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(
            dir.join("summary.md"),
            format!(
                "# Package Install Smoke Report\n\n- Smoke mode: `{mode}`\n- Status: PASS\n\
                 - pre-commit exit: `{exit}` ({outcome})\n- pre-push exit: `{exit}` ({outcome})\n\
                 - ci exit: `{exit}` ({outcome})\n"
            ),
        )
        .expect("write summary");
    }

    #[test]
    fn expected_smoke_runs_are_ready_for_retest() {
        let dir = TempDir::new().expect("tempdir");
        write_summary(dir.path(), "block", 1, "BLOCK");
        write_summary(dir.path(), "minimal", 0, "PASS");
        let ctx = RunContext::new(dir.path().to_path_buf(), default_config(), "2026-01-01T00:00:00.000Z");

        let outcome = run(&ctx, &args()).expect("run");
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.message.lines().count(), 2);

        let triage = LoadedReport::load(&dir.path().join("phase5").join(triage::TRIAGE_REPORT))
            .expect("load triage");
        assert_eq!(triage.verdict().as_deref(), Some("READY"));
        assert!(triage.text().contains("| mock-package-smoke-block | yes | - | passed |"));

        let unblock = LoadedReport::load(&dir.path().join("phase5").join(triage::UNBLOCK_REPORT))
            .expect("load unblock");
        assert_eq!(unblock.verdict().as_deref(), Some("READY_FOR_RETEST"));
    }

    #[test]
    fn missing_minimal_summary_blocks_both_reports() {
        let dir = TempDir::new().expect("tempdir");
        write_summary(dir.path(), "block", 1, "BLOCK");
        let ctx = RunContext::new(dir.path().to_path_buf(), default_config(), "2026-01-01T00:00:00.000Z");

        let outcome = run(&ctx, &args()).expect("run");
        assert_eq!(outcome.exit_code, 1);

        let triage = LoadedReport::load(&dir.path().join("phase5").join(triage::TRIAGE_REPORT))
            .expect("load triage");
        let parsed = parse_triage_report(triage.text());
        assert_eq!(parsed.verdict.as_deref(), Some("BLOCKED"));
        assert_eq!(parsed.required_failed_steps, vec!["mock-package-smoke-minimal"]);

        let unblock = LoadedReport::load(&dir.path().join("phase5").join(triage::UNBLOCK_REPORT))
            .expect("load unblock");
        let parsed = parse_unblock_status(unblock.text());
        assert_eq!(parsed.verdict.as_deref(), Some("BLOCKED"));
        assert_eq!(
            parsed.blockers,
            vec!["Mock package smoke step failed: mock-package-smoke-minimal"]
        );
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let ctx = RunContext::new(dir.path().to_path_buf(), default_config(), "2026-01-01T00:00:00.000Z");
        let mut args = args();
        args.dry_run = true;
        let outcome = run(&ctx, &args).expect("run");
        assert!(outcome.message.starts_with("mock consumer startup triage dry-run plan:"));
        assert!(outcome.message.contains("- unblock-report: phase5/consumer-startup-unblock-status.md"));
        assert!(!dir.path().join("phase5").exists());
    }
}
