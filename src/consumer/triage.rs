//! Consumer startup triage: runs every consumer step and summarizes the run.
use crate::cli::ConsumerTriageArgs;
use crate::context::{RunContext, RunOutcome};
use crate::exec::{SelfInvoker, StepRunner};
use crate::markdown::MarkdownDoc;
use crate::plan::{
    dry_run_listing, execute_plan, optional_failures, render_command_plan, render_executions,
    required_failures, HaltPolicy, PlannedStep, StepExecution,
};
use crate::report::{write_report, ReportEnvelope};
use crate::util::{dedupe, labeled_value};
use crate::verdict::{Assessment, Summary, Verdict};
use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const KIND: &str = "consumer-startup-triage";

pub const AUTH_REPORT: &str = "consumer-ci-auth-check.md";
pub const ARTIFACTS_REPORT: &str = "consumer-ci-artifacts-report.md";
pub const WORKFLOW_LINT_REPORT: &str = "consumer-workflow-lint-report.md";
pub const SUPPORT_BUNDLE_REPORT: &str = "consumer-startup-failure-support-bundle.md";
pub const SUPPORT_TICKET_REPORT: &str = "consumer-support-ticket-draft.md";
pub const UNBLOCK_REPORT: &str = "consumer-startup-unblock-status.md";
pub const TRIAGE_REPORT: &str = "consumer-startup-triage-report.md";

pub const WORKFLOW_LINT_USAGE: &str =
    "Workflow lint requires --repo-path and --actionlint-bin (or use --skip-workflow-lint).";

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Ordered triage steps; outputs land in `out_dir`.
pub fn build_triage_plan(args: &ConsumerTriageArgs) -> Result<Vec<PlannedStep>> {
    let out = |leaf: &str| args.out_dir.join(leaf);
    let limit = args.limit.to_string();
    let mut steps = Vec::new();

    if !args.skip_auth_check {
        steps.push(PlannedStep::new(
            "auth-check",
            true,
            [
                "consumer-auth-check".to_string(),
                "--repo".to_string(),
                args.repo.clone(),
                "--out".to_string(),
                path_arg(&out(AUTH_REPORT)),
            ],
            out(AUTH_REPORT),
        ));
    }
    steps.push(PlannedStep::new(
        "ci-artifacts",
        true,
        [
            "consumer-ci-artifacts".to_string(),
            "--repo".to_string(),
            args.repo.clone(),
            "--limit".to_string(),
            limit.clone(),
            "--out".to_string(),
            path_arg(&out(ARTIFACTS_REPORT)),
        ],
        out(ARTIFACTS_REPORT),
    ));
    if !args.skip_workflow_lint {
        let (Some(repo_path), Some(actionlint_bin)) = (&args.repo_path, &args.actionlint_bin)
        else {
            return Err(anyhow!(WORKFLOW_LINT_USAGE));
        };
        steps.push(PlannedStep::new(
            "workflow-lint",
            false,
            [
                "consumer-workflow-lint".to_string(),
                "--repo-path".to_string(),
                path_arg(repo_path),
                "--actionlint-bin".to_string(),
                actionlint_bin.clone(),
                "--out".to_string(),
                path_arg(&out(WORKFLOW_LINT_REPORT)),
            ],
            out(WORKFLOW_LINT_REPORT),
        ));
    }
    steps.push(PlannedStep::new(
        "support-bundle",
        true,
        [
            "consumer-support-bundle".to_string(),
            "--repo".to_string(),
            args.repo.clone(),
            "--limit".to_string(),
            limit,
            "--out".to_string(),
            path_arg(&out(SUPPORT_BUNDLE_REPORT)),
        ],
        out(SUPPORT_BUNDLE_REPORT),
    ));
    steps.push(PlannedStep::new(
        "support-ticket-draft",
        true,
        [
            "consumer-support-ticket-draft".to_string(),
            "--repo".to_string(),
            args.repo.clone(),
            "--support-bundle".to_string(),
            path_arg(&out(SUPPORT_BUNDLE_REPORT)),
            "--auth-report".to_string(),
            path_arg(&out(AUTH_REPORT)),
            "--out".to_string(),
            path_arg(&out(SUPPORT_TICKET_REPORT)),
        ],
        out(SUPPORT_TICKET_REPORT),
    ));
    steps.push(PlannedStep::new(
        "startup-unblock-status",
        true,
        [
            "consumer-startup-unblock-status".to_string(),
            "--repo".to_string(),
            args.repo.clone(),
            "--support-bundle".to_string(),
            path_arg(&out(SUPPORT_BUNDLE_REPORT)),
            "--auth-report".to_string(),
            path_arg(&out(AUTH_REPORT)),
            "--workflow-lint-report".to_string(),
            path_arg(&out(WORKFLOW_LINT_REPORT)),
            "--out".to_string(),
            path_arg(&out(UNBLOCK_REPORT)),
        ],
        out(UNBLOCK_REPORT),
    ));
    Ok(steps)
}

pub fn summarize_triage(executions: &[StepExecution]) -> Summary {
    let mut assessment = Assessment::new();
    for id in required_failures(executions) {
        assessment.block(format!("Required step failed: {id}"));
    }
    for id in optional_failures(executions) {
        assessment.warn(format!("Optional step failed: {id}"));
    }
    assessment.resolve(Verdict::Ready, Verdict::MissingInputs)
}

/// Facts read back by the phase 5 blockers report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTriageReport {
    pub verdict: Option<String>,
    pub required_failed_steps: Vec<String>,
}

fn resolve_step_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Resolve failed required step `([^`]+)`").expect("regex for failed step actions")
    })
}

/// Failed steps come from the header field, else from the next-action lines.
pub fn parse_triage_report(markdown: &str) -> ParsedTriageReport {
    let from_field: Vec<String> = match labeled_value(markdown, "required_failed_steps") {
        Some(value) if value != "none" => value
            .split(',')
            .map(|item| item.trim().trim_matches('`').to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    let required_failed_steps = if from_field.is_empty() {
        dedupe(
            resolve_step_re()
                .captures_iter(markdown)
                .filter_map(|caps| caps.get(1))
                .map(|step| step.as_str().trim().to_string()),
        )
    } else {
        dedupe(from_field)
    };
    ParsedTriageReport {
        verdict: crate::report::parse_verdict_from_markdown(markdown),
        required_failed_steps,
    }
}

/// Report inputs; the mock triage pipeline renders through the same layout.
pub struct TriageReport<'a> {
    pub source: &'a str,
    pub generated_at: &'a str,
    pub repo: &'a str,
    pub out_dir: &'a str,
    pub summary: &'a Summary,
    pub required_failed_steps: &'a [String],
    pub executions: &'a [StepExecution],
    pub steps: &'a [PlannedStep],
}

pub fn render_triage_report(report: &TriageReport<'_>) -> String {
    let summary = report.summary;
    let mut doc = MarkdownDoc::new("Consumer Startup Triage Report");
    doc.field("generated_at", report.generated_at);
    doc.code_field("target_repo", report.repo);
    doc.code_field("out_dir", report.out_dir);
    doc.field("source", report.source);
    doc.field("verdict", summary.verdict);
    if report.required_failed_steps.is_empty() {
        doc.field("required_failed_steps", "none");
    } else {
        doc.field("required_failed_steps", report.required_failed_steps.join(", "));
    }

    doc.section("Executions");
    render_executions(&mut doc, report.executions);

    if !report.steps.is_empty() {
        doc.section("Command Plan");
        render_command_plan(&mut doc, report.steps);
    }

    doc.section("Blockers");
    doc.bullets_or_none(&summary.blockers);
    doc.section("Warnings");
    doc.bullets_or_none(&summary.warnings);

    doc.section("Next Actions");
    if summary.verdict == Verdict::Ready {
        doc.bullet("Review the startup unblock status and attach the generated reports to the validation record.");
    } else {
        for id in report.required_failed_steps {
            doc.bullet(format!("Resolve failed required step `{id}` and rerun startup triage."));
        }
    }
    doc.finish()
}

pub fn run(ctx: &RunContext, args: &ConsumerTriageArgs) -> Result<RunOutcome> {
    run_with(ctx, args, &mut SelfInvoker::new(ctx))
}

pub fn run_with(
    ctx: &RunContext,
    args: &ConsumerTriageArgs,
    runner: &mut dyn StepRunner,
) -> Result<RunOutcome> {
    let steps = build_triage_plan(args)?;
    if args.dry_run {
        return Ok(RunOutcome::new(
            dry_run_listing("consumer startup triage dry-run plan:", &steps),
            0,
        ));
    }

    let executions = execute_plan(&steps, runner, HaltPolicy::RunAll)?;
    let summary = summarize_triage(&executions);
    let facts = ParsedTriageReport {
        verdict: Some(summary.verdict.as_str().to_string()),
        required_failed_steps: required_failures(&executions),
    };
    let markdown = render_triage_report(&TriageReport {
        source: "consumer_startup_triage",
        generated_at: &ctx.generated_at,
        repo: &args.repo,
        out_dir: &path_arg(&args.out_dir),
        summary: &summary,
        required_failed_steps: &facts.required_failed_steps,
        executions: &executions,
        steps: &steps,
    });
    let envelope = ReportEnvelope::from_summary(KIND, &ctx.generated_at, &summary, &facts)?;
    let out: PathBuf = ctx.resolve(&args.out_dir.join(TRIAGE_REPORT));
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!(
            "consumer startup triage report generated at {} (verdict={})",
            out.display(),
            summary.verdict
        ),
        summary.verdict.exit_code(),
    ))
}
