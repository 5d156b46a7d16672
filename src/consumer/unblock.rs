//! Decides whether consumer startup failures are cleared enough to re-test.
use super::auth::{self, ParsedAuthReport};
use super::support_bundle::{self, ParsedSupportBundle};
use super::workflow_lint::{self, ParsedWorkflowLint};
use crate::cli::{ConsumerUnblockArgs, DEFAULT_REPO_PLACEHOLDER};
use crate::context::{RunContext, RunOutcome};
use crate::markdown::MarkdownDoc;
use crate::report::{write_report, LoadedReport, ReportEnvelope};
use crate::util::{labeled_count, section_body};
use crate::verdict::{or_unknown, Assessment, Summary, Verdict};
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const KIND: &str = "consumer-startup-unblock-status";
pub const MISSING_SUPPORT_BUNDLE: &str = "Missing support bundle report";
pub const MISSING_AUTH_REPORT: &str = "Missing auth report";

#[derive(Debug, Clone, Copy, Default)]
pub struct UnblockInputs<'a> {
    pub support: Option<&'a ParsedSupportBundle>,
    pub auth: Option<&'a ParsedAuthReport>,
    pub workflow_lint: Option<&'a ParsedWorkflowLint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnblockSummary {
    pub summary: Summary,
    pub startup_failure_runs: Option<u32>,
    pub startup_stalled_runs: Option<u32>,
    pub auth_verdict: Option<String>,
    pub missing_user_scope: bool,
    pub lint_findings_count: usize,
}

pub fn summarize_unblock(inputs: UnblockInputs<'_>) -> UnblockSummary {
    let mut assessment = Assessment::new();
    assessment.require(inputs.support.is_some(), MISSING_SUPPORT_BUNDLE);
    assessment.require(inputs.auth.is_some(), MISSING_AUTH_REPORT);

    let startup_failure_runs = inputs.support.and_then(|support| support.startup_failure_runs);
    let startup_stalled_runs = inputs.support.and_then(|support| support.startup_stalled_runs);
    let auth_verdict = inputs.auth.and_then(|auth| auth.verdict.clone());
    let missing_user_scope = inputs.auth.is_some_and(ParsedAuthReport::missing_user_scope);
    let lint_findings_count = inputs.workflow_lint.map_or(0, |lint| lint.findings_count);

    if let (Some(support), Some(auth)) = (inputs.support, inputs.auth) {
        let failures = startup_failure_runs.unwrap_or(0);
        let stalled = startup_stalled_runs.unwrap_or(0);
        assessment.block_if(failures > 0, format!("Startup failures still present ({failures})"));
        assessment.block_if(stalled > 0, format!("Startup runs remain queued/stalled ({stalled})"));
        if auth.verdict.as_deref() != Some(Verdict::Ready.as_str()) {
            assessment.block(format!(
                "Consumer CI auth verdict is {}",
                or_unknown(auth.verdict.as_deref())
            ));
        }
        assessment.block_if(missing_user_scope, "GitHub token is missing `user` scope");
        if let Some(err) = &auth.billing_error {
            assessment.block(format!("Billing probe failed: {err}"));
        }
        assessment.block_if(
            lint_findings_count > 0,
            format!("Workflow lint findings present ({lint_findings_count})"),
        );
        assessment.block_if(
            !support.run_urls.is_empty()
                && support.jobs_count == Some(0)
                && support.artifacts_count == Some(0),
            "Startup runs are stuck before job graph creation (jobs=0, artifacts=0)",
        );
    }

    UnblockSummary {
        summary: assessment.resolve(Verdict::ReadyForRetest, Verdict::MissingInputs),
        startup_failure_runs,
        startup_stalled_runs,
        auth_verdict,
        missing_user_scope,
        lint_findings_count,
    }
}

fn count_or_unknown(value: Option<u32>) -> String {
    value.map_or_else(|| "unknown".to_string(), |count| count.to_string())
}

pub struct UnblockReport<'a> {
    pub generated_at: &'a str,
    pub repo: &'a str,
    pub support_bundle_path: &'a str,
    pub auth_report_path: &'a str,
    pub workflow_lint_report_path: &'a str,
    pub has_support_bundle: bool,
    pub has_auth_report: bool,
    pub has_workflow_lint_report: bool,
    pub status: &'a UnblockSummary,
}

pub fn render_unblock_status(report: &UnblockReport<'_>) -> String {
    let status = report.status;
    let summary = &status.summary;
    let mut doc = MarkdownDoc::new("Consumer Startup Failure Unblock Status");
    doc.field("generated_at", report.generated_at);
    doc.code_field("target_repo", report.repo);
    doc.field("verdict", summary.verdict);
    doc.field("startup_failure_runs", count_or_unknown(status.startup_failure_runs));
    doc.field("startup_stalled_runs", count_or_unknown(status.startup_stalled_runs));
    doc.field("auth_verdict", or_unknown(status.auth_verdict.as_deref()));
    doc.field("missing_user_scope", if status.missing_user_scope { "yes" } else { "no" });
    doc.field("workflow_lint_findings", status.lint_findings_count);

    doc.section("Inputs");
    doc.input("support_bundle", report.support_bundle_path, report.has_support_bundle);
    doc.input("auth_report", report.auth_report_path, report.has_auth_report);
    doc.line(format!(
        "- workflow_lint_report: `{}` ({}, optional)",
        report.workflow_lint_report_path,
        crate::util::found_missing(report.has_workflow_lint_report)
    ));

    doc.section("Missing Inputs");
    doc.bullets_or_none(&summary.missing_inputs);
    doc.section("Blockers");
    doc.bullets_or_none(&summary.blockers);

    doc.section("Next Actions");
    if summary.verdict == Verdict::ReadyForRetest {
        doc.bullet("Re-run the consumer workflows and confirm jobs are created.");
        doc.bullet("Regenerate the support bundle after the re-run to confirm zero startup failures.");
    } else if summary.verdict == Verdict::MissingInputs {
        doc.bullet(format!(
            "Run `vtriage consumer-startup-triage --repo {}` to regenerate the input reports.",
            report.repo
        ));
    } else {
        if status.missing_user_scope {
            doc.bullet("Refresh GitHub CLI auth: `gh auth refresh -h github.com -s user`");
        }
        if status.lint_findings_count > 0 {
            doc.bullet("Fix the workflow lint findings and rerun `vtriage consumer-workflow-lint`.");
        }
        doc.bullet(format!(
            "Escalate with the support ticket draft: `vtriage consumer-support-ticket-draft --repo {}`",
            report.repo
        ));
    }
    doc.finish()
}

/// Facts shared by the live and mock unblock reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedUnblockStatus {
    pub verdict: Option<String>,
    pub startup_failure_runs: Option<u32>,
    pub startup_stalled_runs: Option<u32>,
    pub blockers: Vec<String>,
}

pub fn parse_unblock_status(markdown: &str) -> ParsedUnblockStatus {
    let blockers = section_body(markdown, "## Blockers")
        .map(|body| {
            body.lines()
                .filter_map(|line| line.trim().strip_prefix("- "))
                .filter(|item| *item != "none")
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    ParsedUnblockStatus {
        verdict: crate::report::parse_verdict_from_markdown(markdown),
        startup_failure_runs: labeled_count(markdown, "startup_failure_runs"),
        startup_stalled_runs: labeled_count(markdown, "startup_stalled_runs"),
        blockers,
    }
}

pub fn run(ctx: &RunContext, args: &ConsumerUnblockArgs) -> Result<RunOutcome> {
    let support_report = LoadedReport::load(&ctx.resolve(&args.support_bundle))?;
    let auth_report = LoadedReport::load(&ctx.resolve(&args.auth_report))?;
    let lint_report = LoadedReport::load(&ctx.resolve(&args.workflow_lint_report))?;
    let support =
        support_report.parse_with(support_bundle::KIND, support_bundle::parse_support_bundle);
    let auth = auth_report.parse_with(auth::KIND, auth::parse_auth_report);
    let lint = lint_report.parse_with(workflow_lint::KIND, workflow_lint::parse_workflow_lint_report);
    if lint.is_none() {
        tracing::debug!(path = %lint_report.path.display(), "workflow lint report absent; skipping lint check");
    }

    let status = summarize_unblock(UnblockInputs {
        support: support.as_ref(),
        auth: auth.as_ref(),
        workflow_lint: lint.as_ref(),
    });
    let repo = args
        .repo
        .clone()
        .or_else(|| support.as_ref().and_then(|bundle| bundle.target_repo.clone()))
        .unwrap_or_else(|| DEFAULT_REPO_PLACEHOLDER.to_string());
    let markdown = render_unblock_status(&UnblockReport {
        generated_at: &ctx.generated_at,
        repo: &repo,
        support_bundle_path: &args.support_bundle.display().to_string(),
        auth_report_path: &args.auth_report.display().to_string(),
        workflow_lint_report_path: &args.workflow_lint_report.display().to_string(),
        has_support_bundle: support_report.exists(),
        has_auth_report: auth_report.exists(),
        has_workflow_lint_report: lint_report.exists(),
        status: &status,
    });
    let facts = ParsedUnblockStatus {
        verdict: Some(status.summary.verdict.as_str().to_string()),
        startup_failure_runs: status.startup_failure_runs,
        startup_stalled_runs: status.startup_stalled_runs,
        blockers: status.summary.blockers.clone(),
    };
    let envelope = ReportEnvelope::from_summary(KIND, &ctx.generated_at, &status.summary, &facts)?;
    let out = ctx.resolve(&args.out);
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!(
            "consumer startup unblock status generated at {} (verdict={})",
            out.display(),
            status.summary.verdict
        ),
        status.summary.verdict.exit_code(),
    ))
}

#[cfg(test)]
#[path = "unblock_tests.rs"]
mod tests;
