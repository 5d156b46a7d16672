//! Phase 5 execution closure: the adapter, consumer and phase 5 reports in one run.
use super::{BLOCKERS_REPORT, CLOSURE_RUN_REPORT, CLOSURE_STATUS_REPORT};
use crate::cli::{
    ClosureArgs, DEFAULT_BLOCK_EVIDENCE, DEFAULT_BLOCK_SUMMARY, DEFAULT_MINIMAL_EVIDENCE,
    DEFAULT_MINIMAL_SUMMARY,
};
use crate::consumer::triage::{
    AUTH_REPORT, TRIAGE_REPORT, UNBLOCK_REPORT, WORKFLOW_LINT_USAGE,
};
use crate::context::{RunContext, RunOutcome};
use crate::exec::{SelfInvoker, StepRunner};
use crate::markdown::MarkdownDoc;
use crate::plan::{
    dry_run_listing, execute_plan, render_command_plan, render_executions, required_failures,
    HaltPolicy, PlannedStep, StepExecution, StepStatus,
};
use crate::report::{write_report, ReportEnvelope};
use crate::util::yes_no;
use crate::verdict::{Assessment, Summary, Verdict};
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const KIND: &str = "phase5-execution-closure-run";
pub const MISSING_REPO: &str = "Missing required option: repo";
pub const ADAPTER_CONFLICT: &str =
    "Cannot require adapter readiness when adapter flow is disabled (--skip-adapter).";

const SESSION_STATUS_REPORT: &str = "adapter-session-status.md";
const REAL_SESSION_REPORT: &str = "adapter-real-session-report.md";
const ADAPTER_READINESS_REPORT: &str = "adapter-readiness.md";
const MOCK_AB_REPORT: &str = "mock-consumer-ab-report.md";

/// Closure options after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureOptions {
    pub repo: String,
    pub limit: u32,
    pub out_dir: PathBuf,
    pub workflow_lint: Option<(PathBuf, String)>,
    pub repo_path_provided: bool,
    pub actionlint_bin_provided: bool,
    pub include_adapter: bool,
    pub require_adapter_readiness: bool,
    pub include_auth_preflight: bool,
    pub mock_consumer: bool,
}

impl ClosureOptions {
    pub fn from_args(args: &ClosureArgs) -> Result<Self> {
        let repo = args
            .repo
            .as_deref()
            .map(str::trim)
            .filter(|repo| !repo.is_empty())
            .ok_or_else(|| anyhow!(MISSING_REPO))?;
        if args.skip_adapter && args.require_adapter_readiness {
            bail!(ADAPTER_CONFLICT);
        }
        let workflow_lint = if args.skip_workflow_lint || args.mock_consumer {
            None
        } else {
            match (&args.repo_path, &args.actionlint_bin) {
                (Some(repo_path), Some(bin)) => Some((repo_path.clone(), bin.clone())),
                _ => bail!(WORKFLOW_LINT_USAGE),
            }
        };
        Ok(Self {
            repo: repo.to_string(),
            limit: args.limit,
            out_dir: args.out_dir.clone(),
            workflow_lint,
            repo_path_provided: args.repo_path.is_some(),
            actionlint_bin_provided: args.actionlint_bin.is_some(),
            include_adapter: !args.skip_adapter,
            require_adapter_readiness: args.require_adapter_readiness,
            include_auth_preflight: !args.skip_auth_preflight && !args.mock_consumer,
            mock_consumer: args.mock_consumer,
        })
    }

    fn out(&self, leaf: &str) -> PathBuf {
        self.out_dir.join(leaf)
    }
}

fn arg(path: &Path) -> String {
    path.display().to_string()
}

fn step(id: &str, required: bool, args: Vec<String>, output: PathBuf) -> PlannedStep {
    PlannedStep::new(id, required, args, output)
}

fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

pub fn build_closure_plan(options: &ClosureOptions) -> Vec<PlannedStep> {
    let out = |leaf: &str| options.out(leaf);
    let mut steps = Vec::new();

    if options.include_adapter {
        let required = options.require_adapter_readiness;
        steps.push(step(
            "adapter-session-status",
            required,
            strings(["adapter-session-status", "--out", &arg(&out(SESSION_STATUS_REPORT))]),
            out(SESSION_STATUS_REPORT),
        ));
        steps.push(step(
            "adapter-real-session-report",
            required,
            strings([
                "adapter-real-session-report",
                "--status-report",
                &arg(&out(SESSION_STATUS_REPORT)),
                "--out",
                &arg(&out(REAL_SESSION_REPORT)),
            ]),
            out(REAL_SESSION_REPORT),
        ));
        steps.push(step(
            "adapter-readiness",
            required,
            strings([
                "adapter-readiness",
                "--adapter-report",
                &arg(&out(REAL_SESSION_REPORT)),
                "--out",
                &arg(&out(ADAPTER_READINESS_REPORT)),
            ]),
            out(ADAPTER_READINESS_REPORT),
        ));
    }

    if options.include_auth_preflight {
        steps.push(step(
            "consumer-auth-preflight",
            true,
            strings([
                "consumer-auth-check",
                "--repo",
                &options.repo,
                "--out",
                &arg(&out(AUTH_REPORT)),
            ]),
            out(AUTH_REPORT),
        ));
    }

    if options.mock_consumer {
        steps.push(step(
            "mock-consumer-ab-report",
            true,
            strings([
                "mock-consumer-ab-report",
                "--repo",
                &options.repo,
                "--out",
                &arg(&out(MOCK_AB_REPORT)),
                "--block-summary",
                DEFAULT_BLOCK_SUMMARY,
                "--minimal-summary",
                DEFAULT_MINIMAL_SUMMARY,
                "--block-evidence",
                DEFAULT_BLOCK_EVIDENCE,
                "--minimal-evidence",
                DEFAULT_MINIMAL_EVIDENCE,
            ]),
            out(MOCK_AB_REPORT),
        ));
        steps.push(step(
            "consumer-startup-triage",
            true,
            strings([
                "mock-consumer-startup-triage",
                "--repo",
                &options.repo,
                "--out-dir",
                &arg(&options.out_dir),
            ]),
            out(TRIAGE_REPORT),
        ));
    } else {
        let mut args = strings([
            "consumer-startup-triage",
            "--repo",
            &options.repo,
            "--out-dir",
            &arg(&options.out_dir),
            "--limit",
            &options.limit.to_string(),
        ]);
        match &options.workflow_lint {
            Some((repo_path, bin)) => {
                args.extend(strings(["--repo-path", &arg(repo_path), "--actionlint-bin", bin]));
            }
            None => args.push("--skip-workflow-lint".to_string()),
        }
        if options.include_auth_preflight {
            args.push("--skip-auth-check".to_string());
        }
        steps.push(step("consumer-startup-triage", true, args, out(TRIAGE_REPORT)));
    }

    let mut blockers_args = strings([
        "phase5-blockers-readiness",
        "--consumer-triage-report",
        &arg(&out(TRIAGE_REPORT)),
        "--out",
        &arg(&out(BLOCKERS_REPORT)),
    ]);
    if options.require_adapter_readiness {
        blockers_args.extend(strings([
            "--require-adapter-report",
            "--adapter-report",
            &arg(&out(REAL_SESSION_REPORT)),
        ]));
    }
    steps.push(step("phase5-blockers-readiness", true, blockers_args, out(BLOCKERS_REPORT)));

    let mut status_args = strings([
        "phase5-execution-closure-status",
        "--phase5-blockers-report",
        &arg(&out(BLOCKERS_REPORT)),
        "--consumer-unblock-report",
        &arg(&out(UNBLOCK_REPORT)),
        "--out",
        &arg(&out(CLOSURE_STATUS_REPORT)),
    ]);
    if options.include_adapter || options.require_adapter_readiness {
        status_args.extend(strings([
            "--adapter-readiness-report",
            &arg(&out(ADAPTER_READINESS_REPORT)),
        ]));
        if options.require_adapter_readiness {
            status_args.push("--require-adapter-readiness".to_string());
        }
    }
    steps.push(step(
        "phase5-execution-closure-status",
        true,
        status_args,
        out(CLOSURE_STATUS_REPORT),
    ));
    steps
}

pub fn summarize_closure_run(executions: &[StepExecution]) -> Summary {
    let mut assessment = Assessment::new();
    for id in required_failures(executions) {
        assessment.block(format!("Required step failed: {id}"));
    }
    let skipped = executions
        .iter()
        .filter(|exec| exec.status == StepStatus::Skipped)
        .count();
    if skipped > 0 {
        assessment.warn(format!("{skipped} step(s) skipped after a required failure"));
    }
    assessment.resolve(Verdict::Ready, Verdict::MissingInputs)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedClosureRun {
    pub verdict: Option<String>,
    pub required_failed_steps: Vec<String>,
}

pub fn parse_closure_run(markdown: &str) -> ParsedClosureRun {
    let parsed = crate::consumer::triage::parse_triage_report(markdown);
    ParsedClosureRun {
        verdict: parsed.verdict,
        required_failed_steps: parsed.required_failed_steps,
    }
}

pub fn render_closure_run(
    generated_at: &str,
    options: &ClosureOptions,
    summary: &Summary,
    executions: &[StepExecution],
    steps: &[PlannedStep],
) -> String {
    let failed = required_failures(executions);
    let mut doc = MarkdownDoc::new("Phase 5 Execution Closure Run Report");
    doc.field("generated_at", generated_at);
    doc.code_field("target_repo", &options.repo);
    doc.code_field("out_dir", options.out_dir.display());
    doc.field("include_adapter", yes_no(options.include_adapter));
    doc.field("require_adapter_readiness", yes_no(options.require_adapter_readiness));
    doc.field("run_workflow_lint", yes_no(options.workflow_lint.is_some()));
    doc.field("repo_path_provided", yes_no(options.repo_path_provided));
    doc.field("actionlint_bin_provided", yes_no(options.actionlint_bin_provided));
    doc.field("mock_consumer", yes_no(options.mock_consumer));
    doc.field("verdict", summary.verdict);
    if failed.is_empty() {
        doc.field("required_failed_steps", "none");
    } else {
        doc.field("required_failed_steps", failed.join(", "));
    }

    doc.section("Executions");
    render_executions(&mut doc, executions);
    doc.section("Command Plan");
    render_command_plan(&mut doc, steps);
    doc.section("Warnings");
    doc.bullets_or_none(&summary.warnings);

    doc.section("Next Actions");
    if summary.verdict == Verdict::Ready {
        doc.bullet(format!(
            "Review `{}` and generate the external handoff with `vtriage phase5-external-handoff`.",
            options.out(CLOSURE_STATUS_REPORT).display()
        ));
    } else {
        for id in &failed {
            doc.bullet(format!("Resolve failed required step `{id}` and rerun this command."));
        }
    }
    doc.finish()
}

pub fn run(ctx: &RunContext, args: &ClosureArgs) -> Result<RunOutcome> {
    run_with(ctx, args, &mut SelfInvoker::new(ctx))
}

pub fn run_with(ctx: &RunContext, args: &ClosureArgs, runner: &mut dyn StepRunner) -> Result<RunOutcome> {
    let options = ClosureOptions::from_args(args)?;
    let steps = build_closure_plan(&options);
    if args.dry_run {
        return Ok(RunOutcome::new(
            dry_run_listing("phase5 execution closure dry-run plan:", &steps),
            0,
        ));
    }

    let executions = execute_plan(&steps, runner, HaltPolicy::StopOnRequiredFailure)?;
    let summary = summarize_closure_run(&executions);
    let markdown = render_closure_run(&ctx.generated_at, &options, &summary, &executions, &steps);
    let facts = ParsedClosureRun {
        verdict: Some(summary.verdict.as_str().to_string()),
        required_failed_steps: required_failures(&executions),
    };
    let envelope = ReportEnvelope::from_summary(KIND, &ctx.generated_at, &summary, &facts)?;
    let out = ctx.resolve(&options.out(CLOSURE_RUN_REPORT));
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!(
            "phase5 execution closure run report generated at {} (verdict={})",
            out.display(),
            summary.verdict
        ),
        summary.verdict.exit_code(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{DEFAULT_LIMIT, DEFAULT_PHASE5_DIR};
    use crate::config::default_config;
    use crate::plan::RecordingRunner;
    use crate::report::LoadedReport;
    use tempfile::TempDir;

    fn args() -> ClosureArgs {
        ClosureArgs {
            repo: Some("acme/app".to_string()),
            limit: DEFAULT_LIMIT,
            out_dir: PathBuf::from(DEFAULT_PHASE5_DIR),
            repo_path: None,
            actionlint_bin: None,
            skip_workflow_lint: true,
            skip_adapter: false,
            require_adapter_readiness: false,
            skip_auth_preflight: false,
            mock_consumer: false,
            dry_run: false,
        }
    }

    fn ids(steps: &[PlannedStep]) -> Vec<&str> {
        steps.iter().map(|step| step.id.as_str()).collect()
    }

    #[test]
    fn validation_errors() {
        let mut missing_repo = args();
        missing_repo.repo = Some("  ".to_string());
        let err = ClosureOptions::from_args(&missing_repo).expect_err("repo");
        assert_eq!(err.to_string(), MISSING_REPO);

        let mut conflict = args();
        conflict.skip_adapter = true;
        conflict.require_adapter_readiness = true;
        let err = ClosureOptions::from_args(&conflict).expect_err("conflict");
        assert_eq!(err.to_string(), ADAPTER_CONFLICT);

        let mut lint = args();
        lint.skip_workflow_lint = false;
        lint.repo_path = Some(PathBuf::from("../app"));
        let err = ClosureOptions::from_args(&lint).expect_err("lint");
        assert_eq!(err.to_string(), WORKFLOW_LINT_USAGE);
    }

    #[test]
    fn live_plan_order_and_flags() {
        let options = ClosureOptions::from_args(&args()).expect("options");
        let steps = build_closure_plan(&options);
        assert_eq!(
            ids(&steps),
            vec![
                "adapter-session-status",
                "adapter-real-session-report",
                "adapter-readiness",
                "consumer-auth-preflight",
                "consumer-startup-triage",
                "phase5-blockers-readiness",
                "phase5-execution-closure-status",
            ]
        );
        assert!(!steps[0].required, "adapter steps are optional unless readiness is required");
        let triage = &steps[4].args;
        assert!(triage.contains(&"--skip-workflow-lint".to_string()));
        assert!(triage.contains(&"--skip-auth-check".to_string()));
        assert!(steps[6].args.contains(&"--adapter-readiness-report".to_string()));
        assert!(!steps[6].args.contains(&"--require-adapter-readiness".to_string()));
    }

    #[test]
    fn mock_plan_replaces_consumer_steps() {
        let mut args = args();
        args.mock_consumer = true;
        args.skip_adapter = true;
        let options = ClosureOptions::from_args(&args).expect("options");
        let steps = build_closure_plan(&options);
        assert_eq!(
            ids(&steps),
            vec![
                "mock-consumer-ab-report",
                "consumer-startup-triage",
                "phase5-blockers-readiness",
                "phase5-execution-closure-status",
            ]
        );
        assert_eq!(steps[1].args[0], "mock-consumer-startup-triage");
        assert!(!steps[3].args.contains(&"--adapter-readiness-report".to_string()));
    }

    #[test]
    fn required_adapter_flags_propagate() {
        let mut args = args();
        args.require_adapter_readiness = true;
        let steps = build_closure_plan(&ClosureOptions::from_args(&args).expect("options"));
        assert!(steps[0].required);
        assert!(steps[5].args.contains(&"--require-adapter-report".to_string()));
        assert!(steps[6].args.contains(&"--require-adapter-readiness".to_string()));
    }

    #[test]
    fn halts_after_first_required_failure() {
        let dir = TempDir::new().expect("tempdir");
        let ctx = RunContext::new(dir.path().to_path_buf(), default_config(), "2026-01-01T00:00:00.000Z");
        let mut runner = RecordingRunner::new()
            .failing("adapter-session-status", 2)
            .failing("consumer-startup-triage", 1);

        let outcome = run_with(&ctx, &args(), &mut runner).expect("run");
        assert_eq!(outcome.exit_code, 1);
        assert_eq!(
            runner.subcommands(),
            vec![
                "adapter-session-status",
                "adapter-real-session-report",
                "adapter-readiness",
                "consumer-auth-check",
                "consumer-startup-triage",
            ]
        );

        let report = LoadedReport::load(
            &dir.path().join(DEFAULT_PHASE5_DIR).join(CLOSURE_RUN_REPORT),
        )
        .expect("load");
        assert_eq!(report.verdict().as_deref(), Some("BLOCKED"));
        assert!(report.text().contains("| phase5-blockers-readiness | yes | - | skipped |"));
        assert!(report
            .text()
            .contains("Resolve failed required step `consumer-startup-triage` and rerun this command."));
        let parsed = parse_closure_run(report.text());
        assert_eq!(parsed.required_failed_steps, vec!["consumer-startup-triage"]);
    }

    #[test]
    fn dry_run_lists_without_running() {
        let dir = TempDir::new().expect("tempdir");
        let ctx = RunContext::new(dir.path().to_path_buf(), default_config(), "2026-01-01T00:00:00.000Z");
        let mut args = args();
        args.dry_run = true;
        let mut runner = RecordingRunner::new();
        let outcome = run_with(&ctx, &args, &mut runner).expect("run");
        assert_eq!(outcome.exit_code, 0);
        assert!(runner.calls.is_empty());
        assert!(outcome
            .message
            .contains("- [consumer-auth-preflight] .audit-reports/phase5/consumer-ci-auth-check.md (required): vtriage consumer-auth-check"));
    }
}
