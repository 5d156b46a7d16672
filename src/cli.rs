//! CLI argument parsing for the validation report pipelines.
//!
//! Every report script is a subcommand with its own flag schema. Parse
//! failures are normalized to the short messages operators already grep for
//! (`Unknown argument: --x`, `Missing value for --out`) and reported as
//! `<script> failed: <message>` by `main`.
use crate::config::HardModeProfile;
use crate::mock::SmokeMode;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

pub const DEFAULT_LIMIT: u32 = 20;
pub const DEFAULT_TAIL_LINES: u32 = 120;
pub const DEFAULT_REPO_PLACEHOLDER: &str = "owner/repo";

pub const DEFAULT_ADAPTER_SESSION_STATUS: &str = ".audit-reports/adapter/adapter-session-status.md";
pub const DEFAULT_ADAPTER_REAL_SESSION: &str =
    ".audit-reports/adapter/adapter-real-session-report.md";
pub const DEFAULT_ADAPTER_READINESS: &str = ".audit-reports/adapter/adapter-readiness.md";

pub const DEFAULT_CONSUMER_TRIAGE_DIR: &str = ".audit-reports/consumer-triage";
pub const DEFAULT_CONSUMER_AUTH: &str = ".audit-reports/consumer-triage/consumer-ci-auth-check.md";
pub const DEFAULT_CONSUMER_ARTIFACTS: &str =
    ".audit-reports/consumer-triage/consumer-ci-artifacts-report.md";
pub const DEFAULT_WORKFLOW_LINT: &str =
    ".audit-reports/consumer-triage/consumer-workflow-lint-report.md";
pub const DEFAULT_SUPPORT_BUNDLE: &str =
    ".audit-reports/consumer-triage/consumer-startup-failure-support-bundle.md";
pub const DEFAULT_SUPPORT_TICKET: &str =
    ".audit-reports/consumer-triage/consumer-support-ticket-draft.md";
pub const DEFAULT_UNBLOCK_STATUS: &str =
    ".audit-reports/consumer-triage/consumer-startup-unblock-status.md";
pub const DEFAULT_TRIAGE_REPORT: &str =
    ".audit-reports/consumer-triage/consumer-startup-triage-report.md";

pub const DEFAULT_PACKAGE_SMOKE_DIR: &str = ".audit-reports/package-smoke";
pub const DEFAULT_BLOCK_SUMMARY: &str = ".audit-reports/package-smoke/block/summary.md";
pub const DEFAULT_MINIMAL_SUMMARY: &str = ".audit-reports/package-smoke/minimal/summary.md";
pub const DEFAULT_BLOCK_EVIDENCE: &str = ".audit-reports/package-smoke/block/ci.ai_evidence.json";
pub const DEFAULT_MINIMAL_EVIDENCE: &str =
    ".audit-reports/package-smoke/minimal/ci.ai_evidence.json";

pub const DEFAULT_PHASE5_DIR: &str = ".audit-reports/phase5";
pub const DEFAULT_MOCK_AB_REPORT: &str = ".audit-reports/phase5/mock-consumer-ab-report.md";
pub const DEFAULT_PHASE5_BLOCKERS: &str = ".audit-reports/phase5/phase5-blockers-readiness.md";
pub const DEFAULT_PHASE5_UNBLOCK_STATUS: &str =
    ".audit-reports/phase5/consumer-startup-unblock-status.md";
pub const DEFAULT_CLOSURE_STATUS: &str = ".audit-reports/phase5/phase5-execution-closure-status.md";
pub const DEFAULT_CLOSURE_RUN_REPORT: &str =
    ".audit-reports/phase5/phase5-execution-closure-run-report.md";
pub const DEFAULT_HANDOFF: &str = ".audit-reports/phase5/phase5-external-handoff.md";

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "vtriage",
    version,
    about = "Validation report pipelines for adapter, consumer CI and Phase 5 closure triage",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Tool config (default: .pumuki/validation-triage.json when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "adapter-session-status")]
    AdapterSessionStatus(AdapterSessionStatusArgs),
    #[command(name = "adapter-real-session-report")]
    AdapterRealSessionReport(AdapterRealSessionArgs),
    #[command(name = "adapter-readiness")]
    AdapterReadiness(AdapterReadinessArgs),
    #[command(name = "consumer-auth-check")]
    ConsumerAuthCheck(ConsumerAuthCheckArgs),
    #[command(name = "consumer-ci-artifacts")]
    ConsumerCiArtifacts(ConsumerCiArtifactsArgs),
    #[command(name = "consumer-workflow-lint")]
    ConsumerWorkflowLint(ConsumerWorkflowLintArgs),
    #[command(name = "consumer-support-bundle")]
    ConsumerSupportBundle(ConsumerSupportBundleArgs),
    #[command(name = "consumer-support-ticket-draft")]
    ConsumerSupportTicketDraft(ConsumerSupportTicketArgs),
    #[command(name = "consumer-startup-unblock-status")]
    ConsumerStartupUnblockStatus(ConsumerUnblockArgs),
    #[command(name = "consumer-startup-triage")]
    ConsumerStartupTriage(ConsumerTriageArgs),
    #[command(name = "package-smoke")]
    PackageSmoke(PackageSmokeArgs),
    #[command(name = "mock-consumer-ab-report")]
    MockConsumerAbReport(MockAbArgs),
    #[command(name = "mock-consumer-startup-triage")]
    MockConsumerStartupTriage(MockTriageArgs),
    #[command(name = "phase5-blockers-readiness")]
    Phase5BlockersReadiness(Phase5BlockersArgs),
    #[command(name = "phase5-execution-closure-status")]
    Phase5ExecutionClosureStatus(ClosureStatusArgs),
    #[command(name = "phase5-execution-closure")]
    Phase5ExecutionClosure(ClosureArgs),
    #[command(name = "phase5-external-handoff")]
    Phase5ExternalHandoff(HandoffArgs),
    #[command(name = "hard-mode")]
    HardMode(HardModeArgs),
    #[command(name = "clean-artifacts")]
    CleanArtifacts(CleanArgs),
    #[command(name = "menu")]
    Menu(MenuArgs),
}

impl Command {
    /// Script name used in `<script> failed:` lines.
    pub fn name(&self) -> &'static str {
        match self {
            Command::AdapterSessionStatus(_) => "adapter-session-status",
            Command::AdapterRealSessionReport(_) => "adapter-real-session-report",
            Command::AdapterReadiness(_) => "adapter-readiness",
            Command::ConsumerAuthCheck(_) => "consumer-auth-check",
            Command::ConsumerCiArtifacts(_) => "consumer-ci-artifacts",
            Command::ConsumerWorkflowLint(_) => "consumer-workflow-lint",
            Command::ConsumerSupportBundle(_) => "consumer-support-bundle",
            Command::ConsumerSupportTicketDraft(_) => "consumer-support-ticket-draft",
            Command::ConsumerStartupUnblockStatus(_) => "consumer-startup-unblock-status",
            Command::ConsumerStartupTriage(_) => "consumer-startup-triage",
            Command::PackageSmoke(_) => "package-smoke",
            Command::MockConsumerAbReport(_) => "mock-consumer-ab-report",
            Command::MockConsumerStartupTriage(_) => "mock-consumer-startup-triage",
            Command::Phase5BlockersReadiness(_) => "phase5-blockers-readiness",
            Command::Phase5ExecutionClosureStatus(_) => "phase5-execution-closure-status",
            Command::Phase5ExecutionClosure(_) => "phase5-execution-closure",
            Command::Phase5ExternalHandoff(_) => "phase5-external-handoff",
            Command::HardMode(_) => "hard-mode",
            Command::CleanArtifacts(_) => "clean-artifacts",
            Command::Menu(_) => "menu",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Run the adapter hook session checks and summarize them")]
pub struct AdapterSessionStatusArgs {
    /// Report output path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_ADAPTER_SESSION_STATUS)]
    pub out: PathBuf,

    /// Lines kept from each log tail
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TAIL_LINES,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub tail_lines: u32,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Write the adapter real-session validation report")]
pub struct AdapterRealSessionArgs {
    /// Report output path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_ADAPTER_REAL_SESSION)]
    pub out: PathBuf,

    /// Adapter session status report to read
    #[arg(long, value_name = "FILE", default_value = DEFAULT_ADAPTER_SESSION_STATUS)]
    pub status_report: PathBuf,

    /// Operator recorded in the metadata section
    #[arg(long, value_name = "NAME", default_value = "unknown")]
    pub operator: String,

    /// Adapter version recorded in the metadata section
    #[arg(long, value_name = "VERSION", default_value = "unknown")]
    pub adapter_version: String,

    /// Lines kept from each log tail
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TAIL_LINES,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub tail_lines: u32,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Summarize adapter readiness from the real-session report")]
pub struct AdapterReadinessArgs {
    /// Adapter real-session report to read
    #[arg(long, value_name = "FILE", default_value = DEFAULT_ADAPTER_REAL_SESSION)]
    pub adapter_report: PathBuf,

    /// Report output path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_ADAPTER_READINESS)]
    pub out: PathBuf,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Check GitHub CLI auth scopes and API probes for a consumer repo")]
pub struct ConsumerAuthCheckArgs {
    /// Consumer repository
    #[arg(long, value_name = "owner/repo")]
    pub repo: String,

    /// Report output path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONSUMER_AUTH)]
    pub out: PathBuf,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Collect recent consumer workflow runs and their artifacts")]
pub struct ConsumerCiArtifactsArgs {
    /// Consumer repository
    #[arg(long, value_name = "owner/repo")]
    pub repo: String,

    /// Number of recent runs to inspect
    #[arg(long, value_name = "N", default_value_t = DEFAULT_LIMIT,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: u32,

    /// Report output path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONSUMER_ARTIFACTS)]
    pub out: PathBuf,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Run actionlint against a consumer checkout")]
pub struct ConsumerWorkflowLintArgs {
    /// Consumer checkout to lint
    #[arg(long, value_name = "DIR")]
    pub repo_path: PathBuf,

    /// actionlint executable
    #[arg(long, value_name = "BIN", default_value = "actionlint")]
    pub actionlint_bin: String,

    /// Report output path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_WORKFLOW_LINT)]
    pub out: PathBuf,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Gather a startup_failure support bundle for a consumer repo")]
pub struct ConsumerSupportBundleArgs {
    /// Consumer repository
    #[arg(long, value_name = "owner/repo")]
    pub repo: String,

    /// Number of recent runs to inspect
    #[arg(long, value_name = "N", default_value_t = DEFAULT_LIMIT,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: u32,

    /// Report output path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_SUPPORT_BUNDLE)]
    pub out: PathBuf,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Draft a GitHub support ticket from the support bundle")]
pub struct ConsumerSupportTicketArgs {
    /// Consumer repository (default: the bundle's target_repo)
    #[arg(long, value_name = "owner/repo")]
    pub repo: Option<String>,

    /// Support bundle report to read
    #[arg(long, value_name = "FILE", default_value = DEFAULT_SUPPORT_BUNDLE)]
    pub support_bundle: PathBuf,

    /// Auth check report to read
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONSUMER_AUTH)]
    pub auth_report: PathBuf,

    /// Report output path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_SUPPORT_TICKET)]
    pub out: PathBuf,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Decide whether consumer startup failures are unblocked")]
pub struct ConsumerUnblockArgs {
    /// Consumer repository (default: the bundle's target_repo)
    #[arg(long, value_name = "owner/repo")]
    pub repo: Option<String>,

    /// Support bundle report to read
    #[arg(long, value_name = "FILE", default_value = DEFAULT_SUPPORT_BUNDLE)]
    pub support_bundle: PathBuf,

    /// Auth check report to read
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONSUMER_AUTH)]
    pub auth_report: PathBuf,

    /// Workflow lint report to read (optional input)
    #[arg(long, value_name = "FILE", default_value = DEFAULT_WORKFLOW_LINT)]
    pub workflow_lint_report: PathBuf,

    /// Report output path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_UNBLOCK_STATUS)]
    pub out: PathBuf,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Run every consumer startup triage step and summarize them")]
pub struct ConsumerTriageArgs {
    /// Consumer repository
    #[arg(long, value_name = "owner/repo")]
    pub repo: String,

    /// Number of recent runs to inspect
    #[arg(long, value_name = "N", default_value_t = DEFAULT_LIMIT,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: u32,

    /// Directory receiving every triage report
    #[arg(long, value_name = "DIR", default_value = DEFAULT_CONSUMER_TRIAGE_DIR)]
    pub out_dir: PathBuf,

    /// Consumer checkout for workflow lint
    #[arg(long, value_name = "DIR")]
    pub repo_path: Option<PathBuf>,

    /// actionlint executable for workflow lint
    #[arg(long, value_name = "BIN")]
    pub actionlint_bin: Option<String>,

    /// Skip the workflow lint step
    #[arg(long)]
    pub skip_workflow_lint: bool,

    /// Skip the auth check step (already run by a caller)
    #[arg(long)]
    pub skip_auth_check: bool,

    /// Print the command plan without running it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Install the packed package into a temp consumer and run the stage hooks")]
pub struct PackageSmokeArgs {
    /// Smoke scenario to run
    #[arg(long, value_enum)]
    pub mode: SmokeMode,

    /// Report root; results land in <DIR>/<mode>/
    #[arg(long, value_name = "DIR", default_value = DEFAULT_PACKAGE_SMOKE_DIR)]
    pub out_dir: PathBuf,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Compare block/minimal package smoke results for the mock consumer")]
pub struct MockAbArgs {
    /// Repository label recorded in the report
    #[arg(long, value_name = "owner/repo", default_value = DEFAULT_REPO_PLACEHOLDER)]
    pub repo: String,

    /// Report output path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_MOCK_AB_REPORT)]
    pub out: PathBuf,

    /// Block-mode smoke summary
    #[arg(long, value_name = "FILE", default_value = DEFAULT_BLOCK_SUMMARY)]
    pub block_summary: PathBuf,

    /// Minimal-mode smoke summary
    #[arg(long, value_name = "FILE", default_value = DEFAULT_MINIMAL_SUMMARY)]
    pub minimal_summary: PathBuf,

    /// Block-mode evidence JSON
    #[arg(long, value_name = "FILE", default_value = DEFAULT_BLOCK_EVIDENCE)]
    pub block_evidence: PathBuf,

    /// Minimal-mode evidence JSON
    #[arg(long, value_name = "FILE", default_value = DEFAULT_MINIMAL_EVIDENCE)]
    pub minimal_evidence: PathBuf,

    /// Print the resolved inputs without writing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Write triage and unblock reports from mock consumer smoke results")]
pub struct MockTriageArgs {
    /// Repository label recorded in the reports
    #[arg(long, value_name = "owner/repo", default_value = DEFAULT_REPO_PLACEHOLDER)]
    pub repo: String,

    /// Directory receiving the triage and unblock reports
    #[arg(long, value_name = "DIR", default_value = DEFAULT_PHASE5_DIR)]
    pub out_dir: PathBuf,

    /// Block-mode smoke summary
    #[arg(long, value_name = "FILE", default_value = DEFAULT_BLOCK_SUMMARY)]
    pub block_summary: PathBuf,

    /// Minimal-mode smoke summary
    #[arg(long, value_name = "FILE", default_value = DEFAULT_MINIMAL_SUMMARY)]
    pub minimal_summary: PathBuf,

    /// Print the resolved inputs without writing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Summarize Phase 5 blockers from adapter and consumer triage reports")]
pub struct Phase5BlockersArgs {
    /// Adapter real-session report
    #[arg(long, value_name = "FILE", default_value = DEFAULT_ADAPTER_REAL_SESSION)]
    pub adapter_report: PathBuf,

    /// Consumer startup triage report
    #[arg(long, value_name = "FILE", default_value = DEFAULT_TRIAGE_REPORT)]
    pub consumer_triage_report: PathBuf,

    /// Treat a missing adapter report as a missing input
    #[arg(long)]
    pub require_adapter_report: bool,

    /// Report output path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_PHASE5_BLOCKERS)]
    pub out: PathBuf,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Summarize Phase 5 execution closure status")]
pub struct ClosureStatusArgs {
    /// Phase 5 blockers readiness report
    #[arg(long, value_name = "FILE", default_value = DEFAULT_PHASE5_BLOCKERS)]
    pub phase5_blockers_report: PathBuf,

    /// Consumer startup unblock status report
    #[arg(long, value_name = "FILE", default_value = DEFAULT_UNBLOCK_STATUS)]
    pub consumer_unblock_report: PathBuf,

    /// Adapter readiness report
    #[arg(long, value_name = "FILE", default_value = DEFAULT_ADAPTER_READINESS)]
    pub adapter_readiness_report: PathBuf,

    /// Require a READY adapter readiness report
    #[arg(long)]
    pub require_adapter_readiness: bool,

    /// Report output path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CLOSURE_STATUS)]
    pub out: PathBuf,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Run the Phase 5 execution closure pipeline end to end")]
pub struct ClosureArgs {
    /// Consumer repository
    #[arg(long, value_name = "owner/repo")]
    pub repo: Option<String>,

    /// Number of recent runs to inspect
    #[arg(long, value_name = "N", default_value_t = DEFAULT_LIMIT,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: u32,

    /// Directory receiving every closure report
    #[arg(long, value_name = "DIR", default_value = DEFAULT_PHASE5_DIR)]
    pub out_dir: PathBuf,

    /// Consumer checkout for workflow lint
    #[arg(long, value_name = "DIR")]
    pub repo_path: Option<PathBuf>,

    /// actionlint executable for workflow lint
    #[arg(long, value_name = "BIN")]
    pub actionlint_bin: Option<String>,

    /// Skip the workflow lint step
    #[arg(long)]
    pub skip_workflow_lint: bool,

    /// Skip the adapter session/report/readiness steps
    #[arg(long)]
    pub skip_adapter: bool,

    /// Fail closure unless adapter readiness is READY
    #[arg(long)]
    pub require_adapter_readiness: bool,

    /// Skip the consumer auth preflight
    #[arg(long)]
    pub skip_auth_preflight: bool,

    /// Use package smoke results instead of a live consumer repository
    #[arg(long)]
    pub mock_consumer: bool,

    /// Print the command plan without running it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Assemble the Phase 5 external handoff report")]
pub struct HandoffArgs {
    /// Consumer repository
    #[arg(long, value_name = "owner/repo", default_value = DEFAULT_REPO_PLACEHOLDER)]
    pub repo: String,

    /// Phase 5 execution closure status report
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CLOSURE_STATUS)]
    pub phase5_status_report: PathBuf,

    /// Phase 5 blockers readiness report
    #[arg(long, value_name = "FILE", default_value = DEFAULT_PHASE5_BLOCKERS)]
    pub phase5_blockers_report: PathBuf,

    /// Consumer startup unblock status report
    #[arg(long, value_name = "FILE", default_value = DEFAULT_PHASE5_UNBLOCK_STATUS)]
    pub consumer_unblock_report: PathBuf,

    /// Mock consumer A/B report
    #[arg(long, value_name = "FILE", default_value = DEFAULT_MOCK_AB_REPORT)]
    pub mock_ab_report: PathBuf,

    /// Phase 5 closure run report
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CLOSURE_RUN_REPORT)]
    pub run_report: PathBuf,

    /// Artifact URL to include (repeatable)
    #[arg(long = "artifact-url", value_name = "URL")]
    pub artifact_urls: Vec<String>,

    /// Block handoff when no artifact URL is given
    #[arg(long)]
    pub require_artifact_urls: bool,

    /// Require a READY mock consumer A/B report
    #[arg(long)]
    pub require_mock_ab_report: bool,

    /// Report output path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_HANDOFF)]
    pub out: PathBuf,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Enable or disable hard mode for the gate")]
pub struct HardModeArgs {
    /// Turn hard mode on
    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,

    /// Turn hard mode off
    #[arg(long, conflicts_with = "enable")]
    pub disable: bool,

    /// Severity profile
    #[arg(long, value_enum, default_value_t = HardModeProfile::CriticalHigh)]
    pub profile: HardModeProfile,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Remove generated report and scratch artifacts")]
pub struct CleanArgs {
    /// List what would be removed without deleting
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Interactive operator menu")]
pub struct MenuArgs {}

/// Parse failure, split into clap's own output (help, version) and usage errors.
#[derive(Debug)]
pub enum CliError {
    Display(clap::Error),
    Usage { script: String, message: String },
}

pub fn parse_args<I, T>(argv: I) -> Result<RootArgs, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
    match RootArgs::try_parse_from(&argv) {
        Ok(args) => Ok(args),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => Err(CliError::Display(err)),
            _ => Err(CliError::Usage {
                script: script_name(&argv),
                message: usage_message(&err),
            }),
        },
    }
}

/// First argument naming a known subcommand, else the binary name.
fn script_name(argv: &[OsString]) -> String {
    let root = RootArgs::command();
    argv.iter()
        .skip(1)
        .filter_map(|arg| arg.to_str())
        .find(|arg| root.find_subcommand(arg).is_some())
        .unwrap_or("vtriage")
        .to_string()
}

fn context_text(err: &clap::Error, kind: ContextKind) -> Option<String> {
    match err.get(kind)? {
        ContextValue::String(value) => Some(value.clone()),
        ContextValue::Strings(values) => Some(values.join(", ")),
        _ => None,
    }
}

/// `--out <FILE>` -> `--out`; `--limit=abc` -> `--limit`.
fn flag_name(arg: &str) -> &str {
    arg.split([' ', '=']).next().unwrap_or(arg)
}

pub fn usage_message(err: &clap::Error) -> String {
    let arg = context_text(err, ContextKind::InvalidArg);
    let flag = arg.as_deref().map(flag_name).unwrap_or("argument");
    let value = context_text(err, ContextKind::InvalidValue);
    match err.kind() {
        ErrorKind::UnknownArgument => format!("Unknown argument: {flag}"),
        ErrorKind::InvalidValue if value.as_deref().is_none_or(str::is_empty) => {
            format!("Missing value for {flag}")
        }
        ErrorKind::InvalidValue | ErrorKind::ValueValidation => format!(
            "Invalid {flag} value: {}",
            value.unwrap_or_default()
        ),
        ErrorKind::MissingRequiredArgument => format!(
            "Missing required argument {}",
            arg.unwrap_or_else(|| "(unknown)".to_string())
        ),
        ErrorKind::InvalidSubcommand => format!(
            "Unknown command: {}",
            context_text(err, ContextKind::InvalidSubcommand).unwrap_or_default()
        ),
        ErrorKind::ArgumentConflict => format!(
            "Conflicting arguments: {flag} cannot be used with {}",
            context_text(err, ContextKind::PriorArg).unwrap_or_default()
        ),
        _ => first_error_line(&err.to_string()),
    }
}

fn first_error_line(rendered: &str) -> String {
    rendered
        .lines()
        .next()
        .unwrap_or("invalid arguments")
        .trim_start_matches("error: ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(argv: &[&str]) -> (String, String) {
        match parse_args(argv.iter().copied()) {
            Err(CliError::Usage { script, message }) => (script, message),
            other => panic!("expected usage error, got {other:?}"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        RootArgs::command().debug_assert();
    }

    #[test]
    fn unknown_flag_is_reported_by_name() {
        let (script, message) = usage(&["vtriage", "adapter-readiness", "--bogus"]);
        assert_eq!(script, "adapter-readiness");
        assert_eq!(message, "Unknown argument: --bogus");
    }

    #[test]
    fn value_flag_without_value() {
        let (_, message) = usage(&["vtriage", "adapter-readiness", "--out"]);
        assert_eq!(message, "Missing value for --out");
    }

    #[test]
    fn required_repo_keeps_value_name() {
        let (script, message) = usage(&["vtriage", "consumer-auth-check"]);
        assert_eq!(script, "consumer-auth-check");
        assert_eq!(message, "Missing required argument --repo <owner/repo>");
    }

    #[test]
    fn non_positive_limit_is_invalid() {
        let (_, message) = usage(&[
            "vtriage",
            "consumer-ci-artifacts",
            "--repo",
            "acme/app",
            "--limit",
            "0",
        ]);
        assert_eq!(message, "Invalid --limit value: 0");
    }

    #[test]
    fn unknown_subcommand() {
        let (script, message) = usage(&["vtriage", "nope"]);
        assert_eq!(script, "vtriage");
        assert_eq!(message, "Unknown command: nope");
    }

    #[test]
    fn artifact_urls_repeat() {
        let args = parse_args([
            "vtriage",
            "phase5-external-handoff",
            "--artifact-url",
            "https://a",
            "--artifact-url",
            "https://b",
        ])
        .expect("parse");
        match args.command {
            Command::Phase5ExternalHandoff(handoff) => {
                assert_eq!(handoff.artifact_urls, vec!["https://a", "https://b"]);
                assert_eq!(handoff.out, PathBuf::from(DEFAULT_HANDOFF));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let args = parse_args(["vtriage", "clean-artifacts", "--config", "cfg.json"]).expect("parse");
        assert_eq!(args.config, Some(PathBuf::from("cfg.json")));
        assert_eq!(args.command.name(), "clean-artifacts");
    }
}
