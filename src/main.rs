mod adapter;
mod cleanup;
mod cli;
mod config;
mod consumer;
mod context;
mod exec;
mod hard_mode;
mod markdown;
mod menu;
mod mock;
mod phase5;
mod plan;
mod report;
mod util;
mod verdict;

use anyhow::Result;
use cli::{CliError, Command, RootArgs};
use context::{RunContext, RunOutcome};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn dispatch(ctx: &RunContext, command: &Command) -> Result<RunOutcome> {
    match command {
        Command::AdapterSessionStatus(args) => adapter::session_status::run(ctx, args),
        Command::AdapterRealSessionReport(args) => adapter::real_session::run(ctx, args),
        Command::AdapterReadiness(args) => adapter::readiness::run(ctx, args),
        Command::ConsumerAuthCheck(args) => consumer::auth::run(ctx, args),
        Command::ConsumerCiArtifacts(args) => consumer::artifacts::run(ctx, args),
        Command::ConsumerWorkflowLint(args) => consumer::workflow_lint::run(ctx, args),
        Command::ConsumerSupportBundle(args) => consumer::support_bundle::run(ctx, args),
        Command::ConsumerSupportTicketDraft(args) => consumer::ticket::run(ctx, args),
        Command::ConsumerStartupUnblockStatus(args) => consumer::unblock::run(ctx, args),
        Command::ConsumerStartupTriage(args) => consumer::triage::run(ctx, args),
        Command::PackageSmoke(args) => mock::package_smoke::run_smoke(ctx, args),
        Command::MockConsumerAbReport(args) => mock::ab_report::run(ctx, args),
        Command::MockConsumerStartupTriage(args) => mock::startup_triage::run(ctx, args),
        Command::Phase5BlockersReadiness(args) => phase5::blockers::run(ctx, args),
        Command::Phase5ExecutionClosureStatus(args) => phase5::closure_status::run(ctx, args),
        Command::Phase5ExecutionClosure(args) => phase5::closure::run(ctx, args),
        Command::Phase5ExternalHandoff(args) => phase5::handoff::run(ctx, args),
        Command::HardMode(args) => hard_mode::run(ctx, args),
        Command::CleanArtifacts(args) => cleanup::run(ctx, args),
        Command::Menu(_) => menu::run(ctx),
    }
}

fn execute(root: &RootArgs) -> Result<RunOutcome> {
    let cwd = std::env::current_dir()?;
    let config_path = root.config.as_ref().map(|path| util::resolve_path(&cwd, path));
    let config = config::load_config(&cwd, config_path.as_deref())?;
    let ctx = RunContext::new(cwd, config, util::now_rfc3339()).with_config_path(config_path);
    tracing::debug!(command = root.command.name(), cwd = %ctx.cwd.display(), "dispatching");
    dispatch(&ctx, &root.command)
}

fn main() -> ExitCode {
    init_tracing();
    let root = match cli::parse_args(std::env::args_os()) {
        Ok(root) => root,
        Err(CliError::Display(err)) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(CliError::Usage { script, message }) => {
            eprintln!("{script} failed: {message}");
            return ExitCode::from(1);
        }
    };

    match execute(&root) {
        Ok(outcome) => {
            if !outcome.message.is_empty() {
                println!("{}", outcome.message);
            }
            ExitCode::from(outcome.exit_code)
        }
        Err(err) => {
            eprintln!("{} failed: {err:#}", root.command.name());
            ExitCode::from(1)
        }
    }
}
