//! Line-oriented operator menu over the report pipelines.
//!
//! Two modes share one loop: the consumer menu exposes the end-to-end flows
//! and the advanced menu exposes every individual report. Each action prompts
//! for its inputs, builds a `vtriage` argument vector and hands it to a
//! [`StepRunner`].
use crate::cli::{
    DEFAULT_ADAPTER_READINESS, DEFAULT_ADAPTER_REAL_SESSION, DEFAULT_CONSUMER_TRIAGE_DIR,
    DEFAULT_LIMIT, DEFAULT_PHASE5_DIR, DEFAULT_REPO_PLACEHOLDER,
};
use crate::context::{RunContext, RunOutcome};
use crate::exec::{SelfInvoker, StepRunner};
use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};

pub const MODE_ENV: &str = "PUMUKI_MENU_MODE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuMode {
    Consumer,
    Advanced,
}

impl MenuMode {
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some("advanced") => MenuMode::Advanced,
            _ => MenuMode::Consumer,
        }
    }
}

/// Prompt source for action builders.
pub trait Prompt {
    /// Answer to `label`, or `default` on an empty line or end of input.
    fn ask(&mut self, label: &str, default: &str) -> Result<String>;

    fn confirm(&mut self, label: &str, default: bool) -> Result<bool> {
        let shown = if default { "Y/n" } else { "y/N" };
        let answer = self.ask(&format!("{label} [{shown}]"), if default { "y" } else { "n" })?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

type Builder = fn(&mut dyn Prompt) -> Result<Vec<String>>;

pub struct MenuAction {
    pub id: &'static str,
    pub label: &'static str,
    build: Option<Builder>,
}

impl MenuAction {
    const fn new(id: &'static str, label: &'static str, build: Builder) -> Self {
        Self {
            id,
            label,
            build: Some(build),
        }
    }

    const fn exit(id: &'static str) -> Self {
        Self {
            id,
            label: "Exit",
            build: None,
        }
    }
}

fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn ask_repo(prompt: &mut dyn Prompt) -> Result<String> {
    let repo = prompt.ask("Consumer repo (owner/repo)", DEFAULT_REPO_PLACEHOLDER)?;
    if repo == DEFAULT_REPO_PLACEHOLDER || !repo.contains('/') {
        bail!("A consumer repository in owner/repo form is required.");
    }
    Ok(repo)
}

fn ask_limit(prompt: &mut dyn Prompt) -> Result<String> {
    let limit = prompt.ask("Runs to inspect", &DEFAULT_LIMIT.to_string())?;
    match limit.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value.to_string()),
        _ => bail!("Invalid limit: {limit}"),
    }
}

fn startup_triage(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let repo = ask_repo(prompt)?;
    let limit = ask_limit(prompt)?;
    let out_dir = prompt.ask("Output directory", DEFAULT_CONSUMER_TRIAGE_DIR)?;
    let mut argv = args([
        "consumer-startup-triage",
        "--repo",
        &repo,
        "--limit",
        &limit,
        "--out-dir",
        &out_dir,
    ]);
    let repo_path = prompt.ask("Consumer checkout for workflow lint (empty to skip)", "")?;
    if repo_path.is_empty() {
        argv.push("--skip-workflow-lint".to_string());
    } else {
        let bin = prompt.ask("actionlint binary", "actionlint")?;
        argv.extend(args(["--repo-path", &repo_path, "--actionlint-bin", &bin]));
    }
    Ok(argv)
}

fn closure(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let mock = prompt.confirm("Use mock consumer package smoke results", true)?;
    let repo = if mock {
        prompt.ask("Consumer repo label", "mock/consumer")?
    } else {
        ask_repo(prompt)?
    };
    let mut argv = args(["phase5-execution-closure", "--repo", &repo]);
    if mock {
        argv.push("--mock-consumer".to_string());
    } else {
        argv.extend(args(["--limit", &ask_limit(prompt)?, "--skip-workflow-lint"]));
    }
    if prompt.confirm("Include adapter session checks", false)? {
        if prompt.confirm("Require adapter readiness", false)? {
            argv.push("--require-adapter-readiness".to_string());
        }
    } else {
        argv.push("--skip-adapter".to_string());
    }
    Ok(argv)
}

fn handoff(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let repo = prompt.ask("Consumer repo (owner/repo)", DEFAULT_REPO_PLACEHOLDER)?;
    let mut argv = args(["phase5-external-handoff", "--repo", &repo]);
    let urls = prompt.ask("Artifact URLs (comma separated, empty for none)", "")?;
    for url in urls.split(',').map(str::trim).filter(|url| !url.is_empty()) {
        argv.extend(args(["--artifact-url", url]));
    }
    if prompt.confirm("Require mock consumer A/B report", false)? {
        argv.push("--require-mock-ab-report".to_string());
    }
    Ok(argv)
}

fn clean(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let mut argv = args(["clean-artifacts"]);
    if prompt.confirm("Dry run only", true)? {
        argv.push("--dry-run".to_string());
    }
    Ok(argv)
}

fn hard_mode(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let enable = prompt.confirm("Enable hard mode", true)?;
    let profile = prompt.ask("Profile (critical-high|all-severities)", "critical-high")?;
    if !matches!(profile.as_str(), "critical-high" | "all-severities") {
        bail!("Unknown hard mode profile: {profile}");
    }
    let toggle = if enable { "--enable" } else { "--disable" };
    Ok(args(["hard-mode", toggle, "--profile", &profile]))
}

fn adapter_session_status(_: &mut dyn Prompt) -> Result<Vec<String>> {
    Ok(args(["adapter-session-status"]))
}

fn adapter_real_session(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let operator = prompt.ask("Operator", "unknown")?;
    Ok(args(["adapter-real-session-report", "--operator", &operator]))
}

fn adapter_readiness(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let report = prompt.ask("Adapter real-session report", DEFAULT_ADAPTER_REAL_SESSION)?;
    Ok(args(["adapter-readiness", "--adapter-report", &report]))
}

fn consumer_artifacts(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let repo = ask_repo(prompt)?;
    let limit = ask_limit(prompt)?;
    Ok(args(["consumer-ci-artifacts", "--repo", &repo, "--limit", &limit]))
}

fn consumer_auth(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let repo = ask_repo(prompt)?;
    Ok(args(["consumer-auth-check", "--repo", &repo]))
}

fn consumer_lint(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let repo_path = prompt.ask("Consumer checkout", ".")?;
    let bin = prompt.ask("actionlint binary", "actionlint")?;
    Ok(args(["consumer-workflow-lint", "--repo-path", &repo_path, "--actionlint-bin", &bin]))
}

fn support_bundle(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let repo = ask_repo(prompt)?;
    let limit = ask_limit(prompt)?;
    Ok(args(["consumer-support-bundle", "--repo", &repo, "--limit", &limit]))
}

fn support_ticket(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let repo = ask_repo(prompt)?;
    Ok(args(["consumer-support-ticket-draft", "--repo", &repo]))
}

fn unblock_status(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let repo = ask_repo(prompt)?;
    Ok(args(["consumer-startup-unblock-status", "--repo", &repo]))
}

fn mock_ab(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let repo = prompt.ask("Consumer repo label", DEFAULT_REPO_PLACEHOLDER)?;
    Ok(args(["mock-consumer-ab-report", "--repo", &repo]))
}

fn phase5_blockers(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let mut argv = args(["phase5-blockers-readiness"]);
    if prompt.confirm("Require adapter real-session report", false)? {
        argv.push("--require-adapter-report".to_string());
    }
    Ok(argv)
}

fn closure_status(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let mut argv = args([
        "phase5-execution-closure-status",
        "--adapter-readiness-report",
        DEFAULT_ADAPTER_READINESS,
    ]);
    if prompt.confirm("Require adapter readiness", false)? {
        argv.push("--require-adapter-readiness".to_string());
    }
    Ok(argv)
}

fn mock_triage(prompt: &mut dyn Prompt) -> Result<Vec<String>> {
    let repo = prompt.ask("Consumer repo label", "mock/consumer")?;
    Ok(args(["mock-consumer-startup-triage", "--repo", &repo, "--out-dir", DEFAULT_PHASE5_DIR]))
}

pub fn consumer_actions() -> Vec<MenuAction> {
    vec![
        MenuAction::new("1", "Run consumer startup triage", startup_triage),
        MenuAction::new("2", "Run Phase 5 execution closure", closure),
        MenuAction::new("3", "Generate Phase 5 external handoff", handoff),
        MenuAction::new("4", "Clean local validation artifacts", clean),
        MenuAction::exit("10"),
    ]
}

pub fn advanced_actions() -> Vec<MenuAction> {
    vec![
        MenuAction::new("9", "Adapter session status report", adapter_session_status),
        MenuAction::new("10", "Consumer CI artifacts report", consumer_artifacts),
        MenuAction::new("11", "Consumer CI auth check", consumer_auth),
        MenuAction::new("12", "Consumer workflow lint", consumer_lint),
        MenuAction::new("13", "Startup-failure support bundle", support_bundle),
        MenuAction::new("14", "Support ticket draft", support_ticket),
        MenuAction::new("15", "Startup unblock status", unblock_status),
        MenuAction::new("16", "Adapter real-session report", adapter_real_session),
        MenuAction::new("18", "Configure hard mode", hard_mode),
        MenuAction::new("19", "Consumer startup triage", startup_triage),
        MenuAction::new("20", "Mock consumer A/B report", mock_ab),
        MenuAction::new("21", "Phase 5 blockers readiness", phase5_blockers),
        MenuAction::new("22", "Adapter readiness report", adapter_readiness),
        MenuAction::new("23", "Phase 5 execution closure status", closure_status),
        MenuAction::new("24", "Phase 5 execution closure (one shot)", closure),
        MenuAction::new("25", "Phase 5 external handoff", handoff),
        MenuAction::new("26", "Clean local validation artifacts", clean),
        MenuAction::new("27", "Mock consumer startup triage", mock_triage),
        MenuAction::exit("28"),
    ]
}

/// Reader/writer pair driving the loop.
pub struct Console<R, W> {
    input: R,
    output: W,
    eof: bool,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            eof: false,
        }
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes()).context("write menu output")?;
        self.output.flush().context("flush menu output")
    }

    /// Next trimmed line, or `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>> {
        if self.eof {
            return Ok(None);
        }
        let mut line = String::new();
        if self.input.read_line(&mut line).context("read menu input")? == 0 {
            self.eof = true;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Prompt for Console<R, W> {
    fn ask(&mut self, label: &str, default: &str) -> Result<String> {
        if default.is_empty() {
            self.write(&format!("{label}: "))?;
        } else {
            self.write(&format!("{label} [{default}]: "))?;
        }
        match self.read_line()? {
            Some(answer) if !answer.is_empty() => Ok(answer),
            _ => Ok(default.to_string()),
        }
    }
}

fn print_menu<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    mode: MenuMode,
    actions: &[MenuAction],
) -> Result<()> {
    let mut text = String::new();
    match mode {
        MenuMode::Consumer => {
            text.push_str("\nValidation Triage Menu\n");
            text.push_str("A. Switch to advanced menu\n");
        }
        MenuMode::Advanced => {
            text.push_str("\nValidation Triage Menu (Advanced)\n");
            text.push_str("C. Switch to consumer menu\n");
        }
    }
    for action in actions {
        text.push_str(&format!("{}. {}\n", action.id, action.label));
    }
    console.write(&text)
}

pub fn run_menu<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    runner: &mut dyn StepRunner,
    initial: MenuMode,
) -> Result<()> {
    let consumer = consumer_actions();
    let advanced = advanced_actions();
    let mut mode = initial;
    loop {
        let actions = match mode {
            MenuMode::Consumer => &consumer,
            MenuMode::Advanced => &advanced,
        };
        print_menu(console, mode, actions)?;
        console.write("\nSelect option: ")?;
        let Some(option) = console.read_line()? else {
            return Ok(());
        };

        match (mode, option.to_ascii_uppercase().as_str()) {
            (MenuMode::Consumer, "A") => {
                mode = MenuMode::Advanced;
                continue;
            }
            (MenuMode::Advanced, "C") => {
                mode = MenuMode::Consumer;
                continue;
            }
            _ => {}
        }

        let Some(action) = actions.iter().find(|action| action.id == option) else {
            console.write("Invalid option.\n")?;
            continue;
        };
        let Some(build) = action.build else {
            return Ok(());
        };
        let result = build(console).and_then(|argv| runner.run_step(&argv));
        match result {
            Ok(0) => {}
            Ok(code) => console.write(&format!("Step exited with code {code}.\n"))?,
            Err(err) => console.write(&format!("Error: {err:#}\n"))?,
        }
    }
}

pub fn run(ctx: &RunContext) -> Result<RunOutcome> {
    let mode = MenuMode::from_env_value(std::env::var(MODE_ENV).ok().as_deref());
    let stdin = std::io::stdin();
    let mut console = Console::new(stdin.lock(), std::io::stdout());
    run_menu(&mut console, &mut SelfInvoker::new(ctx), mode)?;
    Ok(RunOutcome::new(String::new(), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::RecordingRunner;
    use std::io::Cursor;

    fn drive(script: &str, mode: MenuMode, runner: &mut RecordingRunner) -> String {
        let mut console = Console::new(Cursor::new(script.as_bytes().to_vec()), Vec::new());
        run_menu(&mut console, runner, mode).expect("menu");
        String::from_utf8(console.into_output()).expect("utf8")
    }

    #[test]
    fn mode_comes_from_environment_value() {
        assert_eq!(MenuMode::from_env_value(Some("advanced")), MenuMode::Advanced);
        assert_eq!(MenuMode::from_env_value(Some("other")), MenuMode::Consumer);
        assert_eq!(MenuMode::from_env_value(None), MenuMode::Consumer);
    }

    #[test]
    fn exit_and_eof_end_the_loop() {
        let mut runner = RecordingRunner::new();
        let output = drive("10\n", MenuMode::Consumer, &mut runner);
        assert!(output.contains("Validation Triage Menu\n"));
        assert!(runner.calls.is_empty());

        let output = drive("", MenuMode::Advanced, &mut runner);
        assert!(output.contains("(Advanced)"));
    }

    #[test]
    fn unknown_option_is_reported_and_loop_continues() {
        let mut runner = RecordingRunner::new();
        let output = drive("99\n10\n", MenuMode::Consumer, &mut runner);
        assert_eq!(output.matches("Invalid option.").count(), 1);
        assert_eq!(output.matches("Select option: ").count(), 2);
    }

    #[test]
    fn switching_modes_changes_the_action_list() {
        let mut runner = RecordingRunner::new();
        let output = drive("a\n26\n\nc\n10\n", MenuMode::Consumer, &mut runner);
        assert!(output.contains("C. Switch to consumer menu"));
        assert_eq!(runner.calls, vec![args(["clean-artifacts", "--dry-run"])]);
    }

    #[test]
    fn prompts_fall_back_to_defaults() {
        let mut runner = RecordingRunner::new();
        drive("2\n\n\n\n10\n", MenuMode::Consumer, &mut runner);
        assert_eq!(
            runner.calls,
            vec![args([
                "phase5-execution-closure",
                "--repo",
                "mock/consumer",
                "--mock-consumer",
                "--skip-adapter",
            ])]
        );
    }

    #[test]
    fn builder_errors_print_and_continue() {
        let mut runner = RecordingRunner::new().failing("clean-artifacts", 3);
        let output = drive("1\n\n4\nn\n10\n", MenuMode::Consumer, &mut runner);
        assert!(output.contains("Error: A consumer repository in owner/repo form is required."));
        assert!(output.contains("Step exited with code 3."));
        assert_eq!(runner.subcommands(), vec!["clean-artifacts"]);
    }
}
