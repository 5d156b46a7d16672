//! Adapter hook session status.
//!
//! Runs the configured verify/assess commands through `bash -lc`, resolves
//! the session verdict ladder and records the relevant log tails.
use super::{file_tail, latest_log, repo_log_tail, HOOK_LOG, RUNTIME_LOG_PREFIX, SMOKE_LOG_PREFIX, WRITES_LOG};
use crate::cli::AdapterSessionStatusArgs;
use crate::context::{RunContext, RunOutcome};
use crate::exec::{run_shell, CommandExecution, RunOptions};
use crate::markdown::MarkdownDoc;
use crate::report::{write_report, ReportEnvelope};
use crate::util::{labeled_value, section_body, first_fenced_block};
use crate::verdict::{Summary, Verdict};
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const KIND: &str = "adapter-session-status";
pub const VERIFY_LABEL: &str = "verify-adapter-hooks-runtime";
pub const STRICT_LABEL: &str = "assess-adapter-hooks-session";
pub const ANY_LABEL: &str = "assess-adapter-hooks-session:any";
pub const PASS_MARKER: &str = "session-assessment=PASS";

/// Inputs to the session verdict ladder.
#[derive(Debug, Clone, Copy)]
pub struct SessionVerdictInput<'a> {
    pub verify_exit_code: i32,
    pub strict_output: &'a str,
    pub any_output: &'a str,
}

/// Runtime verification gates everything; a strict pass beats an
/// include-simulated pass.
pub fn determine_session_verdict(input: &SessionVerdictInput<'_>) -> Verdict {
    if input.verify_exit_code != 0 {
        return Verdict::Blocked;
    }
    if input.strict_output.contains(PASS_MARKER) {
        return Verdict::Pass;
    }
    if input.any_output.contains(PASS_MARKER) {
        return Verdict::NeedsRealSession;
    }
    Verdict::Blocked
}

/// A command that never ran counts as a failed verify with no output.
pub fn verdict_from_commands(commands: &[CommandExecution]) -> Verdict {
    let find = |label: &str| commands.iter().find(|command| command.label == label);
    determine_session_verdict(&SessionVerdictInput {
        verify_exit_code: find(VERIFY_LABEL).map_or(1, |command| command.exit_code),
        strict_output: find(STRICT_LABEL).map_or("", |command| command.output.as_str()),
        any_output: find(ANY_LABEL).map_or("", |command| command.output.as_str()),
    })
}

/// Facts a status report carries for the real-session report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSessionStatus {
    pub verdict: Option<String>,
    pub verify_exit_code: Option<i32>,
    pub strict_exit_code: Option<i32>,
    pub any_exit_code: Option<i32>,
    pub strict_assessment_pass: bool,
    pub any_assessment_pass: bool,
}

impl ParsedSessionStatus {
    pub fn from_commands(verdict: Verdict, commands: &[CommandExecution]) -> Self {
        let find = |label: &str| commands.iter().find(|command| command.label == label);
        let passes = |label: &str| find(label).is_some_and(|command| command.output.contains(PASS_MARKER));
        Self {
            verdict: Some(verdict.as_str().to_string()),
            verify_exit_code: find(VERIFY_LABEL).map(|command| command.exit_code),
            strict_exit_code: find(STRICT_LABEL).map(|command| command.exit_code),
            any_exit_code: find(ANY_LABEL).map(|command| command.exit_code),
            strict_assessment_pass: passes(STRICT_LABEL),
            any_assessment_pass: passes(ANY_LABEL),
        }
    }
}

fn command_exit_code(markdown: &str, label: &str) -> Option<i32> {
    let pattern = format!(r"\|\s*{}\s*\|[^|]*\|\s*([0-9]+)\s*\|", regex::escape(label));
    let re = Regex::new(&pattern).ok()?;
    re.captures(markdown)?.get(1)?.as_str().parse().ok()
}

fn command_output(markdown: &str, label: &str) -> Option<String> {
    let body = section_body(markdown, &format!("### {label}"))?;
    first_fenced_block(body)
}

pub fn parse_session_status(markdown: &str) -> ParsedSessionStatus {
    let passes = |label: &str| {
        command_output(markdown, label).is_some_and(|output| output.contains(PASS_MARKER))
    };
    ParsedSessionStatus {
        verdict: labeled_value(markdown, "verdict"),
        verify_exit_code: command_exit_code(markdown, VERIFY_LABEL),
        strict_exit_code: command_exit_code(markdown, STRICT_LABEL),
        any_exit_code: command_exit_code(markdown, ANY_LABEL),
        strict_assessment_pass: passes(STRICT_LABEL),
        any_assessment_pass: passes(ANY_LABEL),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTail {
    pub title: String,
    pub path: String,
    pub content: String,
}

pub struct SessionStatusReport<'a> {
    pub generated_at: &'a str,
    pub repo_root: &'a str,
    pub verdict: Verdict,
    pub commands: &'a [CommandExecution],
    pub tails: &'a [LogTail],
    pub verify_command: &'a str,
}

pub fn render_session_status(report: &SessionStatusReport<'_>) -> String {
    let SessionStatusReport {
        generated_at,
        repo_root,
        verdict,
        commands,
        tails,
        verify_command,
    } = report;

    let mut doc = MarkdownDoc::new("Adapter Session Status Report");
    doc.field("generated_at", generated_at);
    doc.code_field("repo_root", repo_root);
    doc.field("verdict", verdict);

    doc.section("Commands");
    let rows: Vec<Vec<String>> = commands
        .iter()
        .map(|command| {
            vec![
                command.label.clone(),
                format!("`{}`", command.command),
                command.exit_code.to_string(),
            ]
        })
        .collect();
    doc.table(&["label", "command", "exit_code"], &rows);

    doc.section("Command Output");
    for command in commands.iter() {
        doc.subsection(&command.label);
        doc.fenced("text", &command.output);
    }

    doc.section("Log Tails");
    for tail in tails.iter() {
        doc.subsection(&tail.title);
        doc.code_field("path", &tail.path);
        doc.blank();
        doc.fenced("text", &tail.content);
    }

    doc.section("Next Actions");
    match verdict {
        Verdict::Pass => {
            doc.bullet("Strict session assessment passes. Generate the real-session report: `vtriage adapter-real-session-report`.");
        }
        Verdict::NeedsRealSession => {
            doc.bullet("Runtime is healthy but only the include-simulated assessment passes.");
            doc.bullet("Run a real Adapter session with one allowed write and one blocked write, then rerun this report.");
        }
        _ => {
            doc.bullet(format!(
                "Fix the runtime verification failure (`{verify_command}`) and rerun this report."
            ));
            doc.bullet("Reinstall the hook config if it is missing: `npm run install:adapter-hooks-config`.");
        }
    }
    doc.finish()
}

fn collect_tails(ctx: &RunContext, lines: usize) -> Result<Vec<LogTail>> {
    let repo_root = ctx.cwd.display().to_string();
    let audit_dir = ctx.audit_tmp_dir();
    let mut tails = Vec::new();
    for name in [HOOK_LOG, WRITES_LOG] {
        let path = audit_dir.join(name);
        tails.push(LogTail {
            title: name.to_string(),
            path: path.display().to_string(),
            content: repo_log_tail(&path, &repo_root, lines)?,
        });
    }
    for prefix in [RUNTIME_LOG_PREFIX, SMOKE_LOG_PREFIX] {
        let path = latest_log(&audit_dir, prefix)?
            .unwrap_or_else(|| audit_dir.join(format!("{prefix}<missing>.log")));
        tails.push(LogTail {
            title: file_title(&path),
            path: path.display().to_string(),
            content: file_tail(&path, lines)?,
        });
    }
    Ok(tails)
}

fn file_title(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn run(ctx: &RunContext, args: &AdapterSessionStatusArgs) -> Result<RunOutcome> {
    let options = RunOptions {
        cwd: Some(&ctx.cwd),
        env: &[],
    };
    let commands: Vec<CommandExecution> = ctx
        .config
        .adapter
        .session_commands
        .iter()
        .map(|command| run_shell(&command.label, &command.command, &options))
        .collect();
    let verdict = verdict_from_commands(&commands);
    let tails = collect_tails(ctx, args.tail_lines as usize)?;
    let verify_command = commands
        .iter()
        .find(|command| command.label == VERIFY_LABEL)
        .map_or("npm run -s verify:adapter-hooks-runtime", |command| command.command.as_str());
    let repo_root = ctx.cwd.display().to_string();
    let markdown = render_session_status(&SessionStatusReport {
        generated_at: &ctx.generated_at,
        repo_root: &repo_root,
        verdict,
        commands: &commands,
        tails: &tails,
        verify_command,
    });

    let summary = Summary {
        verdict,
        blockers: Vec::new(),
        missing_inputs: Vec::new(),
        warnings: Vec::new(),
    };
    let facts = ParsedSessionStatus::from_commands(verdict, &commands);
    let envelope = ReportEnvelope::from_summary(KIND, &ctx.generated_at, &summary, &facts)?;
    let out = ctx.resolve(&args.out);
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!(
            "adapter session status report generated at {} (verdict={verdict})",
            out.display()
        ),
        verdict.exit_code(),
    ))
}

#[cfg(test)]
#[path = "session_status_tests.rs"]
mod tests;
