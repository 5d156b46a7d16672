//! Subprocess runner.
//!
//! External tool failures are data, not errors: every call returns the exit
//! code and captured text so callers can turn them into report signals. A
//! missing executable reports exit code 127, the way a shell would.
use crate::context::RunContext;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;
use std::time::Instant;

/// Exit code reported when the executable cannot be resolved.
pub const COMMAND_NOT_FOUND: i32 = 127;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout and stderr joined, trimmed.
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, _) => stderr.to_string(),
            (false, true) => stdout.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

/// One labeled command and its captured result, as shown in reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExecution {
    pub label: String,
    pub command: String,
    pub exit_code: i32,
    pub output: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RunOptions<'a> {
    pub cwd: Option<&'a Path>,
    pub env: &'a [(String, String)],
}

pub fn run(program: &str, args: &[&str], options: &RunOptions<'_>) -> ProcessOutput {
    let start = Instant::now();
    let cwd = options
        .cwd
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_default();
    let resolved = match which::which_in(program, std::env::var_os("PATH"), &cwd) {
        Ok(path) => path,
        Err(_) => {
            tracing::info!(program, exit_code = COMMAND_NOT_FOUND, "command not found");
            return ProcessOutput {
                exit_code: COMMAND_NOT_FOUND,
                stdout: String::new(),
                stderr: format!("{program}: command not found"),
            };
        }
    };

    let mut cmd = Command::new(&resolved);
    cmd.args(args);
    if let Some(dir) = options.cwd {
        cmd.current_dir(dir);
    }
    for (key, value) in options.env {
        cmd.env(key, value);
    }
    let output = match cmd.output() {
        Ok(output) => output,
        Err(err) => {
            tracing::info!(program, error = %err, "command failed to spawn");
            return ProcessOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: format!("{program}: {err}"),
            };
        }
    };
    let exit_code = output.status.code().unwrap_or(1);
    tracing::info!(
        program,
        exit_code,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "command finished"
    );
    ProcessOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

/// Run `script` through `bash -lc`, keeping the label for reporting.
pub fn run_shell(label: &str, script: &str, options: &RunOptions<'_>) -> CommandExecution {
    let output = run("bash", &["-lc", script], options);
    CommandExecution {
        label: label.to_string(),
        command: script.to_string(),
        exit_code: output.exit_code,
        output: output.combined(),
    }
}

/// Trimmed stdout on success, `unknown` otherwise.
pub fn run_or_unknown(program: &str, args: &[&str], options: &RunOptions<'_>) -> String {
    let output = run(program, args, options);
    let value = output.stdout.trim();
    if output.success() && !value.is_empty() {
        value.to_string()
    } else {
        "unknown".to_string()
    }
}

/// Display form of a command line.
pub fn display_command(program: &str, args: &[String]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(program);
    parts.extend(args.iter().map(String::as_str));
    shell_words::join(parts)
}

/// Executes orchestrator steps. Implemented by re-invoking this binary;
/// tests substitute a recorder.
pub trait StepRunner {
    fn run_step(&mut self, args: &[String]) -> Result<i32>;
}

/// Runs a subcommand of the current executable with inherited stdio.
pub struct SelfInvoker<'a> {
    ctx: &'a RunContext,
}

impl<'a> SelfInvoker<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }
}

impl StepRunner for SelfInvoker<'_> {
    fn run_step(&mut self, args: &[String]) -> Result<i32> {
        let exe = std::env::current_exe().context("resolve current executable")?;
        let mut cmd = Command::new(&exe);
        if let Some(config) = self.ctx.config_path.as_ref() {
            cmd.arg("--config").arg(config);
        }
        cmd.args(args).current_dir(&self.ctx.cwd);
        let start = Instant::now();
        let status = cmd
            .status()
            .with_context(|| format!("spawn {}", exe.display()))?;
        let exit_code = status.code().unwrap_or(1);
        tracing::info!(
            step = args.first().map(String::as_str).unwrap_or(""),
            exit_code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "step finished"
        );
        Ok(exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_executable_reports_127() {
        let output = run(
            "vtriage-definitely-not-installed",
            &["--version"],
            &RunOptions::default(),
        );
        assert_eq!(output.exit_code, COMMAND_NOT_FOUND);
        assert!(output.stderr.contains("command not found"));
        assert!(!output.success());
    }

    #[test]
    fn combined_output_joins_streams() {
        let output = ProcessOutput {
            exit_code: 0,
            stdout: "out\n".to_string(),
            stderr: "  err ".to_string(),
        };
        assert_eq!(output.combined(), "out\nerr");
        let only_err = ProcessOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: "boom\n".to_string(),
        };
        assert_eq!(only_err.combined(), "boom");
    }

    #[test]
    fn display_command_quotes_arguments() {
        let args = vec!["--repo".to_string(), "acme/app".to_string(), "a b".to_string()];
        assert_eq!(display_command("vtriage", &args), "vtriage --repo acme/app 'a b'");
    }

    #[test]
    fn run_or_unknown_falls_back() {
        assert_eq!(
            run_or_unknown("vtriage-definitely-not-installed", &[], &RunOptions::default()),
            "unknown"
        );
    }
}
