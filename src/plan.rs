//! Step plans for the orchestrating subcommands.
//!
//! A plan is an ordered list of `vtriage` invocations. Execution is strictly
//! sequential; each step's exit code is recorded and, depending on the halt
//! policy, a failed required step either stops the plan (remaining steps are
//! reported as skipped) or is only noted.
use crate::exec::{display_command, StepRunner};
use crate::markdown::MarkdownDoc;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const BINARY: &str = "vtriage";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub id: String,
    pub required: bool,
    pub args: Vec<String>,
    pub output: PathBuf,
}

impl PlannedStep {
    pub fn new<I, S>(id: &str, required: bool, args: I, output: PathBuf) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.to_string(),
            required,
            args: args.into_iter().map(Into::into).collect(),
            output,
        }
    }

    pub fn command(&self) -> String {
        display_command(BINARY, &self.args)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Passed => "passed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepExecution {
    pub id: String,
    pub required: bool,
    pub command: String,
    pub exit_code: Option<i32>,
    pub status: StepStatus,
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltPolicy {
    RunAll,
    StopOnRequiredFailure,
}

pub fn execute_plan(
    steps: &[PlannedStep],
    runner: &mut dyn StepRunner,
    policy: HaltPolicy,
) -> Result<Vec<StepExecution>> {
    let mut executions = Vec::with_capacity(steps.len());
    let mut halted = false;
    for step in steps {
        let (exit_code, status) = if halted {
            (None, StepStatus::Skipped)
        } else {
            let code = runner.run_step(&step.args)?;
            let status = if code == 0 {
                StepStatus::Passed
            } else {
                StepStatus::Failed
            };
            if status == StepStatus::Failed
                && step.required
                && policy == HaltPolicy::StopOnRequiredFailure
            {
                tracing::info!(step = %step.id, exit_code = code, "required step failed; halting plan");
                halted = true;
            }
            (Some(code), status)
        };
        executions.push(StepExecution {
            id: step.id.clone(),
            required: step.required,
            command: step.command(),
            exit_code,
            status,
            output: step.output.display().to_string(),
        });
    }
    Ok(executions)
}

pub fn required_failures(executions: &[StepExecution]) -> Vec<String> {
    executions
        .iter()
        .filter(|exec| exec.required && exec.status == StepStatus::Failed)
        .map(|exec| exec.id.clone())
        .collect()
}

pub fn optional_failures(executions: &[StepExecution]) -> Vec<String> {
    executions
        .iter()
        .filter(|exec| !exec.required && exec.status == StepStatus::Failed)
        .map(|exec| exec.id.clone())
        .collect()
}

pub fn render_executions(doc: &mut MarkdownDoc, executions: &[StepExecution]) {
    let rows: Vec<Vec<String>> = executions
        .iter()
        .map(|exec| {
            vec![
                exec.id.clone(),
                crate::util::yes_no(exec.required).to_lowercase(),
                exec.exit_code
                    .map_or_else(|| "-".to_string(), |code| code.to_string()),
                exec.status.as_str().to_string(),
                format!("`{}`", exec.output),
            ]
        })
        .collect();
    doc.table(&["id", "required", "exit_code", "status", "output"], &rows);
}

pub fn render_command_plan(doc: &mut MarkdownDoc, steps: &[PlannedStep]) {
    let commands: Vec<String> = steps.iter().map(PlannedStep::command).collect();
    doc.fenced("bash", &commands.join("\n"));
}

/// Text printed for `--dry-run`.
pub fn dry_run_listing(header: &str, steps: &[PlannedStep]) -> String {
    let mut lines = vec![header.to_string()];
    for step in steps {
        let tag = if step.required { "required" } else { "optional" };
        lines.push(format!("- [{}] {} ({tag}): {}", step.id, step.output.display(), step.command()));
    }
    lines.join("\n")
}

/// Records every invocation and answers from a fixed exit-code table.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingRunner {
    pub calls: Vec<Vec<String>>,
    pub exit_codes: std::collections::HashMap<String, i32>,
}

#[cfg(test)]
impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, subcommand: &str, code: i32) -> Self {
        self.exit_codes.insert(subcommand.to_string(), code);
        self
    }

    pub fn subcommands(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| call.first().map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
impl StepRunner for RecordingRunner {
    fn run_step(&mut self, args: &[String]) -> Result<i32> {
        self.calls.push(args.to_vec());
        let subcommand = args.first().map(String::as_str).unwrap_or("");
        Ok(self.exit_codes.get(subcommand).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps() -> Vec<PlannedStep> {
        vec![
            PlannedStep::new("first", true, ["adapter-readiness"], PathBuf::from("a.md")),
            PlannedStep::new("lint", false, ["consumer-workflow-lint"], PathBuf::from("l.md")),
            PlannedStep::new("second", true, ["phase5-blockers-readiness"], PathBuf::from("b.md")),
            PlannedStep::new("third", true, ["phase5-execution-closure-status"], PathBuf::from("c.md")),
        ]
    }

    #[test]
    fn stop_policy_skips_after_required_failure() {
        let mut runner = RecordingRunner::new().failing("phase5-blockers-readiness", 1);
        let executions = execute_plan(&steps(), &mut runner, HaltPolicy::StopOnRequiredFailure)
            .expect("execute");
        assert_eq!(
            runner.subcommands(),
            vec!["adapter-readiness", "consumer-workflow-lint", "phase5-blockers-readiness"]
        );
        assert_eq!(executions[3].status, StepStatus::Skipped);
        assert_eq!(executions[3].exit_code, None);
        assert_eq!(required_failures(&executions), vec!["second"]);
    }

    #[test]
    fn optional_failure_never_halts() {
        let mut runner = RecordingRunner::new().failing("consumer-workflow-lint", 1);
        let executions = execute_plan(&steps(), &mut runner, HaltPolicy::StopOnRequiredFailure)
            .expect("execute");
        assert_eq!(runner.calls.len(), 4);
        assert!(required_failures(&executions).is_empty());
        assert_eq!(optional_failures(&executions), vec!["lint"]);
    }

    #[test]
    fn run_all_policy_keeps_going() {
        let mut runner = RecordingRunner::new().failing("adapter-readiness", 2);
        let executions = execute_plan(&steps(), &mut runner, HaltPolicy::RunAll).expect("execute");
        assert_eq!(runner.calls.len(), 4);
        assert_eq!(executions[0].exit_code, Some(2));
    }

    #[test]
    fn executions_render_as_table() {
        let mut runner = RecordingRunner::new();
        let executions = execute_plan(&steps()[..1], &mut runner, HaltPolicy::RunAll).expect("execute");
        let mut doc = MarkdownDoc::new("T");
        render_executions(&mut doc, &executions);
        assert!(doc
            .finish()
            .contains("| first | yes | 0 | passed | `a.md` |"));
    }
}
