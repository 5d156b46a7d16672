//! Adapter real-session validation report.
//!
//! Reads the session status report plus the hook runtime logs, derives the
//! observed runtime signals and writes the PASS/FAIL validation record that
//! readiness and Phase 5 consume.
use super::session_status::{self, ParsedSessionStatus};
use super::{latest_log, HOOK_LOG, RUNTIME_LOG_PREFIX, SMOKE_LOG_PREFIX, WRITES_LOG};
use crate::cli::AdapterRealSessionArgs;
use crate::context::{RunContext, RunOutcome};
use crate::exec::{run_or_unknown, RunOptions};
use crate::markdown::MarkdownDoc;
use crate::report::{read_if_exists, write_report, LoadedReport, ReportEnvelope};
use crate::util::{head_lines, labeled_value, yes_no};
use crate::verdict::{Summary, Verdict};
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const KIND: &str = "adapter-real-session";
const HOOK_SNIPPET_LINES: usize = 80;
const NODE_MISSING_LABEL: &str = "Any `bash: node: command not found`";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationResult {
    Pass,
    Fail,
}

impl ValidationResult {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationResult::Pass => "PASS",
            ValidationResult::Fail => "FAIL",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "PASS" => Some(ValidationResult::Pass),
            "FAIL" => Some(ValidationResult::Fail),
            _ => None,
        }
    }
}

/// Facts downstream pipelines read from a real-session report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRealSessionReport {
    pub validation_result: Option<ValidationResult>,
    pub re_test_required: Option<bool>,
    pub node_command_not_found: bool,
}

fn parse_yes_no(value: Option<String>) -> Option<bool> {
    match value?.trim().to_ascii_uppercase().as_str() {
        "YES" => Some(true),
        "NO" => Some(false),
        _ => None,
    }
}

pub fn parse_real_session_report(markdown: &str) -> ParsedRealSessionReport {
    let node_command_not_found = parse_yes_no(labeled_value(markdown, NODE_MISSING_LABEL))
        .unwrap_or_else(|| {
            Regex::new(r"(?i)node:\s*command not found").is_ok_and(|re| re.is_match(markdown))
        });
    ParsedRealSessionReport {
        validation_result: labeled_value(markdown, "Validation result")
            .and_then(|value| ValidationResult::parse(&value)),
        re_test_required: parse_yes_no(labeled_value(markdown, "Re-test required")),
        node_command_not_found,
    }
}

/// A log file and its content, when present.
#[derive(Debug, Clone, Default)]
pub struct LogSource {
    pub path: String,
    pub content: Option<String>,
}

impl LogSource {
    fn read(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.display().to_string(),
            content: read_if_exists(path)?,
        })
    }

    fn exists(&self) -> bool {
        self.content.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RealSessionInputs {
    pub status: ParsedSessionStatus,
    pub status_report: Option<String>,
    pub hook_config: Option<String>,
    pub runtime_log: LogSource,
    pub smoke_log: LogSource,
    pub hook_log: LogSource,
    pub writes_log: LogSource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RealSessionSignals {
    pub pre_write_observed: bool,
    pub post_write_observed: bool,
    pub node_bin_resolved: bool,
    pub node_command_missing: bool,
    pub normal_write_triggered: bool,
    pub blocked_write_triggered: bool,
    pub strict_node_triggered: bool,
}

pub fn collect_signals(inputs: &RealSessionInputs) -> RealSessionSignals {
    let corpus = [
        inputs.status_report.as_deref(),
        inputs.runtime_log.content.as_deref(),
        inputs.smoke_log.content.as_deref(),
        inputs.hook_log.content.as_deref(),
        inputs.writes_log.content.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join("\n");
    let matches = |pattern: &str| Regex::new(pattern).is_ok_and(|re| re.is_match(&corpus));
    let hook_log = inputs.hook_log.content.as_deref().unwrap_or("");
    RealSessionSignals {
        pre_write_observed: corpus.contains("pre_write_code"),
        post_write_observed: corpus.contains("post_write_code"),
        node_bin_resolved: matches(r"node_bin\s*="),
        node_command_missing: matches(r"(?:bash:\s*)?node:\s*command not found"),
        normal_write_triggered: hook_log.contains("ALLOWED:"),
        blocked_write_triggered: hook_log.contains("BLOCKED:"),
        strict_node_triggered: inputs.status.strict_assessment_pass,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealSessionEvaluation {
    pub verify_status: &'static str,
    pub install_status: &'static str,
    pub validation_pass: bool,
    pub summary: &'static str,
    pub root_cause: &'static str,
    pub corrective_action: &'static str,
}

impl RealSessionEvaluation {
    pub fn result(&self) -> ValidationResult {
        if self.validation_pass {
            ValidationResult::Pass
        } else {
            ValidationResult::Fail
        }
    }

    pub fn verdict(&self) -> Verdict {
        if self.validation_pass {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

pub fn evaluate(
    signals: &RealSessionSignals,
    status: &ParsedSessionStatus,
    hook_config_exists: bool,
) -> RealSessionEvaluation {
    let verify_status = match status.verify_exit_code {
        None => "UNKNOWN",
        Some(0) => "PASS",
        Some(_) => "FAIL",
    };
    let events_missing = !signals.pre_write_observed || !signals.post_write_observed;
    let validation_pass = verify_status == "PASS"
        && !events_missing
        && !signals.node_command_missing
        && status.strict_assessment_pass;

    let (summary, root_cause, corrective_action) = if validation_pass {
        (
            "Real Adapter session signals look healthy, with strict session assessment passing.",
            "none",
            "No corrective action required. Keep monitoring in regular validation runs.",
        )
    } else if signals.node_command_missing {
        (
            "Runtime still reports missing Node in hook shell environment.",
            "Hook runtime shell cannot resolve Node binary (`node: command not found`).",
            "Fix shell PATH/runtime setup for Adapter hooks and rerun the validation playbook.",
        )
    } else if events_missing {
        (
            "Real pre/post write events were not fully observed in available logs.",
            "Incomplete real IDE event coverage in the captured diagnostics.",
            "Execute full real-session validation steps and capture fresh `.audit_tmp` logs.",
        )
    } else if status.strict_assessment_pass {
        (
            "Strict assessment passed but other required runtime signals are incomplete.",
            "Session-level strict assessment not satisfied with current evidence.",
            "Repeat strict real-session run and verify both pre/post events are captured.",
        )
    } else {
        (
            "Strict real-session assessment is not yet passing.",
            "Session-level strict assessment not satisfied with current evidence.",
            "Repeat strict real-session run and verify both pre/post events are captured.",
        )
    };

    RealSessionEvaluation {
        verify_status,
        install_status: if hook_config_exists { "PASS" } else { "FAIL" },
        validation_pass,
        summary,
        root_cause,
        corrective_action,
    }
}

#[derive(Debug, Clone)]
pub struct RealSessionMetadata {
    pub date: String,
    pub operator: String,
    pub branch: String,
    pub repository: String,
    pub adapter_version: String,
    pub node_runtime: String,
    pub hook_config_path: String,
    pub status_report_path: String,
    pub diagnostic_enabled: bool,
    pub strict_node_enabled: bool,
}

fn pass_fail(value: bool) -> &'static str {
    if value {
        "PASS"
    } else {
        "FAIL"
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}

/// `(missing)` for absent content, `(empty)` for blank tails.
pub fn tail_from_content(content: Option<&str>, lines: usize) -> String {
    let Some(content) = content.filter(|content| !content.is_empty()) else {
        return "(missing)".to_string();
    };
    let tail = crate::util::tail_lines(content, lines);
    if tail.is_empty() {
        "(empty)".to_string()
    } else {
        tail
    }
}

pub fn render_real_session_report(
    meta: &RealSessionMetadata,
    inputs: &RealSessionInputs,
    signals: &RealSessionSignals,
    evaluation: &RealSessionEvaluation,
    tail_lines: usize,
) -> String {
    let mut doc = MarkdownDoc::new("Adapter Hook Runtime - Real Session Report");
    doc.line("_Generated automatically from local status report and runtime logs._");
    doc.field("verdict", evaluation.verdict());

    doc.section("Metadata");
    doc.field("Date", &meta.date);
    doc.field("Operator", &meta.operator);
    doc.field("Branch", &meta.branch);
    doc.field("Repository", &meta.repository);
    doc.field("Adapter version", &meta.adapter_version);
    doc.field("Node runtime", &meta.node_runtime);
    doc.field("Hook config path", &meta.hook_config_path);

    doc.section("Preconditions Check");
    doc.field("`npm run install:adapter-hooks-config`", evaluation.install_status);
    doc.field("`npm run verify:adapter-hooks-runtime`", evaluation.verify_status);
    doc.field("`PUMUKI_HOOK_DIAGNOSTIC=1`", on_off(meta.diagnostic_enabled));
    doc.field("`PUMUKI_HOOK_STRICT_NODE=1`", on_off(meta.strict_node_enabled));

    doc.section("Real Session Steps");
    doc.line(format!(
        "1. Normal write action triggered in Adapter: {}",
        pass_fail(signals.normal_write_triggered)
    ));
    doc.line(format!(
        "2. Blocked candidate write action triggered in Adapter: {}",
        pass_fail(signals.blocked_write_triggered)
    ));
    doc.line(format!(
        "3. Strict-node validation write action triggered: {}",
        pass_fail(signals.strict_node_triggered)
    ));

    doc.section("Observed Runtime Signals");
    doc.field("`pre_write_code` event observed", yes_no(signals.pre_write_observed));
    doc.field("`post_write_code` event observed", yes_no(signals.post_write_observed));
    doc.field("`node_bin` resolved in runtime logs", yes_no(signals.node_bin_resolved));
    doc.field(
        "Missing runtime events",
        yes_no(!signals.pre_write_observed || !signals.post_write_observed),
    );
    doc.field(NODE_MISSING_LABEL, yes_no(signals.node_command_missing));

    doc.section("Captured Evidence");
    doc.field(
        "`hooks.json` snippet attached",
        yes_no(inputs.hook_config.as_deref().is_some_and(|text| !text.is_empty())),
    );
    doc.field("`cascade-hook-runtime-*.log` tail attached", yes_no(inputs.runtime_log.exists()));
    doc.field("`cascade-hook-smoke-*.log` tail attached", yes_no(inputs.smoke_log.exists()));
    doc.field("`cascade-hook.log` tail attached", yes_no(inputs.hook_log.exists()));
    doc.field("`cascade-writes.log` tail attached", yes_no(inputs.writes_log.exists()));

    doc.section("Outcome");
    doc.field("Validation result", evaluation.result().as_str());
    doc.field("Summary", evaluation.summary);
    doc.field("Root cause (if failed)", evaluation.root_cause);
    doc.field("Corrective action", evaluation.corrective_action);
    doc.field("Re-test required", yes_no(!evaluation.validation_pass));

    doc.section("Sources");
    doc.code_field("Status report", &meta.status_report_path);
    doc.field(
        "Parsed status verdict",
        inputs.status.verdict.as_deref().unwrap_or("UNKNOWN"),
    );
    doc.field(
        "Parsed strict assessment pass",
        yes_no(inputs.status.strict_assessment_pass),
    );
    doc.field(
        "Parsed include-simulated assessment pass",
        yes_no(inputs.status.any_assessment_pass),
    );

    doc.section("Attached Snippets");
    doc.subsection("hooks.json snippet");
    let hook_snippet = inputs
        .hook_config
        .as_deref()
        .map_or_else(|| "(missing)".to_string(), |text| head_lines(text, HOOK_SNIPPET_LINES));
    doc.fenced("json", &hook_snippet);
    for log in [
        &inputs.runtime_log,
        &inputs.smoke_log,
        &inputs.hook_log,
        &inputs.writes_log,
    ] {
        doc.subsection(&log.path);
        doc.fenced("text", &tail_from_content(log.content.as_deref(), tail_lines));
    }
    doc.finish()
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|value| value == "1")
}

fn read_inputs(ctx: &RunContext, args: &AdapterRealSessionArgs) -> Result<RealSessionInputs> {
    let status_report = LoadedReport::load(&ctx.resolve(&args.status_report))?;
    let status = status_report
        .parse_with(session_status::KIND, session_status::parse_session_status)
        .unwrap_or_default();
    let hook_config = match dirs::home_dir() {
        Some(home) => read_if_exists(&home.join(&ctx.config.adapter.hook_config))?,
        None => None,
    };
    let audit_dir = ctx.audit_tmp_dir();
    let runtime_path = latest_log(&audit_dir, RUNTIME_LOG_PREFIX)?
        .unwrap_or_else(|| audit_dir.join(format!("{RUNTIME_LOG_PREFIX}*.log")));
    let smoke_path = latest_log(&audit_dir, SMOKE_LOG_PREFIX)?
        .unwrap_or_else(|| audit_dir.join(format!("{SMOKE_LOG_PREFIX}*.log")));
    Ok(RealSessionInputs {
        status,
        status_report: status_report.markdown,
        hook_config,
        runtime_log: LogSource::read(&runtime_path)?,
        smoke_log: LogSource::read(&smoke_path)?,
        hook_log: LogSource::read(&audit_dir.join(HOOK_LOG))?,
        writes_log: LogSource::read(&audit_dir.join(WRITES_LOG))?,
    })
}

pub fn run(ctx: &RunContext, args: &AdapterRealSessionArgs) -> Result<RunOutcome> {
    let inputs = read_inputs(ctx, args)?;
    let signals = collect_signals(&inputs);
    let evaluation = evaluate(&signals, &inputs.status, inputs.hook_config.is_some());

    let options = RunOptions {
        cwd: Some(&ctx.cwd),
        env: &[],
    };
    let meta = RealSessionMetadata {
        date: ctx.generated_at.clone(),
        operator: args.operator.clone(),
        branch: run_or_unknown("git", &["rev-parse", "--abbrev-ref", "HEAD"], &options),
        repository: run_or_unknown("git", &["config", "--get", "remote.origin.url"], &options),
        adapter_version: args.adapter_version.clone(),
        node_runtime: run_or_unknown("node", &["--version"], &options),
        hook_config_path: format!("~/{}", ctx.config.adapter.hook_config),
        status_report_path: args.status_report.display().to_string(),
        diagnostic_enabled: env_flag("PUMUKI_HOOK_DIAGNOSTIC"),
        strict_node_enabled: env_flag("PUMUKI_HOOK_STRICT_NODE"),
    };
    let markdown =
        render_real_session_report(&meta, &inputs, &signals, &evaluation, args.tail_lines as usize);

    let verdict = evaluation.verdict();
    let summary = Summary {
        verdict,
        blockers: if evaluation.validation_pass {
            Vec::new()
        } else {
            vec![evaluation.root_cause.to_string()]
        },
        missing_inputs: Vec::new(),
        warnings: Vec::new(),
    };
    let facts = ParsedRealSessionReport {
        validation_result: Some(evaluation.result()),
        re_test_required: Some(!evaluation.validation_pass),
        node_command_not_found: signals.node_command_missing,
    };
    let envelope = ReportEnvelope::from_summary(KIND, &ctx.generated_at, &summary, &facts)?;
    let out = ctx.resolve(&args.out);
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!(
            "adapter real-session report generated at {} (verdict={verdict})",
            out.display()
        ),
        verdict.exit_code(),
    ))
}

#[cfg(test)]
#[path = "real_session_tests.rs"]
mod tests;
