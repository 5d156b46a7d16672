//! actionlint run over a consumer checkout.
use crate::cli::ConsumerWorkflowLintArgs;
use crate::context::{RunContext, RunOutcome};
use crate::exec::{run as run_command, RunOptions};
use crate::markdown::MarkdownDoc;
use crate::report::{write_report, ReportEnvelope};
use crate::util::{labeled_value, section_body};
use crate::verdict::{Assessment, Summary, Verdict};
use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const KIND: &str = "consumer-workflow-lint";

fn finding_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\S+:\d+:\d+: .+").expect("regex for lint findings"))
}

/// Lines shaped like `file:line:col: message`.
pub fn lint_findings(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| finding_re().is_match(line))
        .map(str::to_string)
        .collect()
}

pub fn evaluate_lint(exit_code: i32, findings: &[String]) -> Summary {
    let mut assessment = Assessment::new();
    assessment.block_if(
        exit_code != 0,
        format!("actionlint exited with code {exit_code}"),
    );
    assessment.block_if(
        !findings.is_empty(),
        format!("Workflow lint findings present ({})", findings.len()),
    );
    assessment.resolve(Verdict::Ready, Verdict::MissingInputs)
}

pub fn render_lint_report(
    generated_at: &str,
    repo_path: &str,
    actionlint_bin: &str,
    exit_code: i32,
    output: &str,
    summary: &Summary,
) -> String {
    let findings = lint_findings(output);
    let mut doc = MarkdownDoc::new("Consumer Workflow Lint Report");
    doc.field("generated_at", generated_at);
    doc.code_field("repo_path", repo_path);
    doc.code_field("actionlint_bin", actionlint_bin);
    doc.field("exit_code", exit_code);
    doc.field("findings_count", findings.len());
    doc.field("verdict", summary.verdict);

    doc.section("Findings");
    doc.bullets_or_none(&findings);

    doc.section("Raw Output");
    doc.fenced("text", output);
    doc.finish()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedWorkflowLint {
    pub exit_code: Option<i32>,
    pub findings: Vec<String>,
    pub findings_count: usize,
}

/// Reads the exit code and collects finding lines from the raw output, or
/// from the whole text when there is no `## Raw Output` section.
pub fn parse_workflow_lint_report(markdown: &str) -> ParsedWorkflowLint {
    let exit_code = labeled_value(markdown, "exit_code").and_then(|value| value.parse().ok());
    let raw = section_body(markdown, "## Raw Output").unwrap_or(markdown);
    let findings = crate::util::dedupe(lint_findings(raw));
    ParsedWorkflowLint {
        exit_code,
        findings_count: findings.len(),
        findings,
    }
}

pub fn run(ctx: &RunContext, args: &ConsumerWorkflowLintArgs) -> Result<RunOutcome> {
    let repo_path = ctx.resolve(&args.repo_path);
    if !repo_path.is_dir() {
        return Err(anyhow!("Repository path not found: {}", repo_path.display()));
    }
    let output = run_command(
        &args.actionlint_bin,
        &[],
        &RunOptions {
            cwd: Some(&repo_path),
            env: &[],
        },
    );
    let combined = output.combined();
    let summary = evaluate_lint(output.exit_code, &lint_findings(&combined));
    let markdown = render_lint_report(
        &ctx.generated_at,
        &repo_path.display().to_string(),
        &args.actionlint_bin,
        output.exit_code,
        &combined,
        &summary,
    );
    let facts = parse_workflow_lint_report(&markdown);
    let envelope = ReportEnvelope::from_summary(KIND, &ctx.generated_at, &summary, &facts)?;
    let out = ctx.resolve(&args.out);
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!(
            "consumer workflow lint report generated at {} (verdict={})",
            out.display(),
            summary.verdict
        ),
        summary.verdict.exit_code(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "apps/.github/workflows/ci.yml:10:3: label \"macos-13\" is unknown [runner-label]\napps/.github/workflows/lighthouse.yml:20:5: input \"assertions\" is not defined [action]\n";

    #[test]
    fn parses_legacy_report_without_sections() {
        let parsed = parse_workflow_lint_report(&format!(
            "# Consumer Workflow Lint Report\n\n- exit_code: 1\n\n## Raw Output\n\n{OUTPUT}"
        ));
        assert_eq!(parsed.exit_code, Some(1));
        assert_eq!(parsed.findings_count, 2);
    }

    #[test]
    fn findings_block_even_on_zero_exit() {
        let findings = lint_findings(OUTPUT);
        assert_eq!(evaluate_lint(0, &findings).verdict, Verdict::Blocked);
        assert_eq!(evaluate_lint(0, &[]).verdict, Verdict::Ready);
        assert_eq!(
            evaluate_lint(127, &[]).blockers,
            vec!["actionlint exited with code 127"]
        );
    }

    #[test]
    fn rendered_report_round_trips_findings() {
        let findings = lint_findings(OUTPUT);
        let summary = evaluate_lint(1, &findings);
        let markdown = render_lint_report(
            "2026-01-01T00:00:00.000Z",
            "/work/app",
            "actionlint",
            1,
            OUTPUT,
            &summary,
        );
        let parsed = parse_workflow_lint_report(&markdown);
        assert_eq!(parsed.exit_code, Some(1));
        assert_eq!(parsed.findings, findings);
        assert!(markdown.contains("- verdict: BLOCKED"));
    }

    #[test]
    fn parser_is_total() {
        assert_eq!(parse_workflow_lint_report("nothing"), ParsedWorkflowLint::default());
    }
}
