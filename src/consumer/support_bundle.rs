//! Support bundle for consumer runs that fail or stall before any job starts.
//!
//! Collects auth state, repository Actions policy, the billing probe and a
//! per-run diagnostic (workflow path, job and artifact counts) for every
//! `startup_failure` or stalled run, then ends with a copy/paste payload for a
//! GitHub support ticket.
use super::gh::{self, JsonProbe};
use super::{repo_owner, ArtifactList, RunMetadata, TotalCount, WorkflowRun};
use crate::cli::ConsumerSupportBundleArgs;
use crate::context::{RunContext, RunOutcome};
use crate::exec::RunOptions;
use crate::markdown::MarkdownDoc;
use crate::report::{write_report, ReportEnvelope};
use crate::util::{dedupe, labeled_code_value, labeled_count, labeled_value, section_body};
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const KIND: &str = "consumer-support-bundle";
const SAMPLE_RUNS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoInfo {
    pub full_name: String,
    pub private: bool,
    pub visibility: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsPermissions {
    pub enabled: bool,
    pub allowed_actions: String,
    pub sha_pinning_required: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunDiagnostic {
    pub run: WorkflowRun,
    pub metadata: Option<RunMetadata>,
    pub jobs_count: Option<u64>,
    pub artifacts_count: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupportBundleInputs {
    pub repo: String,
    pub auth_status: String,
    pub repo_info: Option<RepoInfo>,
    pub actions_permissions: std::result::Result<ActionsPermissions, String>,
    pub billing: JsonProbe,
    pub runs: Vec<WorkflowRun>,
    pub diagnostics: Vec<RunDiagnostic>,
}

impl SupportBundleInputs {
    fn startup_failures(&self) -> Vec<&WorkflowRun> {
        self.runs.iter().filter(|run| run.is_startup_failure()).collect()
    }

    fn stalled_runs(&self) -> usize {
        self.runs.iter().filter(|run| run.is_stalled()).count()
    }
}

pub fn render_support_bundle(generated_at: &str, inputs: &SupportBundleInputs) -> String {
    let startup_failures = inputs.startup_failures();
    let stalled = inputs.stalled_runs();

    let mut doc = MarkdownDoc::new("Consumer Startup Failure Support Bundle");
    doc.field("generated_at", generated_at);
    doc.code_field("target_repo", &inputs.repo);
    if let Some(info) = &inputs.repo_info {
        doc.line(format!(
            "- repo_visibility: `{}` (private={})",
            info.visibility, info.private
        ));
    }
    doc.field("runs_checked", inputs.runs.len());
    doc.field("startup_failure_runs", startup_failures.len());
    doc.field("startup_stalled_runs", stalled);

    doc.section("GH Auth Status");
    doc.fenced("text", &inputs.auth_status);

    doc.section("Repository Actions Policy");
    match &inputs.actions_permissions {
        Ok(policy) => {
            doc.field("enabled", policy.enabled);
            doc.field("allowed_actions", &policy.allowed_actions);
            doc.field("sha_pinning_required", policy.sha_pinning_required);
        }
        Err(err) => doc.field("error", err),
    }

    doc.section("Billing Scope Probe");
    match (&inputs.billing.data, &inputs.billing.error) {
        (Some(data), _) => {
            let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
            doc.fenced("json", &pretty);
        }
        (None, Some(err)) => {
            doc.field("error", err);
            doc.bullet("remediation: `gh auth refresh -h github.com -s user` and rerun this command.");
        }
        (None, None) => doc.bullet("not available"),
    }

    doc.section("Run Summary");
    let rows: Vec<Vec<String>> = inputs
        .runs
        .iter()
        .map(|run| {
            vec![
                run.database_id.to_string(),
                run.workflow_label().to_string(),
                run.event.clone(),
                run.head_branch.clone(),
                run.status.clone(),
                run.conclusion_label().to_string(),
                run.url.clone(),
            ]
        })
        .collect();
    doc.table(
        &["run_id", "workflow", "event", "branch", "status", "conclusion", "url"],
        &rows,
    );

    doc.section("Run Diagnostics");
    if inputs.diagnostics.is_empty() {
        doc.bullet("none");
    }
    for diagnostic in &inputs.diagnostics {
        let run = &diagnostic.run;
        doc.subsection(&format!("Run {}", run.database_id));
        doc.field("url", &run.url);
        doc.field("workflowName", run.workflow_label());
        doc.field("event", &run.event);
        doc.field("status", &run.status);
        doc.field("conclusion", run.conclusion_label());
        if let Some(meta) = &diagnostic.metadata {
            doc.field("path", &meta.path);
            doc.field("referenced_workflows", meta.referenced_workflows.len());
        }
        if let Some(jobs) = diagnostic.jobs_count {
            doc.field("jobs.total_count", jobs);
        }
        if let Some(artifacts) = diagnostic.artifacts_count {
            doc.field("artifacts.total_count", artifacts);
        }
        if let Some(err) = &diagnostic.error {
            doc.field("error", err);
        }
    }

    doc.section("Support Payload (Copy/Paste)");
    let mut payload = vec![
        "Persistent GitHub Actions startup_failure in private repository.".to_string(),
        String::new(),
        format!("Repository: {}", inputs.repo),
    ];
    if let Some(info) = &inputs.repo_info {
        payload.push(format!("Visibility: {}", info.visibility));
    }
    if let Ok(policy) = &inputs.actions_permissions {
        payload.push(format!(
            "Repo Actions policy: enabled={}, allowed_actions={}, sha_pinning_required={}",
            policy.enabled, policy.allowed_actions, policy.sha_pinning_required
        ));
    }
    match (&inputs.billing.data, &inputs.billing.error) {
        (Some(_), _) => payload.push("Billing probe: available (see JSON payload in report).".to_string()),
        (None, Some(err)) => payload.push(format!("Billing probe: unavailable ({err}).")),
        (None, None) => {}
    }
    payload.push(format!("Runs checked: {}", inputs.runs.len()));
    payload.push(format!("startup_failure runs: {}", startup_failures.len()));
    payload.push(format!("startup stalled runs: {stalled}"));
    payload.push(String::new());
    payload.push("Sample run URLs:".to_string());
    for run in startup_failures.iter().take(SAMPLE_RUNS) {
        payload.push(format!("- {}", run.url));
    }
    payload.push(String::new());
    payload.push(
        "Observed pattern: workflow startup fails before jobs are created (jobs.total_count=0) and artifacts are absent (artifacts.total_count=0).".to_string(),
    );
    payload.push(
        "Please verify account/repo-level restrictions for private Actions execution (policy, billing, quotas, or platform controls).".to_string(),
    );
    doc.fenced("text", &payload.join("\n"));
    doc.finish()
}

/// Counts and run links a support bundle hands to the ticket and unblock reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSupportBundle {
    pub target_repo: Option<String>,
    pub repo_visibility: Option<String>,
    pub startup_failure_runs: Option<u32>,
    pub startup_stalled_runs: Option<u32>,
    pub jobs_count: Option<u32>,
    pub artifacts_count: Option<u32>,
    pub run_urls: Vec<String>,
}

/// Run Summary row whose conclusion column is `startup_failure`; captures the run URL.
fn startup_failure_row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\|.*\|\s*startup_failure\s*\|\s*(https://github\.com/[^\s|]+/actions/runs/\d+)\s*\|\s*$",
        )
        .expect("regex for startup_failure run rows")
    })
}

pub fn parse_support_bundle(markdown: &str) -> ParsedSupportBundle {
    let run_urls = section_body(markdown, "## Run Summary")
        .map(|table| {
            dedupe(
                startup_failure_row_re()
                    .captures_iter(table)
                    .filter_map(|caps| caps.get(1).map(|url| url.as_str().to_string())),
            )
        })
        .unwrap_or_default();
    ParsedSupportBundle {
        target_repo: labeled_code_value(markdown, "target_repo"),
        repo_visibility: labeled_value(markdown, "repo_visibility")
            .and_then(|value| value.split('`').nth(1).map(str::to_string)),
        startup_failure_runs: labeled_count(markdown, "startup_failure_runs"),
        startup_stalled_runs: labeled_count(markdown, "startup_stalled_runs"),
        jobs_count: labeled_count(markdown, "jobs.total_count"),
        artifacts_count: labeled_count(markdown, "artifacts.total_count"),
        run_urls,
    }
}

fn diagnose_run(repo: &str, run: &WorkflowRun, options: &RunOptions<'_>) -> RunDiagnostic {
    let base = format!("repos/{repo}/actions/runs/{}", run.database_id);
    let mut diagnostic = RunDiagnostic {
        run: run.clone(),
        ..RunDiagnostic::default()
    };
    let mut errors = Vec::new();
    match gh::api_typed::<RunMetadata>(&base, options) {
        Ok(metadata) => diagnostic.metadata = Some(metadata),
        Err(err) => errors.push(format!("metadata: {err}")),
    }
    match gh::api_typed::<TotalCount>(&format!("{base}/jobs"), options) {
        Ok(jobs) => diagnostic.jobs_count = Some(jobs.total_count),
        Err(err) => errors.push(format!("jobs: {err}")),
    }
    match gh::api_typed::<ArtifactList>(&format!("{base}/artifacts"), options) {
        Ok(artifacts) => diagnostic.artifacts_count = Some(artifacts.total_count),
        Err(err) => errors.push(format!("artifacts: {err}")),
    }
    if !errors.is_empty() {
        diagnostic.error = Some(errors.join("; "));
    }
    diagnostic
}

pub fn run(ctx: &RunContext, args: &ConsumerSupportBundleArgs) -> Result<RunOutcome> {
    let owner = repo_owner(&args.repo)?;
    let options = RunOptions {
        cwd: Some(&ctx.cwd),
        env: &[],
    };
    let auth_status = gh::auth_status(&options).unwrap_or_else(|err| format!("error: {err}"));
    let repo_info = gh::api_typed::<RepoInfo>(&format!("repos/{}", args.repo), &options)
        .inspect_err(|err| tracing::debug!(error = %err, "repository info unavailable"))
        .ok();
    let actions_permissions =
        gh::api_typed::<ActionsPermissions>(&format!("repos/{}/actions/permissions", args.repo), &options);
    let billing = gh::api_json(&format!("users/{owner}/settings/billing/actions"), &options);
    let runs = gh::run_list(&args.repo, args.limit, &options)?;
    let diagnostics = runs
        .iter()
        .filter(|run| run.is_startup_failure() || run.is_stalled())
        .map(|run| diagnose_run(&args.repo, run, &options))
        .collect();

    let inputs = SupportBundleInputs {
        repo: args.repo.clone(),
        auth_status,
        repo_info,
        actions_permissions,
        billing,
        runs,
        diagnostics,
    };
    let markdown = render_support_bundle(&ctx.generated_at, &inputs);
    let facts = parse_support_bundle(&markdown);
    let envelope = ReportEnvelope::collection(KIND, &ctx.generated_at, &facts)?;
    let out = ctx.resolve(&args.out);
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!(
            "consumer startup failure support bundle generated at {} (startup_failure_runs={})",
            out.display(),
            facts.startup_failure_runs.unwrap_or(0)
        ),
        0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(id: u64, status: &str, conclusion: Option<&str>) -> WorkflowRun {
        WorkflowRun {
            database_id: id,
            workflow_name: "CI".to_string(),
            status: status.to_string(),
            conclusion: conclusion.map(str::to_string),
            url: format!("https://github.com/acme/app/actions/runs/{id}"),
            event: "push".to_string(),
            head_branch: "main".to_string(),
            ..WorkflowRun::default()
        }
    }

    fn inputs() -> SupportBundleInputs {
        let runs = vec![
            run(11, "completed", Some("startup_failure")),
            run(12, "queued", None),
            run(13, "completed", Some("success")),
        ];
        let diagnostics = vec![
            RunDiagnostic {
                run: runs[0].clone(),
                metadata: Some(RunMetadata {
                    path: ".github/workflows/ci.yml".to_string(),
                    ..RunMetadata::default()
                }),
                jobs_count: Some(0),
                artifacts_count: Some(0),
                error: None,
            },
            RunDiagnostic {
                run: runs[1].clone(),
                metadata: None,
                jobs_count: Some(0),
                artifacts_count: None,
                error: Some("artifacts: HTTP 502".to_string()),
            },
        ];
        SupportBundleInputs {
            repo: "acme/app".to_string(),
            auth_status: "Logged in to github.com".to_string(),
            repo_info: Some(RepoInfo {
                full_name: "acme/app".to_string(),
                private: true,
                visibility: "private".to_string(),
            }),
            actions_permissions: Ok(ActionsPermissions {
                enabled: true,
                allowed_actions: "all".to_string(),
                sha_pinning_required: false,
            }),
            billing: JsonProbe::failure("HTTP 404"),
            runs,
            diagnostics,
        }
    }

    #[test]
    fn bundle_counts_failures_and_stalls() {
        let markdown = render_support_bundle("2026-01-01T00:00:00.000Z", &inputs());
        assert!(markdown.contains("- repo_visibility: `private` (private=true)"));
        assert!(markdown.contains("- runs_checked: 3\n- startup_failure_runs: 1\n- startup_stalled_runs: 1"));
        assert!(markdown.contains("### Run 11\n\n- url: https://github.com/acme/app/actions/runs/11"));
        assert!(markdown.contains("- error: artifacts: HTTP 502"));
        assert!(markdown.contains("Billing probe: unavailable (HTTP 404)."));
        assert!(markdown.contains("Sample run URLs:\n- https://github.com/acme/app/actions/runs/11\n"));
    }

    #[test]
    fn rendered_bundle_parses_back() {
        let parsed = parse_support_bundle(&render_support_bundle("2026-01-01T00:00:00.000Z", &inputs()));
        assert_eq!(parsed.target_repo.as_deref(), Some("acme/app"));
        assert_eq!(parsed.repo_visibility.as_deref(), Some("private"));
        assert_eq!(parsed.startup_failure_runs, Some(1));
        assert_eq!(parsed.startup_stalled_runs, Some(1));
        assert_eq!(parsed.jobs_count, Some(0));
        assert_eq!(parsed.artifacts_count, Some(0));
        assert_eq!(parsed.run_urls, vec!["https://github.com/acme/app/actions/runs/11"]);
    }

    #[test]
    fn billing_json_is_embedded() {
        let mut inputs = inputs();
        inputs.billing = JsonProbe::success(json!({"total_minutes_used": 12}));
        let markdown = render_support_bundle("2026-01-01T00:00:00.000Z", &inputs);
        assert!(markdown.contains("```json\n{\n  \"total_minutes_used\": 12\n}\n```"));
        assert!(markdown.contains("Billing probe: available (see JSON payload in report)."));
    }

    #[test]
    fn parser_is_total() {
        assert_eq!(parse_support_bundle("unrelated"), ParsedSupportBundle::default());
    }
}
