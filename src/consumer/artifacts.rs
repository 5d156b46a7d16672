//! Recent consumer workflow runs with their artifacts.
use super::gh;
use super::{ArtifactList, RunMetadata, WorkflowRun};
use crate::cli::ConsumerCiArtifactsArgs;
use crate::context::{RunContext, RunOutcome};
use crate::exec::RunOptions;
use crate::markdown::MarkdownDoc;
use crate::report::{write_report, ReportEnvelope};
use crate::util::labeled_count;
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const KIND: &str = "consumer-ci-artifacts";

#[derive(Debug, Clone, PartialEq)]
pub struct RunArtifacts {
    pub run: WorkflowRun,
    pub metadata: Option<RunMetadata>,
    pub artifacts: Option<ArtifactList>,
    pub error: Option<String>,
}

impl RunArtifacts {
    fn workflow_label(&self) -> String {
        if !self.run.workflow_name.is_empty() {
            return self.run.workflow_name.clone();
        }
        match &self.metadata {
            Some(meta) if !meta.name.is_empty() => meta.name.clone(),
            Some(meta) if !meta.path.is_empty() => meta.path.clone(),
            _ => "(unknown)".to_string(),
        }
    }

    fn artifacts_cell(&self) -> String {
        match &self.error {
            Some(err) => format!("error: {err}"),
            None => self
                .artifacts
                .as_ref()
                .map_or(0, |list| list.total_count)
                .to_string(),
        }
    }
}

fn megabytes(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / (1024.0 * 1024.0))
}

pub fn render_artifact_report(generated_at: &str, repo: &str, entries: &[RunArtifacts]) -> String {
    let startup_failures = entries
        .iter()
        .filter(|entry| entry.run.is_startup_failure())
        .count();

    let mut doc = MarkdownDoc::new("Consumer CI Artifact Report");
    doc.field("generated_at", generated_at);
    doc.code_field("repo", repo);
    doc.field("runs_checked", entries.len());

    doc.section("Summary");
    doc.field("startup_failure_runs", startup_failures);
    doc.field("non_startup_failure_runs", entries.len() - startup_failures);

    doc.section("Runs");
    doc.table(
        &["run_id", "workflow", "event", "branch", "status", "conclusion", "artifacts", "url"],
        &[],
    );
    // Sub-bullets interleave with table rows, so rows are emitted one by one.
    for entry in entries {
        let run = &entry.run;
        doc.line(format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} |",
            run.database_id,
            entry.workflow_label(),
            run.event,
            run.head_branch,
            run.status,
            run.conclusion_label(),
            entry.artifacts_cell(),
            run.url
        ));
        let artifacts = entry.artifacts.as_ref().map(|list| list.artifacts.as_slice());
        match (artifacts, &entry.metadata) {
            (Some(list), _) if !list.is_empty() => {
                for artifact in list {
                    doc.line(format!(
                        "  - artifact `{}` id={} size_mb={} expired={} expires_at={}",
                        artifact.name,
                        artifact.id,
                        megabytes(artifact.size_in_bytes),
                        artifact.expired,
                        artifact.expires_at
                    ));
                    doc.line(format!("    - download_url: {}", artifact.archive_download_url));
                }
            }
            (_, Some(meta)) if meta.conclusion.as_deref() == Some("startup_failure") => {
                doc.line(format!(
                    "  - startup_failure details: path=`{}` referenced_workflows={}",
                    meta.path,
                    meta.referenced_workflows.len()
                ));
            }
            _ => {}
        }
    }
    doc.finish()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedArtifactReport {
    pub runs_checked: Option<u32>,
    pub startup_failure_runs: Option<u32>,
}

pub fn parse_artifact_report(markdown: &str) -> ParsedArtifactReport {
    ParsedArtifactReport {
        runs_checked: labeled_count(markdown, "runs_checked"),
        startup_failure_runs: labeled_count(markdown, "startup_failure_runs"),
    }
}

fn fetch_run(repo: &str, run: WorkflowRun, options: &RunOptions<'_>) -> RunArtifacts {
    let base = format!("repos/{repo}/actions/runs/{}", run.database_id);
    let fetched = gh::api_typed::<RunMetadata>(&base, options).and_then(|metadata| {
        gh::api_typed::<ArtifactList>(&format!("{base}/artifacts"), options)
            .map(|artifacts| (metadata, artifacts))
    });
    match fetched {
        Ok((metadata, artifacts)) => RunArtifacts {
            run,
            metadata: Some(metadata),
            artifacts: Some(artifacts),
            error: None,
        },
        Err(err) => {
            tracing::debug!(run_id = run.database_id, error = %err, "run artifacts unavailable");
            RunArtifacts {
                run,
                metadata: None,
                artifacts: None,
                error: Some(err),
            }
        }
    }
}

pub fn run(ctx: &RunContext, args: &ConsumerCiArtifactsArgs) -> Result<RunOutcome> {
    let options = RunOptions {
        cwd: Some(&ctx.cwd),
        env: &[],
    };
    gh::require_auth(&options)?;
    let runs = gh::run_list(&args.repo, args.limit, &options)?;
    let entries: Vec<RunArtifacts> = runs
        .into_iter()
        .map(|run| fetch_run(&args.repo, run, &options))
        .collect();

    let markdown = render_artifact_report(&ctx.generated_at, &args.repo, &entries);
    let facts = parse_artifact_report(&markdown);
    let envelope = ReportEnvelope::collection(KIND, &ctx.generated_at, &facts)?;
    let out = ctx.resolve(&args.out);
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!("consumer CI artifact report generated at {}", out.display()),
        0,
    ))
}
