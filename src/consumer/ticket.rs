//! Copy/paste GitHub support ticket built from the support bundle and auth check.
use super::auth::{self, ParsedAuthReport};
use super::support_bundle::{self, ParsedSupportBundle};
use crate::cli::{ConsumerSupportTicketArgs, DEFAULT_REPO_PLACEHOLDER};
use crate::context::{RunContext, RunOutcome};
use crate::markdown::MarkdownDoc;
use crate::report::{write_report, LoadedReport, ReportEnvelope};
use crate::verdict::{or_unknown, Assessment, Summary, Verdict};
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const KIND: &str = "consumer-support-ticket";
pub const MISSING_SUPPORT_BUNDLE: &str = "Missing support bundle report";
pub const MISSING_AUTH_REPORT: &str = "Missing auth report";
const SAMPLE_RUNS: usize = 3;

pub fn summarize_ticket(
    support: Option<&ParsedSupportBundle>,
    auth: Option<&ParsedAuthReport>,
) -> Summary {
    let mut assessment = Assessment::new();
    assessment.require(support.is_some(), MISSING_SUPPORT_BUNDLE);
    assessment.require(auth.is_some(), MISSING_AUTH_REPORT);
    if let Some(support) = support {
        if support.run_urls.is_empty() {
            assessment.warn("Support bundle lists no run URLs; attach them manually.");
        }
    }
    assessment.resolve(Verdict::Ready, Verdict::MissingInputs)
}

fn count_or_unknown(value: Option<u32>) -> String {
    value.map_or_else(|| "unknown".to_string(), |count| count.to_string())
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

pub fn ticket_body(
    repo: &str,
    support: &ParsedSupportBundle,
    auth: &ParsedAuthReport,
) -> String {
    let mut lines = vec![
        format!("Subject: Persistent GitHub Actions startup_failure in {repo}"),
        String::new(),
        format!("Repository: {repo}"),
    ];
    if let Some(visibility) = &support.repo_visibility {
        lines.push(format!("Visibility: {visibility}"));
    }
    lines.push(String::new());
    lines.push("Impact:".to_string());
    lines.push(format!(
        "- startup_failure runs: {}",
        count_or_unknown(support.startup_failure_runs)
    ));
    lines.push(format!(
        "- queued/stalled runs: {}",
        count_or_unknown(support.startup_stalled_runs)
    ));
    lines.push(format!(
        "- jobs.total_count on failing runs: {}",
        count_or_unknown(support.jobs_count)
    ));
    lines.push(format!(
        "- artifacts.total_count on failing runs: {}",
        count_or_unknown(support.artifacts_count)
    ));
    lines.push(String::new());
    lines.push("Auth state:".to_string());
    lines.push(format!("- gh auth verdict: {}", or_unknown(auth.verdict.as_deref())));
    lines.push(format!("- token scopes: {}", list_or_none(&auth.detected_scopes)));
    lines.push(format!("- missing scopes: {}", list_or_none(&auth.missing_scopes)));
    match &auth.billing_error {
        Some(err) => lines.push(format!("- billing probe: unavailable ({err})")),
        None => lines.push("- billing probe: available".to_string()),
    }
    lines.push(String::new());
    lines.push("Sample run URLs:".to_string());
    if support.run_urls.is_empty() {
        lines.push("- (none captured)".to_string());
    }
    for url in support.run_urls.iter().take(SAMPLE_RUNS) {
        lines.push(format!("- {url}"));
    }
    lines.push(String::new());
    lines.push(
        "Observed pattern: runs end in startup_failure or stay queued before any job is created; no jobs or artifacts are produced.".to_string(),
    );
    lines.push(
        "Requested action: please check account and repository level restrictions on private Actions execution (policy, billing, quotas or platform controls) and confirm what blocks job graph creation.".to_string(),
    );
    lines.join("\n")
}

pub struct TicketReport<'a> {
    pub generated_at: &'a str,
    pub repo: &'a str,
    pub support_bundle_path: &'a str,
    pub auth_report_path: &'a str,
    pub support: Option<&'a ParsedSupportBundle>,
    pub auth: Option<&'a ParsedAuthReport>,
    pub summary: &'a Summary,
}

pub fn render_ticket(report: &TicketReport<'_>) -> String {
    let summary = report.summary;
    let mut doc = MarkdownDoc::new("Consumer Support Ticket Draft");
    doc.field("generated_at", report.generated_at);
    doc.code_field("target_repo", report.repo);
    doc.field("verdict", summary.verdict);

    doc.section("Inputs");
    doc.input("support_bundle", report.support_bundle_path, report.support.is_some());
    doc.input("auth_report", report.auth_report_path, report.auth.is_some());

    doc.section("Missing Inputs");
    doc.bullets_or_none(&summary.missing_inputs);
    doc.section("Warnings");
    doc.bullets_or_none(&summary.warnings);

    doc.section("Ticket (Copy/Paste)");
    match (report.support, report.auth) {
        (Some(support), Some(auth)) => doc.fenced("text", &ticket_body(report.repo, support, auth)),
        _ => doc.bullet("Ticket not drafted until every input report exists."),
    }

    doc.section("Next Actions");
    if summary.verdict == Verdict::Ready {
        doc.bullet("Open a GitHub Support ticket and paste the draft above.");
        doc.bullet("Attach the support bundle report to the ticket.");
    } else {
        if report.support.is_none() {
            doc.bullet(format!(
                "Generate the support bundle: `vtriage consumer-support-bundle --repo {}`",
                report.repo
            ));
        }
        if report.auth.is_none() {
            doc.bullet(format!(
                "Generate the auth report: `vtriage consumer-auth-check --repo {}`",
                report.repo
            ));
        }
    }
    doc.finish()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTicket {
    pub verdict: Option<String>,
}

pub fn run(ctx: &RunContext, args: &ConsumerSupportTicketArgs) -> Result<RunOutcome> {
    let support_report = LoadedReport::load(&ctx.resolve(&args.support_bundle))?;
    let auth_report = LoadedReport::load(&ctx.resolve(&args.auth_report))?;
    let support =
        support_report.parse_with(support_bundle::KIND, support_bundle::parse_support_bundle);
    let auth = auth_report.parse_with(auth::KIND, auth::parse_auth_report);
    let repo = args
        .repo
        .clone()
        .or_else(|| support.as_ref().and_then(|bundle| bundle.target_repo.clone()))
        .unwrap_or_else(|| DEFAULT_REPO_PLACEHOLDER.to_string());

    let summary = summarize_ticket(support.as_ref(), auth.as_ref());
    let markdown = render_ticket(&TicketReport {
        generated_at: &ctx.generated_at,
        repo: &repo,
        support_bundle_path: &args.support_bundle.display().to_string(),
        auth_report_path: &args.auth_report.display().to_string(),
        support: support.as_ref(),
        auth: auth.as_ref(),
        summary: &summary,
    });
    let facts = ParsedTicket {
        verdict: Some(summary.verdict.as_str().to_string()),
    };
    let envelope = ReportEnvelope::from_summary(KIND, &ctx.generated_at, &summary, &facts)?;
    let out = ctx.resolve(&args.out);
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!(
            "consumer support ticket draft generated at {} (verdict={})",
            out.display(),
            summary.verdict
        ),
        summary.verdict.exit_code(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn support() -> ParsedSupportBundle {
        ParsedSupportBundle {
            target_repo: Some("acme/app".to_string()),
            repo_visibility: Some("private".to_string()),
            startup_failure_runs: Some(4),
            startup_stalled_runs: Some(0),
            jobs_count: Some(0),
            artifacts_count: Some(0),
            run_urls: (1..=5)
                .map(|id| format!("https://github.com/acme/app/actions/runs/{id}"))
                .collect(),
        }
    }

    fn auth() -> ParsedAuthReport {
        ParsedAuthReport {
            verdict: Some("BLOCKED".to_string()),
            detected_scopes: vec!["repo".to_string(), "workflow".to_string()],
            missing_scopes: vec!["user".to_string()],
            billing_error: Some("HTTP 404".to_string()),
        }
    }

    #[test]
    fn missing_inputs_are_reported_in_order() {
        let summary = summarize_ticket(None, None);
        assert_eq!(summary.verdict, Verdict::MissingInputs);
        assert_eq!(summary.blockers, vec![MISSING_SUPPORT_BUNDLE, MISSING_AUTH_REPORT]);
    }

    #[test]
    fn ticket_keeps_three_sample_urls() {
        let body = ticket_body("acme/app", &support(), &auth());
        assert!(body.starts_with("Subject: Persistent GitHub Actions startup_failure in acme/app"));
        assert!(body.contains("Visibility: private"));
        assert!(body.contains("- startup_failure runs: 4"));
        assert!(body.contains("- billing probe: unavailable (HTTP 404)"));
        assert!(body.contains("/runs/3"));
        assert!(!body.contains("/runs/4"));
    }

    #[test]
    fn ready_ticket_renders_draft() {
        let support = support();
        let auth = auth();
        let summary = summarize_ticket(Some(&support), Some(&auth));
        assert_eq!(summary.verdict, Verdict::Ready);
        let markdown = render_ticket(&TicketReport {
            generated_at: "2026-01-01T00:00:00.000Z",
            repo: "acme/app",
            support_bundle_path: "bundle.md",
            auth_report_path: "auth.md",
            support: Some(&support),
            auth: Some(&auth),
            summary: &summary,
        });
        assert!(markdown.contains("- verdict: READY\n"));
        assert!(markdown.contains("- support_bundle: `bundle.md` (found)"));
        assert!(markdown.contains("```text\nSubject:"));
    }

    #[test]
    fn ticket_samples_only_startup_failure_runs() {
        let bundle = "# Consumer Startup Failure Support Bundle\n\n\
            - target_repo: `acme/app`\n\
            - startup_failure_runs: 1\n\n\
            ## Run Summary\n\n\
            | run_id | workflow | event | branch | status | conclusion | url |\n\
            |---|---|---|---|---|---|---|\n\
            | 11 | CI | push | main | completed | startup_failure | https://github.com/acme/app/actions/runs/11 |\n\
            | 13 | CI | push | main | completed | success | https://github.com/acme/app/actions/runs/13 |\n\n\
            ## Run Diagnostics\n\n\
            - none\n";
        let support = support_bundle::parse_support_bundle(bundle);
        assert_eq!(support.run_urls, vec!["https://github.com/acme/app/actions/runs/11"]);
        let body = ticket_body("acme/app", &support, &auth());
        assert!(body.contains("Sample run URLs:\n- https://github.com/acme/app/actions/runs/11\n"));
        assert!(!body.contains("/actions/runs/13"));
    }

    #[test]
    fn bundle_without_urls_warns() {
        let mut support = support();
        support.run_urls.clear();
        let summary = summarize_ticket(Some(&support), Some(&auth()));
        assert_eq!(summary.verdict, Verdict::Ready);
        assert_eq!(summary.warnings.len(), 1);
    }
}
