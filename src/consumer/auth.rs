//! `gh` auth scope and API permission preflight for a consumer repository.
use super::gh::{self, JsonProbe};
use super::repo_owner;
use crate::cli::ConsumerAuthCheckArgs;
use crate::context::{RunContext, RunOutcome};
use crate::exec::RunOptions;
use crate::markdown::MarkdownDoc;
use crate::report::{write_report, ReportEnvelope};
use crate::util::{labeled_value, section_body};
use crate::verdict::{Assessment, Summary, Verdict};
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const KIND: &str = "consumer-ci-auth";
const SCOPES_PREFIX: &str = "- Token scopes:";

/// Scopes listed on the `- Token scopes:` line of `gh auth status`.
pub fn parse_auth_scopes(auth_status: &str) -> Vec<String> {
    let Some(line) = auth_status
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with(SCOPES_PREFIX))
    else {
        return Vec::new();
    };
    line[SCOPES_PREFIX.len()..]
        .replace('\'', "")
        .split(',')
        .map(str::trim)
        .filter(|scope| !scope.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn missing_scopes(required: &[String], detected: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|scope| !detected.contains(scope))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthCheckInputs {
    pub repo: String,
    pub required_scopes: Vec<String>,
    pub auth_status: std::result::Result<String, String>,
    pub actions_permissions: JsonProbe,
    pub billing: JsonProbe,
}

impl AuthCheckInputs {
    pub fn detected_scopes(&self) -> Vec<String> {
        match &self.auth_status {
            Ok(text) => parse_auth_scopes(text),
            Err(_) => Vec::new(),
        }
    }
}

pub fn evaluate_auth(inputs: &AuthCheckInputs) -> Summary {
    let missing = missing_scopes(&inputs.required_scopes, &inputs.detected_scopes());
    let mut assessment = Assessment::new();
    if let Err(err) = &inputs.auth_status {
        assessment.block(format!("GitHub CLI is not authenticated: {err}"));
    }
    assessment.block_if(
        !missing.is_empty(),
        format!("GitHub token is missing scopes: {}", missing.join(", ")),
    );
    if let Some(err) = &inputs.actions_permissions.error {
        assessment.block(format!("Repository Actions permissions probe failed: {err}"));
    }
    if let Some(err) = &inputs.billing.error {
        assessment.block(format!("Billing probe failed: {err}"));
    }
    assessment.resolve(Verdict::Ready, Verdict::MissingInputs)
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn none_as_empty(value: Option<String>) -> Vec<String> {
    match value.as_deref() {
        None | Some("(none)") => Vec::new(),
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|scope| !scope.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

fn probe_section(doc: &mut MarkdownDoc, heading: &str, probe: &JsonProbe) {
    doc.section(heading);
    match (&probe.data, &probe.error) {
        (Some(data), _) => {
            let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
            doc.fenced("json", &pretty);
        }
        (None, error) => doc.field("error", error.as_deref().unwrap_or("unknown gh command error")),
    }
}

pub fn render_auth_report(generated_at: &str, inputs: &AuthCheckInputs, summary: &Summary) -> String {
    let detected = inputs.detected_scopes();
    let missing = missing_scopes(&inputs.required_scopes, &detected);

    let mut doc = MarkdownDoc::new("Consumer CI Auth Check");
    doc.field("generated_at", generated_at);
    doc.code_field("target_repo", &inputs.repo);
    doc.field("required_scopes", inputs.required_scopes.join(", "));
    doc.field("detected_scopes", list_or_none(&detected));
    doc.field("missing_scopes", list_or_none(&missing));
    doc.field("verdict", summary.verdict);

    doc.section("GH Auth Status");
    match &inputs.auth_status {
        Ok(text) => doc.fenced("text", text),
        Err(err) => doc.field("error", err),
    }
    probe_section(&mut doc, "Repository Actions Permissions Probe", &inputs.actions_permissions);
    probe_section(&mut doc, "Billing Probe", &inputs.billing);

    doc.section("Blockers");
    doc.bullets_or_none(&summary.blockers);

    doc.section("Remediation");
    if summary.verdict == Verdict::Ready {
        doc.bullet("No remediation required.");
    } else {
        if inputs.auth_status.is_err() {
            doc.bullet("Authenticate GitHub CLI: `gh auth login`");
        }
        if missing.iter().any(|scope| scope == "user") {
            doc.bullet("Refresh auth adding `user` scope: `gh auth refresh -h github.com -s user`");
        }
        if !inputs.actions_permissions.ok() {
            doc.bullet(
                "Verify repository Actions settings endpoint: `gh api repos/<owner>/<repo>/actions/permissions`",
            );
        }
        if !inputs.billing.ok() {
            doc.bullet(
                "Re-run billing probe after scope refresh: `gh api users/<owner>/settings/billing/actions`",
            );
        }
    }
    doc.finish()
}

/// What downstream reports need from an auth check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAuthReport {
    pub verdict: Option<String>,
    pub detected_scopes: Vec<String>,
    pub missing_scopes: Vec<String>,
    pub billing_error: Option<String>,
}

impl ParsedAuthReport {
    pub fn missing_user_scope(&self) -> bool {
        self.missing_scopes.iter().any(|scope| scope == "user")
    }
}

pub fn parse_auth_report(markdown: &str) -> ParsedAuthReport {
    let billing_error = section_body(markdown, "## Billing Probe")
        .and_then(|body| labeled_value(body, "error"));
    ParsedAuthReport {
        verdict: crate::report::parse_verdict_from_markdown(markdown),
        detected_scopes: none_as_empty(labeled_value(markdown, "detected_scopes")),
        missing_scopes: none_as_empty(labeled_value(markdown, "missing_scopes")),
        billing_error,
    }
}

pub fn run(ctx: &RunContext, args: &ConsumerAuthCheckArgs) -> Result<RunOutcome> {
    let owner = repo_owner(&args.repo)?;
    let options = RunOptions {
        cwd: Some(&ctx.cwd),
        env: &[],
    };
    let inputs = AuthCheckInputs {
        repo: args.repo.clone(),
        required_scopes: ctx.config.consumer.required_scopes.clone(),
        auth_status: gh::auth_status(&options),
        actions_permissions: gh::api_json(
            &format!("repos/{}/actions/permissions", args.repo),
            &options,
        ),
        billing: gh::api_json(&format!("users/{owner}/settings/billing/actions"), &options),
    };
    let summary = evaluate_auth(&inputs);
    let markdown = render_auth_report(&ctx.generated_at, &inputs, &summary);
    let facts = parse_auth_report(&markdown);
    let envelope = ReportEnvelope::from_summary(KIND, &ctx.generated_at, &summary, &facts)?;
    let out = ctx.resolve(&args.out);
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!(
            "consumer CI auth check report generated at {} (verdict={})",
            out.display(),
            summary.verdict
        ),
        summary.verdict.exit_code(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const AUTH_STATUS: &str = "github.com\n  ✓ Logged in to github.com account qa (keyring)\n  - Token scopes: 'gist', 'read:org', 'repo', 'workflow'\n";

    fn required() -> Vec<String> {
        vec!["repo".to_string(), "workflow".to_string(), "user".to_string()]
    }

    fn inputs() -> AuthCheckInputs {
        AuthCheckInputs {
            repo: "acme/app".to_string(),
            required_scopes: required(),
            auth_status: Ok(AUTH_STATUS.to_string()),
            actions_permissions: JsonProbe::success(json!({"enabled": true, "allowed_actions": "all"})),
            billing: JsonProbe::failure("HTTP 404: Not Found (needs user scope)"),
        }
    }

    #[test]
    fn scopes_are_unquoted_and_split() {
        assert_eq!(
            parse_auth_scopes(AUTH_STATUS),
            vec!["gist", "read:org", "repo", "workflow"]
        );
        assert!(parse_auth_scopes("Logged in\n").is_empty());
    }

    #[test]
    fn missing_user_scope_and_billing_block() {
        let summary = evaluate_auth(&inputs());
        assert_eq!(summary.verdict, Verdict::Blocked);
        assert_eq!(
            summary.blockers,
            vec![
                "GitHub token is missing scopes: user",
                "Billing probe failed: HTTP 404: Not Found (needs user scope)"
            ]
        );
    }

    #[test]
    fn all_probes_ok_is_ready() {
        let mut ready = inputs();
        ready.auth_status = Ok("  - Token scopes: 'repo', 'workflow', 'user'\n".to_string());
        ready.billing = JsonProbe::success(json!({"total_minutes_used": 0}));
        let summary = evaluate_auth(&ready);
        assert_eq!(summary.verdict, Verdict::Ready);
        let markdown = render_auth_report("2026-01-01T00:00:00.000Z", &ready, &summary);
        assert!(markdown.contains("- missing_scopes: (none)"));
        assert!(markdown.contains("- No remediation required."));
    }

    #[test]
    fn rendered_report_parses_back() {
        let inputs = inputs();
        let summary = evaluate_auth(&inputs);
        let markdown = render_auth_report("2026-01-01T00:00:00.000Z", &inputs, &summary);
        assert!(markdown.contains("- target_repo: `acme/app`"));
        assert!(markdown.contains("gh auth refresh -h github.com -s user"));

        let parsed = parse_auth_report(&markdown);
        assert_eq!(parsed.verdict.as_deref(), Some("BLOCKED"));
        assert_eq!(parsed.detected_scopes, vec!["gist", "read:org", "repo", "workflow"]);
        assert_eq!(parsed.missing_scopes, vec!["user"]);
        assert!(parsed.missing_user_scope());
        assert_eq!(
            parsed.billing_error.as_deref(),
            Some("HTTP 404: Not Found (needs user scope)")
        );
    }

    #[test]
    fn unauthenticated_gh_lists_login_remediation() {
        let mut inputs = inputs();
        inputs.auth_status = Err("You are not logged into any GitHub hosts.".to_string());
        let summary = evaluate_auth(&inputs);
        let markdown = render_auth_report("2026-01-01T00:00:00.000Z", &inputs, &summary);
        assert!(markdown.contains("- detected_scopes: (none)"));
        assert!(markdown.contains("- Authenticate GitHub CLI: `gh auth login`"));
        assert!(markdown.contains("## GH Auth Status\n\n- error: You are not logged into any GitHub hosts."));
    }

    #[test]
    fn parser_is_total_on_unrelated_text() {
        assert_eq!(parse_auth_report("hello\n"), ParsedAuthReport::default());
    }
}
