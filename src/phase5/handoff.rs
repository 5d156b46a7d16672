//! Phase 5 external handoff packet.
use super::{verdict_is, MISSING_BLOCKERS_REPORT, MISSING_UNBLOCK_REPORT};
use crate::cli::HandoffArgs;
use crate::context::{RunContext, RunOutcome};
use crate::markdown::MarkdownDoc;
use crate::report::{write_report, LoadedReport, ReportEnvelope};
use crate::util::{dedupe, section_body, yes_no};
use crate::verdict::{or_unknown, Assessment, Summary, Verdict};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const KIND: &str = "phase5-external-handoff";
pub const MISSING_STATUS_REPORT: &str = "Missing Phase 5 execution closure status report";
pub const MISSING_MOCK_AB_REPORT: &str = "Missing mock consumer A/B report";
const NO_ARTIFACT_URLS: &str = "No artifact URLs were provided";

/// One input report: whether it was found and the verdict it carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandoffInput {
    pub exists: bool,
    pub verdict: Option<String>,
}

impl HandoffInput {
    fn from_report(report: &LoadedReport) -> Self {
        Self {
            exists: report.exists(),
            verdict: report.verdict(),
        }
    }

    fn verdict(&self) -> &str {
        or_unknown(self.verdict.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct HandoffInputs {
    pub phase5_status: HandoffInput,
    pub phase5_blockers: HandoffInput,
    pub consumer_unblock: HandoffInput,
    pub mock_ab: HandoffInput,
    pub run_report: HandoffInput,
    pub artifact_urls: Vec<String>,
    pub require_artifact_urls: bool,
    pub require_mock_ab_report: bool,
}

pub fn summarize_handoff(inputs: &HandoffInputs) -> Summary {
    let mut assessment = Assessment::new();
    assessment.require(inputs.phase5_status.exists, MISSING_STATUS_REPORT);
    assessment.require(inputs.phase5_blockers.exists, MISSING_BLOCKERS_REPORT);
    assessment.require(inputs.consumer_unblock.exists, MISSING_UNBLOCK_REPORT);
    assessment.require(
        !inputs.require_mock_ab_report || inputs.mock_ab.exists,
        MISSING_MOCK_AB_REPORT,
    );

    let checks = [
        (&inputs.phase5_status, Verdict::Ready, "Phase 5 execution closure status"),
        (&inputs.phase5_blockers, Verdict::Ready, "Phase 5 blockers readiness"),
        (&inputs.consumer_unblock, Verdict::ReadyForRetest, "Consumer startup unblock"),
    ];
    for (input, expected, label) in checks {
        if input.exists && !verdict_is(input.verdict.as_deref(), expected) {
            assessment.block(format!("{label} verdict is {}", input.verdict()));
        }
    }

    if inputs.mock_ab.exists && !verdict_is(inputs.mock_ab.verdict.as_deref(), Verdict::Ready) {
        if inputs.require_mock_ab_report {
            assessment.block(format!("Mock consumer A/B verdict is {}", inputs.mock_ab.verdict()));
        } else {
            assessment.warn(format!(
                "Mock consumer A/B verdict is {} (not required in current mode)",
                inputs.mock_ab.verdict()
            ));
        }
    }
    if inputs.run_report.exists && !verdict_is(inputs.run_report.verdict.as_deref(), Verdict::Ready) {
        assessment.warn(format!(
            "Phase 5 closure run report verdict is {}",
            inputs.run_report.verdict()
        ));
    }

    if inputs.artifact_urls.is_empty() {
        if inputs.require_artifact_urls {
            assessment.block(NO_ARTIFACT_URLS);
        } else {
            assessment.warn(format!(
                "{NO_ARTIFACT_URLS} (recommended before external handoff)"
            ));
        }
    }

    assessment.resolve(Verdict::Ready, Verdict::MissingInputs)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedHandoff {
    pub verdict: Option<String>,
    pub artifact_urls: Vec<String>,
}

pub fn parse_handoff(markdown: &str) -> ParsedHandoff {
    let artifact_urls = section_body(markdown, "## Artifact URLs")
        .map(|body| {
            body.lines()
                .filter_map(|line| line.trim().strip_prefix("- "))
                .map(str::trim)
                .filter(|url| *url != "none")
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    ParsedHandoff {
        verdict: crate::report::parse_verdict_from_markdown(markdown),
        artifact_urls,
    }
}

pub struct HandoffReport<'a> {
    pub generated_at: &'a str,
    pub repo: &'a str,
    pub args: &'a HandoffArgs,
    pub inputs: &'a HandoffInputs,
    pub summary: &'a Summary,
}

pub fn render_handoff(report: &HandoffReport<'_>) -> String {
    let HandoffReport { args, inputs, summary, .. } = report;
    let mut doc = MarkdownDoc::new("Phase 5 External Handoff Report");
    doc.field("generated_at", report.generated_at);
    doc.code_field("target_repo", report.repo);
    doc.field("verdict", summary.verdict);

    doc.section("Inputs");
    doc.input("phase5_status_report", &args.phase5_status_report.display().to_string(), inputs.phase5_status.exists);
    doc.input(
        "phase5_blockers_report",
        &args.phase5_blockers_report.display().to_string(),
        inputs.phase5_blockers.exists,
    );
    doc.input(
        "consumer_unblock_report",
        &args.consumer_unblock_report.display().to_string(),
        inputs.consumer_unblock.exists,
    );
    doc.input("mock_ab_report", &args.mock_ab_report.display().to_string(), inputs.mock_ab.exists);
    doc.input("run_report", &args.run_report.display().to_string(), inputs.run_report.exists);
    doc.field("require_mock_ab_report", yes_no(inputs.require_mock_ab_report));
    doc.field("require_artifact_urls", yes_no(inputs.require_artifact_urls));

    doc.section("Parsed Verdicts");
    doc.field("phase5_status", inputs.phase5_status.verdict());
    doc.field("phase5_blockers", inputs.phase5_blockers.verdict());
    doc.field("consumer_unblock", inputs.consumer_unblock.verdict());
    doc.field("mock_ab", inputs.mock_ab.verdict());
    doc.field("phase5_run_report", inputs.run_report.verdict());

    doc.section("Artifact URLs");
    doc.bullets_or_none(&inputs.artifact_urls);

    doc.section("Missing Inputs");
    doc.bullets_or_none(&summary.missing_inputs);
    doc.section("Blockers");
    doc.bullets_or_none(&summary.blockers);
    doc.section("Warnings");
    doc.bullets_or_none(&summary.warnings);

    doc.section("Next Actions");
    match summary.verdict {
        Verdict::Ready => {
            doc.bullet("Share this report and the linked artifacts with the external consumer team.");
            doc.bullet("Record the handoff in the rollout tracker.");
        }
        Verdict::MissingInputs => {
            doc.bullet("Run `vtriage phase5-execution-closure --repo <owner>/<repo>` to regenerate the phase 5 reports.");
            if inputs.require_mock_ab_report && !inputs.mock_ab.exists {
                doc.bullet("Generate the mock A/B report: `vtriage mock-consumer-ab-report`.");
            }
        }
        _ => {
            if inputs.require_artifact_urls && inputs.artifact_urls.is_empty() {
                doc.bullet("Pass at least one `--artifact-url` for the CI runs backing this handoff.");
            }
            doc.bullet("Resolve the blockers above and rerun `vtriage phase5-external-handoff`.");
        }
    }
    doc.finish()
}

fn load_input(ctx: &RunContext, path: &Path) -> Result<HandoffInput> {
    Ok(HandoffInput::from_report(&LoadedReport::load(&ctx.resolve(path))?))
}

pub fn run(ctx: &RunContext, args: &HandoffArgs) -> Result<RunOutcome> {
    let inputs = HandoffInputs {
        phase5_status: load_input(ctx, &args.phase5_status_report)?,
        phase5_blockers: load_input(ctx, &args.phase5_blockers_report)?,
        consumer_unblock: load_input(ctx, &args.consumer_unblock_report)?,
        mock_ab: load_input(ctx, &args.mock_ab_report)?,
        run_report: load_input(ctx, &args.run_report)?,
        artifact_urls: dedupe(
            args.artifact_urls
                .iter()
                .map(|url| url.trim())
                .filter(|url| !url.is_empty()),
        ),
        require_artifact_urls: args.require_artifact_urls,
        require_mock_ab_report: args.require_mock_ab_report,
    };
    let summary = summarize_handoff(&inputs);
    let markdown = render_handoff(&HandoffReport {
        generated_at: &ctx.generated_at,
        repo: &args.repo,
        args,
        inputs: &inputs,
        summary: &summary,
    });
    let facts = ParsedHandoff {
        verdict: Some(summary.verdict.as_str().to_string()),
        artifact_urls: inputs.artifact_urls.clone(),
    };
    let envelope = ReportEnvelope::from_summary(KIND, &ctx.generated_at, &summary, &facts)?;
    let out = ctx.resolve(&args.out);
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!(
            "phase5 external handoff generated at {} (verdict={})",
            out.display(),
            summary.verdict
        ),
        summary.verdict.exit_code(),
    ))
}
