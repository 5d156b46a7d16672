//! Mock consumer A/B report: block and minimal smoke runs plus their evidence.
use super::{
    assess_evidence, assess_smoke_summary, parse_smoke_mode, EvidenceAssessment, SmokeAssessment,
    SmokeMode,
};
use crate::cli::MockAbArgs;
use crate::context::{RunContext, RunOutcome};
use crate::markdown::MarkdownDoc;
use crate::report::{read_if_exists, write_report, ReportEnvelope};
use crate::util::{found_missing, labeled_value};
use crate::verdict::{Assessment, Summary, Verdict};
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const KIND: &str = "mock-consumer-ab";

fn pass_fail(value: bool) -> &'static str {
    if value {
        "PASS"
    } else {
        "FAIL"
    }
}

fn mode_label(mode: SmokeMode) -> &'static str {
    match mode {
        SmokeMode::Block => "Block",
        SmokeMode::Minimal => "Minimal",
    }
}

fn evidence_blocker(mode: SmokeMode, evidence: &EvidenceAssessment) -> Option<String> {
    if evidence.is_healthy() {
        return None;
    }
    let label = mode_label(mode);
    let message = if !evidence.exists {
        format!("{label} mode ai_evidence file is missing")
    } else if evidence.parse_error.is_some() {
        format!("{label} mode ai_evidence file is not valid JSON")
    } else {
        format!("{label} mode ai_evidence does not expose expected v2.1 snapshot metadata")
    };
    Some(message)
}

pub struct AbInputs<'a> {
    pub block: &'a SmokeAssessment,
    pub minimal: &'a SmokeAssessment,
    pub block_evidence: &'a EvidenceAssessment,
    pub minimal_evidence: &'a EvidenceAssessment,
    /// Smoke mode each summary says it was produced with.
    pub recorded_modes: [Option<&'a str>; 2],
}

pub fn summarize_ab(inputs: &AbInputs<'_>) -> Summary {
    let mut assessment = Assessment::new();
    assessment.block_if(
        !inputs.block.is_expected(),
        "Package smoke block mode summary is not in expected blocking state",
    );
    assessment.block_if(
        !inputs.minimal.is_expected(),
        "Package smoke minimal mode summary is not in expected pass state",
    );
    for (mode, evidence) in [
        (SmokeMode::Block, inputs.block_evidence),
        (SmokeMode::Minimal, inputs.minimal_evidence),
    ] {
        if let Some(blocker) = evidence_blocker(mode, evidence) {
            assessment.block(blocker);
        }
    }
    for (mode, recorded) in [SmokeMode::Block, SmokeMode::Minimal]
        .into_iter()
        .zip(inputs.recorded_modes)
    {
        if let Some(recorded) = recorded.filter(|recorded| *recorded != mode.as_str()) {
            assessment.warn(format!(
                "{} summary records smoke mode `{recorded}`",
                mode_label(mode)
            ));
        }
    }
    assessment.resolve(Verdict::Ready, Verdict::MissingInputs)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMockAbReport {
    pub verdict: Option<String>,
    pub smoke_block_expected: bool,
    pub smoke_minimal_expected: bool,
    pub evidence_healthy: bool,
}

pub fn parse_mock_ab_report(markdown: &str) -> ParsedMockAbReport {
    let passed = |label: &str| labeled_value(markdown, label).is_some_and(|value| value == "PASS");
    ParsedMockAbReport {
        verdict: crate::report::parse_verdict_from_markdown(markdown),
        smoke_block_expected: passed("smoke_block_expected"),
        smoke_minimal_expected: passed("smoke_minimal_expected"),
        evidence_healthy: passed("evidence_schema_v2_1"),
    }
}

fn or_missing(value: Option<&str>) -> &str {
    value.unwrap_or("missing")
}

pub fn render_ab_report(
    generated_at: &str,
    repo: &str,
    inputs: &AbInputs<'_>,
    summary: &Summary,
) -> String {
    let mut doc = MarkdownDoc::new("Mock Consumer A/B Validation Report");
    doc.field("generated_at", generated_at);
    doc.code_field("target_repo", repo);
    doc.field("source", "local_mock_consumer_validation");
    doc.field("verdict", summary.verdict);

    doc.section("Inputs");
    doc.input("block_summary", &inputs.block.file, inputs.block.exists);
    doc.input("minimal_summary", &inputs.minimal.file, inputs.minimal.exists);
    doc.input("block_evidence", &inputs.block_evidence.file, inputs.block_evidence.exists);
    doc.input(
        "minimal_evidence",
        &inputs.minimal_evidence.file,
        inputs.minimal_evidence.exists,
    );

    doc.section("Assertions");
    doc.field("smoke_block_expected", pass_fail(inputs.block.is_expected()));
    doc.field("smoke_minimal_expected", pass_fail(inputs.minimal.is_expected()));
    doc.field(
        "evidence_schema_v2_1",
        pass_fail(inputs.block_evidence.is_healthy() && inputs.minimal_evidence.is_healthy()),
    );
    for (mode, evidence) in [
        (SmokeMode::Block, inputs.block_evidence),
        (SmokeMode::Minimal, inputs.minimal_evidence),
    ] {
        let prefix = mode.as_str();
        doc.field(&format!("{prefix}_evidence_version"), or_missing(evidence.version.as_deref()));
        doc.field(&format!("{prefix}_evidence_snapshot_stage"), or_missing(evidence.stage.as_deref()));
        doc.field(
            &format!("{prefix}_evidence_snapshot_outcome"),
            or_missing(evidence.outcome.as_deref()),
        );
        if let Some(err) = &evidence.parse_error {
            doc.field(&format!("{prefix}_evidence_parse_error"), err);
        }
    }

    doc.section("Smoke Stages");
    let rows: Vec<Vec<String>> = [inputs.block, inputs.minimal]
        .iter()
        .flat_map(|assessment| {
            assessment.stages.iter().map(move |stage| {
                vec![
                    assessment.mode.as_str().to_string(),
                    stage.label.clone(),
                    stage
                        .exit_code
                        .map_or_else(|| "-".to_string(), |code| code.to_string()),
                    stage.outcome.clone().unwrap_or_else(|| "-".to_string()),
                ]
            })
        })
        .collect();
    if rows.is_empty() {
        doc.bullet("none");
    } else {
        doc.table(&["mode", "stage", "exit_code", "outcome"], &rows);
    }

    doc.section("Blockers");
    doc.bullets_or_none(&summary.blockers);
    doc.section("Warnings");
    doc.bullets_or_none(&summary.warnings);

    doc.section("Next Actions");
    if summary.verdict == Verdict::Ready {
        doc.bullet("Mock consumer A/B validation is stable and ready for rollout evidence.");
    } else {
        for mode in [SmokeMode::Block, SmokeMode::Minimal] {
            doc.bullet(format!(
                "Regenerate the {} smoke summary: `vtriage package-smoke --mode {}`",
                mode.as_str(),
                mode.as_str()
            ));
        }
        doc.bullet("Ensure each mode copies `.ai_evidence.json` following the v2.1 schema.");
    }
    doc.finish()
}

pub fn run(ctx: &RunContext, args: &MockAbArgs) -> Result<RunOutcome> {
    let labels: Vec<&str> = ctx.config.smoke.stages.iter().map(|stage| stage.id.as_str()).collect();
    let block_text = read_if_exists(&ctx.resolve(&args.block_summary))?;
    let minimal_text = read_if_exists(&ctx.resolve(&args.minimal_summary))?;
    let block = assess_smoke_summary(
        SmokeMode::Block,
        &args.block_summary.display().to_string(),
        block_text.as_deref(),
        &labels,
    );
    let minimal = assess_smoke_summary(
        SmokeMode::Minimal,
        &args.minimal_summary.display().to_string(),
        minimal_text.as_deref(),
        &labels,
    );
    let block_evidence = assess_evidence(
        &ctx.resolve(&args.block_evidence),
        &args.block_evidence.display().to_string(),
    )?;
    let minimal_evidence = assess_evidence(
        &ctx.resolve(&args.minimal_evidence),
        &args.minimal_evidence.display().to_string(),
    )?;
    let block_mode = block_text.as_deref().and_then(parse_smoke_mode);
    let minimal_mode = minimal_text.as_deref().and_then(parse_smoke_mode);
    let inputs = AbInputs {
        block: &block,
        minimal: &minimal,
        block_evidence: &block_evidence,
        minimal_evidence: &minimal_evidence,
        recorded_modes: [block_mode.as_deref(), minimal_mode.as_deref()],
    };

    let summary = summarize_ab(&inputs);
    let out = ctx.resolve(&args.out);
    if args.dry_run {
        return Ok(RunOutcome::new(
            format!(
                "mock consumer A/B report dry-run (verdict={}, out={}, block_summary={}, minimal_summary={})",
                summary.verdict,
                out.display(),
                found_missing(block.exists),
                found_missing(minimal.exists)
            ),
            summary.verdict.exit_code(),
        ));
    }

    let markdown = render_ab_report(&ctx.generated_at, &args.repo, &inputs, &summary);
    let facts = ParsedMockAbReport {
        verdict: Some(summary.verdict.as_str().to_string()),
        smoke_block_expected: block.is_expected(),
        smoke_minimal_expected: minimal.is_expected(),
        evidence_healthy: block_evidence.is_healthy() && minimal_evidence.is_healthy(),
    };
    let envelope = ReportEnvelope::from_summary(KIND, &ctx.generated_at, &summary, &facts)?;
    write_report(&out, &markdown, &envelope)?;
    Ok(RunOutcome::new(
        format!(
            "mock consumer A/B report generated at {} (verdict={})",
            out.display(),
            summary.verdict
        ),
        summary.verdict.exit_code(),
    ))
}
