//! Report persistence: atomic Markdown writes plus the JSON sidecar.
//!
//! Each report `<name>.md` is accompanied by `<name>.json`, an envelope that
//! carries the verdict and the report kind's typed facts. Readers prefer the
//! sidecar and fall back to the Markdown parser of the same kind, so reports
//! produced by hand or by older tooling still load.
use crate::verdict::Summary;
use anyhow::{Context, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SIDECAR_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub schema_version: u32,
    pub kind: String,
    #[serde(default)]
    pub verdict: Option<String>,
    pub generated_at: String,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub missing_inputs: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub facts: serde_json::Value,
}

impl ReportEnvelope {
    pub fn from_summary<T: Serialize>(
        kind: &str,
        generated_at: &str,
        summary: &Summary,
        facts: &T,
    ) -> Result<Self> {
        Ok(Self {
            schema_version: SIDECAR_SCHEMA_VERSION,
            kind: kind.to_string(),
            verdict: Some(summary.verdict.as_str().to_string()),
            generated_at: generated_at.to_string(),
            blockers: summary.blockers.clone(),
            missing_inputs: summary.missing_inputs.clone(),
            warnings: summary.warnings.clone(),
            facts: serde_json::to_value(facts)
                .with_context(|| format!("serialize {kind} facts"))?,
        })
    }

    /// Envelope for collection reports that carry facts but no verdict.
    pub fn collection<T: Serialize>(kind: &str, generated_at: &str, facts: &T) -> Result<Self> {
        Ok(Self {
            schema_version: SIDECAR_SCHEMA_VERSION,
            kind: kind.to_string(),
            verdict: None,
            generated_at: generated_at.to_string(),
            blockers: Vec::new(),
            missing_inputs: Vec::new(),
            warnings: Vec::new(),
            facts: serde_json::to_value(facts)
                .with_context(|| format!("serialize {kind} facts"))?,
        })
    }
}

pub fn sidecar_path(report_path: &Path) -> PathBuf {
    report_path.with_extension("json")
}

/// Write `bytes` to `path` through a temp file in the same directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("write {}", path.display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("publish {}", path.display()))?;
    Ok(())
}

/// Persist a report and its sidecar.
pub fn write_report(path: &Path, markdown: &str, envelope: &ReportEnvelope) -> Result<()> {
    write_atomic(path, markdown.as_bytes())?;
    let sidecar = sidecar_path(path);
    let bytes = serde_json::to_vec_pretty(envelope).context("serialize report sidecar")?;
    write_atomic(&sidecar, &bytes)?;
    tracing::info!(
        path = %path.display(),
        kind = %envelope.kind,
        verdict = envelope.verdict.as_deref().unwrap_or("-"),
        bytes = markdown.len(),
        "report written"
    );
    Ok(())
}

pub fn read_if_exists(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(Some(text))
}

/// A report read back from disk. Absent files load as `markdown = None`.
#[derive(Debug, Clone, Default)]
pub struct LoadedReport {
    pub path: PathBuf,
    pub markdown: Option<String>,
    pub envelope: Option<ReportEnvelope>,
}

impl LoadedReport {
    pub fn load(path: &Path) -> Result<Self> {
        let markdown = read_if_exists(path)?;
        let envelope = match markdown {
            Some(_) => load_envelope(&sidecar_path(path)),
            None => None,
        };
        Ok(Self {
            path: path.to_path_buf(),
            markdown,
            envelope,
        })
    }

    pub fn exists(&self) -> bool {
        self.markdown.is_some()
    }

    pub fn text(&self) -> &str {
        self.markdown.as_deref().unwrap_or("")
    }

    /// Typed facts for `kind`: sidecar first, Markdown parser second.
    pub fn parse_with<T: DeserializeOwned>(&self, kind: &str, parse: fn(&str) -> T) -> Option<T> {
        let markdown = self.markdown.as_deref()?;
        if let Some(envelope) = self.envelope.as_ref().filter(|env| env.kind == kind) {
            match serde_json::from_value(envelope.facts.clone()) {
                Ok(facts) => return Some(facts),
                Err(err) => tracing::debug!(
                    path = %self.path.display(),
                    error = %err,
                    "sidecar facts unreadable; parsing markdown"
                ),
            }
        }
        Some(parse(markdown))
    }

    /// Verdict token from the sidecar or the `- verdict:` line.
    pub fn verdict(&self) -> Option<String> {
        let markdown = self.markdown.as_deref()?;
        if let Some(verdict) = self.envelope.as_ref().and_then(|env| env.verdict.clone()) {
            return Some(verdict);
        }
        parse_verdict_from_markdown(markdown)
    }
}

fn load_envelope(path: &Path) -> Option<ReportEnvelope> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice::<ReportEnvelope>(&bytes) {
        Ok(envelope) if envelope.schema_version == SIDECAR_SCHEMA_VERSION => Some(envelope),
        Ok(envelope) => {
            tracing::debug!(
                path = %path.display(),
                schema_version = envelope.schema_version,
                "ignoring sidecar with unsupported schema"
            );
            None
        }
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "ignoring invalid sidecar");
            None
        }
    }
}

/// `- verdict: TOKEN` where the token is upper-case letters and underscores.
pub fn parse_verdict_from_markdown(markdown: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^\s*-\s*verdict:\s*([A-Z_]+)").ok()?;
    crate::util::capture_first(&re, markdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::{Assessment, Verdict};
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Facts {
        count: u32,
    }

    fn parse_facts(markdown: &str) -> Facts {
        Facts {
            count: crate::util::labeled_count(markdown, "count").unwrap_or(0),
        }
    }

    #[test]
    fn verdict_parse_requires_upper_case_token() {
        assert_eq!(
            parse_verdict_from_markdown("# X\n- verdict: READY_FOR_RETEST\n").as_deref(),
            Some("READY_FOR_RETEST")
        );
        assert_eq!(parse_verdict_from_markdown("- verdict: ready\n"), None);
        assert_eq!(parse_verdict_from_markdown("no verdict here"), None);
    }

    #[test]
    fn sidecar_wins_over_markdown() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested/report.md");
        let summary = Assessment::new().resolve(Verdict::Ready, Verdict::MissingInputs);
        let envelope =
            ReportEnvelope::from_summary("demo", "2026-01-01T00:00:00.000Z", &summary, &Facts { count: 7 })
                .expect("envelope");
        write_report(&path, "- verdict: BLOCKED\n- count: 1\n", &envelope).expect("write");

        let loaded = LoadedReport::load(&path).expect("load");
        assert!(loaded.exists());
        assert_eq!(loaded.verdict().as_deref(), Some("READY"));
        assert_eq!(loaded.parse_with("demo", parse_facts), Some(Facts { count: 7 }));
        assert_eq!(
            loaded.parse_with("other-kind", parse_facts),
            Some(Facts { count: 1 })
        );
    }

    #[test]
    fn markdown_only_reports_fall_back_to_regex() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("report.md");
        std::fs::write(&path, "- verdict: BLOCKED\n- count: 4\n").expect("write");
        std::fs::write(sidecar_path(&path), "{not json").expect("write sidecar");

        let loaded = LoadedReport::load(&path).expect("load");
        assert_eq!(loaded.verdict().as_deref(), Some("BLOCKED"));
        assert_eq!(loaded.parse_with("demo", parse_facts), Some(Facts { count: 4 }));
    }

    #[test]
    fn absent_report_loads_empty() {
        let dir = TempDir::new().expect("tempdir");
        let loaded = LoadedReport::load(&dir.path().join("missing.md")).expect("load");
        assert!(!loaded.exists());
        assert_eq!(loaded.verdict(), None);
        assert_eq!(loaded.parse_with("demo", parse_facts), None);
    }
}
