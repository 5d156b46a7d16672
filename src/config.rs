//! Tool configuration and the hard-mode toggle.
//!
//! Both files are optional JSON under `.pumuki/`. A missing tool config
//! means defaults; an explicitly named one must exist and validate.
use crate::adapter::session_status::{ANY_LABEL, STRICT_LABEL, VERIFY_LABEL};
use crate::report::write_atomic;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_CONFIG_REL: &str = ".pumuki/validation-triage.json";
pub const HARD_MODE_REL: &str = ".pumuki/hard-mode.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TriageConfig {
    pub schema_version: u32,
    pub audit_tmp_dir: String,
    pub adapter: AdapterConfig,
    pub consumer: ConsumerConfig,
    pub smoke: SmokeConfig,
    pub clean_targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdapterConfig {
    /// Hook config location relative to the home directory.
    pub hook_config: String,
    pub session_commands: Vec<SessionCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionCommand {
    pub label: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsumerConfig {
    pub required_scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmokeConfig {
    /// Directory packed with `npm pack`, relative to the working directory.
    pub package_dir: String,
    /// Fixture tree with `baseline/`, `range/<mode>/` and `staged/<mode>/`.
    pub fixtures_dir: String,
    pub stages: Vec<SmokeStage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmokeStage {
    pub id: String,
    /// Stage name expected in the evidence snapshot.
    pub stage: String,
    pub command: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for TriageConfig {
    fn default() -> Self {
        default_config()
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        default_config().adapter
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        default_config().consumer
    }
}

impl Default for SmokeConfig {
    fn default() -> Self {
        default_config().smoke
    }
}

fn session_command(label: &str, script: &str) -> SessionCommand {
    SessionCommand {
        label: label.to_string(),
        command: format!("npm run -s {script}"),
    }
}

fn smoke_stage(id: &str, stage: &str, bin: &str, env: &[(&str, &str)]) -> SmokeStage {
    SmokeStage {
        id: id.to_string(),
        stage: stage.to_string(),
        command: format!("npx --yes {bin}"),
        env: env
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    }
}

pub fn default_config() -> TriageConfig {
    TriageConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        audit_tmp_dir: ".audit_tmp".to_string(),
        adapter: AdapterConfig {
            hook_config: ".codeium/adapter/hooks.json".to_string(),
            session_commands: vec![
                session_command(VERIFY_LABEL, "verify:adapter-hooks-runtime"),
                session_command(STRICT_LABEL, "assess:adapter-hooks-session"),
                session_command(ANY_LABEL, "assess:adapter-hooks-session:any"),
            ],
        },
        consumer: ConsumerConfig {
            required_scopes: vec!["repo".into(), "workflow".into(), "user".into()],
        },
        smoke: SmokeConfig {
            package_dir: ".".to_string(),
            fixtures_dir: ".pumuki/smoke-fixtures".to_string(),
            stages: vec![
                smoke_stage("pre-commit", "PRE_COMMIT", "pumuki-pre-commit", &[]),
                smoke_stage("pre-push", "PRE_PUSH", "pumuki-pre-push", &[]),
                smoke_stage("ci", "CI", "pumuki-ci", &[("GITHUB_BASE_REF", "main")]),
            ],
        },
        clean_targets: vec![".audit-reports".to_string(), ".audit_tmp".to_string()],
    }
}

/// Load the tool config: the explicit path, else the default location, else defaults.
pub fn load_config(cwd: &Path, explicit: Option<&Path>) -> Result<TriageConfig> {
    let (path, required) = match explicit {
        Some(path) => (crate::util::resolve_path(cwd, path), true),
        None => (cwd.join(DEFAULT_CONFIG_REL), false),
    };
    if !path.is_file() {
        if required {
            return Err(anyhow!("config file not found: {}", path.display()));
        }
        return Ok(default_config());
    }
    let bytes = fs::read(&path).with_context(|| format!("read config {}", path.display()))?;
    let config: TriageConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    validate_config(&config)?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

pub fn validate_config(config: &TriageConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.audit_tmp_dir.trim().is_empty() {
        return Err(anyhow!("audit_tmp_dir must be non-empty"));
    }
    let mut labels = BTreeSet::new();
    for command in &config.adapter.session_commands {
        if command.command.trim().is_empty() {
            return Err(anyhow!("session command {:?} is empty", command.label));
        }
        if !labels.insert(command.label.as_str()) {
            return Err(anyhow!("duplicate session command label {:?}", command.label));
        }
    }
    for label in [VERIFY_LABEL, STRICT_LABEL, ANY_LABEL] {
        if !labels.contains(label) {
            return Err(anyhow!("adapter.session_commands must define {label:?}"));
        }
    }
    let mut stage_ids = BTreeSet::new();
    for stage in &config.smoke.stages {
        match shell_words::split(&stage.command) {
            Ok(argv) if !argv.is_empty() => {}
            _ => return Err(anyhow!("smoke stage {:?} has an invalid command", stage.id)),
        }
        if !stage_ids.insert(stage.id.as_str()) {
            return Err(anyhow!("duplicate smoke stage id {:?}", stage.id));
        }
    }
    for target in &config.clean_targets {
        validate_relative_path(target, "clean_targets")?;
    }
    Ok(())
}

fn validate_relative_path(value: &str, label: &str) -> Result<()> {
    let path = Path::new(value);
    if value.trim().is_empty()
        || path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, std::path::Component::ParentDir))
    {
        return Err(anyhow!(
            "{label} entries must be relative paths inside the workspace (got {value:?})"
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HardModeProfile {
    CriticalHigh,
    AllSeverities,
}

impl HardModeProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            HardModeProfile::CriticalHigh => "critical-high",
            HardModeProfile::AllSeverities => "all-severities",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardModeConfig {
    pub enabled: bool,
    pub profile: HardModeProfile,
}

pub fn hard_mode_path(cwd: &Path) -> PathBuf {
    cwd.join(HARD_MODE_REL)
}

pub fn load_hard_mode(cwd: &Path) -> Result<Option<HardModeConfig>> {
    let path = hard_mode_path(cwd);
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
    let config = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse hard mode JSON {}", path.display()))?;
    Ok(Some(config))
}

pub fn write_hard_mode(cwd: &Path, config: &HardModeConfig) -> Result<PathBuf> {
    let path = hard_mode_path(cwd);
    let mut text = serde_json::to_string_pretty(config).context("serialize hard mode config")?;
    text.push('\n');
    write_atomic(&path, text.as_bytes())?;
    Ok(path)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
