use crate::config::TriageConfig;
use crate::util::resolve_path;
use std::path::{Path, PathBuf};

/// Everything a pipeline reads from its environment, resolved once in `main`.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub cwd: PathBuf,
    pub config: TriageConfig,
    pub config_path: Option<PathBuf>,
    pub generated_at: String,
}

impl RunContext {
    pub fn new(cwd: PathBuf, config: TriageConfig, generated_at: impl Into<String>) -> Self {
        Self {
            cwd,
            config,
            config_path: None,
            generated_at: generated_at.into(),
        }
    }

    pub fn with_config_path(mut self, config_path: Option<PathBuf>) -> Self {
        self.config_path = config_path;
        self
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve_path(&self.cwd, path)
    }

    pub fn audit_tmp_dir(&self) -> PathBuf {
        self.cwd.join(&self.config.audit_tmp_dir)
    }
}

/// What `main` prints and exits with after a pipeline finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub message: String,
    pub exit_code: u8,
}

impl RunOutcome {
    pub fn new(message: impl Into<String>, exit_code: u8) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }
}
