//! Adapter hook runtime pipelines.
//!
//! `session_status` runs the hook checks, `real_session` turns the status
//! report and runtime logs into the validation record, and `readiness`
//! reduces that record to a Phase 5 input.
pub mod readiness;
pub mod real_session;
pub mod session_status;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const HOOK_LOG: &str = "cascade-hook.log";
pub const WRITES_LOG: &str = "cascade-writes.log";
pub const RUNTIME_LOG_PREFIX: &str = "cascade-hook-runtime-";
pub const SMOKE_LOG_PREFIX: &str = "cascade-hook-smoke-";

/// Most recent `<prefix>*.log` in `dir`, by name.
pub fn latest_log(dir: &Path, prefix: &str) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut matches = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(prefix) && name.ends_with(".log") && entry.path().is_file() {
            matches.push(name.to_string());
        }
    }
    matches.sort_by(|left, right| right.cmp(left));
    Ok(matches.first().map(|name| dir.join(name)))
}

/// Log lines that mention `repo_root`.
pub fn filter_lines_for_repo<'a>(content: &'a str, repo_root: &str) -> Vec<&'a str> {
    content
        .lines()
        .filter(|line| line.contains(repo_root))
        .collect()
}

/// Tail of a shared log, limited to entries for this repository.
pub fn repo_log_tail(path: &Path, repo_root: &str, lines: usize) -> Result<String> {
    let Some(content) = crate::report::read_if_exists(path)? else {
        return Ok(format!("[missing] {}", path.display()));
    };
    let filtered = filter_lines_for_repo(&content, repo_root);
    if filtered.is_empty() {
        return Ok(format!("[no entries matched repoRoot={repo_root}]"));
    }
    let start = filtered.len().saturating_sub(lines);
    Ok(filtered[start..].join("\n").trim_end().to_string())
}

pub fn file_tail(path: &Path, lines: usize) -> Result<String> {
    match crate::report::read_if_exists(path)? {
        Some(content) => Ok(crate::util::tail_lines(&content, lines)),
        None => Ok(format!("[missing] {}", path.display())),
    }
}
