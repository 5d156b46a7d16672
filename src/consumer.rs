//! Consumer repository CI triage.
//!
//! Collectors (`auth`, `artifacts`, `support_bundle`, `workflow_lint`) talk to
//! `gh`/`actionlint`; `ticket` and `unblock` only read their reports; `triage`
//! runs the whole set.
pub mod artifacts;
pub mod auth;
pub mod gh;
pub mod support_bundle;
pub mod ticket;
pub mod triage;
pub mod unblock;
pub mod workflow_lint;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Run statuses that mean GitHub never got the run started.
const STALLED_STATUSES: &[&str] = &["queued", "waiting", "pending", "requested"];

/// One entry of `gh run list --json ...`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowRun {
    pub database_id: u64,
    pub display_title: String,
    pub workflow_name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub url: String,
    pub created_at: String,
    pub event: String,
    pub head_branch: String,
    pub head_sha: String,
}

impl WorkflowRun {
    pub fn conclusion_label(&self) -> &str {
        match self.conclusion.as_deref() {
            Some(conclusion) if !conclusion.is_empty() => conclusion,
            _ => "null",
        }
    }

    pub fn is_startup_failure(&self) -> bool {
        self.conclusion.as_deref() == Some("startup_failure")
    }

    pub fn is_stalled(&self) -> bool {
        STALLED_STATUSES.contains(&self.status.as_str())
    }

    pub fn workflow_label(&self) -> &str {
        if self.workflow_name.is_empty() {
            "(empty)"
        } else {
            &self.workflow_name
        }
    }
}

/// `repos/<repo>/actions/runs/<id>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunMetadata {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub html_url: String,
    pub referenced_workflows: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Artifact {
    pub id: u64,
    pub name: String,
    pub size_in_bytes: u64,
    pub expired: bool,
    pub expires_at: String,
    pub archive_download_url: String,
}

/// `.../artifacts`; `.../jobs` only needs `total_count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactList {
    pub total_count: u64,
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TotalCount {
    pub total_count: u64,
}

pub const RUN_LIST_FIELDS: &str =
    "databaseId,displayTitle,workflowName,status,conclusion,url,createdAt,event,headBranch,headSha";

/// Owner half of `owner/repo`.
pub fn repo_owner(repo: &str) -> Result<&str> {
    let owner = repo.split('/').next().unwrap_or("").trim();
    if owner.is_empty() {
        return Err(anyhow!("Invalid repo value. Expected owner/repo format."));
    }
    Ok(owner)
}
