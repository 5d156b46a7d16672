//! Thin `gh` wrappers. Every call goes through the subprocess runner.
use super::{WorkflowRun, RUN_LIST_FIELDS};
use crate::exec::{run, ProcessOutput, RunOptions};
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Result of a `gh api` call that should return JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonProbe {
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl JsonProbe {
    pub fn ok(&self) -> bool {
        self.data.is_some()
    }

    pub fn success(data: Value) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn field_str(&self, key: &str) -> Option<String> {
        match self.data.as_ref()?.get(key)? {
            Value::String(value) => Some(value.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn field_u64(&self, key: &str) -> Option<u64> {
        self.data.as_ref()?.get(key)?.as_u64()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn failure_message(output: &ProcessOutput) -> String {
    let combined = collapse_whitespace(&output.combined());
    if combined.is_empty() {
        format!("gh exited with code {}", output.exit_code)
    } else {
        combined
    }
}

/// `gh auth status` text (gh prints it on stderr), or the failure message.
pub fn auth_status(options: &RunOptions<'_>) -> std::result::Result<String, String> {
    let output = run("gh", &["auth", "status"], options);
    if output.success() {
        Ok(output.combined())
    } else {
        Err(failure_message(&output))
    }
}

pub fn api_json(endpoint: &str, options: &RunOptions<'_>) -> JsonProbe {
    let output = run("gh", &["api", endpoint], options);
    if !output.success() {
        return JsonProbe::failure(failure_message(&output));
    }
    match serde_json::from_str::<Value>(&output.stdout) {
        Ok(data) => JsonProbe::success(data),
        Err(err) => JsonProbe::failure(format!("invalid JSON from gh api {endpoint}: {err}")),
    }
}

/// `gh api` decoded into `T`, or the failure message.
pub fn api_typed<T: DeserializeOwned>(
    endpoint: &str,
    options: &RunOptions<'_>,
) -> std::result::Result<T, String> {
    let probe = api_json(endpoint, options);
    match probe.data {
        Some(data) => serde_json::from_value(data)
            .map_err(|err| format!("unexpected JSON from gh api {endpoint}: {err}")),
        None => Err(probe.error.unwrap_or_else(|| "unknown gh command error".to_string())),
    }
}

/// `gh run list`; a failure here leaves nothing to report on.
pub fn run_list(repo: &str, limit: u32, options: &RunOptions<'_>) -> Result<Vec<WorkflowRun>> {
    let limit = limit.to_string();
    let output = run(
        "gh",
        &[
            "run", "list", "--repo", repo, "--limit", &limit, "--json", RUN_LIST_FIELDS,
        ],
        options,
    );
    if !output.success() {
        return Err(anyhow!("gh run list failed: {}", failure_message(&output)));
    }
    serde_json::from_str(&output.stdout).context("parse gh run list JSON")
}

/// Fails when `gh auth status` does.
pub fn require_auth(options: &RunOptions<'_>) -> Result<String> {
    auth_status(options).map_err(|err| anyhow!("gh auth status failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_fields_read_json_values() {
        let probe = JsonProbe::success(serde_json::json!({
            "enabled": true,
            "allowed_actions": "all",
            "total_count": 0,
            "missing": null
        }));
        assert!(probe.ok());
        assert_eq!(probe.field_str("enabled").as_deref(), Some("true"));
        assert_eq!(probe.field_str("allowed_actions").as_deref(), Some("all"));
        assert_eq!(probe.field_u64("total_count"), Some(0));
        assert_eq!(probe.field_str("missing"), None);
    }

    #[test]
    fn failure_message_collapses_output() {
        let output = ProcessOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: "HTTP 404:\n  Not Found\n".to_string(),
        };
        assert_eq!(failure_message(&output), "HTTP 404: Not Found");
        let silent = ProcessOutput {
            exit_code: 4,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(failure_message(&silent), "gh exited with code 4");
    }
}
