//! Shared test infrastructure for integration tests.

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Scratch workspace that runs `vtriage` with itself as the working directory.
pub struct Workspace {
    pub dir: TempDir,
}

/// Exit code and captured streams of one `vtriage` run.
#[derive(Debug)]
pub struct RunResult {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for RunResult {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp workspace"),
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture dir");
        }
        std::fs::write(&path, content).expect("write fixture");
    }

    pub fn read(&self, rel: &str) -> String {
        let path = self.path(rel);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|err| panic!("read {}: {err}", path.display()))
    }

    pub fn run(&self, args: &[&str]) -> RunResult {
        Command::new(env!("CARGO_BIN_EXE_vtriage"))
            .args(args)
            .current_dir(self.dir.path())
            .env_remove("RUST_LOG")
            .env_remove("PUMUKI_MENU_MODE")
            .output()
            .expect("spawn vtriage")
            .into()
    }

    /// Package smoke summaries and evidence for both modes in the expected state.
    pub fn seed_package_smoke(&self) {
        for (mode, exit, outcome) in [("block", 1, "BLOCK"), ("minimal", 0, "PASS")] {
            self.write(
                &format!(".audit-reports/package-smoke/{mode}/summary.md"),
                &format!(
                    "# Package Install Smoke Report\n\n\
                     - Smoke mode: `{mode}`\n\
                     - Status: PASS\n\
                     - pre-commit exit: `{exit}` ({outcome})\n\
                     - pre-push exit: `{exit}` ({outcome})\n\
                     - ci exit: `{exit}` ({outcome})\n"
                ),
            );
            self.write(
                &format!(".audit-reports/package-smoke/{mode}/ci.ai_evidence.json"),
                &format!(
                    "{{\"version\":\"2.1\",\"snapshot\":{{\"stage\":\"CI\",\"outcome\":\"{outcome}\"}}}}"
                ),
            );
        }
    }
}

/// `- verdict: X` from a rendered report.
pub fn verdict_of(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .find_map(|line| line.trim().strip_prefix("- verdict:"))
        .map(|value| value.trim().to_string())
}
