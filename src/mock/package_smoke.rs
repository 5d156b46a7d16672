//! Package-install smoke: pack the package, install it into a throwaway
//! consumer repository and run every configured stage hook.
//!
//! Results land in `<out-dir>/<mode>/`: `summary.md`, `command.log` and one
//! `<stage-id>.ai_evidence.json` per stage. A failed run still writes the
//! summary (`- Status: FAIL`) and the command log before exiting 1.
use super::{parse_evidence, SmokeMode, EVIDENCE_VERSION};
use crate::cli::PackageSmokeArgs;
use crate::config::SmokeStage;
use crate::context::{RunContext, RunOutcome};
use crate::exec::{display_command, run, ProcessOutput, RunOptions};
use crate::report::write_atomic;
use crate::util::truncate_string;
use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

const EVIDENCE_FILE: &str = ".ai_evidence.json";
const FEATURE_BRANCH: &str = "feature/package-smoke";
const MAX_ERROR_OUTPUT: usize = 2000;

fn fatal_output_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(cannot find module|command not found|unhandled (promise )?rejection|segmentation fault)")
            .expect("regex for fatal stage output")
    })
}

#[derive(Debug, Deserialize)]
struct PackedTarball {
    filename: String,
    #[serde(default)]
    id: String,
}

/// Exit code and evidence outcome of one stage command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub id: String,
    pub exit_code: i32,
    pub outcome: String,
}

/// Check a stage run against the mode's expectations.
pub fn check_stage(
    mode: SmokeMode,
    stage: &SmokeStage,
    output: &ProcessOutput,
    evidence_raw: &str,
) -> Result<StageResult> {
    let combined = output.combined();
    if let Some(found) = fatal_output_re().find(&combined) {
        bail!("{} produced fatal output: {}", stage.id, found.as_str());
    }
    if output.exit_code != mode.expected_exit_code() {
        bail!(
            "{} expected exit code {}, got {}",
            stage.id,
            mode.expected_exit_code(),
            output.exit_code
        );
    }
    let evidence = parse_evidence(&format!("{}.ai_evidence.json", stage.id), evidence_raw);
    if let Some(err) = evidence.parse_error {
        bail!("{} evidence is not valid JSON: {err}", stage.id);
    }
    let version = evidence.version.unwrap_or_default();
    let snapshot_stage = evidence.stage.unwrap_or_default();
    if version != EVIDENCE_VERSION || snapshot_stage != stage.stage {
        bail!(
            "Invalid {} evidence metadata: version={version} stage={snapshot_stage}",
            stage.stage
        );
    }
    let outcome = evidence.outcome.unwrap_or_default();
    if outcome != mode.expected_outcome() {
        bail!(
            "Unexpected evidence outcome for mode={}: {}={outcome}",
            mode.as_str(),
            stage.id
        );
    }
    Ok(StageResult {
        id: stage.id.clone(),
        exit_code: output.exit_code,
        outcome,
    })
}

/// Copy every file under `src` into `dst`, creating directories as needed.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    let mut copied = 0;
    fs::create_dir_all(dst).with_context(|| format!("create {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("read {}", src.display()))? {
        let entry = entry.with_context(|| format!("read {}", src.display()))?;
        let target = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", entry.path().display()))?;
        if file_type.is_dir() {
            copied += copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("copy {} -> {}", entry.path().display(), target.display())
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

pub fn render_summary(
    lines: &[String],
    result: &std::result::Result<Vec<StageResult>, String>,
    artifact_root: &str,
) -> String {
    let mut out = vec!["# Package Install Smoke Report".to_string(), String::new()];
    out.extend(lines.iter().cloned());
    match result {
        Ok(stages) => {
            out.push("- Status: PASS".to_string());
            for stage in stages {
                out.push(format!(
                    "- {} exit: `{}` ({})",
                    stage.id, stage.exit_code, stage.outcome
                ));
            }
            out.push(format!("- Artifact root: `{artifact_root}`"));
        }
        Err(err) => {
            out.push("- Status: FAIL".to_string());
            out.push(format!("- Error: {err}"));
        }
    }
    let mut text = out.join("\n");
    text.push('\n');
    text
}

/// One smoke run: temp workspace, command log and summary header lines.
struct SmokeRun<'a> {
    ctx: &'a RunContext,
    mode: SmokeMode,
    report_root: PathBuf,
    workspace: TempDir,
    log: Vec<String>,
    header: Vec<String>,
    tarball: Option<PathBuf>,
}

impl<'a> SmokeRun<'a> {
    fn new(ctx: &'a RunContext, mode: SmokeMode, report_root: PathBuf) -> Result<Self> {
        let workspace = tempfile::Builder::new()
            .prefix("vtriage-package-smoke-")
            .tempdir()
            .context("create smoke workspace")?;
        Ok(Self {
            ctx,
            mode,
            report_root,
            workspace,
            log: Vec::new(),
            header: Vec::new(),
            tarball: None,
        })
    }

    fn command(
        &mut self,
        cwd: &Path,
        program: &str,
        args: &[&str],
        env: &[(String, String)],
    ) -> ProcessOutput {
        let output = run(program, args, &RunOptions { cwd: Some(cwd), env });
        let owned: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        let entry = format!("$ {}\n{}", display_command(program, &owned), output.combined());
        self.log.push(entry.trim().to_string());
        output
    }

    fn checked(&mut self, label: &str, cwd: &Path, program: &str, args: &[&str]) -> Result<ProcessOutput> {
        let output = self.command(cwd, program, args, &[]);
        if !output.success() {
            bail!(
                "{label} failed with exit code {}: {}",
                output.exit_code,
                truncate_string(&output.combined(), MAX_ERROR_OUTPUT)
            );
        }
        Ok(output)
    }

    fn pack(&mut self) -> Result<PathBuf> {
        let package_dir = self.ctx.resolve(Path::new(&self.ctx.config.smoke.package_dir));
        let output = self.checked("npm pack --json", &package_dir, "npm", &["pack", "--json"])?;
        let packed: Vec<PackedTarball> =
            serde_json::from_str(&output.stdout).context("parse npm pack --json output")?;
        let first = packed
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("npm pack --json did not return a valid tarball payload"))?;
        let tarball = package_dir.join(&first.filename);
        if !tarball.is_file() {
            bail!("Packed tarball not found at {}", tarball.display());
        }
        self.tarball = Some(tarball.clone());
        self.header.push(format!("- Smoke mode: `{}`", self.mode.as_str()));
        let id = if first.id.is_empty() { first.filename } else { first.id };
        self.header.push(format!("- Packed tarball: `{id}`"));
        Ok(tarball)
    }

    fn fixture(&self, parts: &[&str]) -> PathBuf {
        let mut path = self.ctx.resolve(Path::new(&self.ctx.config.smoke.fixtures_dir));
        for part in parts {
            path.push(part);
        }
        path
    }

    fn execute(&mut self) -> Result<Vec<StageResult>> {
        let tarball = self.pack()?;
        let root = self.workspace.path().to_path_buf();
        let consumer = root.join("consumer");
        let remote = root.join("origin.git");
        fs::create_dir_all(&consumer).with_context(|| format!("create {}", consumer.display()))?;

        let tarball_arg = tarball.display().to_string();
        let remote_arg = remote.display().to_string();
        self.checked("git init", &consumer, "git", &["init", "-b", "main"])?;
        self.checked("git config user.email", &consumer, "git", &["config", "user.email", "vtriage-smoke@example.com"])?;
        self.checked("git config user.name", &consumer, "git", &["config", "user.name", "vtriage smoke"])?;
        self.checked("npm init", &consumer, "npm", &["init", "-y"])?;
        self.checked("npm install <tarball>", &consumer, "npm", &["install", &tarball_arg])?;

        let baseline = self.fixture(&["baseline"]);
        if !baseline.is_dir() {
            bail!("smoke fixture directory not found: {}", baseline.display());
        }
        copy_tree(&baseline, &consumer)?;
        self.checked("git add baseline", &consumer, "git", &["add", "."])?;
        self.checked("git commit baseline", &consumer, "git", &["commit", "-m", "chore: baseline"])?;

        self.checked("git init --bare", &root, "git", &["init", "--bare", &remote_arg])?;
        self.checked("git remote add origin", &consumer, "git", &["remote", "add", "origin", &remote_arg])?;
        self.checked("git push origin main", &consumer, "git", &["push", "-u", "origin", "main"])?;
        self.checked("git checkout feature branch", &consumer, "git", &["checkout", "-b", FEATURE_BRANCH])?;
        self.checked(
            "git branch --set-upstream-to",
            &consumer,
            "git",
            &["branch", "--set-upstream-to=origin/main", FEATURE_BRANCH],
        )?;

        let range = self.fixture(&["range", self.mode.as_str()]);
        if self.mode == SmokeMode::Block && range.is_dir() {
            copy_tree(&range, &consumer)?;
            self.checked("git add range payload", &consumer, "git", &["add", "."])?;
            self.checked(
                "git commit range payload",
                &consumer,
                "git",
                &["commit", "-m", "test: range payload for package smoke"],
            )?;
        }
        let staged = self.fixture(&["staged", self.mode.as_str()]);
        if staged.is_dir() {
            copy_tree(&staged, &consumer)?;
            self.checked("git add staged-only payload", &consumer, "git", &["add", "."])?;
        }

        let stages = self.ctx.config.smoke.stages.clone();
        let mut results = Vec::with_capacity(stages.len());
        for stage in &stages {
            results.push(self.run_stage(stage, &consumer)?);
        }
        Ok(results)
    }

    fn run_stage(&mut self, stage: &SmokeStage, consumer: &Path) -> Result<StageResult> {
        let argv = shell_words::split(&stage.command)
            .with_context(|| format!("parse smoke stage command {:?}", stage.command))?;
        let (program, rest) = argv
            .split_first()
            .ok_or_else(|| anyhow!("smoke stage {:?} has an empty command", stage.id))?;
        let args: Vec<&str> = rest.iter().map(String::as_str).collect();
        let env: Vec<(String, String)> = stage
            .env
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let output = self.command(consumer, program, &args, &env);

        let evidence_src = consumer.join(EVIDENCE_FILE);
        let evidence_dst = self.report_root.join(format!("{}.ai_evidence.json", stage.id));
        if !evidence_src.is_file() {
            bail!("{} did not write {EVIDENCE_FILE}", stage.id);
        }
        fs::copy(&evidence_src, &evidence_dst).with_context(|| {
            format!("copy {} -> {}", evidence_src.display(), evidence_dst.display())
        })?;
        let raw = fs::read_to_string(&evidence_dst)
            .with_context(|| format!("read {}", evidence_dst.display()))?;
        let result = check_stage(self.mode, stage, &output, &raw)?;
        tracing::info!(stage = %stage.id, exit_code = result.exit_code, outcome = %result.outcome, "smoke stage checked");
        Ok(result)
    }

    fn cleanup(&mut self) {
        if let Some(tarball) = self.tarball.take() {
            if let Err(err) = fs::remove_file(&tarball) {
                tracing::debug!(path = %tarball.display(), error = %err, "packed tarball not removed");
            }
        }
    }
}

pub fn run_smoke(ctx: &RunContext, args: &PackageSmokeArgs) -> Result<RunOutcome> {
    let mode = args.mode;
    let artifact_dir = args.out_dir.join(mode.as_str());
    let report_root = ctx.resolve(&artifact_dir);
    fs::create_dir_all(&report_root).with_context(|| format!("create {}", report_root.display()))?;

    let mut smoke = SmokeRun::new(ctx, mode, report_root.clone())?;
    smoke.header.push(format!("- generated_at: {}", ctx.generated_at));
    smoke.header.push(format!("- Repository root: `{}`", ctx.cwd.display()));
    smoke
        .header
        .push(format!("- Temporary workspace: `{}`", smoke.workspace.path().display()));
    let result = smoke.execute().map_err(|err| format!("{err:#}"));
    smoke.cleanup();

    write_atomic(&report_root.join("command.log"), smoke.log.join("\n\n").as_bytes())?;
    let summary_path = report_root.join("summary.md");
    let summary = render_summary(&smoke.header, &result, &artifact_dir.display().to_string());
    write_atomic(&summary_path, summary.as_bytes())?;

    let (status, exit_code) = match &result {
        Ok(_) => ("PASS", 0),
        Err(err) => {
            tracing::warn!(mode = mode.as_str(), error = %err, "package smoke failed");
            ("FAIL", 1)
        }
    };
    tracing::info!(path = %summary_path.display(), status, "smoke summary written");
    Ok(RunOutcome::new(
        format!(
            "package smoke summary generated at {} (status={status})",
            summary_path.display()
        ),
        exit_code,
    ))
}
