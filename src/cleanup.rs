//! `clean-artifacts`: remove generated reports and scratch directories.
use crate::cli::CleanArgs;
use crate::context::{RunContext, RunOutcome};
use crate::util::display_path;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Every regular file under `root`, sorted; a file root yields itself.
fn list_files(root: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let meta = fs::symlink_metadata(root).with_context(|| format!("stat {}", root.display()))?;
    if !meta.is_dir() {
        out.push(root.to_path_buf());
        return Ok(());
    }
    let mut entries = fs::read_dir(root)
        .with_context(|| format!("read dir {}", root.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("read dir {}", root.display()))?;
    entries.sort_by_key(|entry| entry.file_name());
    for entry in entries {
        list_files(&entry.path(), out)?;
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanPlan {
    pub targets: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

/// Existing targets and the files beneath them.
pub fn plan_clean(cwd: &Path, targets: &[String]) -> Result<CleanPlan> {
    let mut plan = CleanPlan::default();
    for target in targets {
        let path = cwd.join(target);
        if fs::symlink_metadata(&path).is_err() {
            continue;
        }
        list_files(&path, &mut plan.files)?;
        plan.targets.push(path);
    }
    Ok(plan)
}

fn remove_target(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if meta.is_dir() {
        fs::remove_dir_all(path).with_context(|| format!("remove {}", path.display()))
    } else {
        fs::remove_file(path).with_context(|| format!("remove {}", path.display()))
    }
}

pub fn run(ctx: &RunContext, args: &CleanArgs) -> Result<RunOutcome> {
    let plan = plan_clean(&ctx.cwd, &ctx.config.clean_targets)?;
    let mut lines = Vec::with_capacity(plan.files.len() + 1);
    for file in &plan.files {
        lines.push(format!("- {}", display_path(file, Some(&ctx.cwd))));
    }

    if args.dry_run {
        lines.insert(
            0,
            format!("clean-artifacts dry-run: {} file(s) would be removed", plan.files.len()),
        );
        return Ok(RunOutcome::new(lines.join("\n"), 0));
    }

    for target in &plan.targets {
        remove_target(target)?;
        tracing::debug!(path = %target.display(), "removed artifact target");
    }
    lines.insert(
        0,
        format!(
            "clean-artifacts removed {} file(s) from {} target(s)",
            plan.files.len(),
            plan.targets.len()
        ),
    );
    Ok(RunOutcome::new(lines.join("\n"), 0))
}
