//! `hard-mode`: toggle enterprise enforcement in `.pumuki/hard-mode.json`.
use crate::cli::HardModeArgs;
use crate::config::{hard_mode_path, load_hard_mode, write_hard_mode, HardModeConfig};
use crate::context::{RunContext, RunOutcome};
use anyhow::Result;

pub fn run(ctx: &RunContext, args: &HardModeArgs) -> Result<RunOutcome> {
    if !args.enable && !args.disable {
        let message = match load_hard_mode(&ctx.cwd)? {
            Some(config) => format!(
                "hard mode is {} (profile={}) in {}",
                if config.enabled { "enabled" } else { "disabled" },
                config.profile.as_str(),
                hard_mode_path(&ctx.cwd).display()
            ),
            None => "hard mode is not configured (pass --enable or --disable)".to_string(),
        };
        return Ok(RunOutcome::new(message, 0));
    }

    let config = HardModeConfig {
        enabled: args.enable,
        profile: args.profile,
    };
    let path = write_hard_mode(&ctx.cwd, &config)?;
    tracing::info!(enabled = config.enabled, profile = config.profile.as_str(), "hard mode updated");
    Ok(RunOutcome::new(
        format!(
            "hard mode {} (profile={}) written to {}",
            if config.enabled { "enabled" } else { "disabled" },
            config.profile.as_str(),
            path.display()
        ),
        0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_config, HardModeProfile};
    use tempfile::TempDir;

    fn args(enable: bool, disable: bool, profile: HardModeProfile) -> HardModeArgs {
        HardModeArgs {
            enable,
            disable,
            profile,
        }
    }

    #[test]
    fn enable_then_disable_round_trips() {
        let dir = TempDir::new().expect("tempdir");
        let ctx = RunContext::new(dir.path().to_path_buf(), default_config(), "2026-01-01T00:00:00.000Z");

        let status = run(&ctx, &args(false, false, HardModeProfile::CriticalHigh)).expect("status");
        assert!(status.message.contains("not configured"));

        run(&ctx, &args(true, false, HardModeProfile::AllSeverities)).expect("enable");
        let stored = load_hard_mode(dir.path()).expect("load").expect("config");
        assert!(stored.enabled);
        assert_eq!(stored.profile, HardModeProfile::AllSeverities);
        let raw = std::fs::read_to_string(hard_mode_path(dir.path())).expect("read");
        assert!(raw.contains("\"profile\": \"all-severities\""));

        let outcome = run(&ctx, &args(false, true, HardModeProfile::CriticalHigh)).expect("disable");
        assert!(outcome.message.starts_with("hard mode disabled (profile=critical-high)"));
        assert!(!load_hard_mode(dir.path()).expect("load").expect("config").enabled);
    }
}
