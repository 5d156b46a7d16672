//! End-to-end runs of the `vtriage` binary in scratch workspaces.

mod common;

use common::{verdict_of, Workspace};

#[test]
fn unknown_argument_names_the_script() {
    let ws = Workspace::new();
    let result = ws.run(&["adapter-readiness", "--bogus"]);
    assert_eq!(result.code, 1);
    assert!(
        result
            .stderr
            .contains("adapter-readiness failed: Unknown argument: --bogus"),
        "stderr: {}",
        result.stderr
    );
}

#[test]
fn flag_without_value_is_rejected() {
    let ws = Workspace::new();
    let result = ws.run(&["phase5-blockers-readiness", "--out"]);
    assert_eq!(result.code, 1);
    assert!(result
        .stderr
        .contains("phase5-blockers-readiness failed: Missing value for --out"));
}

#[test]
fn closure_requires_repo() {
    let ws = Workspace::new();
    let result = ws.run(&["phase5-execution-closure", "--skip-adapter"]);
    assert_eq!(result.code, 1);
    assert!(result
        .stderr
        .contains("phase5-execution-closure failed: Missing required option: repo"));
}

#[test]
fn adapter_readiness_without_report_is_pending() {
    let ws = Workspace::new();
    let result = ws.run(&["adapter-readiness"]);
    assert_eq!(result.code, 1);
    assert!(result.stdout.contains("(verdict=PENDING)"));

    let report = ws.read(".audit-reports/adapter/adapter-readiness.md");
    assert_eq!(verdict_of(&report).as_deref(), Some("PENDING"));
    assert!(report.contains("- Missing Adapter adapter report"));
    let sidecar = ws.read(".audit-reports/adapter/adapter-readiness.json");
    let envelope: serde_json::Value = serde_json::from_str(&sidecar).expect("sidecar json");
    assert_eq!(envelope["kind"], "adapter-readiness");
    assert_eq!(envelope["verdict"], "PENDING");
}

#[test]
fn closure_dry_run_prints_plan_only() {
    let ws = Workspace::new();
    let result = ws.run(&[
        "phase5-execution-closure",
        "--repo",
        "acme/app",
        "--skip-workflow-lint",
        "--dry-run",
    ]);
    assert_eq!(result.code, 0);
    assert!(result.stdout.starts_with("phase5 execution closure dry-run plan:"));
    assert!(result.stdout.contains("[adapter-session-status]"));
    assert!(!ws.path(".audit-reports").exists());
}

#[test]
fn mock_phase5_closure_end_to_end() {
    let ws = Workspace::new();
    ws.seed_package_smoke();

    let closure = ws.run(&[
        "phase5-execution-closure",
        "--repo",
        "mock/consumer",
        "--mock-consumer",
        "--skip-adapter",
    ]);
    assert_eq!(closure.code, 0, "stdout: {}\nstderr: {}", closure.stdout, closure.stderr);

    let run_report = ws.read(".audit-reports/phase5/phase5-execution-closure-run-report.md");
    assert_eq!(verdict_of(&run_report).as_deref(), Some("READY"));
    assert!(run_report.contains("- mock_consumer: YES"));
    for step in [
        "mock-consumer-ab-report",
        "consumer-startup-triage",
        "phase5-blockers-readiness",
        "phase5-execution-closure-status",
    ] {
        assert!(
            run_report.contains(&format!("| {step} | yes | 0 | passed |")),
            "missing passed row for {step}:\n{run_report}"
        );
    }

    for (report, verdict) in [
        ("mock-consumer-ab-report.md", "READY"),
        ("consumer-startup-triage-report.md", "READY"),
        ("consumer-startup-unblock-status.md", "READY_FOR_RETEST"),
        ("phase5-blockers-readiness.md", "READY"),
        ("phase5-execution-closure-status.md", "READY"),
    ] {
        let text = ws.read(&format!(".audit-reports/phase5/{report}"));
        assert_eq!(verdict_of(&text).as_deref(), Some(verdict), "{report}");
    }

    let handoff = ws.run(&[
        "phase5-external-handoff",
        "--repo",
        "mock/consumer",
        "--artifact-url",
        "https://ci.example/runs/42",
        "--require-artifact-urls",
        "--require-mock-ab-report",
    ]);
    assert_eq!(handoff.code, 0, "stdout: {}\nstderr: {}", handoff.stdout, handoff.stderr);
    let text = ws.read(".audit-reports/phase5/phase5-external-handoff.md");
    assert_eq!(verdict_of(&text).as_deref(), Some("READY"));
    assert!(text.contains("- https://ci.example/runs/42"));
}

#[test]
fn mock_closure_halts_when_smoke_results_are_missing() {
    let ws = Workspace::new();
    let result = ws.run(&[
        "phase5-execution-closure",
        "--repo",
        "mock/consumer",
        "--mock-consumer",
        "--skip-adapter",
    ]);
    assert_eq!(result.code, 1);
    let run_report = ws.read(".audit-reports/phase5/phase5-execution-closure-run-report.md");
    assert_eq!(verdict_of(&run_report).as_deref(), Some("BLOCKED"));
    assert!(run_report.contains("| consumer-startup-triage | yes | - | skipped |"));
    assert!(run_report
        .contains("Resolve failed required step `mock-consumer-ab-report` and rerun this command."));
}
