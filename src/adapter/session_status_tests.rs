use super::*;

fn execution(label: &str, exit_code: i32, output: &str) -> CommandExecution {
    CommandExecution {
        label: label.to_string(),
        command: format!("npm run -s {label}"),
        exit_code,
        output: output.to_string(),
    }
}

#[test]
fn strict_pass_is_pass() {
    let verdict = determine_session_verdict(&SessionVerdictInput {
        verify_exit_code: 0,
        strict_output: "session-assessment=PASS",
        any_output: "",
    });
    assert_eq!(verdict, Verdict::Pass);
    assert_eq!(verdict.exit_code(), 0);
}

#[test]
fn verify_failure_blocks_even_with_strict_pass() {
    let verdict = determine_session_verdict(&SessionVerdictInput {
        verify_exit_code: 1,
        strict_output: "session-assessment=PASS",
        any_output: "session-assessment=PASS",
    });
    assert_eq!(verdict, Verdict::Blocked);
    assert_eq!(verdict.exit_code(), 1);
}

#[test]
fn include_simulated_pass_needs_real_session() {
    let verdict = determine_session_verdict(&SessionVerdictInput {
        verify_exit_code: 0,
        strict_output: "session-assessment=BLOCK",
        any_output: "session-assessment=PASS",
    });
    assert_eq!(verdict, Verdict::NeedsRealSession);
    assert_eq!(verdict.exit_code(), 2);
}

#[test]
fn no_pass_marker_blocks() {
    let verdict = determine_session_verdict(&SessionVerdictInput {
        verify_exit_code: 0,
        strict_output: "",
        any_output: "",
    });
    assert_eq!(verdict, Verdict::Blocked);
}

#[test]
fn absent_verify_command_counts_as_failure() {
    let commands = vec![execution(STRICT_LABEL, 0, "session-assessment=PASS")];
    assert_eq!(verdict_from_commands(&commands), Verdict::Blocked);
}

#[test]
fn rendered_report_parses_back() {
    let commands = vec![
        execution(VERIFY_LABEL, 0, "runtime ok"),
        execution(STRICT_LABEL, 1, "session-assessment=BLOCK"),
        execution(ANY_LABEL, 0, "session-assessment=PASS"),
    ];
    let verdict = verdict_from_commands(&commands);
    let tails = vec![LogTail {
        title: "cascade-hook.log".to_string(),
        path: "/repo/.audit_tmp/cascade-hook.log".to_string(),
        content: "[missing] /repo/.audit_tmp/cascade-hook.log".to_string(),
    }];
    let markdown = render_session_status(&SessionStatusReport {
        generated_at: "2026-01-01T00:00:00.000Z",
        repo_root: "/repo",
        verdict,
        commands: &commands,
        tails: &tails,
        verify_command: "npm run -s verify:adapter-hooks-runtime",
    });
    assert!(markdown.contains("- verdict: NEEDS_REAL_SESSION"));

    let parsed = parse_session_status(&markdown);
    assert_eq!(parsed, ParsedSessionStatus::from_commands(verdict, &commands));
    assert_eq!(parsed.verify_exit_code, Some(0));
    assert_eq!(parsed.strict_exit_code, Some(1));
    assert_eq!(parsed.any_exit_code, Some(0));
    assert!(!parsed.strict_assessment_pass);
    assert!(parsed.any_assessment_pass);
}

#[test]
fn parse_is_total_on_unrelated_text() {
    let parsed = parse_session_status("hello world\n| a | b |\n");
    assert_eq!(parsed, ParsedSessionStatus::default());
}
