//! Smoke tests for the `adc` binary in JSON output mode.

mod common;

use serde_json::Value;

use common::run_cli_case;

fn json_line(stdout: &str) -> Value {
    let line = stdout.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    serde_json::from_str(line).unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {stdout}"))
}

#[test]
fn config_validate_reports_hash() {
    let tmp = tempfile::tempdir().unwrap();
    let config_path = common::write_config(&common::test_config(tmp.path()));
    let config_arg = config_path.to_string_lossy().to_string();

    let result = run_cli_case("config_validate", &["--config", &config_arg, "config", "validate"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["valid"], Value::Bool(true));
    assert_eq!(payload["hash"].as_str().map(str::len), Some(64));
}

#[test]
fn config_validate_rejects_empty_pattern_set() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = common::test_config(tmp.path());
    config.patterns.safe_to_clean.clear();
    let config_path = common::write_config(&config);
    let config_arg = config_path.to_string_lossy().to_string();

    let result = run_cli_case("config_invalid", &["--config", &config_arg, "config", "validate"]);
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["valid"], Value::Bool(false));
    assert_eq!(payload["code"], Value::String("ADC-1001".to_string()));
}

#[test]
fn scan_reports_candidates_without_erasing() {
    let tmp = tempfile::tempdir().unwrap();
    let s = common::scenario(tmp.path());
    let config_path = common::write_config(&common::test_config(tmp.path()));
    let config_arg = config_path.to_string_lossy().to_string();
    let root_arg = s.root.to_string_lossy().to_string();

    let result = run_cli_case("scan", &["--config", &config_arg, "scan", &root_arg]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["command"], "scan");
    assert_eq!(payload["job"]["dry_run"], Value::Bool(true));
    assert_eq!(payload["job"]["files_scanned"], 2);
    assert_eq!(payload["impact"]["files_affected"], 1);
    assert!(s.orphan.exists());
}

#[test]
fn clean_requires_confirmation() {
    let tmp = tempfile::tempdir().unwrap();
    let s = common::scenario(tmp.path());
    let config_path = common::write_config(&common::test_config(tmp.path()));
    let config_arg = config_path.to_string_lossy().to_string();
    let root_arg = s.root.to_string_lossy().to_string();

    let result = run_cli_case("clean_no_yes", &["--config", &config_arg, "clean", &root_arg]);
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("--yes"));
    assert!(s.orphan.exists());
}

#[test]
fn disabled_dry_run_setting_confirms_clean() {
    let tmp = tempfile::tempdir().unwrap();
    let s = common::scenario(tmp.path());
    let mut config = common::test_config(tmp.path());
    config.job.dry_run = false;
    let config_path = common::write_config(&config);
    let config_arg = config_path.to_string_lossy().to_string();
    let root_arg = s.root.to_string_lossy().to_string();

    let result = run_cli_case(
        "clean_config_confirmed",
        &["--config", &config_arg, "clean", &root_arg],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert_eq!(json_line(&result.stdout)["job"]["dry_run"], Value::Bool(false));
    assert!(!s.orphan.exists());
    assert!(s.protected.exists());
}

#[test]
fn clean_then_verify_then_score() {
    let tmp = tempfile::tempdir().unwrap();
    let s = common::scenario(tmp.path());
    let config_path = common::write_config(&common::test_config(tmp.path()));
    let config_arg = config_path.to_string_lossy().to_string();
    let root_arg = s.root.to_string_lossy().to_string();

    let clean = run_cli_case("clean", &["--config", &config_arg, "clean", "--yes", &root_arg]);
    assert!(clean.status.success(), "log: {}", clean.log_path.display());
    let payload = json_line(&clean.stdout);
    assert_eq!(payload["job"]["succeeded"], 1);
    assert!(!s.orphan.exists());
    assert!(s.protected.exists());

    let verify = run_cli_case("audit_verify", &["--config", &config_arg, "audit", "verify"]);
    assert!(verify.status.success(), "log: {}", verify.log_path.display());
    assert_eq!(json_line(&verify.stdout)["intact"], Value::Bool(true));

    let unlinked = run_cli_case(
        "audit_show_unlinked",
        &["--config", &config_arg, "audit", "show", "--kind", "unlinked"],
    );
    assert!(unlinked.status.success(), "log: {}", unlinked.log_path.display());
    assert_eq!(unlinked.stdout.lines().filter(|l| !l.trim().is_empty()).count(), 1);

    let score =
        run_cli_case("compliance_dod", &["--config", &config_arg, "compliance", "dod-5220"]);
    assert!(score.status.success(), "log: {}", score.log_path.display());
    let payload = json_line(&score.stdout);
    assert_eq!(payload["scores"][0]["framework"], "dod-5220");
    assert_eq!(payload["scores"][0]["issues"].as_array().map(Vec::len), Some(0));
}

#[test]
fn unknown_framework_is_a_user_error() {
    let tmp = tempfile::tempdir().unwrap();
    let config_path = common::write_config(&common::test_config(tmp.path()));
    let config_arg = config_path.to_string_lossy().to_string();

    let result =
        run_cli_case("compliance_unknown", &["--config", &config_arg, "compliance", "hipaa"]);
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
}
