//! Compliance scores are a pure function of the persisted evidence.

mod common;

use std::fs;

use appdata_deepclean::audit::event::AuditFilter;
use appdata_deepclean::audit::trail::{AuditTrail, event_hash};
use appdata_deepclean::compliance::{builtin_framework, builtin_names, evaluate, evaluate_trail};
use appdata_deepclean::job::orchestrator::JobRequest;

#[test]
fn same_evidence_same_score_across_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let s = common::scenario(tmp.path());
    let config = common::test_config(tmp.path());
    let (orch, trail) = common::orchestrator(config.clone());
    let report = orch.execute(JobRequest::destructive(vec![s.root])).unwrap();

    let events = trail.collect(AuditFilter::job(&report.job.id)).unwrap();
    let reopened = AuditTrail::open(&config.paths.audit_log).unwrap();
    let reread = reopened.collect(AuditFilter::job(&report.job.id)).unwrap();
    assert_eq!(events, reread);

    for name in builtin_names() {
        let framework = builtin_framework(name).unwrap();
        let first = evaluate(&framework, &events, &report.decisions);
        let second = evaluate(&framework, &events, &report.decisions);
        let third = evaluate(&framework, &reread, &report.decisions);
        assert_eq!(first, second, "{name}");
        assert_eq!(first, third, "{name}");
    }
}

#[test]
fn tampered_line_costs_integrity_points() {
    let tmp = tempfile::tempdir().unwrap();
    let s = common::scenario(tmp.path());
    let config = common::test_config(tmp.path());
    let (orch, trail) = common::orchestrator(config.clone());
    let report = orch.execute(JobRequest::destructive(vec![s.root])).unwrap();

    let framework = builtin_framework("nist").unwrap();
    let events = trail.collect(AuditFilter::job(&report.job.id)).unwrap();
    let before = evaluate(&framework, &events, &report.decisions);
    assert!(before.is_compliant(), "{:?}", before.issues);

    // Rewrite the first event's timestamp without fixing its hash.
    let raw = fs::read_to_string(&config.paths.audit_log).unwrap();
    let rewritten = raw.replacen("\"timestamp\":\"20", "\"timestamp\":\"19", 1);
    fs::write(&config.paths.audit_log, rewritten).unwrap();

    let tampered = AuditTrail::open(&config.paths.audit_log)
        .unwrap()
        .collect(AuditFilter::job(&report.job.id))
        .unwrap();
    assert_eq!(tampered.len(), events.len());
    let after = evaluate(&framework, &tampered, &report.decisions);
    let failed: Vec<_> = after.issues.iter().map(|i| i.rule_id.as_str()).collect();
    assert_eq!(failed, vec!["nist-audit-integrity"]);
    assert!(after.score < before.score);

    let integrity = trail.verify().unwrap();
    assert_eq!(integrity.hash_mismatches, vec![1]);
}

#[test]
fn removed_line_fails_whole_trail_integrity() {
    let tmp = tempfile::tempdir().unwrap();
    let s = common::scenario(tmp.path());
    let config = common::test_config(tmp.path());
    let (orch, trail) = common::orchestrator(config.clone());
    let report = orch.execute(JobRequest::destructive(vec![s.root])).unwrap();

    let framework = builtin_framework("nist").unwrap();
    let events = trail.collect(AuditFilter::all()).unwrap();
    let before = evaluate_trail(&framework, &events, &report.decisions);
    assert!(before.is_compliant(), "{:?}", before.issues);

    let raw = fs::read_to_string(&config.paths.audit_log).unwrap();
    let mut dropped = false;
    let kept: String = raw
        .lines()
        .filter(|line| {
            let drop = !dropped && line.contains("\"event\":\"deletion_pass\"");
            dropped |= drop;
            !drop
        })
        .map(|line| format!("{line}\n"))
        .collect();
    assert!(dropped);
    fs::write(&config.paths.audit_log, kept).unwrap();

    let shortened = AuditTrail::open(&config.paths.audit_log)
        .unwrap()
        .collect(AuditFilter::all())
        .unwrap();
    assert_eq!(shortened.len(), events.len() - 1);
    let after = evaluate_trail(&framework, &shortened, &report.decisions);
    assert!(
        after.issues.iter().any(|i| i.rule_id == "nist-audit-integrity"),
        "{:?}",
        after.issues
    );
    assert!(after.score < before.score);
}

#[test]
fn relinked_event_fails_integrity_even_when_rehashed() {
    let tmp = tempfile::tempdir().unwrap();
    let s = common::scenario(tmp.path());
    let config = common::test_config(tmp.path());
    let (orch, trail) = common::orchestrator(config);
    let report = orch.execute(JobRequest::destructive(vec![s.root])).unwrap();

    let framework = builtin_framework("nist").unwrap();
    let mut events = trail.collect(AuditFilter::job(&report.job.id)).unwrap();
    assert!(events.len() > 2);
    events[2].prev_hash = "0".repeat(64);
    events[2].hash = event_hash(&events[2]).unwrap();

    let score = evaluate(&framework, &events, &report.decisions);
    let failed: Vec<_> = score.issues.iter().map(|i| i.rule_id.as_str()).collect();
    assert_eq!(failed, vec!["nist-audit-integrity"]);
}
