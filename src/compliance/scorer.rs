//! Compliance scorer: evaluates a framework against recorded evidence.
//!
//! Each rule yields a pass fraction over the evidence it applies to (1.0 when
//! nothing applies) and contributes `weight * fraction` to the score, which is
//! normalised to 0..=100. The result depends only on the events and decisions
//! passed in: ages are measured between recorded modification times and
//! recorded unlink timestamps, never against the clock.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::event::{AuditEvent, AuditRecord};
use crate::audit::trail::event_hash;
use crate::compliance::framework::{ComplianceFramework, ComplianceRule, RuleCheck};
use crate::scanner::classifier::{ClassificationDecision, Outcome};
use crate::scanner::deletion::{DeletionPass, FillPattern};

/// Below this score the result carries recommendations.
pub const RECOMMENDATION_THRESHOLD: f64 = 90.0;

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceIssue {
    pub rule_id: String,
    pub description: String,
    pub evaluated: u64,
    pub passed: u64,
    pub pass_fraction: f64,
    pub remediation: String,
}

/// Derived score for one framework. Recompute on demand; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceScore {
    pub framework: String,
    /// 0..=100, rounded to two decimals.
    pub score: f64,
    /// Failed rules in framework order.
    pub issues: Vec<ComplianceIssue>,
    pub recommendations: Vec<String>,
}

impl ComplianceScore {
    #[must_use]
    pub fn is_compliant(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Score `framework` over the given evidence.
///
/// `events` may be any filtered read of the trail. Consecutive sequence
/// numbers must still be hash-linked; jumps between them are accepted.
#[must_use]
pub fn evaluate(
    framework: &ComplianceFramework,
    events: &[AuditEvent],
    decisions: &[ClassificationDecision],
) -> ComplianceScore {
    score_evidence(framework, &Evidence::collect(events, decisions, false))
}

/// Score `framework` over an unfiltered read of the whole trail.
///
/// Besides the checks of [`evaluate`], every sequence number from 1 on must
/// be present, so a removed line fails audit integrity.
#[must_use]
pub fn evaluate_trail(
    framework: &ComplianceFramework,
    events: &[AuditEvent],
    decisions: &[ClassificationDecision],
) -> ComplianceScore {
    score_evidence(framework, &Evidence::collect(events, decisions, true))
}

fn score_evidence(framework: &ComplianceFramework, evidence: &Evidence<'_>) -> ComplianceScore {
    let total_weight = framework.total_weight();

    let mut earned = 0.0;
    let mut issues = Vec::new();
    for rule in &framework.rules {
        let tally = evidence.check(&rule.check);
        let fraction = tally.fraction();
        earned += rule.weight * fraction;
        if fraction < 1.0 {
            issues.push(issue(rule, &tally, fraction));
        }
    }

    let score = if total_weight > 0.0 {
        round2((earned / total_weight * 100.0).clamp(0.0, 100.0))
    } else {
        100.0
    };

    let recommendations = if score < RECOMMENDATION_THRESHOLD {
        recommend(framework, &issues)
    } else {
        Vec::new()
    };

    ComplianceScore {
        framework: framework.name.clone(),
        score,
        issues,
        recommendations,
    }
}

fn issue(rule: &ComplianceRule, tally: &Tally, fraction: f64) -> ComplianceIssue {
    ComplianceIssue {
        rule_id: rule.id.clone(),
        description: rule.description.clone(),
        evaluated: tally.evaluated,
        passed: tally.passed,
        pass_fraction: round2(fraction),
        remediation: rule.remediation.clone(),
    }
}

fn recommend(framework: &ComplianceFramework, issues: &[ComplianceIssue]) -> Vec<String> {
    let mut out = vec![format!(
        "{} scores below {RECOMMENDATION_THRESHOLD:.0}; review failed rules before cleaning again.",
        framework.name
    )];
    let mut seen = BTreeSet::new();
    for issue in issues {
        if !issue.remediation.is_empty() && seen.insert(issue.remediation.as_str()) {
            out.push(issue.remediation.clone());
        }
    }
    out
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ──────────────────── evidence ────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    evaluated: u64,
    passed: u64,
}

impl Tally {
    fn record(&mut self, ok: bool) {
        self.evaluated += 1;
        if ok {
            self.passed += 1;
        }
    }

    fn fraction(self) -> f64 {
        if self.evaluated == 0 {
            1.0
        } else {
            self.passed as f64 / self.evaluated as f64
        }
    }
}

struct Unlink<'a> {
    passes: u32,
    timestamp: &'a str,
}

/// Evidence indexed by path. Ordered maps keep evaluation independent of input order.
struct Evidence<'a> {
    events: &'a [AuditEvent],
    /// The events are the whole trail, so sequence gaps are defects.
    whole_trail: bool,
    /// Every decision seen, from audit events first, then the explicit list.
    decisions: BTreeMap<&'a Path, &'a ClassificationDecision>,
    audited: BTreeSet<&'a Path>,
    passes: BTreeMap<&'a Path, Vec<&'a DeletionPass>>,
    unlinked: BTreeMap<&'a Path, Unlink<'a>>,
    failed: BTreeSet<&'a Path>,
    dry_run_jobs: BTreeSet<&'a str>,
    destructive_by_job: BTreeMap<&'a str, u64>,
}

impl<'a> Evidence<'a> {
    fn collect(
        events: &'a [AuditEvent],
        decisions: &'a [ClassificationDecision],
        whole_trail: bool,
    ) -> Self {
        let mut ev = Evidence {
            events,
            whole_trail,
            decisions: BTreeMap::new(),
            audited: BTreeSet::new(),
            passes: BTreeMap::new(),
            unlinked: BTreeMap::new(),
            failed: BTreeSet::new(),
            dry_run_jobs: BTreeSet::new(),
            destructive_by_job: BTreeMap::new(),
        };

        for event in events {
            if event.record.kind().is_destructive() {
                *ev.destructive_by_job.entry(event.job_id.as_str()).or_default() += 1;
            }
            match &event.record {
                AuditRecord::JobStarted { dry_run: true, .. } => {
                    ev.dry_run_jobs.insert(event.job_id.as_str());
                }
                AuditRecord::Decision { decision } => {
                    let path = decision.record.path.as_path();
                    ev.audited.insert(path);
                    ev.decisions.insert(path, decision);
                }
                AuditRecord::DeletionPass { path, pass } => {
                    ev.passes.entry(path.as_path()).or_default().push(pass);
                }
                AuditRecord::Unlinked { path, passes, .. } => {
                    ev.unlinked.insert(
                        path.as_path(),
                        Unlink {
                            passes: *passes,
                            timestamp: event.timestamp.as_str(),
                        },
                    );
                }
                AuditRecord::DeletionFailed { error } => {
                    ev.failed.insert(error.path.as_path());
                }
                _ => {}
            }
        }
        for decision in decisions {
            ev.decisions.entry(decision.record.path.as_path()).or_insert(decision);
        }
        ev
    }

    fn erased(&self, path: &Path) -> bool {
        self.passes.contains_key(path) || self.unlinked.contains_key(path)
    }

    fn check(&self, check: &RuleCheck) -> Tally {
        let mut tally = Tally::default();
        match check {
            RuleCheck::ErasureCompleteness => {
                for path in self.passes.keys() {
                    tally.record(self.unlinked.contains_key(path));
                }
            }
            RuleCheck::MinimumPasses { min } => {
                for unlink in self.unlinked.values() {
                    tally.record(unlink.passes >= *min);
                }
            }
            RuleCheck::RandomFinalPass => {
                for path in self.unlinked.keys() {
                    let last = self
                        .passes
                        .get(path)
                        .and_then(|passes| passes.iter().max_by_key(|p| p.index));
                    tally.record(last.is_some_and(|p| p.fill == FillPattern::Random));
                }
            }
            RuleCheck::AuditCoverage => {
                let subjects: BTreeSet<&Path> = self
                    .decisions
                    .keys()
                    .chain(self.unlinked.keys())
                    .copied()
                    .collect();
                for path in subjects {
                    tally.record(self.audited.contains(path));
                }
            }
            RuleCheck::AuditIntegrity => {
                let mut prev: Option<&AuditEvent> = None;
                for event in self.events {
                    let hash_ok = event_hash(event).is_ok_and(|h| h == event.hash);
                    let chain_ok = match prev {
                        None => !self.whole_trail || event.seq == 1,
                        Some(p) if event.seq == p.seq + 1 => event.prev_hash == p.hash,
                        Some(p) => !self.whole_trail && event.seq > p.seq,
                    };
                    prev = Some(event);
                    tally.record(hash_ok && chain_ok);
                }
            }
            RuleCheck::ProtectedNeverErased => {
                for (path, decision) in &self.decisions {
                    if matches!(decision.outcome, Outcome::Protected | Outcome::Quarantined) {
                        tally.record(!self.erased(path));
                    }
                }
            }
            RuleCheck::RetentionHold { keywords, min_age_days } => {
                for (path, unlink) in &self.unlinked {
                    if mentions(path, keywords) {
                        let age = self.age_at_unlink(path, unlink);
                        tally.record(age.is_some_and(|days| days >= *min_age_days));
                    }
                }
            }
            RuleCheck::ClassificationMarkers { markers } => {
                let subjects: BTreeSet<&Path> = self
                    .decisions
                    .keys()
                    .chain(self.passes.keys())
                    .chain(self.unlinked.keys())
                    .copied()
                    .collect();
                for path in subjects {
                    if mentions(path, markers) {
                        tally.record(!self.erased(path));
                    }
                }
            }
            RuleCheck::CardholderSecureErase { keywords, min_passes } => {
                let subjects: BTreeSet<&Path> = self
                    .passes
                    .keys()
                    .chain(self.unlinked.keys())
                    .chain(self.failed.iter())
                    .copied()
                    .collect();
                for path in subjects {
                    if mentions(path, keywords) {
                        let ok = self.unlinked.get(path).is_some_and(|u| u.passes >= *min_passes);
                        tally.record(ok);
                    }
                }
            }
            RuleCheck::FailureRate { max_fraction } => {
                let failed = self.failed.iter().filter(|p| !self.unlinked.contains_key(*p)).count();
                let attempts = self.unlinked.len() + failed;
                if attempts > 0 {
                    tally.record(failed as f64 / attempts as f64 <= *max_fraction);
                }
            }
            RuleCheck::DryRunPurity => {
                for job in &self.dry_run_jobs {
                    tally.record(self.destructive_by_job.get(job).copied().unwrap_or(0) == 0);
                }
            }
        }
        tally
    }

    /// Whole days between the file's recorded mtime and its recorded unlink.
    fn age_at_unlink(&self, path: &Path, unlink: &Unlink<'_>) -> Option<u64> {
        let decision = self.decisions.get(path)?;
        let unlinked_at: DateTime<Utc> =
            DateTime::parse_from_rfc3339(unlink.timestamp).ok()?.into();
        let secs = (unlinked_at - decision.record.modified).num_seconds().max(0);
        u64::try_from(secs / 86_400).ok()
    }
}

fn mentions(path: &Path, keywords: &[String]) -> bool {
    let haystack = path.to_string_lossy().to_lowercase();
    keywords.iter().any(|k| haystack.contains(&k.to_lowercase()))
}

/// Paths of every erased file in the evidence, for reporting.
#[must_use]
pub fn erased_paths(events: &[AuditEvent]) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = events
        .iter()
        .filter_map(|e| match &e.record {
            AuditRecord::Unlinked { path, .. } => Some(path.clone()),
            _ => None,
        })
        .collect();
    out.sort();
    out.dedup();
    out
}
