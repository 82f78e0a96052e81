//! Risk scorer: age curve, protected-sibling penalty, and large-file damping.
//!
//! Scores run from 0 to 100, higher meaning safer to delete. Protected files
//! always score 0. The job compares the score against a threshold that rises in
//! conservative mode; files below it are kept and recorded as skipped.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::config::ScoringConfig;
use crate::scanner::classifier::{ClassificationDecision, Outcome};
use crate::scanner::patterns::PatternRegistry;
use crate::scanner::walker::FileRecord;

/// Additive terms that produced a score, kept for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub age: f64,
    pub sibling_penalty: f64,
    /// Multiplier applied after the additive terms (1.0 unless large).
    pub size_factor: f64,
    pub total: u8,
}

/// Computes risk scores for classified files.
#[derive(Debug)]
pub struct RiskScorer {
    config: ScoringConfig,
    registry: Arc<PatternRegistry>,
    /// parent directory -> contains a protected entry
    sibling_cache: Mutex<HashMap<PathBuf, bool>>,
}

impl RiskScorer {
    #[must_use]
    pub fn new(config: ScoringConfig, registry: Arc<PatternRegistry>) -> Self {
        Self {
            config,
            registry,
            sibling_cache: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a decision's file as of `now`.
    #[must_use]
    pub fn score(&self, decision: &ClassificationDecision, now: DateTime<Utc>) -> u8 {
        self.breakdown(decision.outcome, &decision.record, now).total
    }

    /// Score with every term exposed.
    #[must_use]
    pub fn breakdown(
        &self,
        outcome: Outcome,
        record: &FileRecord,
        now: DateTime<Utc>,
    ) -> ScoreBreakdown {
        let base = match outcome {
            Outcome::Protected => {
                return ScoreBreakdown {
                    base: 0.0,
                    age: 0.0,
                    sibling_penalty: 0.0,
                    size_factor: 1.0,
                    total: 0,
                };
            }
            Outcome::Orphaned => f64::from(self.config.orphaned_base),
            Outcome::Unknown => f64::from(self.config.unknown_base),
            Outcome::Quarantined => 0.0,
        };

        let age = factor_age(
            record.age_days(now),
            self.config.age_saturation_days,
            self.config.age_weight,
        );
        let sibling_penalty = if self.has_protected_sibling(record) {
            f64::from(self.config.protected_sibling_penalty)
        } else {
            0.0
        };
        let size_factor = factor_size(
            record.size_bytes,
            self.config.large_file_threshold_bytes,
            self.config.large_file_factor,
        );

        let raw = (base + age - sibling_penalty).clamp(0.0, 100.0) * size_factor;
        ScoreBreakdown {
            base,
            age,
            sibling_penalty,
            size_factor,
            total: raw.round().clamp(0.0, 100.0) as u8,
        }
    }

    /// Whether any other entry in the file's directory matches a protected pattern.
    #[must_use]
    pub fn has_protected_sibling(&self, record: &FileRecord) -> bool {
        let Some(parent) = record.path.parent() else {
            return false;
        };
        if let Some(cached) = self.sibling_cache.lock().get(parent).copied() {
            return cached;
        }
        let found = self.scan_parent(&record.root, parent, &record.path);
        self.sibling_cache.lock().insert(parent.to_path_buf(), found);
        found
    }

    fn scan_parent(&self, root: &Path, parent: &Path, own: &Path) -> bool {
        let Ok(entries) = fs::read_dir(parent) else {
            return false;
        };
        entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p != own)
            .any(|p| self.registry.is_protected(root, &p))
    }
}

/// Linear ramp to `weight` points at `saturation_days`, flat afterwards.
fn factor_age(age_days: u64, saturation_days: u64, weight: u8) -> f64 {
    if saturation_days == 0 {
        return f64::from(weight);
    }
    let fraction = (age_days.min(saturation_days) as f64) / (saturation_days as f64);
    f64::from(weight) * fraction
}

fn factor_size(size_bytes: u64, threshold: u64, large_factor: f64) -> f64 {
    if size_bytes > threshold { large_factor } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PatternsConfig;
    use crate::scanner::walker::EntryKind;
    use proptest::prelude::*;

    fn registry() -> Arc<PatternRegistry> {
        let cfg = PatternsConfig {
            protected_enterprise: vec!["microsoft".to_string()],
            development_tools: vec!["npm".to_string()],
            safe_to_clean: vec!["cache".to_string()],
            protected_extensions: Vec::new(),
        };
        Arc::new(PatternRegistry::load(&cfg).unwrap())
    }

    fn record(
        path: &Path,
        root: &Path,
        age_days: i64,
        size: u64,
        now: DateTime<Utc>,
    ) -> FileRecord {
        FileRecord {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
            size_bytes: size,
            modified: now - chrono::Duration::days(age_days),
            kind: EntryKind::File,
            file_id: None,
        }
    }

    #[test]
    fn protected_scores_zero() {
        let scorer = RiskScorer::new(ScoringConfig::default(), registry());
        let now = Utc::now();
        let r = record(Path::new("/nowhere/a"), Path::new("/nowhere"), 500, 1, now);
        assert_eq!(scorer.breakdown(Outcome::Protected, &r, now).total, 0);
    }

    #[test]
    fn score_increases_with_age_until_saturation() {
        let scorer = RiskScorer::new(ScoringConfig::default(), registry());
        let now = Utc::now();
        let root = Path::new("/nowhere");
        let aged = |days| {
            let r = record(&root.join("a"), root, days, 1, now);
            scorer.breakdown(Outcome::Orphaned, &r, now)
        };
        let (young, mid, old, ancient) = (aged(5), aged(40), aged(90), aged(900));
        assert!(young.total < mid.total);
        assert!(mid.total < old.total);
        assert_eq!(old.total, ancient.total);
        assert_eq!(old.total, 100);
        // 30 + 70 * 40 / 90
        assert_eq!(mid.total, 61);
    }

    #[test]
    fn large_files_are_damped_sharply() {
        let mut cfg = ScoringConfig::default();
        cfg.large_file_threshold_bytes = 1_000;
        let scorer = RiskScorer::new(cfg, registry());
        let now = Utc::now();
        let root = Path::new("/nowhere");
        let sized = |size| {
            let r = record(&root.join("a"), root, 90, size, now);
            scorer.breakdown(Outcome::Orphaned, &r, now)
        };
        let (small, large) = (sized(1_000), sized(1_001));
        assert_eq!(small.total, 100);
        assert_eq!(large.total, 25);
        assert!((large.size_factor - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn protected_sibling_lowers_score() {
        let tmp = tempfile::tempdir().unwrap();
        let plain = tmp.path().join("plain");
        let near = tmp.path().join("near");
        fs::create_dir_all(&plain).unwrap();
        fs::create_dir_all(near.join("microsoft")).unwrap();
        fs::write(plain.join("cache.bin"), b"x").unwrap();
        fs::write(near.join("cache.bin"), b"x").unwrap();

        let scorer = RiskScorer::new(ScoringConfig::default(), registry());
        let now = Utc::now();
        let score_in = |dir: &Path| {
            let r = record(&dir.join("cache.bin"), tmp.path(), 90, 1, now);
            scorer.breakdown(Outcome::Orphaned, &r, now)
        };
        let (far, close) = (score_in(&plain), score_in(&near));
        assert_eq!(far.sibling_penalty, 0.0);
        assert_eq!(close.sibling_penalty, 25.0);
        assert_eq!(close.total, far.total - 25);
    }

    proptest! {
        #[test]
        fn score_always_within_range(
            age in 0i64..20_000,
            size in 0u64..u64::MAX / 2,
            outcome in prop_oneof![
                Just(Outcome::Protected),
                Just(Outcome::Orphaned),
                Just(Outcome::Quarantined),
                Just(Outcome::Unknown),
            ],
        ) {
            let scorer = RiskScorer::new(ScoringConfig::default(), registry());
            let now = Utc::now();
            let root = Path::new("/nowhere");
            let b = scorer.breakdown(outcome, &record(&root.join("f"), root, age, size, now), now);
            prop_assert!(b.total <= 100);
            if outcome == Outcome::Protected {
                prop_assert_eq!(b.total, 0);
            }
        }
    }
}
