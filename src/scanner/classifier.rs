//! File classifier: pattern registry + path heuristics -> one decision per file.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::ClassifierConfig;
use crate::scanner::patterns::{MatchResult, PatternCategory, PatternMatch, PatternRegistry};
use crate::scanner::scoring::RiskScorer;
use crate::scanner::walker::{EntryKind, FileRecord, OpenFileSet};

/// Fate of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Belongs to installed software; never eligible for deletion.
    Protected,
    /// Safe to remove.
    Orphaned,
    /// Developer data that resembles temp data; manual review only.
    Quarantined,
    /// No pattern matched; handled by [`UnknownPolicy`].
    Unknown,
}

impl Outcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Protected => "protected",
            Self::Orphaned => "orphaned",
            Self::Quarantined => "quarantined",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with files no pattern claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPolicy {
    /// Leave in place.
    #[default]
    Keep,
    /// Leave in place and flag in the rationale for review.
    Review,
    /// Treat like a safe-to-clean match (age, size and lock gates still apply).
    Delete,
}

impl UnknownPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Review => "review",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for UnknownPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "review" => Ok(Self::Review),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown policy {other:?} (expected keep, review or delete)")),
        }
    }
}

/// The classifier's verdict for one file. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationDecision {
    pub record: FileRecord,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<PatternMatch>,
    pub risk_score: u8,
    pub rationale: String,
    /// Passed every classification gate; the job still applies the score threshold.
    pub eligible_for_deletion: bool,
}

impl ClassificationDecision {
    /// Category used for per-category totals; `unmatched` when no pattern hit.
    #[must_use]
    pub fn category_label(&self) -> &'static str {
        self.matched.as_ref().map_or("unmatched", |m| m.category.as_str())
    }
}

/// Why a safe-to-clean (or delete-policy unknown) file was held back.
enum Hold {
    TooRecent(u64),
    TooSmall,
    HeldOpen,
}

/// Applies the pattern registry and policy gates to file records.
#[derive(Debug)]
pub struct FileClassifier {
    registry: Arc<PatternRegistry>,
    policy: ClassifierConfig,
    scorer: RiskScorer,
    open_files: OpenFileSet,
    reference_time: DateTime<Utc>,
}

impl FileClassifier {
    /// `reference_time` fixes "now" for every age computation in the job.
    #[must_use]
    pub fn new(
        registry: Arc<PatternRegistry>,
        policy: ClassifierConfig,
        scorer: RiskScorer,
        open_files: OpenFileSet,
        reference_time: DateTime<Utc>,
    ) -> Self {
        Self {
            registry,
            policy,
            scorer,
            open_files,
            reference_time,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    #[must_use]
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.reference_time
    }

    /// Produce exactly one decision for `record`.
    #[must_use]
    pub fn classify(&self, record: FileRecord) -> ClassificationDecision {
        let (outcome, matched, rationale, eligible) = self.decide(&record);
        let mut decision = ClassificationDecision {
            record,
            outcome,
            matched,
            risk_score: 0,
            rationale,
            eligible_for_deletion: eligible,
        };
        decision.risk_score = self.scorer.score(&decision, self.reference_time);
        decision
    }

    fn decide(&self, record: &FileRecord) -> (Outcome, Option<PatternMatch>, String, bool) {
        if record.kind == EntryKind::Link {
            return (
                Outcome::Protected,
                None,
                "symbolic link or junction; never followed or deleted".to_string(),
                false,
            );
        }

        let age_days = record.age_days(self.reference_time);
        match self.registry.match_path(&record.root, &record.path) {
            MatchResult::Matched(m) => match m.category {
                PatternCategory::ProtectedEnterprise => {
                    let rationale = format!("matches protected pattern {:?}", m.pattern);
                    (Outcome::Protected, Some(m), rationale, false)
                }
                PatternCategory::DevelopmentTools => {
                    let rationale = format!(
                        "development tool data matching {:?}; held for manual review",
                        m.pattern
                    );
                    (Outcome::Quarantined, Some(m), rationale, false)
                }
                PatternCategory::SafeToClean => match self.hold_reason(record, age_days) {
                    Some(hold) => {
                        let rationale = format!(
                            "matches safe-to-clean pattern {:?} but {}",
                            m.pattern,
                            self.describe(&hold)
                        );
                        (Outcome::Protected, Some(m), rationale, false)
                    }
                    None => {
                        let rationale = format!(
                            "matches safe-to-clean pattern {:?}; {age_days} days old, unused",
                            m.pattern
                        );
                        (Outcome::Orphaned, Some(m), rationale, true)
                    }
                },
            },
            MatchResult::Unknown => {
                let (rationale, eligible) = match self.policy.unknown_policy {
                    UnknownPolicy::Keep => {
                        ("no pattern matched; kept by default policy".to_string(), false)
                    }
                    UnknownPolicy::Review => (
                        "no pattern matched; flagged for review by policy".to_string(),
                        false,
                    ),
                    UnknownPolicy::Delete => match self.hold_reason(record, age_days) {
                        Some(hold) => (
                            format!(
                                "no pattern matched; delete policy applies but {}",
                                self.describe(&hold)
                            ),
                            false,
                        ),
                        None => (
                            format!("no pattern matched; delete policy, {age_days} days old"),
                            true,
                        ),
                    },
                };
                (Outcome::Unknown, None, rationale, eligible)
            }
        }
    }

    fn hold_reason(&self, record: &FileRecord, age_days: u64) -> Option<Hold> {
        if age_days < self.policy.min_age_days {
            return Some(Hold::TooRecent(age_days));
        }
        if record.size_bytes < self.policy.min_size_bytes {
            return Some(Hold::TooSmall);
        }
        if self.policy.check_open_files && self.open_files.contains(record) {
            return Some(Hold::HeldOpen);
        }
        None
    }

    fn describe(&self, hold: &Hold) -> String {
        match hold {
            Hold::TooRecent(days) => format!(
                "modified {days} days ago, below the {}-day minimum",
                self.policy.min_age_days
            ),
            Hold::TooSmall => format!("smaller than {} bytes", self.policy.min_size_bytes),
            Hold::HeldOpen => "held open by a running process".to_string(),
        }
    }
}
