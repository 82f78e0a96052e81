//! Cleanup jobs: lifecycle, summary model, orchestration and fleet roll-up.
//!
//! ```text
//! Created -> Scanning -> Classifying -> DryRunComplete -> Completed
//!                                    \-> Deleting ------> Completed
//! any non-terminal phase -> Cancelled | Failed
//! ```

#![allow(missing_docs)]

pub mod cancel;
pub mod fleet;
pub mod orchestrator;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::classifier::{ClassificationDecision, Outcome};
use crate::scanner::deletion::DeletionError;
use crate::scanner::walker::RootScanStats;

pub use cancel::CancellationToken;
pub use orchestrator::{JobHandle, JobRequest, Orchestrator};

/// Fine-grained lifecycle position of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Created,
    Scanning,
    Classifying,
    DryRunComplete,
    Deleting,
    Completed,
    Cancelled,
    Failed,
}

impl JobPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Cancelled | Self::Failed => true,
            Self::Scanning => matches!(self, Self::Created),
            Self::Classifying => matches!(self, Self::Scanning),
            Self::DryRunComplete | Self::Deleting => matches!(self, Self::Classifying),
            Self::Completed => matches!(self, Self::DryRunComplete | Self::Deleting),
            Self::Created => false,
        }
    }

    /// Coarse status for this phase.
    #[must_use]
    pub const fn status(self) -> JobStatus {
        match self {
            Self::Completed => JobStatus::Completed,
            Self::Cancelled => JobStatus::Cancelled,
            Self::Failed => JobStatus::Failed,
            _ => JobStatus::Running,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Scanning => "scanning",
            Self::Classifying => "classifying",
            Self::DryRunComplete => "dry_run_complete",
            Self::Deleting => "deleting",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse job status reported to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootStatus {
    Completed,
    Failed,
}

/// Outcome of enumerating one scan root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootResult {
    pub root: PathBuf,
    pub status: RootStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<RootScanStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub protected: u64,
    pub orphaned: u64,
    pub quarantined: u64,
    pub unknown: u64,
}

impl OutcomeCounts {
    pub fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Protected => self.protected += 1,
            Outcome::Orphaned => self.orphaned += 1,
            Outcome::Quarantined => self.quarantined += 1,
            Outcome::Unknown => self.unknown += 1,
        }
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.protected + self.orphaned + self.quarantined + self.unknown
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub files: u64,
    pub bytes: u64,
    pub bytes_freed: u64,
}

/// Job summary. `status()` on a handle returns a snapshot of this.
///
/// Every classified file ends in exactly one of `succeeded` (erased, or would
/// be in a dry run), `failed` (deletion error) or `skipped` (kept).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupJob {
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub roots: Vec<PathBuf>,
    pub hostname: String,
    pub user: String,
    pub dry_run: bool,
    pub conservative_mode: bool,
    pub delete_threshold: u8,
    pub phase: JobPhase,
    pub status: JobStatus,
    pub files_scanned: u64,
    pub total_bytes: u64,
    pub outcomes: OutcomeCounts,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub bytes_freed: u64,
    /// Keyed by pattern category, or `unmatched`.
    pub category_totals: BTreeMap<String, CategoryTotal>,
    pub root_results: Vec<RootResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CleanupJob {
    #[must_use]
    pub fn new(
        id: String,
        roots: Vec<PathBuf>,
        dry_run: bool,
        conservative_mode: bool,
        delete_threshold: u8,
    ) -> Self {
        Self {
            id,
            started_at: Utc::now(),
            ended_at: None,
            roots,
            hostname: hostname(),
            user: username(),
            dry_run,
            conservative_mode,
            delete_threshold,
            phase: JobPhase::Created,
            status: JobStatus::Running,
            files_scanned: 0,
            total_bytes: 0,
            outcomes: OutcomeCounts::default(),
            succeeded: 0,
            failed: 0,
            skipped: 0,
            bytes_freed: 0,
            category_totals: BTreeMap::new(),
            root_results: Vec::new(),
            error: None,
        }
    }

    /// Move along the lifecycle, passing through intermediate phases if needed.
    ///
    /// Returns false (and leaves the phase alone) if `target` is unreachable.
    pub fn advance(&mut self, target: JobPhase) -> bool {
        while self.phase != target {
            let next = if self.phase.can_transition_to(target) {
                target
            } else {
                match self.phase {
                    JobPhase::Created => JobPhase::Scanning,
                    JobPhase::Scanning => JobPhase::Classifying,
                    JobPhase::Classifying if self.dry_run => JobPhase::DryRunComplete,
                    JobPhase::Classifying => JobPhase::Deleting,
                    _ => return false,
                }
            };
            if !self.phase.can_transition_to(next) {
                return false;
            }
            self.phase = next;
        }
        self.status = self.phase.status();
        if self.phase.is_terminal() && self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
        true
    }

    /// Fold one decision into the counters.
    pub fn record_decision(&mut self, decision: &ClassificationDecision) {
        self.files_scanned += 1;
        self.total_bytes = self.total_bytes.saturating_add(decision.record.size_bytes);
        self.outcomes.add(decision.outcome);
        let total = self
            .category_totals
            .entry(decision.category_label().to_string())
            .or_default();
        total.files += 1;
        total.bytes = total.bytes.saturating_add(decision.record.size_bytes);
    }

    pub fn record_erased(&mut self, decision: &ClassificationDecision, bytes_freed: u64) {
        self.succeeded += 1;
        self.bytes_freed = self.bytes_freed.saturating_add(bytes_freed);
        if let Some(total) = self.category_totals.get_mut(decision.category_label()) {
            total.bytes_freed = total.bytes_freed.saturating_add(bytes_freed);
        }
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        u64::try_from((end - self.started_at).num_milliseconds()).unwrap_or(0)
    }
}

/// Everything a finished job produced, for reporting collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job: CleanupJob,
    pub decisions: Vec<ClassificationDecision>,
    pub deletion_errors: Vec<DeletionError>,
}

fn hostname() -> String {
    #[cfg(unix)]
    {
        if let Ok(name) = nix::unistd::gethostname() {
            return name.to_string_lossy().into_owned();
        }
    }
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn username() -> String {
    #[cfg(unix)]
    {
        if let Ok(Some(user)) = nix::unistd::User::from_uid(nix::unistd::geteuid()) {
            return user.name;
        }
    }
    std::env::var("USERNAME")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(dry_run: bool) -> CleanupJob {
        CleanupJob::new("j".to_string(), vec![PathBuf::from("/r")], dry_run, false, 50)
    }

    #[test]
    fn transitions_follow_lifecycle() {
        use JobPhase::*;
        assert!(Created.can_transition_to(Scanning));
        assert!(!Created.can_transition_to(Classifying));
        assert!(Classifying.can_transition_to(DryRunComplete));
        assert!(Classifying.can_transition_to(Deleting));
        assert!(Deleting.can_transition_to(Completed));
        assert!(!Classifying.can_transition_to(Completed));
        assert!(Scanning.can_transition_to(Cancelled));
        assert!(Created.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Cancelled.can_transition_to(Completed));
    }

    #[test]
    fn advance_walks_intermediate_phases() {
        let mut dry = job(true);
        assert!(dry.advance(JobPhase::Completed));
        assert_eq!(dry.status, JobStatus::Completed);
        assert!(dry.ended_at.is_some());

        let mut real = job(false);
        assert!(real.advance(JobPhase::Classifying));
        assert_eq!(real.status, JobStatus::Running);
        assert!(real.advance(JobPhase::Deleting));
        assert!(!real.advance(JobPhase::DryRunComplete));
        assert_eq!(real.phase, JobPhase::Deleting);
    }

    #[test]
    fn terminal_phase_is_sticky() {
        let mut j = job(false);
        assert!(j.advance(JobPhase::Cancelled));
        assert!(!j.advance(JobPhase::Failed));
        assert_eq!(j.status, JobStatus::Cancelled);
    }

    #[test]
    fn host_identity_is_never_empty() {
        let j = job(true);
        assert!(!j.hostname.is_empty());
        assert!(!j.user.is_empty());
    }
}
