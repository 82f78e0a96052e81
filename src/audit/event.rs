//! Audit event model and query filters.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::job::JobStatus;
use crate::scanner::classifier::ClassificationDecision;
use crate::scanner::deletion::{DeletionError, DeletionPass};
use crate::scanner::walker::RootScanStats;

/// What happened. One variant per auditable step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditRecord {
    JobStarted {
        roots: Vec<PathBuf>,
        dry_run: bool,
        conservative_mode: bool,
        config_hash: String,
        hostname: String,
        user: String,
    },
    RootScanned {
        stats: RootScanStats,
    },
    RootScanFailed {
        root: PathBuf,
        code: String,
        detail: String,
    },
    Decision {
        decision: ClassificationDecision,
    },
    /// An eligible file was kept because its score fell below the threshold,
    /// or the job was cancelled before it could be erased.
    HeldBack {
        path: PathBuf,
        risk_score: u8,
        threshold: u8,
        reason: String,
    },
    /// Dry run only: the file would have been erased.
    WouldErase {
        path: PathBuf,
        size_bytes: u64,
        risk_score: u8,
    },
    DeletionPass {
        path: PathBuf,
        pass: DeletionPass,
    },
    Unlinked {
        path: PathBuf,
        bytes_freed: u64,
        passes: u32,
    },
    DeletionFailed {
        error: DeletionError,
    },
    JobFinished {
        status: JobStatus,
        files_scanned: u64,
        succeeded: u64,
        failed: u64,
        skipped: u64,
        bytes_freed: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Discriminant of [`AuditRecord`], for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    JobStarted,
    RootScanned,
    RootScanFailed,
    Decision,
    HeldBack,
    WouldErase,
    DeletionPass,
    Unlinked,
    DeletionFailed,
    JobFinished,
}

impl AuditKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JobStarted => "job_started",
            Self::RootScanned => "root_scanned",
            Self::RootScanFailed => "root_scan_failed",
            Self::Decision => "decision",
            Self::HeldBack => "held_back",
            Self::WouldErase => "would_erase",
            Self::DeletionPass => "deletion_pass",
            Self::Unlinked => "unlinked",
            Self::DeletionFailed => "deletion_failed",
            Self::JobFinished => "job_finished",
        }
    }

    /// Kinds that record a change to file content or directory entries.
    #[must_use]
    pub const fn is_destructive(self) -> bool {
        matches!(self, Self::DeletionPass | Self::Unlinked | Self::DeletionFailed)
    }
}

impl AuditRecord {
    #[must_use]
    pub const fn kind(&self) -> AuditKind {
        match self {
            Self::JobStarted { .. } => AuditKind::JobStarted,
            Self::RootScanned { .. } => AuditKind::RootScanned,
            Self::RootScanFailed { .. } => AuditKind::RootScanFailed,
            Self::Decision { .. } => AuditKind::Decision,
            Self::HeldBack { .. } => AuditKind::HeldBack,
            Self::WouldErase { .. } => AuditKind::WouldErase,
            Self::DeletionPass { .. } => AuditKind::DeletionPass,
            Self::Unlinked { .. } => AuditKind::Unlinked,
            Self::DeletionFailed { .. } => AuditKind::DeletionFailed,
            Self::JobFinished { .. } => AuditKind::JobFinished,
        }
    }

    /// File the record is about, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Decision { decision } => Some(&decision.record.path),
            Self::HeldBack { path, .. }
            | Self::WouldErase { path, .. }
            | Self::DeletionPass { path, .. }
            | Self::Unlinked { path, .. } => Some(path),
            Self::DeletionFailed { error } => Some(&error.path),
            Self::RootScanFailed { root, .. } => Some(root),
            Self::RootScanned { stats } => Some(&stats.root),
            Self::JobStarted { .. } | Self::JobFinished { .. } => None,
        }
    }

    /// Whether the record reports a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        match self {
            Self::RootScanFailed { .. } | Self::DeletionFailed { .. } => true,
            Self::JobFinished { status, .. } => *status == JobStatus::Failed,
            _ => false,
        }
    }
}

/// A sequenced, hashed, immutable audit entry as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub seq: u64,
    pub timestamp: String,
    pub job_id: String,
    pub ok: bool,
    pub record: AuditRecord,
    pub prev_hash: String,
    /// SHA-256 over this event serialized with an empty `hash`.
    pub hash: String,
}

/// An event not yet sequenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub job_id: String,
    pub record: AuditRecord,
}

impl AuditEntry {
    #[must_use]
    pub fn new(job_id: impl Into<String>, record: AuditRecord) -> Self {
        Self {
            job_id: job_id.into(),
            record,
        }
    }
}

/// Selects events from a query. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub job_id: Option<String>,
    pub kinds: Vec<AuditKind>,
    pub path: Option<PathBuf>,
    pub min_seq: Option<u64>,
    pub failures_only: bool,
}

impl AuditFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn job(job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: AuditKind) -> Self {
        self.kinds.push(kind);
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn since(mut self, seq: u64) -> Self {
        self.min_seq = Some(seq);
        self
    }

    #[must_use]
    pub fn failures(mut self) -> Self {
        self.failures_only = true;
        self
    }

    #[must_use]
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(job) = &self.job_id
            && &event.job_id != job
        {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&event.record.kind()) {
            return false;
        }
        if let Some(path) = &self.path
            && event.record.path() != Some(path.as_path())
        {
            return false;
        }
        if self.min_seq.is_some_and(|min| event.seq < min) {
            return false;
        }
        !self.failures_only || !event.ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(seq: u64, job: &str, record: AuditRecord) -> AuditEvent {
        AuditEvent {
            seq,
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            job_id: job.to_string(),
            ok: !record.is_failure(),
            record,
            prev_hash: String::new(),
            hash: String::new(),
        }
    }

    fn unlinked(path: &str) -> AuditRecord {
        AuditRecord::Unlinked {
            path: PathBuf::from(path),
            bytes_freed: 10,
            passes: 3,
        }
    }

    #[test]
    fn record_tag_is_snake_case() {
        let json = serde_json::to_string(&unlinked("/a")).unwrap();
        assert!(json.starts_with(r#"{"event":"unlinked""#));
        let back: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), AuditKind::Unlinked);
    }

    #[test]
    fn filter_by_job_kind_and_path() {
        let e = event(4, "job-1", unlinked("/r/a"));
        assert!(AuditFilter::all().matches(&e));
        assert!(AuditFilter::job("job-1").matches(&e));
        assert!(!AuditFilter::job("job-2").matches(&e));
        assert!(AuditFilter::job("job-1").with_kind(AuditKind::Unlinked).matches(&e));
        assert!(!AuditFilter::all().with_kind(AuditKind::Decision).matches(&e));
        assert!(AuditFilter::all().with_path("/r/a").matches(&e));
        assert!(!AuditFilter::all().with_path("/r/b").matches(&e));
        assert!(AuditFilter::all().since(4).matches(&e));
        assert!(!AuditFilter::all().since(5).matches(&e));
        assert!(!AuditFilter::all().failures().matches(&e));
    }

    #[test]
    fn failed_job_finish_is_a_failure() {
        let rec = AuditRecord::JobFinished {
            status: JobStatus::Failed,
            files_scanned: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            bytes_freed: 0,
            error: Some("[ADC-3001] audit".to_string()),
        };
        assert!(rec.is_failure());
        assert!(rec.path().is_none());
    }

    #[test]
    fn destructive_kinds() {
        assert!(AuditKind::DeletionPass.is_destructive());
        assert!(AuditKind::Unlinked.is_destructive());
        assert!(!AuditKind::WouldErase.is_destructive());
        assert!(!AuditKind::Decision.is_destructive());
    }
}
