//! Multi-host roll-up of per-host job summaries. Transport is the caller's concern.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::job::{CleanupJob, JobStatus};

/// One host's contribution: its job summary, or why none was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSummary {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<CleanupJob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HostSummary {
    #[must_use]
    pub fn from_job(job: CleanupJob) -> Self {
        Self {
            host: job.hostname.clone(),
            job: Some(job),
            error: None,
        }
    }

    #[must_use]
    pub fn unreachable(host: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            job: None,
            error: Some(error.into()),
        }
    }

    /// A host succeeds when its job completed (or was cancelled cleanly) without error.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
            && self
                .job
                .as_ref()
                .is_some_and(|j| matches!(j.status, JobStatus::Completed | JobStatus::Cancelled))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetResult {
    pub total_hosts: u64,
    pub successful_hosts: u64,
    pub failed_hosts: u64,
    pub files_scanned: u64,
    pub files_deleted: u64,
    pub deletion_failures: u64,
    pub bytes_freed: u64,
    /// Hosts that failed, in input order.
    pub failed: Vec<String>,
}

impl FleetResult {
    #[must_use]
    pub fn aggregate(hosts: &[HostSummary]) -> Self {
        let mut out = Self::default();
        for host in hosts {
            out.total_hosts += 1;
            if host.succeeded() {
                out.successful_hosts += 1;
            } else {
                out.failed_hosts += 1;
                out.failed.push(host.host.clone());
            }
            if let Some(job) = &host.job {
                out.files_scanned += job.files_scanned;
                out.deletion_failures += job.failed;
                if !job.dry_run {
                    out.files_deleted += job.succeeded;
                    out.bytes_freed = out.bytes_freed.saturating_add(job.bytes_freed);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobPhase;
    use std::path::PathBuf;

    fn finished(
        host: &str,
        dry_run: bool,
        succeeded: u64,
        bytes: u64,
        phase: JobPhase,
    ) -> HostSummary {
        let roots = vec![PathBuf::from("/r")];
        let mut job = CleanupJob::new(host.to_string(), roots, dry_run, false, 50);
        job.hostname = host.to_string();
        job.files_scanned = succeeded + 2;
        job.succeeded = succeeded;
        job.bytes_freed = bytes;
        job.advance(phase);
        HostSummary::from_job(job)
    }

    #[test]
    fn aggregate_sums_hosts() {
        let hosts = vec![
            finished("a", false, 3, 300, JobPhase::Completed),
            finished("b", false, 1, 100, JobPhase::Failed),
            finished("c", true, 5, 0, JobPhase::Completed),
            HostSummary::unreachable("d", "connection refused"),
        ];
        let fleet = FleetResult::aggregate(&hosts);
        assert_eq!(fleet.total_hosts, 4);
        assert_eq!(fleet.successful_hosts, 2);
        assert_eq!(fleet.failed_hosts, 2);
        assert_eq!(fleet.failed, vec!["b".to_string(), "d".to_string()]);
        // dry-run host contributes nothing deleted
        assert_eq!(fleet.files_deleted, 4);
        assert_eq!(fleet.bytes_freed, 400);
        assert_eq!(fleet.files_scanned, 5 + 3 + 7);
    }

    #[test]
    fn empty_fleet_is_zeroed() {
        assert_eq!(FleetResult::aggregate(&[]), FleetResult::default());
    }
}
