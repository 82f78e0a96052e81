//! Cleanup job orchestration: scan -> classify -> dispose, pipelined across threads.
//!
//! ```text
//!  roots ──► scanner threads ──bounded──► workers (classify, audit, dispose) ──► collector
//!                (walker)     (records)                                        (job state)
//! ```
//!
//! Enumeration keeps running while earlier files are classified. The only
//! ordering guarantee is the audit trail's sequence. Dry runs use the
//! [`DryRun`] disposal, which has no eraser to call.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded, unbounded};
use parking_lot::Mutex;

use crate::audit::event::{AuditEntry, AuditEvent, AuditRecord};
use crate::audit::trail::AuditTrail;
use crate::core::config::Config;
use crate::core::errors::{AdcError, Result};
use crate::job::cancel::CancellationToken;
use crate::job::{CleanupJob, JobPhase, JobReport, JobStatus, RootResult, RootStatus};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::scanner::classifier::{ClassificationDecision, FileClassifier, Outcome};
use crate::scanner::deletion::{DeletionError, EraseFailure, SecureEraser};
use crate::scanner::patterns::PatternRegistry;
use crate::scanner::scoring::RiskScorer;
use crate::scanner::walker::{FileRecord, OpenFileSet, RootWalker, WalkControl, WalkerConfig};

/// How long a blocked sender waits before rechecking the stop flags.
const BACKPRESSURE_POLL: Duration = Duration::from_millis(50);

/// Parameters of one job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub roots: Vec<PathBuf>,
    pub dry_run: bool,
    pub conservative_mode: bool,
}

impl JobRequest {
    #[must_use]
    pub fn dry_run(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            dry_run: true,
            conservative_mode: false,
        }
    }

    #[must_use]
    pub fn destructive(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            dry_run: false,
            conservative_mode: false,
        }
    }

    #[must_use]
    pub fn conservative(mut self, enabled: bool) -> Self {
        self.conservative_mode = enabled;
        self
    }
}

/// Starts cleanup jobs against one configuration and one audit trail.
#[derive(Debug)]
pub struct Orchestrator {
    config: Arc<Config>,
    registry: Arc<PatternRegistry>,
    audit: Arc<AuditTrail>,
    logger: ActivityLoggerHandle,
}

impl Orchestrator {
    /// Validate `config` and compile its pattern sets. Configuration errors are
    /// reported here, before any job exists.
    pub fn new(config: Config, audit: Arc<AuditTrail>) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(PatternRegistry::load(&config.patterns)?);
        Ok(Self {
            config: Arc::new(config),
            registry,
            audit,
            logger: ActivityLoggerHandle::disabled(),
        })
    }

    #[must_use]
    pub fn with_activity_logger(mut self, logger: ActivityLoggerHandle) -> Self {
        self.logger = logger;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn audit(&self) -> &Arc<AuditTrail> {
        &self.audit
    }

    /// Start a job and return immediately with its handle.
    ///
    /// Fails without starting anything if there are no roots, the erasure plan
    /// is invalid, or the `JobStarted` audit event cannot be written.
    pub fn run_job(&self, request: JobRequest) -> Result<JobHandle> {
        if request.roots.is_empty() {
            return Err(AdcError::InvalidConfig {
                details: "a job needs at least one scan root".to_string(),
            });
        }
        let eraser = if request.dry_run {
            None
        } else {
            Some(SecureEraser::from_config(&self.config.erasure)?)
        };

        let job_id = new_job_id();
        let conservative = request.conservative_mode || self.config.job.conservative_mode;
        let threshold = self.config.delete_threshold(conservative);
        let job = CleanupJob::new(
            job_id.clone(),
            request.roots.clone(),
            request.dry_run,
            conservative,
            threshold,
        );
        let config_hash = self.config.stable_hash()?;

        self.audit.append(AuditEntry::new(
            &job_id,
            AuditRecord::JobStarted {
                roots: request.roots.clone(),
                dry_run: request.dry_run,
                conservative_mode: conservative,
                config_hash: config_hash.clone(),
                hostname: job.hostname.clone(),
                user: job.user.clone(),
            },
        ))?;
        self.logger.send(ActivityEvent::JobStarted {
            job_id: job_id.clone(),
            roots: request.roots.len(),
            dry_run: request.dry_run,
            config_hash,
        });

        let state = Arc::new(Mutex::new(job));
        let cancel = CancellationToken::new();
        let run = JobRun {
            config: Arc::clone(&self.config),
            registry: Arc::clone(&self.registry),
            audit: Arc::clone(&self.audit),
            logger: self.logger.clone(),
            job_id: job_id.clone(),
            roots: request.roots,
            threshold,
            state: Arc::clone(&state),
            cancel: cancel.clone(),
            abort: AtomicBool::new(false),
            fatal: Mutex::new(None),
        };

        let join = thread::Builder::new()
            .name(format!("adc-job-{}", short_id(&job_id)))
            .spawn(move || match eraser {
                None => run.execute(&DryRun),
                Some(eraser) => run.execute(&Erase { eraser }),
            })
            .map_err(|source| AdcError::Runtime {
                details: format!("failed to spawn job thread: {source}"),
            })?;

        Ok(JobHandle {
            id: job_id,
            state,
            cancel,
            join,
        })
    }

    /// Run a job to completion on the calling thread's behalf.
    pub fn execute(&self, request: JobRequest) -> Result<JobReport> {
        self.run_job(request)?.wait()
    }
}

/// Handle to a running job.
#[derive(Debug)]
pub struct JobHandle {
    id: String,
    state: Arc<Mutex<CleanupJob>>,
    cancel: CancellationToken,
    join: thread::JoinHandle<Result<JobReport>>,
}

impl JobHandle {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Snapshot of the job summary, including its current phase.
    #[must_use]
    pub fn status(&self) -> CleanupJob {
        self.state.lock().clone()
    }

    /// Request cooperative cancellation. Files already being erased finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Block until the job ends.
    ///
    /// Returns the fatal error if the audit trail failed mid-job; the partial
    /// summary is still visible through [`JobHandle::status`] beforehand.
    pub fn wait(self) -> Result<JobReport> {
        self.join.join().map_err(|_| AdcError::Runtime {
            details: format!("job {} thread panicked", self.id),
        })?
    }
}

fn new_job_id() -> String {
    format!(
        "job-{}-{:08x}",
        Utc::now().format("%Y%m%dT%H%M%S"),
        rand::random::<u32>()
    )
}

fn short_id(job_id: &str) -> &str {
    job_id.rsplit('-').next().unwrap_or(job_id)
}

// ──────────────────── disposal ────────────────────

/// What happened to an eligible file.
#[derive(Debug)]
enum Disposition {
    Erased { bytes_freed: u64 },
    WouldErase,
    Kept,
    Failed(DeletionError),
}

/// Final step for a file that cleared every gate.
///
/// `Err` means the audit trail failed and the job must stop.
trait Disposal: Sync {
    /// Phase entered once every root has been enumerated.
    const AFTER_SCAN: JobPhase;

    fn dispose(&self, run: &JobRun, decision: &ClassificationDecision) -> Result<Disposition>;
}

/// Records what would be erased. Holds no eraser.
struct DryRun;

impl Disposal for DryRun {
    const AFTER_SCAN: JobPhase = JobPhase::Classifying;

    fn dispose(&self, run: &JobRun, decision: &ClassificationDecision) -> Result<Disposition> {
        run.record(AuditRecord::WouldErase {
            path: decision.record.path.clone(),
            size_bytes: decision.record.size_bytes,
            risk_score: decision.risk_score,
        })?;
        Ok(Disposition::WouldErase)
    }
}

struct Erase {
    eraser: SecureEraser,
}

impl Disposal for Erase {
    const AFTER_SCAN: JobPhase = JobPhase::Deleting;

    fn dispose(&self, run: &JobRun, decision: &ClassificationDecision) -> Result<Disposition> {
        let path = &decision.record.path;
        let started = Instant::now();
        let outcome = self.eraser.erase_observed(path, |pass| {
            run.record(AuditRecord::DeletionPass {
                path: path.clone(),
                pass: *pass,
            })
            .map(drop)
        });
        match outcome {
            Ok(receipt) => {
                run.record(AuditRecord::Unlinked {
                    path: path.clone(),
                    bytes_freed: receipt.bytes_freed,
                    passes: u32::try_from(receipt.passes.len()).unwrap_or(u32::MAX),
                })?;
                run.logger.send(ActivityEvent::FileErased {
                    job_id: run.job_id.clone(),
                    path: path.clone(),
                    size_bytes: receipt.bytes_freed,
                    score: decision.risk_score,
                    duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                });
                Ok(Disposition::Erased {
                    bytes_freed: receipt.bytes_freed,
                })
            }
            Err(EraseFailure::Deletion(error)) => {
                run.record(AuditRecord::DeletionFailed { error: error.clone() })?;
                run.logger.send(ActivityEvent::DeletionFailed {
                    job_id: run.job_id.clone(),
                    path: path.clone(),
                    error_code: error.kind.code().to_string(),
                    error_message: error.to_string(),
                });
                Ok(Disposition::Failed(error))
            }
            Err(EraseFailure::Aborted { source, .. }) => Err(source),
        }
    }
}

// ──────────────────── job run ────────────────────

/// Messages from scanner and worker threads to the collector.
enum Progress {
    RootFinished(RootResult),
    Handled {
        decision: ClassificationDecision,
        disposition: Disposition,
    },
}

/// Everything a running job shares between its threads.
struct JobRun {
    config: Arc<Config>,
    registry: Arc<PatternRegistry>,
    audit: Arc<AuditTrail>,
    logger: ActivityLoggerHandle,
    job_id: String,
    roots: Vec<PathBuf>,
    threshold: u8,
    state: Arc<Mutex<CleanupJob>>,
    cancel: CancellationToken,
    /// Set once the audit trail fails; every thread stops at its next boundary.
    abort: AtomicBool,
    fatal: Mutex<Option<AdcError>>,
}

impl JobRun {
    fn record(&self, record: AuditRecord) -> Result<AuditEvent> {
        self.audit.append(AuditEntry::new(&self.job_id, record))
    }

    fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.abort.load(Ordering::Acquire)
    }

    fn trip(&self, error: AdcError) {
        self.logger.send(ActivityEvent::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        });
        let mut slot = self.fatal.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
        self.abort.store(true, Ordering::Release);
    }

    fn advance(&self, phase: JobPhase) {
        self.state.lock().advance(phase);
    }

    fn classifier(&self) -> FileClassifier {
        let open_files = if self.config.classifier.check_open_files {
            OpenFileSet::snapshot()
        } else {
            OpenFileSet::empty()
        };
        FileClassifier::new(
            Arc::clone(&self.registry),
            self.config.classifier.clone(),
            RiskScorer::new(self.config.scoring.clone(), Arc::clone(&self.registry)),
            open_files,
            Utc::now(),
        )
    }

    fn execute<D: Disposal>(&self, disposal: &D) -> Result<JobReport> {
        self.advance(JobPhase::Scanning);
        let classifier = self.classifier();

        let mut decisions = Vec::new();
        let mut deletion_errors = Vec::new();
        let scoped = thread::scope(|scope| -> Result<()> {
            let (root_tx, root_rx) = unbounded::<PathBuf>();
            for root in &self.roots {
                let _ = root_tx.send(root.clone());
            }
            drop(root_tx);

            let (record_tx, record_rx) =
                bounded::<FileRecord>(self.config.job.queue_capacity.max(1));
            let (progress_tx, progress_rx) = unbounded::<Progress>();
            let parallelism = self.config.job.parallelism.max(1);

            for i in 0..parallelism.min(self.roots.len()) {
                let (root_rx, record_tx, progress_tx) =
                    (root_rx.clone(), record_tx.clone(), progress_tx.clone());
                thread::Builder::new()
                    .name(format!("adc-scan-{i}"))
                    .spawn_scoped(scope, move || {
                        self.scan_roots(&root_rx, &record_tx, &progress_tx);
                    })
                    .map_err(|source| self.spawn_failed("scanner", &source))?;
            }
            drop(record_tx);

            for i in 0..parallelism {
                let (record_rx, progress_tx) = (record_rx.clone(), progress_tx.clone());
                let classifier = &classifier;
                thread::Builder::new()
                    .name(format!("adc-worker-{i}"))
                    .spawn_scoped(scope, move || {
                        self.work(classifier, disposal, &record_rx, &progress_tx);
                    })
                    .map_err(|source| self.spawn_failed("worker", &source))?;
            }
            drop(record_rx);
            drop(progress_tx);

            let mut roots_done = 0;
            for progress in progress_rx {
                match progress {
                    Progress::RootFinished(result) => {
                        roots_done += 1;
                        let mut job = self.state.lock();
                        job.root_results.push(result);
                        if roots_done == self.roots.len() {
                            job.advance(D::AFTER_SCAN);
                        }
                    }
                    Progress::Handled { decision, disposition } => {
                        let mut job = self.state.lock();
                        job.record_decision(&decision);
                        match disposition {
                            Disposition::Erased { bytes_freed } => {
                                job.record_erased(&decision, bytes_freed);
                            }
                            Disposition::WouldErase => job.record_erased(&decision, 0),
                            Disposition::Kept => job.skipped += 1,
                            Disposition::Failed(error) => {
                                job.failed += 1;
                                deletion_errors.push(error);
                            }
                        }
                        drop(job);
                        decisions.push(decision);
                    }
                }
            }
            Ok(())
        });
        if let Err(e) = scoped {
            self.trip(e);
        }

        self.finish(decisions, deletion_errors)
    }

    fn spawn_failed(&self, role: &str, source: &std::io::Error) -> AdcError {
        self.abort.store(true, Ordering::Release);
        AdcError::Runtime {
            details: format!("failed to spawn {role} thread: {source}"),
        }
    }

    // ──────────────────── scanning ────────────────────

    fn scan_roots(
        &self,
        roots: &Receiver<PathBuf>,
        records: &Sender<FileRecord>,
        progress: &Sender<Progress>,
    ) {
        let walker = RootWalker::new(WalkerConfig::new(
            self.config.job.max_depth,
            Duration::from_millis(self.config.job.scan_timeout_ms),
        ));
        while let Ok(root) = roots.recv() {
            if self.should_stop() {
                break;
            }
            let result = self.scan_root(&walker, &root, records);
            match result {
                Ok(result) => {
                    let _ = progress.send(Progress::RootFinished(result));
                }
                Err(e) => {
                    self.trip(e);
                    break;
                }
            }
        }
    }

    /// Walk one root. Only an audit failure is returned as `Err`; scan errors
    /// become a failed [`RootResult`].
    fn scan_root(
        &self,
        walker: &RootWalker,
        root: &Path,
        records: &Sender<FileRecord>,
    ) -> Result<RootResult> {
        self.logger.send(ActivityEvent::RootScanStarted {
            job_id: self.job_id.clone(),
            root: root.to_path_buf(),
        });
        let walked = walker.walk(
            root,
            || self.should_stop(),
            |record| self.forward(records, record),
        );
        match walked {
            Ok(stats) => {
                self.record(AuditRecord::RootScanned { stats: stats.clone() })?;
                self.logger.send(ActivityEvent::RootScanCompleted {
                    job_id: self.job_id.clone(),
                    root: root.to_path_buf(),
                    files: stats.files + stats.links,
                    duration_ms: stats.elapsed_ms,
                });
                Ok(RootResult {
                    root: root.to_path_buf(),
                    status: RootStatus::Completed,
                    stats: Some(stats),
                    error: None,
                })
            }
            Err(e) => {
                self.record(AuditRecord::RootScanFailed {
                    root: root.to_path_buf(),
                    code: e.code().to_string(),
                    detail: e.to_string(),
                })?;
                self.logger.send(ActivityEvent::RootScanFailed {
                    job_id: self.job_id.clone(),
                    root: root.to_path_buf(),
                    error_code: e.code().to_string(),
                    error_message: e.to_string(),
                });
                Ok(RootResult {
                    root: root.to_path_buf(),
                    status: RootStatus::Failed,
                    stats: None,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// Hand a record to the workers, rechecking the stop flags while the queue is full.
    fn forward(&self, records: &Sender<FileRecord>, mut record: FileRecord) -> WalkControl {
        loop {
            match records.send_timeout(record, BACKPRESSURE_POLL) {
                Ok(()) => return WalkControl::Continue,
                Err(SendTimeoutError::Timeout(back)) => {
                    if self.should_stop() {
                        return WalkControl::Stop;
                    }
                    record = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => return WalkControl::Stop,
            }
        }
    }

    // ──────────────────── per-file work ────────────────────

    fn work<D: Disposal>(
        &self,
        classifier: &FileClassifier,
        disposal: &D,
        records: &Receiver<FileRecord>,
        progress: &Sender<Progress>,
    ) {
        while let Ok(record) = records.recv() {
            if self.should_stop() {
                break;
            }
            match self.handle(classifier, disposal, record) {
                Ok(handled) => {
                    let _ = progress.send(handled);
                }
                Err(e) => {
                    self.trip(e);
                    break;
                }
            }
        }
    }

    fn handle<D: Disposal>(
        &self,
        classifier: &FileClassifier,
        disposal: &D,
        record: FileRecord,
    ) -> Result<Progress> {
        let decision = classifier.classify(record);
        self.record(AuditRecord::Decision {
            decision: decision.clone(),
        })?;
        if decision.outcome == Outcome::Unknown {
            self.logger.send(ActivityEvent::ClassificationAmbiguity {
                job_id: self.job_id.clone(),
                path: decision.record.path.clone(),
                policy: self.config.classifier.unknown_policy.as_str().to_string(),
            });
        }

        let disposition = if !decision.eligible_for_deletion {
            Disposition::Kept
        } else if decision.risk_score < self.threshold {
            let reason = format!(
                "score {} below threshold {}",
                decision.risk_score, self.threshold
            );
            self.hold_back(&decision, reason)?
        } else if self.cancel.is_cancelled() {
            self.hold_back(&decision, "job cancelled".to_string())?
        } else {
            disposal.dispose(self, &decision)?
        };
        Ok(Progress::Handled { decision, disposition })
    }

    fn hold_back(&self, decision: &ClassificationDecision, reason: String) -> Result<Disposition> {
        self.record(AuditRecord::HeldBack {
            path: decision.record.path.clone(),
            risk_score: decision.risk_score,
            threshold: self.threshold,
            reason,
        })?;
        Ok(Disposition::Kept)
    }

    // ──────────────────── completion ────────────────────

    fn finish(
        &self,
        decisions: Vec<ClassificationDecision>,
        deletion_errors: Vec<DeletionError>,
    ) -> Result<JobReport> {
        let fatal = self.fatal.lock().take();
        let mut job = self.state.lock();

        let (target, error) = if let Some(e) = &fatal {
            (JobPhase::Failed, Some(e.to_string()))
        } else if self.cancel.is_cancelled() {
            (JobPhase::Cancelled, None)
        } else if !job.root_results.is_empty()
            && job.root_results.iter().all(|r| r.status == RootStatus::Failed)
        {
            (JobPhase::Failed, Some("every scan root failed".to_string()))
        } else {
            (JobPhase::Completed, None)
        };

        let finished = |status: JobStatus, error: Option<String>| AuditRecord::JobFinished {
            status,
            files_scanned: job.files_scanned,
            succeeded: job.succeeded,
            failed: job.failed,
            skipped: job.skipped,
            bytes_freed: job.bytes_freed,
            error,
        };
        let closing = self.record(finished(target.status(), error.clone()));

        job.error = error;
        job.advance(target);
        if let Err(e) = closing {
            if fatal.is_none() {
                job.error = Some(e.to_string());
                job.phase = JobPhase::Failed;
                job.status = JobStatus::Failed;
                drop(job);
                return Err(e);
            }
            eprintln!("[ADC-AUDIT] could not record end of job {}: {e}", self.job_id);
        }

        self.logger.send(ActivityEvent::JobFinished {
            job_id: self.job_id.clone(),
            status: job.status.to_string(),
            succeeded: job.succeeded,
            failed: job.failed,
            skipped: job.skipped,
            bytes_freed: job.bytes_freed,
            duration_ms: job.duration_ms(),
        });

        if let Some(e) = fatal {
            return Err(e);
        }
        Ok(JobReport {
            job: job.clone(),
            decisions,
            deletion_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::audit::event::{AuditFilter, AuditKind};

    fn config(audit_dir: &Path) -> Config {
        let mut config = Config::default();
        config.patterns.protected_enterprise = vec!["microsoft".to_string()];
        config.patterns.development_tools = vec!["npm".to_string()];
        config.patterns.safe_to_clean = vec!["cache".to_string()];
        config.patterns.protected_extensions = vec!["pfx".to_string()];
        config.classifier.min_age_days = 0;
        config.classifier.check_open_files = false;
        config.job.parallelism = 2;
        config.job.queue_capacity = 4;
        config.paths.audit_log = audit_dir.join("audit.jsonl");
        config
    }

    fn orchestrator(dir: &Path) -> Orchestrator {
        let config = config(dir);
        let audit = Arc::new(AuditTrail::open(&config.paths.audit_log).unwrap());
        Orchestrator::new(config, audit).unwrap()
    }

    fn tree(root: &Path) {
        fs::create_dir_all(root.join("cache")).unwrap();
        fs::create_dir_all(root.join("microsoft")).unwrap();
        fs::write(root.join("cache/a.tmp"), b"aaaa").unwrap();
        fs::write(root.join("cache/b.tmp"), b"bbbbbbbb").unwrap();
        fs::write(root.join("microsoft/keep.dat"), b"keep").unwrap();
    }

    #[test]
    fn rejects_empty_roots() {
        let tmp = tempfile::tempdir().unwrap();
        let err = orchestrator(tmp.path()).run_job(JobRequest::dry_run(Vec::new())).unwrap_err();
        assert_eq!(err.code(), "ADC-1001");
    }

    #[test]
    fn invalid_config_never_starts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        config.erasure.pass_count = 0;
        let audit = Arc::new(AuditTrail::open(&config.paths.audit_log).unwrap());
        let err = Orchestrator::new(config, Arc::clone(&audit)).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(audit.next_seq(), 1);
    }

    #[test]
    fn dry_run_counts_and_keeps_files() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        tree(&root);
        let orch = orchestrator(tmp.path());
        let report = orch.execute(JobRequest::dry_run(vec![root.clone()])).unwrap();

        assert_eq!(report.job.status, JobStatus::Completed);
        assert_eq!(report.job.phase, JobPhase::Completed);
        assert_eq!(report.job.files_scanned, 3);
        assert_eq!(report.decisions.len(), 3);
        assert_eq!(
            report.job.succeeded + report.job.failed + report.job.skipped,
            report.job.files_scanned
        );
        assert_eq!(report.job.bytes_freed, 0);
        assert!(root.join("cache/a.tmp").exists());

        let events = orch.audit().collect(AuditFilter::job(&report.job.id)).unwrap();
        assert!(events.iter().all(|e| !e.record.kind().is_destructive()));
        assert_eq!(events.first().map(|e| e.record.kind()), Some(AuditKind::JobStarted));
        assert_eq!(events.last().map(|e| e.record.kind()), Some(AuditKind::JobFinished));
    }

    #[test]
    fn missing_root_fails_job_but_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let orch = orchestrator(tmp.path());
        let report = orch
            .execute(JobRequest::dry_run(vec![tmp.path().join("absent")]))
            .unwrap();
        assert_eq!(report.job.status, JobStatus::Failed);
        assert_eq!(report.job.root_results.len(), 1);
        assert_eq!(report.job.root_results[0].status, RootStatus::Failed);
    }

    #[test]
    fn one_bad_root_does_not_fail_job() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        tree(&root);
        let orch = orchestrator(tmp.path());
        let report = orch
            .execute(JobRequest::dry_run(vec![tmp.path().join("absent"), root]))
            .unwrap();
        assert_eq!(report.job.status, JobStatus::Completed);
        assert_eq!(report.job.files_scanned, 3);
        let failed = orch
            .audit()
            .collect(AuditFilter::job(&report.job.id).with_kind(AuditKind::RootScanFailed))
            .unwrap();
        assert_eq!(failed.len(), 1);
    }

    #[test]
    fn slow_root_times_out_while_small_root_completes() {
        let tmp = tempfile::tempdir().unwrap();
        let small = tmp.path().join("small");
        fs::create_dir_all(&small).unwrap();
        let large = tmp.path().join("large");
        for d in 0..60 {
            let dir = large.join(format!("d{d:02}"));
            fs::create_dir_all(&dir).unwrap();
            for f in 0..100 {
                fs::File::create(dir.join(format!("f{f:03}.dat"))).unwrap();
            }
        }
        let mut config = config(tmp.path());
        config.job.scan_timeout_ms = 1;
        let audit = Arc::new(AuditTrail::open(&config.paths.audit_log).unwrap());
        let orch = Orchestrator::new(config, audit).unwrap();

        let report = orch
            .execute(JobRequest::dry_run(vec![small.clone(), large.clone()]))
            .unwrap();

        assert_eq!(report.job.status, JobStatus::Completed);
        let status_of = |root: &Path| {
            report
                .job
                .root_results
                .iter()
                .find(|r| r.root.as_path() == root)
                .map(|r| r.status)
        };
        assert_eq!(status_of(&small), Some(RootStatus::Completed));
        assert_eq!(status_of(&large), Some(RootStatus::Failed));
        let failed = orch
            .audit()
            .collect(AuditFilter::job(&report.job.id).with_kind(AuditKind::RootScanFailed))
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].record.path(), Some(large.as_path()));
        assert_eq!(
            report.job.succeeded + report.job.failed + report.job.skipped,
            report.job.files_scanned
        );
    }

    #[test]
    fn cancelled_job_keeps_counts_consistent() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        tree(&root);
        let orch = orchestrator(tmp.path());
        let handle = orch.run_job(JobRequest::destructive(vec![root.clone()])).unwrap();
        handle.cancel();
        let report = handle.wait().unwrap();
        // the job may have handled some files before noticing the flag
        assert!(matches!(report.job.status, JobStatus::Cancelled | JobStatus::Completed));
        assert_eq!(
            report.job.succeeded + report.job.failed + report.job.skipped,
            report.job.files_scanned
        );
    }

    #[test]
    fn short_id_takes_suffix() {
        assert_eq!(short_id("job-20260101T000000-0badf00d"), "0badf00d");
    }
}
