//! Operational activity log: JSONL lines written by a dedicated logger thread.
//!
//! Job threads send `ActivityEvent`s through a bounded crossbeam channel with
//! `try_send()`, so a slow disk never stalls classification or erasure. This
//! log is best-effort; the audit trail is the record of truth.
//!
//! Fallback chain when the primary file fails:
//! 1. Primary file path
//! 2. stderr with `[ADC-LOG]` prefix
//! 3. Silent discard

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, SystemTime};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::{Deserialize, Serialize};

use crate::core::errors::{AdcError, Result};

const CHANNEL_CAPACITY: usize = 1024;

/// UTC timestamp with millisecond precision, shared by every log line.
#[must_use]
pub fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ──────────────────── events ────────────────────

/// Events accepted by the activity logger.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    JobStarted {
        job_id: String,
        roots: usize,
        dry_run: bool,
        config_hash: String,
    },
    JobFinished {
        job_id: String,
        status: String,
        succeeded: u64,
        failed: u64,
        skipped: u64,
        bytes_freed: u64,
        duration_ms: u64,
    },
    RootScanStarted {
        job_id: String,
        root: PathBuf,
    },
    RootScanCompleted {
        job_id: String,
        root: PathBuf,
        files: u64,
        duration_ms: u64,
    },
    RootScanFailed {
        job_id: String,
        root: PathBuf,
        error_code: String,
        error_message: String,
    },
    /// No pattern claimed the file; the unknown policy decided.
    ClassificationAmbiguity {
        job_id: String,
        path: PathBuf,
        policy: String,
    },
    FileErased {
        job_id: String,
        path: PathBuf,
        size_bytes: u64,
        score: u8,
        duration_ms: u64,
    },
    DeletionFailed {
        job_id: String,
        path: PathBuf,
        error_code: String,
        error_message: String,
    },
    Warning {
        message: String,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel to request graceful shutdown of the logger thread.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    JobStart,
    JobFinish,
    RootScanStart,
    RootScanComplete,
    RootScanFail,
    ClassificationAmbiguity,
    FileErase,
    DeletionFail,
    Warning,
    Error,
}

/// One JSONL line. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    #[must_use]
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            job_id: None,
            path: None,
            size: None,
            score: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

fn display(path: &Path) -> Option<String> {
    Some(path.to_string_lossy().into_owned())
}

fn to_entry(event: &ActivityEvent) -> Option<LogEntry> {
    let entry = match event {
        ActivityEvent::JobStarted {
            job_id,
            roots,
            dry_run,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::JobStart, Severity::Info);
            e.job_id = Some(job_id.clone());
            e.details = Some(format!("roots={roots} dry_run={dry_run} config_hash={config_hash}"));
            e
        }
        ActivityEvent::JobFinished {
            job_id,
            status,
            succeeded,
            failed,
            skipped,
            bytes_freed,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::JobFinish, Severity::Info);
            e.job_id = Some(job_id.clone());
            e.size = Some(*bytes_freed);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(status != "failed");
            e.details = Some(format!(
                "status={status} succeeded={succeeded} failed={failed} skipped={skipped}"
            ));
            e
        }
        ActivityEvent::RootScanStarted { job_id, root } => {
            let mut e = LogEntry::new(EventType::RootScanStart, Severity::Info);
            e.job_id = Some(job_id.clone());
            e.path = display(root);
            e
        }
        ActivityEvent::RootScanCompleted {
            job_id,
            root,
            files,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::RootScanComplete, Severity::Info);
            e.job_id = Some(job_id.clone());
            e.path = display(root);
            e.duration_ms = Some(*duration_ms);
            e.details = Some(format!("files={files}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::RootScanFailed {
            job_id,
            root,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::RootScanFail, Severity::Warning);
            e.job_id = Some(job_id.clone());
            e.path = display(root);
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::ClassificationAmbiguity { job_id, path, policy } => {
            let mut e = LogEntry::new(EventType::ClassificationAmbiguity, Severity::Info);
            e.job_id = Some(job_id.clone());
            e.path = display(path);
            e.details = Some(format!("policy={policy}"));
            e
        }
        ActivityEvent::FileErased {
            job_id,
            path,
            size_bytes,
            score,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::FileErase, Severity::Info);
            e.job_id = Some(job_id.clone());
            e.path = display(path);
            e.size = Some(*size_bytes);
            e.score = Some(*score);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::DeletionFailed {
            job_id,
            path,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::DeletionFail, Severity::Warning);
            e.job_id = Some(job_id.clone());
            e.path = display(path);
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::Warning { message } => {
            let mut e = LogEntry::new(EventType::Warning, Severity::Warning);
            e.details = Some(message.clone());
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.ok = Some(false);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        ActivityEvent::Shutdown => return None,
    };
    Some(entry)
}

// ──────────────────── handle ────────────────────

/// Cheaply-cloneable, non-blocking sender.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Option<Sender<ActivityEvent>>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// A handle that discards everything. Used when no activity log is configured.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            tx: None,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue an event. Drops it (and counts the drop) if the channel is full.
    pub fn send(&self, event: ActivityEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(TrySendError::Full(_)) = tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit. Blocks only on a full channel.
    pub fn shutdown(&self) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(ActivityEvent::Shutdown);
        }
    }
}

impl std::fmt::Debug for ActivityLoggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLoggerHandle")
            .field("enabled", &self.tx.is_some())
            .field("dropped_events", &self.dropped_events())
            .finish()
    }
}

// ──────────────────── writer ────────────────────

#[derive(Debug, Clone)]
pub struct ActivityLogConfig {
    pub path: PathBuf,
    /// Rotate once the file would exceed this size.
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
    pub channel_capacity: usize,
}

impl ActivityLogConfig {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size_bytes: 50 * 1024 * 1024,
            max_rotated_files: 5,
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

struct ActivityWriter {
    config: ActivityLogConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
}

impl ActivityWriter {
    fn open(config: ActivityLogConfig) -> Self {
        let mut w = Self {
            config,
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
        };
        match open_append(&w.config.path) {
            Ok((file, size)) => {
                w.writer = Some(BufWriter::new(file));
                w.state = WriterState::Normal;
                w.bytes_written = size;
            }
            Err(e) => {
                let _ =
                    writeln!(io::stderr(), "[ADC-LOG] cannot open activity log, using stderr: {e}");
                w.state = WriterState::Stderr;
            }
        }
        w
    }

    fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.write_line(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[ADC-LOG] serialize error: {e}");
            }
        }
    }

    fn write_line(&mut self, line: &str) {
        if self.state == WriterState::Normal
            && self.bytes_written + line.len() as u64 > self.config.max_size_bytes
        {
            self.rotate();
        }
        match self.state {
            WriterState::Normal => {
                let ok = self
                    .writer
                    .as_mut()
                    .is_some_and(|w| w.write_all(line.as_bytes()).is_ok());
                if ok {
                    self.bytes_written += line.len() as u64;
                } else {
                    self.writer = None;
                    self.state = WriterState::Stderr;
                    let _ =
                        writeln!(io::stderr(), "[ADC-LOG] activity log write failed, using stderr");
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[ADC-LOG] {line}").is_err() {
                    self.state = WriterState::Discard;
                }
            }
            WriterState::Discard => {}
        }
    }

    fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
            let _ = w.get_ref().sync_data();
        }
    }

    fn rotate(&mut self) {
        self.flush();
        self.writer = None;
        let base = self.config.path.clone();
        let max = self.config.max_rotated_files;
        if max > 0 {
            let _ = fs::remove_file(rotated_name(&base, max));
            for i in (1..max).rev() {
                let _ = fs::rename(rotated_name(&base, i), rotated_name(&base, i + 1));
            }
            let _ = fs::rename(&base, rotated_name(&base, 1));
        } else {
            let _ = fs::remove_file(&base);
        }
        match open_append(&base) {
            Ok((file, size)) => {
                self.writer = Some(BufWriter::new(file));
                self.bytes_written = size;
            }
            Err(_) => self.state = WriterState::Stderr,
        }
    }
}

fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| AdcError::io(parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AdcError::io(path, e))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread. It runs until `shutdown()` or until every handle is dropped.
pub fn spawn_activity_logger(
    config: ActivityLogConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let handle = ActivityLoggerHandle {
        tx: Some(tx),
        dropped_events: Arc::clone(&dropped),
    };
    let join = thread::Builder::new()
        .name("adc-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config, &dropped))
        .map_err(|e| AdcError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;
    Ok((handle, join))
}

fn logger_thread_main(
    rx: &Receiver<ActivityEvent>,
    config: ActivityLogConfig,
    dropped: &AtomicU64,
) {
    let mut writer = ActivityWriter::open(config);
    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Warning, Severity::Warning);
            warn.details = Some(format!("{d} activity events dropped due to back-pressure"));
            writer.write_entry(&warn);
        }
        match to_entry(&event) {
            Some(entry) => writer.write_entry(&entry),
            None => break,
        }
    }
    writer.flush();
}

// ──────────────────── retention ────────────────────

/// Delete rotated activity logs (`<name>.<n>`) in `dir` older than `max_age`.
///
/// Returns the number of files removed. The live log and the audit trail are
/// never touched.
pub fn prune_rotated_logs(dir: &Path, base_name: &str, max_age: Duration) -> Result<usize> {
    let cutoff = SystemTime::now().checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH);
    let prefix = format!("{base_name}.");
    let mut removed = 0;
    for entry in fs::read_dir(dir).map_err(|e| AdcError::io(dir, e))? {
        let entry = entry.map_err(|e| AdcError::io(dir, e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(suffix) = name.strip_prefix(&prefix) else {
            continue;
        };
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let modified = entry.metadata().and_then(|m| m.modified()).unwrap_or(SystemTime::now());
        if modified < cutoff {
            let path = entry.path();
            fs::remove_file(&path).map_err(|e| AdcError::io(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}
