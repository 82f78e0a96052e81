//! Per-root file enumeration with depth, device, deadline, and cancellation guards.
//!
//! The walker never follows symbolic links or junctions. A link is reported as a
//! [`FileRecord`] of kind [`EntryKind::Link`] so that the classifier can record a
//! decision for it, but nothing behind it is ever visited.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::{AdcError, Result};

/// What kind of directory entry a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    /// Symbolic link or junction point.
    Link,
}

/// One discovered file. Read-only after the scan creates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Scan root this file was found under.
    pub root: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
    pub kind: EntryKind,
    /// `(device, inode)` on unix, used for open-file checks.
    #[serde(default, skip)]
    pub file_id: Option<(u64, u64)>,
}

impl FileRecord {
    /// Whole days between `modified` and `now`. Future timestamps count as zero.
    #[must_use]
    pub fn age_days(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((now - self.modified).num_days()).unwrap_or(0)
    }

    /// Build a record from `symlink_metadata` of `path`.
    pub fn from_path(root: &Path, path: &Path) -> Result<Self> {
        let meta = fs::symlink_metadata(path).map_err(|e| AdcError::io(path, e))?;
        Ok(Self::from_metadata(root, path, &meta))
    }

    fn from_metadata(root: &Path, path: &Path, meta: &fs::Metadata) -> Self {
        let modified = meta
            .modified()
            .map_or_else(|_| Utc::now(), DateTime::<Utc>::from);
        Self {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
            size_bytes: meta.len(),
            modified,
            kind: if meta.file_type().is_symlink() {
                EntryKind::Link
            } else {
                EntryKind::File
            },
            file_id: file_id(meta),
        }
    }
}

#[cfg(unix)]
fn file_id(meta: &fs::Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn file_id(_meta: &fs::Metadata) -> Option<(u64, u64)> {
    None
}

#[cfg(unix)]
fn device_of(meta: &fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.dev())
}

#[cfg(not(unix))]
fn device_of(_meta: &fs::Metadata) -> Option<u64> {
    None
}

/// Walker limits for one root.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub max_depth: usize,
    /// Enumeration budget. Time spent inside the record sink is not charged.
    pub timeout: Duration,
    /// Do not descend into directories on a different device than the root.
    pub stay_on_device: bool,
}

impl WalkerConfig {
    #[must_use]
    pub fn new(max_depth: usize, timeout: Duration) -> Self {
        Self {
            max_depth,
            timeout,
            stay_on_device: true,
        }
    }
}

/// What the sink wants the walker to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    Stop,
}

/// Counters for one root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootScanStats {
    pub root: PathBuf,
    pub files: u64,
    pub links: u64,
    pub directories: u64,
    pub bytes: u64,
    /// Entries that could not be read (permission denied, vanished).
    pub unreadable: u64,
    pub elapsed_ms: u64,
    /// The walk was stopped by the sink or the stop predicate before finishing.
    pub interrupted: bool,
}

/// Sequential depth-first walker for a single scan root.
#[derive(Debug, Clone)]
pub struct RootWalker {
    config: WalkerConfig,
}

/// Tracks enumeration time separately from time spent handing records off.
struct ScanClock {
    started: Instant,
    excluded: Duration,
}

impl ScanClock {
    fn start() -> Self {
        Self {
            started: Instant::now(),
            excluded: Duration::ZERO,
        }
    }

    fn active(&self) -> Duration {
        self.started.elapsed().saturating_sub(self.excluded)
    }
}

impl RootWalker {
    #[must_use]
    pub fn new(config: WalkerConfig) -> Self {
        Self { config }
    }

    /// Enumerate `root`, handing every file and link to `sink`.
    ///
    /// Fails with `Scan` if the root is missing or not a directory and with
    /// `ScanTimeout` once the enumeration budget is spent. Unreadable entries
    /// below the root are counted and skipped.
    pub fn walk<S, F>(&self, root: &Path, should_stop: S, mut sink: F) -> Result<RootScanStats>
    where
        S: Fn() -> bool,
        F: FnMut(FileRecord) -> WalkControl,
    {
        let root_meta = fs::symlink_metadata(root).map_err(|e| AdcError::Scan {
            root: root.to_path_buf(),
            details: e.to_string(),
        })?;
        if !root_meta.is_dir() {
            return Err(AdcError::Scan {
                root: root.to_path_buf(),
                details: "not a directory (links are never followed)".to_string(),
            });
        }
        let root_dev = device_of(&root_meta);

        let mut stats = RootScanStats {
            root: root.to_path_buf(),
            ..RootScanStats::default()
        };
        let mut clock = ScanClock::start();
        let mut stack: Vec<(PathBuf, usize)> = vec![(root.to_path_buf(), 0)];

        while let Some((dir, depth)) = stack.pop() {
            stats.directories += 1;
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if dir == root => {
                    return Err(AdcError::Scan {
                        root: root.to_path_buf(),
                        details: e.to_string(),
                    });
                }
                Err(_) => {
                    stats.unreadable += 1;
                    continue;
                }
            };

            for entry in entries {
                if should_stop() {
                    stats.interrupted = true;
                    stats.elapsed_ms = duration_ms(clock.active());
                    return Ok(stats);
                }
                if clock.active() > self.config.timeout {
                    return Err(AdcError::ScanTimeout {
                        root: root.to_path_buf(),
                        limit_ms: duration_ms(self.config.timeout),
                    });
                }

                let Ok(entry) = entry else {
                    stats.unreadable += 1;
                    continue;
                };
                let path = entry.path();
                let Ok(meta) = fs::symlink_metadata(&path) else {
                    stats.unreadable += 1;
                    continue;
                };
                let file_type = meta.file_type();

                if file_type.is_dir() {
                    let crosses_device = self.config.stay_on_device
                        && root_dev.is_some()
                        && device_of(&meta) != root_dev;
                    if depth + 1 < self.config.max_depth && !crosses_device {
                        stack.push((path, depth + 1));
                    }
                    continue;
                }
                if !file_type.is_file() && !file_type.is_symlink() {
                    continue;
                }

                let record = FileRecord::from_metadata(root, &path, &meta);
                if record.kind == EntryKind::Link {
                    stats.links += 1;
                } else {
                    stats.files += 1;
                    stats.bytes = stats.bytes.saturating_add(record.size_bytes);
                }

                let handoff = Instant::now();
                let control = sink(record);
                clock.excluded += handoff.elapsed();
                if control == WalkControl::Stop {
                    stats.interrupted = true;
                    stats.elapsed_ms = duration_ms(clock.active());
                    return Ok(stats);
                }
            }
        }

        stats.elapsed_ms = duration_ms(clock.active());
        Ok(stats)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ──────────────────── open-file snapshot ────────────────────

/// Maximum time spent reading /proc for open descriptors.
const OPEN_FILES_SCAN_BUDGET: Duration = Duration::from_secs(5);

/// Maximum number of processes inspected per snapshot.
const OPEN_FILES_MAX_PIDS: usize = 2_000;

/// `(device, inode)` pairs held open by any process at snapshot time.
///
/// Taken once per job. On platforms without /proc the set is empty, which
/// leaves the deletion-time exclusive lock as the only in-use guard.
#[derive(Debug, Clone, Default)]
pub struct OpenFileSet {
    ids: HashSet<(u64, u64)>,
}

impl OpenFileSet {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot open descriptors of all visible processes (budgeted).
    #[must_use]
    pub fn snapshot() -> Self {
        #[cfg(target_os = "linux")]
        {
            Self {
                ids: collect_open_files_linux(),
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            Self::default()
        }
    }

    pub fn insert(&mut self, id: (u64, u64)) {
        self.ids.insert(id);
    }

    #[must_use]
    pub fn contains(&self, record: &FileRecord) -> bool {
        record.file_id.is_some_and(|id| self.ids.contains(&id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(target_os = "linux")]
fn collect_open_files_linux() -> HashSet<(u64, u64)> {
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::fs::MetadataExt;

    let mut open = HashSet::with_capacity(4096);
    let Ok(proc_dir) = fs::read_dir("/proc") else {
        return open;
    };

    let deadline = Instant::now() + OPEN_FILES_SCAN_BUDGET;
    let mut pids_scanned = 0usize;

    for proc_entry in proc_dir.flatten() {
        // Partial snapshots are acceptable; the erase-time lock still applies.
        if pids_scanned >= OPEN_FILES_MAX_PIDS || Instant::now() >= deadline {
            break;
        }
        let pid_name = proc_entry.file_name();
        let pid_bytes = pid_name.as_bytes();
        if pid_bytes.is_empty() || !pid_bytes.iter().all(u8::is_ascii_digit) {
            continue;
        }
        pids_scanned += 1;

        let Ok(fd_entries) = fs::read_dir(proc_entry.path().join("fd")) else {
            continue;
        };
        for fd_entry in fd_entries.flatten() {
            // follows the /proc/<pid>/fd link to its target
            if let Ok(meta) = fd_entry.metadata() {
                open.insert((meta.dev(), meta.ino()));
            }
        }
    }

    open
}
