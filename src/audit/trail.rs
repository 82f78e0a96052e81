//! Append-only, fsync-per-append, hash-chained JSONL audit trail.
//!
//! All writers go through one mutex that owns the sequence counter, the chain
//! head and the durable log handle, so sequence numbers are assigned in the
//! same order lines reach disk. An append returns only after the line has been
//! synced. A failed write poisons the trail: every later append fails with the
//! same `AuditWrite` error, which callers treat as fatal.

#![allow(missing_docs)]

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::audit::event::{AuditEntry, AuditEvent, AuditFilter};
#[cfg(feature = "sqlite")]
use crate::audit::index::AuditIndex;
use crate::core::errors::{AdcError, Result};
use crate::logger::activity::format_utc_now;

/// Chain head used before the first event.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Durable line sink behind the trail.
///
/// `append_durable` must not return `Ok` until the bytes are on stable storage.
pub trait DurableLog: Send {
    fn append_durable(&mut self, line: &[u8]) -> io::Result<()>;
}

impl DurableLog for File {
    fn append_durable(&mut self, line: &[u8]) -> io::Result<()> {
        self.write_all(line)?;
        self.sync_data()
    }
}

struct TrailState {
    log: Box<dyn DurableLog>,
    next_seq: u64,
    last_hash: String,
    poisoned: Option<String>,
    #[cfg(feature = "sqlite")]
    index: Option<IndexMirror>,
}

#[cfg(feature = "sqlite")]
struct IndexMirror {
    index: AuditIndex,
    consecutive_failures: u32,
}

#[cfg(feature = "sqlite")]
const INDEX_MAX_FAILURES: u32 = 3;

/// The audit trail. Share it between threads behind an `Arc`.
pub struct AuditTrail {
    path: PathBuf,
    state: Mutex<TrailState>,
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail").field("path", &self.path).finish_non_exhaustive()
    }
}

impl AuditTrail {
    /// Open (or create) the trail at `path`, resuming its sequence and chain.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| AdcError::io(parent, e))?;
        }
        let existed = path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AdcError::audit_write(path, e.to_string()))?;
        if !existed {
            sync_parent_dir(path);
        }
        Self::open_with(path, Box::new(file))
    }

    /// Open the trail with a caller-supplied durable sink that appends to `path`.
    ///
    /// A final line without a newline was never acknowledged; it is cut off
    /// before the head is recovered so the next append starts on a clean line.
    pub fn open_with(path: &Path, log: Box<dyn DurableLog>) -> Result<Self> {
        discard_torn_tail(path)?;
        let (next_seq, last_hash) = recover_head(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(TrailState {
                log,
                next_seq,
                last_hash,
                poisoned: None,
                #[cfg(feature = "sqlite")]
                index: None,
            }),
        })
    }

    /// Mirror every future append into a SQLite index (best effort).
    #[cfg(feature = "sqlite")]
    #[must_use]
    pub fn with_index(self, index: AuditIndex) -> Self {
        self.state.lock().index = Some(IndexMirror {
            index,
            consecutive_failures: 0,
        });
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sequence number the next append will receive.
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.state.lock().next_seq
    }

    /// Sequence, hash, persist and sync one event.
    pub fn append(&self, entry: AuditEntry) -> Result<AuditEvent> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.poisoned {
            return Err(AdcError::audit_write(&self.path, format!("trail poisoned: {reason}")));
        }

        let mut event = AuditEvent {
            seq: state.next_seq,
            timestamp: format_utc_now(),
            job_id: entry.job_id,
            ok: !entry.record.is_failure(),
            record: entry.record,
            prev_hash: state.last_hash.clone(),
            hash: String::new(),
        };
        event.hash = event_hash(&event)
            .map_err(|e| AdcError::audit_write(&self.path, e.to_string()))?;

        let mut line = serde_json::to_vec(&event)
            .map_err(|e| AdcError::audit_write(&self.path, e.to_string()))?;
        line.push(b'\n');

        if let Err(e) = state.log.append_durable(&line) {
            let reason = e.to_string();
            state.poisoned = Some(reason.clone());
            return Err(AdcError::audit_write(&self.path, reason));
        }

        state.next_seq += 1;
        state.last_hash.clone_from(&event.hash);

        #[cfg(feature = "sqlite")]
        mirror_to_index(&mut state, &event);

        Ok(event)
    }

    /// Lazily stream events matching `filter` from durable storage.
    ///
    /// Each call opens a fresh reader, so a query can be restarted at any time.
    pub fn query(&self, filter: AuditFilter) -> Result<AuditQuery> {
        AuditQuery::open(&self.path, filter)
    }

    /// Collect a query into memory.
    pub fn collect(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>> {
        self.query(filter)?.collect()
    }

    /// Re-read the trail and check sequencing and the hash chain.
    pub fn verify(&self) -> Result<IntegrityReport> {
        verify_file(&self.path)
    }
}

#[cfg(feature = "sqlite")]
fn mirror_to_index(state: &mut TrailState, event: &AuditEvent) {
    let Some(mirror) = state.index.as_mut() else {
        return;
    };
    match mirror.index.record(event) {
        Ok(()) => mirror.consecutive_failures = 0,
        Err(e) => {
            mirror.consecutive_failures += 1;
            eprintln!("[ADC-AUDIT] index mirror write failed: {e}");
            if !e.is_retryable() {
                eprintln!("[ADC-AUDIT] index mirror disabled: {}", e.code());
                state.index = None;
            } else if mirror.consecutive_failures >= INDEX_MAX_FAILURES {
                eprintln!("[ADC-AUDIT] index mirror disabled after {INDEX_MAX_FAILURES} failures");
                state.index = None;
            }
        }
    }
}

/// SHA-256 of the event serialized with an empty `hash` field, hex encoded.
pub fn event_hash(event: &AuditEvent) -> Result<String> {
    let unhashed = AuditEvent {
        hash: String::new(),
        ..event.clone()
    };
    let bytes = serde_json::to_vec(&unhashed)?;
    let digest = Sha256::digest(&bytes);
    let mut hex = String::with_capacity(64);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    Ok(hex)
}

fn recover_head(path: &Path) -> Result<(u64, String)> {
    let mut next_seq = 1;
    let mut last_hash = GENESIS_HASH.to_string();
    if !path.exists() {
        return Ok((next_seq, last_hash));
    }
    for event in AuditQuery::open(path, AuditFilter::all())? {
        let event = event?;
        next_seq = event.seq + 1;
        last_hash = event.hash;
    }
    Ok((next_seq, last_hash))
}

/// Truncate `path` back to just after its last newline.
fn discard_torn_tail(path: &Path) -> Result<()> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(AdcError::io(path, e)),
    };
    let len = file.metadata().map_err(|e| AdcError::io(path, e))?.len();
    let Some(keep) = last_line_end(&mut file, len).map_err(|e| AdcError::io(path, e))? else {
        return Ok(());
    };

    eprintln!(
        "[ADC-AUDIT] discarding {} byte(s) of an unacknowledged append at the end of {}",
        len - keep,
        path.display()
    );
    file.set_len(keep)
        .and_then(|()| file.sync_all())
        .map_err(|e| AdcError::audit_write(path, format!("cannot truncate torn tail: {e}")))
}

/// Offset just past the last `\n`, or `None` when the file already ends with one.
fn last_line_end(file: &mut File, len: u64) -> io::Result<Option<u64>> {
    const CHUNK: u64 = 8192;
    let mut buf = [0u8; CHUNK as usize];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let chunk = &mut buf[..usize::try_from(end - start).unwrap_or(0)];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if end == len && chunk.last() == Some(&b'\n') {
            return Ok(None);
        }
        if let Some(i) = chunk.iter().rposition(|b| *b == b'\n') {
            return Ok(Some(start + i as u64 + 1));
        }
        end = start;
    }
    Ok(if len == 0 { None } else { Some(0) })
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

// ──────────────────── query ────────────────────

/// Finite, lazy iterator over stored events.
///
/// A trailing line without a newline is an append still in flight and ends
/// the iteration.
pub struct AuditQuery {
    reader: Option<BufReader<File>>,
    filter: AuditFilter,
    line_no: u64,
    buf: String,
}

impl AuditQuery {
    fn open(path: &Path, filter: AuditFilter) -> Result<Self> {
        let reader = match File::open(path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(AdcError::io(path, e)),
        };
        Ok(Self {
            reader,
            filter,
            line_no: 0,
            buf: String::new(),
        })
    }
}

impl Iterator for AuditQuery {
    type Item = Result<AuditEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reader = self.reader.as_mut()?;
            self.buf.clear();
            match reader.read_line(&mut self.buf) {
                Ok(0) => {
                    self.reader = None;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.reader = None;
                    return Some(Err(AdcError::AuditCorrupt {
                        line: self.line_no + 1,
                        details: e.to_string(),
                    }));
                }
            }
            self.line_no += 1;
            if !self.buf.ends_with('\n') {
                self.reader = None;
                return None;
            }
            let trimmed = self.buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEvent>(trimmed) {
                Ok(event) if self.filter.matches(&event) => return Some(Ok(event)),
                Ok(_) => {}
                Err(e) => {
                    self.reader = None;
                    return Some(Err(AdcError::AuditCorrupt {
                        line: self.line_no,
                        details: e.to_string(),
                    }));
                }
            }
        }
    }
}

// ──────────────────── verification ────────────────────

/// Result of re-reading a trail end to end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub events: u64,
    pub first_seq: Option<u64>,
    pub last_seq: Option<u64>,
    /// `(expected, found)` wherever the sequence skipped or went backwards.
    pub sequence_breaks: Vec<(u64, u64)>,
    /// Events whose stored hash does not match their content.
    pub hash_mismatches: Vec<u64>,
    /// Events whose `prev_hash` does not match the preceding event's hash.
    pub chain_breaks: Vec<u64>,
}

impl IntegrityReport {
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.sequence_breaks.is_empty()
            && self.hash_mismatches.is_empty()
            && self.chain_breaks.is_empty()
    }
}

fn verify_file(path: &Path) -> Result<IntegrityReport> {
    let mut report = IntegrityReport::default();
    let mut expected_prev = GENESIS_HASH.to_string();
    let mut expected_seq: Option<u64> = None;

    for event in AuditQuery::open(path, AuditFilter::all())? {
        let event = event?;
        report.events += 1;
        report.first_seq.get_or_insert(event.seq);
        report.last_seq = Some(event.seq);

        if let Some(expected) = expected_seq
            && event.seq != expected
        {
            report.sequence_breaks.push((expected, event.seq));
        }
        expected_seq = Some(event.seq + 1);

        if event.prev_hash != expected_prev {
            report.chain_breaks.push(event.seq);
        }
        if event_hash(&event)? != event.hash {
            report.hash_mismatches.push(event.seq);
        }
        expected_prev.clone_from(&event.hash);
    }
    Ok(report)
}
