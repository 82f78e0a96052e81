//! SQLite mirror of the audit trail for fast lookups by job, kind and path.
//!
//! The JSONL trail is authoritative; this index is rebuilt from it on demand
//! and may lag behind after mirror failures.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, params};

use crate::audit::event::{AuditEvent, AuditKind};
use crate::core::errors::{AdcError, Result};

pub struct AuditIndex {
    conn: Connection,
    path: PathBuf,
}

impl AuditIndex {
    /// Open (or create) the index at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| AdcError::io(parent, e))?;
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        apply_pragmas(&conn)?;
        apply_schema(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// In-memory index, used by tests and `adc audit` when no path is configured.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert one event. Re-inserting the same sequence number replaces it.
    pub fn record(&self, event: &AuditEvent) -> Result<()> {
        let seq = i64::try_from(event.seq).map_err(|_| AdcError::Runtime {
            details: format!("audit seq {} exceeds index range", event.seq),
        })?;
        self.conn
            .prepare_cached(
                "INSERT OR REPLACE INTO audit_events (seq, timestamp, job_id, kind, path, ok, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?
            .execute(params![
                seq,
                event.timestamp,
                event.job_id,
                event.record.kind().as_str(),
                event.record.path().map(|p| p.to_string_lossy().into_owned()),
                event.ok,
                event.hash,
            ])?;
        Ok(())
    }

    /// Number of events for `job_id`, optionally restricted to one kind.
    pub fn count(&self, job_id: &str, kind: Option<AuditKind>) -> Result<u64> {
        let n: i64 = match kind {
            Some(kind) => self.conn.query_row(
                "SELECT COUNT(*) FROM audit_events WHERE job_id = ?1 AND kind = ?2",
                params![job_id, kind.as_str()],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM audit_events WHERE job_id = ?1",
                params![job_id],
                |row| row.get(0),
            )?,
        };
        Ok(u64::try_from(n).unwrap_or(0))
    }

    /// Sequence numbers of every event about `path`, ascending.
    pub fn seqs_for_path(&self, path: &Path) -> Result<Vec<u64>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT seq FROM audit_events WHERE path = ?1 ORDER BY seq")?;
        let rows = stmt.query_map(params![path.to_string_lossy()], |row| row.get::<_, i64>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(u64::try_from(row?).unwrap_or(0));
        }
        Ok(out)
    }

    /// Highest sequence number mirrored so far.
    pub fn last_seq(&self) -> Result<Option<u64>> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(seq) FROM audit_events", [], |row| row.get(0))?;
        Ok(max.and_then(|v| u64::try_from(v).ok()))
    }

    /// Whether the connection is in WAL mode (false for in-memory indexes).
    #[must_use]
    pub fn is_wal_mode(&self) -> bool {
        self.conn
            .query_row("PRAGMA journal_mode", [], |row| row.get::<_, String>(0))
            .is_ok_and(|mode| mode.eq_ignore_ascii_case("wal"))
    }
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;
         PRAGMA busy_timeout = 5000;",
    )?;
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        eprintln!("[ADC-AUDIT] WARNING: requested WAL mode for audit index but got '{mode}'");
    }
    Ok(())
}

fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS audit_events (
            seq INTEGER PRIMARY KEY,
            timestamp TEXT NOT NULL,
            job_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            path TEXT,
            ok INTEGER NOT NULL,
            hash TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_audit_job ON audit_events(job_id);
        CREATE INDEX IF NOT EXISTS idx_audit_job_kind ON audit_events(job_id, kind);
        CREATE INDEX IF NOT EXISTS idx_audit_path ON audit_events(path);",
    )?;
    Ok(())
}

// ──────────────────── tests ────────────────────
