//! Secure deletion engine: multi-pass overwrite, truncate, then unlink.
//!
//! Per-file state machine:
//!
//! ```text
//! Approved -> Pass(1) -> ... -> Pass(N) -> Truncate -> Unlink -> Unlinked
//!     \__________\_______________\__________\__________\-> Failed
//! ```
//!
//! Every pass rewrites the whole extent and is flushed to stable storage before
//! the next one starts. The directory entry is removed only after the final
//! pass and the truncation succeeded; any failure before that leaves the file
//! in place. Failures are per-file [`DeletionError`]s and never abort a job.

#![allow(missing_docs)]
#![allow(clippy::cast_possible_truncation)]

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::config::ErasureConfig;
use crate::core::errors::{AdcError, Result};

// ──────────────────── fill patterns ────────────────────

/// Byte pattern written during one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillPattern {
    /// Deterministic 0x00.
    Zeros,
    /// Deterministic 0xFF.
    Ones,
    /// Cryptographically secure random bytes.
    Random,
}

impl FillPattern {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zeros => "zeros",
            Self::Ones => "ones",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for FillPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FillPattern {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" | "zeros" => Ok(Self::Zeros),
            "one" | "ones" => Ok(Self::Ones),
            "random" => Ok(Self::Random),
            other => Err(format!("unknown fill pattern {other:?}")),
        }
    }
}

/// Ordered fill for every pass of one erasure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErasurePlan {
    passes: Vec<FillPattern>,
}

impl ErasurePlan {
    /// Pass `i` uses `fill_sequence[i % len]`.
    pub fn new(pass_count: u32, fill_sequence: &[FillPattern]) -> Result<Self> {
        if pass_count == 0 {
            return Err(AdcError::InvalidConfig {
                details: "erasure.pass_count must be >= 1".to_string(),
            });
        }
        if fill_sequence.is_empty() {
            return Err(AdcError::InvalidConfig {
                details: "erasure.fill_sequence must not be empty".to_string(),
            });
        }
        let passes = (0..pass_count as usize)
            .map(|i| fill_sequence[i % fill_sequence.len()])
            .collect();
        Ok(Self { passes })
    }

    #[must_use]
    pub fn passes(&self) -> &[FillPattern] {
        &self.passes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

// ──────────────────── records and errors ────────────────────

/// One completed overwrite pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionPass {
    /// 1-based.
    pub index: u32,
    pub fill: FillPattern,
    pub bytes_written: u64,
}

/// Where in the state machine a file was when the erasure stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "pass", rename_all = "snake_case")]
pub enum ErasureStage {
    Approved,
    Pass(u32),
    Truncate,
    Unlink,
    Unlinked,
}

impl fmt::Display for ErasureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => f.write_str("approved"),
            Self::Pass(n) => write!(f, "pass {n}"),
            Self::Truncate => f.write_str("truncate"),
            Self::Unlink => f.write_str("unlink"),
            Self::Unlinked => f.write_str("unlinked"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionErrorKind {
    PermissionDenied,
    InUse,
    IoError,
    NotFound,
}

impl DeletionErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::PermissionDenied => "ADC-5001",
            Self::InUse => "ADC-5002",
            Self::IoError => "ADC-5003",
            Self::NotFound => "ADC-5004",
        }
    }

    fn from_io(err: &io::Error) -> Self {
        // 32/33: Windows sharing and lock violations
        if cfg!(windows) && matches!(err.raw_os_error(), Some(32 | 33)) {
            return Self::InUse;
        }
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::ResourceBusy | io::ErrorKind::ExecutableFileBusy => Self::InUse,
            _ => Self::IoError,
        }
    }
}

/// Per-file deletion failure. Recorded and aggregated; never job-fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("[{code}] secure delete of {path} failed at {stage}: {detail}", code = .kind.code())]
pub struct DeletionError {
    pub path: PathBuf,
    pub kind: DeletionErrorKind,
    pub stage: ErasureStage,
    pub detail: String,
}

impl DeletionError {
    fn new(
        path: &Path,
        kind: DeletionErrorKind,
        stage: ErasureStage,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            kind,
            stage,
            detail: detail.into(),
        }
    }

    fn from_io(path: &Path, stage: ErasureStage, err: &io::Error) -> Self {
        Self::new(path, DeletionErrorKind::from_io(err), stage, err.to_string())
    }

    /// Whether the directory entry is known to still exist.
    #[must_use]
    pub fn file_retained(&self) -> bool {
        self.kind != DeletionErrorKind::NotFound && self.stage != ErasureStage::Unlinked
    }
}

/// Proof of a completed erasure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureReceipt {
    pub path: PathBuf,
    pub bytes_freed: u64,
    pub passes: Vec<DeletionPass>,
}

/// Why an observed erasure did not finish.
#[derive(Debug, Error)]
pub enum EraseFailure {
    /// The file itself could not be erased.
    #[error(transparent)]
    Deletion(DeletionError),
    /// The pass observer refused to continue (e.g. the audit trail failed).
    /// The file was left in place.
    #[error("erasure of {path} aborted after pass {after_pass}: {source}")]
    Aborted {
        path: PathBuf,
        after_pass: u32,
        #[source]
        source: AdcError,
    },
}

// ──────────────────── overwrite targets ────────────────────

/// Byte-level operations the engine needs from an open file.
///
/// Implemented for [`File`], [`LockedFile`] and mutable borrows of any target,
/// so a caller can inspect a wrapper after the erasure. Tests wrap these to
/// inject faults at a chosen pass.
pub trait OverwriteTarget {
    fn extent_len(&mut self) -> io::Result<u64>;
    fn seek_to_start(&mut self) -> io::Result<()>;
    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()>;
    /// Flush data and metadata to stable storage.
    fn sync(&mut self) -> io::Result<()>;
    fn truncate_to_zero(&mut self) -> io::Result<()>;
}

impl<T: OverwriteTarget + ?Sized> OverwriteTarget for &mut T {
    fn extent_len(&mut self) -> io::Result<u64> {
        (**self).extent_len()
    }

    fn seek_to_start(&mut self) -> io::Result<()> {
        (**self).seek_to_start()
    }

    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_chunk(buf)
    }

    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }

    fn truncate_to_zero(&mut self) -> io::Result<()> {
        (**self).truncate_to_zero()
    }
}

impl OverwriteTarget for File {
    fn extent_len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn seek_to_start(&mut self) -> io::Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all(buf)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }

    fn truncate_to_zero(&mut self) -> io::Result<()> {
        self.set_len(0)?;
        self.sync_all()
    }
}

/// A file opened for writing and held under an exclusive advisory lock.
pub struct LockedFile {
    #[cfg(unix)]
    guard: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    file: File,
}

impl LockedFile {
    fn file(&self) -> &File {
        #[cfg(unix)]
        {
            &self.guard
        }
        #[cfg(not(unix))]
        {
            &self.file
        }
    }
}

impl fmt::Debug for LockedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedFile").field("file", self.file()).finish()
    }
}

impl OverwriteTarget for LockedFile {
    fn extent_len(&mut self) -> io::Result<u64> {
        Ok(self.file().metadata()?.len())
    }

    fn seek_to_start(&mut self) -> io::Result<()> {
        let mut file = self.file();
        file.seek(SeekFrom::Start(0)).map(|_| ())
    }

    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut file = self.file();
        file.write_all(buf)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file().sync_all()
    }

    fn truncate_to_zero(&mut self) -> io::Result<()> {
        self.file().set_len(0)?;
        self.file().sync_all()
    }
}

/// Open `path` for exclusive writing without following links.
///
/// Contention on the lock (unix `flock`, Windows share mode) is `InUse`.
pub fn open_exclusive(path: &Path) -> std::result::Result<LockedFile, DeletionError> {
    let stage = ErasureStage::Approved;
    let meta = fs::symlink_metadata(path).map_err(|e| DeletionError::from_io(path, stage, &e))?;
    if meta.file_type().is_symlink() {
        return Err(DeletionError::new(
            path,
            DeletionErrorKind::IoError,
            stage,
            "refusing to erase through a symbolic link",
        ));
    }
    if !meta.is_file() {
        return Err(DeletionError::new(
            path,
            DeletionErrorKind::IoError,
            stage,
            "not a regular file",
        ));
    }

    let mut options = OpenOptions::new();
    options.read(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.custom_flags(nix::fcntl::OFlag::O_NOFOLLOW.bits());
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        options.share_mode(0);
    }
    let file = options
        .open(path)
        .map_err(|e| DeletionError::from_io(path, stage, &e))?;

    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::fcntl::{Flock, FlockArg};
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(guard) => Ok(LockedFile { guard }),
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Err(DeletionError::new(
                path,
                DeletionErrorKind::InUse,
                stage,
                "file is locked by another process",
            )),
            Err((_, errno)) => Err(DeletionError::new(
                path,
                DeletionErrorKind::IoError,
                stage,
                format!("flock failed: {errno}"),
            )),
        }
    }
    #[cfg(not(unix))]
    {
        Ok(LockedFile { file })
    }
}

// ──────────────────── engine ────────────────────

/// Executes erasure plans. Cheap to share between worker threads.
#[derive(Debug, Clone)]
pub struct SecureEraser {
    plan: ErasurePlan,
    chunk_size: usize,
}

impl SecureEraser {
    #[must_use]
    pub fn new(plan: ErasurePlan, chunk_size: usize) -> Self {
        Self {
            plan,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn from_config(config: &ErasureConfig) -> Result<Self> {
        Ok(Self::new(
            ErasurePlan::new(config.pass_count, &config.fill_sequence)?,
            config.chunk_size_bytes,
        ))
    }

    #[must_use]
    pub fn plan(&self) -> &ErasurePlan {
        &self.plan
    }

    /// Erase `path` and return the bytes freed.
    pub fn secure_delete(&self, path: &Path) -> std::result::Result<u64, DeletionError> {
        match self.erase_observed(path, |_| Ok(())) {
            Ok(receipt) => Ok(receipt.bytes_freed),
            Err(EraseFailure::Deletion(e)) => Err(e),
            Err(EraseFailure::Aborted { path, source, .. }) => Err(DeletionError::new(
                &path,
                DeletionErrorKind::IoError,
                ErasureStage::Approved,
                source.to_string(),
            )),
        }
    }

    /// Erase `path`, reporting each completed pass to `observer` before the next
    /// begins. An observer error stops the erasure with the file still present.
    pub fn erase_observed<F>(
        &self,
        path: &Path,
        observer: F,
    ) -> std::result::Result<ErasureReceipt, EraseFailure>
    where
        F: FnMut(&DeletionPass) -> Result<()>,
    {
        let target = open_exclusive(path).map_err(EraseFailure::Deletion)?;
        self.erase_target(path, target, observer)
    }

    /// Run the pass sequence on an already-open `target`, then unlink `path`.
    pub fn erase_target<T, F>(
        &self,
        path: &Path,
        mut target: T,
        mut observer: F,
    ) -> std::result::Result<ErasureReceipt, EraseFailure>
    where
        T: OverwriteTarget,
        F: FnMut(&DeletionPass) -> Result<()>,
    {
        let fail = |stage: ErasureStage, e: &io::Error| {
            EraseFailure::Deletion(DeletionError::from_io(path, stage, e))
        };

        let len = target
            .extent_len()
            .map_err(|e| fail(ErasureStage::Approved, &e))?;
        let chunk = self.chunk_size.min(usize::try_from(len).unwrap_or(usize::MAX));
        let mut buffer = vec![0u8; chunk.max(1)];
        let mut rng = rand::rng();
        let mut passes = Vec::with_capacity(self.plan.len());

        for (i, fill) in self.plan.passes().iter().copied().enumerate() {
            let index = i as u32 + 1;
            let stage = ErasureStage::Pass(index);
            target.seek_to_start().map_err(|e| fail(stage, &e))?;

            match fill {
                FillPattern::Zeros => buffer.fill(0x00),
                FillPattern::Ones => buffer.fill(0xFF),
                FillPattern::Random => {}
            }
            let mut written: u64 = 0;
            while written < len {
                let n = usize::try_from(len - written)
                    .map_or(buffer.len(), |rem| rem.min(buffer.len()));
                if fill == FillPattern::Random {
                    rng.fill_bytes(&mut buffer[..n]);
                }
                target.write_chunk(&buffer[..n]).map_err(|e| fail(stage, &e))?;
                written += n as u64;
            }
            target.sync().map_err(|e| fail(stage, &e))?;

            let pass = DeletionPass {
                index,
                fill,
                bytes_written: written,
            };
            observer(&pass).map_err(|source| EraseFailure::Aborted {
                path: path.to_path_buf(),
                after_pass: index,
                source,
            })?;
            passes.push(pass);
        }

        target
            .truncate_to_zero()
            .map_err(|e| fail(ErasureStage::Truncate, &e))?;
        drop(target);
        fs::remove_file(path).map_err(|e| fail(ErasureStage::Unlink, &e))?;

        Ok(ErasureReceipt {
            path: path.to_path_buf(),
            bytes_freed: len,
            passes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wraps a file and snapshots its content after every synced pass.
    struct Recording {
        inner: File,
        path: PathBuf,
        snapshots: Vec<Vec<u8>>,
    }

    impl OverwriteTarget for Recording {
        fn extent_len(&mut self) -> io::Result<u64> {
            self.inner.extent_len()
        }
        fn seek_to_start(&mut self) -> io::Result<()> {
            self.inner.seek_to_start()
        }
        fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
            self.inner.write_chunk(buf)
        }
        fn sync(&mut self) -> io::Result<()> {
            self.inner.sync()?;
            self.snapshots.push(fs::read(&self.path)?);
            Ok(())
        }
        fn truncate_to_zero(&mut self) -> io::Result<()> {
            self.inner.truncate_to_zero()
        }
    }

    /// Fails the first write of a chosen pass.
    struct FailOnPass {
        inner: File,
        fail_on: u32,
        current: u32,
    }

    impl OverwriteTarget for FailOnPass {
        fn extent_len(&mut self) -> io::Result<u64> {
            self.inner.extent_len()
        }
        fn seek_to_start(&mut self) -> io::Result<()> {
            self.current += 1;
            self.inner.seek_to_start()
        }
        fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
            if self.current == self.fail_on {
                return Err(io::Error::other("injected write failure"));
            }
            self.inner.write_chunk(buf)
        }
        fn sync(&mut self) -> io::Result<()> {
            self.inner.sync()
        }
        fn truncate_to_zero(&mut self) -> io::Result<()> {
            self.inner.truncate_to_zero()
        }
    }

    fn eraser(passes: u32) -> SecureEraser {
        SecureEraser::new(
            ErasurePlan::new(
                passes,
                &[FillPattern::Zeros, FillPattern::Ones, FillPattern::Random],
            )
            .unwrap(),
            4,
        )
    }

    fn open_rw(path: &Path) -> File {
        OpenOptions::new().read(true).write(true).open(path).unwrap()
    }

    #[test]
    fn three_passes_in_order_then_unlink() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ten.bin");
        fs::write(&path, b"0123456789").unwrap();

        let mut rec = Recording {
            inner: open_rw(&path),
            path: path.clone(),
            snapshots: Vec::new(),
        };
        let receipt = eraser(3).erase_target(&path, &mut rec, |_| Ok(())).unwrap();

        assert_eq!(receipt.bytes_freed, 10);
        assert_eq!(
            receipt.passes,
            vec![
                DeletionPass { index: 1, fill: FillPattern::Zeros, bytes_written: 10 },
                DeletionPass { index: 2, fill: FillPattern::Ones, bytes_written: 10 },
                DeletionPass { index: 3, fill: FillPattern::Random, bytes_written: 10 },
            ]
        );
        assert_eq!(rec.snapshots.len(), 3);
        assert_eq!(rec.snapshots[0], vec![0x00; 10]);
        assert_eq!(rec.snapshots[1], vec![0xFF; 10]);
        assert_eq!(rec.snapshots[2].len(), 10);
        assert!(!path.exists());
    }

    #[test]
    fn failure_on_pass_two_leaves_file_overwritten_but_present() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("victim.bin");
        fs::write(&path, b"sensitive!").unwrap();

        let target = FailOnPass {
            inner: open_rw(&path),
            fail_on: 2,
            current: 0,
        };
        let mut observed = Vec::new();
        let err = eraser(3)
            .erase_target(&path, target, |p| {
                observed.push(*p);
                Ok(())
            })
            .unwrap_err();

        match err {
            EraseFailure::Deletion(e) => {
                assert_eq!(e.kind, DeletionErrorKind::IoError);
                assert_eq!(e.stage, ErasureStage::Pass(2));
                assert!(e.file_retained());
            }
            EraseFailure::Aborted { .. } => panic!("expected a deletion error"),
        }
        assert_eq!(observed.len(), 1);
        assert!(path.exists());
        assert_eq!(fs::read(&path).unwrap(), vec![0x00; 10]);
    }

    #[test]
    fn observer_abort_stops_before_unlink() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.bin");
        fs::write(&path, b"abc").unwrap();

        let err = eraser(3)
            .erase_observed(&path, |p| {
                if p.index == 1 {
                    Err(AdcError::audit_write("/audit", "disk full"))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        assert!(matches!(err, EraseFailure::Aborted { after_pass: 1, .. }));
        assert!(path.exists());
    }

    #[test]
    fn secure_delete_reports_bytes_freed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("b.bin");
        fs::write(&path, vec![7u8; 9_000]).unwrap();
        assert_eq!(eraser(3).secure_delete(&path).unwrap(), 9_000);
        assert!(!path.exists());
    }

    #[test]
    fn empty_file_still_runs_every_pass() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty");
        fs::write(&path, b"").unwrap();
        let receipt = eraser(2).erase_observed(&path, |_| Ok(())).unwrap();
        assert_eq!(receipt.passes.len(), 2);
        assert_eq!(receipt.bytes_freed, 0);
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = eraser(1).secure_delete(&tmp.path().join("nope")).unwrap_err();
        assert_eq!(err.kind, DeletionErrorKind::NotFound);
        assert!(!err.file_retained());
        assert!(err.to_string().starts_with("[ADC-5004]"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("real");
        let link = tmp.path().join("link");
        fs::write(&target, b"keep me").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let err = eraser(1).secure_delete(&link).unwrap_err();
        assert_eq!(err.kind, DeletionErrorKind::IoError);
        assert_eq!(fs::read(&target).unwrap(), b"keep me");
        assert!(link.exists());
    }

    #[cfg(unix)]
    #[test]
    fn locked_file_is_in_use() {
        use nix::fcntl::{Flock, FlockArg};
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("held");
        fs::write(&path, b"busy").unwrap();
        let _held = Flock::lock(File::open(&path).unwrap(), FlockArg::LockExclusive).unwrap();

        let err = eraser(3).secure_delete(&path).unwrap_err();
        assert_eq!(err.kind, DeletionErrorKind::InUse);
        assert_eq!(fs::read(&path).unwrap(), b"busy");
    }

    #[test]
    fn plan_cycles_fill_sequence() {
        let plan = ErasurePlan::new(5, &[FillPattern::Zeros, FillPattern::Random]).unwrap();
        assert_eq!(
            plan.passes(),
            &[
                FillPattern::Zeros,
                FillPattern::Random,
                FillPattern::Zeros,
                FillPattern::Random,
                FillPattern::Zeros,
            ]
        );
        assert!(ErasurePlan::new(0, &[FillPattern::Zeros]).is_err());
        assert!(ErasurePlan::new(3, &[]).is_err());
    }

    #[test]
    fn fill_pattern_parses_singular_and_plural() {
        assert_eq!("zero".parse::<FillPattern>(), Ok(FillPattern::Zeros));
        assert_eq!("ONES".parse::<FillPattern>(), Ok(FillPattern::Ones));
        assert!("sparkle".parse::<FillPattern>().is_err());
    }

    #[test]
    fn stage_serializes_with_pass_number() {
        let json = serde_json::to_string(&ErasureStage::Pass(2)).unwrap();
        assert_eq!(json, r#"{"stage":"pass","pass":2}"#);
    }
}
