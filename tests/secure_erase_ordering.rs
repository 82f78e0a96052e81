//! Secure erasure through the public API: pass order, audit interleaving, faults.

mod common;

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use appdata_deepclean::audit::event::{AuditEntry, AuditFilter, AuditKind, AuditRecord};
use appdata_deepclean::audit::trail::AuditTrail;
use appdata_deepclean::scanner::deletion::{
    DeletionErrorKind, EraseFailure, ErasurePlan, ErasureStage, FillPattern, OverwriteTarget,
    SecureEraser,
};

/// Records every operation in order and optionally fails the first write of a pass.
struct ScriptedTarget {
    file: File,
    log: Vec<String>,
    pass: u32,
    fail_on_pass: Option<u32>,
}

impl ScriptedTarget {
    fn open(path: &Path, fail_on_pass: Option<u32>) -> Self {
        Self {
            file: OpenOptions::new().write(true).open(path).unwrap(),
            log: Vec::new(),
            pass: 0,
            fail_on_pass,
        }
    }
}

impl OverwriteTarget for ScriptedTarget {
    fn extent_len(&mut self) -> io::Result<u64> {
        self.file.extent_len()
    }

    fn seek_to_start(&mut self) -> io::Result<()> {
        self.pass += 1;
        self.log.push(format!("seek {}", self.pass));
        self.file.seek_to_start()
    }

    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.fail_on_pass == Some(self.pass) {
            self.log.push(format!("fail {}", self.pass));
            return Err(io::Error::other("injected write failure"));
        }
        self.log.push(format!("write {} {}", self.pass, buf.len()));
        self.file.write_chunk(buf)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.log.push(format!("sync {}", self.pass));
        self.file.sync()
    }

    fn truncate_to_zero(&mut self) -> io::Result<()> {
        self.log.push("truncate".to_string());
        self.file.truncate_to_zero()
    }
}

fn eraser() -> SecureEraser {
    let fills = [FillPattern::Zeros, FillPattern::Ones, FillPattern::Random];
    let plan = ErasurePlan::new(3, &fills).unwrap();
    SecureEraser::new(plan, 4096)
}

#[test]
fn ten_byte_file_gets_three_full_passes_then_unlink() {
    let tmp = tempfile::tempdir().unwrap();
    let path = common::write_file(&tmp.path().join("victim.dat"), b"0123456789");
    let trail = AuditTrail::open(&tmp.path().join("audit.jsonl")).unwrap();

    let mut target = ScriptedTarget::open(&path, None);
    let receipt = eraser()
        .erase_target(&path, &mut target, |pass| {
            trail
                .append(AuditEntry::new(
                    "job-x",
                    AuditRecord::DeletionPass {
                        path: path.clone(),
                        pass: *pass,
                    },
                ))
                .map(drop)
        })
        .unwrap();
    trail
        .append(AuditEntry::new(
            "job-x",
            AuditRecord::Unlinked {
                path: path.clone(),
                bytes_freed: receipt.bytes_freed,
                passes: 3,
            },
        ))
        .unwrap();

    assert!(!path.exists());
    assert_eq!(
        target.log,
        vec![
            "seek 1",
            "write 1 10",
            "sync 1",
            "seek 2",
            "write 2 10",
            "sync 2",
            "seek 3",
            "write 3 10",
            "sync 3",
            "truncate",
        ]
    );
    assert_eq!(
        receipt.passes.iter().map(|p| (p.index, p.fill, p.bytes_written)).collect::<Vec<_>>(),
        vec![
            (1, FillPattern::Zeros, 10),
            (2, FillPattern::Ones, 10),
            (3, FillPattern::Random, 10)
        ]
    );

    let kinds: Vec<AuditKind> = trail
        .collect(AuditFilter::job("job-x"))
        .unwrap()
        .iter()
        .map(|e| e.record.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            AuditKind::DeletionPass,
            AuditKind::DeletionPass,
            AuditKind::DeletionPass,
            AuditKind::Unlinked
        ]
    );
}

#[test]
fn failure_on_pass_two_keeps_file_with_first_pass_content() {
    let tmp = tempfile::tempdir().unwrap();
    let path = common::write_file(&tmp.path().join("victim.dat"), b"0123456789");

    let mut target = ScriptedTarget::open(&path, Some(2));
    let mut observed = Vec::new();
    let err = eraser()
        .erase_target(&path, &mut target, |pass| {
            observed.push(pass.index);
            Ok(())
        })
        .unwrap_err();

    let EraseFailure::Deletion(error) = err else {
        panic!("expected a deletion error");
    };
    assert_eq!(error.stage, ErasureStage::Pass(2));
    assert_eq!(error.kind, DeletionErrorKind::IoError);
    assert!(error.file_retained());
    assert_eq!(observed, vec![1]);
    assert!(!target.log.contains(&"truncate".to_string()));

    drop(target);
    assert!(path.exists());
    assert_eq!(fs::read(&path).unwrap(), vec![0u8; 10]);
}

#[test]
fn audit_failure_mid_erasure_leaves_file_in_place() {
    let tmp = tempfile::tempdir().unwrap();
    let path = common::write_file(&tmp.path().join("victim.dat"), b"0123456789");

    let mut target = ScriptedTarget::open(&path, None);
    let err = eraser()
        .erase_target(&path, &mut target, |pass| {
            if pass.index == 2 {
                Err(appdata_deepclean::core::errors::AdcError::audit_write(
                    tmp.path().join("audit.jsonl"),
                    "disk full",
                ))
            } else {
                Ok(())
            }
        })
        .unwrap_err();

    match err {
        EraseFailure::Aborted { after_pass, source, .. } => {
            assert_eq!(after_pass, 2);
            assert!(source.is_fatal());
        }
        EraseFailure::Deletion(e) => panic!("unexpected deletion error: {e}"),
    }
    assert!(path.exists());
    assert!(!target.log.contains(&"seek 3".to_string()));
}
