#![forbid(unsafe_code)]

//! AppData deep clean (adc): classify application data left behind by
//! uninstalled software and securely erase what is orphaned, with a
//! tamper-evident audit trail and compliance scoring over it.
//!
//! Pipeline:
//! 1. **Pattern registry + classifier**: one decision per file, protected tier first
//! 2. **Risk scorer**: 0..=100, higher is safer to delete
//! 3. **Secure deletion**: N overwrite passes, fsync each, then unlink
//! 4. **Audit trail**: every step appended and synced before the next
//!
//! # Library usage
//!
//! ```rust,no_run
//! use appdata_deepclean::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> appdata_deepclean::core::errors::Result<()> {
//! let config = Config::load(None)?;
//! let trail = Arc::new(AuditTrail::open(&config.paths.audit_log)?);
//! let report = Orchestrator::new(config, trail)?
//!     .execute(JobRequest::dry_run(vec!["/home/me/.cache".into()]))?;
//! println!("{} files, {} would be erased", report.job.files_scanned, report.job.succeeded);
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub mod audit;
pub mod compliance;
pub mod core;
pub mod job;
pub mod logger;
pub mod scanner;
