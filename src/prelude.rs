//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use appdata_deepclean::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{AdcError, Result};

// Scanner
pub use crate::scanner::classifier::{
    ClassificationDecision, FileClassifier, Outcome, UnknownPolicy,
};
pub use crate::scanner::deletion::{DeletionError, FillPattern, SecureEraser};
pub use crate::scanner::patterns::{PatternCategory, PatternRegistry};
pub use crate::scanner::scoring::RiskScorer;
pub use crate::scanner::walker::{FileRecord, RootWalker, WalkerConfig};

// Audit
pub use crate::audit::{
    AuditEvent, AuditFilter, AuditKind, AuditRecord, AuditTrail, IntegrityReport,
};

// Compliance
pub use crate::compliance::impact::{ImpactAnalysis, RiskLevel};
pub use crate::compliance::{ComplianceFramework, ComplianceScore, builtin_framework, evaluate};

// Jobs
pub use crate::job::fleet::{FleetResult, HostSummary};
pub use crate::job::{
    CancellationToken, CleanupJob, JobHandle, JobPhase, JobReport, JobRequest, JobStatus,
    Orchestrator,
};
