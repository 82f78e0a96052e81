//! Pre-deletion impact analysis over the files a job would erase.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::classifier::ClassificationDecision;

const SENSITIVE_NAMES: &[&str] = &[
    "password", "secret", "key", "token", "credential", "ssn", "social security", "passport",
    "license", "confidential", "restricted", "classified",
];
const SENSITIVE_POINTS: u32 = 50;
const RECENT_POINTS: u32 = 30;
const LARGE_POINTS: u32 = 20;
const RECENT_DAYS: i64 = 7;
const LARGE_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    #[must_use]
    pub const fn from_points(points: u32) -> Self {
        if points >= 80 {
            Self::High
        } else if points >= 50 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub files_affected: u64,
    pub bytes_affected: u64,
    pub sensitive_files: u64,
    pub recent_files: u64,
    pub large_files: u64,
    pub risk_points: u32,
    pub level: RiskLevel,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Assess the deletion candidates among `decisions` as of `now`.
///
/// Each signal (sensitive name, modified within a week, over 100 MiB) adds its
/// points once if any candidate shows it.
#[must_use]
pub fn analyze(decisions: &[ClassificationDecision], now: DateTime<Utc>) -> ImpactAnalysis {
    let candidates: Vec<&ClassificationDecision> =
        decisions.iter().filter(|d| d.eligible_for_deletion).collect();

    let sensitive = candidates.iter().filter(|d| has_sensitive_name(d)).count() as u64;
    let recent = candidates
        .iter()
        .filter(|d| now - d.record.modified < chrono::Duration::days(RECENT_DAYS))
        .count() as u64;
    let large = candidates.iter().filter(|d| d.record.size_bytes > LARGE_BYTES).count() as u64;

    let mut points = 0;
    let mut warnings = Vec::new();
    if sensitive > 0 {
        points += SENSITIVE_POINTS;
        warnings.push(format!("{sensitive} files with potential sensitive data"));
    }
    if recent > 0 {
        points += RECENT_POINTS;
        warnings.push(format!("{recent} files modified in the last {RECENT_DAYS} days"));
    }
    if large > 0 {
        points += LARGE_POINTS;
        warnings.push(format!("{large} files larger than 100 MiB"));
    }

    let level = RiskLevel::from_points(points);
    let mut recommendations = Vec::new();
    if level == RiskLevel::High {
        recommendations.push("Review all files before deletion".to_string());
        recommendations.push("Run in dry-run mode first".to_string());
    }
    if sensitive > 0 {
        recommendations
            .push("Use conservative mode for locations holding sensitive files".to_string());
    }

    ImpactAnalysis {
        files_affected: candidates.len() as u64,
        bytes_affected: candidates.iter().map(|d| d.record.size_bytes).sum(),
        sensitive_files: sensitive,
        recent_files: recent,
        large_files: large,
        risk_points: points,
        level,
        warnings,
        recommendations,
    }
}

/// Sensitive keyword in the file name or its parent directory name.
fn has_sensitive_name(decision: &ClassificationDecision) -> bool {
    let path = &decision.record.path;
    let name = path.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default();
    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    SENSITIVE_NAMES.iter().any(|k| name.contains(k) || parent.contains(k))
}
