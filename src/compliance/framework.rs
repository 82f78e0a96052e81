//! Compliance frameworks: weighted, data-driven rule checks with stable ids.
//!
//! Every rule is a closed [`RuleCheck`] evaluated over recorded audit events
//! and classification decisions. Built-in profiles cover NIST 800-88 style
//! sanitization, ISO 27001 classification handling, SOX retention, PCI DSS
//! cardholder data and DoD 5220.22-M overwrite requirements. Operators can
//! declare more in `[[compliance.custom_frameworks]]` with the same vocabulary.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::core::errors::{AdcError, Result};

/// A named set of weighted rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceFramework {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rules: Vec<ComplianceRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRule {
    /// Stable identifier, used to diff issue lists across runs.
    pub id: String,
    pub description: String,
    /// Relative weight. Scores are normalised over the framework's total weight.
    pub weight: f64,
    #[serde(default)]
    pub remediation: String,
    pub check: RuleCheck,
}

/// The predicate a rule applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCheck {
    /// Every file whose overwrite started was also unlinked.
    ErasureCompleteness,
    /// Every unlinked file received at least `min` passes.
    MinimumPasses { min: u32 },
    /// The last pass of every unlinked file used random fill.
    RandomFinalPass,
    /// Every decision and every unlink has a matching `decision` audit event.
    AuditCoverage,
    /// Each event's stored hash matches its content and sequence numbers rise.
    AuditIntegrity,
    /// No file classified protected or quarantined was overwritten or unlinked.
    ProtectedNeverErased,
    /// Erased files whose path mentions a keyword were at least `min_age_days` old.
    RetentionHold { keywords: Vec<String>, min_age_days: u64 },
    /// Files whose path carries a classification marker were not erased.
    ClassificationMarkers { markers: Vec<String> },
    /// Files whose path suggests cardholder data that entered erasure were
    /// unlinked after at least `min_passes` passes.
    CardholderSecureErase { keywords: Vec<String>, min_passes: u32 },
    /// Failed deletions stay within `max_fraction` of all attempts.
    FailureRate { max_fraction: f64 },
    /// Dry-run jobs produced no destructive events.
    DryRunPurity,
}

impl RuleCheck {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ErasureCompleteness => "erasure_completeness",
            Self::MinimumPasses { .. } => "minimum_passes",
            Self::RandomFinalPass => "random_final_pass",
            Self::AuditCoverage => "audit_coverage",
            Self::AuditIntegrity => "audit_integrity",
            Self::ProtectedNeverErased => "protected_never_erased",
            Self::RetentionHold { .. } => "retention_hold",
            Self::ClassificationMarkers { .. } => "classification_markers",
            Self::CardholderSecureErase { .. } => "cardholder_secure_erase",
            Self::FailureRate { .. } => "failure_rate",
            Self::DryRunPurity => "dry_run_purity",
        }
    }
}

impl ComplianceFramework {
    /// Total rule weight.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.rules.iter().map(|r| r.weight).sum()
    }

    /// Reject frameworks the scorer could not evaluate meaningfully.
    pub fn validate(&self) -> Result<()> {
        let invalid = |details: String| AdcError::InvalidConfig { details };
        if self.name.trim().is_empty() {
            return Err(invalid("compliance framework with blank name".to_string()));
        }
        if self.rules.is_empty() {
            return Err(invalid(format!("compliance framework {:?} has no rules", self.name)));
        }
        let mut seen = std::collections::BTreeSet::new();
        for rule in &self.rules {
            let ctx = format!("compliance framework {:?} rule {:?}", self.name, rule.id);
            if rule.id.trim().is_empty() {
                return Err(invalid(format!(
                    "compliance framework {:?} has a rule with blank id",
                    self.name
                )));
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(invalid(format!("{ctx}: duplicate rule id")));
            }
            if !rule.weight.is_finite() || rule.weight <= 0.0 {
                return Err(invalid(format!("{ctx}: weight must be > 0, got {}", rule.weight)));
            }
            match &rule.check {
                RuleCheck::MinimumPasses { min }
                | RuleCheck::CardholderSecureErase {
                    min_passes: min, ..
                } if *min == 0 =>
                {
                    return Err(invalid(format!("{ctx}: pass minimum must be >= 1")));
                }
                RuleCheck::RetentionHold { keywords, .. }
                | RuleCheck::ClassificationMarkers { markers: keywords }
                | RuleCheck::CardholderSecureErase { keywords, .. }
                    if keywords.is_empty() || keywords.iter().any(|k| k.trim().is_empty()) =>
                {
                    return Err(invalid(format!(
                        "{ctx}: keyword list must be non-empty with no blank entries"
                    )));
                }
                RuleCheck::FailureRate { max_fraction } if !(0.0..=1.0).contains(max_fraction) => {
                    return Err(invalid(format!(
                        "{ctx}: max_fraction must be in [0,1], got {max_fraction}"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

// ──────────────────── built-in profiles ────────────────────

const SENSITIVE_KEYWORDS: &[&str] = &[
    "password", "secret", "key", "token", "credential", "ssn", "social security", "passport",
    "license", "confidential", "restricted", "classified",
];

const CLASSIFICATION_MARKERS: &[&str] = &[
    "confidential", "restricted", "secret", "top secret", "internal", "proprietary", "classified",
];

const FINANCIAL_KEYWORDS: &[&str] = &[
    "financial", "accounting", "revenue", "expense", "invoice", "payment", "transaction", "audit",
    "budget", "cost", "profit", "loss",
];

const CARDHOLDER_KEYWORDS: &[&str] = &[
    "card",
    "credit",
    "debit",
    "payment",
    "pan",
    "cardholder",
    "cvv",
    "expiry",
    "visa",
    "mastercard",
];

/// Names accepted by [`builtin_framework`].
#[must_use]
pub const fn builtin_names() -> &'static [&'static str] {
    &["nist", "iso27001", "sox", "pci-dss", "dod-5220"]
}

/// Built-in framework by case-insensitive name (`pci` is accepted for `pci-dss`).
#[must_use]
pub fn builtin_framework(name: &str) -> Option<ComplianceFramework> {
    match name.trim().to_ascii_lowercase().as_str() {
        "nist" => Some(nist()),
        "iso27001" | "iso-27001" => Some(iso27001()),
        "sox" => Some(sox()),
        "pci-dss" | "pci" => Some(pci_dss()),
        "dod-5220" | "dod" => Some(dod_5220()),
        _ => None,
    }
}

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn rule(
    id: &str,
    weight: f64,
    check: RuleCheck,
    description: &str,
    remediation: &str,
) -> ComplianceRule {
    ComplianceRule {
        id: id.to_string(),
        description: description.to_string(),
        weight,
        remediation: remediation.to_string(),
        check,
    }
}

fn audit_coverage(prefix: &str, weight: f64) -> ComplianceRule {
    rule(
        &format!("{prefix}-audit-coverage"),
        weight,
        RuleCheck::AuditCoverage,
        "every classification decision and deletion is recorded in the audit trail",
        "Run cleanups only through the job orchestrator so every decision is audited.",
    )
}

fn audit_integrity(prefix: &str, weight: f64) -> ComplianceRule {
    rule(
        &format!("{prefix}-audit-integrity"),
        weight,
        RuleCheck::AuditIntegrity,
        "audit events are unmodified and correctly sequenced",
        "Investigate audit trail tampering; restore the trail from a trusted copy.",
    )
}

fn protected_never_erased(prefix: &str, weight: f64) -> ComplianceRule {
    rule(
        &format!("{prefix}-protected-untouched"),
        weight,
        RuleCheck::ProtectedNeverErased,
        "files classified protected or quarantined were never erased",
        "Review pattern sets; a protected file reached the deletion engine.",
    )
}

fn nist() -> ComplianceFramework {
    ComplianceFramework {
        name: "nist".to_string(),
        description: "NIST Cybersecurity Framework with SP 800-88 media sanitization".to_string(),
        rules: vec![
            rule(
                "nist-erasure-complete",
                20.0,
                RuleCheck::ErasureCompleteness,
                "every file whose overwrite began was fully sanitized and removed",
                "Re-run cleanup for partially overwritten files and resolve the recorded errors.",
            ),
            rule(
                "nist-min-passes",
                10.0,
                RuleCheck::MinimumPasses { min: 1 },
                "every erased file was overwritten at least once (clear)",
                "Configure erasure.pass_count of at least 1.",
            ),
            audit_coverage("nist", 15.0),
            audit_integrity("nist", 15.0),
            protected_never_erased("nist", 15.0),
            rule(
                "nist-sensitive-retention",
                25.0,
                RuleCheck::RetentionHold {
                    keywords: words(SENSITIVE_KEYWORDS),
                    min_age_days: 365,
                },
                "sensitive data is retained for at least one year before deletion",
                "Protect sensitive names or raise classifier.min_age_days to 365.",
            ),
        ],
    }
}

fn iso27001() -> ComplianceFramework {
    ComplianceFramework {
        name: "iso27001".to_string(),
        description: "ISO/IEC 27001 information classification and handling".to_string(),
        rules: vec![
            rule(
                "iso-classified-handling",
                35.0,
                RuleCheck::ClassificationMarkers {
                    markers: words(CLASSIFICATION_MARKERS),
                },
                "classified information is not removed by automated cleanup",
                "Handle classified information through a manual disposal procedure.",
            ),
            audit_coverage("iso", 20.0),
            audit_integrity("iso", 15.0),
            protected_never_erased("iso", 15.0),
            rule(
                "iso-failure-rate",
                15.0,
                RuleCheck::FailureRate { max_fraction: 0.05 },
                "no more than 5% of deletion attempts fail",
                "Investigate recurring deletion failures (permissions, locked files).",
            ),
        ],
    }
}

fn sox() -> ComplianceFramework {
    ComplianceFramework {
        name: "sox".to_string(),
        description: "Sarbanes-Oxley financial record retention".to_string(),
        rules: vec![
            rule(
                "sox-financial-retention",
                50.0,
                RuleCheck::RetentionHold {
                    keywords: words(FINANCIAL_KEYWORDS),
                    min_age_days: 7 * 365,
                },
                "financial records are retained for seven years before deletion",
                "Protect financial data locations or exclude them from cleanup roots.",
            ),
            audit_coverage("sox", 25.0),
            audit_integrity("sox", 25.0),
        ],
    }
}

fn pci_dss() -> ComplianceFramework {
    ComplianceFramework {
        name: "pci-dss".to_string(),
        description: "PCI DSS cardholder data disposal".to_string(),
        rules: vec![
            rule(
                "pci-cardholder-erase",
                50.0,
                RuleCheck::CardholderSecureErase {
                    keywords: words(CARDHOLDER_KEYWORDS),
                    min_passes: 3,
                },
                "potential cardholder data is destroyed with a multi-pass secure erase",
                "Use at least three erasure passes and resolve failed cardholder-data deletions.",
            ),
            rule(
                "pci-random-final-pass",
                15.0,
                RuleCheck::RandomFinalPass,
                "the final overwrite pass uses random data",
                "End erasure.fill_sequence with \"random\".",
            ),
            audit_coverage("pci", 20.0),
            audit_integrity("pci", 15.0),
        ],
    }
}

fn dod_5220() -> ComplianceFramework {
    ComplianceFramework {
        name: "dod-5220".to_string(),
        description: "DoD 5220.22-M three-pass overwrite".to_string(),
        rules: vec![
            rule(
                "dod-min-passes",
                35.0,
                RuleCheck::MinimumPasses { min: 3 },
                "every erased file received at least three overwrite passes",
                "Set erasure.pass_count to 3 or more.",
            ),
            rule(
                "dod-random-final-pass",
                15.0,
                RuleCheck::RandomFinalPass,
                "the final overwrite pass uses random data",
                "Use the fill sequence zeros, ones, random.",
            ),
            rule(
                "dod-erasure-complete",
                30.0,
                RuleCheck::ErasureCompleteness,
                "every file whose overwrite began was removed",
                "Re-run cleanup for partially overwritten files.",
            ),
            rule(
                "dod-dry-run-purity",
                20.0,
                RuleCheck::DryRunPurity,
                "dry runs did not modify any file",
                "Report the dry-run job; destructive events must never appear in it.",
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_validates_and_resolves() {
        for name in builtin_names() {
            let fw = builtin_framework(name).unwrap();
            assert_eq!(fw.name, *name);
            fw.validate().unwrap();
            assert!((fw.total_weight() - 100.0).abs() < 1e-9, "{name} weights must sum to 100");
        }
        assert_eq!(builtin_framework("PCI").unwrap().name, "pci-dss");
        assert!(builtin_framework("hipaa").is_none());
    }

    #[test]
    fn rule_ids_are_unique_across_builtins() {
        let mut ids = std::collections::BTreeSet::new();
        for name in builtin_names() {
            for rule in builtin_framework(name).unwrap().rules {
                assert!(ids.insert(rule.id.clone()), "duplicate rule id {}", rule.id);
            }
        }
    }

    #[test]
    fn validate_rejects_bad_rules() {
        let mut fw = builtin_framework("dod-5220").unwrap();
        fw.rules[0].weight = 0.0;
        assert!(fw.validate().is_err());

        let mut fw = builtin_framework("dod-5220").unwrap();
        fw.rules[0].check = RuleCheck::MinimumPasses { min: 0 };
        assert!(fw.validate().is_err());

        let mut fw = builtin_framework("sox").unwrap();
        fw.rules[1].id = fw.rules[0].id.clone();
        assert!(fw.validate().unwrap_err().to_string().contains("duplicate"));

        let fw = ComplianceFramework {
            name: "empty".to_string(),
            description: String::new(),
            rules: Vec::new(),
        };
        assert!(fw.validate().is_err());
    }

    #[test]
    fn custom_framework_parses_from_toml() {
        let raw = r#"
            name = "house"
            [[rules]]
            id = "house-passes"
            description = "seven passes"
            weight = 60.0
            check = { kind = "minimum_passes", min = 7 }
            [[rules]]
            id = "house-failures"
            description = "few failures"
            weight = 40.0
            check = { kind = "failure_rate", max_fraction = 0.1 }
        "#;
        let fw: ComplianceFramework = toml::from_str(raw).unwrap();
        fw.validate().unwrap();
        assert_eq!(fw.rules[0].check, RuleCheck::MinimumPasses { min: 7 });
        assert_eq!(fw.rules[1].check.as_str(), "failure_rate");
    }
}
