//! Compliance scoring over audit evidence, plus pre-deletion impact analysis.

pub mod framework;
pub mod impact;
pub mod scorer;

pub use framework::{
    ComplianceFramework, ComplianceRule, RuleCheck, builtin_framework, builtin_names,
};
pub use scorer::{ComplianceIssue, ComplianceScore, evaluate, evaluate_trail};
