//! Pattern registry: ordered rule groups evaluated in fixed precedence.
//!
//! `protected_enterprise` is consulted first, then `development_tools`, then
//! `safe_to_clean`; the first group containing a matching pattern decides the
//! category. A file that co-matches a protected and a safe-to-clean pattern is
//! therefore always protected.

#![allow(missing_docs)]

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::config::PatternsConfig;
use crate::core::errors::{AdcError, Result};
use crate::core::paths::{extension_lower, full_match_key, match_key};

/// Pattern category, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    ProtectedEnterprise,
    DevelopmentTools,
    SafeToClean,
}

impl PatternCategory {
    /// Evaluation order. First match wins.
    pub const PRECEDENCE: [Self; 3] = [
        Self::ProtectedEnterprise,
        Self::DevelopmentTools,
        Self::SafeToClean,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProtectedEnterprise => "protected_enterprise",
            Self::DevelopmentTools => "development_tools",
            Self::SafeToClean => "safe_to_clean",
        }
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single matched pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub category: PatternCategory,
    pub pattern: String,
}

/// Outcome of a registry lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Matched(PatternMatch),
    Unknown,
}

impl MatchResult {
    #[must_use]
    pub fn category(&self) -> Option<PatternCategory> {
        match self {
            Self::Matched(m) => Some(m.category),
            Self::Unknown => None,
        }
    }

    #[must_use]
    pub fn into_match(self) -> Option<PatternMatch> {
        match self {
            Self::Matched(m) => Some(m),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    /// Substring anywhere in the relative key.
    Contains(String),
    /// Glob over the whole key (pattern contains `/`) or over any single component.
    Glob { regex: Regex, whole_key: bool },
    /// Exact lowercase extension.
    Extension(String),
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    matcher: Matcher,
}

impl CompiledPattern {
    fn compile(raw: &str) -> Result<Self> {
        let source = raw.trim().to_lowercase();
        validate_pattern(&source)?;
        let matcher = if is_glob(&source) {
            Matcher::Glob {
                regex: glob_to_regex(&source)?,
                whole_key: source.contains('/'),
            }
        } else {
            Matcher::Contains(source.clone())
        };
        Ok(Self { source, matcher })
    }

    fn extension(ext: &str) -> Self {
        let ext = ext.trim().trim_start_matches('.').to_lowercase();
        Self {
            source: format!("*.{ext}"),
            matcher: Matcher::Extension(ext),
        }
    }

    fn is_match(&self, key: &str, ext: Option<&str>) -> bool {
        match &self.matcher {
            Matcher::Contains(needle) => key.contains(needle.as_str()),
            Matcher::Glob { regex, whole_key } => {
                if *whole_key {
                    regex.is_match(key)
                } else {
                    key.split('/').any(|component| regex.is_match(component))
                }
            }
            Matcher::Extension(wanted) => ext == Some(wanted.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
struct RuleGroup {
    category: PatternCategory,
    patterns: Vec<CompiledPattern>,
}

/// Immutable, thread-safe pattern lookup table.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    groups: Vec<RuleGroup>,
}

impl PatternRegistry {
    /// Compile every pattern set. Empty or malformed sets are a configuration error.
    pub fn load(config: &PatternsConfig) -> Result<Self> {
        let mut groups = Vec::with_capacity(PatternCategory::PRECEDENCE.len());
        for category in PatternCategory::PRECEDENCE {
            let raw = match category {
                PatternCategory::ProtectedEnterprise => &config.protected_enterprise,
                PatternCategory::DevelopmentTools => &config.development_tools,
                PatternCategory::SafeToClean => &config.safe_to_clean,
            };
            if raw.is_empty() {
                return Err(AdcError::InvalidConfig {
                    details: format!("pattern set {category} is empty"),
                });
            }
            let mut patterns = raw
                .iter()
                .map(|p| {
                    CompiledPattern::compile(p).map_err(|e| AdcError::InvalidConfig {
                        details: format!("pattern set {category}: {e}"),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            if category == PatternCategory::ProtectedEnterprise {
                patterns.extend(
                    config
                        .protected_extensions
                        .iter()
                        .filter(|e| !e.trim().is_empty())
                        .map(|e| CompiledPattern::extension(e)),
                );
            }
            groups.push(RuleGroup { category, patterns });
        }
        Ok(Self { groups })
    }

    /// Match a normalized key (see [`match_key`]) against the registry.
    #[must_use]
    pub fn match_key(&self, key: &str) -> MatchResult {
        let ext = key
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty());
        self.first_match(key, None, ext)
    }

    /// Match `path` found under the scan `root`.
    ///
    /// The protected and development-tool tiers see the full path, so a
    /// protected name in the root protects everything below it. Safe-to-clean
    /// patterns only see the part below the root.
    #[must_use]
    pub fn match_path(&self, root: &Path, path: &Path) -> MatchResult {
        let relative = match_key(root, path);
        let full = full_match_key(path);
        let ext = extension_lower(path);
        self.first_match(&relative, Some(&full), ext.as_deref())
    }

    /// Whether `path` falls in the protected tier.
    #[must_use]
    pub fn is_protected(&self, root: &Path, path: &Path) -> bool {
        self.match_path(root, path).category() == Some(PatternCategory::ProtectedEnterprise)
    }

    /// Pattern count per category, in precedence order.
    #[must_use]
    pub fn counts(&self) -> Vec<(PatternCategory, usize)> {
        self.groups
            .iter()
            .map(|g| (g.category, g.patterns.len()))
            .collect()
    }

    fn first_match(&self, relative: &str, full: Option<&str>, ext: Option<&str>) -> MatchResult {
        for group in &self.groups {
            let guarded = group.category != PatternCategory::SafeToClean;
            let hit = group.patterns.iter().find(|p| {
                p.is_match(relative, ext)
                    || (guarded && full.is_some_and(|full| p.is_match(full, ext)))
            });
            if let Some(hit) = hit {
                return MatchResult::Matched(PatternMatch {
                    category: group.category,
                    pattern: hit.source.clone(),
                });
            }
        }
        MatchResult::Unknown
    }
}

/// Reject blank patterns and globs that fail to compile.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return Err(AdcError::InvalidConfig {
            details: "blank pattern".to_string(),
        });
    }
    if is_glob(trimmed) {
        if trimmed.chars().all(|c| matches!(c, '*' | '?' | '/')) {
            return Err(AdcError::InvalidConfig {
                details: format!("glob {trimmed:?} matches everything"),
            });
        }
        glob_to_regex(trimmed)?;
    }
    Ok(())
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Convert a shell-style glob to an anchored regex.
///
/// `**` spans separators, `*` and `?` stay within one component.
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let normalized = pattern.replace('\\', "/");
    let chars: Vec<char> = normalized.chars().collect();
    let mut regex_str = String::with_capacity(chars.len() * 2 + 2);
    regex_str.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    regex_str.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    regex_str.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                regex_str.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                regex_str.push_str("[^/]");
                i += 1;
            }
            c @ ('.' | '+' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '$' | '|' | '\\') => {
                regex_str.push('\\');
                regex_str.push(c);
                i += 1;
            }
            c => {
                regex_str.push(c);
                i += 1;
            }
        }
    }
    regex_str.push('$');

    Regex::new(&regex_str).map_err(|e| AdcError::InvalidConfig {
        details: format!("invalid glob {pattern:?}: {e}"),
    })
}
