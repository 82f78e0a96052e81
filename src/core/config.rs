//! Configuration system: TOML file + env var overrides + conservative defaults.

#![allow(missing_docs)]

use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::compliance::framework::{ComplianceFramework, builtin_framework};
use crate::core::errors::{AdcError, Result};
use crate::scanner::classifier::UnknownPolicy;
use crate::scanner::deletion::FillPattern;

/// Full engine configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub patterns: PatternsConfig,
    pub classifier: ClassifierConfig,
    pub scoring: ScoringConfig,
    pub erasure: ErasureConfig,
    pub job: JobConfig,
    pub compliance: ComplianceConfig,
    pub paths: PathsConfig,
}

/// Pattern sets per category. Matching is case-insensitive; entries containing
/// `*` or `?` are globs, everything else is a substring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PatternsConfig {
    pub protected_enterprise: Vec<String>,
    pub development_tools: Vec<String>,
    pub safe_to_clean: Vec<String>,
    /// Extensions (without dot) that always fall in the protected tier.
    pub protected_extensions: Vec<String>,
}

/// Classification policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Safe-to-clean files younger than this stay in place.
    pub min_age_days: u64,
    /// Safe-to-clean files smaller than this stay in place.
    pub min_size_bytes: u64,
    pub unknown_policy: UnknownPolicy,
    /// Consult the per-job open-file snapshot before calling a file orphaned.
    pub check_open_files: bool,
}

/// Risk score curve. Higher scores mean safer to delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub orphaned_base: u8,
    pub unknown_base: u8,
    /// Points awarded once a file reaches `age_saturation_days`; linear below.
    pub age_weight: u8,
    pub age_saturation_days: u64,
    pub protected_sibling_penalty: u8,
    pub large_file_threshold_bytes: u64,
    /// Multiplier applied to the score of files above the large-file threshold.
    pub large_file_factor: f64,
    pub min_delete_score: u8,
    pub conservative_min_delete_score: u8,
}

/// Secure erasure settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ErasureConfig {
    pub pass_count: u32,
    /// Fill applied on pass `i` is `fill_sequence[i % len]`.
    pub fill_sequence: Vec<FillPattern>,
    pub chunk_size_bytes: usize,
}

/// Job execution and concurrency limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JobConfig {
    pub parallelism: usize,
    pub queue_capacity: usize,
    /// Per-root enumeration budget.
    pub scan_timeout_ms: u64,
    pub max_depth: usize,
    /// Forces the conservative delete threshold for every job.
    pub conservative_mode: bool,
    /// While set, `adc clean` needs `--yes` before it erases anything.
    pub dry_run: bool,
}

/// Compliance evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ComplianceConfig {
    /// Frameworks evaluated when none is named explicitly.
    pub default_frameworks: Vec<String>,
    /// Operator-defined frameworks using the built-in rule vocabulary.
    pub custom_frameworks: Vec<ComplianceFramework>,
}

/// Filesystem paths used by adc.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub audit_log: PathBuf,
    pub audit_index: PathBuf,
    pub activity_log: PathBuf,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            protected_enterprise: strings(&[
                "microsoft", "office", "teams", "outlook", "onedrive", "adobe", "acrobat",
                "creative", "photoshop", "zoom", "webex", "slack", "skype", "vmware", "citrix",
                "rdp", "antivirus", "endpoint", "defender", "symantec", "mcafee", "tableau",
                "powerbi", "splunk", "datadog", "jenkins", "git", "docker", "kubernetes",
                "chrome", "firefox", "edge", "java", "python", "system32", "syswow64",
                "program files", "windows", "certificates", "keys", "crypto", "security",
                ".ssh", ".gnupg", "credentials",
            ]),
            development_tools: strings(&[
                "vscode", "visualstudio", "intellij", "eclipse", "nodejs", "npm", "gradle",
                "maven", "postman", "insomnia", "wireshark",
            ]),
            safe_to_clean: strings(&[
                "temp", "cache", "logs", "backup", "old", "deprecated", "unused",
            ]),
            protected_extensions: strings(&[
                "pfx", "p12", "crt", "cer", "key", "msi", "msp", "reg", "pol", "admx", "adml",
                "rdp", "vnc",
            ]),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_age_days: 30,
            min_size_bytes: 0,
            unknown_policy: UnknownPolicy::Keep,
            check_open_files: true,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            orphaned_base: 30,
            unknown_base: 10,
            age_weight: 70,
            age_saturation_days: 90,
            protected_sibling_penalty: 25,
            large_file_threshold_bytes: 100 * 1024 * 1024,
            large_file_factor: 0.25,
            min_delete_score: 50,
            conservative_min_delete_score: 75,
        }
    }
}

impl Default for ErasureConfig {
    fn default() -> Self {
        Self {
            pass_count: 3,
            fill_sequence: vec![FillPattern::Zeros, FillPattern::Ones, FillPattern::Random],
            chunk_size_bytes: 64 * 1024,
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            parallelism: std::thread::available_parallelism()
                .map_or(2, |n| n.get().saturating_div(2).max(1)),
            queue_capacity: 1_024,
            scan_timeout_ms: 300_000,
            max_depth: 32,
            conservative_mode: false,
            dry_run: true,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[ADC-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("adc").join("config.toml");
        let data = home_dir.join(".local").join("share").join("adc");
        Self {
            config_file: cfg,
            audit_log: data.join("audit.jsonl"),
            audit_index: data.join("audit.sqlite3"),
            activity_log: data.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|e| AdcError::io(&path_buf, e))?;
            Self::from_toml_str(&raw)?
        } else if path.is_some() {
            return Err(AdcError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without touching the environment or validating.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Render the effective configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AdcError::Serialization {
            context: "toml",
            details: e.to_string(),
        })
    }

    /// Deterministic hash of the effective config, recorded with every job.
    ///
    /// FNV-1a keeps the value stable across processes and toolchains.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Minimum risk score a file needs before it may be erased.
    #[must_use]
    pub fn delete_threshold(&self, conservative_mode: bool) -> u8 {
        if conservative_mode {
            self.scoring.conservative_min_delete_score
        } else {
            self.scoring.min_delete_score
        }
    }

    /// Look up a framework by name among custom definitions first, then built-ins.
    #[must_use]
    pub fn framework(&self, name: &str) -> Option<ComplianceFramework> {
        self.compliance
            .custom_frameworks
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .cloned()
            .or_else(|| builtin_framework(name))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // classifier
        set_env(&mut lookup, "ADC_CLASSIFIER_MIN_AGE_DAYS", &mut self.classifier.min_age_days)?;
        set_env(&mut lookup, "ADC_CLASSIFIER_MIN_SIZE_BYTES", &mut self.classifier.min_size_bytes)?;
        set_env(&mut lookup, "ADC_CLASSIFIER_UNKNOWN_POLICY", &mut self.classifier.unknown_policy)?;
        set_env(
            &mut lookup,
            "ADC_CLASSIFIER_CHECK_OPEN_FILES",
            &mut self.classifier.check_open_files,
        )?;

        // scoring
        set_env(
            &mut lookup,
            "ADC_SCORING_LARGE_FILE_THRESHOLD_BYTES",
            &mut self.scoring.large_file_threshold_bytes,
        )?;
        set_env(
            &mut lookup,
            "ADC_SCORING_AGE_SATURATION_DAYS",
            &mut self.scoring.age_saturation_days,
        )?;
        set_env(&mut lookup, "ADC_SCORING_MIN_DELETE_SCORE", &mut self.scoring.min_delete_score)?;
        set_env(
            &mut lookup,
            "ADC_SCORING_CONSERVATIVE_MIN_DELETE_SCORE",
            &mut self.scoring.conservative_min_delete_score,
        )?;

        // erasure
        set_env(&mut lookup, "ADC_ERASURE_PASS_COUNT", &mut self.erasure.pass_count)?;
        if let Some(raw) = lookup("ADC_ERASURE_FILL_SEQUENCE") {
            self.erasure.fill_sequence = raw
                .split(',')
                .map(|item| parse_env::<FillPattern>("ADC_ERASURE_FILL_SEQUENCE", item.trim()))
                .collect::<Result<_>>()?;
        }

        // job
        set_env(&mut lookup, "ADC_JOB_PARALLELISM", &mut self.job.parallelism)?;
        set_env(&mut lookup, "ADC_JOB_QUEUE_CAPACITY", &mut self.job.queue_capacity)?;
        set_env(&mut lookup, "ADC_JOB_SCAN_TIMEOUT_MS", &mut self.job.scan_timeout_ms)?;
        set_env(&mut lookup, "ADC_JOB_MAX_DEPTH", &mut self.job.max_depth)?;
        set_env(&mut lookup, "ADC_JOB_CONSERVATIVE_MODE", &mut self.job.conservative_mode)?;
        set_env(&mut lookup, "ADC_JOB_DRY_RUN", &mut self.job.dry_run)?;

        // patterns: comma-separated lists replace the defaults wholesale
        for (name, slot) in [
            ("ADC_PATTERNS_PROTECTED_ENTERPRISE", &mut self.patterns.protected_enterprise),
            ("ADC_PATTERNS_DEVELOPMENT_TOOLS", &mut self.patterns.development_tools),
            ("ADC_PATTERNS_SAFE_TO_CLEAN", &mut self.patterns.safe_to_clean),
        ] {
            if let Some(raw) = lookup(name) {
                *slot = raw.split(',').map(|p| p.trim().to_string()).collect();
            }
        }

        // paths
        if let Some(raw) = lookup("ADC_PATHS_AUDIT_LOG") {
            self.paths.audit_log = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("ADC_PATHS_AUDIT_INDEX") {
            self.paths.audit_index = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("ADC_PATHS_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn normalize(&mut self) {
        for set in [
            &mut self.patterns.protected_enterprise,
            &mut self.patterns.development_tools,
            &mut self.patterns.safe_to_clean,
        ] {
            for pattern in set.iter_mut() {
                *pattern = pattern.trim().to_lowercase();
            }
        }
        for ext in &mut self.patterns.protected_extensions {
            *ext = ext.trim().trim_start_matches('.').to_lowercase();
        }
    }

    /// Check every invariant the engine relies on. Called by [`Config::load`].
    pub fn validate(&self) -> Result<()> {
        for (name, set) in [
            ("protected_enterprise", &self.patterns.protected_enterprise),
            ("development_tools", &self.patterns.development_tools),
            ("safe_to_clean", &self.patterns.safe_to_clean),
        ] {
            if set.is_empty() {
                return Err(invalid(format!("patterns.{name} must not be empty")));
            }
            for pattern in set {
                crate::scanner::patterns::validate_pattern(pattern)
                    .map_err(|e| invalid(format!("patterns.{name}: {e}")))?;
            }
        }
        if self.patterns.protected_extensions.iter().any(|e| e.trim().is_empty()) {
            return Err(invalid("patterns.protected_extensions contains a blank entry"));
        }

        for (name, val) in [
            ("orphaned_base", self.scoring.orphaned_base),
            ("unknown_base", self.scoring.unknown_base),
            ("age_weight", self.scoring.age_weight),
            ("protected_sibling_penalty", self.scoring.protected_sibling_penalty),
            ("min_delete_score", self.scoring.min_delete_score),
            ("conservative_min_delete_score", self.scoring.conservative_min_delete_score),
        ] {
            if val > 100 {
                return Err(invalid(format!("scoring.{name} must be in [0, 100], got {val}")));
            }
        }
        if self.scoring.conservative_min_delete_score < self.scoring.min_delete_score {
            return Err(invalid(format!(
                "scoring.conservative_min_delete_score ({}) must be >= min_delete_score ({})",
                self.scoring.conservative_min_delete_score, self.scoring.min_delete_score
            )));
        }
        if self.scoring.age_saturation_days == 0 {
            return Err(invalid("scoring.age_saturation_days must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.scoring.large_file_factor) {
            return Err(invalid(format!(
                "scoring.large_file_factor must be in [0,1], got {}",
                self.scoring.large_file_factor
            )));
        }

        if self.erasure.pass_count == 0 {
            return Err(invalid("erasure.pass_count must be >= 1"));
        }
        if self.erasure.fill_sequence.is_empty() {
            return Err(invalid("erasure.fill_sequence must not be empty"));
        }
        if self.erasure.chunk_size_bytes == 0 {
            return Err(invalid("erasure.chunk_size_bytes must be > 0"));
        }

        if self.job.parallelism == 0 {
            return Err(invalid("job.parallelism must be >= 1"));
        }
        if self.job.queue_capacity == 0 {
            return Err(invalid("job.queue_capacity must be >= 1"));
        }
        if self.job.scan_timeout_ms == 0 {
            return Err(invalid("job.scan_timeout_ms must be >= 1"));
        }
        if self.job.max_depth == 0 {
            return Err(invalid("job.max_depth must be >= 1"));
        }

        for framework in &self.compliance.custom_frameworks {
            framework.validate()?;
        }
        for name in &self.compliance.default_frameworks {
            if self.framework(name).is_none() {
                return Err(invalid(format!(
                    "compliance.default_frameworks: unknown framework {name:?}"
                )));
            }
        }

        Ok(())
    }
}

fn invalid(details: impl Into<String>) -> AdcError {
    AdcError::InvalidConfig {
        details: details.into(),
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse::<T>().map_err(|error| AdcError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn set_env<T, F>(lookup: &mut F, name: &str, slot: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: Display,
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env(name, raw.trim())?;
    }
    Ok(())
}
