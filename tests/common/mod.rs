#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use filetime::FileTime;

use appdata_deepclean::audit::trail::AuditTrail;
use appdata_deepclean::core::config::Config;
use appdata_deepclean::job::orchestrator::Orchestrator;

pub const DAY: u64 = 86_400;

/// Small deterministic configuration rooted in `dir`.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.patterns.protected_enterprise = vec!["microsoft".to_string()];
    config.patterns.development_tools = vec!["npm".to_string()];
    config.patterns.safe_to_clean = vec!["cache".to_string()];
    config.patterns.protected_extensions = vec!["pfx".to_string()];
    config.classifier.min_age_days = 30;
    config.classifier.check_open_files = false;
    config.job.parallelism = 2;
    config.job.queue_capacity = 8;
    config.paths.config_file = dir.join("adc.toml");
    config.paths.audit_log = dir.join("audit").join("audit.jsonl");
    config.paths.audit_index = dir.join("audit").join("audit.sqlite3");
    config.paths.activity_log = dir.join("logs").join("activity.jsonl");
    config
}

/// Persist `config` to its `paths.config_file` and return that path.
pub fn write_config(config: &Config) -> PathBuf {
    let path = config.paths.config_file.clone();
    let raw = config.to_toml_string().expect("serialize config");
    fs::write(&path, raw).expect("write config");
    path
}

pub fn open_trail(config: &Config) -> Arc<AuditTrail> {
    Arc::new(AuditTrail::open(&config.paths.audit_log).expect("open audit trail"))
}

pub fn orchestrator(config: Config) -> (Orchestrator, Arc<AuditTrail>) {
    let trail = open_trail(&config);
    let orch = Orchestrator::new(config, Arc::clone(&trail)).expect("valid config");
    (orch, trail)
}

pub fn write_file(path: &Path, contents: &[u8]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, contents).expect("write fixture file");
    path.to_path_buf()
}

/// Set the mtime of `path` to `days` days in the past.
pub fn backdate(path: &Path, days: u64) {
    let when = SystemTime::now() - Duration::from_secs(days * DAY);
    filetime::set_file_mtime(path, FileTime::from_system_time(when)).expect("set mtime");
}

/// The two-file tree: an aged cache file and a protected vendor file.
pub struct Scenario {
    pub root: PathBuf,
    pub orphan: PathBuf,
    pub protected: PathBuf,
}

pub fn scenario(base: &Path) -> Scenario {
    let root = base.join("appdata");
    let orphan = write_file(&root.join("app/cache/tmp123.dat"), b"0123456789");
    let protected = write_file(&root.join("app/vendor/microsoft/license.dat"), b"license text");
    backdate(&orphan, 40);
    backdate(&protected, 40);
    Scenario {
        root,
        orphan,
        protected,
    }
}

/// `count` aged cache files spread over `dirs` subdirectories of `root`.
pub fn cache_tree(root: &Path, dirs: usize, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = root.join(format!("cache{}", i % dirs.max(1))).join(format!("f{i:04}.tmp"));
            write_file(&path, format!("payload {i}").as_bytes());
            backdate(&path, 60);
            path
        })
        .collect()
}

// ──────────────────── CLI harness ────────────────────

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_adc") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "adc.exe" } else { "adc" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve adc binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("adc-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("ADC_OUTPUT_FORMAT", "json")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute adc command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}
