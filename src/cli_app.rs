//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use colored::{ColoredString, Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use appdata_deepclean::audit::event::{AuditEvent, AuditFilter, AuditKind};
#[cfg(feature = "sqlite")]
use appdata_deepclean::audit::index::AuditIndex;
use appdata_deepclean::audit::trail::AuditTrail;
use appdata_deepclean::compliance::framework::{ComplianceFramework, builtin_names};
use appdata_deepclean::compliance::impact::{self, ImpactAnalysis, RiskLevel};
use appdata_deepclean::compliance::scorer::{self, ComplianceScore};
use appdata_deepclean::core::config::Config;
use appdata_deepclean::core::errors::AdcError;
use appdata_deepclean::core::paths::resolve_absolute_path;
use appdata_deepclean::job::orchestrator::{JobRequest, Orchestrator};
use appdata_deepclean::job::{CleanupJob, JobReport, JobStatus, RootStatus};
use appdata_deepclean::logger::activity::{
    ActivityLogConfig, ActivityLoggerHandle, prune_rotated_logs, spawn_activity_logger,
};

/// adc: classify application data and securely erase what is orphaned.
#[derive(Debug, Parser)]
#[command(
    name = "adc",
    author,
    version,
    about = "AppData deep clean - classify, erase and audit orphaned application data",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Classify files under the given roots without touching them.
    Scan(ScanArgs),
    /// Classify and securely erase orphaned files.
    Clean(CleanArgs),
    /// Inspect or verify the audit trail.
    Audit(AuditArgs),
    /// Score audit evidence against a compliance framework.
    Compliance(ComplianceArgs),
    /// View and validate configuration.
    Config(ConfigArgs),
    /// Remove rotated activity logs older than a cutoff.
    PruneLogs(PruneLogsArgs),
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Roots to scan.
    #[arg(value_name = "PATH", required = true)]
    roots: Vec<PathBuf>,
    /// Apply the conservative delete threshold when reporting candidates.
    #[arg(long)]
    conservative: bool,
    /// Print every decision, not just the summary.
    #[arg(long)]
    decisions: bool,
}

#[derive(Debug, Clone, Args)]
struct CleanArgs {
    /// Roots to clean.
    #[arg(value_name = "PATH", required = true)]
    roots: Vec<PathBuf>,
    /// Require a higher risk score before erasing.
    #[arg(long)]
    conservative: bool,
    /// Confirm destructive erasure.
    #[arg(long)]
    yes: bool,
}

#[derive(Debug, Clone, Args)]
struct AuditArgs {
    #[command(subcommand)]
    command: AuditCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum AuditCommand {
    /// Print audit events.
    Show(AuditShowArgs),
    /// Check sequence continuity and the hash chain.
    Verify,
}

#[derive(Debug, Clone, Args)]
struct AuditShowArgs {
    /// Only events of this job.
    #[arg(long, value_name = "ID")]
    job: Option<String>,
    /// Only events of this kind (e.g. unlinked, deletion_failed).
    #[arg(long, value_name = "KIND", value_parser = parse_kind)]
    kind: Option<AuditKind>,
    /// Only failures.
    #[arg(long)]
    failures: bool,
    /// Show at most the last N matching events.
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
}

#[derive(Debug, Clone, Args)]
struct ComplianceArgs {
    /// Framework name (nist, iso27001, sox, pci-dss, dod-5220 or a custom one).
    /// Defaults to the configured frameworks.
    #[arg(value_name = "FRAMEWORK")]
    framework: Option<String>,
    /// Restrict evidence to one job.
    #[arg(long, value_name = "ID")]
    job: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print effective configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct PruneLogsArgs {
    /// Age cutoff in days.
    #[arg(long, value_name = "DAYS")]
    days: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Engine or environment failure.
    #[error(transparent)]
    Engine(#[from] AdcError),
    /// Operation finished but reported failures.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Engine(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Scan(args) => run_scan(cli, args),
        Command::Clean(args) => run_clean(cli, args),
        Command::Audit(args) => run_audit(cli, args),
        Command::Compliance(args) => run_compliance(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::PruneLogs(args) => run_prune_logs(cli, args),
    }
}

// ──────────────────── engine wiring ────────────────────

fn open_trail(config: &Config) -> Result<AuditTrail, CliError> {
    let trail = AuditTrail::open(&config.paths.audit_log)?;
    #[cfg(feature = "sqlite")]
    {
        match AuditIndex::open(&config.paths.audit_index) {
            Ok(index) => return Ok(trail.with_index(index)),
            Err(e) => eprintln!("[ADC-AUDIT] index unavailable, continuing without it: {e}"),
        }
    }
    Ok(trail)
}

/// Activity logger for the duration of one command.
struct ActivityLog {
    handle: ActivityLoggerHandle,
    join: Option<thread::JoinHandle<()>>,
}

impl ActivityLog {
    fn start(config: &Config) -> Self {
        match spawn_activity_logger(ActivityLogConfig::new(&config.paths.activity_log)) {
            Ok((handle, join)) => Self {
                handle,
                join: Some(join),
            },
            Err(e) => {
                eprintln!("[ADC-LOG] activity log disabled: {e}");
                Self {
                    handle: ActivityLoggerHandle::disabled(),
                    join: None,
                }
            }
        }
    }

    fn finish(mut self) {
        self.handle.shutdown();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn absolute_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    roots.iter().map(|root| resolve_absolute_path(root)).collect()
}

fn run_job(config: Config, request: JobRequest) -> Result<JobReport, CliError> {
    let trail = Arc::new(open_trail(&config)?);
    let log = ActivityLog::start(&config);
    let orchestrator = Orchestrator::new(config, trail)?.with_activity_logger(log.handle.clone());

    let result = orchestrator.run_job(request).and_then(|handle| {
        handle.cancellation_token().cancel_on_signals();
        handle.wait()
    });
    log.finish();
    Ok(result?)
}

// ──────────────────── scan / clean ────────────────────

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let request = JobRequest::dry_run(absolute_roots(&args.roots)).conservative(args.conservative);
    let report = run_job(config, request)?;
    let analysis = impact::analyze(&report.decisions, Utc::now());

    match output_mode(cli) {
        OutputMode::Human => {
            print_job_human(&report.job);
            if args.decisions {
                println!();
                for d in &report.decisions {
                    println!(
                        "  {:<11} {:>3}  {}  {}",
                        d.outcome.as_str(),
                        d.risk_score,
                        d.record.path.display(),
                        d.rationale.dimmed()
                    );
                }
            }
            println!();
            print_impact_human(&analysis);
        }
        OutputMode::Json => {
            let mut payload = json!({
                "command": "scan",
                "job": report.job,
                "impact": analysis,
            });
            if args.decisions {
                payload["decisions"] = serde_json::to_value(&report.decisions)?;
            }
            write_json_line(&payload)?;
        }
    }
    job_outcome(&report.job)
}

fn run_clean(cli: &Cli, args: &CleanArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    confirm_destructive(&config, args.yes)?;
    let request =
        JobRequest::destructive(absolute_roots(&args.roots)).conservative(args.conservative);
    let report = run_job(config, request)?;

    match output_mode(cli) {
        OutputMode::Human => {
            print_job_human(&report.job);
            for error in &report.deletion_errors {
                println!("  {} {error}", "error".red());
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "clean",
                "job": report.job,
                "deletion_errors": report.deletion_errors,
            });
            write_json_line(&payload)?;
        }
    }
    job_outcome(&report.job)
}

/// `job.dry_run = false` in the configuration stands in for `--yes`.
fn confirm_destructive(config: &Config, yes: bool) -> Result<(), CliError> {
    if yes || !config.job.dry_run {
        return Ok(());
    }
    Err(CliError::User(
        "refusing to erase without --yes while job.dry_run is set; preview with `adc scan`"
            .to_string(),
    ))
}

fn job_outcome(job: &CleanupJob) -> Result<(), CliError> {
    match job.status {
        JobStatus::Failed => Err(CliError::Partial(format!(
            "job {} failed: {}",
            job.id,
            job.error.as_deref().unwrap_or("unknown error")
        ))),
        _ if job.failed > 0 => Err(CliError::Partial(format!(
            "job {} finished with {} deletion failure(s)",
            job.id, job.failed
        ))),
        _ => Ok(()),
    }
}

fn status_label(status: JobStatus) -> ColoredString {
    match status {
        JobStatus::Completed => status.as_str().green(),
        JobStatus::Cancelled => status.as_str().yellow(),
        JobStatus::Failed => status.as_str().red(),
        JobStatus::Running => status.as_str().normal(),
    }
}

fn print_job_human(job: &CleanupJob) {
    let mode = if job.dry_run { " (dry run)" } else { "" };
    println!("{} {} {}{mode}", "Job".bold(), job.id, status_label(job.status));
    println!("  host: {} as {}", job.hostname, job.user);
    println!(
        "  scanned: {} files, {}",
        job.files_scanned,
        format_bytes(job.total_bytes)
    );
    println!(
        "  outcomes: {} protected, {} orphaned, {} quarantined, {} unknown",
        job.outcomes.protected,
        job.outcomes.orphaned,
        job.outcomes.quarantined,
        job.outcomes.unknown
    );
    let verb = if job.dry_run { "would erase" } else { "erased" };
    println!(
        "  {verb}: {}, failed: {}, kept: {}",
        job.succeeded, job.failed, job.skipped
    );
    if !job.dry_run {
        println!("  freed: {}", format_bytes(job.bytes_freed));
    }
    if !job.category_totals.is_empty() {
        println!("  by category:");
        for (category, total) in &job.category_totals {
            println!(
                "    {category:<22} {:>7} files {:>10}",
                total.files,
                format_bytes(total.bytes)
            );
        }
    }
    for root in job.root_results.iter().filter(|r| r.status == RootStatus::Failed) {
        println!(
            "  {} {}: {}",
            "root failed".red(),
            root.root.display(),
            root.error.as_deref().unwrap_or("")
        );
    }
}

fn print_impact_human(analysis: &ImpactAnalysis) {
    let level = match analysis.level {
        RiskLevel::Low => "low".green(),
        RiskLevel::Medium => "medium".yellow(),
        RiskLevel::High => "high".red(),
    };
    println!(
        "{} {} candidates, {}, risk {level} ({} points)",
        "Impact".bold(),
        analysis.files_affected,
        format_bytes(analysis.bytes_affected),
        analysis.risk_points
    );
    for warning in &analysis.warnings {
        println!("  {} {warning}", "warning".yellow());
    }
    for rec in &analysis.recommendations {
        println!("  - {rec}");
    }
}

// ──────────────────── audit ────────────────────

fn parse_kind(raw: &str) -> Result<AuditKind, String> {
    serde_json::from_value(Value::String(raw.trim().to_ascii_lowercase()))
        .map_err(|_| format!("unknown audit event kind {raw:?}"))
}

fn run_audit(cli: &Cli, args: &AuditArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let trail = AuditTrail::open(&config.paths.audit_log)?;

    match &args.command {
        AuditCommand::Show(show) => {
            let mut filter = show.job.clone().map_or_else(AuditFilter::all, AuditFilter::job);
            if let Some(kind) = show.kind {
                filter = filter.with_kind(kind);
            }
            if show.failures {
                filter = filter.failures();
            }
            let mut events = trail.collect(filter)?;
            if let Some(limit) = show.limit {
                let skip = events.len().saturating_sub(limit);
                events.drain(..skip);
            }
            match output_mode(cli) {
                OutputMode::Human => {
                    for event in &events {
                        print_event_human(event);
                    }
                }
                OutputMode::Json => {
                    let mut stdout = io::stdout().lock();
                    for event in &events {
                        serde_json::to_writer(&mut stdout, event)?;
                        writeln!(stdout)?;
                    }
                }
            }
            Ok(())
        }
        AuditCommand::Verify => {
            let report = trail.verify()?;
            match output_mode(cli) {
                OutputMode::Human => {
                    if report.is_intact() {
                        println!(
                            "{} {} events, seq {}..={}",
                            "intact".green(),
                            report.events,
                            report.first_seq.unwrap_or(0),
                            report.last_seq.unwrap_or(0)
                        );
                    } else {
                        println!("{} {} events", "TAMPERED".red().bold(), report.events);
                        for (expected, found) in &report.sequence_breaks {
                            println!("  sequence break: expected {expected}, found {found}");
                        }
                        for seq in &report.hash_mismatches {
                            println!("  hash mismatch at seq {seq}");
                        }
                        for seq in &report.chain_breaks {
                            println!("  chain break at seq {seq}");
                        }
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "audit verify",
                        "intact": report.is_intact(),
                        "report": report,
                    });
                    write_json_line(&payload)?;
                }
            }
            if report.is_intact() {
                Ok(())
            } else {
                Err(CliError::Partial("audit trail failed verification".to_string()))
            }
        }
    }
}

fn print_event_human(event: &AuditEvent) {
    let kind = event.record.kind();
    let label = if event.ok {
        kind.as_str().normal()
    } else {
        kind.as_str().red()
    };
    let path = event
        .record
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    println!("{:>8} {} {} {label:<16} {path}", event.seq, event.timestamp, event.job_id.dimmed());
}

// ──────────────────── compliance ────────────────────

fn resolve_frameworks(
    config: &Config,
    requested: Option<&str>,
) -> Result<Vec<ComplianceFramework>, CliError> {
    let names: Vec<String> = match requested {
        Some(name) => vec![name.to_string()],
        None if config.compliance.default_frameworks.is_empty() => {
            builtin_names().iter().map(|n| (*n).to_string()).collect()
        }
        None => config.compliance.default_frameworks.clone(),
    };
    names
        .iter()
        .map(|name| {
            config
                .framework(name)
                .ok_or_else(|| CliError::User(format!("unknown compliance framework {name:?}")))
        })
        .collect()
}

fn run_compliance(cli: &Cli, args: &ComplianceArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let frameworks = resolve_frameworks(&config, args.framework.as_deref())?;
    let trail = AuditTrail::open(&config.paths.audit_log)?;
    let filter = args.job.clone().map_or_else(AuditFilter::all, AuditFilter::job);
    let events = trail.collect(filter)?;
    let whole_trail = args.job.is_none();

    let scores: Vec<ComplianceScore> = frameworks
        .iter()
        .map(|framework| {
            if whole_trail {
                scorer::evaluate_trail(framework, &events, &[])
            } else {
                scorer::evaluate(framework, &events, &[])
            }
        })
        .collect();

    match output_mode(cli) {
        OutputMode::Human => {
            for score in &scores {
                let value = format!("{:.2}", score.score);
                let value = if score.is_compliant() {
                    value.green()
                } else if score.score >= scorer::RECOMMENDATION_THRESHOLD {
                    value.yellow()
                } else {
                    value.red()
                };
                println!("{} {value}", score.framework.bold());
                for issue in &score.issues {
                    println!(
                        "  {} {} ({}/{}): {}",
                        "fail".red(),
                        issue.rule_id,
                        issue.passed,
                        issue.evaluated,
                        issue.description
                    );
                }
                for rec in &score.recommendations {
                    println!("  - {rec}");
                }
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "compliance",
                "events": events.len(),
                "scores": scores,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── config / logs ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let config = Config::load(cli.config.as_deref())?;
            match output_mode(cli) {
                OutputMode::Human => println!("{}", config.to_toml_string()?),
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        ConfigCommand::Validate => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;
                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("Configuration is INVALID: {e}"),
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

fn run_prune_logs(cli: &Cli, args: &PruneLogsArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let log_path = &config.paths.activity_log;
    let (Some(dir), Some(base)) = (log_path.parent(), log_path.file_name()) else {
        return Err(CliError::User(format!(
            "activity log path {} has no parent directory",
            log_path.display()
        )));
    };
    let removed = prune_rotated_logs(
        dir,
        &base.to_string_lossy(),
        Duration::from_secs(args.days.saturating_mul(86_400)),
    )?;
    match output_mode(cli) {
        OutputMode::Human => println!("Removed {removed} rotated log file(s)."),
        OutputMode::Json => write_json_line(&json!({
            "command": "prune-logs",
            "removed": removed,
        }))?,
    }
    Ok(())
}

// ──────────────────── output helpers ────────────────────

fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;

    if bytes >= GIB {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("ADC_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }
    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };
    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
