//! CLI entry point for the GTFS auditor.
//!
//! Provides subcommands for auditing a GTFS directory, listing the registered
//! audits, and printing feed statistics.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use gtfs_auditor::{
    audits::AuditEngine,
    config::AuditConfig,
    loader::load_dir,
    output::{append_summary, print_json, write_report},
    stats::FeedStatistics,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_auditor")]
#[command(about = "A tool to audit static GTFS feeds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit a GTFS feed directory
    Audit {
        /// Directory holding the feed's .txt files
        #[arg(value_name = "FEED_DIR")]
        feed: PathBuf,

        /// Only audit these files (repeatable), e.g. --file stops.txt
        #[arg(short, long = "file")]
        files: Vec<String>,

        /// JSON file to write the full report to
        #[arg(short, long, default_value = "audit_report.json")]
        output: PathBuf,

        /// Gzip compress the JSON report
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Optional: CSV file to append one summary row per file to
        #[arg(long)]
        summary_csv: Option<PathBuf>,

        /// Audit configuration (JSON); falls back to $GTFS_AUDIT_CONFIG
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Exit with an error when any file has errors or critical findings
        #[arg(long, default_value_t = false)]
        strict: bool,

        /// Also log the full report as JSON
        #[arg(long, default_value_t = false)]
        print: bool,
    },
    /// List every registered audit with its parameters
    ListChecks {
        /// Only list audits of this file
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Print feed statistics without auditing
    Stats {
        #[arg(value_name = "FEED_DIR")]
        feed: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_auditor.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_auditor.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(LevelFilter::INFO.into()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive(LevelFilter::DEBUG.into()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Audit {
            feed,
            files,
            output,
            gzip,
            summary_csv,
            config,
            strict,
            print,
        } => {
            let config = AuditConfig::resolve(config.as_deref())?;
            let tables = load_dir(&feed)?;
            let engine = AuditEngine::with_config(config);

            let report = if files.is_empty() {
                engine.run_all(&tables)
            } else {
                let files: Vec<&str> = files.iter().map(String::as_str).collect();
                engine.run_files(&tables, &files)
            };

            write_report(&output, &report, gzip)?;
            if print {
                print_json(&report)?;
            }
            if let Some(path) = summary_csv {
                append_summary(&path, &report)?;
            }

            for file in &report.files {
                info!(
                    file = %file.file,
                    status = file.summary.overall_status.as_str(),
                    score = file.mean_score(),
                    checks = file.summary.total_checks,
                    "File result"
                );
            }

            let failing = report.summary.files_with_errors + report.summary.files_critical;
            if failing > 0 {
                warn!(failing, "Feed has files with errors");
                if strict {
                    bail!("{failing} files failed the audit");
                }
            }
        }
        Commands::ListChecks { file } => {
            let engine = AuditEngine::default();
            let entries: Vec<_> = engine
                .registry()
                .entries()
                .filter(|e| file.as_deref().is_none_or(|f| e.category == f))
                .map(|e| e.info())
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Commands::Stats { feed } => {
            let tables = load_dir(&feed)?;
            let stats = FeedStatistics::from_store(&tables);
            println!("{}", serde_json::to_string_pretty(&stats)?);
            if !stats.files.compliant {
                warn!(missing = ?stats.files.required_missing, "Required files missing");
            }
        }
    }

    Ok(())
}
