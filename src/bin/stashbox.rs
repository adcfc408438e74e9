//! # Stashbox CLI - Encrypted backups from a sources list
//!
//! ## Usage
//! ```bash
//! # Back up every source listed in sources.ini into /var/backups
//! stashbox backup sources.ini /var/backups 'secret' --checksum --verbose
//!
//! # Extract an artifact next to itself and verify it against its ledger
//! stashbox extract /var/backups/backup-host-20260101.tar.gz.enc 'secret' \
//!     /var/backups/backup-host-20260101.sha256 --checksum
//! ```
//!
//! The sources list holds one `label=path` entry per line; blank lines and
//! lines starting with `#` are ignored.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use humantime::format_duration;
use std::path::{Path, PathBuf};
use stashbox::{
    BackupReport, ExtractConfig, ExtractReport, Pipeline, Result, RunConfig, SourceCatalog,
    StashError, ToolConfig,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Stashbox CLI - Encrypted, verifiable single-file backups
#[derive(Parser)]
#[command(name = "stashbox")]
#[command(version)]
#[command(about = "Modular and lightweight backup utility")]
#[command(long_about = None)]
struct Cli {
    /// JSON file describing the archiver and cipher programs
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up files from SOURCES into DEST, encrypted with SECRET
    #[command(alias = "b")]
    Backup {
        /// Sources list (`label=path` per line)
        sources: PathBuf,

        /// Output directory
        dest: PathBuf,

        /// Encryption secret
        secret: String,

        /// Record SHA-256 checksums of every backed up file
        #[arg(short, long)]
        checksum: bool,

        /// Show progress
        #[arg(short = 'V', long)]
        verbose: bool,
    },

    /// Extract ARCHIVE next to itself, optionally verifying it
    #[command(alias = "e")]
    Extract {
        /// Encrypted archive
        archive: PathBuf,

        /// Decryption secret
        secret: Option<String>,

        /// Checksum file produced by the backup
        ledger: Option<PathBuf>,

        /// Verify the extracted files against LEDGER
        #[arg(short, long)]
        checksum: bool,

        /// Show progress
        #[arg(short = 'V', long)]
        verbose: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    let tools = match load_tool_config(cli.config.as_deref()) {
        Ok(tools) => tools,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli.command, &tools) {
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        if let Some(hint) = failure_hint(&e) {
            eprintln!("{}", hint.yellow());
        }
        std::process::exit(1);
    }
}

/// Extra line printed after some errors
fn failure_hint(error: &StashError) -> Option<&'static str> {
    if error.is_integrity() {
        Some("The extracted files did not match the checksum file and were removed.")
    } else {
        None
    }
}

/// Tool configuration from `path`, or the defaults
fn load_tool_config(path: Option<&Path>) -> anyhow::Result<ToolConfig> {
    let Some(path) = path else {
        return Ok(ToolConfig::default());
    };
    let config = ToolConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    debug!("Loaded tool configuration from {:?}", path);
    Ok(config)
}

/// Main command runner
fn run(command: Commands, tools: &ToolConfig) -> Result<()> {
    let pipeline = Pipeline::from_tool_config(tools);

    // External programs are checked before anything else happens
    pipeline.check_dependencies()?;

    match command {
        Commands::Backup {
            sources,
            dest,
            secret,
            checksum,
            verbose,
        } => cmd_backup(&pipeline, sources, dest, secret, checksum, verbose),
        Commands::Extract {
            archive,
            secret,
            ledger,
            checksum,
            verbose,
        } => cmd_extract(&pipeline, archive, secret, ledger, checksum, verbose),
    }
}

/// Create an encrypted backup
///
/// Parses the sources list, then stages, packs and encrypts every source
/// into `<dest>/backup-<host>-<date>.tar.gz.enc`.
fn cmd_backup(
    pipeline: &Pipeline,
    sources: PathBuf,
    dest: PathBuf,
    secret: String,
    checksum: bool,
    verbose: bool,
) -> Result<()> {
    let sources = SourceCatalog::parse(&sources)?;

    let report = pipeline.backup(&RunConfig {
        sources,
        output_directory: dest,
        secret: secret.into(),
        checksum,
        verbose,
    })?;

    print_backup_report(&report);
    Ok(())
}

fn print_backup_report(report: &BackupReport) {
    println!("{} Backup created", "✓".green().bold());
    println!("  File name: '{}'", report.artifact.display().to_string().cyan());
    if let Some(ledger) = &report.ledger {
        println!("  Checksum file: '{}'", ledger.display().to_string().cyan());
        println!("  Checksums: {}", report.digests_recorded.to_string().cyan());
    }
    println!("  Sources: {}", report.sources_staged.to_string().cyan());
    println!(
        "  File size: {} bytes ({})",
        report.size_bytes.to_string().cyan(),
        report.human_size().cyan()
    );
    println!(
        "  Elapsed time: {}",
        format_duration(truncate_millis(report.elapsed)).to_string().cyan()
    );
}

/// Extract (and optionally verify) an encrypted backup
fn cmd_extract(
    pipeline: &Pipeline,
    archive: PathBuf,
    secret: Option<String>,
    ledger: Option<PathBuf>,
    checksum: bool,
    verbose: bool,
) -> Result<()> {
    if !archive.exists() {
        return Err(StashError::ArchiveMissing(archive));
    }

    let secret = secret.ok_or_else(|| {
        StashError::invalid_configuration("extract requires the decryption secret as second argument")
    })?;

    let ledger = if checksum {
        let ledger = ledger.ok_or_else(|| {
            StashError::invalid_configuration("--checksum requires the SHA256 file as third argument")
        })?;
        if !ledger.exists() {
            return Err(StashError::invalid_configuration(format!(
                "checksum file '{}' does not exist",
                ledger.display()
            )));
        }
        Some(ledger)
    } else {
        if ledger.is_some() {
            debug!("Checksum file given without --checksum; skipping verification");
        }
        None
    };

    let report = pipeline.extract(&ExtractConfig {
        archive,
        secret: secret.into(),
        ledger,
        verbose,
    })?;

    print_extract_report(&report);
    Ok(())
}

fn print_extract_report(report: &ExtractReport) {
    if let Some(count) = report.files_verified {
        println!("{} Verified {} files", "✓".green().bold(), count.to_string().cyan());
    }
    println!(
        "Backup extracted to: '{}'",
        report.extracted_root.display().to_string().cyan()
    );
    println!(
        "  Elapsed time: {}",
        format_duration(truncate_millis(report.elapsed)).to_string().cyan()
    );
}

/// Drop sub-millisecond noise from a duration for display
fn truncate_millis(duration: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_millis(duration.as_millis() as u64)
}
