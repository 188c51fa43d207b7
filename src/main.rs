// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Oculare: Retinal Scan Records
//!
//! Command line front end for capturing, listing and deleting retinal scans.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use oculare::capture::{CaptureContext, CapturePipeline, CaptureProgress, CaptureStage};
use oculare::classifier::HttpClassifier;
use oculare::config::AppConfig;
use oculare::db::Database;
use oculare::journal::{Journal, JournalAction};
use oculare::scan::{ScanLibrary, ScanRecord};
use oculare::specialists::SpecialistDirectory;
use oculare::storage::LocalStorage;
use oculare::sync::load_summary;
use oculare::{OculareError, Result};

/// Oculare CLI - Retinal scan capture and records
#[derive(Parser, Debug)]
#[command(name = "oculare")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Retinal scan capture, classification and scan records", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify an image and store it as a new scan
    Capture {
        /// Captured image file
        image: PathBuf,

        /// User the scan belongs to
        #[arg(short, long)]
        user: String,
    },

    /// Scan record operations
    Scans {
        #[command(subcommand)]
        action: ScanCommands,
    },

    /// User record operations
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Activity journal
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Eye specialist lookup
    Specialists {
        #[command(subcommand)]
        action: SpecialistCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show classifier, storage and database status
    Status,

    /// Initialize a new Oculare workspace
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ScanCommands {
    /// List consolidated scans and refresh the stored summary
    List {
        #[arg(short, long)]
        user: String,
    },

    /// Delete every image of one scan
    Delete {
        /// Scan number to delete
        scan_number: u32,

        #[arg(short, long)]
        user: String,
    },

    /// Show the stored diagnosis summary
    Summary {
        #[arg(short, long)]
        user: String,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommands {
    /// Create a user record (or rename an existing one)
    Add {
        id: String,

        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show one user record
    Show { id: String },

    /// List all user records
    List,
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List recent journal entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        count: usize,

        /// Only entries for this user
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Clear the journal
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SpecialistCommands {
    /// Find physicians by condition and state
    Find {
        /// Condition, matched as a case-insensitive substring
        #[arg(short, long, default_value = "")]
        disease: String,

        /// US state, matched as a case-insensitive substring
        #[arg(short, long, default_value = "")]
        state: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Capture { image, user }) => {
            run_capture(config, image, user, &cli.format).await
        }
        Some(Commands::Scans { action }) => {
            run_scan_command(config, action, &cli.format).await
        }
        Some(Commands::User { action }) => run_user_command(config, action, &cli.format),
        Some(Commands::History { action }) => run_history_command(config, action),
        Some(Commands::Specialists { action }) => {
            run_specialist_command(config, action, &cli.format)
        }
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Status) | None => run_status(config).await,
        Some(Commands::Init { dir, force }) => run_init(dir, force),
    }
}

fn open_journal(config: &AppConfig) -> Arc<Journal> {
    Arc::new(Journal::new(PathBuf::from(&config.journal.path)))
}

fn open_library(config: &AppConfig) -> Result<(ScanLibrary, Database)> {
    let db = Database::open(&config.records.path)?;
    let storage = Arc::new(LocalStorage::from_config(&config.storage));
    let mut library = ScanLibrary::new(storage, Arc::new(db.clone()));
    if config.journal.enabled {
        library = library.with_journal(open_journal(config));
    }
    Ok((library, db))
}

fn stage_label(stage: CaptureStage) -> &'static str {
    match stage {
        CaptureStage::Idle => "Waiting",
        CaptureStage::Submitting => "Uploading image to analysis server",
        CaptureStage::Classified => "Retinal analysis completed",
        CaptureStage::NumberResolving => "Numbering scan",
        CaptureStage::Uploading => "Saving image to your records",
        CaptureStage::Committed => "Image saved to your records",
        CaptureStage::Failed => "Failed",
    }
}

/// Run one capture attempt, printing each stage as it is reached
async fn run_capture(config: AppConfig, image: PathBuf, user: String, format: &str) -> Result<()> {
    let bytes = tokio::fs::read(&image).await?;
    let db = Database::open(&config.records.path)?;

    let classifier = Arc::new(HttpClassifier::from_config(&config.classifier)?);
    let storage = Arc::new(LocalStorage::from_config(&config.storage));
    let mut pipeline =
        CapturePipeline::new(classifier, storage, Arc::new(db)).with_settings(&config.capture);
    if config.journal.enabled {
        pipeline = pipeline.with_journal(open_journal(&config));
    }

    let (tx, mut rx) = watch::channel(CaptureProgress::default());
    let show_stages = format == "text";
    let printer = tokio::spawn(async move {
        let mut last = CaptureStage::Idle;
        while rx.changed().await.is_ok() {
            let stage = rx.borrow_and_update().stage;
            if stage != last && show_stages {
                println!("  - {}", stage_label(stage));
            }
            last = stage;
        }
    });

    let ctx = CaptureContext::new(user);
    let uri = image.to_string_lossy().to_string();
    let result = pipeline.capture_with_progress(&ctx, &uri, &bytes, &tx).await;
    drop(tx);
    let _ = printer.await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Err(e);
        }
    };

    if format == "json" {
        let output = serde_json::json!({
            "scan_number": outcome.scan_number,
            "filename": outcome.filename,
            "payload": outcome.payload,
            "readings": outcome.readings,
            "model_version": outcome.report.model_version,
            "synced": outcome.synced,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Stored scan #{} as {}", outcome.scan_number, outcome.filename);
        for reading in &outcome.readings {
            println!("  {}: {}%", reading.name, reading.percent);
        }
        if let Some(note) = outcome.report.diagnosis.as_ref().and_then(|d| d.summary.as_ref()) {
            println!("  {}", note);
        }
        if !outcome.synced {
            warn!("Diagnosis summary was not updated; it will catch up on the next listing");
        }
    }

    Ok(())
}

fn print_records(records: &[ScanRecord], format: &str) -> Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No retinal scans found");
        return Ok(());
    }

    for record in records {
        println!("Diagnosis #{}  {}", record.scan_number, record.date.format("%-m/%-d/%Y"));
        if !record.disease_display.is_empty() {
            println!("  {}", record.disease_display);
        }
        for reading in record.primary.iter().chain(record.secondary.iter()) {
            println!("  {}: {}% confidence", reading.name, reading.percent);
        }
        println!("  {}", record.diagnosis_text);
        println!("  Files: {}", record.files.join(", "));
    }
    Ok(())
}

/// Run scan commands
async fn run_scan_command(config: AppConfig, action: ScanCommands, format: &str) -> Result<()> {
    let (library, db) = open_library(&config)?;

    match action {
        ScanCommands::List { user } => {
            let records = library.refresh(&user).await?;
            print_records(&records, format)?;
        }
        ScanCommands::Delete { scan_number, user } => {
            let outcome = library.delete_scan(&user, scan_number).await?;
            println!(
                "Deleted scan #{} ({} files), {} scans remaining",
                outcome.removed.scan_number,
                outcome.removed.files.len(),
                outcome.remaining.len()
            );
            if !outcome.synced {
                warn!("Diagnosis summary was not updated");
            }
        }
        ScanCommands::Summary { user } => match load_summary(&db, &user).await? {
            Some(entries) => println!("{}", serde_json::to_string_pretty(&entries)?),
            None => println!("null"),
        },
    }

    Ok(())
}

/// Run user commands
fn run_user_command(config: AppConfig, action: UserCommands, format: &str) -> Result<()> {
    let db = Database::open(&config.records.path)?;

    match action {
        UserCommands::Add { id, name } => {
            db.upsert_user(&id, name.as_deref())?;
            println!("User {} saved", id);
        }
        UserCommands::Show { id } => {
            let user = db.get_user(&id)?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&user)?);
            } else {
                println!("User {}", user.id);
                println!("  Name: {}", user.name.as_deref().unwrap_or("-"));
                println!("  Created: {}", user.created_at.format("%Y-%m-%d %H:%M"));
                println!("  Diagnoses: {}", user.diagnoses.as_deref().unwrap_or("null"));
            }
        }
        UserCommands::List => {
            let users = db.list_users()?;
            println!("Users ({}):", users.len());
            for user in users {
                println!("  {} {}", user.id, user.name.as_deref().unwrap_or(""));
            }
        }
    }

    Ok(())
}

/// Run history commands
fn run_history_command(config: AppConfig, action: HistoryCommands) -> Result<()> {
    let journal = Journal::new(PathBuf::from(&config.journal.path));

    match action {
        HistoryCommands::List { count, user } => {
            let entries = journal.get_recent(count, user.as_deref())?;
            println!("Recent activity ({} entries):", entries.len());
            for entry in entries {
                let action = match entry.action {
                    JournalAction::Captured => "captured",
                    JournalAction::Deleted => "deleted",
                };
                println!(
                    "  {} {} scan #{} for {}: {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    action,
                    entry.scan_number,
                    entry.user_id,
                    entry.files.join(", ")
                );
            }
        }
        HistoryCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing history");
                return Ok(());
            }
            journal.clear()?;
            println!("History cleared");
        }
    }

    Ok(())
}

/// Run specialist commands
fn run_specialist_command(
    config: AppConfig,
    action: SpecialistCommands,
    format: &str,
) -> Result<()> {
    let directory = SpecialistDirectory::from_config(&config.specialists);

    match action {
        SpecialistCommands::Find { disease, state } => {
            let physicians = directory.find(&disease, &state)?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&physicians)?);
                return Ok(());
            }

            if physicians.is_empty() {
                println!("No physicians found");
                return Ok(());
            }
            println!("Physicians ({}):", physicians.len());
            for physician in physicians {
                println!("  {} ({})", physician.name, physician.disease);
                println!("    {}, {}", physician.location, physician.state);
                if !physician.experience.is_empty() {
                    println!("    Experience: {}", physician.experience);
                }
                if !physician.biography.is_empty() {
                    println!("    {}", physician.biography);
                }
            }
        }
    }

    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Classifier: {}", config.classifier.url);
            println!("  Storage: {}/{}", config.storage.root, config.storage.bucket);
            println!("  Database: {}", config.records.path);
            println!("  Specialists: {}", config.specialists.path);
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    println!("Oculare v1.0.0 Status");
    println!("=====================");

    match HttpClassifier::from_config(&config.classifier) {
        Ok(client) => match client.health_check().await {
            Ok(()) => println!("Classifier: Reachable at {}", client.url()),
            Err(e) => println!("Classifier: Error - {}", e),
        },
        Err(e) => println!("Classifier: Error - {}", e),
    }

    let storage = LocalStorage::from_config(&config.storage);
    let presence = if storage.bucket_dir().exists() {
        "present"
    } else {
        "missing"
    };
    println!("Storage: {:?} ({})", storage.bucket_dir(), presence);

    match Database::open(&config.records.path) {
        Ok(db) => {
            let stats = db.get_stats()?;
            println!("\nDatabase ({}):", config.records.path);
            println!("  Users: {}", stats.user_count);
            println!("  Users with diagnoses: {}", stats.users_with_diagnoses);
        }
        Err(e) => println!("\nDatabase: Error - {}", e),
    }

    Ok(())
}

/// Initialize a new Oculare workspace
fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(OculareError::Config(
            "config.json already exists. Use --force to overwrite".to_string(),
        ));
    }

    let mut config = AppConfig::default();
    let storage_root = target.join(&config.storage.root);
    std::fs::create_dir_all(storage_root.join(&config.storage.bucket))?;

    config.storage.root = storage_root.to_string_lossy().to_string();
    config.records.path = target.join(&config.records.path).to_string_lossy().to_string();
    config.journal.path = target.join(&config.journal.path).to_string_lossy().to_string();
    config.save(&config_path)?;

    info!("Initialized workspace in {:?}", target);
    println!("Oculare initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - config.json");
    println!("  - {}/{}/", config.storage.root, config.storage.bucket);
    println!("\nNext steps:");
    println!("  1. Point classifier.url at the analysis server");
    println!("  2. oculare user add <id>");
    println!("  3. oculare capture <image> --user <id>");

    Ok(())
}
