mod config;
mod document;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use document::ListDocument;
use itemforge_backup::{BackupKind, BackupManager};
use itemforge_otb::{OtbError, OtbReader, OtbWriter};
use itemforge_validate::{ValidationLevel, Validator};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

const EXIT_FILE: u8 = 2;
const EXIT_VALIDATION: u8 = 3;
const EXIT_INTERNAL: u8 = 4;

#[derive(Parser)]
#[command(name = "itemforge", about = "Server item database and client asset tooling")]
struct Cli {
    /// Settings file; missing file falls back to defaults.
    #[arg(long, default_value = "itemforge.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse an item database and print it as JSON.
    Read { path: PathBuf },
    /// Build an item database from a JSON list document.
    Write { path: PathBuf, list: PathBuf },
    /// Check a database and report problems without modifying it.
    Validate {
        path: PathBuf,
        #[arg(long, value_enum, default_value = "standard")]
        level: LevelArg,
    },
    /// Manage timestamped backup copies.
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Inspect a client's paired DAT/SPR files.
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(Subcommand)]
enum ClientAction {
    /// Load a client and print its version and table sizes.
    Info { dat: PathBuf, spr: PathBuf },
    /// Print the sprite fingerprint of one client item.
    Hash {
        dat: PathBuf,
        spr: PathBuf,
        client_id: u16,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    Create { path: PathBuf },
    List { path: Option<PathBuf> },
    Restore {
        path: PathBuf,
        /// Restore the copy taken at this RFC 3339 instant instead of the
        /// newest one.
        #[arg(long)]
        timestamp: Option<String>,
        /// Restore by backup id instead of by file.
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LevelArg {
    Basic,
    Standard,
    Thorough,
    Paranoid,
}

impl From<LevelArg> for ValidationLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Basic => ValidationLevel::Basic,
            LevelArg::Standard => ValidationLevel::Standard,
            LevelArg::Thorough => ValidationLevel::Thorough,
            LevelArg::Paranoid => ValidationLevel::Paranoid,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load config: {e}");
            return ExitCode::from(EXIT_INTERNAL);
        }
    };

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run(command: Command, config: &Config) -> Result<(), u8> {
    match command {
        Command::Read { path } => read_command(&path, config),
        Command::Write { path, list } => write_command(&path, &list, config),
        Command::Validate { path, level } => validate_command(&path, level.into()),
        Command::Backup { action } => backup_command(action, config),
        Command::Client { action } => client_command(action),
    }
}

fn client_command(action: ClientAction) -> Result<(), u8> {
    use itemforge_client::ClientSession;
    use itemforge_signature::sprite_hash;

    let load = |dat: &Path, spr: &Path| {
        ClientSession::load(dat, spr, false).map_err(|e| {
            error!("{e}");
            match e {
                itemforge_client::ClientError::Io(_) => EXIT_FILE,
                _ => EXIT_VALIDATION,
            }
        })
    };
    match action {
        ClientAction::Info { dat, spr } => {
            let session = load(&dat, &spr)?;
            println!(
                "client {}: {} items, {} sprites",
                session.version().name,
                session.item_count(),
                session.sprite_count()
            );
            Ok(())
        }
        ClientAction::Hash {
            dat,
            spr,
            client_id,
        } => {
            let session = load(&dat, &spr)?;
            let item = session.item(client_id).ok_or_else(|| {
                error!("client item {client_id} not found");
                EXIT_VALIDATION
            })?;
            let digest = sprite_hash(item, &session);
            let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
            println!("{hex}");
            Ok(())
        }
    }
}

fn read_command(path: &Path, config: &Config) -> Result<(), u8> {
    if !path.exists() {
        error!("file not found: {}", path.display());
        return Err(EXIT_FILE);
    }
    if config.validate_on_open {
        let result = Validator::default().validate_file(path, ValidationLevel::Standard);
        if !result.is_valid {
            for message in &result.errors {
                error!("{message}");
            }
            return Err(EXIT_VALIDATION);
        }
    }

    let mut reader = OtbReader::default();
    let list = reader.read(path).map_err(otb_exit)?;
    info!(
        items = list.len(),
        version = %format!(
            "{}.{}.{}",
            list.version.major, list.version.minor, list.version.build
        ),
        "database loaded"
    );
    let document = ListDocument::from_list(&list);
    let json = serde_json::to_string_pretty(&document).map_err(|e| {
        error!("serialization failed: {e}");
        EXIT_INTERNAL
    })?;
    println!("{json}");
    Ok(())
}

fn write_command(path: &Path, list_path: &Path, config: &Config) -> Result<(), u8> {
    let raw = std::fs::read_to_string(list_path).map_err(|e| {
        error!("cannot read list document {}: {e}", list_path.display());
        EXIT_FILE
    })?;
    let document: ListDocument = serde_json::from_str(&raw).map_err(|e| {
        error!("malformed list document: {e}");
        EXIT_VALIDATION
    })?;
    let list = document.into_list().map_err(|e| {
        error!("invalid list document: {e}");
        EXIT_VALIDATION
    })?;

    if config.create_backup_on_save && path.exists() {
        let manager = BackupManager::new(config.backup_config());
        manager
            .create_backup(path, BackupKind::PreSave, "before save")
            .map_err(|e| {
                error!("pre-save backup failed: {e}");
                EXIT_FILE
            })?;
    }

    OtbWriter::new().write(path, &list).map_err(otb_exit)?;

    if config.validate_on_save {
        let result = Validator::default().validate_file(path, ValidationLevel::Standard);
        if !result.is_valid {
            for message in &result.errors {
                error!("post-save verification: {message}");
            }
            return Err(EXIT_VALIDATION);
        }
    }
    info!(items = list.len(), path = %path.display(), "database written");
    Ok(())
}

fn validate_command(path: &Path, level: ValidationLevel) -> Result<(), u8> {
    if !path.exists() {
        error!("file not found: {}", path.display());
        return Err(EXIT_FILE);
    }
    let result = Validator::default().validate_file(path, level);
    for warning in &result.warnings {
        println!("warning: {warning}");
    }
    for message in &result.errors {
        println!("error: {message}");
    }
    for detail in &result.corruption_details {
        println!("corruption: {detail}");
    }
    if result.is_valid {
        println!(
            "OK: {} items, range {}-{}",
            result.item_count,
            result.range.map(|r| r.min_id).unwrap_or(0),
            result.range.map(|r| r.max_id).unwrap_or(0),
        );
        Ok(())
    } else {
        for suggestion in &result.suggestions {
            println!("suggestion: {suggestion}");
        }
        Err(EXIT_VALIDATION)
    }
}

fn backup_command(action: BackupAction, config: &Config) -> Result<(), u8> {
    let manager = BackupManager::new(config.backup_config());
    match action {
        BackupAction::Create { path } => {
            let record = manager
                .create_backup(&path, BackupKind::Manual, "manual backup")
                .map_err(backup_exit)?;
            println!(
                "created {} ({} bytes, id {})",
                record.backup_path.display(),
                record.backup_size,
                record.backup_id
            );
            Ok(())
        }
        BackupAction::List { path } => {
            let records = match path {
                Some(original) => manager.find_backups(&original),
                None => manager.all_backups(),
            }
            .map_err(backup_exit)?;
            for record in records {
                println!(
                    "{}  {}  {}  {}",
                    record.timestamp.to_rfc3339(),
                    record.kind.token(),
                    record.backup_path.display(),
                    record.backup_id
                );
            }
            Ok(())
        }
        BackupAction::Restore {
            path,
            timestamp,
            id,
        } => {
            let record = if let Some(id) = id {
                manager.restore_by_id(&id)
            } else if let Some(raw) = timestamp {
                let instant = DateTime::parse_from_rfc3339(&raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| {
                        error!("bad timestamp {raw}: {e}");
                        EXIT_VALIDATION
                    })?;
                manager.restore_by_timestamp(&path, instant)
            } else {
                manager.restore_latest(&path)
            }
            .map_err(backup_exit)?;
            println!("restored {}", record.backup_path.display());
            Ok(())
        }
    }
}

fn otb_exit(error: OtbError) -> u8 {
    error!("{error}");
    match error {
        OtbError::FileNotFound(_) | OtbError::Io(_) => EXIT_FILE,
        OtbError::Cancelled(_) => EXIT_INTERNAL,
        _ => EXIT_VALIDATION,
    }
}

fn backup_exit(error: itemforge_backup::BackupError) -> u8 {
    error!("{error}");
    match error {
        itemforge_backup::BackupError::Io(_) | itemforge_backup::BackupError::NoBackupFound(_) => {
            EXIT_FILE
        }
        itemforge_backup::BackupError::BackupCorrupted(_)
        | itemforge_backup::BackupError::ChecksumMismatch(_) => EXIT_VALIDATION,
        itemforge_backup::BackupError::Metadata(_) => EXIT_INTERNAL,
    }
}
