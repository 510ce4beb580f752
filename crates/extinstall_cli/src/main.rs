//! Command-line front end for the extension installer.
//!
//! # Responsibility
//! - Resolve layout, catalog and log locations from global options.
//! - Map each subcommand onto one `Installer` operation.

mod args;

use args::{Cli, Command};
use clap::Parser;
use extinstall_core::installer::config::ConfigError;
use extinstall_core::{
    default_log_level, init_logging, open_db, DbError, ExtensionRepository, InstallContext, InstallError,
    Installer, InstallerConfig, LocalFilesystem, LoggingError, RepoError, SqliteExtensionRepository,
};
use log::info;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

const DB_FILE_NAME: &str = "extinstall.sqlite3";
const LOG_DIR_NAME: &str = "logs";

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error("cannot resolve working directory: {0}")]
    WorkingDir(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf, CliError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let root = absolute(&cli.root)?;
    let config = match &cli.config {
        Some(path) => InstallerConfig::load(path)?,
        None => InstallerConfig::under(&root),
    };

    let log_dir = absolute(&cli.log_dir.unwrap_or_else(|| config.root.join(LOG_DIR_NAME)))?;
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    init_logging(level, &log_dir)?;

    let db_path = cli.db.unwrap_or_else(|| config.root.join(DB_FILE_NAME));
    let conn = open_db(&db_path)?;
    let fs = LocalFilesystem;
    let ctx = InstallContext::new(&conn, &fs, &config);
    let mut installer = Installer::new(ctx);

    match cli.command {
        Command::Install { path, overwrite } => {
            installer.set_overwrite(overwrite);
            let id = installer.install(&path)?;
            println!(
                "installed extension_id={id} route={}",
                installer.route().unwrap_or_default()
            );
        }
        Command::Update { path } => {
            let id = installer.update(&path)?;
            println!(
                "updated extension_id={id} route={}",
                installer.route().unwrap_or_default()
            );
        }
        Command::Uninstall { kind, id } => {
            let report = installer.uninstall(kind, id)?;
            for warning in &report.warnings {
                println!("warning: {warning}");
            }
            if report.record_retained {
                println!("kept extension_id={id}: dependent removals failed");
            } else {
                println!("removed extension_id={id}");
            }
        }
        Command::Discover { store } => {
            let mut found = installer.discover()?;
            for record in &found {
                println!("{}\t{}\t{}\t{}", record.kind, record.element, record.client_id.name(), record.name);
            }
            if store {
                let ids = installer.store_discovered(&mut found)?;
                info!(
                    "event=discover_store module=cli status=ok stored={}",
                    ids.len()
                );
                println!("stored {} pending extensions", ids.len());
            }
        }
        Command::DiscoverInstall { id } => {
            installer.discover_install(id)?;
            println!("registered extension_id={id}");
        }
        Command::RefreshCache { id } => {
            installer.refresh_manifest_cache(id)?;
            println!("refreshed extension_id={id}");
        }
        Command::List { kind } => {
            let records = SqliteExtensionRepository::new(&conn).list(kind)?;
            for record in records {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    record.extension_id.unwrap_or_default(),
                    record.kind,
                    record.element,
                    if record.is_discovered() { "pending" } else if record.enabled { "enabled" } else { "disabled" },
                    record.name
                );
            }
        }
    }
    Ok(())
}
