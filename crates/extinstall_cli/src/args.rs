use clap::{Parser, Subcommand};
use extinstall_core::ExtensionType;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "extinstall")]
#[command(about = "Install, update and remove application extensions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// JSON file describing the application layout. Overrides `--root`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Application root; the default layout is derived from it.
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Catalog database. Defaults to `<root>/extinstall.sqlite3`.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Log directory. Defaults to `<root>/logs`.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install from a directory or archive
    Install {
        path: PathBuf,

        /// Replace existing files and catalog rows
        #[arg(long)]
        overwrite: bool,
    },

    /// Update an installed extension from a directory or archive
    Update { path: PathBuf },

    /// Remove an installed extension
    #[command(alias = "rm")]
    Uninstall {
        #[arg(value_parser = parse_kind)]
        kind: ExtensionType,
        id: i64,
    },

    /// List extensions present on disk but missing from the catalog
    Discover {
        /// Store what was found as pending rows
        #[arg(long)]
        store: bool,
    },

    /// Register a pending (discovered) extension
    DiscoverInstall { id: i64 },

    /// Re-read an installed manifest into the catalog
    RefreshCache { id: i64 },

    /// List catalog rows
    #[command(alias = "ls")]
    List {
        #[arg(long = "type", value_parser = parse_kind)]
        kind: Option<ExtensionType>,
    },
}

fn parse_kind(value: &str) -> Result<ExtensionType, String> {
    ExtensionType::parse(value).ok_or_else(|| {
        format!("unknown extension type `{value}`; expected component|module|plugin|template|library|file|package")
    })
}
