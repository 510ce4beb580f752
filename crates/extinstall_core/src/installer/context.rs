use super::config::InstallerConfig;
use super::script::ScriptRegistry;
use crate::fs::Filesystem;
use crate::manifest::{JsonManifestReader, ManifestReader};
use crate::repo::Catalog;
use crate::unpack::{ArchiveUnpacker, PackageUnpacker};
use rusqlite::Connection;

static DEFAULT_READER: JsonManifestReader = JsonManifestReader;
static DEFAULT_UNPACKER: ArchiveUnpacker = ArchiveUnpacker;
static EMPTY_SCRIPTS: ScriptRegistry = ScriptRegistry::new();

/// Collaborators every installer run works through.
///
/// Passed by value into each `Installer`; package children receive the same
/// context so they write into the same catalog and filesystem.
#[derive(Clone, Copy)]
pub struct InstallContext<'a> {
    pub conn: &'a Connection,
    pub fs: &'a dyn Filesystem,
    pub config: &'a InstallerConfig,
    pub reader: &'a dyn ManifestReader,
    pub unpacker: &'a dyn PackageUnpacker,
    pub scripts: &'a ScriptRegistry,
}

impl<'a> InstallContext<'a> {
    /// Context with the JSON manifest reader, the archive unpacker and no
    /// custom scripts.
    pub fn new(conn: &'a Connection, fs: &'a dyn Filesystem, config: &'a InstallerConfig) -> Self {
        Self {
            conn,
            fs,
            config,
            reader: &DEFAULT_READER,
            unpacker: &DEFAULT_UNPACKER,
            scripts: &EMPTY_SCRIPTS,
        }
    }

    pub fn with_reader(mut self, reader: &'a dyn ManifestReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_unpacker(mut self, unpacker: &'a dyn PackageUnpacker) -> Self {
        self.unpacker = unpacker;
        self
    }

    pub fn with_scripts(mut self, scripts: &'a ScriptRegistry) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn catalog(&self) -> Catalog<'a> {
        Catalog::new(self.conn)
    }

    /// Manifest file name for `stem` under the active reader.
    pub fn manifest_file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.reader.extension())
    }
}
