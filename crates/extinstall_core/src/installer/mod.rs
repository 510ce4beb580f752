//! Installer orchestrator.
//!
//! # Responsibility
//! - Drive one install / update / uninstall / discover operation end-to-end.
//! - Own the rollback stack and unwind it when a run fails.
//! - Provide the file, manifest and schema primitives adapters call into.
//!
//! # Invariants
//! - `run_install` and `run_discover_install` are the only places an `Err`
//!   turns into a rollback unwind.
//! - Steps are recorded only while an operation is in progress.
//! - Uninstall is best effort: step failures become warnings, not errors.
//! - Package children always run in a fresh `Installer` with their own stack.

use crate::adapter::{self, AdapterState};
use crate::manifest::{find_manifest, read_manifest, ManifestView};
use crate::model::extension::{ExtensionId, ExtensionRecord, ExtensionType, STATE_DISCOVERED};
use crate::repo::{ExtensionRepository, RepoError};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub mod config;
mod context;
mod error;
mod files;
mod lifecycle;
mod queries;
pub mod rollback;
mod route;
pub mod script;

pub use config::InstallerConfig;
pub use context::InstallContext;
pub use error::{InstallError, InstallResult};
pub use files::{CopyEntry, EntryKind};
pub use queries::compare_versions;
pub use rollback::{RollbackStack, RollbackStep};
pub use route::InstallRoute;
pub use script::{ChildResult, Hook, InstallerScript, ScriptContext, ScriptError, ScriptRegistry};

/// Named paths an adapter registers for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKey {
    /// Directory the extension is installed from.
    Source,
    /// Manifest file inside the source.
    Manifest,
    /// Primary install folder.
    ExtensionRoot,
    /// Public-facing folder (components).
    ExtensionSite,
    /// Administrative folder (components).
    ExtensionAdministrator,
}

#[derive(Debug, Default, Clone)]
struct InstallPaths {
    source: PathBuf,
    manifest: PathBuf,
    extension_root: PathBuf,
    extension_site: PathBuf,
    extension_administrator: PathBuf,
}

/// Warnings collected by a best-effort uninstall.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallReport {
    pub extension_id: ExtensionId,
    pub warnings: Vec<String>,
    /// The catalog row was kept because dependent removals failed.
    pub record_retained: bool,
}

impl UninstallReport {
    pub fn new(extension_id: ExtensionId) -> Self {
        Self {
            extension_id,
            ..Self::default()
        }
    }

    /// `true` when every step succeeded.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && !self.record_retained
    }

    pub(crate) fn warn(&mut self, step: &str, detail: impl std::fmt::Display) {
        warn!(
            "event=extension_uninstall_step module=installer status=warning extension_id={} step={} error={}",
            self.extension_id, step, detail
        );
        self.warnings.push(format!("{step}: {detail}"));
    }
}

/// Drives extension lifecycle operations against one context.
pub struct Installer<'a> {
    ctx: InstallContext<'a>,
    steps: RollbackStack,
    paths: InstallPaths,
    overwrite: bool,
    upgrade: bool,
    manifest: Option<ManifestView>,
    in_progress: bool,
    route: Option<InstallRoute>,
}

impl<'a> Installer<'a> {
    pub fn new(ctx: InstallContext<'a>) -> Self {
        Self {
            ctx,
            steps: RollbackStack::default(),
            paths: InstallPaths::default(),
            overwrite: false,
            upgrade: false,
            manifest: None,
            in_progress: false,
            route: None,
        }
    }

    pub fn context(&self) -> InstallContext<'a> {
        self.ctx
    }

    /// Allows replacing existing files and catalog rows.
    pub fn set_overwrite(&mut self, overwrite: bool) {
        self.overwrite = overwrite;
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// Treats an existing installation as something to update.
    pub fn set_upgrade(&mut self, upgrade: bool) {
        self.upgrade = upgrade;
    }

    pub fn upgrade(&self) -> bool {
        self.upgrade
    }

    /// Route taken by the last install, update or discover-install.
    pub fn route(&self) -> Option<InstallRoute> {
        self.route
    }

    /// Manifest of the last operation.
    pub fn manifest(&self) -> Option<&ManifestView> {
        self.manifest.as_ref()
    }

    pub fn set_path(&mut self, key: PathKey, path: impl Into<PathBuf>) {
        let path = path.into();
        match key {
            PathKey::Source => self.paths.source = path,
            PathKey::Manifest => self.paths.manifest = path,
            PathKey::ExtensionRoot => self.paths.extension_root = path,
            PathKey::ExtensionSite => self.paths.extension_site = path,
            PathKey::ExtensionAdministrator => self.paths.extension_administrator = path,
        }
    }

    pub fn path(&self, key: PathKey) -> &Path {
        match key {
            PathKey::Source => &self.paths.source,
            PathKey::Manifest => &self.paths.manifest,
            PathKey::ExtensionRoot => &self.paths.extension_root,
            PathKey::ExtensionSite => &self.paths.extension_site,
            PathKey::ExtensionAdministrator => &self.paths.extension_administrator,
        }
    }

    /// Steps recorded so far in the running operation.
    pub fn steps(&self) -> &[RollbackStep] {
        self.steps.steps()
    }

    /// Records a reversible side effect. Ignored outside an operation.
    pub fn push_step(&mut self, step: RollbackStep) {
        if self.in_progress {
            self.steps.push(step);
        }
    }

    /// Unwinds every recorded step and returns the fatal error carrying
    /// `message`. Safe to call repeatedly.
    pub fn abort(&mut self, message: impl Into<String>) -> InstallError {
        let message = message.into();
        self.unwind(&message);
        InstallError::Aborted(message)
    }

    /// Installs the extension found at `path` (a directory or an archive).
    pub fn install(&mut self, path: impl AsRef<Path>) -> InstallResult<ExtensionId> {
        self.run(path.as_ref(), InstallRoute::Install)
    }

    /// Updates from `path`; overwrite and upgrade are forced on.
    pub fn update(&mut self, path: impl AsRef<Path>) -> InstallResult<ExtensionId> {
        self.overwrite = true;
        self.upgrade = true;
        self.run(path.as_ref(), InstallRoute::Update)
    }

    fn run(&mut self, path: &Path, requested: InstallRoute) -> InstallResult<ExtensionId> {
        let started_at = Instant::now();
        info!(
            "event=extension_install module=installer status=start route={} path={}",
            requested,
            path.display()
        );

        self.begin();
        let result = self.install_from(path, requested);
        self.finish("extension_install", started_at, result)
    }

    fn install_from(&mut self, path: &Path, requested: InstallRoute) -> InstallResult<ExtensionId> {
        let ctx = self.ctx;
        let unpacked = ctx.unpacker.unpack(ctx.fs, ctx.reader, path)?;
        let (manifest_path, root) = find_manifest(ctx.fs, ctx.reader, &unpacked.dir)?;
        let manifest = ManifestView::new(root, &manifest_path)?;

        if manifest.requests_upgrade() {
            self.overwrite = true;
            self.upgrade = true;
        }
        self.set_path(PathKey::Source, unpacked.dir.clone());
        self.set_path(PathKey::Manifest, manifest_path);
        self.manifest = Some(manifest.clone());

        let mut adapter = adapter::for_kind(manifest.kind());
        adapter.state_mut().route = requested;
        let result = lifecycle::run_install(self, adapter.as_mut(), &manifest);
        self.route = Some(adapter.state().route);
        result
    }

    /// Removes an installed extension. Individual step failures are
    /// collected as warnings in the returned report.
    pub fn uninstall(&mut self, kind: ExtensionType, id: ExtensionId) -> InstallResult<UninstallReport> {
        let started_at = Instant::now();
        info!(
            "event=extension_uninstall module=installer status=start type={} extension_id={}",
            kind, id
        );

        let result = self.uninstall_record(kind, id);
        match &result {
            Ok(report) => info!(
                "event=extension_uninstall module=installer status=ok extension_id={} warnings={} duration_ms={}",
                id,
                report.warnings.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=extension_uninstall module=installer status=error extension_id={} duration_ms={} error_code={} error={}",
                id,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
        result
    }

    fn uninstall_record(&mut self, kind: ExtensionType, id: ExtensionId) -> InstallResult<UninstallReport> {
        let record = self.load_record(id)?;
        if record.kind != kind {
            return Err(InstallError::precondition(format!(
                "extension {id} is a {}, not a {kind}",
                record.kind
            )));
        }
        if record.protected {
            return Err(InstallError::Protected(id));
        }

        self.paths = InstallPaths::default();
        self.manifest = None;
        let mut adapter = adapter::for_kind(kind);
        adapter.state_mut().route = InstallRoute::Uninstall;
        lifecycle::run_uninstall(self, adapter.as_mut(), record)
    }

    /// Scans every kind's folders for extensions present on disk but absent
    /// from the catalog. Returned records are unsaved and pending.
    pub fn discover(&mut self) -> InstallResult<Vec<ExtensionRecord>> {
        let started_at = Instant::now();
        let extensions = self.ctx.catalog().extensions;
        let mut found = Vec::new();

        for kind in ExtensionType::ALL {
            let adapter = adapter::for_kind(kind);
            for record in adapter.discover(self)? {
                if extensions.find(&record.lookup())?.is_none() {
                    found.push(record);
                }
            }
        }

        info!(
            "event=extension_discover module=installer status=ok found={} duration_ms={}",
            found.len(),
            started_at.elapsed().as_millis()
        );
        Ok(found)
    }

    /// Persists discovered records as pending rows.
    pub fn store_discovered(&mut self, records: &mut [ExtensionRecord]) -> InstallResult<Vec<ExtensionId>> {
        let extensions = self.ctx.catalog().extensions;
        let mut ids = Vec::with_capacity(records.len());
        for record in records.iter_mut() {
            record.extension_id = None;
            record.state = STATE_DISCOVERED;
            ids.push(extensions.store(record)?);
        }
        Ok(ids)
    }

    /// Registers a pending (discovered) record without copying files.
    pub fn discover_install(&mut self, id: ExtensionId) -> InstallResult<ExtensionId> {
        let started_at = Instant::now();
        info!(
            "event=extension_discover_install module=installer status=start extension_id={}",
            id
        );

        self.begin();
        let result = self.discover_install_record(id);
        self.finish("extension_discover_install", started_at, result)
    }

    fn discover_install_record(&mut self, id: ExtensionId) -> InstallResult<ExtensionId> {
        let record = self.load_record(id)?;
        if !record.is_discovered() {
            return Err(InstallError::precondition(format!(
                "extension {id} is not pending discovery"
            )));
        }

        let mut adapter = adapter::for_kind(record.kind);
        adapter.state_mut().route = InstallRoute::DiscoverInstall;
        let result = lifecycle::run_discover_install(self, adapter.as_mut(), record);
        self.route = Some(adapter.state().route);
        result
    }

    /// Re-reads an installed extension's manifest and refreshes its cached
    /// metadata.
    pub fn refresh_manifest_cache(&mut self, id: ExtensionId) -> InstallResult<()> {
        let mut record = self.load_record(id)?;
        let mut adapter = adapter::for_kind(record.kind);
        adapter.setup_uninstall(self, &record)?;
        let manifest_path = adapter
            .installed_manifest_path(self, &record)
            .ok_or_else(|| InstallError::NotFound(format!("manifest of extension {id}")))?;
        let root = read_manifest(self.ctx.fs, self.ctx.reader, &manifest_path)?;
        let manifest = ManifestView::new(root, manifest_path)?;

        record.manifest_cache = manifest.manifest_cache();
        self.ctx.catalog().extensions.store(&mut record)?;
        info!(
            "event=manifest_cache_refresh module=installer status=ok extension_id={}",
            id
        );
        Ok(())
    }

    fn load_record(&self, id: ExtensionId) -> InstallResult<ExtensionRecord> {
        match self.ctx.catalog().extensions.load(id) {
            Ok(record) => Ok(record),
            Err(RepoError::NotFound(_)) => Err(InstallError::NotFound(format!("extension {id}"))),
            Err(err) => Err(err.into()),
        }
    }

    fn begin(&mut self) {
        self.steps.clear();
        self.paths = InstallPaths::default();
        self.manifest = None;
        self.route = None;
        self.in_progress = true;
    }

    fn finish(
        &mut self,
        event: &str,
        started_at: Instant,
        result: InstallResult<ExtensionId>,
    ) -> InstallResult<ExtensionId> {
        match result {
            Ok(id) => {
                self.steps.clear();
                self.in_progress = false;
                info!(
                    "event={} module=installer status=ok extension_id={} route={} duration_ms={}",
                    event,
                    id,
                    self.route.unwrap_or_default(),
                    started_at.elapsed().as_millis()
                );
                Ok(id)
            }
            Err(err) => {
                self.unwind(&err.to_string());
                error!(
                    "event={} module=installer status=error duration_ms={} error_code={} error={}",
                    event,
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                Err(err)
            }
        }
    }

    fn unwind(&mut self, message: &str) {
        let count = self.steps.len();
        if count > 0 {
            warn!(
                "event=rollback module=installer status=start steps={} reason={}",
                count, message
            );
        }
        for step in self.steps.drain_lifo() {
            rollback::reverse_step(self.ctx, &step);
        }
        self.in_progress = false;
    }
}

/// Script context for the adapter's current state.
pub(crate) fn script_context<'s>(
    installer: &'s Installer<'_>,
    state: &'s AdapterState,
    extension_id: Option<ExtensionId>,
) -> ScriptContext<'s> {
    ScriptContext {
        route: state.route,
        kind: state.kind,
        element: &state.element,
        name: &state.name,
        extension_id,
        source: installer.path(PathKey::Source),
        extension_root: installer.path(PathKey::ExtensionRoot),
        conn: installer.ctx.conn,
    }
}
