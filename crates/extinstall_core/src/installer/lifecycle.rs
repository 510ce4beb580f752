//! Shared install / uninstall / discover-install phase order.
//!
//! # Invariants
//! - Every fatal phase returns `Err`; unwinding happens in `Installer::finish`.
//! - Uninstall phases never return early after the refusal checks; their
//!   failures land in the `UninstallReport`.

use super::script::HookResult;
use super::{
    script_context, CopyEntry, Hook, InstallError, InstallResult, InstallRoute, Installer, PathKey,
    RollbackStep, UninstallReport,
};
use crate::adapter::{load_manifest, AdapterState, KindAdapter};
use crate::manifest::{read_manifest, ManifestView};
use crate::model::extension::{ExtensionId, ExtensionRecord};
use crate::repo::ExtensionRepository;
use log::{debug, warn};
use std::path::Path;

/// Runs an install or update of `manifest` through `adapter`.
pub(crate) fn run_install(
    installer: &mut Installer<'_>,
    adapter: &mut dyn KindAdapter,
    manifest: &ManifestView,
) -> InstallResult<ExtensionId> {
    adapter.setup_install_paths(installer, manifest)?;
    adapter.check_existing_extension(installer)?;
    if adapter.state().route == InstallRoute::Update && adapter.state().current_extension_id.is_none() {
        adapter.state_mut().route = InstallRoute::Install;
    }

    load_script(installer, adapter, manifest);
    adapter.check_extension_in_filesystem(installer, manifest)?;
    fatal_hook(installer, adapter.state(), Hook::Preflight, None)?;

    adapter.create_extension_root(installer)?;
    adapter.copy_base_files(installer, manifest)?;
    copy_script_file(installer, adapter, manifest)?;
    adapter.parse_optional_tags(installer, manifest)?;

    let id = adapter.store_extension(installer)?;
    let route = adapter.state().route;
    if route == InstallRoute::Update {
        installer.parse_schema_updates(manifest.update_schemas(), id)?;
    } else {
        installer.parse_sql_files(manifest.node("install/sql"))?;
        installer.set_schema_version(manifest.update_schemas(), id)?;
    }
    let hook = if route == InstallRoute::Update {
        Hook::Update
    } else {
        Hook::Install
    };
    fatal_hook(installer, adapter.state(), hook, Some(id))?;

    let destination = adapter.manifest_destination(installer, manifest);
    installer.copy_manifest(&destination)?;
    adapter.finalise_install(installer, manifest)?;

    soft_hook(installer, adapter.state(), Hook::Postflight, Some(id));
    Ok(id)
}

/// Removes `record` step by step, collecting failures as warnings.
pub(crate) fn run_uninstall(
    installer: &mut Installer<'_>,
    adapter: &mut dyn KindAdapter,
    record: ExtensionRecord,
) -> InstallResult<UninstallReport> {
    let id = record
        .extension_id
        .ok_or_else(|| InstallError::NotFound(format!("{} `{}`", record.kind, record.element)))?;
    adapter.setup_uninstall(installer, &record)?;
    adapter.refuse_uninstall(installer, &record)?;

    let mut report = UninstallReport::new(id);
    let manifest = adapter
        .installed_manifest_path(installer, &record)
        .and_then(|path| load_manifest(installer, &path));
    match &manifest {
        Some(manifest) => {
            load_script(installer, adapter, manifest);
            installer.manifest = Some(manifest.clone());
        }
        None => report.warn("manifest", "installed manifest not found"),
    }

    if let Err(err) = call_hook(installer, adapter.state(), Hook::Uninstall, Some(id)) {
        report.warn(Hook::Uninstall.as_str(), err);
    }
    if let Some(manifest) = &manifest {
        if let Err(err) = installer.parse_sql_files(manifest.node("uninstall/sql")) {
            report.warn("uninstall_sql", err);
        }
    }
    if let Err(err) = installer.context().catalog().markers.clear_schema_version(id) {
        report.warn("schema_version", err);
    }

    adapter.remove_auxiliary(installer, &record, &mut report);
    adapter.remove_extension_files(installer, &record, manifest.as_ref(), &mut report);

    if !report.record_retained {
        if let Err(err) = installer.context().catalog().extensions.delete(id) {
            report.warn("delete_record", err);
        }
    }
    Ok(report)
}

/// Registers a pending record whose files are already in place.
pub(crate) fn run_discover_install(
    installer: &mut Installer<'_>,
    adapter: &mut dyn KindAdapter,
    record: ExtensionRecord,
) -> InstallResult<ExtensionId> {
    let id = record
        .extension_id
        .ok_or_else(|| InstallError::NotFound(format!("{} `{}`", record.kind, record.element)))?;
    adapter.state_mut().adopt(&record);

    let manifest_path = adapter.prepare_discover_install(installer, &record)?;
    let ctx = installer.context();
    let root = read_manifest(ctx.fs, ctx.reader, &manifest_path)?;
    let manifest = ManifestView::new(root, &manifest_path)?;
    if installer.path(PathKey::Source).as_os_str().is_empty() {
        installer.set_path(PathKey::Source, manifest.source_dir().to_path_buf());
    }
    installer.set_path(PathKey::Manifest, manifest_path);
    installer.manifest = Some(manifest.clone());

    load_script(installer, adapter, &manifest);
    fatal_hook(installer, adapter.state(), Hook::Preflight, Some(id))?;

    let mut promoted = adapter.default_record(installer);
    promoted.extension_id = Some(id);
    promoted.protected = record.protected;
    promoted.ordering = record.ordering;
    promoted.manifest_cache = manifest.manifest_cache();
    promoted.state = 0;
    ctx.catalog().extensions.store(&mut promoted)?;
    installer.push_step(RollbackStep::ExtensionRowPromoted(id));
    adapter.state_mut().record = Some(promoted);

    installer.parse_sql_files(manifest.node("install/sql"))?;
    installer.set_schema_version(manifest.update_schemas(), id)?;
    adapter.finalise_discover_install(installer, &manifest)?;

    fatal_hook(installer, adapter.state(), Hook::Install, Some(id))?;
    soft_hook(installer, adapter.state(), Hook::Postflight, Some(id));
    Ok(id)
}

/// Activates the registered script when the manifest names a `scriptfile`.
fn load_script(installer: &Installer<'_>, adapter: &mut dyn KindAdapter, manifest: &ManifestView) {
    if manifest.script_file().is_none() {
        return;
    }
    let key = adapter.script_key();
    let script = installer.context().scripts.get(&key);
    if script.is_none() {
        debug!(
            "event=script_lookup module=installer status=missing key={}",
            key
        );
    }
    adapter.state_mut().script = script;
}

/// Copies the manifest's `scriptfile` next to the installed files.
fn copy_script_file(
    installer: &mut Installer<'_>,
    adapter: &dyn KindAdapter,
    manifest: &ManifestView,
) -> InstallResult<()> {
    let (Some(script_file), Some(folder)) = (manifest.script_file(), adapter.script_destination(installer)) else {
        return Ok(());
    };
    let file_name = Path::new(script_file)
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| script_file.into());
    let src = installer.path(PathKey::Source).join(script_file);
    let dest = folder.join(file_name);
    installer.copy_files(&[CopyEntry::file(src, dest)], Some(true))?;
    Ok(())
}

fn call_hook(
    installer: &Installer<'_>,
    state: &AdapterState,
    hook: Hook,
    extension_id: Option<ExtensionId>,
) -> HookResult {
    let Some(script) = state.script.as_ref() else {
        return Ok(());
    };
    let cx = script_context(installer, state, extension_id);
    debug!(
        "event=script_hook module=installer hook={} element={}",
        hook, state.element
    );
    match hook {
        Hook::Preflight => script.preflight(state.route, &cx),
        Hook::Install => script.install(&cx),
        Hook::Update => script.update(&cx),
        Hook::Uninstall => script.uninstall(&cx),
        Hook::Postflight => script.postflight(state.route, &cx, &state.results),
    }
}

fn fatal_hook(
    installer: &Installer<'_>,
    state: &AdapterState,
    hook: Hook,
    extension_id: Option<ExtensionId>,
) -> InstallResult<()> {
    match call_hook(installer, state, hook, extension_id) {
        Ok(()) => Ok(()),
        Err(err) if hook.is_fatal() => Err(InstallError::ScriptHook {
            hook: hook.as_str(),
            message: err.0,
        }),
        Err(err) => {
            warn!(
                "event=script_hook module=installer status=warning hook={} element={} error={}",
                hook, state.element, err
            );
            Ok(())
        }
    }
}

fn soft_hook(installer: &Installer<'_>, state: &AdapterState, hook: Hook, extension_id: Option<ExtensionId>) {
    if let Err(err) = call_hook(installer, state, hook, extension_id) {
        warn!(
            "event=script_hook module=installer status=warning hook={} element={} error={}",
            hook, state.element, err
        );
    }
}
