//! Rollback stack for one installer run.
//!
//! # Responsibility
//! - Record every reversible side effect in the order it happened.
//! - Reverse recorded effects in strict LIFO order on abort.
//!
//! # Invariants
//! - Steps are never mutated after being pushed.
//! - The stack is emptied by both commit and unwind, so unwinding twice is a
//!   no-op.

use super::{InstallContext, Installer};
use crate::model::extension::{ExtensionId, ExtensionType, STATE_DISCOVERED};
use crate::repo::ExtensionRepository;
use log::{debug, warn};
use std::path::PathBuf;

/// One reversible side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackStep {
    FolderCreated(PathBuf),
    FileCreated(PathBuf),
    ExtensionRowCreated(ExtensionId),
    /// A discovered row promoted to registered; reverted to pending.
    ExtensionRowPromoted(ExtensionId),
    MenuItemsCreated { component_id: ExtensionId },
    ModuleRowCreated(i64),
    StyleRowCreated(i64),
    /// Access asset registered under this name.
    AssetCreated(String),
    /// Installed by a package child run; reversed by uninstalling it.
    ChildExtensionInstalled { kind: ExtensionType, id: ExtensionId },
}

impl RollbackStep {
    fn label(&self) -> &'static str {
        match self {
            Self::FolderCreated(_) => "folder",
            Self::FileCreated(_) => "file",
            Self::ExtensionRowCreated(_) => "extension",
            Self::ExtensionRowPromoted(_) => "extension_state",
            Self::MenuItemsCreated { .. } => "menu",
            Self::ModuleRowCreated(_) => "module",
            Self::StyleRowCreated(_) => "style",
            Self::AssetCreated(_) => "asset",
            Self::ChildExtensionInstalled { .. } => "child",
        }
    }
}

#[derive(Debug, Default)]
pub struct RollbackStack {
    steps: Vec<RollbackStep>,
}

impl RollbackStack {
    pub fn push(&mut self, step: RollbackStep) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[RollbackStep] {
        &self.steps
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    /// Removes every step, newest first.
    pub fn drain_lifo(&mut self) -> impl Iterator<Item = RollbackStep> {
        std::mem::take(&mut self.steps).into_iter().rev()
    }
}

/// Reverses one step. Failures are logged and never stop the unwind.
pub(crate) fn reverse_step(ctx: InstallContext<'_>, step: &RollbackStep) {
    let label = step.label();
    match reverse(ctx, step) {
        Ok(()) => debug!("event=rollback_step module=installer status=ok step={label} detail={step:?}"),
        Err(err) => warn!(
            "event=rollback_step module=installer status=error step={label} detail={step:?} error={err}"
        ),
    }
}

fn reverse(ctx: InstallContext<'_>, step: &RollbackStep) -> Result<(), String> {
    let catalog = ctx.catalog();
    match step {
        RollbackStep::FolderCreated(path) => ctx.fs.delete_folder(path).map_err(|err| err.to_string()),
        RollbackStep::FileCreated(path) => ctx.fs.delete_file(path).map_err(|err| err.to_string()),
        RollbackStep::ExtensionRowCreated(id) => catalog
            .extensions
            .delete(*id)
            .map_err(|err| err.to_string()),
        RollbackStep::ExtensionRowPromoted(id) => {
            let mut record = catalog.extensions.load(*id).map_err(|err| err.to_string())?;
            record.state = STATE_DISCOVERED;
            catalog
                .extensions
                .store(&mut record)
                .map(|_| ())
                .map_err(|err| err.to_string())
        }
        RollbackStep::MenuItemsCreated { component_id } => catalog
            .menus
            .delete_for_component(*component_id)
            .map(|_| ())
            .map_err(|err| err.to_string()),
        RollbackStep::ModuleRowCreated(id) => {
            catalog.modules.delete(*id).map_err(|err| err.to_string())
        }
        RollbackStep::StyleRowCreated(id) => {
            catalog.styles.delete(*id).map_err(|err| err.to_string())
        }
        RollbackStep::AssetCreated(name) => catalog
            .assets
            .delete_by_name(name)
            .map(|_| ())
            .map_err(|err| err.to_string()),
        RollbackStep::ChildExtensionInstalled { kind, id } => {
            let mut child = Installer::new(ctx);
            child
                .uninstall(*kind, *id)
                .map(|_| ())
                .map_err(|err| err.to_string())
        }
    }
}
