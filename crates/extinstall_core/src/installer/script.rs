//! Custom installer scripts.
//!
//! # Responsibility
//! - Define the optional hook interface a manifest's `scriptfile` maps to.
//! - Resolve scripts through an explicit registry keyed by kind and element.
//!
//! # Invariants
//! - Hooks run inline and synchronously; their own side effects are not
//!   tracked by the rollback stack.
//! - A script is only active when the manifest names a `scriptfile` and the
//!   registry holds a script for the extension's key.

use super::InstallRoute;
use crate::model::extension::{ExtensionId, ExtensionType};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Failure signal returned by a hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ScriptError(pub String);

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type HookResult = Result<(), ScriptError>;

/// Lifecycle points a script can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Preflight,
    Install,
    Update,
    Uninstall,
    Postflight,
}

impl Hook {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::Install => "install",
            Self::Update => "update",
            Self::Uninstall => "uninstall",
            Self::Postflight => "postflight",
        }
    }

    /// Whether a failed hook stops the operation.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Preflight | Self::Install | Self::Update)
    }
}

impl Display for Hook {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One child extension installed by a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildResult {
    pub name: String,
    pub extension_id: ExtensionId,
}

/// What a hook sees of the running operation.
pub struct ScriptContext<'a> {
    pub route: InstallRoute,
    pub kind: ExtensionType,
    pub element: &'a str,
    pub name: &'a str,
    /// Set once the catalog row exists.
    pub extension_id: Option<ExtensionId>,
    pub source: &'a Path,
    pub extension_root: &'a Path,
    pub conn: &'a Connection,
}

/// Optional lifecycle callbacks for one extension. Every hook defaults to a
/// no-op success.
pub trait InstallerScript: Send + Sync {
    fn preflight(&self, _route: InstallRoute, _cx: &ScriptContext<'_>) -> HookResult {
        Ok(())
    }

    fn install(&self, _cx: &ScriptContext<'_>) -> HookResult {
        Ok(())
    }

    fn update(&self, _cx: &ScriptContext<'_>) -> HookResult {
        Ok(())
    }

    fn uninstall(&self, _cx: &ScriptContext<'_>) -> HookResult {
        Ok(())
    }

    fn postflight(
        &self,
        _route: InstallRoute,
        _cx: &ScriptContext<'_>,
        _results: &[ChildResult],
    ) -> HookResult {
        Ok(())
    }

    /// Whether this script implements `update`. A script that does counts as
    /// an update mechanism when the target folder already exists.
    fn supports_update(&self) -> bool {
        false
    }
}

/// Explicit map from script key to script.
#[derive(Clone, Default)]
pub struct ScriptRegistry {
    scripts: BTreeMap<String, Arc<dyn InstallerScript>>,
}

impl ScriptRegistry {
    pub const fn new() -> Self {
        Self {
            scripts: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, key: impl Into<String>, script: Arc<dyn InstallerScript>) {
        self.scripts.insert(key.into(), script);
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn InstallerScript>> {
        self.scripts.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

/// Registry key for an extension's script: `plg_<group>_<element>` for
/// plugins, `tpl_<element>` for templates, `lib_<element>` for libraries and
/// the bare element otherwise.
pub fn script_key(kind: ExtensionType, element: &str, group: Option<&str>) -> String {
    match kind {
        ExtensionType::Plugin => format!("plg_{}_{}", group.unwrap_or_default(), element),
        ExtensionType::Template => format!("tpl_{element}"),
        ExtensionType::Library => format!("lib_{element}"),
        ExtensionType::Component
        | ExtensionType::Module
        | ExtensionType::File
        | ExtensionType::Package => element.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;
    impl InstallerScript for Noop {}

    #[test]
    fn script_keys_are_kind_qualified() {
        assert_eq!(
            script_key(ExtensionType::Plugin, "tinymce", Some("editors")),
            "plg_editors_tinymce"
        );
        assert_eq!(script_key(ExtensionType::Template, "beez", None), "tpl_beez");
        assert_eq!(script_key(ExtensionType::Component, "com_foo", None), "com_foo");
    }

    #[test]
    fn registry_resolves_registered_scripts() {
        let mut registry = ScriptRegistry::new();
        assert!(registry.is_empty());
        registry.register("com_foo", Arc::new(Noop));
        assert!(registry.get("com_foo").is_some());
        assert!(registry.get("com_bar").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn only_route_hooks_and_preflight_are_fatal() {
        assert!(Hook::Preflight.is_fatal());
        assert!(Hook::Update.is_fatal());
        assert!(!Hook::Postflight.is_fatal());
        assert!(!Hook::Uninstall.is_fatal());
    }
}
