//! Extension catalog record model.
//!
//! # Responsibility
//! - Define the canonical catalog row describing one installed extension.
//! - Describe the per-kind uniqueness subset used for lookups.
//!
//! # Invariants
//! - `(kind, element, folder, client_id)` is unique in the catalog.
//! - Plugins always carry a non-empty `folder` (their group).
//! - `protected` records are never removed by the standard uninstall path.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Surrogate key assigned by the catalog on first store.
pub type ExtensionId = i64;

/// `state` value of a record found on disk but not yet registered.
pub const STATE_DISCOVERED: i64 = -1;

/// The seven installable extension kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionType {
    Component,
    Module,
    Plugin,
    Template,
    Library,
    File,
    Package,
}

impl ExtensionType {
    pub const ALL: [ExtensionType; 7] = [
        Self::Component,
        Self::Module,
        Self::Plugin,
        Self::Template,
        Self::Library,
        Self::File,
        Self::Package,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Component => "component",
            Self::Module => "module",
            Self::Plugin => "plugin",
            Self::Template => "template",
            Self::Library => "library",
            Self::File => "file",
            Self::Package => "package",
        }
    }

    /// Parses a kind name, ignoring ASCII case.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
    }
}

impl Display for ExtensionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment surface an extension targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientId {
    /// Public-facing application (`client_id = 0`).
    #[default]
    Site,
    /// Administrative application (`client_id = 1`).
    Administrator,
}

impl ClientId {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Site => 0,
            Self::Administrator => 1,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Site),
            1 => Some(Self::Administrator),
            _ => None,
        }
    }

    /// Resolves a manifest `client` attribute (`site`, `administrator`,
    /// `admin`, `0`, `1`).
    pub fn from_name(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "site" | "0" => Some(Self::Site),
            "administrator" | "admin" | "1" => Some(Self::Administrator),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Site => "site",
            Self::Administrator => "administrator",
        }
    }
}

/// Canonical catalog row for one extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRecord {
    /// `None` until the record has been stored.
    pub extension_id: Option<ExtensionId>,
    pub name: String,
    /// Serialized as `type` to match catalog column naming.
    #[serde(rename = "type")]
    pub kind: ExtensionType,
    /// Kind-specific slug, e.g. `com_foo`, `mod_bar`.
    pub element: String,
    /// Plugin group. Empty for other kinds.
    pub folder: String,
    pub client_id: ClientId,
    pub enabled: bool,
    pub access: i64,
    pub protected: bool,
    /// Opaque configuration blob (JSON object text).
    pub params: String,
    /// Serialized descriptive metadata, refreshed on every install/update.
    pub manifest_cache: String,
    pub custom_data: String,
    pub system_data: String,
    pub ordering: i64,
    /// `0` when registered, [`STATE_DISCOVERED`] when pending.
    pub state: i64,
}

impl ExtensionRecord {
    /// Creates an unsaved record with neutral defaults.
    pub fn new(kind: ExtensionType, element: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            extension_id: None,
            name: name.into(),
            kind,
            element: element.into(),
            folder: String::new(),
            client_id: ClientId::Site,
            enabled: false,
            access: 1,
            protected: false,
            params: String::new(),
            manifest_cache: String::new(),
            custom_data: String::new(),
            system_data: String::new(),
            ordering: 0,
            state: 0,
        }
    }

    pub fn is_discovered(&self) -> bool {
        self.state == STATE_DISCOVERED
    }

    /// Lookup describing this record's uniqueness subset.
    pub fn lookup(&self) -> ExtensionLookup {
        ExtensionLookup::for_kind(
            self.kind,
            self.element.as_str(),
            Some(self.folder.as_str()),
            Some(self.client_id),
        )
    }

    /// Validates write-time invariants.
    pub fn validate(&self) -> Result<(), ExtensionValidationError> {
        if self.element.trim().is_empty() {
            return Err(ExtensionValidationError::EmptyElement);
        }
        if self.name.trim().is_empty() {
            return Err(ExtensionValidationError::EmptyName);
        }
        if self.kind == ExtensionType::Plugin && self.folder.trim().is_empty() {
            return Err(ExtensionValidationError::MissingPluginFolder);
        }
        Ok(())
    }
}

/// Validation failures for [`ExtensionRecord`] writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtensionValidationError {
    #[error("extension element must not be empty")]
    EmptyElement,
    #[error("extension name must not be empty")]
    EmptyName,
    #[error("plugin extensions require a folder (group)")]
    MissingPluginFolder,
}

/// Field set used to find a catalog record.
///
/// `None` fields are not part of the query. Use [`ExtensionLookup::for_kind`]
/// to build the uniqueness subset a kind actually honours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionLookup {
    pub kind: ExtensionType,
    pub element: String,
    pub folder: Option<String>,
    pub client_id: Option<ClientId>,
}

impl ExtensionLookup {
    /// Restricts the given fields to the kind's uniqueness subset.
    ///
    /// Components, libraries, file-sets and packages match on element only;
    /// plugins add the folder; modules and templates add the client.
    pub fn for_kind(
        kind: ExtensionType,
        element: &str,
        folder: Option<&str>,
        client_id: Option<ClientId>,
    ) -> Self {
        let (folder, client_id) = match kind {
            ExtensionType::Plugin => (Some(folder.unwrap_or_default().to_string()), None),
            ExtensionType::Module | ExtensionType::Template => {
                (None, Some(client_id.unwrap_or_default()))
            }
            ExtensionType::Component
            | ExtensionType::Library
            | ExtensionType::File
            | ExtensionType::Package => (None, None),
        };
        Self {
            kind,
            element: element.to_string(),
            folder,
            client_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kind_is_case_insensitive() {
        assert_eq!(ExtensionType::parse("Plugin"), Some(ExtensionType::Plugin));
        assert_eq!(ExtensionType::parse(" file "), Some(ExtensionType::File));
        assert_eq!(ExtensionType::parse("language"), None);
    }

    #[test]
    fn lookup_subsets_follow_kind() {
        let plugin = ExtensionLookup::for_kind(
            ExtensionType::Plugin,
            "tinymce",
            Some("editors"),
            Some(ClientId::Administrator),
        );
        assert_eq!(plugin.folder.as_deref(), Some("editors"));
        assert_eq!(plugin.client_id, None);

        let module = ExtensionLookup::for_kind(
            ExtensionType::Module,
            "mod_hello",
            Some("ignored"),
            Some(ClientId::Administrator),
        );
        assert_eq!(module.folder, None);
        assert_eq!(module.client_id, Some(ClientId::Administrator));

        let component =
            ExtensionLookup::for_kind(ExtensionType::Component, "com_foo", Some("x"), None);
        assert_eq!(component.folder, None);
        assert_eq!(component.client_id, None);
    }

    #[test]
    fn plugin_without_folder_is_invalid() {
        let record = ExtensionRecord::new(ExtensionType::Plugin, "tinymce", "TinyMCE");
        assert_eq!(
            record.validate(),
            Err(ExtensionValidationError::MissingPluginFolder)
        );
    }

    #[test]
    fn client_names_resolve() {
        assert_eq!(ClientId::from_name("admin"), Some(ClientId::Administrator));
        assert_eq!(ClientId::from_name("SITE"), Some(ClientId::Site));
        assert_eq!(ClientId::from_name("installation"), None);
    }
}
