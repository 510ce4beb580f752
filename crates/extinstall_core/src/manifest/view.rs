//! Typed projection over one manifest tree.

use super::{ManifestError, ManifestNode, ManifestResult, ROOT_NODE};
use crate::model::extension::{ClientId, ExtensionType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

static UNSAFE_ELEMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").expect("valid element regex"));

const CACHE_FIELDS: &[(&str, &str)] = &[
    ("name", "name"),
    ("creationDate", "creationDate"),
    ("author", "author"),
    ("copyright", "copyright"),
    ("authorEmail", "authorEmail"),
    ("authorUrl", "authorUrl"),
    ("version", "version"),
    ("description", "description"),
];

/// Strips everything but `[A-Za-z0-9_.-]` and leading dots, then lower-cases.
pub fn clean_element(value: &str) -> String {
    let cleaned = UNSAFE_ELEMENT_RE.replace_all(value, "");
    cleaned.trim_start_matches('.').to_ascii_lowercase()
}

/// Read-only view of one manifest for one installer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestView {
    root: ManifestNode,
    path: PathBuf,
    kind: ExtensionType,
}

impl ManifestView {
    /// Validates the root shape and resolves the extension kind.
    pub fn new(root: ManifestNode, path: impl Into<PathBuf>) -> ManifestResult<Self> {
        if root.name != ROOT_NODE {
            return Err(ManifestError::UnexpectedRoot(root.name));
        }
        let raw_kind = root.attr("type").ok_or(ManifestError::MissingField("type"))?;
        let kind = ExtensionType::parse(raw_kind)
            .ok_or_else(|| ManifestError::UnknownType(raw_kind.to_string()))?;
        Ok(Self {
            kind,
            root,
            path: path.into(),
        })
    }

    pub fn kind(&self) -> ExtensionType {
        self.kind
    }

    pub fn root(&self) -> &ManifestNode {
        &self.root
    }

    /// Location the manifest was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Folder containing the manifest.
    pub fn source_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Manifest file name without its extension.
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.root.attr(key)
    }

    pub fn node(&self, path: &str) -> Option<&ManifestNode> {
        self.root.find(path)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.root.child_value(name)
    }

    pub fn name(&self) -> ManifestResult<&str> {
        self.value("name").ok_or(ManifestError::MissingField("name"))
    }

    pub fn description(&self) -> &str {
        self.value("description").unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        self.value("version").unwrap_or_default()
    }

    /// Root `client` attribute. A missing attribute yields `None`; an
    /// unknown one is an error.
    pub fn client(&self) -> ManifestResult<Option<ClientId>> {
        match self.attr("client") {
            None => Ok(None),
            Some(raw) => ClientId::from_name(raw)
                .map(Some)
                .ok_or_else(|| ManifestError::UnknownClient(raw.to_string())),
        }
    }

    pub fn group(&self) -> Option<&str> {
        self.attr("group").map(str::trim).filter(|group| !group.is_empty())
    }

    /// `method="upgrade"` on the root forces upgrade mode.
    pub fn requests_upgrade(&self) -> bool {
        self.attr("method")
            .is_some_and(|method| method.eq_ignore_ascii_case("upgrade"))
    }

    pub fn files(&self) -> Option<&ManifestNode> {
        self.root.child("files")
    }

    pub fn media(&self) -> Option<&ManifestNode> {
        self.root.child("media")
    }

    pub fn languages(&self) -> Option<&ManifestNode> {
        self.root.child("languages")
    }

    pub fn script_file(&self) -> Option<&str> {
        self.value("scriptfile")
    }

    pub fn update_schemas(&self) -> Option<&ManifestNode> {
        self.node("update/schemas")
    }

    /// Whether the manifest declares an `<update>` section.
    pub fn has_update(&self) -> bool {
        self.root.child("update").is_some()
    }

    /// JSON object of the descriptive metadata, refreshed into the catalog on
    /// every install and update.
    pub fn manifest_cache(&self) -> String {
        let mut cache = Map::new();
        for (key, node) in CACHE_FIELDS {
            cache.insert(
                (*key).to_string(),
                Value::String(self.value(node).unwrap_or_default().to_string()),
            );
        }
        cache.insert("type".to_string(), Value::String(self.kind.as_str().to_string()));
        if let Some(group) = self.group() {
            cache.insert("group".to_string(), Value::String(group.to_string()));
        }
        cache.insert("filename".to_string(), Value::String(self.file_stem()));
        Value::Object(cache).to_string()
    }

    /// Default parameter values declared under `config/fields/fieldset/field`.
    pub fn params(&self) -> String {
        let mut params = Map::new();
        if let Some(fields) = self.node("config/fields") {
            for fieldset in fields.children_named("fieldset") {
                for field in fieldset.children_named("field") {
                    if let (Some(name), Some(default)) = (field.attr("name"), field.attr("default")) {
                        params.insert(name.to_string(), Value::String(default.to_string()));
                    }
                }
            }
        }
        Value::Object(params).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_manifest() -> ManifestNode {
        ManifestNode::new("extension")
            .with_attr("type", "module")
            .with_attr("client", "site")
            .with_text_child("name", "Hello")
            .with_text_child("version", "1.2.0")
            .with_child(
                ManifestNode::new("config").with_child(
                    ManifestNode::new("fields").with_child(
                        ManifestNode::new("fieldset")
                            .with_child(
                                ManifestNode::new("field")
                                    .with_attr("name", "greeting")
                                    .with_attr("default", "hi"),
                            )
                            .with_child(ManifestNode::new("field").with_attr("name", "spacer")),
                    ),
                ),
            )
    }

    #[test]
    fn view_rejects_unknown_kind_and_client() {
        let bad_kind = ManifestNode::new("extension").with_attr("type", "widget");
        assert!(matches!(
            ManifestView::new(bad_kind, "x.json"),
            Err(ManifestError::UnknownType(_))
        ));

        let bad_client = module_manifest().with_attr("client", "installation");
        let view = ManifestView::new(bad_client, "mod_hello.json").unwrap();
        assert!(matches!(view.client(), Err(ManifestError::UnknownClient(_))));
    }

    #[test]
    fn cache_and_params_are_json_objects() {
        let view = ManifestView::new(module_manifest(), "/tmp/src/mod_hello.json").unwrap();

        let cache: Value = serde_json::from_str(&view.manifest_cache()).unwrap();
        assert_eq!(cache["name"], "Hello");
        assert_eq!(cache["version"], "1.2.0");
        assert_eq!(cache["type"], "module");
        assert_eq!(cache["filename"], "mod_hello");

        let params: Value = serde_json::from_str(&view.params()).unwrap();
        assert_eq!(params["greeting"], "hi");
        assert!(params.get("spacer").is_none());
        assert_eq!(view.source_dir(), Path::new("/tmp/src"));
    }

    #[test]
    fn clean_element_strips_unsafe_characters() {
        assert_eq!(clean_element("..My Template!"), "mytemplate");
        assert_eq!(clean_element("beez_3"), "beez_3");
    }
}
