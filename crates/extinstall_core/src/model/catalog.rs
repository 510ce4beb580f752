//! Auxiliary catalog rows owned by individual extension kinds.

use crate::model::extension::{ClientId, ExtensionId};
use serde::{Deserialize, Serialize};

/// Administrative menu entry (components register these on install).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: Option<i64>,
    pub menutype: String,
    pub title: String,
    pub alias: String,
    pub link: String,
    /// Serialized as `type`, e.g. `component`.
    #[serde(rename = "type")]
    pub item_type: String,
    pub published: bool,
    pub parent_id: i64,
    pub component_id: ExtensionId,
    pub client_id: ClientId,
    pub img: String,
    pub home: bool,
    pub template_style_id: i64,
}

/// One placed instance of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInstance {
    pub id: Option<i64>,
    pub title: String,
    pub content: String,
    pub module: String,
    pub position: String,
    pub published: bool,
    pub access: i64,
    pub showtitle: bool,
    pub params: String,
    pub client_id: ClientId,
    pub language: String,
}

impl ModuleInstance {
    /// Unpublished instance created when a module is first installed.
    pub fn unpublished(module: &str, title: &str, client_id: ClientId, params: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            content: String::new(),
            module: module.to_string(),
            position: String::new(),
            published: false,
            access: 1,
            showtitle: true,
            params: params.to_string(),
            client_id,
            language: "*".to_string(),
        }
    }
}

/// Style row of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateStyle {
    pub id: Option<i64>,
    pub template: String,
    pub client_id: ClientId,
    /// `true` when this style is the client's default.
    pub home: bool,
    pub title: String,
    pub params: String,
}

/// Access-control asset node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Option<i64>,
    pub parent_id: i64,
    pub name: String,
    pub title: String,
    pub rules: String,
}
