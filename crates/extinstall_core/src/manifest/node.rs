use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node of a parsed manifest: a name, attributes, text and ordered
/// children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ManifestNode>,
}

impl ManifestNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: ManifestNode) -> Self {
        self.children.push(child);
        self
    }

    /// Shorthand for a leaf child holding only text.
    pub fn with_text_child(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.with_child(ManifestNode::new(name).with_text(text))
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Trimmed text, `None` when blank.
    pub fn value(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }

    pub fn child(&self, name: &str) -> Option<&ManifestNode> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ManifestNode> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Trimmed text of the first child called `name`.
    pub fn child_value(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(ManifestNode::value)
    }

    /// Resolves a `/`-separated path of child names.
    pub fn find(&self, path: &str) -> Option<&ManifestNode> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_walks_nested_children() {
        let root = ManifestNode::new("extension").with_child(
            ManifestNode::new("update")
                .with_child(ManifestNode::new("schemas").with_text_child("schemapath", " sql/updates ")),
        );

        let schemas = root.find("update/schemas").unwrap();
        assert_eq!(schemas.child_value("schemapath"), Some("sql/updates"));
        assert!(root.find("install/sql").is_none());
    }
}
