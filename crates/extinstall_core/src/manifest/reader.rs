use super::{ManifestError, ManifestNode, ManifestResult};

/// Turns a descriptor file's contents into a [`ManifestNode`] tree.
pub trait ManifestReader: Send + Sync {
    /// File extension (without the dot) of descriptors this reader accepts.
    fn extension(&self) -> &'static str;
    fn parse(&self, contents: &str) -> ManifestResult<ManifestNode>;
}

/// Reads descriptors stored as a JSON-serialized node tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonManifestReader;

impl ManifestReader for JsonManifestReader {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn parse(&self, contents: &str) -> ManifestResult<ManifestNode> {
        serde_json::from_str(contents).map_err(|err| ManifestError::Parse(err.to_string()))
    }
}
