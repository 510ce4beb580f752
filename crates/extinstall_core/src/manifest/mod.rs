//! Extension manifest tree, readers and projections.
//!
//! # Responsibility
//! - Model a parsed package descriptor as an ordered, attributed tree.
//! - Locate and read the manifest inside a source directory.
//! - Project the tree into the typed `ManifestView` the installer consumes.
//!
//! # Invariants
//! - A manifest's root node is always named `extension`.
//! - Readers are pure: parsing never touches the catalog or filesystem.

use crate::fs::{FsError, Filesystem};
use log::debug;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod node;
mod reader;
mod view;

pub use node::ManifestNode;
pub use reader::{JsonManifestReader, ManifestReader};
pub use view::{clean_element, ManifestView};

/// Root node name every manifest must carry.
pub const ROOT_NODE: &str = "extension";

pub type ManifestResult<T> = Result<T, ManifestError>;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest parse failed: {0}")]
    Parse(String),
    #[error("manifest root must be `extension`, found `{0}`")]
    UnexpectedRoot(String),
    #[error("manifest is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unknown extension type `{0}`")]
    UnknownType(String),
    #[error("unknown client `{0}`")]
    UnknownClient(String),
    #[error("no manifest found in `{}`", .0.display())]
    NotFound(PathBuf),
    #[error("{0}")]
    Fs(#[from] FsError),
}

/// Reads and parses the manifest file at `path`.
pub fn read_manifest(
    fs: &dyn Filesystem,
    reader: &dyn ManifestReader,
    path: &Path,
) -> ManifestResult<ManifestNode> {
    let contents = fs.read_to_string(path)?;
    reader.parse(&contents)
}

/// Finds the first manifest in `dir` (sorted by file name) whose root node is
/// `extension`. Files that fail to parse are skipped.
pub fn find_manifest(
    fs: &dyn Filesystem,
    reader: &dyn ManifestReader,
    dir: &Path,
) -> ManifestResult<(PathBuf, ManifestNode)> {
    let suffix = format!(".{}", reader.extension());
    for file in fs.files(dir)? {
        if !file.ends_with(&suffix) {
            continue;
        }
        let path = dir.join(&file);
        match read_manifest(fs, reader, &path) {
            Ok(root) if root.name == ROOT_NODE => return Ok((path, root)),
            Ok(root) => {
                debug!(
                    "event=manifest_skip module=manifest path={} root={}",
                    path.display(),
                    root.name
                );
            }
            Err(err) => {
                debug!(
                    "event=manifest_skip module=manifest path={} error={}",
                    path.display(),
                    err
                );
            }
        }
    }
    Err(ManifestError::NotFound(dir.to_path_buf()))
}
