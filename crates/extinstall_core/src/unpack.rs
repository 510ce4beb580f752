//! Package source resolution.
//!
//! # Responsibility
//! - Turn an install path (a directory or a `.tar.gz`/`.tgz` archive) into an
//!   on-disk source directory holding a manifest.
//! - Report the extension kind declared by that manifest.
//!
//! # Invariants
//! - Extracted archives live in a temporary directory owned by the returned
//!   `UnpackedPackage` and are removed when it is dropped.
//! - The source path itself is never modified.

use crate::fs::{FsError, Filesystem};
use crate::manifest::{find_manifest, ManifestError, ManifestReader, ManifestView};
use crate::model::extension::ExtensionType;
use flate2::read::GzDecoder;
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::Archive;
use tempfile::TempDir;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnpackError {
    #[error("package source not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("unsupported package format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("extract `{}`: {source}", .path.display())]
    Extract {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Manifest(#[from] ManifestError),
    #[error("{0}")]
    Fs(#[from] FsError),
}

/// A resolved package source.
#[derive(Debug)]
pub struct UnpackedPackage {
    pub dir: PathBuf,
    pub kind: ExtensionType,
    _extracted: Option<TempDir>,
}

/// Resolves install paths into source directories.
pub trait PackageUnpacker: Send + Sync {
    fn unpack(
        &self,
        fs: &dyn Filesystem,
        reader: &dyn ManifestReader,
        path: &Path,
    ) -> Result<UnpackedPackage, UnpackError>;
}

/// Accepts extension directories and gzip-compressed tarballs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveUnpacker;

impl ArchiveUnpacker {
    fn is_tarball(path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    fn extract(path: &Path) -> Result<TempDir, UnpackError> {
        let to_extract_error = |source| UnpackError::Extract {
            path: path.to_path_buf(),
            source,
        };
        let target = TempDir::new().map_err(to_extract_error)?;
        let file = File::open(path).map_err(to_extract_error)?;
        let mut archive = Archive::new(GzDecoder::new(file));
        archive.unpack(target.path()).map_err(to_extract_error)?;
        Ok(target)
    }
}

impl PackageUnpacker for ArchiveUnpacker {
    fn unpack(
        &self,
        fs: &dyn Filesystem,
        reader: &dyn ManifestReader,
        path: &Path,
    ) -> Result<UnpackedPackage, UnpackError> {
        if !fs.exists(path) {
            return Err(UnpackError::NotFound(path.to_path_buf()));
        }

        let (dir, extracted) = if fs.is_dir(path) {
            (path.to_path_buf(), None)
        } else if Self::is_tarball(path) {
            let extracted = Self::extract(path)?;
            info!(
                "event=package_extract module=unpack status=ok path={}",
                path.display()
            );
            (extracted.path().to_path_buf(), Some(extracted))
        } else {
            return Err(UnpackError::UnsupportedFormat(path.to_path_buf()));
        };

        let dir = source_root(fs, reader, &dir)?;
        let (manifest_path, root) = find_manifest(fs, reader, &dir)?;
        let kind = ManifestView::new(root, manifest_path)?.kind();

        Ok(UnpackedPackage {
            dir,
            kind,
            _extracted: extracted,
        })
    }
}

/// Archives commonly wrap the extension in a single top-level folder.
fn source_root(
    fs: &dyn Filesystem,
    reader: &dyn ManifestReader,
    dir: &Path,
) -> Result<PathBuf, UnpackError> {
    if find_manifest(fs, reader, dir).is_ok() {
        return Ok(dir.to_path_buf());
    }
    let folders = fs.folders(dir)?;
    if let [only] = folders.as_slice() {
        return Ok(dir.join(only));
    }
    Ok(dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFilesystem;
    use crate::manifest::JsonManifestReader;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    const MANIFEST: &str = r#"{"name":"extension","attributes":{"type":"library"},"children":[{"name":"name","text":"Lib"}]}"#;

    #[test]
    fn directory_source_is_used_in_place() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib_demo.json"), MANIFEST).unwrap();

        let unpacked = ArchiveUnpacker
            .unpack(&LocalFilesystem, &JsonManifestReader, dir.path())
            .unwrap();
        assert_eq!(unpacked.dir, dir.path());
        assert_eq!(unpacked.kind, ExtensionType::Library);
    }

    #[test]
    fn tarball_with_wrapper_folder_is_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging").join("lib_demo");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("lib_demo.json"), MANIFEST).unwrap();

        let archive_path = dir.path().join("lib_demo.tar.gz");
        let encoder = GzEncoder::new(File::create(&archive_path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.append_dir_all("lib_demo", &staging).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let unpacked = ArchiveUnpacker
            .unpack(&LocalFilesystem, &JsonManifestReader, &archive_path)
            .unwrap();
        assert!(unpacked.dir.ends_with("lib_demo"));
        assert!(unpacked.dir.join("lib_demo.json").is_file());
        assert_eq!(unpacked.kind, ExtensionType::Library);

        let extracted = unpacked.dir.clone();
        drop(unpacked);
        assert!(!extracted.exists());
    }

    #[test]
    fn unknown_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.rar");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(
            ArchiveUnpacker.unpack(&LocalFilesystem, &JsonManifestReader, &path),
            Err(UnpackError::UnsupportedFormat(_))
        ));
    }
}
