//! Filesystem primitives used by the installer.
//!
//! # Responsibility
//! - Define the `Filesystem` seam every installer mutation goes through.
//! - Provide `LocalFilesystem`, the std-backed implementation.
//!
//! # Invariants
//! - `create_folder` reports the top-most folder it actually created so the
//!   caller can record exactly one reversible step.
//! - Copies never replace an existing destination unless `overwrite` is set.
//! - Deletes of missing paths succeed (idempotent).

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub type FsResult<T> = Result<T, FsError>;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("{op} `{}`: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("source does not exist: {}", .0.display())]
    MissingSource(PathBuf),
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),
    #[error("walk `{}`: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl FsError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Idempotent filesystem operations consumed by the installer.
pub trait Filesystem {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    /// Creates `path` and missing ancestors. Returns the top-most folder that
    /// did not exist before, or `None` when `path` already existed.
    fn create_folder(&self, path: &Path) -> FsResult<Option<PathBuf>>;
    fn copy_file(&self, src: &Path, dest: &Path, overwrite: bool) -> FsResult<()>;
    /// Recursively copies `src` into `dest`, creating `dest` when absent.
    fn copy_folder(&self, src: &Path, dest: &Path, overwrite: bool) -> FsResult<()>;
    fn delete_folder(&self, path: &Path) -> FsResult<()>;
    fn delete_file(&self, path: &Path) -> FsResult<()>;
    /// Names of immediate sub-folders, sorted.
    fn folders(&self, path: &Path) -> FsResult<Vec<String>>;
    /// Names of immediate files, sorted.
    fn files(&self, path: &Path) -> FsResult<Vec<String>>;
    fn read_to_string(&self, path: &Path) -> FsResult<String>;
}

/// `Filesystem` over the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    fn entries(&self, path: &Path, want_dirs: bool) -> FsResult<Vec<String>> {
        if !path.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path).map_err(|err| FsError::io("read dir", path, err))? {
            let entry = entry.map_err(|err| FsError::io("read dir", path, err))?;
            let file_type = entry
                .file_type()
                .map_err(|err| FsError::io("stat", entry.path(), err))?;
            if file_type.is_dir() == want_dirs {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl Filesystem for LocalFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_folder(&self, path: &Path) -> FsResult<Option<PathBuf>> {
        if path.is_dir() {
            return Ok(None);
        }
        let mut top_most = path.to_path_buf();
        let mut cursor = path.parent();
        while let Some(parent) = cursor {
            if parent.as_os_str().is_empty() || parent.exists() {
                break;
            }
            top_most = parent.to_path_buf();
            cursor = parent.parent();
        }
        std::fs::create_dir_all(path).map_err(|err| FsError::io("create folder", path, err))?;
        Ok(Some(top_most))
    }

    fn copy_file(&self, src: &Path, dest: &Path, overwrite: bool) -> FsResult<()> {
        if !src.is_file() {
            return Err(FsError::MissingSource(src.to_path_buf()));
        }
        if dest.exists() && !overwrite {
            return Err(FsError::DestinationExists(dest.to_path_buf()));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| FsError::io("create folder", parent, err))?;
        }
        std::fs::copy(src, dest).map_err(|err| FsError::io("copy file", src, err))?;
        Ok(())
    }

    fn copy_folder(&self, src: &Path, dest: &Path, overwrite: bool) -> FsResult<()> {
        if !src.is_dir() {
            return Err(FsError::MissingSource(src.to_path_buf()));
        }
        if dest.exists() && !overwrite {
            return Err(FsError::DestinationExists(dest.to_path_buf()));
        }
        for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|source| FsError::Walk {
                path: src.to_path_buf(),
                source,
            })?;
            let Ok(relative) = entry.path().strip_prefix(src) else {
                continue;
            };
            let target = dest.join(relative);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target)
                    .map_err(|err| FsError::io("create folder", &target, err))?;
            } else {
                self.copy_file(entry.path(), &target, true)?;
            }
        }
        std::fs::create_dir_all(dest).map_err(|err| FsError::io("create folder", dest, err))?;
        Ok(())
    }

    fn delete_folder(&self, path: &Path) -> FsResult<()> {
        if !path.exists() {
            return Ok(());
        }
        std::fs::remove_dir_all(path).map_err(|err| FsError::io("delete folder", path, err))
    }

    fn delete_file(&self, path: &Path) -> FsResult<()> {
        if !path.exists() {
            return Ok(());
        }
        std::fs::remove_file(path).map_err(|err| FsError::io("delete file", path, err))
    }

    fn folders(&self, path: &Path) -> FsResult<Vec<String>> {
        self.entries(path, true)
    }

    fn files(&self, path: &Path) -> FsResult<Vec<String>> {
        self.entries(path, false)
    }

    fn read_to_string(&self, path: &Path) -> FsResult<String> {
        std::fs::read_to_string(path).map_err(|err| FsError::io("read", path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_folder_reports_top_most_created() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFilesystem;
        let target = dir.path().join("a").join("b").join("c");

        let created = fs.create_folder(&target).unwrap();
        assert_eq!(created, Some(dir.path().join("a")));
        assert!(target.is_dir());
        assert_eq!(fs.create_folder(&target).unwrap(), None);
    }

    #[test]
    fn copy_file_refuses_existing_destination_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFilesystem;
        let src = dir.path().join("src.txt");
        let dest = dir.path().join("out").join("dest.txt");
        std::fs::write(&src, "one").unwrap();

        fs.copy_file(&src, &dest, false).unwrap();
        assert!(matches!(
            fs.copy_file(&src, &dest, false),
            Err(FsError::DestinationExists(_))
        ));
        std::fs::write(&src, "two").unwrap();
        fs.copy_file(&src, &dest, true).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "two");
    }

    #[test]
    fn copy_folder_is_recursive_and_listing_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFilesystem;
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("tmpl")).unwrap();
        std::fs::write(src.join("tmpl").join("default.php"), "x").unwrap();
        std::fs::write(src.join("b.txt"), "b").unwrap();
        std::fs::write(src.join("a.txt"), "a").unwrap();

        let dest = dir.path().join("dest");
        fs.copy_folder(&src, &dest, false).unwrap();
        assert!(dest.join("tmpl").join("default.php").is_file());
        assert_eq!(fs.files(&dest).unwrap(), vec!["a.txt", "b.txt"]);
        assert_eq!(fs.folders(&dest).unwrap(), vec!["tmpl"]);

        fs.delete_folder(&dest).unwrap();
        fs.delete_folder(&dest).unwrap();
        assert!(!dest.exists());
    }
}
