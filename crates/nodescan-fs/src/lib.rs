//! File access for workspace scanning.
//!
//! Everything that inspects a workspace goes through the [`FileSystem`]
//! trait so the same pipeline can run against the real disk
//! ([`DiskFileSystem`]) or an in-memory fixture ([`MemoryFileSystem`]).

mod disk;
mod memory;

use std::{io, path::PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
pub use disk::DiskFileSystem;
pub use memory::MemoryFileSystem;

/// Directory names that are never descended into while walking a
/// workspace.
pub const IGNORED_DIRECTORIES: &[&str] = &["node_modules", ".git", ".nodescan"];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to read {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to walk {path}: {source}")]
    Walk {
        path: Utf8PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("path is not valid utf8: {}", .0.display())]
    NotUtf8(PathBuf),
}

impl Error {
    pub fn not_found(path: &Utf8Path) -> Self {
        Self::Io {
            path: path.to_owned(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file or directory"),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DirEntry {
    pub path: Utf8PathBuf,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }
}

pub fn is_ignored_directory(name: &str) -> bool {
    IGNORED_DIRECTORIES.contains(&name)
}

/// Read access to a directory tree.
///
/// Implementations must be shareable across threads: candidate files are
/// processed on a worker pool.
pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Utf8Path) -> Result<String, Error>;

    fn exists(&self, path: &Utf8Path) -> bool;

    /// Lists the direct children of `path`, sorted by path.
    fn list_dir(&self, path: &Utf8Path) -> Result<Vec<DirEntry>, Error>;

    /// Returns every file below `root`, sorted, without descending into
    /// [`IGNORED_DIRECTORIES`].
    ///
    /// Any I/O failure on a directory aborts the walk.
    fn walk_files(&self, root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, Error> {
        let mut files = Vec::new();
        let mut pending = vec![root.to_owned()];
        while let Some(dir) = pending.pop() {
            for entry in self.list_dir(&dir)? {
                match entry.kind {
                    EntryKind::File => files.push(entry.path),
                    EntryKind::Directory => {
                        if !entry.file_name().map_or(false, is_ignored_directory) {
                            pending.push(entry.path);
                        }
                    }
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Like [`FileSystem::read_to_string`], but maps a missing file to
    /// `Ok(None)`.
    fn read_optional(&self, path: &Utf8Path) -> Result<Option<String>, Error> {
        match self.read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<T: FileSystem + ?Sized> FileSystem for &T {
    fn read_to_string(&self, path: &Utf8Path) -> Result<String, Error> {
        (**self).read_to_string(path)
    }

    fn exists(&self, path: &Utf8Path) -> bool {
        (**self).exists(path)
    }

    fn list_dir(&self, path: &Utf8Path) -> Result<Vec<DirEntry>, Error> {
        (**self).list_dir(path)
    }

    fn walk_files(&self, root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, Error> {
        (**self).walk_files(root)
    }
}

/// Renders `path` relative to `root` with forward slashes, using `.` for the
/// root itself. Returns `None` when `path` is not below `root`.
pub fn anchor(root: &Utf8Path, path: &Utf8Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    if relative.as_str().is_empty() {
        return Some(".".to_string());
    }
    Some(
        relative
            .components()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join("/"),
    )
}
