use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};

use crate::{DirEntry, EntryKind, Error, FileSystem};

/// An in-memory directory tree. Directories exist implicitly as the
/// ancestors of stored files.
#[derive(Debug, Default, Clone)]
pub struct MemoryFileSystem {
    files: BTreeMap<Utf8PathBuf, String>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree under `root` from `(relative path, contents)` pairs.
    /// Relative paths use `/` as separator.
    pub fn from_files<P, C>(root: impl AsRef<Utf8Path>, files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: AsRef<str>,
        C: Into<String>,
    {
        let root = root.as_ref();
        let mut fs = Self::new();
        for (path, contents) in files {
            let path = path
                .as_ref()
                .split('/')
                .filter(|segment| !segment.is_empty())
                .fold(root.to_owned(), |acc, segment| acc.join(segment));
            fs.insert(path, contents);
        }
        fs
    }

    pub fn insert(&mut self, path: impl Into<Utf8PathBuf>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }

    fn is_dir(&self, path: &Utf8Path) -> bool {
        self.files
            .keys()
            .any(|file| file != path && file.starts_with(path))
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_to_string(&self, path: &Utf8Path) -> Result<String, Error> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(path))
    }

    fn exists(&self, path: &Utf8Path) -> bool {
        self.files.contains_key(path) || self.is_dir(path)
    }

    fn list_dir(&self, path: &Utf8Path) -> Result<Vec<DirEntry>, Error> {
        if !self.is_dir(path) {
            return Err(Error::not_found(path));
        }
        let mut children = BTreeMap::new();
        for file in self.files.keys() {
            let Ok(relative) = file.strip_prefix(path) else {
                continue;
            };
            let mut components = relative.components();
            let Some(first) = components.next() else {
                continue;
            };
            let kind = if components.next().is_some() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            children.insert(path.join(first.as_str()), kind);
        }
        Ok(children
            .into_iter()
            .map(|(path, kind)| DirEntry { path, kind })
            .collect())
    }
}
