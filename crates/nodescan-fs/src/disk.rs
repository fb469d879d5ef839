use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

use crate::{is_ignored_directory, DirEntry, EntryKind, Error, FileSystem};

/// [`FileSystem`] backed by the real disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFileSystem;

impl DiskFileSystem {
    pub fn new() -> Self {
        Self
    }
}

fn io_error(path: &Utf8Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::Io {
        path: path.to_owned(),
        source,
    }
}

impl FileSystem for DiskFileSystem {
    fn read_to_string(&self, path: &Utf8Path) -> Result<String, Error> {
        tracing::trace!("reading {}", path);
        fs::read_to_string(path).map_err(io_error(path))
    }

    fn exists(&self, path: &Utf8Path) -> bool {
        path.exists()
    }

    fn list_dir(&self, path: &Utf8Path) -> Result<Vec<DirEntry>, Error> {
        let mut entries = Vec::new();
        for entry in path.read_dir_utf8().map_err(io_error(path))? {
            let entry = entry.map_err(io_error(path))?;
            let entry_path = entry.path().to_owned();
            // symlinks are listed by what they point at, broken ones are skipped
            let kind = if entry_path.is_dir() {
                EntryKind::Directory
            } else if entry_path.is_file() {
                EntryKind::File
            } else {
                continue;
            };
            entries.push(DirEntry {
                path: entry_path,
                kind,
            });
        }
        entries.sort();
        Ok(entries)
    }

    fn walk_files(&self, root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, Error> {
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                // never prune the root, even if it is named like an ignored directory
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !entry
                        .file_name()
                        .to_str()
                        .map_or(false, is_ignored_directory)
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| Error::Walk {
                path: root.to_owned(),
                source,
            })?;
            // we enumerate symlinked files, but don't follow symlinked directories
            let is_file = entry.file_type().is_file()
                || (entry.file_type().is_symlink() && entry.path().is_file());
            if !is_file {
                continue;
            }
            let path = Utf8PathBuf::from_path_buf(entry.into_path()).map_err(Error::NotUtf8)?;
            files.push(path);
        }
        files.sort();
        Ok(files)
    }
}
