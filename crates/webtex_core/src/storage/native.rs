//! Native storage root backed by a directory on disk.
//!
//! Only available on non-WASM targets.

use std::fs::{self, OpenOptions};
use std::io::{Error, ErrorKind, Result, Write};
use std::path::{Path, PathBuf};

use super::{BoxFuture, EntryList, StorageAdapter, StorageEntry};

/// A directory on disk used as the storage root. Handles are absolute paths.
///
/// The std calls are blocking; the futures resolve immediately.
#[derive(Debug, Clone)]
pub struct NativeStorage {
    root: PathBuf,
}

impl NativeStorage {
    /// Use `root` as the storage root. Nothing is touched until `open_root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use `root` as the storage root, creating the directory if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The directory this storage is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_dir(path: &Path) -> Result<bool> {
    Ok(fs::metadata(path)?.is_dir())
}

fn ensure_dir(path: &Path) -> Result<()> {
    if is_dir(path)? {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::NotADirectory,
            format!("{} is not a directory", path.display()),
        ))
    }
}

impl StorageAdapter for NativeStorage {
    type FileHandle = PathBuf;
    type DirHandle = PathBuf;

    fn open_root(&self) -> BoxFuture<'_, Result<PathBuf>> {
        Box::pin(async move {
            ensure_dir(&self.root)?;
            Ok(self.root.clone())
        })
    }

    fn list_entries<'a>(&'a self, dir: &'a PathBuf) -> BoxFuture<'a, Result<EntryList<Self>>> {
        Box::pin(async move {
            let mut entries = Vec::new();
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let path = entry.path();
                let name = entry.file_name().into_string().map_err(|raw| {
                    Error::new(
                        ErrorKind::InvalidData,
                        format!("entry name {:?} is not UTF-8", raw),
                    )
                })?;
                // Follows symlinks so a linked folder shows up as a folder
                let metadata = fs::metadata(&path)?;
                if metadata.is_dir() {
                    entries.push(StorageEntry::Directory { name, handle: path });
                } else if metadata.is_file() {
                    entries.push(StorageEntry::File { name, handle: path });
                } else {
                    return Err(Error::new(
                        ErrorKind::Unsupported,
                        format!("{} is neither a file nor a directory", path.display()),
                    ));
                }
            }
            Ok(entries)
        })
    }

    fn get_or_create_file<'a>(
        &'a self,
        dir: &'a PathBuf,
        name: &'a str,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(async move {
            ensure_dir(dir)?;
            let path = dir.join(name);
            match fs::metadata(&path) {
                Ok(m) if m.is_dir() => Err(Error::new(
                    ErrorKind::IsADirectory,
                    format!("{} is a directory", path.display()),
                )),
                Ok(_) => Ok(path),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    OpenOptions::new().write(true).create(true).truncate(false).open(&path)?;
                    Ok(path)
                }
                Err(e) => Err(e),
            }
        })
    }

    fn get_or_create_directory<'a>(
        &'a self,
        dir: &'a PathBuf,
        name: &'a str,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(async move {
            ensure_dir(dir)?;
            let path = dir.join(name);
            match fs::metadata(&path) {
                Ok(m) if m.is_dir() => Ok(path),
                Ok(_) => Err(Error::new(
                    ErrorKind::NotADirectory,
                    format!("{} is a file", path.display()),
                )),
                Err(e) if e.kind() == ErrorKind::NotFound => match fs::create_dir(&path) {
                    Ok(()) => Ok(path),
                    Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(path),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            }
        })
    }

    fn remove_entry<'a>(
        &'a self,
        dir: &'a PathBuf,
        name: &'a str,
        recursive: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let path = dir.join(name);
            let metadata = fs::symlink_metadata(&path)?;
            if metadata.is_dir() {
                if recursive {
                    fs::remove_dir_all(&path)
                } else {
                    fs::remove_dir(&path).map_err(|e| {
                        // Some platforms report ENOTEMPTY as a generic error
                        if e.kind() != ErrorKind::DirectoryNotEmpty
                            && fs::read_dir(&path).is_ok_and(|mut it| it.next().is_some())
                        {
                            Error::new(ErrorKind::DirectoryNotEmpty, e)
                        } else {
                            e
                        }
                    })
                }
            } else {
                fs::remove_file(&path)
            }
        })
    }

    fn read_bytes<'a>(&'a self, file: &'a PathBuf) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move { fs::read(file) })
    }

    fn write_bytes<'a>(&'a self, file: &'a PathBuf, content: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            // No `create`: a handle to a removed file must not resurrect it
            let mut handle = OpenOptions::new().write(true).truncate(true).open(file)?;
            handle.write_all(content)
        })
    }
}
