//! Abstract filesystem boundary the storage engine is built on.
//!
//! `FileStore` is the "external collaborator" named in the design: random
//! access byte I/O plus the handful of path-level operations (`rename`,
//! `remove`) the copy-file commit protocol needs. [`FsFileStore`] is the
//! default, `std::fs`-backed implementation; swapping in another one (an
//! in-memory store for tests, say) only requires this trait.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::BTreeError;

pub trait FileStore: Sized {
    /// Open the file at `path`, creating it if `create` is true.
    fn open(path: &Path, create: bool) -> Result<Self, BTreeError>;

    fn exists(path: &Path) -> bool;

    fn remove(path: &Path) -> Result<(), BTreeError>;

    fn rename(from: &Path, to: &Path) -> Result<(), BTreeError>;

    fn len(&mut self) -> Result<u64, BTreeError>;

    fn truncate(&mut self, len: u64) -> Result<(), BTreeError>;

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), BTreeError>;

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), BTreeError>;

    /// Write `data` at the current end of the file, returning the offset
    /// the write started at.
    fn append(&mut self, data: &[u8]) -> Result<u64, BTreeError>;

    fn sync(&mut self) -> Result<(), BTreeError>;
}

/// Default [`FileStore`] binding backed by a single `std::fs::File`.
pub struct FsFileStore {
    file: File,
    path: PathBuf,
}

impl FileStore for FsFileStore {
    fn open(path: &Path, create: bool) -> Result<Self, BTreeError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .open(path)
            .map_err(|source| BTreeError::UnableToCreateStorage {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    fn exists(path: &Path) -> bool {
        path.exists()
    }

    fn remove(path: &Path) -> Result<(), BTreeError> {
        fs::remove_file(path).map_err(|source| BTreeError::UnableToModifyTemporary {
            path: path.to_path_buf(),
            source,
        })
    }

    fn rename(from: &Path, to: &Path) -> Result<(), BTreeError> {
        fs::rename(from, to).map_err(|source| BTreeError::UnableToRenameTemporary {
            path: from.to_path_buf(),
            source,
        })
    }

    fn len(&mut self) -> Result<u64, BTreeError> {
        self.file
            .metadata()
            .map(|metadata| metadata.len())
            .map_err(|source| BTreeError::UnableToReadStorage {
                path: self.path.clone(),
                source,
            })
    }

    fn truncate(&mut self, len: u64) -> Result<(), BTreeError> {
        self.file
            .set_len(len)
            .map_err(|source| BTreeError::UnableToModifyTemporary {
                path: self.path.clone(),
                source,
            })
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), BTreeError> {
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(buf))
            .map_err(|source| BTreeError::UnableToReadStorage {
                path: self.path.clone(),
                source,
            })
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), BTreeError> {
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(data))
            .map_err(|source| BTreeError::UnableToModifyTemporary {
                path: self.path.clone(),
                source,
            })
    }

    fn append(&mut self, data: &[u8]) -> Result<u64, BTreeError> {
        let offset = self
            .file
            .seek(SeekFrom::End(0))
            .map_err(|source| BTreeError::UnableToModifyTemporary {
                path: self.path.clone(),
                source,
            })?;
        self.file
            .write_all(data)
            .map_err(|source| BTreeError::UnableToModifyTemporary {
                path: self.path.clone(),
                source,
            })?;
        Ok(offset)
    }

    fn sync(&mut self) -> Result<(), BTreeError> {
        self.file
            .sync_all()
            .map_err(|source| BTreeError::UnableToModifyTemporary {
                path: self.path.clone(),
                source,
            })
    }
}
