//! The storage engine: record framing, the root-pointer header, and the
//! copy-file commit protocol described in the design notes.
//!
//! The engine is deliberately byte-oriented — it knows nothing about
//! `Node<K, V>` or `Codec`. Callers hand it already-encoded bodies and get
//! back offsets; the node model layer owns the decode step.

use std::path::{Path, PathBuf};

use crate::error::BTreeError;
use crate::file_store::{FileStore, FsFileStore};
use crate::framing::{decode_field, encode_field, max_field_value, FIELD_WIDTH};

/// Size of the file header: a `FIELD_WIDTH`-digit root offset plus a
/// trailing newline.
const HEADER_LEN: u64 = FIELD_WIDTH as u64 + 1;

pub(crate) struct StorageEngine<F: FileStore = FsFileStore> {
    read_path: PathBuf,
    write_path: PathBuf,
    read_only: bool,
    read_side: Option<F>,
    write_side: Option<F>,
    /// Length the write side had right after it was last seeded from the
    /// read side — i.e. before this operation's own appends. Used to tell
    /// "just a mirror of the committed file" apart from "has pending
    /// writes", now that the write side is no longer reset to empty.
    write_baseline_len: u64,
}

impl<F: FileStore> StorageEngine<F> {
    pub(crate) fn open(path: impl AsRef<Path>, read_only: bool) -> Result<Self, BTreeError> {
        let read_path = path.as_ref().to_path_buf();
        let mut write_os_string = read_path.clone().into_os_string();
        write_os_string.push(".tmp");
        let write_path = PathBuf::from(write_os_string);

        let read_side = if F::exists(&read_path) {
            Some(F::open(&read_path, false)?)
        } else {
            None
        };

        tracing::debug!(read_path = ?read_path, read_only, "opened storage engine");

        let mut engine = Self {
            read_path,
            write_path,
            read_only,
            read_side,
            write_side: None,
            write_baseline_len: 0,
        };

        if !read_only {
            engine.reseed_write_side()?;
        }

        Ok(engine)
    }

    /// True iff no tree has ever been committed at this path: the read
    /// side is absent, zero-length, or just the idle 20-byte header with
    /// `root_offset == 0` and no record region.
    pub(crate) fn is_empty(&mut self) -> Result<bool, BTreeError> {
        let len = match &mut self.read_side {
            None => return Ok(true),
            Some(read_side) => read_side.len()?,
        };
        if len == 0 {
            return Ok(true);
        }
        if len == HEADER_LEN {
            return Ok(self.header_root_offset()? == 0);
        }
        Ok(false)
    }

    /// Append `body` to the write side and promote it to be the root,
    /// updating the write side's header. Returns the new root's offset.
    pub(crate) fn save_root_bytes(&mut self, body: &[u8]) -> Result<u64, BTreeError> {
        if self.read_only {
            return Err(BTreeError::StorageReadOnly);
        }
        let offset = self.append_bytes(body)?;
        let write_side = self.write_side.as_mut().ok_or(BTreeError::StorageReadOnly)?;
        write_side.write_at(0, &encode_field(offset))?;
        tracing::debug!(offset, "saved new root");
        Ok(offset)
    }

    /// Append `body` to the write side without touching the header.
    /// Returns the offset the record was written at.
    pub(crate) fn append_bytes(&mut self, body: &[u8]) -> Result<u64, BTreeError> {
        if self.read_only {
            return Err(BTreeError::StorageReadOnly);
        }
        let framed = Self::frame(body)?;
        let write_side = self.write_side.as_mut().ok_or(BTreeError::StorageReadOnly)?;
        let offset = write_side.append(&framed)?;
        tracing::trace!(offset, body_len = body.len(), "appended node record");
        Ok(offset)
    }

    /// Read the current root's raw body, committing any pending writes
    /// first. Returns the root's offset alongside its bytes.
    pub(crate) fn read_root_bytes(&mut self) -> Result<(u64, Vec<u8>), BTreeError> {
        if self.pending_write_exists()? {
            self.commit()?;
        }
        let root_offset = self.header_root_offset()?;
        let bytes = self
            .find_node_bytes(root_offset)
            .map_err(|_| BTreeError::InvalidRootRecord)?;
        Ok((root_offset, bytes))
    }

    /// Read the raw body of the record at `offset`, trying the read side
    /// first and falling back to the write side for records written
    /// during the current, not-yet-committed operation.
    pub(crate) fn find_node_bytes(&mut self, offset: u64) -> Result<Vec<u8>, BTreeError> {
        if let Some(read_side) = &mut self.read_side {
            if let Ok(len) = read_side.len() {
                if offset + FIELD_WIDTH as u64 <= len {
                    if let Ok(bytes) = Self::read_record(read_side, offset) {
                        return Ok(bytes);
                    }
                }
            }
        }
        let write_side = self.write_side.as_mut().ok_or(BTreeError::InvalidRecord)?;
        Self::read_record(write_side, offset)
    }

    /// Replace the read side with the write side (delete + rename),
    /// reopen both, and reseed the write side as a fresh mirror of what
    /// just became the read side.
    pub(crate) fn commit(&mut self) -> Result<(), BTreeError> {
        if self.read_only {
            return Err(BTreeError::StorageReadOnly);
        }
        tracing::debug!(read_path = ?self.read_path, "committing storage");

        self.read_side = None;
        if F::exists(&self.read_path) {
            F::remove(&self.read_path)?;
        }
        F::rename(&self.write_path, &self.read_path)?;

        let mut new_read_side = F::open(&self.read_path, false)?;
        new_read_side.sync()?;
        self.read_side = Some(new_read_side);

        self.reseed_write_side()?;

        Ok(())
    }

    pub(crate) fn close(mut self) -> Result<(), BTreeError> {
        self.read_side = None;
        self.write_side = None;
        if !self.read_only && F::exists(&self.write_path) {
            F::remove(&self.write_path)?;
        }
        Ok(())
    }

    fn pending_write_exists(&mut self) -> Result<bool, BTreeError> {
        let baseline = self.write_baseline_len;
        match &mut self.write_side {
            None => Ok(false),
            Some(write_side) => Ok(write_side.len()? > baseline),
        }
    }

    fn header_root_offset(&mut self) -> Result<u64, BTreeError> {
        let read_side = self
            .read_side
            .as_mut()
            .ok_or_else(|| BTreeError::InvalidStorage(self.read_path.clone()))?;
        let mut buf = [0u8; FIELD_WIDTH];
        read_side.read_at(0, &mut buf)?;
        decode_field(&buf).ok_or(BTreeError::InvalidRecordSize { offset: 0 })
    }

    /// Open a fresh write side and copy the read side's current bytes
    /// into it (the "copy" in copy-file commit). This is what keeps
    /// offsets stable across a commit: every record a prior generation's
    /// readers could reach stays at the same byte position, and new
    /// appends land after it. An empty read side (nothing committed yet)
    /// just gets the idle header.
    fn reseed_write_side(&mut self) -> Result<(), BTreeError> {
        let snapshot = match &mut self.read_side {
            Some(read_side) => {
                let len = read_side.len()?;
                let mut buf = vec![0u8; len as usize];
                if len > 0 {
                    read_side.read_at(0, &mut buf)?;
                }
                buf
            }
            None => Vec::new(),
        };

        let mut write_side = F::open(&self.write_path, true)?;
        write_side.truncate(0)?;
        if snapshot.is_empty() {
            write_side.write_at(0, &Self::idle_header())?;
            self.write_baseline_len = HEADER_LEN;
        } else {
            write_side.write_at(0, &snapshot)?;
            self.write_baseline_len = snapshot.len() as u64;
        }
        self.write_side = Some(write_side);
        Ok(())
    }

    fn idle_header() -> [u8; HEADER_LEN as usize] {
        let mut header = [0u8; HEADER_LEN as usize];
        header[..FIELD_WIDTH].copy_from_slice(&encode_field(0));
        header[FIELD_WIDTH] = b'\n';
        header
    }

    fn frame(body: &[u8]) -> Result<Vec<u8>, BTreeError> {
        if body.len() as u128 > max_field_value() {
            return Err(BTreeError::InvalidRecordSize { offset: 0 });
        }
        let mut framed = Vec::with_capacity(FIELD_WIDTH + body.len() + 1);
        framed.extend_from_slice(&encode_field(body.len() as u64));
        framed.extend_from_slice(body);
        framed.push(b'\n');
        Ok(framed)
    }

    fn read_record(file: &mut F, offset: u64) -> Result<Vec<u8>, BTreeError> {
        let mut size_field = [0u8; FIELD_WIDTH];
        file.read_at(offset, &mut size_field)
            .map_err(|_| BTreeError::InvalidRecordSize { offset })?;
        let size = decode_field(&size_field).ok_or(BTreeError::InvalidRecordSize { offset })?;
        let mut body = vec![0u8; size as usize];
        file.read_at(offset + FIELD_WIDTH as u64, &mut body)
            .map_err(|_| BTreeError::InvalidRecord)?;
        Ok(body)
    }
}

impl<F: FileStore> Drop for StorageEngine<F> {
    fn drop(&mut self) {
        if !self.read_only {
            let _ = F::remove(&self.write_path);
        }
    }
}
