use std::path::PathBuf;

/// Every way a [`crate::BTree`] operation can fail.
///
/// Variants are grouped the way the design doc groups them: structural
/// (on-disk bytes don't match the framing contract), capacity/state
/// (a node was used before it was loaded), semantic (duplicate key),
/// resource (filesystem failures), and aggregate (`UnableToInsert`,
/// which wraps whatever went wrong during an `insert` without losing
/// the cause).
#[derive(Debug, thiserror::Error)]
pub enum BTreeError {
    #[error("storage at {0:?} is not a valid b-tree file")]
    InvalidStorage(PathBuf),

    #[error("minimum degree must be at least 2, got {provided}")]
    InvalidMinimumDegree { provided: usize },

    #[error("root record could not be decoded")]
    InvalidRootRecord,

    #[error("node record could not be decoded")]
    InvalidRecord,

    #[error("malformed record framing at offset {offset}")]
    InvalidRecordSize { offset: u64 },

    #[error("node has not been loaded into memory")]
    NodeNotLoaded,

    #[error("key already exists in the tree")]
    DuplicateKey,

    #[error("failed to create storage file {path:?}")]
    UnableToCreateStorage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read storage file {path:?}")]
    UnableToReadStorage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to modify temporary storage file {path:?}")]
    UnableToModifyTemporary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to rename temporary storage file {path:?}")]
    UnableToRenameTemporary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage is read-only")]
    StorageReadOnly,

    #[error("insert failed")]
    UnableToInsert(#[source] Box<BTreeError>),
}
