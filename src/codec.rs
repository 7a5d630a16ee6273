//! Abstract key/value serialisation boundary, plus the default binding.
//!
//! The tree and storage layers never touch `serde`/`bincode` directly;
//! they only know about [`Codec`] and the on-disk shape of a node body,
//! [`NodeBody`]. [`BincodeCodec`] is the concrete binding used by
//! [`crate::BTree`] unless a caller supplies their own.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::BTreeError;
use crate::framing::{decode_offset_string, encode_offset_string};

/// The logical, pre-framing contents of a node record: elements,
/// child offsets (rendered as fixed-width decimal strings), the
/// minimum degree, and the derived `is_leaf` flag.
#[derive(Debug, Serialize, Deserialize)]
pub struct NodeBody<K, V> {
    pub(crate) minimum_degree: usize,
    pub(crate) is_leaf: bool,
    pub(crate) elements: Vec<(K, V)>,
    pub(crate) children: Vec<String>,
}

impl<K, V> NodeBody<K, V> {
    pub(crate) fn child_offsets(&self) -> Result<Vec<u64>, BTreeError> {
        self.children
            .iter()
            .map(|field| decode_offset_string(field).ok_or(BTreeError::InvalidRecord))
            .collect()
    }

    pub(crate) fn from_offsets(
        minimum_degree: usize,
        is_leaf: bool,
        elements: Vec<(K, V)>,
        child_offsets: &[u64],
    ) -> Self {
        NodeBody {
            minimum_degree,
            is_leaf,
            elements,
            children: child_offsets.iter().copied().map(encode_offset_string).collect(),
        }
    }
}

/// Encode/decode a node body to/from bytes. An abstract seam: the tree and
/// storage engine only depend on this trait, never on a concrete wire
/// format.
pub trait Codec<K, V> {
    fn encode_node(body: &NodeBody<K, V>) -> Result<Vec<u8>, BTreeError>;
    fn decode_node(bytes: &[u8]) -> Result<NodeBody<K, V>, BTreeError>;
}

/// Default [`Codec`] binding: `serde` + `bincode`.
pub struct BincodeCodec;

impl<K, V> Codec<K, V> for BincodeCodec
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    fn encode_node(body: &NodeBody<K, V>) -> Result<Vec<u8>, BTreeError> {
        bincode::serialize(body).map_err(|_| BTreeError::InvalidRecord)
    }

    fn decode_node(bytes: &[u8]) -> Result<NodeBody<K, V>, BTreeError> {
        bincode::deserialize(bytes).map_err(|_| BTreeError::InvalidRecord)
    }
}
