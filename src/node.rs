//! In-memory B-tree node: encode/decode, lazy child loading, and the
//! three tree-level operations (`find`, `insert_non_full`, `split_child`).

use crate::codec::{Codec, NodeBody};
use crate::error::BTreeError;
use crate::file_store::FileStore;
use crate::storage::StorageEngine;

/// A child reference: either just an offset (freshly decoded, not yet
/// inspected) or a fully loaded node. Keeping this as a tagged variant
/// rather than a `loaded` flag on `Node` makes "used before loaded" a
/// compile-time-checked state instead of a runtime error.
pub(crate) enum ChildEdge<K, V> {
    Unloaded(u64),
    Loaded(Box<Node<K, V>>),
}

impl<K, V> ChildEdge<K, V> {
    fn offset(&self) -> Option<u64> {
        match self {
            ChildEdge::Unloaded(offset) => Some(*offset),
            ChildEdge::Loaded(node) => node.offset,
        }
    }
}

pub(crate) struct Node<K, V> {
    pub(crate) minimum_degree: usize,
    pub(crate) elements: Vec<(K, V)>,
    pub(crate) children: Vec<ChildEdge<K, V>>,
    pub(crate) offset: Option<u64>,
    pub(crate) is_root: bool,
}

impl<K, V> Node<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    pub(crate) fn empty(minimum_degree: usize, is_root: bool) -> Self {
        Node {
            minimum_degree,
            elements: Vec::new(),
            children: Vec::new(),
            offset: None,
            is_root,
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.elements.len() == 2 * self.minimum_degree - 1
    }

    pub(crate) fn from_body(body: NodeBody<K, V>, offset: u64, is_root: bool) -> Result<Self, BTreeError> {
        let children = body
            .child_offsets()?
            .into_iter()
            .map(ChildEdge::Unloaded)
            .collect();
        Ok(Node {
            minimum_degree: body.minimum_degree,
            elements: body.elements,
            children,
            offset: Some(offset),
            is_root,
        })
    }

    fn to_body(&self) -> Result<NodeBody<K, V>, BTreeError> {
        let child_offsets = self
            .children
            .iter()
            .map(|edge| edge.offset().ok_or(BTreeError::NodeNotLoaded))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NodeBody::from_offsets(
            self.minimum_degree,
            self.is_leaf(),
            self.elements.clone(),
            &child_offsets,
        ))
    }

    /// Persist this node through the storage engine. Root nodes go
    /// through `save_root_bytes` (updating the header pointer); every
    /// other node is a plain `append`.
    pub(crate) fn persist<F, C>(&mut self, storage: &mut StorageEngine<F>) -> Result<(), BTreeError>
    where
        F: FileStore,
        C: Codec<K, V>,
    {
        let body = self.to_body()?;
        let bytes = C::encode_node(&body)?;
        let offset = if self.is_root {
            storage.save_root_bytes(&bytes)?
        } else {
            storage.append_bytes(&bytes)?
        };
        self.offset = Some(offset);
        tracing::trace!(
            offset,
            is_root = self.is_root,
            elements = self.elements.len(),
            "persisted node"
        );
        Ok(())
    }

    /// Load `children[i]` from storage if it hasn't been already, and
    /// return a mutable reference to it.
    pub(crate) fn load_child<F, C>(
        &mut self,
        i: usize,
        storage: &mut StorageEngine<F>,
    ) -> Result<&mut Node<K, V>, BTreeError>
    where
        F: FileStore,
        C: Codec<K, V>,
    {
        let edge = self.children.get_mut(i).ok_or(BTreeError::NodeNotLoaded)?;
        if let ChildEdge::Unloaded(offset) = *edge {
            let bytes = storage.find_node_bytes(offset)?;
            let body = C::decode_node(&bytes)?;
            let node = Node::from_body(body, offset, false)?;
            *edge = ChildEdge::Loaded(Box::new(node));
        }
        match edge {
            ChildEdge::Loaded(node) => Ok(node.as_mut()),
            ChildEdge::Unloaded(_) => unreachable!("just loaded above"),
        }
    }

    /// Smallest index `i` such that `elements[i].0 >= key`.
    fn lower_bound(&self, key: &K) -> usize {
        self.elements.partition_point(|(k, _)| k < key)
    }

    pub(crate) fn find<F, C>(
        &mut self,
        key: &K,
        storage: &mut StorageEngine<F>,
    ) -> Result<Option<V>, BTreeError>
    where
        F: FileStore,
        C: Codec<K, V>,
    {
        let i = self.lower_bound(key);
        if let Some((k, v)) = self.elements.get(i) {
            if k == key {
                return Ok(Some(v.clone()));
            }
        }
        if self.is_leaf() {
            return Ok(None);
        }
        let child = self.load_child::<F, C>(i, storage)?;
        child.find::<F, C>(key, storage)
    }

    pub(crate) fn insert_non_full<F, C>(
        &mut self,
        key: K,
        value: V,
        storage: &mut StorageEngine<F>,
    ) -> Result<(), BTreeError>
    where
        F: FileStore,
        C: Codec<K, V>,
    {
        debug_assert!(!self.is_full());
        let i = self.lower_bound(&key);
        if self.elements.get(i).is_some_and(|(k, _)| *k == key) {
            return Err(BTreeError::DuplicateKey);
        }

        if self.is_leaf() {
            self.elements.insert(i, (key, value));
            self.persist::<F, C>(storage)?;
            return Ok(());
        }

        let mut i = i;
        if self.load_child::<F, C>(i, storage)?.is_full() {
            self.split_child::<F, C>(i, storage)?;
            if self.elements[i].0 == key {
                return Err(BTreeError::DuplicateKey);
            } else if self.elements[i].0 < key {
                i += 1;
            }
        }
        self.load_child::<F, C>(i, storage)?
            .insert_non_full::<F, C>(key, value, storage)?;
        self.persist::<F, C>(storage)?;
        Ok(())
    }

    /// Split the full child at index `i`, promoting its median element
    /// into `self` and inserting the new right sibling at `i + 1`.
    pub(crate) fn split_child<F, C>(
        &mut self,
        i: usize,
        storage: &mut StorageEngine<F>,
    ) -> Result<(), BTreeError>
    where
        F: FileStore,
        C: Codec<K, V>,
    {
        let t = self.minimum_degree;
        let left = self.load_child::<F, C>(i, storage)?;
        debug_assert!(left.is_full());

        let right_elements = left.elements.split_off(t);
        let promoted = left.elements.pop().expect("a full node has at least t elements");
        let right_children = if left.is_leaf() {
            Vec::new()
        } else {
            left.children.split_off(t)
        };

        let mut right = Node::empty(t, false);
        right.elements = right_elements;
        right.children = right_children;

        left.persist::<F, C>(storage)?;
        right.persist::<F, C>(storage)?;

        self.elements.insert(i, promoted);
        self.children.insert(i + 1, ChildEdge::Loaded(Box::new(right)));
        self.persist::<F, C>(storage)?;
        Ok(())
    }
}
