use std::marker::PhantomData;
use std::path::Path;

use crate::codec::{BincodeCodec, Codec};
use crate::error::BTreeError;
use crate::file_store::{FileStore, FsFileStore};
use crate::node::{ChildEdge, Node};
use crate::storage::StorageEngine;

/// Minimum degree used when [`BTree::open`] creates a brand new tree and
/// the caller didn't specify one. The production default would be sized
/// to a disk block (the source this design is drawn from defaults to
/// 4096); 128 is a more conservative choice here since per-element size
/// isn't fixed the way a dedicated page format's would be. See
/// DESIGN.md for the full reasoning.
pub const DEFAULT_MINIMUM_DEGREE: usize = 128;

/// An embedded, single-file, on-disk ordered key/value index.
///
/// `K` must be totally ordered (`Ord`) and both `K` and `V` must be cheap
/// to clone; `F` is the [`FileStore`] binding (defaults to
/// [`FsFileStore`]) and `C` the [`Codec`] binding (defaults to
/// [`BincodeCodec`]).
pub struct BTree<K, V, F = FsFileStore, C = BincodeCodec>
where
    F: FileStore,
    C: Codec<K, V>,
{
    storage: StorageEngine<F>,
    root: Node<K, V>,
    minimum_degree: usize,
    _codec: PhantomData<C>,
}

impl<K, V, F, C> BTree<K, V, F, C>
where
    K: Ord + Clone,
    V: Clone,
    F: FileStore,
    C: Codec<K, V>,
{
    /// Open the tree stored at `path`, creating it with the given
    /// minimum degree if no tree exists there yet. `minimum_degree` is
    /// ignored when an existing tree is opened; the degree is read back
    /// from the stored root.
    pub fn open(path: impl AsRef<Path>, minimum_degree: Option<usize>) -> Result<Self, BTreeError> {
        let mut storage = StorageEngine::<F>::open(path, false)?;

        let (root, minimum_degree) = if storage.is_empty()? {
            let t = minimum_degree.unwrap_or(DEFAULT_MINIMUM_DEGREE);
            if t < 2 {
                return Err(BTreeError::InvalidMinimumDegree { provided: t });
            }
            let mut root = Node::empty(t, true);
            root.persist::<F, C>(&mut storage)?;
            storage.commit()?;
            (root, t)
        } else {
            let (offset, bytes) = storage.read_root_bytes()?;
            let body = C::decode_node(&bytes).map_err(|_| BTreeError::InvalidRootRecord)?;
            let t = body.minimum_degree;
            let root = Node::from_body(body, offset, true)?;
            (root, t)
        };

        tracing::debug!(minimum_degree, "opened b-tree");
        Ok(Self {
            storage,
            root,
            minimum_degree,
            _codec: PhantomData,
        })
    }

    /// The minimum degree this tree was created with.
    pub fn minimum_degree(&self) -> usize {
        self.minimum_degree
    }

    /// Look up `key`, lazily loading whatever nodes are needed along the
    /// way.
    pub fn find(&mut self, key: &K) -> Result<Option<V>, BTreeError> {
        self.root.find::<F, C>(key, &mut self.storage)
    }

    /// Insert `(key, value)`. Fails with [`BTreeError::DuplicateKey`] if
    /// `key` is already present; any other failure is wrapped in
    /// [`BTreeError::UnableToInsert`] so the cause isn't lost.
    pub fn insert(&mut self, key: K, value: V) -> Result<(), BTreeError> {
        self.insert_inner(key, value).map_err(|err| match err {
            BTreeError::DuplicateKey => BTreeError::DuplicateKey,
            other => BTreeError::UnableToInsert(Box::new(other)),
        })
    }

    fn insert_inner(&mut self, key: K, value: V) -> Result<(), BTreeError> {
        if self.root.is_full() {
            tracing::debug!(minimum_degree = self.minimum_degree, "root is full, growing tree");
            let t = self.minimum_degree;
            self.root.is_root = false;
            let old_root = std::mem::replace(&mut self.root, Node::empty(t, false));

            let mut new_root = Node::empty(t, true);
            new_root.children.push(ChildEdge::Loaded(Box::new(old_root)));
            new_root.split_child::<F, C>(0, &mut self.storage)?;
            self.root = new_root;
        }

        self.root.insert_non_full::<F, C>(key, value, &mut self.storage)?;
        self.storage.commit()?;
        Ok(())
    }

    /// Release the underlying storage handles, removing any lingering
    /// write-side file.
    pub fn close(self) -> Result<(), BTreeError> {
        self.storage.close()
    }

    #[cfg(test)]
    pub(crate) fn root_and_storage(&mut self) -> (&mut Node<K, V>, &mut StorageEngine<F>) {
        (&mut self.root, &mut self.storage)
    }
}
