//! An embedded, single-file, on-disk ordered key/value index built as a
//! B-tree of the Cormen et al. *minimum degree* flavour.
//!
//! The coupled core is the B-tree algorithm (proactive split-on-descent
//! insertion, ordered search) and the storage engine that gives it a
//! durable, crash-safe home in a single file: every mutation appends a
//! fresh node record to a write-side file, and an `insert` only becomes
//! visible once its root pointer is published by an atomic rename.
//!
//! ```
//! use btrees::BTree;
//! use tempfile::tempdir;
//!
//! let dir = tempdir().unwrap();
//! let path = dir.path().join("index.db");
//!
//! let mut tree = BTree::<i64, String>::open(&path, Some(2)).unwrap();
//! tree.insert(1, "one".to_string()).unwrap();
//! assert_eq!(tree.find(&1).unwrap(), Some("one".to_string()));
//! assert_eq!(tree.find(&2).unwrap(), None);
//! ```

mod codec;
mod error;
mod file_store;
mod framing;
mod node;
mod storage;
mod tree;

pub use codec::{BincodeCodec, Codec};
pub use error::BTreeError;
pub use file_store::{FileStore, FsFileStore};
pub use tree::{BTree, DEFAULT_MINIMUM_DEGREE};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet as StdBTreeSet;

    fn temp_path(tag: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{tag}.db"));
        (dir, path)
    }

    /// Recursively walks every node, asserting the ordering, occupancy,
    /// separation, and balance invariants (§8 properties 1-4). Returns
    /// the depth of the subtree's leaves, so callers can assert all
    /// leaves share a depth.
    fn assert_invariants<F: FileStore, C: Codec<i64, String>>(
        node: &mut node::Node<i64, String>,
        storage: &mut storage::StorageEngine<F>,
        is_root: bool,
        lower: Option<i64>,
        upper: Option<i64>,
    ) -> usize {
        for window in node.elements.windows(2) {
            assert!(window[0].0 < window[1].0, "elements are not strictly sorted");
        }
        if let (Some(lower), Some((first, _))) = (lower, node.elements.first()) {
            assert!(lower < *first, "key is not separated from its left sibling");
        }
        if let (Some(upper), Some((last, _))) = (upper, node.elements.last()) {
            assert!(*last < upper, "key is not separated from its right sibling");
        }
        if !is_root {
            assert!(
                node.elements.len() >= node.minimum_degree - 1,
                "non-root node underflowed minimum occupancy"
            );
        }
        assert!(node.elements.len() < 2 * node.minimum_degree);

        if node.is_leaf() {
            return 0;
        }
        assert_eq!(node.children.len(), node.elements.len() + 1, "fan-out must be elements + 1");

        let mut depth = None;
        let child_count = node.children.len();
        let element_count = node.elements.len();
        for i in 0..child_count {
            let child_lower = if i == 0 { lower } else { Some(node.elements[i - 1].0) };
            let child_upper = if i == element_count { upper } else { Some(node.elements[i].0) };
            let child = node.load_child::<F, C>(i, storage).unwrap();
            let child_depth = assert_invariants::<F, C>(child, storage, false, child_lower, child_upper);
            match depth {
                None => depth = Some(child_depth),
                Some(d) => assert_eq!(d, child_depth, "leaves are not all at the same depth"),
            }
        }
        1 + depth.unwrap()
    }

    fn check_tree<F: FileStore, C: Codec<i64, String>>(tree: &mut BTree<i64, String, F, C>) {
        let (root, storage) = tree.root_and_storage();
        assert_invariants::<F, C>(root, storage, true, None, None);
    }

    fn all_keys<F: FileStore, C: Codec<i64, String>>(tree: &mut BTree<i64, String, F, C>, candidates: &[i64]) -> StdBTreeSet<i64> {
        candidates
            .iter()
            .copied()
            .filter(|k| tree.find(k).unwrap().is_some())
            .collect()
    }

    // S1: single insert / find.
    #[test]
    fn s1_single_insert_find() {
        let (_dir, path) = temp_path("s1");
        let mut tree = BTree::<i64, String>::open(&path, Some(2)).unwrap();
        tree.insert(0, "A".to_string()).unwrap();
        assert_eq!(tree.find(&0).unwrap(), Some("A".to_string()));
        assert_eq!(tree.find(&1).unwrap(), None);
    }

    // S2: sequential fill.
    #[test]
    fn s2_sequential_fill() {
        let (_dir, path) = temp_path("s2");
        let mut tree = BTree::<i64, String>::open(&path, Some(2)).unwrap();
        for (k, v) in [(0, "A"), (1, "B"), (2, "C"), (3, "D"), (4, "E")] {
            tree.insert(k, v.to_string()).unwrap();
        }
        assert_eq!(tree.find(&3).unwrap(), Some("D".to_string()));
        check_tree(&mut tree);
    }

    // S3: non-sequential insertion order.
    #[test]
    fn s3_non_sequential() {
        let (_dir, path) = temp_path("s3");
        let mut tree = BTree::<i64, String>::open(&path, Some(2)).unwrap();
        let keys = [0, 10, 20, 30, 40, 25, 22, 27, 21, 29];
        let letters = "ABCDEFGHIJ";
        for (k, letter) in keys.iter().zip(letters.chars()) {
            tree.insert(*k, letter.to_string()).unwrap();
        }
        assert_eq!(tree.find(&29).unwrap(), Some("J".to_string()));
        let expected: StdBTreeSet<i64> = keys.iter().copied().collect();
        assert_eq!(all_keys(&mut tree, &keys), expected);
        check_tree(&mut tree);
    }

    // S4: duplicate rejection.
    #[test]
    fn s4_duplicate_rejected() {
        let (_dir, path) = temp_path("s4");
        let mut tree = BTree::<i64, String>::open(&path, Some(2)).unwrap();
        tree.insert(5, "x".to_string()).unwrap();
        let err = tree.insert(5, "y".to_string()).unwrap_err();
        assert!(matches!(err, BTreeError::DuplicateKey));
        assert_eq!(tree.find(&5).unwrap(), Some("x".to_string()));
    }

    // Duplicate of a key that is exactly the element a child split
    // promotes into the parent must still be rejected, not silently
    // inserted into the now-sibling leaf.
    #[test]
    fn s4b_duplicate_of_promoted_median_rejected() {
        let (_dir, path) = temp_path("s4b");
        let mut tree = BTree::<i64, String>::open(&path, Some(2)).unwrap();
        for (k, v) in [(10, "a"), (20, "b"), (30, "c"), (40, "d"), (50, "e")] {
            tree.insert(k, v.to_string()).unwrap();
        }
        let err = tree.insert(40, "dup".to_string()).unwrap_err();
        assert!(matches!(err, BTreeError::DuplicateKey));
        assert_eq!(tree.find(&40).unwrap(), Some("d".to_string()));
        check_tree(&mut tree);
    }

    // S5: persistence across close/reopen.
    #[test]
    fn s5_persistence_across_reopen() {
        let (_dir, path) = temp_path("s5");
        {
            let mut tree = BTree::<i64, String>::open(&path, Some(2)).unwrap();
            for k in 1..=50 {
                tree.insert(k, format!("v{k}")).unwrap();
            }
            tree.close().unwrap();
        }
        let mut tree = BTree::<i64, String>::open(&path, None).unwrap();
        for k in 1..=50 {
            assert_eq!(tree.find(&k).unwrap(), Some(format!("v{k}")));
        }
    }

    // S6: root growth.
    #[test]
    fn s6_root_growth() {
        let (_dir, path) = temp_path("s6");
        let mut tree = BTree::<i64, String>::open(&path, Some(2)).unwrap();
        for k in 0..3 {
            tree.insert(k, format!("v{k}")).unwrap();
        }
        tree.insert(3, "v3".to_string()).unwrap();

        let (root, _storage) = tree.root_and_storage();
        assert!(!root.is_leaf());
        assert_eq!(root.elements.len(), 1);
        assert_eq!(root.children.len(), 2);
    }

    // Property 6: round-trip, including the not-present case.
    #[test]
    fn round_trip_and_absent_keys() {
        let (_dir, path) = temp_path("roundtrip");
        let mut tree = BTree::<i64, String>::open(&path, Some(3)).unwrap();
        for k in 0..64 {
            tree.insert(k, format!("v{k}")).unwrap();
        }
        for k in 0..64 {
            assert_eq!(tree.find(&k).unwrap(), Some(format!("v{k}")));
        }
        for k in 64..128 {
            assert_eq!(tree.find(&k).unwrap(), None);
        }
    }

    // Property 8: commit atomicity — a failed insert leaves the
    // pre-insert snapshot intact on reopen.
    #[test]
    fn failed_insert_does_not_corrupt_committed_state() {
        let (_dir, path) = temp_path("atomicity");
        {
            let mut tree = BTree::<i64, String>::open(&path, Some(2)).unwrap();
            tree.insert(1, "one".to_string()).unwrap();
            let err = tree.insert(1, "uno".to_string()).unwrap_err();
            assert!(matches!(err, BTreeError::DuplicateKey));
            tree.close().unwrap();
        }
        let mut tree = BTree::<i64, String>::open(&path, None).unwrap();
        assert_eq!(tree.find(&1).unwrap(), Some("one".to_string()));
    }

    // Larger randomized-order fill to exercise repeated splits/growth
    // against the full invariant set.
    #[test]
    fn many_inserts_preserve_invariants() {
        let (_dir, path) = temp_path("many");
        let mut tree = BTree::<i64, String>::open(&path, Some(2)).unwrap();
        // A fixed, deterministic shuffle (no RNG dependency in tests).
        let mut keys: Vec<i64> = (0..200).collect();
        for chunk in keys.chunks_mut(7) {
            chunk.reverse();
        }
        for k in &keys {
            tree.insert(*k, format!("v{k}")).unwrap();
        }
        check_tree(&mut tree);
        keys.sort_unstable();
        for k in &keys {
            assert_eq!(tree.find(k).unwrap(), Some(format!("v{k}")));
        }
    }

    // An explicitly pre-initialised but empty file (20-byte header,
    // root_offset = 0, no record region) must be tolerated on open and
    // treated the same as a brand new path.
    #[test]
    fn open_tolerates_preinitialised_empty_file() {
        let (_dir, path) = temp_path("preinit");
        {
            use std::io::Write;
            let mut file = std::fs::File::create(&path).unwrap();
            file.write_all(b"0000000000000000000\n").unwrap();
        }
        let mut tree = BTree::<i64, String>::open(&path, Some(2)).unwrap();
        tree.insert(1, "one".to_string()).unwrap();
        assert_eq!(tree.find(&1).unwrap(), Some("one".to_string()));
    }

    #[test]
    fn open_rejects_minimum_degree_below_two() {
        let (_dir, path) = temp_path("badt");
        match BTree::<i64, String>::open(&path, Some(1)) {
            Err(BTreeError::InvalidMinimumDegree { provided: 1 }) => {}
            Err(other) => panic!("expected InvalidMinimumDegree, got {other:?}"),
            Ok(_) => panic!("expected InvalidMinimumDegree, got Ok"),
        }
    }
}
