//! The authenticated name tree: the map from `BLAKE2b-256(name)` to the
//! latest resource blob, whose root every block header commits to.
//!
//! The tree is an interface with deterministic root rules — insert,
//! remove, lookup, commit, historical roots, and a zero root for the
//! empty tree. This implementation keeps the leaves in an ordered map
//! and commits by hashing the sorted `(key, BLAKE2b-256(value))` pairs
//! in one pass; a proof-carrying tree library can replace it behind the
//! same interface without touching the chain pipeline. Historical roots
//! are persisted per height by the chain store.

use std::collections::BTreeMap;

use hns_chain::{covenant::NameHash, serialization::blake2b};

/// The root of the empty tree.
pub const EMPTY_TREE_ROOT: [u8; 32] = [0; 32];

/// An existence (or absence) proof for a tree key.
///
/// Negative-existence proofs are an extension point: nothing in the
/// chain pipeline consumes them yet, and this tree cannot produce them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Proof {
    /// This tree implementation does not produce proofs.
    Unavailable,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Tree {
    leaves: BTreeMap<NameHash, Vec<u8>>,
}

impl Tree {
    pub fn new() -> Tree {
        Tree::default()
    }

    /// Rebuilds a tree from stored leaves.
    pub fn from_leaves<I>(leaves: I) -> Tree
    where
        I: IntoIterator<Item = (NameHash, Vec<u8>)>,
    {
        Tree {
            leaves: leaves.into_iter().collect(),
        }
    }

    pub fn get(&self, key: &NameHash) -> Option<&Vec<u8>> {
        self.leaves.get(key)
    }

    pub fn insert(&mut self, key: NameHash, value: Vec<u8>) {
        self.leaves.insert(key, value);
    }

    pub fn remove(&mut self, key: &NameHash) {
        self.leaves.remove(key);
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NameHash, &Vec<u8>)> {
        self.leaves.iter()
    }

    /// A copy of this tree with `updates` applied: `Some` inserts,
    /// `None` removes. The chain pipeline commits against the copy and
    /// swaps it in only after the block's batch lands.
    pub fn with_updates<'a, I>(&self, updates: I) -> Tree
    where
        I: IntoIterator<Item = (&'a NameHash, &'a Option<Vec<u8>>)>,
    {
        let mut tree = self.clone();
        for (key, value) in updates {
            match value {
                Some(value) => tree.insert(*key, value.clone()),
                None => tree.remove(key),
            }
        }
        tree
    }

    /// The committed root: zero for the empty tree, otherwise one
    /// BLAKE2b-256 pass over the sorted `(key, value digest)` pairs.
    pub fn root(&self) -> [u8; 32] {
        if self.leaves.is_empty() {
            return EMPTY_TREE_ROOT;
        }
        let mut state = blake2b::Writer::default();
        use std::io::Write;
        for (key, value) in &self.leaves {
            state
                .write_all(key.as_bytes())
                .expect("Blake2bWriter is infallible");
            state
                .write_all(&blake2b::digest256(value))
                .expect("Blake2bWriter is infallible");
        }
        state.finish()
    }

    /// Existence/absence proofs are unimplemented in this tree.
    pub fn prove(&self, _key: &NameHash) -> Proof {
        Proof::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hns_chain::covenant::hash_name;

    #[test]
    fn empty_root_is_zero() {
        hns_test::init();

        assert_eq!(Tree::new().root(), EMPTY_TREE_ROOT);
    }

    #[test]
    fn root_is_insertion_order_independent() {
        hns_test::init();

        let mut a = Tree::new();
        a.insert(hash_name(b"alice"), vec![1]);
        a.insert(hash_name(b"bob"), vec![2]);

        let mut b = Tree::new();
        b.insert(hash_name(b"bob"), vec![2]);
        b.insert(hash_name(b"alice"), vec![1]);

        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn root_tracks_content() {
        hns_test::init();

        let mut tree = Tree::new();
        tree.insert(hash_name(b"alice"), vec![1]);
        let one = tree.root();

        tree.insert(hash_name(b"alice"), vec![2]);
        let two = tree.root();
        assert_ne!(one, two);

        tree.insert(hash_name(b"alice"), vec![1]);
        assert_eq!(tree.root(), one);

        tree.remove(&hash_name(b"alice"));
        assert_eq!(tree.root(), EMPTY_TREE_ROOT);
    }

    #[test]
    fn with_updates_leaves_original_untouched() {
        hns_test::init();

        let mut tree = Tree::new();
        tree.insert(hash_name(b"alice"), vec![1]);
        let original_root = tree.root();

        let alice = hash_name(b"alice");
        let bob = hash_name(b"bob");
        let updates: Vec<(NameHash, Option<Vec<u8>>)> =
            vec![(alice, None), (bob, Some(vec![9]))];
        let updated = tree.with_updates(updates.iter().map(|(k, v)| (k, v)));

        assert_eq!(tree.root(), original_root);
        assert!(updated.get(&alice).is_none());
        assert_eq!(updated.get(&bob), Some(&vec![9]));
    }

    #[test]
    fn proofs_are_unavailable() {
        hns_test::init();

        assert_eq!(Tree::new().prove(&hash_name(b"alice")), Proof::Unavailable);
    }
}
