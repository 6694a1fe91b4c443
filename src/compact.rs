//! Compact ranges: the minimal perfect-subtree decomposition of a log.
//!
//! A tree of `n` leaves decomposes into one maximal perfect subtree per set
//! bit of `n`. Those subtree roots are all a client needs to recompute the
//! tree root, and folding them also produces every "ephemeral" node on the
//! right frontier of the tree, which proofs may reference but which no tile
//! stores.

use crate::error::{LogError, Result};
use crate::hasher::TreeHasher;
use crate::types::{Hash, NodeId};

/// Node IDs of the maximal perfect subtrees covering `[0, size)`, ordered
/// from the largest subtree (highest set bit) to the smallest. The returned
/// list has `size.count_ones()` entries.
pub fn range_nodes(size: u64) -> Vec<NodeId> {
    let mut nodes = Vec::with_capacity(size.count_ones() as usize);
    let mut base = 0u64;
    for level in (0..u64::BITS as u64).rev() {
        if size & (1 << level) != 0 {
            nodes.push(NodeId::new(level, base >> level));
            base += 1 << level;
        }
    }
    nodes
}

/// The compact range `[0, size)`: one hash per maximal perfect subtree, in
/// the order produced by [`range_nodes`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompactRange {
    size: u64,
    hashes: Vec<Hash>,
}

impl CompactRange {
    /// Wraps `hashes` as the compact range of a tree with `size` leaves.
    /// There must be exactly one hash per set bit of `size`.
    pub fn new(size: u64, hashes: Vec<Hash>) -> Result<Self> {
        if hashes.len() != size.count_ones() as usize {
            return Err(LogError::Malformed {
                what: "compact range",
                reason: format!(
                    "{} hashes cannot cover a tree of {} leaves",
                    hashes.len(),
                    size
                ),
            });
        }
        Ok(Self { size, hashes })
    }

    /// Number of leaves the range covers.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Folds the range into the tree's root hash.
    ///
    /// Hashes are combined right to left. Every intermediate node produced
    /// by a merge roots a subtree that extends past the end of the log, so
    /// each one is ephemeral; `visit` is called with its ID and hash. After
    /// the fold, the visited set contains every right-frontier node a proof
    /// for this tree size can reference.
    pub fn root_hash<H, V>(&self, hasher: &H, mut visit: V) -> Hash
    where
        H: TreeHasher,
        V: FnMut(NodeId, Hash),
    {
        if self.size == 0 {
            return hasher.empty_root();
        }

        let ids = range_nodes(self.size);
        let mut acc = self.hashes[self.hashes.len() - 1];
        for i in (0..self.hashes.len() - 1).rev() {
            let id = ids[i];
            let (begin, _) = id.coverage();
            acc = hasher.hash_children(&self.hashes[i], &acc);
            visit(NodeId::new(id.level + 1, begin >> (id.level + 1)), acc);
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::Rfc6962Hasher;

    #[test]
    fn test_range_nodes() {
        assert!(range_nodes(0).is_empty());
        assert_eq!(range_nodes(1), vec![NodeId::new(0, 0)]);
        assert_eq!(range_nodes(8), vec![NodeId::new(3, 0)]);
        // 13 = 8 + 4 + 1: subtrees over [0,8), [8,12), [12,13).
        assert_eq!(
            range_nodes(13),
            vec![NodeId::new(3, 0), NodeId::new(2, 2), NodeId::new(0, 12)]
        );
        // 300 = 256 + 32 + 8 + 4.
        assert_eq!(
            range_nodes(300),
            vec![
                NodeId::new(8, 0),
                NodeId::new(5, 8),
                NodeId::new(3, 36),
                NodeId::new(2, 74),
            ]
        );

        for size in 0..600u64 {
            let nodes = range_nodes(size);
            assert_eq!(nodes.len(), size.count_ones() as usize);
            // Spans are adjacent, descending in size, and cover [0, size).
            let mut at = 0;
            for id in &nodes {
                let (begin, end) = id.coverage();
                assert_eq!(begin, at);
                at = end;
            }
            assert_eq!(at, size);
        }
    }

    #[test]
    fn test_new_validates_length() {
        assert!(CompactRange::new(5, vec![[0; 32]; 2]).is_ok());
        assert!(CompactRange::new(5, vec![[0; 32]; 3]).is_err());
        assert!(CompactRange::new(0, vec![]).is_ok());
    }

    #[test]
    fn test_empty_range_root() {
        let range = CompactRange::new(0, vec![]).unwrap();
        let mut visited = 0;
        let root = range.root_hash(&Rfc6962Hasher, |_, _| visited += 1);
        assert_eq!(root, Rfc6962Hasher.empty_root());
        assert_eq!(visited, 0);
    }

    #[test]
    fn test_perfect_range_root_is_its_hash() {
        let h = Rfc6962Hasher.hash_leaf(b"only");
        let range = CompactRange::new(1, vec![h]).unwrap();
        let root = range.root_hash(&Rfc6962Hasher, |_, _| panic!("no merges expected"));
        assert_eq!(root, h);
    }

    /// Folding the range of a 13-leaf tree produces two ephemeral nodes:
    /// the merge of [8,12) with [12,13) roots at (3, 1), and the final
    /// merge roots the whole tree at (4, 0).
    #[test]
    fn test_ephemeral_emission() {
        let hashes: Vec<Hash> = (0..3).map(|i| [i as u8 + 1; 32]).collect();
        let range = CompactRange::new(13, hashes.clone()).unwrap();

        let mut visited = Vec::new();
        let root = range.root_hash(&Rfc6962Hasher, |id, h| visited.push((id, h)));

        let merge1 = Rfc6962Hasher.hash_children(&hashes[1], &hashes[2]);
        let merge2 = Rfc6962Hasher.hash_children(&hashes[0], &merge1);
        assert_eq!(root, merge2);
        assert_eq!(
            visited,
            vec![(NodeId::new(3, 1), merge1), (NodeId::new(4, 0), merge2)]
        );

        // Every visited node is ephemeral for this tree size.
        for (id, _) in &visited {
            assert!(!id.is_complete(13));
        }
    }
}
