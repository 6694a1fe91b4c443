//! RFC 6962 tree hashing.
//!
//! Leaf and interior hashes are domain-separated so that no leaf can be
//! confused with an interior node: leaves hash as `SHA256(0x00 || data)`,
//! interior nodes as `SHA256(0x01 || left || right)`, and the empty tree's
//! root is `SHA256("")`.

use crate::constant::{LEAF_HASH_PREFIX, NODE_HASH_PREFIX};
use crate::types::Hash;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

/// Root hash of the empty tree.
static EMPTY_ROOT: Lazy<Hash> = Lazy::new(|| Sha256::digest(b"").into());

/// Hashing capability of a Merkle log.
///
/// Components that hash take this as an explicit parameter rather than
/// assuming a global default, so hosts can swap in an instrumented or
/// alternative implementation.
pub trait TreeHasher {
    /// Hashes leaf data into the level-0 node commitment.
    fn hash_leaf(&self, leaf: &[u8]) -> Hash;

    /// Hashes two child node commitments into their parent's.
    fn hash_children(&self, left: &Hash, right: &Hash) -> Hash;

    /// Root of a tree with no leaves.
    fn empty_root(&self) -> Hash;
}

/// The RFC 6962 SHA-256 log hasher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rfc6962Hasher;

impl TreeHasher for Rfc6962Hasher {
    fn hash_leaf(&self, leaf: &[u8]) -> Hash {
        let mut h = Sha256::new();
        h.update([LEAF_HASH_PREFIX]);
        h.update(leaf);
        h.finalize().into()
    }

    fn hash_children(&self, left: &Hash, right: &Hash) -> Hash {
        let mut h = Sha256::new();
        h.update([NODE_HASH_PREFIX]);
        h.update(left);
        h.update(right);
        h.finalize().into()
    }

    fn empty_root(&self) -> Hash {
        *EMPTY_ROOT
    }
}
