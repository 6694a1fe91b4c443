//! Pure RFC 6962 proof verification.
//!
//! Nothing here performs I/O: callers supply the proof hashes, the claimed
//! roots, and a hasher, and get a yes/no answer with a diagnostic. The
//! reconstruction decomposes a proof into an "inner" part, where the path
//! to the leaf has siblings on both sides, and a "border" part of
//! left-hand perfect subtree roots.

use crate::error::{LogError, Result};
use crate::hasher::TreeHasher;
use crate::types::Hash;

/// Number of inner proof steps for `index` in a tree of `size` leaves:
/// the height of the lowest node on the path from `index` whose subtree
/// contains leaf `size - 1`.
#[inline]
fn inner_proof_size(index: u64, size: u64) -> u32 {
    u64::BITS - (index ^ (size - 1)).leading_zeros()
}

/// Folds `proof` into `seed` going up the inner path, picking sides by the
/// bits of `index`.
fn chain_inner<H: TreeHasher>(hasher: &H, mut seed: Hash, proof: &[Hash], index: u64) -> Hash {
    for (i, h) in proof.iter().enumerate() {
        if (index >> i) & 1 == 0 {
            seed = hasher.hash_children(&seed, h);
        } else {
            seed = hasher.hash_children(h, &seed);
        }
    }
    seed
}

/// Like [`chain_inner`], but only folds the steps where the path node is a
/// right child, skipping the rest. Used to reconstruct the smaller tree's
/// root, whose frontier only has left-hand siblings.
fn chain_inner_right<H: TreeHasher>(hasher: &H, mut seed: Hash, proof: &[Hash], index: u64) -> Hash {
    for (i, h) in proof.iter().enumerate() {
        if (index >> i) & 1 == 1 {
            seed = hasher.hash_children(h, &seed);
        }
    }
    seed
}

/// Folds the border part: every remaining proof hash is a left sibling.
fn chain_border_right<H: TreeHasher>(hasher: &H, mut seed: Hash, proof: &[Hash]) -> Hash {
    for h in proof {
        seed = hasher.hash_children(h, &seed);
    }
    seed
}

/// Recomputes the root of a `size`-leaf tree from `leaf_hash` at `index`
/// and its inclusion proof.
pub fn root_from_inclusion_proof<H: TreeHasher>(
    hasher: &H,
    index: u64,
    size: u64,
    proof: &[Hash],
    leaf_hash: &Hash,
) -> Result<Hash> {
    if index >= size {
        return Err(LogError::InvalidProof(format!(
            "leaf index {index} out of bounds for tree size {size}"
        )));
    }
    let inner = inner_proof_size(index, size) as usize;
    let border = (index >> inner).count_ones() as usize;
    if proof.len() != inner + border {
        return Err(LogError::InvalidProof(format!(
            "wrong proof size {}, want {}",
            proof.len(),
            inner + border
        )));
    }

    let seed = chain_inner(hasher, *leaf_hash, &proof[..inner], index);
    Ok(chain_border_right(hasher, seed, &proof[inner..]))
}

/// Verifies that `leaf_hash` is committed at `index` by the `size`-leaf
/// tree whose root is `root`.
pub fn verify_inclusion<H: TreeHasher>(
    hasher: &H,
    index: u64,
    size: u64,
    proof: &[Hash],
    root: &Hash,
    leaf_hash: &Hash,
) -> Result<()> {
    let got = root_from_inclusion_proof(hasher, index, size, proof, leaf_hash)?;
    if got != *root {
        return Err(LogError::InvalidProof(format!(
            "inclusion proof yields root {}, want {}",
            hex::encode(got),
            hex::encode(root)
        )));
    }
    Ok(())
}

/// Verifies that the `new_size`-leaf tree with root `new_root` is an
/// append-only extension of the `old_size`-leaf tree with root `old_root`.
///
/// Both roots are reconstructed from the proof: the old root from the
/// right-child steps and the border, the new root from the full chain.
pub fn verify_consistency<H: TreeHasher>(
    hasher: &H,
    old_size: u64,
    new_size: u64,
    old_root: &Hash,
    new_root: &Hash,
    proof: &[Hash],
) -> Result<()> {
    if old_size > new_size {
        return Err(LogError::InvalidProof(format!(
            "tree size {old_size} is not covered by tree size {new_size}"
        )));
    }
    if old_size == new_size {
        if old_root != new_root {
            return Err(LogError::InvalidProof(
                "different roots for the same tree size".into(),
            ));
        }
        if !proof.is_empty() {
            return Err(LogError::InvalidProof(
                "non-empty proof between identical trees".into(),
            ));
        }
        return Ok(());
    }
    if old_size == 0 {
        // Any tree extends the empty tree.
        if !proof.is_empty() {
            return Err(LogError::InvalidProof(
                "non-empty proof from the empty tree".into(),
            ));
        }
        return Ok(());
    }
    if proof.is_empty() {
        return Err(LogError::InvalidProof("empty consistency proof".into()));
    }

    let inner0 = inner_proof_size(old_size - 1, new_size) as usize;
    let border = ((old_size - 1) >> inner0).count_ones() as usize;
    let shift = old_size.trailing_zeros() as usize;
    let inner = inner0 - shift;

    // The proof opens with the root of the largest perfect subtree ending
    // at old_size, except when old_size itself is a power of two and that
    // root is old_root.
    let (seed, rest) = if old_size == 1 << shift {
        (*old_root, proof)
    } else {
        (proof[0], &proof[1..])
    };
    if rest.len() != inner + border {
        return Err(LogError::InvalidProof(format!(
            "wrong proof size {}, want {}",
            proof.len(),
            inner + border + (proof.len() - rest.len())
        )));
    }

    // Chain from level `shift`: the old frontier only takes the right-child
    // steps, the new root takes them all.
    let mask = (old_size - 1) >> shift;

    let old_got = chain_inner_right(hasher, seed, &rest[..inner], mask);
    let old_got = chain_border_right(hasher, old_got, &rest[inner..]);
    if old_got != *old_root {
        return Err(LogError::InvalidProof(format!(
            "consistency proof yields old root {}, want {}",
            hex::encode(old_got),
            hex::encode(old_root)
        )));
    }

    let new_got = chain_inner(hasher, seed, &rest[..inner], mask);
    let new_got = chain_border_right(hasher, new_got, &rest[inner..]);
    if new_got != *new_root {
        return Err(LogError::InvalidProof(format!(
            "consistency proof yields new root {}, want {}",
            hex::encode(new_got),
            hex::encode(new_root)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::Rfc6962Hasher;

    fn leaf(data: &[u8]) -> Hash {
        Rfc6962Hasher.hash_leaf(data)
    }

    #[test]
    fn test_single_leaf_tree() {
        let h = leaf(b"hello");
        // The proof for the only leaf of a 1-leaf tree is empty.
        assert!(verify_inclusion(&Rfc6962Hasher, 0, 1, &[], &h, &h).is_ok());
        assert!(verify_inclusion(&Rfc6962Hasher, 0, 1, &[h], &h, &h).is_err());
    }

    #[test]
    fn test_two_leaf_tree() {
        let a = leaf(b"a");
        let b = leaf(b"b");
        let root = Rfc6962Hasher.hash_children(&a, &b);

        assert!(verify_inclusion(&Rfc6962Hasher, 0, 2, &[b], &root, &a).is_ok());
        assert!(verify_inclusion(&Rfc6962Hasher, 1, 2, &[a], &root, &b).is_ok());

        // Swapped proofs and wrong leaves fail.
        assert!(verify_inclusion(&Rfc6962Hasher, 0, 2, &[a], &root, &b).is_err());
        assert!(verify_inclusion(&Rfc6962Hasher, 0, 2, &[b], &root, &b).is_err());
    }

    #[test]
    fn test_inclusion_rejects_out_of_bounds() {
        let h = leaf(b"x");
        assert!(verify_inclusion(&Rfc6962Hasher, 0, 0, &[], &h, &h).is_err());
        assert!(verify_inclusion(&Rfc6962Hasher, 2, 2, &[h], &h, &h).is_err());
    }

    #[test]
    fn test_consistency_trivial_cases() {
        let root = [7u8; 32];
        let other = [8u8; 32];

        // Empty old tree and identical trees take empty proofs.
        assert!(verify_consistency(&Rfc6962Hasher, 0, 5, &root, &other, &[]).is_ok());
        assert!(verify_consistency(&Rfc6962Hasher, 5, 5, &root, &root, &[]).is_ok());

        assert!(verify_consistency(&Rfc6962Hasher, 5, 5, &root, &other, &[]).is_err());
        assert!(verify_consistency(&Rfc6962Hasher, 0, 5, &root, &other, &[root]).is_err());
        assert!(verify_consistency(&Rfc6962Hasher, 6, 5, &root, &root, &[]).is_err());
        assert!(verify_consistency(&Rfc6962Hasher, 2, 5, &root, &other, &[]).is_err());
    }

    /// Hand-built 2-to-4 consistency: the proof is the single hash of the
    /// subtree [2, 4).
    #[test]
    fn test_consistency_power_of_two() {
        let leaves: Vec<Hash> = (0..4).map(|i| leaf(&[i as u8])).collect();
        let n01 = Rfc6962Hasher.hash_children(&leaves[0], &leaves[1]);
        let n23 = Rfc6962Hasher.hash_children(&leaves[2], &leaves[3]);
        let root4 = Rfc6962Hasher.hash_children(&n01, &n23);

        assert!(verify_consistency(&Rfc6962Hasher, 2, 4, &n01, &root4, &[n23]).is_ok());
        // The same proof against a tampered old root fails.
        assert!(verify_consistency(&Rfc6962Hasher, 2, 4, &n23, &root4, &[n23]).is_err());
        // Wrong length fails before any hashing.
        assert!(verify_consistency(&Rfc6962Hasher, 2, 4, &n01, &root4, &[n23, n23]).is_err());
    }
}
