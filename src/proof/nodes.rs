//! RFC 6962 proof shapes: which tree nodes make up a proof.
//!
//! These functions compute node-ID lists only; resolving the IDs to hashes
//! is the proof builder's job. Subtree decomposition follows the Merkle
//! Audit Path and Merkle Consistency Proof definitions: at every step the
//! left subtree is the largest perfect tree that fits.

use crate::error::{LogError, Result};
use crate::types::NodeId;

/// Largest power of two strictly smaller than `n`. Requires `n >= 2`.
#[inline]
fn split_point(n: u64) -> u64 {
    debug_assert!(n >= 2);
    1 << (63 - (n - 1).leading_zeros())
}

/// The node committing to leaves `[begin, end)`.
///
/// When the span is a perfect, aligned subtree this is a real node that
/// some tile stores. Otherwise `[begin, end)` ends at the log frontier and
/// the result is the ephemeral node rooting the smallest enclosing subtree,
/// exactly the ID emitted for it by the compact-range fold.
fn range_root(begin: u64, end: u64) -> NodeId {
    let span = end - begin;
    let level = if span.is_power_of_two() {
        span.trailing_zeros() as u64
    } else {
        u64::BITS as u64 - span.leading_zeros() as u64
    };
    NodeId::new(level, begin >> level)
}

/// Node IDs of the inclusion proof for `index` in a tree of `size` leaves,
/// ordered from the leaf's sibling upward.
pub fn inclusion_nodes(index: u64, size: u64) -> Result<Vec<NodeId>> {
    if index >= size {
        return Err(LogError::InvalidProof(format!(
            "leaf index {index} out of bounds for tree size {size}"
        )));
    }
    let mut out = Vec::new();
    audit_path(index, 0, size, &mut out);
    Ok(out)
}

fn audit_path(index: u64, begin: u64, end: u64, out: &mut Vec<NodeId>) {
    if end - begin <= 1 {
        return;
    }
    let mid = begin + split_point(end - begin);
    if index < mid {
        audit_path(index, begin, mid, out);
        out.push(range_root(mid, end));
    } else {
        audit_path(index, mid, end, out);
        out.push(range_root(begin, mid));
    }
}

/// Node IDs of the consistency proof between trees of `smaller` and
/// `larger` leaves, ordered as RFC 6962 emits them. The proof is empty
/// when `smaller` is 0 or the sizes are equal.
pub fn consistency_nodes(smaller: u64, larger: u64) -> Result<Vec<NodeId>> {
    if smaller > larger {
        return Err(LogError::InvalidProof(format!(
            "tree size {smaller} is not covered by tree size {larger}"
        )));
    }
    if smaller == 0 || smaller == larger {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    subproof(smaller, 0, larger, true, &mut out);
    Ok(out)
}

/// `old_end` is the size of the old tree; `[begin, end)` the current
/// subtree; `complete` whether the old tree still spans this whole subtree.
fn subproof(old_end: u64, begin: u64, end: u64, complete: bool, out: &mut Vec<NodeId>) {
    if old_end == end {
        if !complete {
            out.push(range_root(begin, end));
        }
        return;
    }
    let mid = begin + split_point(end - begin);
    if old_end <= mid {
        subproof(old_end, begin, mid, complete, out);
        out.push(range_root(mid, end));
    } else {
        subproof(old_end, mid, end, false, out);
        out.push(range_root(begin, mid));
    }
}
