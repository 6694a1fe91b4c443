//! Storage layout of a tiled log.
//!
//! Paths are the only compatibility surface between a log and its clients:
//! both sides must address byte-for-byte identical strings. All hex in paths
//! is lowercase, and the partial size of a frontier tile is part of the tile
//! path, making a partial tile a distinct resource from the full tile it
//! will eventually become.

use crate::constant::{CHECKPOINT_PATH, TILE_HEIGHT, TILE_WIDTH};
use crate::error::{LogError, Result};
use crate::types::{Hash, NodeId, TileKey};

/// Joins a path relative to the storage root. An empty root yields a
/// relative path, which is how the core addresses a rooted fetcher.
fn join(root: &str, rel: &str) -> String {
    if root.is_empty() {
        rel.to_string()
    } else {
        format!("{root}/{rel}")
    }
}

/// Path of the log checkpoint under `root`.
pub fn checkpoint_path(root: &str) -> String {
    join(root, CHECKPOINT_PATH)
}

/// Path of the tile addressed by `tile` under `root`.
///
/// The tile level is rendered as 2 hex digits and the tile index as 10 hex
/// digits split `4/2/2/2` into directories. `partial` is the number of
/// leaves covered by a frontier tile, or 0 for a full tile; when non-zero it
/// is appended as a 2-hex-digit suffix.
pub fn tile_path(root: &str, tile: TileKey, partial: u64) -> String {
    let idx = format!("{:010x}", tile.index);
    let split = idx.len() - 6;
    let mut path = format!(
        "tile/{:02x}/{}/{}/{}/{}",
        tile.level,
        &idx[..split],
        &idx[split..split + 2],
        &idx[split + 2..split + 4],
        &idx[split + 4..],
    );
    if partial != 0 {
        path.push_str(&format!(".{partial:02x}"));
    }
    join(root, &path)
}

/// Path of the leafhash-to-sequence index entry for `leaf_hash` under
/// `root`. The first three bytes of the hash become directories, the rest
/// the file name.
pub fn leaf_path(root: &str, leaf_hash: &Hash) -> String {
    let h = hex::encode(leaf_hash);
    join(
        root,
        &format!("leaves/{}/{}/{}/{}", &h[..2], &h[2..4], &h[4..6], &h[6..]),
    )
}

/// Path of the entry with sequence number `seq` under `root`. The 40-bit
/// sequence number is rendered big-endian as five 2-hex-digit components.
pub fn seq_path(root: &str, seq: u64) -> String {
    let s = format!("{seq:010x}");
    let n = s.len();
    join(
        root,
        &format!(
            "seq/{}/{}/{}/{}/{}",
            &s[..n - 8],
            &s[n - 8..n - 6],
            &s[n - 6..n - 4],
            &s[n - 4..n - 2],
            &s[n - 2..],
        ),
    )
}

fn is_lower_hex(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Recovers the sequence number from a path produced by [`seq_path`] for
/// the same `root`.
pub fn seq_from_path(root: &str, path: &str) -> Result<u64> {
    let malformed = |reason: String| LogError::Malformed {
        what: "seq path",
        reason,
    };

    let rel = if root.is_empty() {
        path
    } else {
        path.strip_prefix(root)
            .and_then(|p| p.strip_prefix('/'))
            .ok_or_else(|| malformed(format!("{path:?} does not live under {root:?}")))?
    };
    let digits = rel
        .strip_prefix("seq/")
        .ok_or_else(|| malformed(format!("{rel:?} is not a seq path")))?;

    let parts: Vec<&str> = digits.split('/').collect();
    if parts.len() != 5 || parts.iter().any(|p| p.len() != 2 || !is_lower_hex(p)) {
        return Err(malformed(format!("unexpected seq components in {rel:?}")));
    }
    let concat = parts.concat();
    u64::from_str_radix(&concat, 16).map_err(|e| malformed(e.to_string()))
}

/// Maps Merkle node coordinates to the tile containing the node plus the
/// node's coordinates within that tile.
pub fn tile_address(id: NodeId) -> (TileKey, u64, u64) {
    let tile_level = id.level / TILE_HEIGHT;
    let node_level = id.level % TILE_HEIGHT;
    // Width of the node's row inside its tile.
    let row_width = 1u64 << (TILE_HEIGHT - node_level);
    let tile_index = id.index / row_width;
    let node_index = id.index % row_width;
    (TileKey::new(tile_level, tile_index), node_level, node_index)
}

/// Number of leaves covered by the tile addressed by `tile` in a log of
/// `log_size` leaves, or 0 if the tile is complete. Partial sizes are
/// always in `[1, 255]`.
pub fn partial_tile_size(tile: TileKey, log_size: u64) -> u64 {
    // Number of tile-level "leaves" (Merkle nodes at the tile's bottom row)
    // that exist in a tree of this size.
    let size_at_level = log_size >> (tile.level * TILE_HEIGHT);
    let full_tiles = size_at_level / TILE_WIDTH;
    if tile.index < full_tiles {
        0
    } else {
        size_at_level % TILE_WIDTH
    }
}
