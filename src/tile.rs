//! Tiles: fixed-height immutable subtrees, the unit of log storage.
//!
//! A tile stores every *complete* node of an 8-level slice of the Merkle
//! tree, keyed by an in-tile node key. Incomplete (ephemeral) nodes are
//! never stored; clients synthesize them from the compact range. On the
//! wire a tile is a text file of `<hex key> <hex hash>` records, one per
//! line, ascending by key.

use crate::constant::{MAX_TILE_NODE_KEY, TILE_HEIGHT, TILE_WIDTH};
use crate::error::{LogError, Result};
use crate::hasher::TreeHasher;
use crate::types::{Hash, HASH_SIZE};
use std::collections::BTreeMap;

/// Key of a node within its tile.
///
/// `level` is the node's Merkle level minus the tile's base level, `index`
/// the node's position within its row of the tile.
#[inline]
pub const fn tile_node_key(level: u64, index: u64) -> u64 {
    level * TILE_WIDTH + index
}

/// An 8-level subtree of the log, holding the hashes of all its complete
/// nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tile {
    nodes: BTreeMap<u64, Hash>,
}

impl Tile {
    /// Builds the tile whose bottom row is `hashes`, computing every
    /// complete internal node above it.
    ///
    /// `hashes` holds between 1 and 256 entries: the tile's leaf row,
    /// truncated at the log frontier for a partial tile. A node is included
    /// at level `l` only when all `2^l` bottom-row hashes below it are
    /// present. Rows outside `[1, 256]` are rejected with
    /// [`LogError::Malformed`]: no addressable tile covers zero leaves, so
    /// an empty tile could not survive its own wire format.
    pub fn from_row_hashes<H: TreeHasher>(hasher: &H, hashes: &[Hash]) -> Result<Self> {
        if hashes.is_empty() || hashes.len() as u64 > TILE_WIDTH {
            return Err(LogError::Malformed {
                what: "tile",
                reason: format!("{} hashes cannot form a tile row", hashes.len()),
            });
        }

        let mut nodes = BTreeMap::new();
        let mut row = hashes.to_vec();
        let mut level = 0;
        loop {
            for (i, h) in row.iter().enumerate() {
                nodes.insert(tile_node_key(level, i as u64), *h);
            }
            level += 1;
            if level >= TILE_HEIGHT || row.len() < 2 {
                break;
            }
            // The odd tail, if any, has no complete parent and is dropped.
            row = row
                .chunks_exact(2)
                .map(|pair| hasher.hash_children(&pair[0], &pair[1]))
                .collect();
        }
        Ok(Self { nodes })
    }

    /// Hash of the node with the given in-tile key, if the tile contains it.
    pub fn node(&self, key: u64) -> Option<&Hash> {
        self.nodes.get(&key)
    }

    /// Number of bottom-row entries the tile covers.
    pub fn num_leaves(&self) -> u64 {
        self.nodes.range(..TILE_WIDTH).count() as u64
    }

    /// Total number of node records in the tile.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tile holds no records.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serializes the tile into its wire format. Records are emitted in
    /// ascending key order with minimal lowercase hex keys, so parsing and
    /// re-serializing is the identity on canonical input.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        for (key, hash) in &self.nodes {
            out.push_str(&format!("{:x} {}\n", key, hex::encode(hash)));
        }
        out.into_bytes()
    }

    /// Parses a tile from its wire format.
    ///
    /// Rejects empty input, unterminated final records, duplicate keys,
    /// out-of-range keys, and any line that is not exactly
    /// `<lowercase hex key> <64 lowercase hex digits>`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let malformed = |reason: String| LogError::Malformed {
            what: "tile",
            reason,
        };

        let text = std::str::from_utf8(data).map_err(|e| malformed(e.to_string()))?;
        let body = text
            .strip_suffix('\n')
            .ok_or_else(|| malformed("missing trailing newline".into()))?;
        if body.is_empty() {
            return Err(malformed("tile has no records".into()));
        }

        let mut nodes = BTreeMap::new();
        for line in body.split('\n') {
            let (key_hex, hash_hex) = line
                .split_once(' ')
                .ok_or_else(|| malformed(format!("unparseable record {line:?}")))?;
            if !is_lower_hex(key_hex) || !is_lower_hex(hash_hex) {
                return Err(malformed(format!("non-canonical hex in {line:?}")));
            }
            let key = u64::from_str_radix(key_hex, 16).map_err(|e| malformed(e.to_string()))?;
            if key >= MAX_TILE_NODE_KEY {
                return Err(malformed(format!("node key {key} out of range")));
            }
            let bytes = hex::decode(hash_hex).map_err(|e| malformed(e.to_string()))?;
            let hash: Hash = bytes
                .try_into()
                .map_err(|_| malformed(format!("hash is not {HASH_SIZE} bytes")))?;
            if nodes.insert(key, hash).is_some() {
                return Err(malformed(format!("duplicate node key {key}")));
            }
        }
        Ok(Self { nodes })
    }
}

fn is_lower_hex(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::Rfc6962Hasher;

    fn leaf_hashes(n: usize) -> Vec<Hash> {
        (0..n)
            .map(|i| Rfc6962Hasher.hash_leaf(format!("leaf-{i}").as_bytes()))
            .collect()
    }

    /// A tile over `k` bottom-row hashes must hold node `(l, i)` exactly
    /// when `(i + 1) * 2^l <= k`.
    #[test]
    fn test_complete_node_population() {
        for k in [1usize, 2, 3, 44, 255, 256] {
            let tile = Tile::from_row_hashes(&Rfc6962Hasher, &leaf_hashes(k)).unwrap();
            let want: usize = (0..TILE_HEIGHT).map(|l| k >> l).sum();
            assert_eq!(tile.len(), want, "node count for k={k}");
            assert_eq!(tile.num_leaves(), k as u64);

            for level in 0..TILE_HEIGHT {
                for index in 0..TILE_WIDTH {
                    let present = tile.node(tile_node_key(level, index)).is_some();
                    let complete = (index + 1) << level <= k as u64;
                    assert_eq!(present, complete, "k={k} level={level} index={index}");
                }
            }
        }
    }

    #[test]
    fn test_internal_nodes_hash_children() {
        let leaves = leaf_hashes(4);
        let tile = Tile::from_row_hashes(&Rfc6962Hasher, &leaves).unwrap();

        let n01 = Rfc6962Hasher.hash_children(&leaves[0], &leaves[1]);
        let n23 = Rfc6962Hasher.hash_children(&leaves[2], &leaves[3]);
        assert_eq!(tile.node(tile_node_key(1, 0)), Some(&n01));
        assert_eq!(tile.node(tile_node_key(1, 1)), Some(&n23));
        assert_eq!(
            tile.node(tile_node_key(2, 0)),
            Some(&Rfc6962Hasher.hash_children(&n01, &n23))
        );
    }

    #[test]
    fn test_round_trip() {
        for k in [1usize, 2, 44, 256] {
            let tile = Tile::from_row_hashes(&Rfc6962Hasher, &leaf_hashes(k)).unwrap();
            let bytes = tile.to_bytes();
            let parsed = Tile::from_bytes(&bytes).unwrap();
            assert_eq!(parsed, tile);
            assert_eq!(parsed.to_bytes(), bytes);
        }
    }

    #[test]
    fn test_rejects_bad_row_sizes() {
        assert!(Tile::from_row_hashes(&Rfc6962Hasher, &[]).is_err());
        assert!(Tile::from_row_hashes(&Rfc6962Hasher, &leaf_hashes(257)).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let good = format!("0 {}\n", "ab".repeat(32));
        assert!(Tile::from_bytes(good.as_bytes()).is_ok());

        let cases: Vec<String> = vec![
            String::new(),                                        // empty
            format!("0 {}", "ab".repeat(32)),                     // no trailing newline
            format!("0 {}\n0 {}\n", "ab".repeat(32), "cd".repeat(32)), // duplicate key
            format!("0{}\n", "ab".repeat(32)),                    // no separator
            format!("0 {}\n", "ab".repeat(31)),                   // short hash
            format!("0 {}\n", "zz".repeat(32)),                   // not hex
            format!("0 {}\n", "AB".repeat(32)),                   // uppercase hex
            format!("800 {}\n", "ab".repeat(32)),                 // key out of range
            format!("0 {} extra\n", "ab".repeat(32)),             // trailing field
        ];
        for case in cases {
            assert!(
                Tile::from_bytes(case.as_bytes()).is_err(),
                "accepted {case:?}"
            );
        }
    }

    #[test]
    fn test_round_trip_random_hashes() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0x7116);
        for k in [7usize, 100, 256] {
            let hashes: Vec<Hash> = (0..k).map(|_| rng.gen()).collect();
            let tile = Tile::from_row_hashes(&Rfc6962Hasher, &hashes).unwrap();
            assert_eq!(Tile::from_bytes(&tile.to_bytes()).unwrap(), tile);
        }
    }

    #[test]
    fn test_parse_accepts_unsorted_and_normalizes() {
        let a = "11".repeat(32);
        let b = "22".repeat(32);
        let unsorted = format!("1 {b}\n0 {a}\n");
        let tile = Tile::from_bytes(unsorted.as_bytes()).unwrap();
        assert_eq!(
            String::from_utf8(tile.to_bytes()).unwrap(),
            format!("0 {a}\n1 {b}\n")
        );
    }
}
