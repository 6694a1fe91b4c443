//! Constants that determine the shape of the tiled log.

/// Number of Merkle tree levels spanned by a single tile.
pub const TILE_HEIGHT: u64 = 8;
/// Number of leaves (and fan-out) of a full tile. Always a power of two.
pub const TILE_WIDTH: u64 = 1 << TILE_HEIGHT;
/// Exclusive upper bound on in-tile node keys, see [`crate::tile::tile_node_key`].
pub const MAX_TILE_NODE_KEY: u64 = TILE_HEIGHT * TILE_WIDTH;

/// Domain-separation prefix hashed in front of leaf data.
pub const LEAF_HASH_PREFIX: u8 = 0x00;
/// Domain-separation prefix hashed in front of concatenated child hashes.
pub const NODE_HASH_PREFIX: u8 = 0x01;

/// Location of the checkpoint, relative to the log storage root.
pub const CHECKPOINT_PATH: &str = "checkpoint";

/// Prefix of every signature line in a serialized checkpoint.
pub const SIGNATURE_LINE_PREFIX: &str = "\u{2014} ";
