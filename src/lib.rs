#![doc = include_str!("../README.md")]

pub mod checkpoint;
pub mod compact;
pub mod constant;
pub mod error;
pub mod hasher;
pub mod layout;
pub mod mem_store;
pub mod proof;
pub mod tile;
pub mod tracker;
pub mod traits;
pub mod types;

pub use checkpoint::{Checkpoint, Signature};
pub use compact::{range_nodes, CompactRange};
pub use error::{LogError, Result};
pub use hasher::{Rfc6962Hasher, TreeHasher};
pub use mem_store::{LogWriter, MemStore};
pub use proof::{verify_consistency, verify_inclusion, NodeCache, ProofBuilder};
pub use tile::Tile;
pub use tracker::{fetch_checkpoint, lookup_index, LogStateTracker};
pub use traits::{FetchError, Fetcher};
pub use types::{Hash, NodeId, TileKey};
