//! In-memory storage backend for a tiled log.
//!
//! This module provides [`MemStore`], a simple in-memory byte namespace
//! that implements the [`Fetcher`] trait, and [`LogWriter`], which
//! materializes a log into any such namespace: tiles, leaf-index files,
//! sequence files and the checkpoint, at exactly the paths clients derive
//! through [`crate::layout`].
//!
//! # Note
//!
//! `MemStore` is **not** part of the verifiable-log core. It is merely a
//! storage backend standing in for whatever byte-addressed transport a
//! deployment uses (filesystem, HTTP, object storage). The client core
//! only ever reads through [`Fetcher`] and never writes; all writing here
//! belongs to `LogWriter`, which plays the role of the log operator.
//!
//! # Usage
//!
//! `MemStore` and `LogWriter` are primarily intended for:
//! - Unit testing and integration testing, where tests need to publish a
//!   log, grow it, and deliberately corrupt it
//! - Development and debugging without a real transport
//! - Serving as a reference for the resources a production storage
//!   backend must produce, byte for byte
//!
//! For anything beyond a proof of concept, put a real transport behind
//! [`Fetcher`] and a real sequencer behind the writing side.
//!
//! # Thread Safety
//!
//! `MemStore` reads and writes are thread-safe through [`RwLock`]
//! interior mutability, which also keeps the fetch side `&self` like any
//! other transport. `LogWriter` is a plain single-owner value; it has no
//! locking and is not meant to be shared.

use crate::checkpoint::Checkpoint;
use crate::compact::{range_nodes, CompactRange};
use crate::constant::{TILE_HEIGHT, TILE_WIDTH};
use crate::error::Result;
use crate::hasher::TreeHasher;
use crate::layout::{checkpoint_path, leaf_path, seq_path, tile_path};
use crate::tile::Tile;
use crate::traits::{FetchError, Fetcher};
use crate::types::{Hash, TileKey};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// An in-memory byte namespace.
///
/// `MemStore` maps storage paths to byte blobs, nothing more; it has no
/// idea which entries are tiles and which are checkpoints. Reads go
/// through [`Fetcher`] so the store can be handed to any client-side
/// component, while writes are plain method calls so tests can publish,
/// grow, and tamper with a log freely.
///
/// # Implemented Traits
///
/// - [`Fetcher`]: read access for the client core, with absent paths
///   reported as [`FetchError::NotFound`]. The impl also exists for
///   `&MemStore`, so a test can lend the store to a tracker and keep
///   mutating it.
///
/// # Thread Safety
///
/// All access is guarded by a single [`RwLock`], allowing concurrent
/// readers or one writer. Lock poisoning is treated as a test-harness
/// bug and surfaces as a panic.
#[derive(Debug, Default)]
pub struct MemStore {
    /// Path to content mapping.
    ///
    /// A [`BTreeMap`] keeps [`MemStore::entries`] deterministic, which
    /// tests rely on when copying one store's state over another's.
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` at `path`, replacing any previous content.
    ///
    /// Real log storage never rewrites a published resource; tests use
    /// replacement deliberately, to simulate tampering and forked logs.
    pub fn put(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files
            .write()
            .expect("store lock poisoned")
            .insert(path.into(), bytes.into());
    }

    /// Returns the content at `path`, if any.
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files
            .read()
            .expect("store lock poisoned")
            .get(path)
            .cloned()
    }

    /// Removes the content at `path`, returning it if it was present.
    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.files
            .write()
            .expect("store lock poisoned")
            .remove(path)
    }

    /// Snapshot of every stored path and its content, in path order.
    pub fn entries(&self) -> Vec<(String, Vec<u8>)> {
        self.files
            .read()
            .expect("store lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl Fetcher for MemStore {
    fn fetch(&self, path: &str) -> std::result::Result<Vec<u8>, FetchError> {
        self.get(path).ok_or(FetchError::NotFound)
    }
}

impl Fetcher for &MemStore {
    fn fetch(&self, path: &str) -> std::result::Result<Vec<u8>, FetchError> {
        (**self).fetch(path)
    }
}

/// Builds and publishes a tiled log.
///
/// A `LogWriter` owns the log's origin string and its full leaf list.
/// [`LogWriter::append`] assigns sequence numbers; [`LogWriter::publish`]
/// derives the complete storage state of the current tree and writes it
/// into a [`MemStore`]:
///
/// 1. **Entries**: each leaf's bytes under its seq path, and each leaf
///    hash's sequence number (lowercase hex) under its leaf-index path
/// 2. **Tiles**: every complete node, cut into full tiles at full paths
///    and frontier tiles at partial paths
/// 3. **Checkpoint**: the root hash folded from the tree's compact range
///
/// # Growth Semantics
///
/// The writer recomputes everything from the leaf list on every publish.
/// Resources whose paths are stable (complete tiles, entries) are
/// overwritten with identical bytes; frontier tiles land at new partial
/// paths, and the superseded partials stay behind, matching how a real
/// log's immutable storage accretes. Nothing is garbage collected.
///
/// # Note
///
/// This is deliberately proof-of-concept grade: rebuilding each row of
/// hashes on every publish is quadratic over the log's life, which is
/// fine for the log sizes tests use and keeps the derivation obvious. A
/// production sequencer integrates incrementally instead.
pub struct LogWriter<H: TreeHasher> {
    /// Identifier of the log, copied into every published checkpoint.
    origin: String,
    /// Hashing capability used for leaves, internal nodes, and the root.
    hasher: H,
    /// Every leaf appended so far, in sequence order.
    leaves: Vec<Vec<u8>>,
}

impl<H: TreeHasher> LogWriter<H> {
    /// Creates a writer for a log identified by `origin`.
    pub fn new(origin: impl Into<String>, hasher: H) -> Self {
        Self {
            origin: origin.into(),
            hasher,
            leaves: Vec::new(),
        }
    }

    /// Appends a leaf and returns its sequence number.
    ///
    /// The leaf is only recorded in the writer; nothing is visible to
    /// clients until the next [`LogWriter::publish`].
    pub fn append(&mut self, leaf: impl Into<Vec<u8>>) -> u64 {
        self.leaves.push(leaf.into());
        self.leaves.len() as u64 - 1
    }

    /// Current number of leaves.
    pub fn size(&self) -> u64 {
        self.leaves.len() as u64
    }

    /// Writes every derived resource of the current tree into `store` and
    /// returns the published checkpoint.
    pub fn publish(&self, store: &MemStore) -> Result<Checkpoint> {
        let size = self.leaves.len() as u64;

        // Row l holds the hashes of all complete nodes at Merkle level l;
        // odd tails have no complete parent and stop propagating.
        let mut rows: Vec<Vec<Hash>> = Vec::new();
        rows.push(self.leaves.iter().map(|l| self.hasher.hash_leaf(l)).collect());
        loop {
            let prev = rows.last().expect("at least the leaf row");
            if prev.len() < 2 {
                break;
            }
            let next: Vec<Hash> = prev
                .chunks_exact(2)
                .map(|pair| self.hasher.hash_children(&pair[0], &pair[1]))
                .collect();
            rows.push(next);
        }

        for (seq, leaf) in self.leaves.iter().enumerate() {
            store.put(seq_path("", seq as u64), leaf.clone());
            store.put(
                leaf_path("", &rows[0][seq]),
                format!("{seq:x}").into_bytes(),
            );
        }

        // Rows 0, 8, 16, ... are the bottom rows of tile levels 0, 1, 2,
        // and cut into one tile per 256 entries.
        let mut tile_level = 0u64;
        while let Some(row) = rows.get((tile_level * TILE_HEIGHT) as usize) {
            if row.is_empty() {
                break;
            }
            for (i, chunk) in row.chunks(TILE_WIDTH as usize).enumerate() {
                let tile = Tile::from_row_hashes(&self.hasher, chunk)?;
                let partial = if chunk.len() == TILE_WIDTH as usize {
                    0
                } else {
                    chunk.len() as u64
                };
                let key = TileKey::new(tile_level, i as u64);
                store.put(tile_path("", key, partial), tile.to_bytes());
            }
            tile_level += 1;
        }

        let ids = range_nodes(size);
        let hashes: Vec<Hash> = ids
            .iter()
            .map(|id| rows[id.level as usize][id.index as usize])
            .collect();
        let root = CompactRange::new(size, hashes)?.root_hash(&self.hasher, |_, _| {});

        let checkpoint = Checkpoint {
            origin: self.origin.clone(),
            size,
            hash: root,
            signatures: Vec::new(),
        };
        store.put(checkpoint_path(""), checkpoint.marshal());
        Ok(checkpoint)
    }
}
