//! Proof assembly from tiles.
//!
//! Tiles commit only to immutable, complete nodes, so building a proof is
//! more than a lookup exercise: proofs can reference ephemeral
//! right-frontier nodes that no tile stores. The [`ProofBuilder`] deals
//! with this by folding the log's compact range once at construction time,
//! which both validates the checkpoint against the tiles and caches every
//! ephemeral node a proof could need.

use crate::checkpoint::Checkpoint;
use crate::compact::{range_nodes, CompactRange};
use crate::error::{LogError, Result};
use crate::hasher::TreeHasher;
use crate::layout::{partial_tile_size, tile_address, tile_path};
use crate::proof::nodes::{consistency_nodes, inclusion_nodes};
use crate::tile::{tile_node_key, Tile};
use crate::traits::{FetchError, Fetcher};
use crate::types::{Hash, NodeId, TileKey};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// Resolves Merkle node IDs to hashes, hiding the tile abstraction.
///
/// Fetched tiles are memoized, and an overlay of ephemeral nodes is
/// consulted before any tile. Not safe for concurrent use; a cache lives
/// and dies with a single proof-building session.
#[derive(Debug)]
pub struct NodeCache<'f, F: Fetcher> {
    fetcher: &'f F,
    ephemeral: FxHashMap<NodeId, Hash>,
    tiles: FxHashMap<TileKey, Tile>,
}

impl<'f, F: Fetcher> NodeCache<'f, F> {
    /// Creates an empty cache reading tiles through `fetcher`.
    pub fn new(fetcher: &'f F) -> Self {
        Self {
            fetcher,
            ephemeral: FxHashMap::default(),
            tiles: FxHashMap::default(),
        }
    }

    /// Records a derived ephemeral node, overwriting any previous value.
    pub fn set_ephemeral_node(&mut self, id: NodeId, hash: Hash) {
        self.ephemeral.insert(id, hash);
    }

    /// Returns the hash of node `id` in a tree of `log_size` leaves.
    ///
    /// Ephemeral nodes are served from the overlay; everything else comes
    /// from the tile containing the node, fetched on first use.
    pub fn get_node(&mut self, id: NodeId, log_size: u64) -> Result<Hash> {
        if let Some(h) = self.ephemeral.get(&id) {
            return Ok(*h);
        }

        let (tile, node_level, node_index) = tile_address(id);
        if !self.tiles.contains_key(&tile) {
            let fetched = self.fetch_tile(tile, log_size)?;
            self.tiles.insert(tile, fetched);
        }
        self.tiles[&tile]
            .node(tile_node_key(node_level, node_index))
            .copied()
            .ok_or(LogError::NodeMissing { id, tile })
    }

    /// Fetches and parses one tile.
    ///
    /// The full tile is tried first: tiles are immutable and the full form
    /// subsumes every partial form of the same address. If the log has not
    /// grown far enough to complete the tile, the fetch falls back to the
    /// partial size implied by `log_size`.
    fn fetch_tile(&self, tile: TileKey, log_size: u64) -> Result<Tile> {
        let full_path = tile_path("", tile, 0);
        let (path, bytes) = match self.fetcher.fetch(&full_path) {
            Ok(bytes) => (full_path, bytes),
            Err(FetchError::NotFound) => {
                let partial = partial_tile_size(tile, log_size);
                if partial == 0 {
                    return Err(LogError::NotFound { path: full_path });
                }
                let partial_path = tile_path("", tile, partial);
                trace!(tile = %tile, partial, "full tile absent, retrying at partial size");
                let bytes = self
                    .fetcher
                    .fetch(&partial_path)
                    .map_err(|e| fetch_error(e, &partial_path))?;
                (partial_path, bytes)
            }
            Err(e) => return Err(fetch_error(e, &full_path)),
        };

        debug!(tile = %tile, path = %path, bytes = bytes.len(), "fetched tile");
        Tile::from_bytes(&bytes)
    }
}

fn fetch_error(err: FetchError, path: &str) -> LogError {
    match err {
        FetchError::NotFound => LogError::NotFound { path: path.into() },
        FetchError::Cancelled => LogError::Cancelled,
        FetchError::Transport(reason) => LogError::Transport {
            path: path.into(),
            reason,
        },
    }
}

/// Builds inclusion and consistency proofs for one checkpoint, using tiles
/// fetched on demand.
///
/// Construction is self-validating: the compact range of the checkpoint's
/// tree size is read through the tiles and folded into a root, which must
/// equal the checkpoint's claimed root before any proof is issued. A
/// builder can serve any number of proofs at its checkpoint's size, and is
/// not safe for concurrent use.
#[derive(Debug)]
pub struct ProofBuilder<'a, H: TreeHasher, F: Fetcher> {
    checkpoint: Checkpoint,
    hasher: &'a H,
    cache: NodeCache<'a, F>,
}

impl<'a, H: TreeHasher, F: Fetcher> ProofBuilder<'a, H, F> {
    /// Creates a builder for `checkpoint`, validating it against the tiles.
    ///
    /// Fails with [`LogError::InvalidCheckpoint`] when the root derived
    /// from the tiles disagrees with the checkpoint, which means the tiles
    /// and the checkpoint do not describe the same log.
    pub fn new(checkpoint: Checkpoint, hasher: &'a H, fetcher: &'a F) -> Result<Self> {
        let mut cache = NodeCache::new(fetcher);

        let ids = range_nodes(checkpoint.size);
        let mut hashes = Vec::with_capacity(ids.len());
        for id in ids {
            hashes.push(cache.get_node(id, checkpoint.size)?);
        }
        let range = CompactRange::new(checkpoint.size, hashes)?;

        // One fold recomputes the root and caches every ephemeral node
        // proofs at this size can reference.
        let got = range.root_hash(hasher, |id, h| cache.set_ephemeral_node(id, h));
        if got != checkpoint.hash {
            return Err(LogError::InvalidCheckpoint {
                expected: checkpoint.hash,
                got,
            });
        }

        Ok(Self {
            checkpoint,
            hasher,
            cache,
        })
    }

    /// The checkpoint this builder proves against.
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Hashing capability the builder was constructed with.
    pub fn hasher(&self) -> &H {
        self.hasher
    }

    /// Builds the inclusion proof for the leaf at `index`.
    pub fn inclusion_proof(&mut self, index: u64) -> Result<Vec<Hash>> {
        let ids = inclusion_nodes(index, self.checkpoint.size)?;
        self.resolve(&ids)
    }

    /// Builds the consistency proof between trees of `smaller` and
    /// `larger` leaves. Both sizes must be within the builder's tree.
    pub fn consistency_proof(&mut self, smaller: u64, larger: u64) -> Result<Vec<Hash>> {
        if larger > self.checkpoint.size {
            return Err(LogError::InvalidProof(format!(
                "tree size {larger} beyond checkpoint size {}",
                self.checkpoint.size
            )));
        }
        let ids = consistency_nodes(smaller, larger)?;

        // A proof between two historic sizes references frontier nodes of
        // the `larger`-leaf tree, whose hashes differ from those of the
        // same node IDs in the full tree. Synthesize them from the compact
        // range of [0, larger); its constituents are perfect subtrees and
        // therefore materialized in tiles.
        let mut frontier: FxHashMap<NodeId, Hash> = FxHashMap::default();
        if larger < self.checkpoint.size && !ids.is_empty() {
            let range_ids = range_nodes(larger);
            let mut range_hashes = Vec::with_capacity(range_ids.len());
            for id in range_ids {
                range_hashes.push(self.cache.get_node(id, self.checkpoint.size)?);
            }
            CompactRange::new(larger, range_hashes)?.root_hash(self.hasher, |id, h| {
                frontier.insert(id, h);
            });
        }

        let mut hashes = Vec::with_capacity(ids.len());
        for id in ids {
            match frontier.get(&id) {
                Some(h) => hashes.push(*h),
                None => hashes.push(self.cache.get_node(id, self.checkpoint.size)?),
            }
        }
        Ok(hashes)
    }

    fn resolve(&mut self, ids: &[NodeId]) -> Result<Vec<Hash>> {
        let mut hashes = Vec::with_capacity(ids.len());
        for id in ids {
            hashes.push(self.cache.get_node(*id, self.checkpoint.size)?);
        }
        Ok(hashes)
    }
}
