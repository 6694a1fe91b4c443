//! Error type for all log operations.

use crate::types::{Hash, NodeId, TileKey};
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LogError>;

/// Error type for the verifiable-log core.
///
/// The verification-class variants ([`LogError::InvalidCheckpoint`],
/// [`LogError::InvalidProof`], [`LogError::Regression`], [`LogError::Fork`],
/// [`LogError::Inconsistency`]) carry the raw material needed to demonstrate
/// log misbehavior to a third party. They are never retried and never masked.
#[derive(Debug, Error)]
pub enum LogError {
    /// No resource exists at the requested storage path.
    #[error("not found: {path}")]
    NotFound {
        /// Path relative to the log storage root.
        path: String,
    },

    /// A resource was fetched but could not be parsed.
    #[error("malformed {what}: {reason}")]
    Malformed {
        /// Kind of resource that failed to parse.
        what: &'static str,
        /// Parser diagnostic.
        reason: String,
    },

    /// A tile was fetched and parsed but does not contain an expected node,
    /// meaning the tile is corrupt or undersized for the claimed tree.
    #[error("node {id} missing from tile {tile}")]
    NodeMissing {
        /// The node that was requested.
        id: NodeId,
        /// The tile that should have contained it.
        tile: TileKey,
    },

    /// The root hash recomputed from tiles does not match the root hash the
    /// checkpoint claims; tiles and checkpoint are mutually inconsistent.
    #[error("invalid checkpoint: claimed root {}, tiles yield {}", hex::encode(expected), hex::encode(got))]
    InvalidCheckpoint {
        /// Root hash claimed by the checkpoint.
        expected: Hash,
        /// Root hash derived from the fetched tiles.
        got: Hash,
    },

    /// A proof failed verification, or has the wrong shape for the claimed
    /// tree sizes.
    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// The log presented a checkpoint for a smaller tree than one it
    /// previously published.
    #[error("log size regressed from a previously seen checkpoint")]
    Regression {
        /// Raw bytes of the last proven-consistent checkpoint.
        latest_raw: Vec<u8>,
        /// Raw bytes of the offending checkpoint.
        candidate_raw: Vec<u8>,
    },

    /// The log presented a checkpoint for the same tree size as a previous
    /// one but with a different root hash.
    #[error("log presented two different roots for the same tree size")]
    Fork {
        /// Raw bytes of the last proven-consistent checkpoint.
        latest_raw: Vec<u8>,
        /// Raw bytes of the offending checkpoint.
        candidate_raw: Vec<u8>,
    },

    /// A consistency proof between two checkpoints failed to verify. Both
    /// raw checkpoints and the proof are retained as evidence.
    #[error("log consistency check failed: {cause}")]
    Inconsistency {
        /// Raw bytes of the smaller (previously trusted) checkpoint.
        smaller_raw: Vec<u8>,
        /// Raw bytes of the larger (rejected) checkpoint.
        larger_raw: Vec<u8>,
        /// The consistency proof that failed to verify.
        proof: Vec<Hash>,
        /// The underlying verification failure.
        #[source]
        cause: Box<LogError>,
    },

    /// The fetcher failed for a reason other than absence of the resource.
    #[error("transport error fetching {path}: {reason}")]
    Transport {
        /// Path relative to the log storage root.
        path: String,
        /// Fetcher diagnostic.
        reason: String,
    },

    /// The fetcher observed cancellation.
    #[error("operation cancelled")]
    Cancelled,
}

impl LogError {
    /// Whether this error is cryptographic evidence of log misbehavior
    /// rather than an operational failure.
    pub fn is_evidence(&self) -> bool {
        matches!(
            self,
            LogError::InvalidCheckpoint { .. }
                | LogError::InvalidProof(_)
                | LogError::Regression { .. }
                | LogError::Fork { .. }
                | LogError::Inconsistency { .. }
        )
    }
}
