//! Client-side tracking of a log's state.
//!
//! A [`LogStateTracker`] maintains the latest checkpoint it has proven
//! consistent with every checkpoint it has seen before. Updates that fail
//! verification leave the trusted state untouched and return errors that
//! carry the raw bytes of both checkpoints, which are sufficient to prove
//! the log's misbehavior to any third party.

use crate::checkpoint::Checkpoint;
use crate::constant::CHECKPOINT_PATH;
use crate::error::{LogError, Result};
use crate::hasher::TreeHasher;
use crate::layout::leaf_path;
use crate::proof::builder::ProofBuilder;
use crate::proof::verifier::verify_consistency;
use crate::traits::{FetchError, Fetcher};
use crate::types::Hash;
use tracing::debug;

fn fetch(fetcher: &impl Fetcher, path: &str) -> Result<Vec<u8>> {
    fetcher.fetch(path).map_err(|e| match e {
        FetchError::NotFound => LogError::NotFound { path: path.into() },
        FetchError::Cancelled => LogError::Cancelled,
        FetchError::Transport(reason) => LogError::Transport {
            path: path.into(),
            reason,
        },
    })
}

/// Fetches and parses the log's current checkpoint, returning it together
/// with its raw bytes.
pub fn fetch_checkpoint<F: Fetcher>(fetcher: &F) -> Result<(Checkpoint, Vec<u8>)> {
    let raw = fetch(fetcher, CHECKPOINT_PATH)?;
    let cp = Checkpoint::unmarshal(&raw)?;
    Ok((cp, raw))
}

/// Resolves a leaf hash to its sequence number via the log's leaf-index
/// files. Returns [`LogError::NotFound`] for leaves the log does not know.
pub fn lookup_index<F: Fetcher>(fetcher: &F, leaf_hash: &Hash) -> Result<u64> {
    let path = leaf_path("", leaf_hash);
    let raw = fetch(fetcher, &path)?;
    let text = std::str::from_utf8(&raw).map_err(|e| LogError::Malformed {
        what: "leaf index",
        reason: e.to_string(),
    })?;
    u64::from_str_radix(text.trim_end_matches('\n'), 16).map_err(|e| LogError::Malformed {
        what: "leaf index",
        reason: format!("invalid sequence number {text:?}: {e}"),
    })
}

/// A monotone, proven-consistent client view of one log.
///
/// The tracker owns its fetcher and hasher; concurrent `update` calls on
/// one tracker are not supported, but independent trackers may run in
/// parallel against the same log.
pub struct LogStateTracker<H: TreeHasher, F: Fetcher> {
    fetcher: F,
    hasher: H,
    latest: Checkpoint,
    latest_raw: Vec<u8>,
}

impl<H: TreeHasher, F: Fetcher> LogStateTracker<H, F> {
    /// Creates a tracker.
    ///
    /// When `initial_raw` is given it is parsed and adopted without
    /// verification; the caller vouches for the pinned state. Otherwise the
    /// log's current checkpoint is fetched and adopted as the baseline.
    pub fn new(fetcher: F, hasher: H, initial_raw: Option<&[u8]>) -> Result<Self> {
        let mut tracker = Self {
            fetcher,
            hasher,
            latest: Checkpoint::default(),
            latest_raw: Vec::new(),
        };
        match initial_raw {
            Some(raw) => {
                tracker.latest = Checkpoint::unmarshal(raw)?;
                tracker.latest_raw = raw.to_vec();
            }
            None => tracker.update()?,
        }
        Ok(tracker)
    }

    /// The latest proven-consistent checkpoint.
    pub fn latest(&self) -> &Checkpoint {
        &self.latest
    }

    /// Raw bytes of the latest proven-consistent checkpoint.
    pub fn latest_raw(&self) -> &[u8] {
        &self.latest_raw
    }

    /// Discards the tracked state and adopts `raw` without verification.
    /// This is the only way the tracked size can go backwards.
    pub fn reset(&mut self, raw: &[u8]) -> Result<()> {
        self.latest = Checkpoint::unmarshal(raw)?;
        self.latest_raw = raw.to_vec();
        Ok(())
    }

    /// Fetches the log's current checkpoint and advances the tracked state
    /// to it, if and only if it proves consistent with the current state.
    ///
    /// A shrunk log yields [`LogError::Regression`], a same-size checkpoint
    /// with a different root [`LogError::Fork`], and a failed consistency
    /// proof [`LogError::Inconsistency`]; in every such case the previously
    /// trusted state is retained and the error carries the evidence.
    pub fn update(&mut self) -> Result<()> {
        let (candidate, candidate_raw) = fetch_checkpoint(&self.fetcher)?;
        debug!(
            tracked = self.latest.size,
            candidate = candidate.size,
            "checking fetched checkpoint"
        );

        if self.latest.size == 0 {
            // Nothing is trusted yet; adopt the first thing we see.
            self.latest = candidate;
            self.latest_raw = candidate_raw;
            return Ok(());
        }

        if candidate.size < self.latest.size {
            return Err(LogError::Regression {
                latest_raw: self.latest_raw.clone(),
                candidate_raw,
            });
        }
        if candidate.size == self.latest.size {
            if candidate.hash == self.latest.hash {
                return Ok(());
            }
            return Err(LogError::Fork {
                latest_raw: self.latest_raw.clone(),
                candidate_raw,
            });
        }

        let mut builder = ProofBuilder::new(candidate.clone(), &self.hasher, &self.fetcher)?;
        let proof = builder.consistency_proof(self.latest.size, candidate.size)?;
        verify_consistency(
            &self.hasher,
            self.latest.size,
            candidate.size,
            &self.latest.hash,
            &candidate.hash,
            &proof,
        )
        .map_err(|cause| LogError::Inconsistency {
            smaller_raw: self.latest_raw.clone(),
            larger_raw: candidate_raw.clone(),
            proof: proof.clone(),
            cause: Box::new(cause),
        })?;

        debug!(from = self.latest.size, to = candidate.size, "advancing tracked state");
        self.latest = candidate;
        self.latest_raw = candidate_raw;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::Rfc6962Hasher;
    use crate::mem_store::{LogWriter, MemStore};

    fn writer_with(n: usize) -> LogWriter<Rfc6962Hasher> {
        let mut writer = LogWriter::new("example.com/log", Rfc6962Hasher);
        for i in 0..n {
            writer.append(format!("entry-{i}").into_bytes());
        }
        writer
    }

    #[test]
    fn test_new_without_pin_fetches() {
        let store = MemStore::new();
        writer_with(5).publish(&store).unwrap();

        let tracker = LogStateTracker::new(&store, Rfc6962Hasher, None).unwrap();
        assert_eq!(tracker.latest().size, 5);
        assert!(!tracker.latest_raw().is_empty());
    }

    #[test]
    fn test_new_with_pin_adopts_unverified() {
        let store = MemStore::new();
        let pinned = Checkpoint {
            origin: "example.com/log".into(),
            size: 3,
            hash: [9; 32],
            signatures: vec![],
        }
        .marshal();

        let tracker = LogStateTracker::new(&store, Rfc6962Hasher, Some(&pinned)).unwrap();
        assert_eq!(tracker.latest().size, 3);
        assert_eq!(tracker.latest_raw(), &pinned[..]);
    }

    /// Seed at size 5, grow the log to 12; the update proves consistency
    /// before advancing.
    #[test]
    fn test_grow_and_prove() {
        let store = MemStore::new();
        let mut writer = writer_with(5);
        writer.publish(&store).unwrap();

        let mut tracker = LogStateTracker::new(&store, Rfc6962Hasher, None).unwrap();
        assert_eq!(tracker.latest().size, 5);

        for i in 5..12 {
            writer.append(format!("entry-{i}").into_bytes());
        }
        writer.publish(&store).unwrap();

        tracker.update().unwrap();
        assert_eq!(tracker.latest().size, 12);
    }

    #[test]
    fn test_same_checkpoint_is_a_no_op() {
        let store = MemStore::new();
        writer_with(7).publish(&store).unwrap();

        let mut tracker = LogStateTracker::new(&store, Rfc6962Hasher, None).unwrap();
        let raw = tracker.latest_raw().to_vec();
        tracker.update().unwrap();
        assert_eq!(tracker.latest_raw(), &raw[..]);
    }

    #[test]
    fn test_regression_detected() {
        let store = MemStore::new();
        writer_with(9).publish(&store).unwrap();
        let mut tracker = LogStateTracker::new(&store, Rfc6962Hasher, None).unwrap();

        // The log re-publishes an older, smaller checkpoint.
        let small_store = MemStore::new();
        writer_with(4).publish(&small_store).unwrap();
        store.put("checkpoint", small_store.get("checkpoint").unwrap());

        let err = tracker.update().unwrap_err();
        match err {
            LogError::Regression {
                latest_raw,
                candidate_raw,
            } => {
                assert_eq!(Checkpoint::unmarshal(&latest_raw).unwrap().size, 9);
                assert_eq!(Checkpoint::unmarshal(&candidate_raw).unwrap().size, 4);
            }
            other => panic!("expected Regression, got {other:?}"),
        }
        assert_eq!(tracker.latest().size, 9);
    }

    #[test]
    fn test_fork_detected() {
        let store = MemStore::new();
        writer_with(6).publish(&store).unwrap();
        let mut tracker = LogStateTracker::new(&store, Rfc6962Hasher, None).unwrap();

        // Same size, different content.
        let fork_store = MemStore::new();
        let mut fork_writer = LogWriter::new("example.com/log", Rfc6962Hasher);
        for i in 0..6 {
            fork_writer.append(format!("forged-{i}").into_bytes());
        }
        fork_writer.publish(&fork_store).unwrap();
        store.put("checkpoint", fork_store.get("checkpoint").unwrap());

        let err = tracker.update().unwrap_err();
        assert!(matches!(err, LogError::Fork { .. }));
        assert_eq!(tracker.latest().size, 6);
    }

    /// Two logs that diverge at a leaf: the bigger one cannot prove itself
    /// an extension of the smaller, and the evidence is retained.
    #[test]
    fn test_inconsistency_carries_evidence() {
        let store = MemStore::new();
        writer_with(5).publish(&store).unwrap();
        let mut tracker = LogStateTracker::new(&store, Rfc6962Hasher, None).unwrap();
        let trusted_raw = tracker.latest_raw().to_vec();

        // A divergent log that never contained our entries grows to 12 and
        // overwrites the published state wholesale.
        let evil = MemStore::new();
        let mut evil_writer = LogWriter::new("example.com/log", Rfc6962Hasher);
        for i in 0..12 {
            evil_writer.append(format!("rewritten-{i}").into_bytes());
        }
        evil_writer.publish(&evil).unwrap();
        for (path, bytes) in evil.entries() {
            store.put(&path, bytes);
        }

        let err = tracker.update().unwrap_err();
        match err {
            LogError::Inconsistency {
                smaller_raw,
                larger_raw,
                proof,
                cause,
            } => {
                assert_eq!(smaller_raw, trusted_raw);
                assert_eq!(Checkpoint::unmarshal(&larger_raw).unwrap().size, 12);
                assert!(!proof.is_empty());
                assert!(matches!(*cause, LogError::InvalidProof(_)));
            }
            other => panic!("expected Inconsistency, got {other:?}"),
        }
        // The previously trusted state survives.
        assert_eq!(tracker.latest().size, 5);
        assert_eq!(tracker.latest_raw(), &trusted_raw[..]);
    }

    #[test]
    fn test_reset_goes_backwards_explicitly() {
        let store = MemStore::new();
        writer_with(8).publish(&store).unwrap();
        let mut tracker = LogStateTracker::new(&store, Rfc6962Hasher, None).unwrap();

        let pinned = Checkpoint {
            origin: "example.com/log".into(),
            size: 2,
            hash: [1; 32],
            signatures: vec![],
        }
        .marshal();
        tracker.reset(&pinned).unwrap();
        assert_eq!(tracker.latest().size, 2);
    }

    #[test]
    fn test_lookup_index() {
        let store = MemStore::new();
        writer_with(30).publish(&store).unwrap();

        let leaf_hash = Rfc6962Hasher.hash_leaf(b"entry-17");
        assert_eq!(lookup_index(&store, &leaf_hash).unwrap(), 17);

        let unknown = Rfc6962Hasher.hash_leaf(b"never-appended");
        assert!(matches!(
            lookup_index(&store, &unknown),
            Err(LogError::NotFound { .. })
        ));
    }
}
