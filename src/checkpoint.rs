//! Checkpoints: signed commitments to a log's size and root hash.
//!
//! The wire format is line oriented UTF-8 with LF endings: the origin
//! string, the tree size in decimal, the base64 root hash, a mandatory
//! blank line, then zero or more signature lines. The core parses and
//! round-trips signatures but delegates their verification to the
//! transport layer.

use crate::constant::SIGNATURE_LINE_PREFIX;
use crate::error::{LogError, Result};
use crate::types::{Hash, HASH_SIZE};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// A named signature over the checkpoint body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Identity of the signer, as published by the log.
    pub name: String,
    /// Opaque signature bytes.
    pub signature: Vec<u8>,
}

/// A log checkpoint: the log's origin, its size, and the root hash
/// committing to its first `size` leaves.
///
/// Two valid checkpoints of the same log are related by a consistency
/// proof: the larger tree must be an append-only extension of the smaller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique identifier of the log this checkpoint belongs to.
    pub origin: String,
    /// Number of leaves in the committed tree.
    pub size: u64,
    /// Root hash over the first `size` leaves.
    pub hash: Hash,
    /// Signatures over the checkpoint body.
    pub signatures: Vec<Signature>,
}

impl Checkpoint {
    /// Serializes the checkpoint into its wire format.
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = format!(
            "{}\n{}\n{}\n\n",
            self.origin,
            self.size,
            BASE64.encode(self.hash)
        );
        for sig in &self.signatures {
            out.push_str(&format!(
                "{SIGNATURE_LINE_PREFIX}{} {}\n",
                sig.name,
                BASE64.encode(&sig.signature)
            ));
        }
        out.into_bytes()
    }

    /// Parses a checkpoint from its wire format.
    ///
    /// The blank line after the root hash is mandatory and anything after
    /// it that is not a well-formed signature line is rejected.
    pub fn unmarshal(data: &[u8]) -> Result<Self> {
        let malformed = |reason: String| LogError::Malformed {
            what: "checkpoint",
            reason,
        };

        let text = std::str::from_utf8(data).map_err(|e| malformed(e.to_string()))?;
        let body = text
            .strip_suffix('\n')
            .ok_or_else(|| malformed("missing trailing newline".into()))?;
        let lines: Vec<&str> = body.split('\n').collect();
        if lines.len() < 4 {
            return Err(malformed(format!(
                "expected at least 4 lines, got {}",
                lines.len()
            )));
        }

        let origin = lines[0];
        if origin.is_empty() {
            return Err(malformed("empty origin".into()));
        }

        if lines[1].is_empty() || !lines[1].bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed(format!("invalid tree size {:?}", lines[1])));
        }
        let size: u64 = lines[1]
            .parse()
            .map_err(|e| malformed(format!("invalid tree size: {e}")))?;

        let hash_bytes = BASE64
            .decode(lines[2])
            .map_err(|e| malformed(format!("invalid root hash: {e}")))?;
        let hash: Hash = hash_bytes
            .try_into()
            .map_err(|_| malformed(format!("root hash is not {HASH_SIZE} bytes")))?;

        if !lines[3].is_empty() {
            return Err(malformed("missing blank line after root hash".into()));
        }

        let mut signatures = Vec::new();
        for line in &lines[4..] {
            let rest = line
                .strip_prefix(SIGNATURE_LINE_PREFIX)
                .ok_or_else(|| malformed(format!("trailing data {line:?}")))?;
            let (name, sig_b64) = rest
                .split_once(' ')
                .ok_or_else(|| malformed(format!("unparseable signature line {line:?}")))?;
            if name.is_empty() || sig_b64.is_empty() {
                return Err(malformed(format!("unparseable signature line {line:?}")));
            }
            let signature = BASE64
                .decode(sig_b64)
                .map_err(|e| malformed(format!("invalid signature encoding: {e}")))?;
            signatures.push(Signature {
                name: name.to_string(),
                signature,
            });
        }

        Ok(Self {
            origin: origin.to_string(),
            size,
            hash,
            signatures,
        })
    }
}
