//! The transport capability the log core is parameterized over.

use thiserror::Error;

/// Failure modes a fetcher can report.
///
/// `NotFound` is a normal occurrence during log growth (partial tiles come
/// and go); the node cache knows how to recover from it. Everything else
/// propagates to the caller unmodified.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No resource exists at the path.
    #[error("resource not found")]
    NotFound,
    /// The host cancelled the operation.
    #[error("fetch cancelled")]
    Cancelled,
    /// Any other transport failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Retrieves raw bytes from a log's storage.
///
/// Paths are relative to the root of the log storage and are computed by
/// [`crate::layout`]; the mechanism behind them is opaque to the core and
/// may be a filesystem, HTTP, object storage, or anything else
/// byte-addressable. Implementations block until the bytes are available or
/// the fetch fails; this is the only point where the core performs I/O or
/// can observe cancellation.
pub trait Fetcher {
    /// Fetches the resource at `path`.
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct MapFetcher(BTreeMap<String, Vec<u8>>);

    impl Fetcher for MapFetcher {
        fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
            self.0.get(path).cloned().ok_or(FetchError::NotFound)
        }
    }

    #[test]
    fn test_fetcher_boundary() {
        let fetcher = MapFetcher([("checkpoint".to_string(), b"bytes".to_vec())].into());
        assert_eq!(fetcher.fetch("checkpoint").unwrap(), b"bytes");
        assert!(matches!(fetcher.fetch("missing"), Err(FetchError::NotFound)));
    }
}
