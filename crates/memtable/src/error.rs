use thiserror::Error;

/// Errors shared by every layer of the store.
///
/// "Key not found" and "key deleted here" are not errors — layer-level
/// getters report those through [`Lookup`](crate::Lookup), and the database
/// boundary turns both into a plain `None`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An underlying filesystem or compression-context error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// On-disk bytes that cannot be decoded: truncated headers or payloads,
    /// records overrunning their block, decompression size mismatches.
    #[error("corruption: {0}")]
    Corruption(String),

    /// A well-formed value this build does not understand, e.g. an unknown
    /// block compression flag.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The caller passed something the operation rejects outright, e.g. an
    /// empty key.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The arena could not allocate a backing block.
    #[error("arena allocation failed: {0}")]
    AllocationFailed(&'static str),
}
