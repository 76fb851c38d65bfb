use thiserror::Error;

/// Main error type for MedKG
#[derive(Error, Debug)]
pub enum MedkgError {
    /// Malformed input record: missing field, invalid relation type, self-relation.
    /// Skips the offending record; the run continues.
    #[error("Validation error: {0}")]
    Validation(String),

    /// External disambiguation call failed or timed out.
    /// Treated as a "new entity" decision by the resolver, never fatal.
    #[error("Disambiguation unavailable: {0}")]
    DisambiguationUnavailable(String),

    /// Loaded graph document violates an invariant (dangling edge, duplicate
    /// edge key). Fatal before any mutation.
    #[error("Graph corruption: {0}")]
    GraphCorruption(String),

    /// Cannot write the output document. Fatal after processing; the previous
    /// durable document remains authoritative.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenient Result type using MedkgError
pub type Result<T> = std::result::Result<T, MedkgError>;
