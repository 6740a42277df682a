//! Error taxonomy for registry, topic index, block and store operations.

use std::path::PathBuf;

use thiserror::Error;

pub type DeckResult<T> = std::result::Result<T, DeckError>;

#[derive(Debug, Error)]
pub enum DeckError {
    /// A required unit field (subject, topic, ...) was missing or empty.
    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    /// Topic absent from the index and auto-repair disabled or impossible.
    #[error("Topic not indexed: {subject}/{topic}")]
    TopicNotIndexed { subject: String, topic: String },

    /// Per-field updates are restricted to annotation fields.
    #[error("Field not allowed for annotation update: {0}")]
    FieldNotAllowed(String),

    /// Composite identifier does not decode into four components.
    #[error("Malformed composite identifier: {0:?}")]
    MalformedIdentifier(String),

    #[error("Unknown content kind: {0}")]
    UnknownContentKind(String),

    #[error("Block not found: \\begin{{{kind}}}{{{identifier}}}")]
    BlockNotFound { kind: String, identifier: String },

    #[error("Selection not found in document")]
    SelectionNotFound,

    /// The library document has a region start marker but no end marker.
    #[error("Marker not found in document: {0}")]
    MarkerNotFound(String),

    /// The persisted file changed between load and save.
    #[error("Concurrent modification detected: {}", .0.display())]
    ConcurrentModification(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
