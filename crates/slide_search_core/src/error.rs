//! crates/slide_search_core/src/error.rs
//!
//! The error taxonomy of the ingestion and search pipeline.

use std::time::Duration;

use uuid::Uuid;

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum SlideSearchError {
    /// The input bytes are not a parseable PDF. Nothing was persisted.
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// The text extractor and the rasterizer disagree on the page count.
    #[error("Text extractor returned {extracted} pages but the rasterizer produced {rasterized}")]
    ExtractorPageMismatch { rasterized: usize, extracted: usize },

    /// A single page could not be transcribed. Recorded on the slide, never fatal.
    #[error("OCR failed for page {page}: {reason}")]
    PageOcrFailed { page: u32, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to write {context} to the object store: {source}")]
    StoreWriteFailed {
        context: String,
        #[source]
        source: PortError,
    },

    /// Entities are stored but not (fully) searchable; an index rebuild repairs this.
    #[error("Failed to update the search index for {context}: {source}")]
    IndexWriteFailed {
        context: String,
        /// Set when a freshly committed deck was stored but not indexed.
        stored_deck: Option<Uuid>,
        #[source]
        source: PortError,
    },

    #[error("Ingestion was cancelled")]
    Cancelled,

    #[error("Ingestion timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Service Port Error: {0}")]
    Port(PortError),

    #[error("An unexpected internal error occurred: {0}")]
    Unexpected(String),
}

impl From<PortError> for SlideSearchError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound(what) => SlideSearchError::NotFound(what),
            PortError::MalformedDocument(reason) => SlideSearchError::MalformedDocument(reason),
            other => SlideSearchError::Port(other),
        }
    }
}

impl SlideSearchError {
    /// The deck that this failure left stored but unsearchable, if any.
    pub fn stored_deck(&self) -> Option<Uuid> {
        match self {
            SlideSearchError::IndexWriteFailed { stored_deck, .. } => *stored_deck,
            _ => None,
        }
    }
}

/// A convenience type alias for `Result<T, SlideSearchError>`.
pub type SlideSearchResult<T> = Result<T, SlideSearchError>;
