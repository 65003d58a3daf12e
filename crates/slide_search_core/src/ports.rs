//! crates/slide_search_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases,
//! search engines or model APIs.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::domain::{
    IngestJob, LectureSeries, PageImage, SearchHit, Slide, SlideDeck, SlideDocument,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Malformed document: {0}")]
    MalformedDocument(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports
//=========================================================================================

/// Durable record storage, keyed by id per entity type.
///
/// `save_*` is a full upsert and `delete_*` is idempotent. Implementations
/// provide atomic per-key writes; callers are responsible for write ordering.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    // --- Lecture Series ---
    async fn get_series(&self, id: Uuid) -> PortResult<Option<LectureSeries>>;
    async fn list_series(&self) -> PortResult<Vec<LectureSeries>>;
    async fn save_series(&self, series: &LectureSeries) -> PortResult<()>;
    async fn delete_series(&self, id: Uuid) -> PortResult<()>;

    // --- Slide Decks ---
    async fn get_deck(&self, id: Uuid) -> PortResult<Option<SlideDeck>>;
    async fn list_decks(&self) -> PortResult<Vec<SlideDeck>>;
    async fn list_decks_by_series(&self, series_id: Uuid) -> PortResult<Vec<SlideDeck>>;
    async fn save_deck(&self, deck: &SlideDeck) -> PortResult<()>;
    async fn delete_deck(&self, id: Uuid) -> PortResult<()>;

    // --- Slides ---
    async fn get_slide(&self, id: Uuid) -> PortResult<Option<Slide>>;
    async fn list_slides(&self) -> PortResult<Vec<Slide>>;
    /// Slides of one deck, ordered by `number`.
    async fn list_slides_by_deck(&self, deck_id: Uuid) -> PortResult<Vec<Slide>>;
    async fn save_slide(&self, slide: &Slide) -> PortResult<()>;
    async fn delete_slide(&self, id: Uuid) -> PortResult<()>;

    // --- Ingestion Jobs ---
    async fn get_job(&self, id: Uuid) -> PortResult<Option<IngestJob>>;
    async fn list_jobs(&self) -> PortResult<Vec<IngestJob>>;
    async fn save_job(&self, job: &IngestJob) -> PortResult<()>;
}

/// Storage for the original PDF bytes, addressed by deck id.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, deck_id: Uuid, data: Bytes) -> PortResult<()>;
    /// Returns `PortError::NotFound` when no blob exists for the deck.
    async fn get(&self, deck_id: Uuid) -> PortResult<Bytes>;
    /// Removes the blob if present. Deleting a missing blob is not an error.
    async fn delete(&self, deck_id: Uuid) -> PortResult<()>;
}

/// A full-text index over slide documents.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Upserts documents keyed by `uuid`.
    async fn add_documents(&self, documents: Vec<SlideDocument>) -> PortResult<()>;

    /// Deletes documents by slide id as one batch. Unknown ids are ignored.
    async fn delete_documents(&self, slide_ids: &[Uuid]) -> PortResult<()>;

    /// Ranked text search. `deck_filter` restricts hits to the given decks;
    /// `Some(&[])` matches nothing. An empty `text` matches every document.
    async fn search(
        &self,
        text: &str,
        deck_filter: Option<&[Uuid]>,
        limit: usize,
    ) -> PortResult<Vec<SearchHit>>;

    /// Removes every document from the index.
    async fn clear(&self) -> PortResult<()>;
}

//=========================================================================================
// Document Processing Ports
//=========================================================================================

#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Renders every page of a PDF, in document order.
    async fn rasterize(&self, pdf: Bytes) -> PortResult<Vec<PageImage>>;
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extracts the text layer of a PDF, one chunk per page, in document order.
    async fn extract_pages(&self, pdf: Bytes) -> PortResult<Vec<String>>;
}

#[async_trait]
pub trait OcrService: Send + Sync {
    /// Transcribes a single rendered page into plain text.
    async fn ocr(&self, page: &PageImage) -> PortResult<String>;
}
