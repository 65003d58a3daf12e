pub mod assembler;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod jobs;
pub mod memory;
pub mod ocr;
pub mod persistence;
pub mod ports;
pub mod search;
pub mod snapshot;

#[cfg(test)]
mod testing;

pub use domain::{
    IngestJob, JobStatus, LectureSeries, PageImage, SearchHit, Slide, SlideDeck, SlideDocument,
};
pub use error::{SlideSearchError, SlideSearchResult};
pub use ingest::{IngestPipeline, IngestReport, IngestRequest};
pub use jobs::JobRunner;
pub use ocr::{OcrDispatcher, PageOcr, RetryPolicy};
pub use persistence::{DeckDeletion, PersistenceWriter};
pub use ports::{
    BlobStore, ObjectStore, OcrService, PortError, PortResult, Rasterizer, SearchIndex,
    TextExtractor,
};
pub use search::{RankedSlide, SearchEngine};
pub use snapshot::{ImportSummary, Snapshot};
