//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and how the pipeline services are
//! wired from the port adapters.

use std::sync::Arc;
use std::time::Duration;

use slide_search_core::ocr::RetryPolicy;
use slide_search_core::ports::{
    BlobStore, ObjectStore, OcrService, Rasterizer, SearchIndex, TextExtractor,
};
use slide_search_core::{IngestPipeline, JobRunner, OcrDispatcher, PersistenceWriter, SearchEngine};

use crate::config::Config;

//=========================================================================================
// Wiring Inputs
//=========================================================================================

/// The concrete adapters behind every port.
#[derive(Clone)]
pub struct Ports {
    pub store: Arc<dyn ObjectStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub index: Arc<dyn SearchIndex>,
    pub rasterizer: Arc<dyn Rasterizer>,
    pub extractor: Arc<dyn TextExtractor>,
    pub ocr: Arc<dyn OcrService>,
}

/// Tuning knobs of the pipeline services.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub ocr_concurrency: usize,
    pub ocr_retry: RetryPolicy,
    pub search_limit: usize,
    pub ingest_timeout: Option<Duration>,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            ocr_concurrency: config.ocr_concurrency,
            ocr_retry: RetryPolicy {
                max_retries: config.ocr_max_retries,
                ..RetryPolicy::default()
            },
            search_limit: config.search_limit,
            ingest_timeout: config.ingest_timeout,
        }
    }
}

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub writer: PersistenceWriter,
    pub search: SearchEngine,
    pub jobs: JobRunner,
}

impl AppState {
    pub fn new(ports: Ports, settings: PipelineSettings) -> Self {
        let writer = PersistenceWriter::new(
            ports.store.clone(),
            ports.blobs.clone(),
            ports.index.clone(),
        );
        let dispatcher = OcrDispatcher::new(ports.ocr, settings.ocr_concurrency)
            .with_retry(settings.ocr_retry);
        let pipeline = IngestPipeline::new(
            ports.store.clone(),
            ports.rasterizer,
            ports.extractor,
            dispatcher,
            writer.clone(),
        );
        let jobs = JobRunner::new(ports.store.clone(), pipeline).with_timeout(settings.ingest_timeout);
        let search = SearchEngine::new(ports.store.clone(), ports.index, settings.search_limit);

        Self {
            store: ports.store,
            blobs: ports.blobs,
            writer,
            search,
            jobs,
        }
    }
}
