//! crates/slide_search_core/src/ingest.rs
//!
//! One PDF upload turned into a persisted, searchable deck.

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::assembler::{assemble_deck, AssemblyInput};
use crate::domain::{Slide, SlideDeck};
use crate::error::{SlideSearchError, SlideSearchResult};
use crate::ocr::OcrDispatcher;
use crate::persistence::PersistenceWriter;
use crate::ports::{ObjectStore, Rasterizer, TextExtractor};

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub series_id: Uuid,
    pub file_name: Option<String>,
    /// Explicit deck name. Derived from `file_name` when `None`.
    pub name: Option<String>,
    pub pdf: Bytes,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub deck: SlideDeck,
    pub slides: Vec<Slide>,
    /// 1-based numbers of the pages whose OCR failed.
    pub ocr_failures: Vec<u32>,
}

#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<dyn ObjectStore>,
    rasterizer: Arc<dyn Rasterizer>,
    extractor: Arc<dyn TextExtractor>,
    dispatcher: OcrDispatcher,
    writer: PersistenceWriter,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        rasterizer: Arc<dyn Rasterizer>,
        extractor: Arc<dyn TextExtractor>,
        dispatcher: OcrDispatcher,
        writer: PersistenceWriter,
    ) -> Self {
        Self {
            store,
            rasterizer,
            extractor,
            dispatcher,
            writer,
        }
    }

    /// Runs the whole pipeline. Nothing is persisted unless every page has
    /// been resolved; cancellation before the commit persists nothing.
    #[instrument(skip_all, fields(series_id = %request.series_id, file = ?request.file_name))]
    pub async fn ingest(
        &self,
        request: IngestRequest,
        cancel: &CancellationToken,
    ) -> SlideSearchResult<IngestReport> {
        if self.store.get_series(request.series_id).await?.is_none() {
            return Err(SlideSearchError::NotFound(format!(
                "lecture series {}",
                request.series_id
            )));
        }

        let (pages, scraped) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SlideSearchError::Cancelled),
            joined = async {
                tokio::try_join!(
                    self.rasterizer.rasterize(request.pdf.clone()),
                    self.extractor.extract_pages(request.pdf.clone()),
                )
            } => joined?,
        };

        if pages.is_empty() {
            return Err(SlideSearchError::MalformedDocument(
                "document has no pages".to_string(),
            ));
        }
        if pages.len() != scraped.len() {
            return Err(SlideSearchError::ExtractorPageMismatch {
                rasterized: pages.len(),
                extracted: scraped.len(),
            });
        }
        info!(pages = pages.len(), "document rasterized");

        let ocr = self.dispatcher.dispatch(pages, cancel).await?;

        let assembled = assemble_deck(AssemblyInput {
            series_id: request.series_id,
            name: request.name.as_deref(),
            file_name: request.file_name.as_deref(),
            pdf: &request.pdf,
            ocr,
            scraped,
        })?;

        if cancel.is_cancelled() {
            return Err(SlideSearchError::Cancelled);
        }
        self.writer.commit(&assembled, request.pdf).await?;

        let ocr_failures = assembled.ocr_failures();
        Ok(IngestReport {
            deck: assembled.deck,
            slides: assembled.slides,
            ocr_failures,
        })
    }
}
