//! Shared fixtures for the service integration tests: real PDFs built with
//! lopdf, a Pdfium-free rasterizer and a scripted OCR service.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use api_lib::adapters::{FsBlobStore, LopdfTextExtractor, TantivySearchIndex};
use api_lib::web::state::{AppState, PipelineSettings, Ports};
use async_trait::async_trait;
use bytes::Bytes;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use slide_search_core::memory::InMemoryObjectStore;
use slide_search_core::ocr::RetryPolicy;
use slide_search_core::ports::{OcrService, PortError, PortResult, Rasterizer};
use slide_search_core::PageImage;
use tempfile::TempDir;

/// Builds a PDF with one page per entry, each page showing its text in Courier.
pub fn build_pdf(pages: &[&str]) -> Bytes {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 500.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let encoded = content.encode().expect("content stream must encode");
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 842.into(), 595.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("pdf must serialize");
    Bytes::from(buffer)
}

/// Counts pages with lopdf instead of rendering them, so tests run without Pdfium.
pub struct PageCountRasterizer;

#[async_trait]
impl Rasterizer for PageCountRasterizer {
    async fn rasterize(&self, pdf: Bytes) -> PortResult<Vec<PageImage>> {
        let doc = Document::load_mem(&pdf)
            .map_err(|e| PortError::MalformedDocument(e.to_string()))?;
        Ok((0..doc.get_pages().len())
            .map(|page_index| PageImage {
                page_index,
                width: 1,
                height: 1,
                png_data: Bytes::from(format!("page-{page_index}")),
            })
            .collect())
    }
}

/// Answers OCR requests from a per-page script; unscripted pages return empty text.
#[derive(Default)]
pub struct ScriptedOcr {
    texts: HashMap<usize, String>,
    failing: Vec<usize>,
    pub calls: AtomicUsize,
}

impl ScriptedOcr {
    pub fn new(texts: &[(usize, &str)]) -> Self {
        Self {
            texts: texts
                .iter()
                .map(|(page, text)| (*page, text.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, page_index: usize) -> Self {
        self.failing.push(page_index);
        self
    }
}

#[async_trait]
impl OcrService for ScriptedOcr {
    async fn ocr(&self, page: &PageImage) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&page.page_index) {
            return Err(PortError::Unexpected("vision model unavailable".to_string()));
        }
        Ok(self.texts.get(&page.page_index).cloned().unwrap_or_default())
    }
}

/// An `AppState` over the in-memory store, a temp-dir blob store and a RAM index.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub index: Arc<TantivySearchIndex>,
    pub ocr: Arc<ScriptedOcr>,
    _data_dir: TempDir,
}

impl TestApp {
    pub async fn new(ocr: ScriptedOcr) -> Self {
        let data_dir = TempDir::new().expect("tempdir must be created");
        let blobs = FsBlobStore::open(data_dir.path())
            .await
            .expect("blob store must open");
        let index = Arc::new(TantivySearchIndex::in_memory().expect("index must open"));
        let ocr = Arc::new(ocr);

        let state = AppState::new(
            Ports {
                store: Arc::new(InMemoryObjectStore::new()),
                blobs: Arc::new(blobs),
                index: index.clone(),
                rasterizer: Arc::new(PageCountRasterizer),
                extractor: Arc::new(LopdfTextExtractor),
                ocr: ocr.clone(),
            },
            PipelineSettings {
                ocr_concurrency: 2,
                ocr_retry: RetryPolicy::default(),
                search_limit: 20,
                ingest_timeout: None,
            },
        );

        Self {
            state: Arc::new(state),
            index,
            ocr,
            _data_dir: data_dir,
        }
    }
}

/// Polls a job until it reaches a terminal state.
pub async fn wait_for_job(state: &AppState, job_id: uuid::Uuid) -> slide_search_core::IngestJob {
    for _ in 0..200 {
        let job = state.jobs.get(job_id).await.expect("job must exist");
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not finish");
}
