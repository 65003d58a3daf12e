//! Hand-rolled port fakes shared by the unit tests of this crate.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::domain::{PageImage, SearchHit, SlideDocument};
use crate::ports::{
    OcrService, PortError, PortResult, Rasterizer, SearchIndex, TextExtractor,
};

pub const MALFORMED: &[u8] = b"definitely not a pdf";

/// Fake PDFs are encoded as `PDF:<page count>`.
pub fn fake_pdf(pages: usize) -> Bytes {
    Bytes::from(format!("PDF:{pages}"))
}

fn page_count(pdf: &[u8]) -> PortResult<usize> {
    std::str::from_utf8(pdf)
        .ok()
        .and_then(|text| text.strip_prefix("PDF:"))
        .and_then(|count| count.parse().ok())
        .ok_or_else(|| PortError::MalformedDocument("missing PDF header".to_string()))
}

pub struct FakeRasterizer;

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize(&self, pdf: Bytes) -> PortResult<Vec<PageImage>> {
        let pages = page_count(&pdf)?;
        Ok((0..pages)
            .map(|page_index| PageImage {
                page_index,
                width: 1,
                height: 1,
                png_data: Bytes::from(format!("page-{page_index}")),
            })
            .collect())
    }
}

/// Extracts `scrape <n>` for page n, optionally reporting extra pages.
pub struct FakeExtractor {
    pub extra_pages: usize,
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract_pages(&self, pdf: Bytes) -> PortResult<Vec<String>> {
        let pages = page_count(&pdf)? + self.extra_pages;
        Ok((1..=pages).map(|n| format!("scrape {n}")).collect())
    }
}

/// OCR fake that answers `ocr <n>` for page n and fails the configured pages.
/// Later pages answer sooner so completion order differs from page order.
#[derive(Default)]
pub struct ScriptedOcr {
    pub failing_pages: HashSet<usize>,
    pub delay: Option<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl ScriptedOcr {
    pub fn failing(pages: impl IntoIterator<Item = usize>) -> Self {
        Self {
            failing_pages: pages.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Answers every page after `delay`, scaled so later pages finish first.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }
}

#[async_trait]
impl OcrService for ScriptedOcr {
    async fn ocr(&self, page: &PageImage) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            let stagger = 10u32.saturating_sub(page.page_index as u32).max(1);
            tokio::time::sleep(delay * stagger).await;
        } else {
            tokio::task::yield_now().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing_pages.contains(&page.page_index) {
            return Err(PortError::Timeout(format!("page {}", page.page_index)));
        }
        Ok(format!("ocr {}", page.page_index + 1))
    }
}

/// Substring-matching index that can be told to fail writes.
#[derive(Default)]
pub struct FakeIndex {
    docs: Mutex<BTreeMap<Uuid, SlideDocument>>,
    pub fail_writes: AtomicBool,
    pub delete_batches: AtomicUsize,
}

impl FakeIndex {
    pub fn ids(&self) -> HashSet<Uuid> {
        self.docs.lock().unwrap().keys().copied().collect()
    }

    /// Inserts a document directly, bypassing the writer.
    pub fn inject(&self, doc: SlideDocument) {
        self.docs.lock().unwrap().insert(doc.uuid, doc);
    }

    fn check_writable(&self) -> PortResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("index unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for FakeIndex {
    async fn add_documents(&self, documents: Vec<SlideDocument>) -> PortResult<()> {
        self.check_writable()?;
        let mut docs = self.docs.lock().unwrap();
        for doc in documents {
            docs.insert(doc.uuid, doc);
        }
        Ok(())
    }

    async fn delete_documents(&self, slide_ids: &[Uuid]) -> PortResult<()> {
        self.check_writable()?;
        self.delete_batches.fetch_add(1, Ordering::SeqCst);
        let mut docs = self.docs.lock().unwrap();
        for id in slide_ids {
            docs.remove(id);
        }
        Ok(())
    }

    async fn search(
        &self,
        text: &str,
        deck_filter: Option<&[Uuid]>,
        limit: usize,
    ) -> PortResult<Vec<SearchHit>> {
        let needle = text.to_lowercase();
        let docs = self.docs.lock().unwrap();
        Ok(docs
            .values()
            .filter(|doc| deck_filter.map_or(true, |decks| decks.contains(&doc.deck_uuid)))
            .filter(|doc| {
                needle.is_empty()
                    || doc.content_ocr.to_lowercase().contains(&needle)
                    || doc.content_scrape.to_lowercase().contains(&needle)
            })
            .take(limit)
            .map(|doc| SearchHit {
                slide_id: doc.uuid,
                deck_id: doc.deck_uuid,
                score: 1.0,
            })
            .collect())
    }

    async fn clear(&self) -> PortResult<()> {
        self.check_writable()?;
        self.docs.lock().unwrap().clear();
        Ok(())
    }
}
