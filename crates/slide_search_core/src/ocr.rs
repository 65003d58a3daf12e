//! crates/slide_search_core/src/ocr.rs
//!
//! The OCR dispatcher: one vision request per rendered page, bounded
//! concurrency, per-page failure isolation and results keyed by page index.

use std::sync::Arc;
use std::time::{Duration, Instant};

use backon::{ExponentialBuilder, Retryable};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::PageImage;
use crate::error::{SlideSearchError, SlideSearchResult};
use crate::ports::{OcrService, PortError};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// The OCR result for one page. A failed page carries empty text and the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOcr {
    pub page_index: usize,
    pub text: String,
    pub failure: Option<String>,
}

impl PageOcr {
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Per-page retry with exponential backoff. Disabled unless `max_retries > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            min_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> Option<ExponentialBuilder> {
        if self.max_retries == 0 {
            return None;
        }
        Some(
            ExponentialBuilder::default()
                .with_min_delay(self.min_delay)
                .with_max_delay(self.max_delay)
                .with_max_times(self.max_retries)
                .with_jitter(),
        )
    }
}

#[derive(Clone)]
pub struct OcrDispatcher {
    service: Arc<dyn OcrService>,
    max_in_flight: usize,
    retry: RetryPolicy,
}

impl OcrDispatcher {
    /// Creates a dispatcher allowing at most `max_in_flight` concurrent requests (minimum 1).
    pub fn new(service: Arc<dyn OcrService>, max_in_flight: usize) -> Self {
        Self {
            service,
            max_in_flight: max_in_flight.max(1),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Transcribes every page. The returned vector is ordered by page index
    /// regardless of completion order. Only cancellation aborts the batch;
    /// individual page failures are recorded on the page.
    pub async fn dispatch(
        &self,
        pages: Vec<PageImage>,
        cancel: &CancellationToken,
    ) -> SlideSearchResult<Vec<PageOcr>> {
        let total = pages.len();
        let mut slots: Vec<Option<PageOcr>> = vec![None; total];

        let mut completions = stream::iter(pages.into_iter().enumerate())
            .map(|(index, page)| async move {
                let started = Instant::now();
                let result = self.recognize(&page).await;
                debug!(
                    page = index + 1,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    ok = result.is_ok(),
                    "ocr page finished"
                );
                (index, result)
            })
            .buffer_unordered(self.max_in_flight);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SlideSearchError::Cancelled),
                next = completions.next() => {
                    let Some((index, result)) = next else { break };
                    slots[index] = Some(into_page_ocr(index, result));
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    SlideSearchError::Unexpected(format!("no OCR result for page {}", index + 1))
                })
            })
            .collect()
    }

    async fn recognize(&self, page: &PageImage) -> Result<String, PortError> {
        let attempt = || async { self.service.ocr(page).await };
        match self.retry.backoff() {
            Some(backoff) => {
                attempt
                    .retry(backoff)
                    .when(|err: &PortError| !matches!(err, PortError::MalformedDocument(_)))
                    .notify(|err: &PortError, delay: Duration| {
                        warn!(page = page.page_index + 1, ?delay, "retrying OCR page: {}", err);
                    })
                    .await
            }
            None => attempt().await,
        }
    }
}

fn into_page_ocr(index: usize, result: Result<String, PortError>) -> PageOcr {
    match result {
        Ok(text) => PageOcr {
            page_index: index,
            text,
            failure: None,
        },
        Err(err) => {
            let failure = SlideSearchError::PageOcrFailed {
                page: index as u32 + 1,
                reason: err.to_string(),
            };
            warn!("{}", failure);
            PageOcr {
                page_index: index,
                text: String::new(),
                failure: Some(failure.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRasterizer, ScriptedOcr, fake_pdf};
    use crate::ports::Rasterizer;
    use std::sync::atomic::Ordering;

    async fn pages(count: usize) -> Vec<PageImage> {
        FakeRasterizer.rasterize(fake_pdf(count)).await.unwrap()
    }

    #[tokio::test]
    async fn results_are_ordered_by_page_not_completion() {
        let ocr = Arc::new(ScriptedOcr::with_delay(Duration::from_millis(2)));
        let dispatcher = OcrDispatcher::new(ocr, 4);

        let results = dispatcher
            .dispatch(pages(6).await, &CancellationToken::new())
            .await
            .unwrap();

        let texts: Vec<_> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["ocr 1", "ocr 2", "ocr 3", "ocr 4", "ocr 5", "ocr 6"]);
        assert!(results.iter().enumerate().all(|(i, r)| r.page_index == i));
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_the_bound() {
        let ocr = Arc::new(ScriptedOcr::with_delay(Duration::from_millis(1)));
        let dispatcher = OcrDispatcher::new(ocr.clone(), 2);

        dispatcher
            .dispatch(pages(8).await, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(ocr.calls.load(Ordering::SeqCst), 8);
        assert!(ocr.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn a_failed_page_does_not_abort_the_others() {
        let dispatcher = OcrDispatcher::new(Arc::new(ScriptedOcr::failing([1])), 3);

        let results = dispatcher
            .dispatch(pages(3).await, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(!results[0].is_failed());
        assert!(results[1].is_failed());
        assert_eq!(results[1].text, "");
        assert!(results[1].failure.as_deref().unwrap().contains("page 2"));
        assert_eq!(results[2].text, "ocr 3");
    }

    #[tokio::test]
    async fn retries_are_attempted_when_configured() {
        let ocr = Arc::new(ScriptedOcr::failing([0]));
        let dispatcher = OcrDispatcher::new(ocr.clone(), 1).with_retry(RetryPolicy {
            max_retries: 2,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        });

        let results = dispatcher
            .dispatch(pages(1).await, &CancellationToken::new())
            .await
            .unwrap();

        assert!(results[0].is_failed());
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancellation_discards_partial_results() {
        let ocr = Arc::new(ScriptedOcr::with_delay(Duration::from_millis(50)));
        let dispatcher = OcrDispatcher::new(ocr, 2);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = dispatcher.dispatch(pages(4).await, &cancel).await;
        assert!(matches!(result, Err(SlideSearchError::Cancelled)));
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped_to_one() {
        let dispatcher = OcrDispatcher::new(Arc::new(ScriptedOcr::default()), 0);
        assert_eq!(dispatcher.max_in_flight(), 1);
    }
}
