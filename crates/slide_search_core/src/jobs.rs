//! crates/slide_search_core/src/jobs.rs
//!
//! Background ingestion with pollable job records.
//! Every outcome, success or failure, ends up on the job; nothing is discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::IngestJob;
use crate::error::{SlideSearchError, SlideSearchResult};
use crate::ingest::{IngestPipeline, IngestReport, IngestRequest};
use crate::ports::ObjectStore;

#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn ObjectStore>,
    pipeline: IngestPipeline,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    timeout: Option<Duration>,
}

impl JobRunner {
    pub fn new(store: Arc<dyn ObjectStore>, pipeline: IngestPipeline) -> Self {
        Self {
            store,
            pipeline,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            timeout: None,
        }
    }

    /// Bounds every ingestion. An expired job is cancelled and recorded as failed.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Records a pending job and starts ingesting it in the background.
    pub async fn submit(
        &self,
        series_id: Uuid,
        file_name: impl Into<String>,
        pdf: Bytes,
    ) -> SlideSearchResult<IngestJob> {
        if self.store.get_series(series_id).await?.is_none() {
            return Err(SlideSearchError::NotFound(format!("lecture series {series_id}")));
        }

        let job = IngestJob::new(series_id, file_name);
        self.save(&job).await?;
        info!(job_id = %job.id, %series_id, file = %job.file_name, "ingestion job queued");

        let runner = self.clone();
        let queued = job.clone();
        self.tracker.spawn(async move { runner.run(queued, pdf).await });
        Ok(job)
    }

    pub async fn get(&self, job_id: Uuid) -> SlideSearchResult<IngestJob> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or_else(|| SlideSearchError::NotFound(format!("ingestion job {job_id}")))
    }

    /// Fails every job left pending or processing by a previous process.
    /// Call once at startup, before accepting uploads.
    pub async fn fail_abandoned(&self) -> SlideSearchResult<usize> {
        let mut abandoned = 0;
        for mut job in self.store.list_jobs().await? {
            if job.mark_failed("interrupted by a service restart") {
                self.save(&job).await?;
                warn!(job_id = %job.id, file = %job.file_name, "abandoned ingestion job marked failed");
                abandoned += 1;
            }
        }
        Ok(abandoned)
    }

    /// Cancels in-flight ingestions and waits for their tasks to record the outcome.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("ingestion jobs drained");
    }

    async fn run(self, mut job: IngestJob, pdf: Bytes) {
        if !job.mark_processing() {
            return;
        }
        if let Err(err) = self.save(&job).await {
            error!(job_id = %job.id, "could not mark job as processing: {}", err);
        }

        let request = IngestRequest {
            series_id: job.series_id,
            file_name: Some(job.file_name.clone()),
            name: None,
            pdf,
        };

        match self.ingest_with_deadline(request).await {
            Ok(report) => {
                job.mark_completed(
                    report.deck.id,
                    report.slides.len() as u32,
                    report.ocr_failures.len() as u32,
                );
                if !report.ocr_failures.is_empty() {
                    warn!(job_id = %job.id, pages = ?report.ocr_failures, "deck ingested with OCR failures");
                }
                info!(job_id = %job.id, deck_id = %report.deck.id, "ingestion job completed");
            }
            Err(err) => {
                error!(job_id = %job.id, "ingestion job failed: {}", err);
                // Points the caller at a deck that is stored but awaits a reindex.
                job.deck_id = err.stored_deck();
                job.mark_failed(err.to_string());
            }
        }

        if let Err(err) = self.save(&job).await {
            error!(job_id = %job.id, status = %job.status, "could not record job outcome: {}", err);
        }
    }

    async fn ingest_with_deadline(&self, request: IngestRequest) -> SlideSearchResult<IngestReport> {
        let cancel = self.shutdown.child_token();
        let expired = Arc::new(AtomicBool::new(false));

        if let Some(timeout) = self.timeout {
            let cancel = cancel.clone();
            let expired = expired.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(timeout) => {
                        expired.store(true, Ordering::SeqCst);
                        cancel.cancel();
                    }
                }
            });
        }

        let result = self.pipeline.ingest(request, &cancel).await;
        // Stops the deadline timer.
        cancel.cancel();

        match (result, self.timeout) {
            (Err(SlideSearchError::Cancelled), Some(timeout)) if expired.load(Ordering::SeqCst) => {
                Err(SlideSearchError::TimedOut(timeout))
            }
            (result, _) => result,
        }
    }

    async fn save(&self, job: &IngestJob) -> SlideSearchResult<()> {
        self.store
            .save_job(job)
            .await
            .map_err(|source| SlideSearchError::StoreWriteFailed {
                context: format!("ingestion job {}", job.id),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobStatus, LectureSeries};
    use crate::memory::{InMemoryBlobStore, InMemoryObjectStore};
    use crate::ocr::OcrDispatcher;
    use crate::persistence::PersistenceWriter;
    use crate::testing::{fake_pdf, FakeExtractor, FakeIndex, FakeRasterizer, ScriptedOcr, MALFORMED};

    async fn runner_with(ocr: ScriptedOcr) -> (Arc<InMemoryObjectStore>, JobRunner, LectureSeries) {
        runner_with_index(ocr, Arc::new(FakeIndex::default())).await
    }

    async fn runner_with_index(
        ocr: ScriptedOcr,
        index: Arc<FakeIndex>,
    ) -> (Arc<InMemoryObjectStore>, JobRunner, LectureSeries) {
        let store = Arc::new(InMemoryObjectStore::new());
        let writer = PersistenceWriter::new(store.clone(), Arc::new(InMemoryBlobStore::new()), index);
        let pipeline = IngestPipeline::new(
            store.clone(),
            Arc::new(FakeRasterizer),
            Arc::new(FakeExtractor { extra_pages: 0 }),
            OcrDispatcher::new(Arc::new(ocr), 4),
            writer,
        );
        let series = LectureSeries::new("Networks");
        store.save_series(&series).await.unwrap();
        (store.clone(), JobRunner::new(store, pipeline), series)
    }

    async fn wait_terminal(runner: &JobRunner, job_id: Uuid) -> IngestJob {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let job = runner.get(job_id).await.unwrap();
                if job.status.is_terminal() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not finish")
    }

    #[tokio::test]
    async fn submitted_job_completes_with_a_deck() {
        let (store, runner, series) = runner_with(ScriptedOcr::failing([0])).await;

        let job = runner.submit(series.id, "intro.pdf", fake_pdf(2)).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let done = wait_terminal(&runner, job.id).await;
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.pages_total, 2);
        assert_eq!(done.pages_ocr_failed, 1);
        let deck = store.get_deck(done.deck_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(deck.name, "intro");
    }

    #[tokio::test]
    async fn failures_are_recorded_on_the_job() {
        let (_, runner, series) = runner_with(ScriptedOcr::default()).await;

        let job = runner
            .submit(series.id, "broken.pdf", Bytes::from_static(MALFORMED))
            .await
            .unwrap();

        let done = wait_terminal(&runner, job.id).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.unwrap().contains("Malformed document"));
        assert!(done.deck_id.is_none());
    }

    #[tokio::test]
    async fn unknown_series_is_rejected_before_recording_a_job() {
        let (store, runner, _) = runner_with(ScriptedOcr::default()).await;
        let err = runner
            .submit(Uuid::new_v4(), "x.pdf", fake_pdf(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SlideSearchError::NotFound(_)));
        assert!(store.list_jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_jobs_fail_with_a_timeout() {
        let (store, runner, series) =
            runner_with(ScriptedOcr::with_delay(Duration::from_millis(50))).await;
        let runner = runner.with_timeout(Some(Duration::from_millis(20)));

        let job = runner.submit(series.id, "slow.pdf", fake_pdf(2)).await.unwrap();
        let done = wait_terminal(&runner, job.id).await;

        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.unwrap().contains("timed out"));
        assert!(store.list_decks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn shutdown_cancels_in_flight_jobs() {
        let (store, runner, series) =
            runner_with(ScriptedOcr::with_delay(Duration::from_millis(100))).await;

        let job = runner.submit(series.id, "long.pdf", fake_pdf(3)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        runner.shutdown().await;

        let done = runner.get(job.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.unwrap().contains("cancelled"));
        assert!(store.list_slides().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unindexed_deck_is_named_on_the_failed_job() {
        let index = Arc::new(FakeIndex::default());
        index.fail_writes.store(true, Ordering::SeqCst);
        let (store, runner, series) = runner_with_index(ScriptedOcr::default(), index).await;

        let job = runner.submit(series.id, "week2.pdf", fake_pdf(2)).await.unwrap();
        let done = wait_terminal(&runner, job.id).await;

        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.unwrap().contains("search index"));
        let deck_id = done.deck_id.expect("stored deck is reported");
        assert_eq!(store.list_slides_by_deck(deck_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn abandoned_jobs_are_failed_on_startup() {
        let (store, runner, series) = runner_with(ScriptedOcr::default()).await;
        let pending = IngestJob::new(series.id, "queued.pdf");
        let mut processing = IngestJob::new(series.id, "running.pdf");
        processing.mark_processing();
        let mut completed = IngestJob::new(series.id, "done.pdf");
        completed.mark_processing();
        completed.mark_completed(Uuid::new_v4(), 1, 0);
        for job in [&pending, &processing, &completed] {
            store.save_job(job).await.unwrap();
        }

        assert_eq!(runner.fail_abandoned().await.unwrap(), 2);

        for id in [pending.id, processing.id] {
            let job = runner.get(id).await.unwrap();
            assert_eq!(job.status, JobStatus::Failed);
            assert!(job.error.unwrap().contains("restart"));
        }
        assert_eq!(runner.get(completed.id).await.unwrap().status, JobStatus::Completed);
        assert_eq!(runner.fail_abandoned().await.unwrap(), 0);
    }
}
