//! crates/slide_search_core/src/memory.rs
//!
//! Process-local implementations of the storage ports. Used for development
//! runs without PostgreSQL and by the test suites.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::domain::{IngestJob, LectureSeries, Slide, SlideDeck};
use crate::ports::{BlobStore, ObjectStore, PortError, PortResult};

/// An `ObjectStore` backed by hash maps. Locks are never held across an await.
#[derive(Default)]
pub struct InMemoryObjectStore {
    series: RwLock<HashMap<Uuid, LectureSeries>>,
    decks: RwLock<HashMap<Uuid, SlideDeck>>,
    slides: RwLock<HashMap<Uuid, Slide>>,
    jobs: RwLock<HashMap<Uuid, IngestJob>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn get_one<T: Clone>(map: &RwLock<HashMap<Uuid, T>>, id: Uuid) -> PortResult<Option<T>> {
    let guard = map.read().map_err(|_| poisoned())?;
    Ok(guard.get(&id).cloned())
}

fn list_where<T: Clone>(
    map: &RwLock<HashMap<Uuid, T>>,
    keep: impl Fn(&T) -> bool,
) -> PortResult<Vec<T>> {
    let guard = map.read().map_err(|_| poisoned())?;
    Ok(guard.values().filter(|item| keep(item)).cloned().collect())
}

fn put_one<T: Clone>(map: &RwLock<HashMap<Uuid, T>>, id: Uuid, value: &T) -> PortResult<()> {
    let mut guard = map.write().map_err(|_| poisoned())?;
    guard.insert(id, value.clone());
    Ok(())
}

fn remove_one<T>(map: &RwLock<HashMap<Uuid, T>>, id: Uuid) -> PortResult<()> {
    let mut guard = map.write().map_err(|_| poisoned())?;
    guard.remove(&id);
    Ok(())
}

fn poisoned() -> PortError {
    PortError::Unexpected("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get_series(&self, id: Uuid) -> PortResult<Option<LectureSeries>> {
        get_one(&self.series, id)
    }

    async fn list_series(&self) -> PortResult<Vec<LectureSeries>> {
        list_where(&self.series, |_| true)
    }

    async fn save_series(&self, series: &LectureSeries) -> PortResult<()> {
        put_one(&self.series, series.id, series)
    }

    async fn delete_series(&self, id: Uuid) -> PortResult<()> {
        remove_one(&self.series, id)
    }

    async fn get_deck(&self, id: Uuid) -> PortResult<Option<SlideDeck>> {
        get_one(&self.decks, id)
    }

    async fn list_decks(&self) -> PortResult<Vec<SlideDeck>> {
        list_where(&self.decks, |_| true)
    }

    async fn list_decks_by_series(&self, series_id: Uuid) -> PortResult<Vec<SlideDeck>> {
        list_where(&self.decks, |deck| deck.series_id == series_id)
    }

    async fn save_deck(&self, deck: &SlideDeck) -> PortResult<()> {
        put_one(&self.decks, deck.id, deck)
    }

    async fn delete_deck(&self, id: Uuid) -> PortResult<()> {
        remove_one(&self.decks, id)
    }

    async fn get_slide(&self, id: Uuid) -> PortResult<Option<Slide>> {
        get_one(&self.slides, id)
    }

    async fn list_slides(&self) -> PortResult<Vec<Slide>> {
        list_where(&self.slides, |_| true)
    }

    async fn list_slides_by_deck(&self, deck_id: Uuid) -> PortResult<Vec<Slide>> {
        let mut slides = list_where(&self.slides, |slide| slide.deck_id == deck_id)?;
        slides.sort_by_key(|slide| slide.number);
        Ok(slides)
    }

    async fn save_slide(&self, slide: &Slide) -> PortResult<()> {
        put_one(&self.slides, slide.id, slide)
    }

    async fn delete_slide(&self, id: Uuid) -> PortResult<()> {
        remove_one(&self.slides, id)
    }

    async fn get_job(&self, id: Uuid) -> PortResult<Option<IngestJob>> {
        get_one(&self.jobs, id)
    }

    async fn list_jobs(&self) -> PortResult<Vec<IngestJob>> {
        let mut jobs = list_where(&self.jobs, |_| true)?;
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    async fn save_job(&self, job: &IngestJob) -> PortResult<()> {
        put_one(&self.jobs, job.id, job)
    }
}

/// A `BlobStore` that keeps PDFs in memory.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<Uuid, Bytes>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, deck_id: Uuid) -> bool {
        self.blobs
            .read()
            .map(|guard| guard.contains_key(&deck_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, deck_id: Uuid, data: Bytes) -> PortResult<()> {
        put_one(&self.blobs, deck_id, &data)
    }

    async fn get(&self, deck_id: Uuid) -> PortResult<Bytes> {
        get_one(&self.blobs, deck_id)?
            .ok_or_else(|| PortError::NotFound(format!("PDF for deck {deck_id}")))
    }

    async fn delete(&self, deck_id: Uuid) -> PortResult<()> {
        remove_one(&self.blobs, deck_id)
    }
}
