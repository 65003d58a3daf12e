//! services/api/src/adapters/postgres.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ObjectStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slide_search_core::domain::{IngestJob, JobStatus, LectureSeries, Slide, SlideDeck};
use slide_search_core::ports::{ObjectStore, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ObjectStore` port.
#[derive(Clone)]
pub struct PgObjectStore {
    pool: PgPool,
}

impl PgObjectStore {
    /// Creates a new `PgObjectStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SeriesRecord {
    id: Uuid,
    name: String,
}
impl SeriesRecord {
    fn to_domain(self) -> LectureSeries {
        LectureSeries {
            id: self.id,
            name: self.name,
        }
    }
}

#[derive(FromRow)]
struct DeckRecord {
    id: Uuid,
    series_id: Uuid,
    name: String,
    content_hash: String,
}
impl DeckRecord {
    fn to_domain(self) -> SlideDeck {
        SlideDeck {
            id: self.id,
            series_id: self.series_id,
            name: self.name,
            content_hash: self.content_hash,
        }
    }
}

#[derive(FromRow)]
struct SlideRecord {
    id: Uuid,
    deck_id: Uuid,
    number: i32,
    content_scrape: String,
    content_ocr: String,
    ocr_failed: bool,
}
impl SlideRecord {
    fn to_domain(self) -> Slide {
        Slide {
            id: self.id,
            deck_id: self.deck_id,
            number: self.number as u32,
            content_scrape: self.content_scrape,
            content_ocr: self.content_ocr,
            ocr_failed: self.ocr_failed,
        }
    }
}

#[derive(FromRow)]
struct JobRecord {
    id: Uuid,
    series_id: Uuid,
    file_name: String,
    status: String,
    deck_id: Option<Uuid>,
    error: Option<String>,
    pages_total: i32,
    pages_ocr_failed: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl JobRecord {
    fn to_domain(self) -> PortResult<IngestJob> {
        let status = self
            .status
            .parse::<JobStatus>()
            .map_err(PortError::Unexpected)?;
        Ok(IngestJob {
            id: self.id,
            series_id: self.series_id,
            file_name: self.file_name,
            status,
            deck_id: self.deck_id,
            error: self.error,
            pages_total: self.pages_total as u32,
            pages_ocr_failed: self.pages_ocr_failed as u32,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const DECK_COLUMNS: &str = "id, series_id, name, content_hash";
const SLIDE_COLUMNS: &str = "id, deck_id, number, content_scrape, content_ocr, ocr_failed";
const JOB_COLUMNS: &str = "id, series_id, file_name, status, deck_id, error, pages_total, \
                           pages_ocr_failed, created_at, updated_at";

//=========================================================================================
// `ObjectStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ObjectStore for PgObjectStore {
    // --- Lecture Series ---

    async fn get_series(&self, id: Uuid) -> PortResult<Option<LectureSeries>> {
        let record = sqlx::query_as::<_, SeriesRecord>(
            "SELECT id, name FROM lecture_series WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SeriesRecord::to_domain))
    }

    async fn list_series(&self) -> PortResult<Vec<LectureSeries>> {
        let records =
            sqlx::query_as::<_, SeriesRecord>("SELECT id, name FROM lecture_series ORDER BY name")
                .fetch_all(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(records.into_iter().map(SeriesRecord::to_domain).collect())
    }

    async fn save_series(&self, series: &LectureSeries) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO lecture_series (id, name) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(series.id)
        .bind(&series.name)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_series(&self, id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM lecture_series WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Slide Decks ---

    async fn get_deck(&self, id: Uuid) -> PortResult<Option<SlideDeck>> {
        let record = sqlx::query_as::<_, DeckRecord>(&format!(
            "SELECT {DECK_COLUMNS} FROM slide_decks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(DeckRecord::to_domain))
    }

    async fn list_decks(&self) -> PortResult<Vec<SlideDeck>> {
        let records = sqlx::query_as::<_, DeckRecord>(&format!(
            "SELECT {DECK_COLUMNS} FROM slide_decks ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(DeckRecord::to_domain).collect())
    }

    async fn list_decks_by_series(&self, series_id: Uuid) -> PortResult<Vec<SlideDeck>> {
        let records = sqlx::query_as::<_, DeckRecord>(&format!(
            "SELECT {DECK_COLUMNS} FROM slide_decks WHERE series_id = $1 ORDER BY name"
        ))
        .bind(series_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(DeckRecord::to_domain).collect())
    }

    async fn save_deck(&self, deck: &SlideDeck) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO slide_decks (id, series_id, name, content_hash) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET series_id = EXCLUDED.series_id, \
             name = EXCLUDED.name, content_hash = EXCLUDED.content_hash",
        )
        .bind(deck.id)
        .bind(deck.series_id)
        .bind(&deck.name)
        .bind(&deck.content_hash)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_deck(&self, id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM slide_decks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Slides ---

    async fn get_slide(&self, id: Uuid) -> PortResult<Option<Slide>> {
        let record = sqlx::query_as::<_, SlideRecord>(&format!(
            "SELECT {SLIDE_COLUMNS} FROM slides WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SlideRecord::to_domain))
    }

    async fn list_slides(&self) -> PortResult<Vec<Slide>> {
        let records = sqlx::query_as::<_, SlideRecord>(&format!(
            "SELECT {SLIDE_COLUMNS} FROM slides ORDER BY deck_id, number"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(SlideRecord::to_domain).collect())
    }

    async fn list_slides_by_deck(&self, deck_id: Uuid) -> PortResult<Vec<Slide>> {
        let records = sqlx::query_as::<_, SlideRecord>(&format!(
            "SELECT {SLIDE_COLUMNS} FROM slides WHERE deck_id = $1 ORDER BY number"
        ))
        .bind(deck_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(SlideRecord::to_domain).collect())
    }

    async fn save_slide(&self, slide: &Slide) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO slides (id, deck_id, number, content_scrape, content_ocr, ocr_failed) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET deck_id = EXCLUDED.deck_id, number = EXCLUDED.number, \
             content_scrape = EXCLUDED.content_scrape, content_ocr = EXCLUDED.content_ocr, \
             ocr_failed = EXCLUDED.ocr_failed",
        )
        .bind(slide.id)
        .bind(slide.deck_id)
        .bind(slide.number as i32)
        .bind(&slide.content_scrape)
        .bind(&slide.content_ocr)
        .bind(slide.ocr_failed)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_slide(&self, id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM slides WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Ingestion Jobs ---

    async fn get_job(&self, id: Uuid) -> PortResult<Option<IngestJob>> {
        let record = sqlx::query_as::<_, JobRecord>(&format!(
            "SELECT {JOB_COLUMNS} FROM ingest_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(JobRecord::to_domain).transpose()
    }

    async fn list_jobs(&self) -> PortResult<Vec<IngestJob>> {
        let records = sqlx::query_as::<_, JobRecord>(&format!(
            "SELECT {JOB_COLUMNS} FROM ingest_jobs ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(JobRecord::to_domain).collect()
    }

    async fn save_job(&self, job: &IngestJob) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO ingest_jobs (id, series_id, file_name, status, deck_id, error, \
             pages_total, pages_ocr_failed, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, deck_id = EXCLUDED.deck_id, \
             error = EXCLUDED.error, pages_total = EXCLUDED.pages_total, \
             pages_ocr_failed = EXCLUDED.pages_ocr_failed, updated_at = EXCLUDED.updated_at",
        )
        .bind(job.id)
        .bind(job.series_id)
        .bind(&job.file_name)
        .bind(job.status.as_str())
        .bind(job.deck_id)
        .bind(&job.error)
        .bind(job.pages_total as i32)
        .bind(job.pages_ocr_failed as i32)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}
