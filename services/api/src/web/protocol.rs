//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged over the REST API. Field names follow the
//! stored record layout (`uuid`, `deck_uuid`, `series_uuid`, `file_hash`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slide_search_core::{IngestJob, JobStatus, LectureSeries, RankedSlide, Slide, SlideDeck};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Request Payloads
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateSeriesRequest {
    pub name: String,
}

#[derive(Deserialize, IntoParams)]
pub struct RenameDeckQuery {
    /// The new display name of the deck.
    pub name: String,
}

//=========================================================================================
// Response Payloads
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SeriesResponse {
    pub uuid: Uuid,
    pub name: String,
}

impl From<LectureSeries> for SeriesResponse {
    fn from(series: LectureSeries) -> Self {
        Self {
            uuid: series.id,
            name: series.name,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct DeckResponse {
    pub uuid: Uuid,
    pub series_uuid: Uuid,
    pub name: String,
    /// Hex SHA-256 of the uploaded PDF.
    pub file_hash: String,
}

impl From<SlideDeck> for DeckResponse {
    fn from(deck: SlideDeck) -> Self {
        Self {
            uuid: deck.id,
            series_uuid: deck.series_id,
            name: deck.name,
            file_hash: deck.content_hash,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SlideResponse {
    pub uuid: Uuid,
    pub deck_uuid: Uuid,
    pub number: u32,
    pub content_scrape: String,
    pub content_ocr: String,
    pub ocr_failed: bool,
}

impl From<Slide> for SlideResponse {
    fn from(slide: Slide) -> Self {
        Self {
            uuid: slide.id,
            deck_uuid: slide.deck_id,
            number: slide.number,
            content_scrape: slide.content_scrape,
            content_ocr: slide.content_ocr,
            ocr_failed: slide.ocr_failed,
        }
    }
}

/// A slide matching a search query, in ranked order.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SearchResultResponse {
    #[serde(flatten)]
    pub slide: SlideResponse,
    pub score: f32,
}

impl From<RankedSlide> for SearchResultResponse {
    fn from(ranked: RankedSlide) -> Self {
        Self {
            slide: ranked.slide.into(),
            score: ranked.score,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct JobResponse {
    pub uuid: Uuid,
    pub series_uuid: Uuid,
    pub file_name: String,
    /// One of `pending`, `processing`, `completed`, `failed`.
    pub status: String,
    pub deck_uuid: Option<Uuid>,
    pub error: Option<String>,
    pub pages_total: u32,
    pub pages_ocr_failed: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobResponse {
    pub fn is_terminal(&self) -> bool {
        self.status
            .parse::<JobStatus>()
            .map(JobStatus::is_terminal)
            .unwrap_or(false)
    }
}

impl From<IngestJob> for JobResponse {
    fn from(job: IngestJob) -> Self {
        Self {
            uuid: job.id,
            series_uuid: job.series_id,
            file_name: job.file_name,
            status: job.status.to_string(),
            deck_uuid: job.deck_id,
            error: job.error,
            pages_total: job.pages_total,
            pages_ocr_failed: job.pages_ocr_failed,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ReindexResponse {
    pub indexed: usize,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ImportResponse {
    pub lecture_series: usize,
    pub slide_decks: usize,
    pub slides: usize,
    pub indexed: usize,
}

/// The body of every error response.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
