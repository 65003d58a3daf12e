//! crates/slide_search_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! Records carry an explicit serde schema so that stored or imported JSON with
//! unknown or missing fields is rejected instead of silently accepted.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Stored Entities
//=========================================================================================

/// A named collection of slide decks, e.g. one university course.
///
/// The series does not hold the list of its decks; ownership is recorded on
/// each deck and queried explicitly with `ObjectStore::list_decks_by_series`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LectureSeries {
    #[serde(rename = "uuid")]
    pub id: Uuid,
    pub name: String,
}

impl LectureSeries {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// One uploaded PDF document, owned by a lecture series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlideDeck {
    #[serde(rename = "uuid")]
    pub id: Uuid,
    #[serde(rename = "series_uuid")]
    pub series_id: Uuid,
    pub name: String,
    /// Lowercase hex SHA-256 of the uploaded bytes.
    #[serde(rename = "file_hash")]
    pub content_hash: String,
}

impl SlideDeck {
    /// The file name under which the deck's PDF blob is stored.
    pub fn blob_name(&self) -> String {
        blob_name(self.id)
    }
}

/// Deterministic blob file name for a deck id.
pub fn blob_name(deck_id: Uuid) -> String {
    format!("{deck_id}.pdf")
}

/// A single page of a deck with its two independently produced transcriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Slide {
    #[serde(rename = "uuid")]
    pub id: Uuid,
    #[serde(rename = "deck_uuid")]
    pub deck_id: Uuid,
    /// 1-based page position inside the deck.
    pub number: u32,
    pub content_scrape: String,
    pub content_ocr: String,
    /// Set when the vision OCR call for this page failed; `content_ocr` is empty then.
    #[serde(default)]
    pub ocr_failed: bool,
}

//=========================================================================================
// Search Index Projection
//=========================================================================================

/// The search-engine-side projection of a slide. Never authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideDocument {
    pub uuid: Uuid,
    pub deck_uuid: Uuid,
    pub number: u32,
    pub content_scrape: String,
    pub content_ocr: String,
}

impl From<&Slide> for SlideDocument {
    fn from(slide: &Slide) -> Self {
        Self {
            uuid: slide.id,
            deck_uuid: slide.deck_id,
            number: slide.number,
            content_scrape: slide.content_scrape.clone(),
            content_ocr: slide.content_ocr.clone(),
        }
    }
}

/// A ranked hit returned by the search index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub slide_id: Uuid,
    pub deck_id: Uuid,
    pub score: f32,
}

//=========================================================================================
// Pipeline Values
//=========================================================================================

/// A rasterized PDF page, PNG-encoded.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-based position of the page in the document.
    pub page_index: usize,
    pub width: u32,
    pub height: u32,
    pub png_data: Bytes,
}

//=========================================================================================
// Ingestion Jobs
//=========================================================================================

/// Lifecycle state of an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// A pollable record of one PDF upload being turned into a deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestJob {
    pub id: Uuid,
    pub series_id: Uuid,
    pub file_name: String,
    pub status: JobStatus,
    pub deck_id: Option<Uuid>,
    pub error: Option<String>,
    pub pages_total: u32,
    pub pages_ocr_failed: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IngestJob {
    pub fn new(series_id: Uuid, file_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            series_id,
            file_name: file_name.into(),
            status: JobStatus::Pending,
            deck_id: None,
            error: None,
            pages_total: 0,
            pages_ocr_failed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// `pending -> processing`. Returns false if the job is not pending.
    pub fn mark_processing(&mut self) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }
        self.status = JobStatus::Processing;
        self.updated_at = Utc::now();
        true
    }

    /// `processing -> completed`. Returns false if the job is not processing.
    pub fn mark_completed(&mut self, deck_id: Uuid, pages_total: u32, pages_ocr_failed: u32) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        self.status = JobStatus::Completed;
        self.deck_id = Some(deck_id);
        self.pages_total = pages_total;
        self.pages_ocr_failed = pages_ocr_failed;
        self.updated_at = Utc::now();
        true
    }

    /// `pending | processing -> failed`. Terminal jobs are left untouched.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
        true
    }
}
