//! crates/slide_search_core/src/assembler.rs
//!
//! Joins OCR output with extractor output by page index and builds the deck
//! and slide entities. Pure apart from hashing; persistence happens elsewhere.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{Slide, SlideDeck};
use crate::error::{SlideSearchError, SlideSearchResult};
use crate::ocr::PageOcr;

/// Everything needed to build one deck.
pub struct AssemblyInput<'a> {
    pub series_id: Uuid,
    /// Explicit display name; derived from `file_name` when absent.
    pub name: Option<&'a str>,
    pub file_name: Option<&'a str>,
    pub pdf: &'a [u8],
    pub ocr: Vec<PageOcr>,
    pub scraped: Vec<String>,
}

/// A deck and its densely numbered slides, not yet persisted.
#[derive(Debug, Clone)]
pub struct AssembledDeck {
    pub deck: SlideDeck,
    pub slides: Vec<Slide>,
}

impl AssembledDeck {
    /// 1-based numbers of the slides whose OCR failed.
    pub fn ocr_failures(&self) -> Vec<u32> {
        self.slides
            .iter()
            .filter(|slide| slide.ocr_failed)
            .map(|slide| slide.number)
            .collect()
    }
}

pub fn assemble_deck(input: AssemblyInput<'_>) -> SlideSearchResult<AssembledDeck> {
    if input.ocr.len() != input.scraped.len() {
        return Err(SlideSearchError::ExtractorPageMismatch {
            rasterized: input.ocr.len(),
            extracted: input.scraped.len(),
        });
    }

    let name = match input.name {
        Some(name) => name.trim().to_string(),
        None => input.file_name.map(deck_name_from_file_name).unwrap_or_default(),
    };

    let deck = SlideDeck {
        id: Uuid::new_v4(),
        series_id: input.series_id,
        name,
        content_hash: content_hash(input.pdf),
    };

    let slides = input
        .ocr
        .into_iter()
        .zip(input.scraped)
        .enumerate()
        .map(|(index, (ocr, scrape))| Slide {
            id: Uuid::new_v4(),
            deck_id: deck.id,
            number: index as u32 + 1,
            content_scrape: scrape,
            ocr_failed: ocr.is_failed(),
            content_ocr: ocr.text,
        })
        .collect();

    Ok(AssembledDeck { deck, slides })
}

/// Lowercase hex SHA-256 of the raw bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Strips any directory part and the last extension: `slides/week1.v2.pdf` -> `week1.v2`.
pub fn deck_name_from_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match base.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => base.to_string(),
    }
}
