//! crates/slide_search_core/src/snapshot.rs
//!
//! Versioned export and import of every stored record. PDF blobs are not included.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::domain::{LectureSeries, Slide, SlideDeck};
use crate::error::{SlideSearchError, SlideSearchResult};
use crate::persistence::PersistenceWriter;
use crate::ports::ObjectStore;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    pub version: u32,
    pub lecture_series: Vec<LectureSeries>,
    pub slide_decks: Vec<SlideDeck>,
    pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub lecture_series: usize,
    pub slide_decks: usize,
    pub slides: usize,
    pub indexed: usize,
}

impl Snapshot {
    pub fn from_json(bytes: &[u8]) -> SlideSearchResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| SlideSearchError::InvalidInput(format!("invalid snapshot: {e}")))
    }
}

pub async fn export_snapshot(store: &dyn ObjectStore) -> SlideSearchResult<Snapshot> {
    let mut lecture_series = store.list_series().await?;
    let mut slide_decks = store.list_decks().await?;
    let mut slides = store.list_slides().await?;
    lecture_series.sort_by_key(|series| series.id);
    slide_decks.sort_by_key(|deck| deck.id);
    slides.sort_by_key(|slide| (slide.deck_id, slide.number));

    Ok(Snapshot {
        version: SNAPSHOT_VERSION,
        lecture_series,
        slide_decks,
        slides,
    })
}

/// Saves every record of the snapshot, then rebuilds the search index.
/// Records with an existing id are overwritten. Nothing is written unless
/// every slide names a known deck and each touched deck ends up numbered `1..=N`.
pub async fn import_snapshot(
    store: &dyn ObjectStore,
    writer: &PersistenceWriter,
    snapshot: Snapshot,
) -> SlideSearchResult<ImportSummary> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SlideSearchError::InvalidInput(format!(
            "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
            snapshot.version
        )));
    }

    validate_slides(store, &snapshot).await?;

    let store_error = |context: String| {
        move |source| SlideSearchError::StoreWriteFailed { context, source }
    };

    for series in &snapshot.lecture_series {
        store
            .save_series(series)
            .await
            .map_err(store_error(format!("lecture series {}", series.id)))?;
    }
    for deck in &snapshot.slide_decks {
        store
            .save_deck(deck)
            .await
            .map_err(store_error(format!("deck {}", deck.id)))?;
    }
    for slide in &snapshot.slides {
        store
            .save_slide(slide)
            .await
            .map_err(store_error(format!("slide {}", slide.id)))?;
    }

    let indexed = writer.reindex_all().await?;
    let summary = ImportSummary {
        lecture_series: snapshot.lecture_series.len(),
        slide_decks: snapshot.slide_decks.len(),
        slides: snapshot.slides.len(),
        indexed,
    };
    info!(?summary, "snapshot imported");
    Ok(summary)
}

/// Checks the slides a snapshot would leave behind, merged with what is already stored.
async fn validate_slides(store: &dyn ObjectStore, snapshot: &Snapshot) -> SlideSearchResult<()> {
    let snapshot_decks: HashSet<Uuid> = snapshot.slide_decks.iter().map(|deck| deck.id).collect();
    let touched: HashSet<Uuid> = snapshot.slides.iter().map(|slide| slide.deck_id).collect();

    // Slide id -> (deck id, number) after the import.
    let mut merged: HashMap<Uuid, (Uuid, u32)> = HashMap::new();
    for deck_id in &touched {
        if !snapshot_decks.contains(deck_id) && store.get_deck(*deck_id).await?.is_none() {
            return Err(SlideSearchError::InvalidInput(format!(
                "slides reference unknown deck {deck_id}"
            )));
        }
        for slide in store.list_slides_by_deck(*deck_id).await? {
            merged.insert(slide.id, (slide.deck_id, slide.number));
        }
    }
    for slide in &snapshot.slides {
        merged.insert(slide.id, (slide.deck_id, slide.number));
    }

    let mut numbers_by_deck: BTreeMap<Uuid, Vec<u32>> = BTreeMap::new();
    for (deck_id, number) in merged.into_values() {
        numbers_by_deck.entry(deck_id).or_default().push(number);
    }
    for (deck_id, mut numbers) in numbers_by_deck {
        numbers.sort_unstable();
        let dense = numbers
            .iter()
            .enumerate()
            .all(|(position, number)| *number as usize == position + 1);
        if !dense {
            return Err(SlideSearchError::InvalidInput(format!(
                "slides of deck {deck_id} must be numbered 1..={} without gaps or duplicates, got {numbers:?}",
                numbers.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryBlobStore, InMemoryObjectStore};
    use crate::testing::FakeIndex;
    use std::sync::Arc;

    fn sample() -> Snapshot {
        let series = LectureSeries::new("Databases");
        let deck = SlideDeck {
            id: Uuid::new_v4(),
            series_id: series.id,
            name: "B-Trees".into(),
            content_hash: "00".into(),
        };
        let slides = (1..=2)
            .map(|number| Slide {
                id: Uuid::new_v4(),
                deck_id: deck.id,
                number,
                content_scrape: format!("scrape {number}"),
                content_ocr: format!("ocr {number}"),
                ocr_failed: false,
            })
            .collect();
        Snapshot {
            version: SNAPSHOT_VERSION,
            lecture_series: vec![series],
            slide_decks: vec![deck],
            slides,
        }
    }

    #[tokio::test]
    async fn import_then_export_yields_the_same_records() {
        let store = Arc::new(InMemoryObjectStore::new());
        let index = Arc::new(FakeIndex::default());
        let writer = PersistenceWriter::new(store.clone(), Arc::new(InMemoryBlobStore::new()), index.clone());

        let snapshot = sample();
        let summary = import_snapshot(store.as_ref(), &writer, snapshot.clone())
            .await
            .unwrap();
        assert_eq!(summary.slides, 2);
        assert_eq!(summary.indexed, 2);
        assert_eq!(index.ids().len(), 2);

        let exported = export_snapshot(store.as_ref()).await.unwrap();
        assert_eq!(exported.lecture_series, snapshot.lecture_series);
        assert_eq!(exported.slide_decks, snapshot.slide_decks);
        assert_eq!(exported.slides, snapshot.slides);
    }

    #[tokio::test]
    async fn unsupported_versions_are_rejected() {
        let store = Arc::new(InMemoryObjectStore::new());
        let writer = PersistenceWriter::new(
            store.clone(),
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(FakeIndex::default()),
        );
        let snapshot = Snapshot {
            version: 2,
            ..sample()
        };
        let err = import_snapshot(store.as_ref(), &writer, snapshot).await.unwrap_err();
        assert!(matches!(err, SlideSearchError::InvalidInput(_)));
        assert!(store.list_series().await.unwrap().is_empty());
    }

    #[test]
    fn unknown_and_missing_fields_are_rejected() {
        let unknown = br#"{"version":1,"lecture_series":[],"slide_decks":[],"slides":[],"extra":1}"#;
        assert!(Snapshot::from_json(unknown).is_err());

        let missing = br#"{"version":1,"lecture_series":[],"slides":[]}"#;
        assert!(Snapshot::from_json(missing).is_err());

        let ok = br#"{"version":1,"lecture_series":[],"slide_decks":[],"slides":[]}"#;
        assert!(Snapshot::from_json(ok).is_ok());
    }

    fn writer_over(store: &Arc<InMemoryObjectStore>) -> PersistenceWriter {
        PersistenceWriter::new(
            store.clone(),
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(FakeIndex::default()),
        )
    }

    #[tokio::test]
    async fn gapped_or_duplicate_slide_numbers_are_rejected_before_writing() {
        for numbers in [[0, 3, 3], [1, 2, 2], [1, 2, 4]] {
            let store = Arc::new(InMemoryObjectStore::new());
            let writer = writer_over(&store);
            let mut snapshot = sample();
            let template = snapshot.slides[0].clone();
            snapshot.slides = numbers
                .iter()
                .map(|number| Slide {
                    id: Uuid::new_v4(),
                    number: *number,
                    ..template.clone()
                })
                .collect();

            let err = import_snapshot(store.as_ref(), &writer, snapshot).await.unwrap_err();

            assert!(matches!(err, SlideSearchError::InvalidInput(_)), "{numbers:?}");
            assert!(store.list_series().await.unwrap().is_empty());
            assert!(store.list_slides().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn slides_of_unknown_decks_are_rejected() {
        let store = Arc::new(InMemoryObjectStore::new());
        let writer = writer_over(&store);
        let mut snapshot = sample();
        snapshot.slide_decks.clear();

        let err = import_snapshot(store.as_ref(), &writer, snapshot).await.unwrap_err();

        assert!(matches!(err, SlideSearchError::InvalidInput(_)));
        assert!(store.list_slides().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn slides_may_extend_a_stored_deck_when_numbering_stays_dense() {
        let store = Arc::new(InMemoryObjectStore::new());
        let writer = writer_over(&store);
        let first = sample();
        import_snapshot(store.as_ref(), &writer, first.clone()).await.unwrap();

        let deck = &first.slide_decks[0];
        let third = Slide {
            id: Uuid::new_v4(),
            number: 3,
            ..first.slides[0].clone()
        };
        let extension = Snapshot {
            version: SNAPSHOT_VERSION,
            lecture_series: vec![],
            slide_decks: vec![],
            slides: vec![third.clone()],
        };
        import_snapshot(store.as_ref(), &writer, extension).await.unwrap();
        assert_eq!(store.list_slides_by_deck(deck.id).await.unwrap().len(), 3);

        let clash = Snapshot {
            version: SNAPSHOT_VERSION,
            lecture_series: vec![],
            slide_decks: vec![],
            slides: vec![Slide {
                id: Uuid::new_v4(),
                ..third
            }],
        };
        let err = import_snapshot(store.as_ref(), &writer, clash).await.unwrap_err();
        assert!(matches!(err, SlideSearchError::InvalidInput(_)));
        assert_eq!(store.list_slides_by_deck(deck.id).await.unwrap().len(), 3);
    }
}
