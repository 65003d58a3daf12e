//! crates/slide_search_core/src/search.rs
//!
//! Free-text search over slides, optionally scoped to lecture series.
//! The index only supplies ranked ids; the object store is authoritative.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::Slide;
use crate::error::SlideSearchResult;
use crate::ports::{ObjectStore, SearchIndex};

pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// A resolved search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSlide {
    #[serde(flatten)]
    pub slide: Slide,
    pub score: f32,
}

#[derive(Clone)]
pub struct SearchEngine {
    store: Arc<dyn ObjectStore>,
    index: Arc<dyn SearchIndex>,
    limit: usize,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn ObjectStore>, index: Arc<dyn SearchIndex>, limit: usize) -> Self {
        Self {
            store,
            index,
            limit: limit.max(1),
        }
    }

    /// Runs `query` and resolves every hit to its stored slide, in ranked order.
    ///
    /// With `series_scope`, only slides of decks owned by those series match;
    /// a scope that resolves to no decks yields no results.
    pub async fn search(
        &self,
        query: &str,
        series_scope: Option<&[Uuid]>,
    ) -> SlideSearchResult<Vec<RankedSlide>> {
        let deck_filter = match series_scope {
            Some(series_ids) => {
                let decks = self.resolve_scope(series_ids).await?;
                if decks.is_empty() {
                    debug!(?series_ids, "search scope has no decks");
                    return Ok(Vec::new());
                }
                Some(decks)
            }
            None => None,
        };

        let hits = self
            .index
            .search(query.trim(), deck_filter.as_deref(), self.limit)
            .await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.store.get_slide(hit.slide_id).await? {
                Some(slide) => results.push(RankedSlide {
                    slide,
                    score: hit.score,
                }),
                None => warn!(slide_id = %hit.slide_id, "dropping search hit without a stored slide"),
            }
        }
        Ok(results)
    }

    async fn resolve_scope(&self, series_ids: &[Uuid]) -> SlideSearchResult<Vec<Uuid>> {
        let unique: HashSet<Uuid> = series_ids.iter().copied().collect();
        let mut decks = Vec::new();
        for series_id in unique {
            decks.extend(
                self.store
                    .list_decks_by_series(series_id)
                    .await?
                    .into_iter()
                    .map(|deck| deck.id),
            );
        }
        Ok(decks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LectureSeries, SlideDeck, SlideDocument};
    use crate::memory::InMemoryObjectStore;
    use crate::testing::FakeIndex;

    struct Fixture {
        store: Arc<InMemoryObjectStore>,
        index: Arc<FakeIndex>,
        engine: SearchEngine,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryObjectStore::new());
        let index = Arc::new(FakeIndex::default());
        let engine = SearchEngine::new(store.clone(), index.clone(), DEFAULT_SEARCH_LIMIT);
        Fixture {
            store,
            index,
            engine,
        }
    }

    async fn seed_deck(fx: &Fixture, series_id: Uuid, ocr_text: &str) -> Slide {
        let deck = SlideDeck {
            id: Uuid::new_v4(),
            series_id,
            name: "deck".into(),
            content_hash: String::new(),
        };
        let slide = Slide {
            id: Uuid::new_v4(),
            deck_id: deck.id,
            number: 1,
            content_scrape: String::new(),
            content_ocr: ocr_text.into(),
            ocr_failed: false,
        };
        fx.store.save_deck(&deck).await.unwrap();
        fx.store.save_slide(&slide).await.unwrap();
        fx.index.inject(SlideDocument::from(&slide));
        slide
    }

    #[tokio::test]
    async fn exact_text_resolves_to_the_same_slide() {
        let fx = fixture();
        let slide = seed_deck(&fx, Uuid::new_v4(), "Introduction to Systems").await;

        let results = fx.engine.search("Introduction to Systems", None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].slide, slide);
    }

    #[tokio::test]
    async fn scoped_search_only_returns_slides_of_that_series() {
        let fx = fixture();
        let systems = LectureSeries::new("Systems");
        let other = LectureSeries::new("Other");
        let inside = seed_deck(&fx, systems.id, "scheduling").await;
        seed_deck(&fx, other.id, "scheduling").await;

        let results = fx
            .engine
            .search("scheduling", Some(&[systems.id]))
            .await
            .unwrap();
        let ids: Vec<Uuid> = results.iter().map(|r| r.slide.id).collect();
        assert_eq!(ids, vec![inside.id]);
    }

    #[tokio::test]
    async fn a_scope_without_decks_is_empty_not_unfiltered() {
        let fx = fixture();
        seed_deck(&fx, Uuid::new_v4(), "scheduling").await;

        let results = fx
            .engine
            .search("scheduling", Some(&[Uuid::new_v4()]))
            .await
            .unwrap();
        assert!(results.is_empty());

        let empty_scope = fx.engine.search("scheduling", Some(&[])).await.unwrap();
        assert!(empty_scope.is_empty());
    }

    #[tokio::test]
    async fn stale_index_hits_are_dropped() {
        let fx = fixture();
        let live = seed_deck(&fx, Uuid::new_v4(), "paging").await;
        let stale = seed_deck(&fx, Uuid::new_v4(), "paging").await;
        fx.store.delete_slide(stale.id).await.unwrap();

        let results = fx.engine.search("paging", None).await.unwrap();
        let ids: Vec<Uuid> = results.iter().map(|r| r.slide.id).collect();
        assert_eq!(ids, vec![live.id]);
    }
}
