//! crates/slide_search_core/src/persistence.rs
//!
//! The persistence writer owns the write ordering between the object store,
//! the blob store and the search index.
//!
//! Create: blob, deck, slides, and only then index documents. A stored slide
//! that is not yet indexed is merely unsearchable; an indexed slide that is not
//! stored would surface as a dangling hit.
//!
//! Delete: index documents first (one batch), then slides, deck and blob, so a
//! search can never resolve to a record that is already gone.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assembler::AssembledDeck;
use crate::domain::{LectureSeries, SlideDeck, SlideDocument};
use crate::error::{SlideSearchError, SlideSearchResult};
use crate::ports::{BlobStore, ObjectStore, SearchIndex};

const REINDEX_BATCH_SIZE: usize = 500;

/// What a deck deletion removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeckDeletion {
    pub deck_existed: bool,
    pub slides_removed: usize,
}

#[derive(Clone)]
pub struct PersistenceWriter {
    store: Arc<dyn ObjectStore>,
    blobs: Arc<dyn BlobStore>,
    index: Arc<dyn SearchIndex>,
}

impl PersistenceWriter {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        blobs: Arc<dyn BlobStore>,
        index: Arc<dyn SearchIndex>,
    ) -> Self {
        Self {
            store,
            blobs,
            index,
        }
    }

    /// Durably stores an assembled deck, then makes its slides searchable.
    ///
    /// A store failure rolls back what was written so far on a best-effort
    /// basis. An index failure leaves the entities stored and is reported as
    /// `IndexWriteFailed`; `reindex_all` repairs it.
    pub async fn commit(&self, assembled: &AssembledDeck, pdf: Bytes) -> SlideSearchResult<()> {
        let deck = &assembled.deck;

        if let Err(source) = self.store_entities(assembled, pdf).await {
            self.rollback(assembled).await;
            return Err(source);
        }

        let documents = assembled.slides.iter().map(SlideDocument::from).collect();
        self.index
            .add_documents(documents)
            .await
            .map_err(|source| SlideSearchError::IndexWriteFailed {
                context: format!("deck {}", deck.id),
                stored_deck: Some(deck.id),
                source,
            })?;

        info!(
            deck_id = %deck.id,
            series_id = %deck.series_id,
            slides = assembled.slides.len(),
            "deck committed"
        );
        Ok(())
    }

    async fn store_entities(&self, assembled: &AssembledDeck, pdf: Bytes) -> SlideSearchResult<()> {
        let deck = &assembled.deck;
        self.blobs
            .put(deck.id, pdf)
            .await
            .map_err(|source| SlideSearchError::StoreWriteFailed {
                context: format!("PDF blob {}", deck.blob_name()),
                source,
            })?;

        self.store
            .save_deck(deck)
            .await
            .map_err(|source| SlideSearchError::StoreWriteFailed {
                context: format!("deck {}", deck.id),
                source,
            })?;

        for slide in &assembled.slides {
            self.store
                .save_slide(slide)
                .await
                .map_err(|source| SlideSearchError::StoreWriteFailed {
                    context: format!("slide {} of deck {}", slide.number, deck.id),
                    source,
                })?;
        }
        Ok(())
    }

    async fn rollback(&self, assembled: &AssembledDeck) {
        let deck_id = assembled.deck.id;
        for slide in &assembled.slides {
            if let Err(err) = self.store.delete_slide(slide.id).await {
                warn!(%deck_id, slide_id = %slide.id, "rollback could not delete slide: {}", err);
            }
        }
        if let Err(err) = self.store.delete_deck(deck_id).await {
            warn!(%deck_id, "rollback could not delete deck: {}", err);
        }
        if let Err(err) = self.blobs.delete(deck_id).await {
            warn!(%deck_id, "rollback could not delete blob: {}", err);
        }
    }

    /// Deletes a deck with all of its slides, their index documents and the blob.
    /// Deleting an unknown deck is a no-op.
    pub async fn delete_deck(&self, deck_id: Uuid) -> SlideSearchResult<DeckDeletion> {
        let deck_existed = self.store.get_deck(deck_id).await?.is_some();
        let slides = self.store.list_slides_by_deck(deck_id).await?;

        if !slides.is_empty() {
            let ids: Vec<Uuid> = slides.iter().map(|slide| slide.id).collect();
            self.index
                .delete_documents(&ids)
                .await
                .map_err(|source| SlideSearchError::IndexWriteFailed {
                    context: format!("deletion of deck {deck_id}"),
                    stored_deck: None,
                    source,
                })?;
        }

        for slide in &slides {
            self.store
                .delete_slide(slide.id)
                .await
                .map_err(|source| SlideSearchError::StoreWriteFailed {
                    context: format!("deletion of slide {}", slide.id),
                    source,
                })?;
        }

        self.store
            .delete_deck(deck_id)
            .await
            .map_err(|source| SlideSearchError::StoreWriteFailed {
                context: format!("deletion of deck {deck_id}"),
                source,
            })?;

        self.blobs
            .delete(deck_id)
            .await
            .map_err(|source| SlideSearchError::StoreWriteFailed {
                context: format!("deletion of the PDF blob of deck {deck_id}"),
                source,
            })?;

        if deck_existed {
            info!(%deck_id, slides = slides.len(), "deck deleted");
        }
        Ok(DeckDeletion {
            deck_existed,
            slides_removed: slides.len(),
        })
    }

    pub async fn create_series(&self, name: &str) -> SlideSearchResult<LectureSeries> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SlideSearchError::InvalidInput(
                "lecture series name must not be empty".to_string(),
            ));
        }
        let series = LectureSeries::new(name);
        self.store
            .save_series(&series)
            .await
            .map_err(|source| SlideSearchError::StoreWriteFailed {
                context: format!("lecture series {}", series.id),
                source,
            })?;
        Ok(series)
    }

    /// Deletes only the series record. Its decks stay in place, orphaned.
    pub async fn delete_series(&self, series_id: Uuid) -> SlideSearchResult<()> {
        self.store
            .delete_series(series_id)
            .await
            .map_err(|source| SlideSearchError::StoreWriteFailed {
                context: format!("deletion of lecture series {series_id}"),
                source,
            })
    }

    pub async fn rename_deck(&self, deck_id: Uuid, name: &str) -> SlideSearchResult<SlideDeck> {
        let mut deck = self
            .store
            .get_deck(deck_id)
            .await?
            .ok_or_else(|| SlideSearchError::NotFound(format!("slide deck {deck_id}")))?;
        deck.name = name.trim().to_string();
        self.store
            .save_deck(&deck)
            .await
            .map_err(|source| SlideSearchError::StoreWriteFailed {
                context: format!("deck {deck_id}"),
                source,
            })?;
        Ok(deck)
    }

    /// Rebuilds the index from the object store. Returns the number of documents indexed.
    pub async fn reindex_all(&self) -> SlideSearchResult<usize> {
        let index_error = |source| SlideSearchError::IndexWriteFailed {
            context: "full rebuild".to_string(),
            stored_deck: None,
            source,
        };

        let slides = self.store.list_slides().await?;
        self.index.clear().await.map_err(index_error)?;
        for batch in slides.chunks(REINDEX_BATCH_SIZE) {
            let documents = batch.iter().map(SlideDocument::from).collect();
            self.index.add_documents(documents).await.map_err(index_error)?;
        }

        info!(documents = slides.len(), "search index rebuilt");
        Ok(slides.len())
    }
}
