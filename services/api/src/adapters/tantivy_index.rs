//! services/api/src/adapters/tantivy_index.rs
//!
//! An embedded full-text index over slide documents, implementing the
//! `SearchIndex` port with Tantivy. Documents are keyed by the slide `uuid`
//! and filterable by `deck_uuid`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use slide_search_core::domain::{SearchHit, SlideDocument};
use slide_search_core::ports::{PortError, PortResult, SearchIndex};
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::*;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};
use uuid::Uuid;

const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Clone, Copy)]
struct Fields {
    uuid: Field,
    deck_uuid: Field,
    number: Field,
    content_scrape: Field,
    content_ocr: Field,
}

fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field("uuid", STRING | STORED);
    schema_builder.add_text_field("deck_uuid", STRING | STORED);
    schema_builder.add_u64_field("number", INDEXED | STORED);
    schema_builder.add_text_field("content_scrape", TEXT | STORED);
    schema_builder.add_text_field("content_ocr", TEXT | STORED);
    schema_builder.build()
}

fn resolve_fields(schema: &Schema) -> PortResult<Fields> {
    let field = |name: &str| schema.get_field(name).map_err(index_error);
    Ok(Fields {
        uuid: field("uuid")?,
        deck_uuid: field("deck_uuid")?,
        number: field("number")?,
        content_scrape: field("content_scrape")?,
        content_ocr: field("content_ocr")?,
    })
}

fn index_error(e: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(format!("search index: {e}"))
}

struct Inner {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: Fields,
}

/// Tantivy-backed `SearchIndex`. Every write is committed before it returns.
#[derive(Clone)]
pub struct TantivySearchIndex {
    inner: Arc<Inner>,
}

impl TantivySearchIndex {
    /// A volatile index, rebuilt from the object store on start.
    pub fn in_memory() -> PortResult<Self> {
        Self::from_index(Index::create_in_ram(build_schema()))
    }

    /// Opens the index stored in `path`, creating it if needed.
    pub fn open_or_create(path: &Path) -> PortResult<Self> {
        std::fs::create_dir_all(path).map_err(index_error)?;
        let directory = MmapDirectory::open(path).map_err(index_error)?;
        let index = Index::open_or_create(directory, build_schema()).map_err(index_error)?;
        info!(path = %path.display(), "opened search index");
        Self::from_index(index)
    }

    fn from_index(index: Index) -> PortResult<Self> {
        let fields = resolve_fields(&index.schema())?;
        let writer: IndexWriter = index
            .writer_with_num_threads(1, WRITER_HEAP_BYTES)
            .map_err(index_error)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e: tantivy::TantivyError| index_error(e))?;
        Ok(Self {
            inner: Arc::new(Inner {
                index,
                reader,
                writer: Mutex::new(writer),
                fields,
            }),
        })
    }

    /// Number of live documents in the last committed state.
    pub fn num_docs(&self) -> u64 {
        self.inner.reader.searcher().num_docs()
    }

    /// Runs a write batch on the blocking pool, then commits and reloads the reader.
    async fn write<F>(&self, batch: F) -> PortResult<()>
    where
        F: FnOnce(&mut IndexWriter, &Fields) -> tantivy::Result<()> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut writer = inner
                .writer
                .lock()
                .map_err(|_| index_error("writer lock poisoned"))?;
            if let Err(e) = batch(&mut *writer, &inner.fields) {
                let _ = writer.rollback();
                return Err(index_error(e));
            }
            writer.commit().map_err(index_error)?;
            inner.reader.reload().map_err(index_error)
        })
        .await
        .map_err(index_error)?
    }
}

impl Inner {
    fn build_query(&self, text: &str, deck_filter: Option<&[Uuid]>) -> Box<dyn Query> {
        let text_query: Box<dyn Query> = if text.is_empty() {
            Box::new(AllQuery)
        } else {
            let parser = QueryParser::for_index(
                &self.index,
                vec![self.fields.content_ocr, self.fields.content_scrape],
            );
            let (query, errors) = parser.parse_query_lenient(text);
            if !errors.is_empty() {
                debug!(?errors, "lenient query parse dropped parts of the query");
            }
            query
        };

        match deck_filter {
            None => text_query,
            Some(decks) => {
                let any_deck: Vec<(Occur, Box<dyn Query>)> = decks
                    .iter()
                    .map(|deck_id| {
                        let term = Term::from_field_text(self.fields.deck_uuid, &deck_id.to_string());
                        let query: Box<dyn Query> =
                            Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                        (Occur::Should, query)
                    })
                    .collect();
                Box::new(BooleanQuery::new(vec![
                    (Occur::Must, text_query),
                    (Occur::Must, Box::new(BooleanQuery::new(any_deck))),
                ]))
            }
        }
    }

    fn to_hit(&self, doc: &TantivyDocument, score: f32) -> PortResult<SearchHit> {
        let uuid_of = |field: Field| {
            doc.get_first(field)
                .and_then(|value| value.as_str())
                .ok_or_else(|| index_error("stored document is missing an id"))
                .and_then(|raw| Uuid::parse_str(raw).map_err(index_error))
        };
        Ok(SearchHit {
            slide_id: uuid_of(self.fields.uuid)?,
            deck_id: uuid_of(self.fields.deck_uuid)?,
            score,
        })
    }
}

#[async_trait]
impl SearchIndex for TantivySearchIndex {
    async fn add_documents(&self, documents: Vec<SlideDocument>) -> PortResult<()> {
        if documents.is_empty() {
            return Ok(());
        }
        self.write(move |writer, fields| {
            for document in documents {
                let id = document.uuid.to_string();
                writer.delete_term(Term::from_field_text(fields.uuid, &id));
                writer.add_document(doc!(
                    fields.uuid => id,
                    fields.deck_uuid => document.deck_uuid.to_string(),
                    fields.number => u64::from(document.number),
                    fields.content_scrape => document.content_scrape,
                    fields.content_ocr => document.content_ocr
                ))?;
            }
            Ok(())
        })
        .await
    }

    async fn delete_documents(&self, slide_ids: &[Uuid]) -> PortResult<()> {
        if slide_ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = slide_ids.iter().map(Uuid::to_string).collect();
        self.write(move |writer, fields| {
            for id in &ids {
                writer.delete_term(Term::from_field_text(fields.uuid, id));
            }
            Ok(())
        })
        .await
    }

    async fn search(
        &self,
        text: &str,
        deck_filter: Option<&[Uuid]>,
        limit: usize,
    ) -> PortResult<Vec<SearchHit>> {
        if matches!(deck_filter, Some(decks) if decks.is_empty()) {
            return Ok(Vec::new());
        }
        let inner = self.inner.clone();
        let text = text.trim().to_string();
        let deck_filter = deck_filter.map(<[Uuid]>::to_vec);

        tokio::task::spawn_blocking(move || {
            let query = inner.build_query(&text, deck_filter.as_deref());
            let searcher = inner.reader.searcher();
            let top_docs = searcher
                .search(&query, &TopDocs::with_limit(limit.max(1)))
                .map_err(index_error)?;

            top_docs
                .into_iter()
                .map(|(score, address)| {
                    let doc = searcher
                        .doc::<TantivyDocument>(address)
                        .map_err(index_error)?;
                    inner.to_hit(&doc, score)
                })
                .collect()
        })
        .await
        .map_err(index_error)?
    }

    async fn clear(&self) -> PortResult<()> {
        self.write(|writer, _| writer.delete_all_documents().map(|_| ()))
            .await
    }
}
