pub mod blob_fs;
pub mod ocr_llm;
pub mod pdf;
pub mod postgres;
pub mod tantivy_index;

pub use blob_fs::FsBlobStore;
pub use ocr_llm::OpenAiOcrAdapter;
pub use pdf::{LopdfTextExtractor, PdfiumRasterizer};
pub use postgres::PgObjectStore;
pub use tantivy_index::TantivySearchIndex;
