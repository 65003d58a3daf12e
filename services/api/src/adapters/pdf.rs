//! services/api/src/adapters/pdf.rs
//!
//! PDF adapters: page rendering through Pdfium and text-layer extraction
//! through `lopdf`. Both parse the same bytes independently and run on the
//! blocking pool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use pdfium_render::prelude::{PdfRenderConfig, Pdfium, PdfiumError};
use slide_search_core::domain::PageImage;
use slide_search_core::ports::{PortError, PortResult, Rasterizer, TextExtractor};
use tracing::{debug, warn};

//=========================================================================================
// Rasterizer (Pdfium)
//=========================================================================================

/// Renders every page to a PNG of a fixed target width.
#[derive(Clone, Debug)]
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
    target_width: u16,
}

impl PdfiumRasterizer {
    pub fn new(library_path: Option<PathBuf>, target_width: u16) -> Self {
        Self {
            library_path,
            target_width,
        }
    }

    /// Binds the Pdfium library once to fail fast at startup when it is missing.
    pub fn check_library(&self) -> PortResult<()> {
        load_pdfium(self.library_path.as_deref())
            .map(|_| ())
            .map_err(|e| PortError::Unexpected(format!("failed to load Pdfium runtime: {e}")))
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(&self, pdf: Bytes) -> PortResult<Vec<PageImage>> {
        let library_path = self.library_path.clone();
        let target_width = self.target_width;
        tokio::task::spawn_blocking(move || {
            render_pages(library_path.as_deref(), &pdf, target_width)
        })
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
    }
}

fn render_pages(
    library_path: Option<&Path>,
    bytes: &[u8],
    target_width: u16,
) -> PortResult<Vec<PageImage>> {
    let pdfium = load_pdfium(library_path)
        .map_err(|e| PortError::Unexpected(format!("failed to load Pdfium runtime: {e}")))?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| PortError::MalformedDocument(e.to_string()))?;

    let render_config = PdfRenderConfig::new().set_target_width(i32::from(target_width));
    let mut images = Vec::with_capacity(document.pages().len() as usize);

    for (page_index, page) in document.pages().iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            PortError::Unexpected(format!("failed to render page {}: {}", page_index + 1, e))
        })?;

        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;
        let rgba = bitmap.as_rgba_bytes();

        let mut encoded = Vec::new();
        PngEncoder::new(&mut encoded)
            .write_image(&rgba, width, height, ColorType::Rgba8.into())
            .map_err(|e| {
                PortError::Unexpected(format!("failed to encode page {}: {}", page_index + 1, e))
            })?;

        images.push(PageImage {
            page_index,
            width,
            height,
            png_data: Bytes::from(encoded),
        });
    }

    debug!(pages = images.len(), "rendered PDF pages");
    Ok(images)
}

fn load_pdfium(library_path: Option<&Path>) -> Result<Pdfium, PdfiumError> {
    if let Some(path) = library_path {
        let library = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(path)
        } else {
            path.to_path_buf()
        };
        return Pdfium::bind_to_library(library).map(Pdfium::new);
    }

    match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./")) {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(primary_err) => match Pdfium::bind_to_system_library() {
            Ok(bindings) => Ok(Pdfium::new(bindings)),
            Err(_) => Err(primary_err),
        },
    }
}

//=========================================================================================
// Text Extractor (lopdf)
//=========================================================================================

/// Extracts the text layer page by page. A page whose text cannot be decoded
/// yields an empty chunk so indices stay aligned with the rendered pages.
#[derive(Clone, Copy, Debug, Default)]
pub struct LopdfTextExtractor;

#[async_trait]
impl TextExtractor for LopdfTextExtractor {
    async fn extract_pages(&self, pdf: Bytes) -> PortResult<Vec<String>> {
        tokio::task::spawn_blocking(move || extract_pages(&pdf))
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
    }
}

fn extract_pages(bytes: &[u8]) -> PortResult<Vec<String>> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| PortError::MalformedDocument(e.to_string()))?;

    let pages = document.get_pages();
    let mut chunks = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => chunks.push(text.trim().to_string()),
            Err(e) => {
                warn!(page = page_number, "no text layer extracted: {}", e);
                chunks.push(String::new());
            }
        }
    }
    Ok(chunks)
}
