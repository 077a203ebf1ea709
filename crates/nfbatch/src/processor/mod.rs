//! Text extraction adapter.
//!
//! Direct PDF text comes first; recognition is the fallback when the direct
//! text is too short, garbled, or (per page) missing the words every invoice
//! page carries. Failures never escape: whole-document extraction returns a
//! [`TextOutcome`] and page extraction returns possibly empty text.

pub mod image;
pub mod ocr;
pub mod pdf;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{DocumentFormat, OcrConfig};
use crate::error::ProcessError;
use crate::sanitize::redact_path;

pub use ocr::{TesseractRecognizer, TextRecognizer};
pub use pdf::{PageRenderer, PdftoppmRenderer};

/// Whole-document text shorter than this triggers recognition.
pub const MIN_DOCUMENT_TEXT_CHARS: usize = 300;

/// Page text shorter than this triggers recognition.
pub const MIN_PAGE_TEXT_CHARS: usize = 150;

/// A page lacking all of these (lower-cased) is re-read with recognition.
pub const PAGE_QUALITY_KEYWORDS: [&str; 4] = ["cnpj", "valor", "nota", "r$"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Direct,
    Ocr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOutcome {
    Extracted {
        text: String,
        method: ExtractionMethod,
    },
    Failed(String),
}

impl TextOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            TextOutcome::Extracted { text, .. } => Some(text),
            TextOutcome::Failed(_) => None,
        }
    }
}

/// Text access used by the segmenter and the extraction workers.
pub trait DocumentText: Send + Sync {
    /// Number of pages; images count as one page.
    fn page_count(&self, path: &Path) -> Result<u32, ProcessError>;

    /// Text of one 1-indexed page, empty when nothing could be read.
    fn page_text(&self, path: &Path, page: u32) -> String;

    /// Texts of several pages, in the order requested. Implementations that
    /// can open a document once should override this.
    fn page_texts(&self, path: &Path, pages: &[u32]) -> Vec<String> {
        pages.iter().map(|&page| self.page_text(path, page)).collect()
    }

    /// Text of the selected pages (or the whole file). Pages outside the
    /// document are skipped.
    fn extract(&self, path: &Path, pages: Option<&[u32]>) -> TextOutcome;
}

pub fn count_chars(text: &str) -> usize {
    text.trim().chars().count()
}

pub fn has_page_keywords(text: &str) -> bool {
    let lower = text.to_lowercase();
    PAGE_QUALITY_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Whole-document direct text that should be replaced by recognition.
pub fn document_needs_ocr(direct: &str) -> bool {
    count_chars(direct) < MIN_DOCUMENT_TEXT_CHARS || pdf::should_use_ocr(direct)
}

/// Page direct text that should be replaced by recognition.
pub fn page_needs_ocr(direct: &str) -> bool {
    count_chars(direct) < MIN_PAGE_TEXT_CHARS || !has_page_keywords(direct)
}

/// Production adapter: lopdf for direct text, a [`PageRenderer`] for
/// rasterizing pages, and a [`TextRecognizer`] for images.
pub struct TextExtractor {
    recognizer: Option<Arc<dyn TextRecognizer>>,
    renderer: Arc<dyn PageRenderer>,
    language: String,
    dpi: u32,
    page_dpi: u32,
}

impl TextExtractor {
    /// Builds the adapter from config, with Tesseract when recognition is enabled.
    pub fn new(config: &OcrConfig) -> Self {
        let recognizer: Option<Arc<dyn TextRecognizer>> = if config.enabled {
            Some(Arc::new(TesseractRecognizer::new()))
        } else {
            None
        };
        Self::build(recognizer, config)
    }

    pub fn with_recognizer(recognizer: Arc<dyn TextRecognizer>, config: &OcrConfig) -> Self {
        Self::build(Some(recognizer), config)
    }

    /// Replaces the `pdftoppm` renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    fn build(recognizer: Option<Arc<dyn TextRecognizer>>, config: &OcrConfig) -> Self {
        Self {
            recognizer,
            renderer: Arc::new(PdftoppmRenderer),
            language: ocr::language_string(&config.languages),
            dpi: config.dpi,
            page_dpi: config.page_dpi,
        }
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, ProcessError> {
        std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn format_of(path: &Path) -> Result<DocumentFormat, ProcessError> {
        DocumentFormat::from_path(path).ok_or_else(|| {
            ProcessError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_string(),
            )
        })
    }

    fn recognize_image(&self, image_bytes: &[u8]) -> Result<String, ProcessError> {
        match &self.recognizer {
            Some(recognizer) => recognizer.recognize(image_bytes, &self.language),
            None => Err(ProcessError::OcrFailed("recognition is disabled".to_string())),
        }
    }

    fn recognize_pdf_page(&self, path: &Path, page: u32, dpi: u32) -> Result<String, ProcessError> {
        let image = self.renderer.render_page(path, page, dpi)?;
        self.recognize_image(&image)
    }

    fn recognize_pdf_pages(&self, path: &Path, pages: &[u32], dpi: u32) -> String {
        let mut texts = Vec::with_capacity(pages.len());
        for &page in pages {
            let result = self.recognize_pdf_page(path, page, dpi);
            match result {
                Ok(text) => texts.push(text),
                Err(e) => tracing::warn!(page, "Page recognition failed: {}", e),
            }
        }
        texts.join("\n\n")
    }

    fn extract_image(&self, path: &Path) -> TextOutcome {
        if self.recognizer.is_none() {
            return TextOutcome::Failed("recognition is disabled and images carry no text".into());
        }
        let result = self.read(path).and_then(|bytes| self.recognize_image(&bytes));
        match result {
            Ok(text) if count_chars(&text) > 0 => TextOutcome::Extracted {
                text,
                method: ExtractionMethod::Ocr,
            },
            Ok(_) => TextOutcome::Failed("recognition produced no text".to_string()),
            Err(e) => TextOutcome::Failed(e.to_string()),
        }
    }

    fn extract_pdf(&self, path: &Path, pages: Option<&[u32]>) -> TextOutcome {
        let bytes = match self.read(path) {
            Ok(bytes) => bytes,
            Err(e) => return TextOutcome::Failed(e.to_string()),
        };

        let (direct, selected) = match pdf::load_document(&bytes) {
            Ok(doc) => {
                let selected = select_pages(pages, pdf::document_page_count(&doc));
                let direct: Vec<String> = selected
                    .iter()
                    .map(|&page| pdf::page_text(&doc, page))
                    .collect();
                (direct.join("\n\n"), selected)
            }
            Err(e) => {
                tracing::warn!(file = %redact_path(path), "{}; falling back to recognition", e);
                if self.recognizer.is_none() {
                    return TextOutcome::Failed(e.to_string());
                }
                match pdf::page_count(&bytes, path) {
                    Ok(count) => (String::new(), select_pages(pages, count)),
                    Err(e) => return TextOutcome::Failed(e.to_string()),
                }
            }
        };

        if document_needs_ocr(&direct) && self.recognizer.is_some() && !selected.is_empty() {
            let _span = tracing::info_span!(
                "processor.ocr_fallback",
                file = %redact_path(path),
                pages = selected.len()
            )
            .entered();
            let recognized = self.recognize_pdf_pages(path, &selected, self.dpi);
            if count_chars(&recognized) > 0 {
                return TextOutcome::Extracted {
                    text: recognized,
                    method: ExtractionMethod::Ocr,
                };
            }
        }

        if count_chars(&direct) > 0 {
            TextOutcome::Extracted {
                text: direct,
                method: ExtractionMethod::Direct,
            }
        } else {
            TextOutcome::Failed("no text could be extracted".to_string())
        }
    }

    /// Page mode over one parsed document; the file is read once for all
    /// requested pages.
    fn pdf_page_texts(&self, path: &Path, pages: &[u32]) -> Vec<String> {
        let doc = match self.read(path).and_then(|bytes| pdf::load_document(&bytes)) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!(file = %redact_path(path), "No direct page text: {}", e);
                None
            }
        };

        pages
            .iter()
            .map(|&page| {
                let direct = doc
                    .as_ref()
                    .map(|doc| pdf::page_text(doc, page))
                    .unwrap_or_default();
                self.page_text_or_ocr(path, page, direct)
            })
            .collect()
    }

    fn page_text_or_ocr(&self, path: &Path, page: u32, direct: String) -> String {
        if self.recognizer.is_none() || !page_needs_ocr(&direct) {
            return direct;
        }

        self.recognize_pdf_page(path, page, self.page_dpi)
            .unwrap_or_else(|e| {
                tracing::warn!(file = %redact_path(path), page, "Page recognition failed: {}", e);
                String::new()
            })
    }

    fn image_page_text(&self, path: &Path, page: u32) -> String {
        if page != 1 {
            return String::new();
        }
        self.read(path)
            .and_then(|bytes| self.recognize_image(&bytes))
            .unwrap_or_else(|e| {
                tracing::warn!(file = %redact_path(path), "Page text unavailable: {}", e);
                String::new()
            })
    }
}

/// Pages to read: the requested ones inside `[1, page_count]`, or all of them.
fn select_pages(pages: Option<&[u32]>, page_count: u32) -> Vec<u32> {
    match pages {
        Some(pages) => pages
            .iter()
            .copied()
            .filter(|p| (1..=page_count).contains(p))
            .collect(),
        None => (1..=page_count).collect(),
    }
}

impl DocumentText for TextExtractor {
    fn page_count(&self, path: &Path) -> Result<u32, ProcessError> {
        match Self::format_of(path)? {
            DocumentFormat::Image => Ok(1),
            DocumentFormat::Pdf => pdf::page_count(&self.read(path)?, path),
        }
    }

    fn page_text(&self, path: &Path, page: u32) -> String {
        self.page_texts(path, &[page]).pop().unwrap_or_default()
    }

    fn page_texts(&self, path: &Path, pages: &[u32]) -> Vec<String> {
        match Self::format_of(path) {
            Ok(DocumentFormat::Pdf) => self.pdf_page_texts(path, pages),
            Ok(DocumentFormat::Image) => pages
                .iter()
                .map(|&page| self.image_page_text(path, page))
                .collect(),
            Err(e) => {
                tracing::warn!(file = %redact_path(path), "Page text unavailable: {}", e);
                vec![String::new(); pages.len()]
            }
        }
    }

    fn extract(&self, path: &Path, pages: Option<&[u32]>) -> TextOutcome {
        let _span = tracing::info_span!("processor.extract", file = %redact_path(path)).entered();

        match Self::format_of(path) {
            Ok(DocumentFormat::Pdf) => self.extract_pdf(path, pages),
            Ok(DocumentFormat::Image) => self.extract_image(path),
            Err(e) => TextOutcome::Failed(e.to_string()),
        }
    }
}
