use std::path::Path;
use std::process::Command;

use crate::error::ProcessError;

pub fn load_document(pdf_bytes: &[u8]) -> Result<lopdf::Document, ProcessError> {
    lopdf::Document::load_mem(pdf_bytes)
        .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))
}

pub fn document_page_count(doc: &lopdf::Document) -> u32 {
    doc.get_pages().len() as u32
}

/// Page count via lopdf, falling back to `pdfinfo` on `source` for files
/// lopdf rejects.
pub fn page_count(pdf_bytes: &[u8], source: &Path) -> Result<u32, ProcessError> {
    match load_document(pdf_bytes) {
        Ok(doc) => Ok(document_page_count(&doc)),
        Err(e) => {
            tracing::debug!("{}; asking pdfinfo for the page count", e);
            count_pdf_pages(source)
        }
    }
}

/// Direct text of one 1-indexed page. Missing pages and undecodable content
/// yield an empty string.
pub fn page_text(doc: &lopdf::Document, page: u32) -> String {
    doc.extract_text(&[page]).unwrap_or_default()
}

/// Pattern for Identity-H Unimplemented errors (common with CID fonts).
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Text shorter than this is considered valid regardless of character composition.
const MIN_TOTAL_CHARS: usize = 50;

/// Minimum percentage of alphanumeric characters for text to count as readable.
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

/// Returns true when directly extracted text looks unusable: empty, only
/// font-encoding error markers, or mostly non-alphanumeric noise.
pub fn should_use_ocr(text: &str) -> bool {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return true;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");

    if cleaned.is_empty() {
        return true;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    total_chars > MIN_TOTAL_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}

/// Page count from `pdfinfo` (poppler-utils).
fn count_pdf_pages(pdf_path: &Path) -> Result<u32, ProcessError> {
    let output = Command::new("pdfinfo").arg(pdf_path).output().map_err(|e| {
        ProcessError::PdfProcessing(format!(
            "Failed to run pdfinfo: {}. Make sure poppler-utils is installed.",
            e
        ))
    })?;

    if !output.status.success() {
        return Err(ProcessError::PdfProcessing(format!(
            "pdfinfo failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_pdfinfo_pages(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        ProcessError::PdfProcessing("pdfinfo reported no page count".to_string())
    })
}

fn parse_pdfinfo_pages(stdout: &str) -> Option<u32> {
    stdout
        .lines()
        .filter_map(|line| line.strip_prefix("Pages:"))
        .find_map(|count| count.trim().parse::<u32>().ok())
}

/// Rasterizes single PDF pages for recognition.
pub trait PageRenderer: Send + Sync {
    /// PNG bytes of one 1-indexed page of the PDF at `pdf_path`.
    fn render_page(&self, pdf_path: &Path, page: u32, dpi: u32) -> Result<Vec<u8>, ProcessError>;
}

/// Renders with `pdftoppm` (poppler-utils) straight from the source file.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdftoppmRenderer;

impl PageRenderer for PdftoppmRenderer {
    fn render_page(&self, pdf_path: &Path, page: u32, dpi: u32) -> Result<Vec<u8>, ProcessError> {
        render_page_to_image(pdf_path, page, dpi)
    }
}

/// Renders one page to PNG with `pdftoppm`.
pub fn render_page_to_image(
    pdf_path: &Path,
    page_num: u32,
    dpi: u32,
) -> Result<Vec<u8>, ProcessError> {
    let output_prefix =
        std::env::temp_dir().join(format!("nfbatch_page_{}", uuid::Uuid::new_v4()));

    let page = page_num.to_string();
    let output = Command::new("pdftoppm")
        .args(["-png", "-r", &dpi.to_string(), "-f", &page, "-l", &page])
        .arg(pdf_path)
        .arg(&output_prefix)
        .output()
        .map_err(|e| {
            ProcessError::PdfProcessing(format!(
                "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;

    if !output.status.success() {
        return Err(ProcessError::PdfProcessing(format!(
            "pdftoppm failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    // pdftoppm pads the page suffix to the width of the last page number.
    let prefix = output_prefix.display();
    let candidates = [
        format!("{}-{}.png", prefix, page_num),
        format!("{}-{:02}.png", prefix, page_num),
        format!("{}-{:03}.png", prefix, page_num),
        format!("{}-{:04}.png", prefix, page_num),
    ];
    let image_path = candidates
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .ok_or_else(|| {
            ProcessError::PdfProcessing("Failed to find rendered page image".to_string())
        })?;

    let image_data = std::fs::read(image_path).map_err(|e| {
        ProcessError::PdfProcessing(format!("Failed to read rendered image: {}", e))
    })?;
    let _ = std::fs::remove_file(image_path);

    Ok(image_data)
}
