use crate::error::ProcessError;
use crate::processor::image::prepare_for_ocr;

pub const DEFAULT_OCR_LANGUAGE: &str = "por";

/// Image-to-text recognition engine.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image_bytes: &[u8], language: &str) -> Result<String, ProcessError>;
}

/// Joins configured languages into Tesseract's `por+eng` form.
pub fn language_string(languages: &[String]) -> String {
    let languages: Vec<&str> = languages
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    if languages.is_empty() {
        DEFAULT_OCR_LANGUAGE.to_string()
    } else {
        languages.join("+")
    }
}

/// Tesseract recognizer. A fresh engine is created per call, so one value
/// can be shared by every worker thread.
#[derive(Debug, Clone, Default)]
pub struct TesseractRecognizer;

impl TesseractRecognizer {
    pub fn new() -> Self {
        Self
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image_bytes: &[u8], language: &str) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.ocr", language).entered();

        let png_data = prepare_for_ocr(image_bytes)?;

        let mut lt = leptess::LepTess::new(None, language).map_err(|e| {
            ProcessError::OcrFailed(format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| ProcessError::OcrFailed(format!("OCR failed: {}", e)))
    }
}
