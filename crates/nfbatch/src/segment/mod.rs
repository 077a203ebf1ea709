//! Splits multi-invoice PDFs into per-invoice page ranges.

use std::sync::Arc;

use crate::config::DocumentFormat;
use crate::intake::IntakeUnit;
use crate::processor::DocumentText;

/// Lower-cased phrases printed in the header of every NFS-e layout we see.
pub const INVOICE_HEADER_KEYWORDS: [&str; 5] = [
    "nota fiscal de serviços eletrônica",
    "nfs-e",
    "prefeitura municipal de",
    "danfse",
    "documento auxiliar da nota fiscal",
];

/// A boundary page must carry strictly more than this many characters.
pub const MIN_BOUNDARY_TEXT_CHARS: usize = 100;

/// One logical invoice to extract: a whole file or a page range of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionTask {
    pub unit: Arc<IntakeUnit>,
    /// 1-indexed, ascending. `None` means the whole file.
    pub pages: Option<Vec<u32>>,
}

impl ExtractionTask {
    pub fn whole(unit: Arc<IntakeUnit>) -> Self {
        Self { unit, pages: None }
    }

    /// `"3"` for a single page, `"1-2"` for a range.
    pub fn page_range_label(&self) -> Option<String> {
        let pages = self.pages.as_ref()?;
        let first = pages.first()?;
        let last = pages.last()?;
        Some(if first == last {
            first.to_string()
        } else {
            format!("{}-{}", first, last)
        })
    }

    pub fn display_name(&self) -> String {
        match self.page_range_label() {
            Some(range) => format!("{} (pages {})", self.unit.original_name, range),
            None => self.unit.original_name.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SegmentationOutcome {
    pub tasks: Vec<ExtractionTask>,
    pub warnings: Vec<String>,
}

/// Decides whether a page starts a new invoice.
#[derive(Debug, Clone)]
pub struct BoundaryClassifier {
    keywords: Vec<String>,
    min_chars: usize,
}

impl Default for BoundaryClassifier {
    fn default() -> Self {
        Self {
            keywords: INVOICE_HEADER_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            min_chars: MIN_BOUNDARY_TEXT_CHARS,
        }
    }
}

impl BoundaryClassifier {
    pub fn is_boundary(&self, page_text: &str) -> bool {
        let lower = page_text.to_lowercase();
        lower.trim().chars().count() > self.min_chars
            && self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

/// Splits `[1, page_count]` at the given boundary pages. Page 1 always opens
/// the first range; boundaries outside the document or repeated are ignored.
pub fn partition_pages(boundaries: &[u32], page_count: u32) -> Vec<Vec<u32>> {
    if page_count == 0 {
        return Vec::new();
    }

    let mut starts: Vec<u32> = boundaries
        .iter()
        .copied()
        .filter(|&p| p > 1 && p <= page_count)
        .collect();
    starts.push(1);
    starts.sort_unstable();
    starts.dedup();

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).map_or(page_count, |next| next - 1);
            (start..=end).collect()
        })
        .collect()
}

pub struct Segmenter {
    text: Arc<dyn DocumentText>,
    classifier: BoundaryClassifier,
}

impl Segmenter {
    pub fn new(text: Arc<dyn DocumentText>) -> Self {
        Self {
            text,
            classifier: BoundaryClassifier::default(),
        }
    }

    pub fn segment(&self, units: &[Arc<IntakeUnit>]) -> SegmentationOutcome {
        let _span = tracing::info_span!("segment", units = units.len()).entered();
        let mut outcome = SegmentationOutcome::default();

        for unit in units {
            if unit.format != DocumentFormat::Pdf {
                outcome.tasks.push(ExtractionTask::whole(Arc::clone(unit)));
                continue;
            }

            let page_count = match self.text.page_count(&unit.path) {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!(file = %unit.normalized_name, "Page count unavailable: {}", e);
                    outcome.warnings.push(format!(
                        "Could not read page count of '{}', treating it as one invoice: {}",
                        unit.original_name, e
                    ));
                    outcome.tasks.push(ExtractionTask::whole(Arc::clone(unit)));
                    continue;
                }
            };

            if page_count <= 1 {
                outcome.tasks.push(ExtractionTask::whole(Arc::clone(unit)));
                continue;
            }

            let scanned: Vec<u32> = (2..=page_count).collect();
            let texts = self.text.page_texts(&unit.path, &scanned);
            let boundaries: Vec<u32> = scanned
                .iter()
                .zip(&texts)
                .filter(|(_, text)| self.classifier.is_boundary(text))
                .map(|(&page, _)| page)
                .collect();

            tracing::info!(
                file = %unit.normalized_name,
                pages = page_count,
                boundaries = ?boundaries,
                "Segmented multi-page PDF"
            );

            outcome.tasks.extend(
                partition_pages(&boundaries, page_count)
                    .into_iter()
                    .map(|pages| ExtractionTask {
                        unit: Arc::clone(unit),
                        pages: Some(pages),
                    }),
            );
        }

        outcome
    }
}
