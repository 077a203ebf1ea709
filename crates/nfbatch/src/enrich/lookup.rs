use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::LookupConfig;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Failed to read lookup table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lookup table is empty")]
    Empty,

    #[error("Lookup table has no '{column}' column")]
    MissingColumn { column: String },

    #[error("Malformed lookup table: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LookupRow {
    reference: String,
    reference_digits: String,
    accumulator: String,
}

/// Service code to accumulator mapping, loaded from a CSV file.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    rows: Vec<LookupRow>,
}

impl LookupTable {
    pub fn load(config: &LookupConfig) -> Result<Self, LookupError> {
        let path = Path::new(&config.path);
        let content = std::fs::read_to_string(path).map_err(|e| LookupError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_csv(&content, &config.reference_column, &config.accumulator_column)
    }

    /// Parses CSV text with a header row. The delimiter is `;` when the header
    /// line has more semicolons than commas, `,` otherwise.
    pub fn from_csv(
        content: &str,
        reference_column: &str,
        accumulator_column: &str,
    ) -> Result<Self, LookupError> {
        let content = content.trim_start_matches('\u{feff}');
        let header_line = content.lines().next().ok_or(LookupError::Empty)?;
        let delimiter = if header_line.matches(';').count() > header_line.matches(',').count() {
            b';'
        } else {
            b','
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name.trim())
                .ok_or_else(|| LookupError::MissingColumn {
                    column: name.to_string(),
                })
        };
        let reference_idx = column(reference_column)?;
        let accumulator_idx = column(accumulator_column)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let reference = record.get(reference_idx).unwrap_or_default().trim().to_string();
            let accumulator = record.get(accumulator_idx).unwrap_or_default();
            rows.push(LookupRow {
                reference_digits: digits_only(&reference),
                reference,
                accumulator: normalize_accumulator(accumulator),
            });
        }

        tracing::debug!(rows = rows.len(), "Loaded lookup table");
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Accumulator for a service code. Exact (trimmed) match first, then a
    /// match on digits only. The first matching row wins. `Some("")` means the
    /// code is known but its accumulator cell is blank.
    pub fn find(&self, service_code: &str) -> Option<&str> {
        let code = service_code.trim();
        if code.is_empty() {
            return None;
        }

        let exact = self.rows.iter().find(|row| row.reference == code);
        let row = exact.or_else(|| {
            let digits = digits_only(code);
            if digits.is_empty() {
                return None;
            }
            self.rows.iter().find(|row| row.reference_digits == digits)
        })?;
        Some(row.accumulator.as_str())
    }
}

pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Spreadsheet exports write whole numbers as `12.0` or `12,00`; those lose
/// the zero fraction. Anything else, `1.000` included, is kept as written.
fn normalize_accumulator(value: &str) -> String {
    let trimmed = value.trim();
    let Some(separator) = trimmed.rfind(['.', ',']) else {
        return trimmed.to_string();
    };

    let (whole, fraction) = (&trimmed[..separator], &trimmed[separator + 1..]);
    let whole_digits = whole.strip_prefix('-').unwrap_or(whole);
    let zero_fraction = (1..=2).contains(&fraction.len()) && fraction.bytes().all(|b| b == b'0');
    let integral = !whole_digits.is_empty() && whole_digits.bytes().all(|b| b.is_ascii_digit());

    if zero_fraction && integral {
        whole.to_string()
    } else {
        trimmed.to_string()
    }
}
