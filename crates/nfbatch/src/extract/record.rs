use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::extract::schema::StructuredInvoice;
use crate::extract::ExtractionFailure;
use crate::segment::ExtractionTask;

const RECORD_ID_PREFIX: &str = "NF_";

/// Batch-unique record identifier, `NF_001`, `NF_002`, ... Ordered by
/// sequence number, so `NF_1000` sorts after `NF_999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(u32);

impl RecordId {
    pub fn new(sequence: u32) -> Self {
        Self(sequence)
    }

    pub fn sequence(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", RECORD_ID_PREFIX, self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid record id '{0}'")]
pub struct ParseRecordIdError(String);

impl FromStr for RecordId {
    type Err = ParseRecordIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(RECORD_ID_PREFIX)
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse().ok())
            .map(RecordId)
            .ok_or_else(|| ParseRecordIdError(s.to_string()))
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Approved,
    Failed,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Approved => "approved",
            RecordStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("record {id} is {status}; only pending records can be reviewed")]
    NotPending { id: RecordId, status: RecordStatus },
}

/// Where a record came from, for display during review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSource {
    pub display_name: String,
    pub original_name: String,
    pub normalized_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<u32>>,
}

impl RecordSource {
    pub fn from_task(task: &ExtractionTask) -> Self {
        Self {
            display_name: task.display_name(),
            original_name: task.unit.original_name.clone(),
            normalized_name: task.unit.normalized_name.clone(),
            pages: task.pages.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceRecord {
    pub id: RecordId,
    pub source: RecordSource,
    pub data: StructuredInvoice,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

pub type RecordMap = BTreeMap<RecordId, InvoiceRecord>;

impl InvoiceRecord {
    pub fn pending(id: RecordId, task: &ExtractionTask, data: StructuredInvoice) -> Self {
        Self {
            id,
            source: RecordSource::from_task(task),
            data,
            status: RecordStatus::Pending,
            failure: None,
        }
    }

    pub fn failed(id: RecordId, task: &ExtractionTask, failure: &ExtractionFailure) -> Self {
        Self {
            id,
            source: RecordSource::from_task(task),
            data: StructuredInvoice::empty(),
            status: RecordStatus::Failed,
            failure: Some(failure.to_string()),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RecordStatus::Pending
    }

    fn ensure_pending(&self) -> Result<(), ReviewError> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(ReviewError::NotPending {
                id: self.id,
                status: self.status,
            })
        }
    }

    pub fn approve(&mut self) -> Result<(), ReviewError> {
        self.ensure_pending()?;
        self.status = RecordStatus::Approved;
        Ok(())
    }

    /// Reviewer edit of a single field.
    pub fn set_field(&mut self, field: &str, value: Option<String>) -> Result<(), ReviewError> {
        self.ensure_pending()?;
        self.data.set(field, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentFormat;
    use crate::intake::IntakeUnit;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn task(pages: Option<Vec<u32>>) -> ExtractionTask {
        ExtractionTask {
            unit: Arc::new(IntakeUnit {
                original_name: "scan.pdf".to_string(),
                normalized_name: "nota_original_001.pdf".to_string(),
                path: PathBuf::from("/lote/nota_original_001.pdf"),
                format: DocumentFormat::Pdf,
            }),
            pages,
        }
    }

    #[test]
    fn test_record_id_display_and_order() {
        assert_eq!(RecordId::new(1).to_string(), "NF_001");
        assert_eq!(RecordId::new(42).to_string(), "NF_042");
        assert_eq!(RecordId::new(1000).to_string(), "NF_1000");
        assert!(RecordId::new(999) < RecordId::new(1000));
    }

    #[test]
    fn test_record_id_parse() {
        assert_eq!("NF_007".parse::<RecordId>(), Ok(RecordId::new(7)));
        assert_eq!("NF_1000".parse::<RecordId>(), Ok(RecordId::new(1000)));
        assert!("NF_".parse::<RecordId>().is_err());
        assert!("NF_-1".parse::<RecordId>().is_err());
        assert!("nf_001".parse::<RecordId>().is_err());
    }

    #[test]
    fn test_record_map_serializes_with_string_keys() {
        let mut records = RecordMap::new();
        records.insert(
            RecordId::new(2),
            InvoiceRecord::pending(RecordId::new(2), &task(Some(vec![3])), StructuredInvoice::empty()),
        );

        let value = serde_json::to_value(&records).unwrap();
        assert_eq!(value["NF_002"]["status"], "pending");
        assert_eq!(value["NF_002"]["source"]["display_name"], "scan.pdf (pages 3)");
        assert!(value["NF_002"].get("failure").is_none());

        let id: RecordId = serde_json::from_value(serde_json::json!("NF_002")).unwrap();
        assert_eq!(id, RecordId::new(2));
    }

    #[test]
    fn test_approve_pending() {
        let mut record = InvoiceRecord::pending(RecordId::new(1), &task(None), StructuredInvoice::empty());
        record.approve().unwrap();
        assert_eq!(record.status, RecordStatus::Approved);

        assert_eq!(
            record.approve(),
            Err(ReviewError::NotPending {
                id: RecordId::new(1),
                status: RecordStatus::Approved
            })
        );
    }

    #[test]
    fn test_failed_record_is_terminal() {
        let failure = ExtractionFailure::TextExtraction("vazio".to_string());
        let mut record = InvoiceRecord::failed(RecordId::new(3), &task(None), &failure);

        assert_eq!(record.failure.as_deref(), Some("text extraction failed: vazio"));
        assert!(record.approve().is_err());
        assert!(record.set_field("numero_nf", Some("1".to_string())).is_err());
        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.data, StructuredInvoice::empty());
    }

    #[test]
    fn test_set_field_on_pending() {
        let mut record = InvoiceRecord::pending(RecordId::new(1), &task(None), StructuredInvoice::empty());
        record
            .set_field("valor_total", Some("1.233,38".to_string()))
            .unwrap();
        assert_eq!(record.data.get("valor_total"), Some("1.233,38"));
    }
}
