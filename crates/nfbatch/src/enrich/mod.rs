//! Fills derived fields on successfully extracted records.

pub mod lookup;

use crate::extract::record::RecordMap;
use crate::extract::schema::{ACCUMULATOR_FIELD, ITEM_FIELD, SERVICE_CODE_FIELD};

pub use lookup::{digits_only, LookupError, LookupTable};

/// Prefix of the synthesized `item` field.
pub const ITEM_PREFIX: &str = "SERV.";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentSummary {
    pub enriched: usize,
    pub accumulators_filled: usize,
    pub items_synthesized: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct Enricher;

impl Enricher {
    pub fn new() -> Self {
        Self
    }

    /// Only Pending records are touched. Failed records stay exactly as the
    /// orchestrator left them.
    pub fn enrich(&self, records: &mut RecordMap, table: Option<&LookupTable>) -> EnrichmentSummary {
        let _span = tracing::info_span!("enrich", records = records.len(), lookup = table.is_some())
            .entered();
        let mut summary = EnrichmentSummary::default();

        for (id, record) in records.iter_mut() {
            if !record.is_pending() {
                summary.skipped += 1;
                continue;
            }
            summary.enriched += 1;

            let service_code = record.data.get(SERVICE_CODE_FIELD).map(str::to_string);
            let Some(code) = service_code else {
                continue;
            };

            if let Some(accumulator) = table.and_then(|t| t.find(&code)) {
                tracing::debug!(record = %id, code = %code, acum = %accumulator, "Accumulator matched");
                record
                    .data
                    .set(ACCUMULATOR_FIELD, Some(accumulator.to_string()));
                summary.accumulators_filled += 1;
            }

            let digits = digits_only(&code);
            if record.data.get(ITEM_FIELD).is_none() && !digits.is_empty() {
                record
                    .data
                    .set(ITEM_FIELD, Some(format!("{}{}", ITEM_PREFIX, digits)));
                summary.items_synthesized += 1;
            }
        }

        tracing::info!(
            enriched = summary.enriched,
            accumulators = summary.accumulators_filled,
            items = summary.items_synthesized,
            "Enrichment finished"
        );
        summary
    }
}
