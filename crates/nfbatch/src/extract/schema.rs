use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::StructuringError;

/// Fields every structured invoice carries, null when the document lacks them.
pub const CANONICAL_FIELDS: [&str; 25] = [
    "prestador_cnpj",
    "prestador_razao_social",
    "prestador_municipio",
    "prestador_uf",
    "tomador_cnpj",
    "tomador_razao_social",
    "tomador_municipio",
    "tomador_uf",
    "numero_nf",
    "data_emissao",
    "codigo_servico",
    "valor_total",
    "base_calculo_iss",
    "aliquota_iss",
    "valor_iss",
    "aliquota_pis",
    "valor_pis",
    "aliquota_cofins",
    "valor_cofins",
    "aliquota_csll",
    "valor_csll",
    "valor_ir",
    "valor_inss",
    "discriminacao_servicos",
    "observacoes_nf",
];

/// Key/value pairs the service found but could not map to a canonical field.
pub const OVERFLOW_FIELD: &str = "todos_os_campos";

pub const SERVICE_CODE_FIELD: &str = "codigo_servico";
pub const ACCUMULATOR_FIELD: &str = "acum";
pub const ITEM_FIELD: &str = "item";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub chave: String,
    pub valor: Option<String>,
}

/// One invoice as returned by the structured extraction service, plus any
/// fields derived later during enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructuredInvoice {
    #[serde(flatten)]
    pub fields: BTreeMap<String, Option<String>>,
    #[serde(rename = "todos_os_campos")]
    pub extra: Vec<FieldValue>,
}

impl StructuredInvoice {
    /// An invoice with every canonical field present and null.
    pub fn empty() -> Self {
        let mut invoice = Self::default();
        invoice.normalize();
        invoice
    }

    /// Builds an invoice from a service reply. Values are kept literal: numbers
    /// become their JSON text, strings are untouched. Unknown top-level keys
    /// go to the overflow list.
    pub fn from_json(value: Value) -> Result<Self, StructuringError> {
        let Value::Object(object) = value else {
            return Err(StructuringError::ResponseParsing(
                "expected a JSON object".to_string(),
            ));
        };

        let mut invoice = Self::default();
        for (key, value) in object {
            if key == OVERFLOW_FIELD {
                invoice.extra.extend(parse_overflow(value));
            } else if CANONICAL_FIELDS.contains(&key.as_str()) {
                invoice.fields.insert(key, literal(value));
            } else if let Some(valor) = literal(value) {
                invoice.extra.push(FieldValue { chave: key, valor: Some(valor) });
            }
        }
        invoice.normalize();
        Ok(invoice)
    }

    /// Inserts any missing canonical field as null.
    pub fn normalize(&mut self) {
        for field in CANONICAL_FIELDS {
            self.fields.entry(field.to_string()).or_insert(None);
        }
    }

    /// The field's value, treating blank strings as absent.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(|v| v.as_deref())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn set(&mut self, field: &str, value: Option<String>) {
        self.fields.insert(field.to_string(), value);
    }
}

fn literal(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Lenient: malformed entries are dropped instead of failing the record.
fn parse_overflow(value: Value) -> Vec<FieldValue> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(mut entry) => {
                let chave = match entry.remove("chave")? {
                    Value::String(s) if !s.trim().is_empty() => s,
                    _ => return None,
                };
                let valor = entry.remove("valor").and_then(literal);
                Some(FieldValue { chave, valor })
            }
            _ => None,
        })
        .collect()
}
