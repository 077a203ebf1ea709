//! Stand-ins for the structured extraction service.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

use regex::Regex;

use nfbatch::extract::{StructuredExtractor, StructuredInvoice, StructuringError};

static NUMERO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"NUMERO\s+(\S+)").unwrap());
static CODIGO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"CODIGO\s+(\S+)").unwrap());

/// Reads `NUMERO` and `CODIGO` lines out of the text like a well-behaved
/// service would. Fails any invoice whose number is listed in `fail_numbers`.
#[derive(Default)]
pub struct ScriptedStructurer {
    fail_numbers: Vec<String>,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedStructurer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, numero: &str) -> Self {
        self.fail_numbers.push(numero.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Texts received, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl StructuredExtractor for ScriptedStructurer {
    fn structure(
        &self,
        raw_text: &str,
        _fields: &[&str],
    ) -> Result<StructuredInvoice, StructuringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(raw_text.to_string());
        }
        std::thread::sleep(self.delay);

        let numero = NUMERO
            .captures(raw_text)
            .map(|c| c[1].to_string());
        let codigo = CODIGO
            .captures(raw_text)
            .map(|c| c[1].to_string());

        if let Some(n) = &numero {
            if self.fail_numbers.contains(n) {
                return Err(StructuringError::Api {
                    status: 503,
                    body: "service unavailable".to_string(),
                });
            }
        }

        let mut invoice = StructuredInvoice::empty();
        invoice.set("numero_nf", numero);
        invoice.set("codigo_servico", codigo);
        Ok(invoice)
    }
}

/// Never answers within any reasonable timeout.
pub struct HangingStructurer(pub Duration);

impl StructuredExtractor for HangingStructurer {
    fn structure(
        &self,
        _raw_text: &str,
        _fields: &[&str],
    ) -> Result<StructuredInvoice, StructuringError> {
        std::thread::sleep(self.0);
        Ok(StructuredInvoice::empty())
    }
}
