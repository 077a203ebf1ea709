//! Builders for test documents and configs.

#![allow(dead_code)]

use std::io::Write;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::{json, Value};

/// Builds a PDF with one page per entry; each `\n`-separated line becomes a
/// text line. Only ASCII survives the built-in font encoding.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        // One text object per line, so extracted text keeps line breaks.
        let mut operations = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let y = 750 - 14 * index as i64;
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![40.into(), y.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ]);
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("Failed to encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to save PDF");
    bytes
}

/// First page of an invoice: carries header keywords and enough text to
/// count as a boundary.
pub fn invoice_page(numero: &str, codigo: &str) -> String {
    format!(
        "PREFEITURA MUNICIPAL DE CAMPINAS\n\
         NFS-e NOTA FISCAL DE SERVICOS ELETRONICA\n\
         NUMERO {}\n\
         CODIGO {}\n\
         Prestador CNPJ 12.345.678/0001-90\n\
         Valor total da nota R$ 1.233,38",
        numero, codigo
    )
}

/// A page that continues the previous invoice.
pub fn continuation_page() -> String {
    "Discriminacao dos servicos (continuacao)\nHoras tecnicas de suporte".to_string()
}

/// Zip archive from `(entry name, content)` pairs. Names ending in `/` are
/// written as directories.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(*name, options)
                .expect("Failed to add zip directory");
        } else {
            writer
                .start_file(*name, options)
                .expect("Failed to start zip entry");
            writer.write_all(content).expect("Failed to write zip entry");
        }
    }
    writer
        .finish()
        .expect("Failed to finish zip")
        .into_inner()
}

/// Builder for config JSON documents.
pub struct ConfigBuilder {
    value: Value,
}

impl ConfigBuilder {
    /// Minimal valid config: one worker, recognition off, ollama provider.
    pub fn new() -> Self {
        Self {
            value: json!({
                "version": "1.0",
                "worker_count": 1,
                "ocr": { "enabled": false },
                "extraction": { "provider": "ollama" }
            }),
        }
    }

    pub fn set(mut self, pointer: &str, value: Value) -> Self {
        let (parent, key) = pointer.rsplit_once('/').expect("pointer must contain '/'");
        let target = if parent.is_empty() {
            &mut self.value
        } else {
            self.value
                .pointer_mut(parent)
                .expect("parent of pointer must exist")
        };
        target[key] = value;
        self
    }

    pub fn worker_count(self, count: usize) -> Self {
        self.set("/worker_count", json!(count))
    }

    pub fn lookup(self, path: &str) -> Self {
        self.set("/lookup", json!({ "path": path }))
    }

    pub fn build(self) -> Value {
        self.value
    }

    pub fn to_json(self) -> String {
        serde_json::to_string_pretty(&self.value).expect("Failed to serialize config")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
