//! Engine facade
//!
//! Ties the pipeline together: parse, resolve the form, then either extract
//! blocks or write values and serialize.

use crate::blocks::{extract_located, Block, ExtractOptions, LocatedBlock};
use crate::encoding;
use crate::error::EngineError;
use crate::fill::{FieldWriter, FillError, FillOptions, FillPolicy, FillReport};
use crate::forms::{resolve, AcroForm};
use crate::parser::{ParseOptions, PdfDocument};
use crate::writer::PdfWriter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

lazy_static::lazy_static! {
    static ref INITIALIZED: bool = {
        encoding::initialize_tables();
        tracing::debug!("blockwright engine initialized");
        true
    };
}

/// One-time setup. Idempotent and safe to call from several threads; every
/// entry point calls it.
pub fn init() {
    lazy_static::initialize(&INITIALIZED);
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub parse: ParseOptions,
    pub extract: ExtractOptions,
    pub fill: FillOptions,
}

impl EngineConfig {
    /// Load a configuration from JSON; missing sections take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A filled file with the per-field failures that were tolerated
#[derive(Debug, Clone, PartialEq)]
pub struct FilledPdf {
    pub bytes: Vec<u8>,
    pub warnings: Vec<EngineError>,
}

/// Diagnostic view of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<String>,
    pub read_only: bool,
    pub widgets: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Blocks of every displayed widget; empty when the document has no form
    pub fn detect_blocks(&self, pdf: &[u8]) -> Result<Vec<Block>, EngineError> {
        Ok(self
            .detect_located(pdf)?
            .into_iter()
            .map(|located| located.block)
            .collect())
    }

    /// Like [`Engine::detect_blocks`], keeping page indexes
    pub fn detect_located(&self, pdf: &[u8]) -> Result<Vec<LocatedBlock>, EngineError> {
        init();
        let span = tracing::info_span!("detect_blocks", bytes = pdf.len());
        let _guard = span.enter();

        let mut doc = PdfDocument::parse(pdf, &self.config.parse)?;
        let Some(form) = resolve(&mut doc)? else {
            tracing::info!("document has no form");
            return Ok(Vec::new());
        };
        let blocks = extract_located(&form, &self.config.extract);
        tracing::info!("detected {} blocks on {} pages", blocks.len(), form.pages.len());
        Ok(blocks)
    }

    pub fn fill_blocks(
        &self,
        pdf: &[u8],
        blocks: &[Block],
        values: &HashMap<String, String>,
    ) -> Result<Vec<u8>, EngineError> {
        Ok(self.fill_blocks_with_report(pdf, blocks, values)?.bytes)
    }

    pub fn fill_blocks_with_report(
        &self,
        pdf: &[u8],
        blocks: &[Block],
        values: &HashMap<String, String>,
    ) -> Result<FilledPdf, EngineError> {
        init();
        let span = tracing::info_span!("fill_blocks", bytes = pdf.len(), values = values.len());
        let _guard = span.enter();

        let mut doc = PdfDocument::parse(pdf, &self.config.parse)?;
        let report = match resolve(&mut doc)? {
            Some(form) => FieldWriter::new(&form, self.config.fill, &self.config.extract)
                .write(&mut doc, blocks, values)?,
            None => self.report_without_form(blocks, values)?,
        };

        let bytes = PdfWriter::write(&mut doc, self.config.fill.write_mode)?;
        tracing::info!(
            "filled {} fields with {} warnings, {} bytes out",
            report.filled.len(),
            report.warnings.len(),
            bytes.len()
        );
        Ok(FilledPdf {
            bytes,
            warnings: report.warnings,
        })
    }

    /// Fields of the form for diagnostics, in resolution order
    pub fn inspect_fields(&self, pdf: &[u8]) -> Result<Vec<FieldSummary>, EngineError> {
        init();
        let mut doc = PdfDocument::parse(pdf, &self.config.parse)?;
        Ok(resolve(&mut doc)?.map(|form| summarize(&form)).unwrap_or_default())
    }

    /// Without a form every label the caller detected earlier is missing
    fn report_without_form(
        &self,
        blocks: &[Block],
        values: &HashMap<String, String>,
    ) -> Result<FillReport, EngineError> {
        let mut report = FillReport::default();
        let mut labels: Vec<&String> = values
            .keys()
            .filter(|label| blocks.iter().any(|b| &b.label == *label))
            .collect();
        labels.sort();
        for label in labels {
            let error = FillError::FieldNotFound(label.clone());
            if self.config.fill.policy == FillPolicy::FailFast {
                return Err(error.into());
            }
            report.warnings.push(error.into());
        }
        Ok(report)
    }
}

fn summarize(form: &AcroForm) -> Vec<FieldSummary> {
    form.fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let mut states: Vec<String> = Vec::new();
            for widget in form.widgets_of(index) {
                for state in &widget.on_states {
                    if !states.contains(state) {
                        states.push(state.clone());
                    }
                }
            }
            FieldSummary {
                name: field.full_name.clone(),
                kind: field.field_type.name().to_string(),
                value: field.value_text(),
                options: field.options.iter().map(|o| o.display.clone()).collect(),
                states,
                read_only: field.is_read_only(),
                widgets: field.widgets.len(),
            }
        })
        .collect()
}

/// Blocks of `pdf` with the default configuration
pub fn detect_blocks(pdf: &[u8]) -> Result<Vec<Block>, EngineError> {
    Engine::default().detect_blocks(pdf)
}

/// Fill `values` into `pdf` with the default configuration
pub fn fill_blocks(pdf: &[u8], blocks: &[Block], values: &HashMap<String, String>) -> Result<Vec<u8>, EngineError> {
    Engine::default().fill_blocks(pdf, blocks, values)
}

/// Like [`fill_blocks`], also returning the tolerated per-field failures
pub fn fill_blocks_with_report(
    pdf: &[u8],
    blocks: &[Block],
    values: &HashMap<String, String>,
) -> Result<FilledPdf, EngineError> {
    Engine::default().fill_blocks_with_report(pdf, blocks, values)
}
