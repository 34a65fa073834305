//! # blockwright
//!
//! PDF block detection and AcroForm writeback.
//!
//! The engine finds the fillable regions ("blocks") of an interactive PDF
//! form and writes values back into the form's fields, producing a new file.
//!
//! ## Features
//!
//! - **Lazy parsing**: classic and stream cross-reference sections, object
//!   streams, incremental update chains
//! - **Form resolution**: field hierarchies with inherited attributes, widgets
//!   linked to their pages, orphan widgets adopted
//! - **Block extraction**: widget rectangles mapped to top-left coordinates of
//!   the displayed page, rotation included
//! - **Writeback**: text, choice, checkbox and radio fields, saved as an
//!   incremental update or a full rewrite
//! - **Stable errors**: every failure carries a `BW_CORE_*` code
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blockwright::{detect_blocks, fill_blocks};
//! use std::collections::HashMap;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pdf = std::fs::read("form.pdf")?;
//! let blocks = detect_blocks(&pdf)?;
//! for block in &blocks {
//!     println!("{} at ({}, {})", block.label, block.x, block.y);
//! }
//!
//! let mut values = HashMap::new();
//! values.insert("full_name".to_string(), "Ada Lovelace".to_string());
//! let filled = fill_blocks(&pdf, &blocks, &values)?;
//! std::fs::write("filled.pdf", filled)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`parser`] - Tokenizer, object model and cross-reference handling
//! - [`forms`] - AcroForm resolution
//! - [`blocks`] - Block extraction
//! - [`fill`] - Field value writeback
//! - [`writer`] - Serialization
//! - [`envelope`] - JSON payloads for embeddings

pub mod blocks;
pub mod encoding;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod fill;
pub mod forms;
pub mod geometry;
pub mod parser;
pub mod writer;

pub use blocks::{Block, ExtractOptions, LocatedBlock, MergePolicy};
pub use engine::{
    detect_blocks, fill_blocks, fill_blocks_with_report, init, Engine, EngineConfig, FieldSummary,
    FilledPdf,
};
pub use envelope::{blocks_from_json, field_values, DetectResponse, ErrorResponse, PayloadError, Warning};
pub use error::{EngineError, ErrorCode};
pub use fill::{FillError, FillOptions, FillPolicy, FillReport};
pub use parser::{ParseError, ParseOptions};
pub use writer::WriteMode;

/// Current version of blockwright
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
