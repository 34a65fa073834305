//! JSON response envelopes shared by the CLI and the HTTP API

use crate::blocks::Block;
use crate::error::{EngineError, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Malformed request payloads
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("field values must be a JSON object")]
    NotAnObject,

    #[error("value of '{0}' must be a string, number or boolean")]
    NestedValue(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// `{"ok": true, "blocks": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectResponse {
    pub ok: bool,
    pub blocks: Vec<Block>,
}

impl DetectResponse {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { ok: true, blocks }
    }
}

/// `{"ok": false, "error": "...", "code": "BW_CORE_...", "context": "..."}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl From<&EngineError> for ErrorResponse {
    fn from(error: &EngineError) -> Self {
        Self {
            ok: false,
            error: error.message.clone(),
            code: error.code,
            context: error.context.clone().filter(|c| !c.is_empty()),
        }
    }
}

impl From<EngineError> for ErrorResponse {
    fn from(error: EngineError) -> Self {
        Self::from(&error)
    }
}

/// One field-level warning as reported next to a filled file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl From<&EngineError> for Warning {
    fn from(error: &EngineError) -> Self {
        Self {
            code: error.code,
            message: error.message.clone(),
            context: error.context.clone(),
        }
    }
}

/// Field values from a JSON object. Numbers and booleans are passed on as
/// their JSON text, `null` as the empty string.
pub fn field_values(json: &str) -> Result<HashMap<String, String>, PayloadError> {
    let Value::Object(map) = serde_json::from_str(json)? else {
        return Err(PayloadError::NotAnObject);
    };
    map.into_iter()
        .map(|(label, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => return Err(PayloadError::NestedValue(label)),
            };
            Ok((label, value))
        })
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BlocksPayload {
    Envelope { blocks: Vec<Block> },
    Bare(Vec<Block>),
}

/// Blocks given either as a bare array or as a whole detect response
pub fn blocks_from_json(json: &str) -> Result<Vec<Block>, PayloadError> {
    Ok(match serde_json::from_str(json)? {
        BlocksPayload::Envelope { blocks } | BlocksPayload::Bare(blocks) => blocks,
    })
}
