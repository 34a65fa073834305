//! Structured errors shared by every embedding
//!
//! Component errors ([`ParseError`], [`FillError`], [`SerializationError`])
//! are converted into a single [`EngineError`] carrying a stable
//! `BW_CORE_*` code, a message and optional context.

use crate::fill::FillError;
use crate::parser::ParseError;
use crate::writer::SerializationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "BW_CORE_EMPTY_INPUT")]
    EmptyInput,
    #[serde(rename = "BW_CORE_INVALID_HEADER")]
    InvalidHeader,
    #[serde(rename = "BW_CORE_PARSE_FAILED")]
    ParseFailed,
    #[serde(rename = "BW_CORE_INVALID_XREF")]
    InvalidXref,
    #[serde(rename = "BW_CORE_CORRUPT_OBJECT")]
    CorruptObject,
    #[serde(rename = "BW_CORE_UNSUPPORTED_ENCRYPTION")]
    UnsupportedEncryption,
    #[serde(rename = "BW_CORE_RESOURCE_LIMIT")]
    ResourceLimit,
    #[serde(rename = "BW_CORE_FIELD_NOT_FOUND")]
    FieldNotFound,
    #[serde(rename = "BW_CORE_INVALID_CHOICE")]
    InvalidChoice,
    #[serde(rename = "BW_CORE_INVALID_BUTTON_STATE")]
    InvalidButtonState,
    #[serde(rename = "BW_CORE_VALUE_TOO_LONG")]
    ValueTooLong,
    #[serde(rename = "BW_CORE_FIELD_READ_ONLY")]
    FieldReadOnly,
    #[serde(rename = "BW_CORE_UNSUPPORTED_FIELD")]
    UnsupportedField,
    #[serde(rename = "BW_CORE_SERIALIZATION_FAILED")]
    SerializationFailed,
}

impl ErrorCode {
    /// Every code, in declaration order
    pub const ALL: [ErrorCode; 14] = [
        ErrorCode::EmptyInput,
        ErrorCode::InvalidHeader,
        ErrorCode::ParseFailed,
        ErrorCode::InvalidXref,
        ErrorCode::CorruptObject,
        ErrorCode::UnsupportedEncryption,
        ErrorCode::ResourceLimit,
        ErrorCode::FieldNotFound,
        ErrorCode::InvalidChoice,
        ErrorCode::InvalidButtonState,
        ErrorCode::ValueTooLong,
        ErrorCode::FieldReadOnly,
        ErrorCode::UnsupportedField,
        ErrorCode::SerializationFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::EmptyInput => "BW_CORE_EMPTY_INPUT",
            ErrorCode::InvalidHeader => "BW_CORE_INVALID_HEADER",
            ErrorCode::ParseFailed => "BW_CORE_PARSE_FAILED",
            ErrorCode::InvalidXref => "BW_CORE_INVALID_XREF",
            ErrorCode::CorruptObject => "BW_CORE_CORRUPT_OBJECT",
            ErrorCode::UnsupportedEncryption => "BW_CORE_UNSUPPORTED_ENCRYPTION",
            ErrorCode::ResourceLimit => "BW_CORE_RESOURCE_LIMIT",
            ErrorCode::FieldNotFound => "BW_CORE_FIELD_NOT_FOUND",
            ErrorCode::InvalidChoice => "BW_CORE_INVALID_CHOICE",
            ErrorCode::InvalidButtonState => "BW_CORE_INVALID_BUTTON_STATE",
            ErrorCode::ValueTooLong => "BW_CORE_VALUE_TOO_LONG",
            ErrorCode::FieldReadOnly => "BW_CORE_FIELD_READ_ONLY",
            ErrorCode::UnsupportedField => "BW_CORE_UNSUPPORTED_FIELD",
            ErrorCode::SerializationFailed => "BW_CORE_SERIALIZATION_FAILED",
        }
    }

    /// Raised while reading the input document
    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            ErrorCode::EmptyInput
                | ErrorCode::InvalidHeader
                | ErrorCode::ParseFailed
                | ErrorCode::InvalidXref
                | ErrorCode::CorruptObject
                | ErrorCode::UnsupportedEncryption
                | ErrorCode::ResourceLimit
        )
    }

    /// Raised for a single field while filling
    pub fn is_fill(&self) -> bool {
        matches!(
            self,
            ErrorCode::FieldNotFound
                | ErrorCode::InvalidChoice
                | ErrorCode::InvalidButtonState
                | ErrorCode::ValueTooLong
                | ErrorCode::FieldReadOnly
                | ErrorCode::UnsupportedField
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error every public entry point returns
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct EngineError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl EngineError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        EngineError {
            code,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = (!context.is_empty()).then_some(context);
        self
    }
}

impl From<ParseError> for EngineError {
    fn from(error: ParseError) -> Self {
        let message = error.to_string();
        match error {
            ParseError::EmptyInput => EngineError::new(ErrorCode::EmptyInput, message),
            ParseError::InvalidHeader => EngineError::new(ErrorCode::InvalidHeader, message),
            ParseError::MalformedToken { position, .. } | ParseError::SyntaxError { position, .. } => {
                EngineError::new(ErrorCode::ParseFailed, message).with_context(format!("byte {position}"))
            }
            ParseError::InvalidXref(_) => EngineError::new(ErrorCode::InvalidXref, message),
            ParseError::CorruptObject { id, .. } => {
                EngineError::new(ErrorCode::CorruptObject, message).with_context(format!("object {id}"))
            }
            ParseError::MissingKey(key) => {
                EngineError::new(ErrorCode::CorruptObject, message).with_context(format!("/{key}"))
            }
            ParseError::StreamDecodeError(_) => EngineError::new(ErrorCode::CorruptObject, message),
            ParseError::UnsupportedEncryption => {
                EngineError::new(ErrorCode::UnsupportedEncryption, message)
            }
            ParseError::ResourceLimitExceeded { limit, .. } => {
                EngineError::new(ErrorCode::ResourceLimit, message).with_context(format!("limit {limit}"))
            }
        }
    }
}

impl From<FillError> for EngineError {
    fn from(error: FillError) -> Self {
        EngineError::new(error.code(), error.to_string()).with_context(error.field())
    }
}

impl From<SerializationError> for EngineError {
    fn from(error: SerializationError) -> Self {
        match error {
            // The input itself could not be read while copying it
            SerializationError::Source(parse) => parse.into(),
            other => EngineError::new(ErrorCode::SerializationFailed, other.to_string()),
        }
    }
}
