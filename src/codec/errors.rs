//! Codec error types

use thiserror::Error;

/// Errors raised while decoding canonical bytes. Always fatal: the format is
/// strict and order-dependent, so nothing after the failure point is usable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("invalid ULEB128 at offset {offset}")]
    InvalidUleb128 { offset: usize },

    #[error("invalid boolean byte {value:#04x} at offset {offset}")]
    InvalidBool { offset: usize, value: u8 },

    #[error("unknown {kind} variant {tag}")]
    UnknownVariant { kind: &'static str, tag: u32 },

    #[error("unsupported {kind} version {version}")]
    UnsupportedVersion { kind: &'static str, version: u32 },

    #[error("invalid utf-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("{count} trailing bytes after decoding")]
    TrailingBytes { count: usize },

    #[error("invalid value: {0}")]
    Invalid(String),
}

impl DecodeError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Truncated { .. } => "truncated",
            Self::InvalidUleb128 { .. } => "uleb128",
            Self::InvalidBool { .. } => "bool",
            Self::UnknownVariant { .. } => "variant",
            Self::UnsupportedVersion { .. } => "version",
            Self::InvalidUtf8 { .. } => "utf8",
            Self::TrailingBytes { .. } => "trailing",
            Self::Invalid(_) => "invalid",
        }
    }
}

/// Errors raised while encoding a transaction that is not ready for the wire
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("input {index} for object {object_id} is unresolved")]
    UnresolvedInput { index: usize, object_id: String },

    #[error("package '{0}' is unresolved")]
    UnresolvedPackage(String),

    #[error("intent '{0}' was not consumed before encoding")]
    UnconsumedIntent(String),

    #[error("invalid type argument: {0}")]
    InvalidType(String),
}

/// Result type for decoding operations
pub type DecodeResult<T> = Result<T, DecodeError>;
