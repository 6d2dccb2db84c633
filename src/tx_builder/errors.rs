//! Error types for transaction building and resolution
//!
//! Every `BuildError` is fatal to the build that raised it. The builder never
//! retries on its own; `is_retryable` only tells the caller whether a fresh
//! attempt could succeed (e.g. a lookup that failed in transport).

use crate::client::ClientError;
use crate::codec::EncodeError;
use crate::types::{Address, ObjectId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    /// A named package had no address on the ledger
    #[error("Unresolved name: {0}")]
    UnresolvedName(String),

    /// An object input was not found by the lookup client
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// No handler is registered for an intent command
    #[error("Unregistered intent: {0}")]
    UnregisteredIntent(String),

    /// A resolution step needs a lookup client and none was configured
    #[error("Missing client: a lookup client is required to {0}")]
    MissingClient(&'static str),

    /// An intent handler could not produce replacement commands
    #[error("Intent '{name}' failed: {reason}")]
    Intent { name: String, reason: String },

    /// A command references itself, a later command, or a missing input
    #[error("Invalid reference in command {command}: {reason}")]
    InvalidReference { command: usize, reason: String },

    /// A command references a command removed without a replacement result
    #[error("Dangling reference to removed command {0}")]
    DanglingReference(usize),

    /// Merge or splice position outside the command list
    #[error("Index {index} out of range for {len} commands")]
    IndexOutOfRange { index: usize, len: usize },

    /// The same object was supplied with incompatible reference kinds
    #[error("Conflicting inputs for object {object_id}: {existing} vs {incoming}")]
    ConflictingInput {
        object_id: ObjectId,
        existing: &'static str,
        incoming: &'static str,
    },

    /// Input or command count exceeds the 16-bit argument index space
    #[error("Too many {0}")]
    TooMany(&'static str),

    #[error("Invalid move call target '{0}'")]
    InvalidTarget(String),

    #[error("Invalid type argument: {0}")]
    InvalidType(String),

    #[error("Missing sender")]
    MissingSender,

    #[error("Missing gas budget")]
    MissingGasBudget,

    #[error("No gas coins available for {0}")]
    NoGasCoins(Address),

    /// The IR still contains something the codec cannot represent
    #[error("Incomplete transaction: {0}")]
    Incomplete(String),

    #[error("Encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BuildError {
    /// Whether a fresh build attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Client(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Error category for metrics labels
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnresolvedName(_)
            | Self::ObjectNotFound(_)
            | Self::UnregisteredIntent(_) => "unresolved",
            Self::MissingClient(_) => "client_missing",
            Self::Intent { .. } => "intent",
            Self::InvalidReference { .. }
            | Self::DanglingReference(_)
            | Self::IndexOutOfRange { .. }
            | Self::ConflictingInput { .. }
            | Self::TooMany(_) => "structure",
            Self::InvalidTarget(_) | Self::InvalidType(_) => "syntax",
            Self::MissingSender | Self::MissingGasBudget | Self::NoGasCoins(_) => "gas",
            Self::Incomplete(_) | Self::Encode(_) => "encode",
            Self::Client(_) => "client",
            Self::Internal(_) => "internal",
        }
    }
}

// Convenience constructors
impl BuildError {
    pub fn invalid_reference(command: usize, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            command,
            reason: reason.into(),
        }
    }

    pub fn intent_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Intent {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn incomplete(reason: impl Into<String>) -> Self {
        Self::Incomplete(reason.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BuildError::UnresolvedName("@org/app".to_string());
        assert_eq!(err.to_string(), "Unresolved name: @org/app");

        let err = BuildError::invalid_reference(2, "Result(3) is not a prior command");
        assert_eq!(
            err.to_string(),
            "Invalid reference in command 2: Result(3) is not a prior command"
        );
    }

    #[test]
    fn test_error_retryability() {
        assert!(BuildError::Client(ClientError::Transport("reset".to_string())).is_retryable());
        assert!(!BuildError::Client(ClientError::Rejected("bad".to_string())).is_retryable());
        assert!(!BuildError::MissingClient("resolve objects").is_retryable());
        assert!(!BuildError::DanglingReference(1).is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(BuildError::ObjectNotFound(Address::ZERO).category(), "unresolved");
        assert_eq!(BuildError::MissingGasBudget.category(), "gas");
        assert_eq!(
            BuildError::from(EncodeError::MissingField("sender")).category(),
            "encode"
        );
    }
}
