//! Correlation ids and trace context for executor operations
//!
//! Each queued operation gets a [`TraceContext`]: a correlation id, the
//! sender, and the operation's position in its executor's queue. Nested work
//! (the build inside an `execute`) shares the parent's correlation id.

use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::Span;
use uuid::Uuid;

/// Correlation ID linking the log lines of one executor operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for CorrelationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Executor operation kinds that get their own span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Build,
    Execute,
    ResetCache,
    WaitForInclusion,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Build => "build",
            Operation::Execute => "execute",
            Operation::ResetCache => "reset_cache",
            Operation::WaitForInclusion => "wait_for_inclusion",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceContext {
    pub correlation_id: CorrelationId,
    pub operation: Operation,
    pub sender: Address,
    /// Arrival order within the executor's queue
    pub sequence: u64,
    /// Set on contexts created with [`TraceContext::child`]
    pub parent: Option<Operation>,
    pub started_at_ms: u64,
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl TraceContext {
    pub fn new(operation: Operation, sender: Address, sequence: u64) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            operation,
            sender,
            sequence,
            parent: None,
            started_at_ms: unix_millis(),
        }
    }

    /// Nested operation under the same correlation id and queue position
    pub fn child(&self, operation: Operation) -> Self {
        Self {
            operation,
            parent: Some(self.operation),
            started_at_ms: unix_millis(),
            ..self.clone()
        }
    }

    pub fn span(&self) -> Span {
        tracing::info_span!(
            "ledger_tx",
            operation = %self.operation,
            correlation_id = %self.correlation_id,
            sender = %self.sender,
            seq = self.sequence,
            parent = self.parent.map(|p| p.as_str()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_shares_correlation() {
        let parent = TraceContext::new(Operation::Execute, Address::from_u64(1), 7);
        let child = parent.child(Operation::Build);
        assert_eq!(child.correlation_id, parent.correlation_id);
        assert_eq!(child.sequence, 7);
        assert_eq!(child.parent, Some(Operation::Execute));
        assert_eq!(child.operation, Operation::Build);
    }

    #[test]
    fn test_correlation_id_parses_its_display() {
        let id = CorrelationId::new();
        assert_eq!(id.to_string().parse::<CorrelationId>().unwrap(), id);
        assert!("not-a-uuid".parse::<CorrelationId>().is_err());
    }
}
