//! Collaborator boundaries: ledger transport, object lookup and signing
//!
//! Transport implementations live outside this crate. The executor and the
//! resolution stages only see these traits.

use crate::types::{Address, Digest, ObjectId, ObjectRef, Owner};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Network or connection failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The ledger refused the request (e.g. version conflict on an input)
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Rejected(_) => "rejected",
            Self::Timeout(_) => "timeout",
            Self::Signing(_) => "signing",
            Self::InvalidResponse(_) => "response",
        }
    }
}

/// Serialized user signature: scheme flag, signature, public key
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSignature(Vec<u8>);

impl UserSignature {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }
}

impl fmt::Debug for UserSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserSignature({})", self.to_base64())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    pub digest: Digest,
    /// Canonical effects bytes as returned by the ledger
    pub effects: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    pub object_ref: ObjectRef,
    pub owner: Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinInfo {
    pub object_ref: ObjectRef,
    pub balance: u64,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit signed transaction bytes and wait for effects
    async fn submit(
        &self,
        tx_bytes: &[u8],
        signatures: &[UserSignature],
    ) -> Result<SubmitResponse, ClientError>;

    /// Effects of an executed transaction, `None` while it is not yet known
    async fn fetch_effects(&self, digest: &Digest) -> Result<Option<Vec<u8>>, ClientError>;
}

#[async_trait]
pub trait ObjectLookup: Send + Sync {
    /// Results are positional; `None` marks an object that does not exist
    async fn get_objects(&self, ids: &[ObjectId]) -> Result<Vec<Option<ObjectInfo>>, ClientError>;

    /// Addresses for named packages; unknown names are simply absent
    async fn resolve_packages(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, Address>, ClientError>;

    async fn reference_gas_price(&self) -> Result<u64, ClientError>;

    async fn get_coins(&self, owner: Address, coin_type: &str) -> Result<Vec<CoinInfo>, ClientError>;
}

#[async_trait]
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_transaction(&self, tx_bytes: &[u8]) -> Result<UserSignature, ClientError>;
}
