//! Test Utilities Module
//!
//! In-memory stand-ins for the collaborator traits: a lookup client, a
//! ledger that checks fee-object versions and produces effects, and a signer.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use crate::client::{
    ClientError, CoinInfo, LedgerClient, ObjectInfo, ObjectLookup, Signer, SubmitResponse,
    UserSignature,
};
use crate::codec::{
    decode_transaction, encode_effects, simple_effects, transaction_digest, ExecutionFailure,
    ExecutionStatus,
};
use crate::tx_builder::TransactionData;
use crate::types::{normalize_type, Address, Blake2b256, Digest, ObjectId, ObjectRef, Owner};
use async_trait::async_trait;
use parking_lot::Mutex;
use blake2::Digest as _;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

fn coin_key(coin_type: &str) -> String {
    normalize_type(coin_type).unwrap_or_else(|_| coin_type.to_string())
}

#[derive(Debug, Default)]
struct LookupState {
    objects: HashMap<ObjectId, ObjectInfo>,
    packages: HashMap<String, Address>,
    coins: HashMap<(Address, String), Vec<CoinInfo>>,
    gas_price: u64,
    object_requests: usize,
    package_requests: usize,
}

/// Object lookup backed by maps
#[derive(Debug)]
pub struct MockLookup {
    state: Mutex<LookupState>,
}

impl Default for MockLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLookup {
    /// Empty lookup with a reference gas price of 1000
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LookupState {
                gas_price: 1_000,
                ..Default::default()
            }),
        }
    }

    pub fn add_object(&self, info: ObjectInfo) {
        self.state
            .lock()
            .objects
            .insert(info.object_ref.object_id, info);
    }

    pub fn add_package(&self, name: &str, address: Address) {
        self.state.lock().packages.insert(name.to_string(), address);
    }

    /// Replace `owner`'s coins of `coin_type`; each coin is also an object
    pub fn add_coins(&self, owner: Address, coin_type: &str, coins: Vec<CoinInfo>) {
        let mut state = self.state.lock();
        for coin in &coins {
            state.objects.insert(
                coin.object_ref.object_id,
                ObjectInfo {
                    object_ref: coin.object_ref,
                    owner: Owner::AddressOwner(owner),
                },
            );
        }
        state.coins.insert((owner, coin_key(coin_type)), coins);
    }

    pub fn set_gas_price(&self, price: u64) {
        self.state.lock().gas_price = price;
    }

    pub fn object(&self, object_id: &ObjectId) -> Option<ObjectInfo> {
        self.state.lock().objects.get(object_id).copied()
    }

    /// Move an object to a new reference and owner, following it in coin lists
    pub fn advance_object(&self, object_ref: ObjectRef, owner: Owner) {
        let mut state = self.state.lock();
        state
            .objects
            .insert(object_ref.object_id, ObjectInfo { object_ref, owner });
        for coins in state.coins.values_mut() {
            for coin in coins.iter_mut() {
                if coin.object_ref.object_id == object_ref.object_id {
                    coin.object_ref = object_ref;
                }
            }
        }
    }

    pub fn object_requests(&self) -> usize {
        self.state.lock().object_requests
    }

    pub fn package_requests(&self) -> usize {
        self.state.lock().package_requests
    }
}

#[async_trait]
impl ObjectLookup for MockLookup {
    async fn get_objects(&self, ids: &[ObjectId]) -> Result<Vec<Option<ObjectInfo>>, ClientError> {
        let mut state = self.state.lock();
        state.object_requests += 1;
        Ok(ids.iter().map(|id| state.objects.get(id).copied()).collect())
    }

    async fn resolve_packages(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, Address>, ClientError> {
        let mut state = self.state.lock();
        state.package_requests += 1;
        Ok(names
            .iter()
            .filter_map(|name| state.packages.get(name).map(|a| (name.clone(), *a)))
            .collect())
    }

    async fn reference_gas_price(&self) -> Result<u64, ClientError> {
        Ok(self.state.lock().gas_price)
    }

    async fn get_coins(&self, owner: Address, coin_type: &str) -> Result<Vec<CoinInfo>, ClientError> {
        Ok(self
            .state
            .lock()
            .coins
            .get(&(owner, coin_key(coin_type)))
            .cloned()
            .unwrap_or_default())
    }
}

/// Scripted answer for one `fetch_effects` call
#[derive(Debug, Clone)]
pub enum FetchStep {
    NotYet,
    Fail(ClientError),
}

#[derive(Debug, Default)]
struct LedgerState {
    effects: HashMap<Digest, Vec<u8>>,
    submitted: Vec<TransactionData>,
    submit_errors: VecDeque<ClientError>,
    execution_failures: VecDeque<ExecutionFailure>,
    fetch_script: VecDeque<FetchStep>,
}

/// Ledger that executes fee-only transactions
///
/// A submission is rejected unless its first gas coin matches the current
/// reference held by the shared [`MockLookup`]. Accepted submissions move
/// the coin to a new version and the lookup follows it.
#[derive(Debug)]
pub struct MockLedger {
    lookup: Arc<MockLookup>,
    state: Mutex<LedgerState>,
    latency: Option<Duration>,
}

impl MockLedger {
    pub fn new(lookup: Arc<MockLookup>) -> Self {
        Self {
            lookup,
            state: Mutex::new(LedgerState::default()),
            latency: None,
        }
    }

    /// Sleep this long inside every submission
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the next submission with `error` before it reaches the ledger
    pub fn fail_next_submit(&self, error: ClientError) {
        self.state.lock().submit_errors.push_back(error);
    }

    /// Execute the next submission with a failed status
    pub fn fail_next_execution(&self, failure: ExecutionFailure) {
        self.state.lock().execution_failures.push_back(failure);
    }

    /// Queue answers for upcoming `fetch_effects` calls
    pub fn script_fetches(&self, steps: impl IntoIterator<Item = FetchStep>) {
        self.state.lock().fetch_script.extend(steps);
    }

    pub fn insert_effects(&self, digest: Digest, effects: Vec<u8>) {
        self.state.lock().effects.insert(digest, effects);
    }

    /// Transactions accepted so far, in order
    pub fn submitted(&self) -> Vec<TransactionData> {
        self.state.lock().submitted.clone()
    }

    fn execute(&self, tx_bytes: &[u8]) -> Result<SubmitResponse, ClientError> {
        let mut state = self.state.lock();
        if let Some(error) = state.submit_errors.pop_front() {
            return Err(error);
        }

        let data = decode_transaction(tx_bytes)
            .map_err(|e| ClientError::Rejected(format!("undecodable transaction: {e}")))?;
        let digest = transaction_digest(tx_bytes);
        let owner = data
            .gas_owner()
            .ok_or_else(|| ClientError::Rejected("missing gas owner".to_string()))?;
        let fee = data
            .gas
            .payment
            .as_ref()
            .and_then(|payment| payment.first().copied())
            .ok_or_else(|| ClientError::Rejected("missing gas payment".to_string()))?;

        let current = self.lookup.object(&fee.object_id).map(|info| info.object_ref);
        if current != Some(fee) {
            return Err(ClientError::Rejected(format!(
                "object {} at version {} is not available for consumption",
                fee.object_id, fee.version
            )));
        }

        let lamport_version = fee.version + 1;
        let new_digest = Digest::new(Blake2b256::digest(digest.as_bytes()).into());
        let mut effects = simple_effects(digest, fee, new_digest, owner, lamport_version);
        if let Some(error) = state.execution_failures.pop_front() {
            effects.status = ExecutionStatus::Failure {
                error,
                command: Some(0),
            };
        }
        self.lookup.advance_object(
            ObjectRef::new(fee.object_id, lamport_version, new_digest),
            Owner::AddressOwner(owner),
        );

        let bytes = encode_effects(&effects);
        state.effects.insert(digest, bytes.clone());
        state.submitted.push(data);
        Ok(SubmitResponse {
            digest,
            effects: bytes,
        })
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn submit(
        &self,
        tx_bytes: &[u8],
        signatures: &[UserSignature],
    ) -> Result<SubmitResponse, ClientError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if signatures.is_empty() {
            return Err(ClientError::Rejected("missing signature".to_string()));
        }
        self.execute(tx_bytes)
    }

    async fn fetch_effects(&self, digest: &Digest) -> Result<Option<Vec<u8>>, ClientError> {
        let mut state = self.state.lock();
        match state.fetch_script.pop_front() {
            Some(FetchStep::NotYet) => Ok(None),
            Some(FetchStep::Fail(error)) => Err(error),
            None => Ok(state.effects.get(digest).cloned()),
        }
    }
}

/// Signer with a fixed address and a hash-based signature
#[derive(Debug, Clone)]
pub struct MockSigner {
    address: Address,
    fail: bool,
}

impl MockSigner {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            fail: false,
        }
    }

    pub fn failing(address: Address) -> Self {
        Self {
            address,
            fail: true,
        }
    }
}

#[async_trait]
impl Signer for MockSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_transaction(&self, tx_bytes: &[u8]) -> Result<UserSignature, ClientError> {
        if self.fail {
            return Err(ClientError::Signing("mock signer refused".to_string()));
        }
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&Blake2b256::digest(tx_bytes));
        Ok(UserSignature::new(bytes))
    }
}

/// A native coin owned by `owner`, registered with `lookup`
pub fn fund(lookup: &MockLookup, owner: Address, id: u64, balance: u64) -> ObjectRef {
    let object_ref = ObjectRef::new(Address::from_u64(id), 1, Digest::new([id as u8; 32]));
    lookup.add_coins(
        owner,
        crate::types::NATIVE_COIN_TYPE,
        vec![CoinInfo {
            object_ref,
            balance,
        }],
    );
    object_ref
}
