//! Transaction execution
//!
//! [`CachingExecutor`] builds against the object cache, submits signed
//! bytes and folds the resulting effects back into the cache.
//! [`SerialExecutor`] wraps it in a single-flight FIFO queue for one sender
//! so consecutive transactions chain on the fee object left by the previous
//! one.

mod serial;
mod wait;

pub use serial::{ExecuteRequest, SerialExecutor};
pub use wait::{cancel_pair, wait_for_inclusion, Backoff, CancelHandle, CancelSignal, Included, WaitError};

use crate::cache::ObjectCache;
use crate::client::{ClientError, LedgerClient, ObjectLookup, UserSignature};
use crate::codec::{decode_effects, DecodeError, StatusSummary, TransactionEffects};
use crate::config::InclusionConfig;
use crate::metrics::{metrics, Timer};
use crate::resolve::{BuildOptions, Pipeline};
use crate::tx_builder::{BuildError, TransactionBuilder};
use crate::types::{Address, Digest};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Build failed: {0}")]
    Build(#[from] BuildError),

    #[error("Signing failed: {0}")]
    Signing(ClientError),

    /// The ledger did not accept the transaction
    #[error("Submission failed: {0}")]
    Submission(ClientError),

    #[error("Undecodable effects: {0}")]
    Effects(#[from] DecodeError),

    #[error(transparent)]
    Wait(#[from] WaitError),
}

impl ExecutorError {
    /// Whether resubmitting the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Build(err) => err.is_retryable(),
            Self::Submission(err) => err.is_retryable(),
            _ => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Build(_) => "build",
            Self::Signing(_) => "signing",
            Self::Submission(_) => "submission",
            Self::Effects(_) => "effects",
            Self::Wait(_) => "wait",
        }
    }
}

/// Outcome of a submitted transaction
///
/// A failed execution status is still a result: the fee was charged and the
/// cache already follows the fee object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub digest: Digest,
    pub effects: TransactionEffects,
    pub raw_effects: Bytes,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.effects.is_success()
    }

    pub fn status(&self) -> StatusSummary {
        self.effects.status.summary()
    }
}

/// Build, submit and apply effects against one object cache
pub struct CachingExecutor {
    client: Arc<dyn LedgerClient>,
    lookup: Option<Arc<dyn ObjectLookup>>,
    cache: Arc<ObjectCache>,
    pipeline: Arc<Pipeline>,
}

impl CachingExecutor {
    pub fn new(client: Arc<dyn LedgerClient>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            client,
            lookup: None,
            cache: Arc::new(ObjectCache::new()),
            pipeline,
        }
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn ObjectLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn with_cache(mut self, cache: Arc<ObjectCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<ObjectCache> {
        &self.cache
    }

    pub fn client(&self) -> &Arc<dyn LedgerClient> {
        &self.client
    }

    /// Options wiring this executor's lookup client and cache into a build
    pub fn build_options(&self, default_budget: Option<u64>) -> BuildOptions {
        BuildOptions {
            lookup: self.lookup.clone(),
            cache: Some(self.cache.clone()),
            only_transaction_kind: false,
            default_budget,
        }
    }

    pub async fn build(
        &self,
        builder: &mut TransactionBuilder,
        options: &BuildOptions,
    ) -> Result<Bytes, BuildError> {
        builder.build(&self.pipeline, options).await
    }

    /// Submit signed bytes and apply the effects for `owner`
    pub async fn execute(
        &self,
        tx_bytes: &[u8],
        signatures: &[UserSignature],
        owner: &Address,
    ) -> Result<ExecutionResult, ExecutorError> {
        let timer = Timer::new();
        metrics().executions_total.inc();

        let response = self
            .client
            .submit(tx_bytes, signatures)
            .await
            .map_err(ExecutorError::Submission)?;
        let effects = decode_effects(&response.effects)?;
        self.apply_effects(&effects, owner);

        if effects.is_success() {
            metrics().executions_success.inc();
            info!(digest = %response.digest, "transaction executed");
        } else {
            metrics().executions_failed_status.inc();
            info!(
                digest = %response.digest,
                error = ?effects.status.summary().error,
                "transaction executed with failure status"
            );
        }
        timer.observe_duration(&metrics().execute_latency);

        Ok(ExecutionResult {
            digest: response.digest,
            effects,
            raw_effects: Bytes::from(response.effects),
        })
    }

    pub fn apply_effects(&self, effects: &TransactionEffects, owner: &Address) {
        self.cache.apply_effects(effects, owner);
    }

    pub fn reset(&self) {
        self.cache.reset();
        metrics().cache_resets.inc();
        debug!("object cache reset");
    }

    pub async fn wait_for_inclusion(
        &self,
        digest: &Digest,
        config: &InclusionConfig,
        cancel: CancelSignal,
    ) -> Result<Included, WaitError> {
        wait_for_inclusion(self.client.as_ref(), digest, config, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ExecutionFailure;
    use crate::resolve::IntentRegistry;
    use crate::config::ResolverConfig;
    use crate::test_utils::{fund, MockLedger, MockLookup, MockSigner};
    use crate::client::Signer;
    use crate::tx_builder::Argument;

    fn executor(lookup: Arc<MockLookup>) -> (CachingExecutor, Arc<MockLedger>) {
        let ledger = Arc::new(MockLedger::new(lookup.clone()));
        let pipeline = Arc::new(Pipeline::standard(
            &ResolverConfig::default(),
            IntentRegistry::with_defaults(),
        ));
        let executor = CachingExecutor::new(ledger.clone(), pipeline).with_lookup(lookup);
        (executor, ledger)
    }

    async fn signed(executor: &CachingExecutor, sender: Address) -> (Bytes, UserSignature) {
        let mut tx = TransactionBuilder::new();
        tx.set_sender(sender);
        let recipient = tx.pure(&sender).unwrap();
        tx.transfer_objects(vec![Argument::FeeObject], recipient).unwrap();
        let bytes = executor
            .build(&mut tx, &executor.build_options(Some(1_000)))
            .await
            .unwrap();
        let signature = MockSigner::new(sender).sign_transaction(&bytes).await.unwrap();
        (bytes, signature)
    }

    #[tokio::test]
    async fn test_execute_updates_fee_object() {
        let sender = Address::from_u64(1);
        let lookup = Arc::new(MockLookup::new());
        let coin = fund(&lookup, sender, 50, 10_000);
        let (executor, _ledger) = executor(lookup.clone());

        let (bytes, signature) = signed(&executor, sender).await;
        let result = executor.execute(&bytes, &[signature], &sender).await.unwrap();

        assert!(result.is_success());
        let fee = executor.cache().get_fee_object().unwrap();
        assert_eq!(fee.object_id, coin.object_id);
        assert_eq!(fee.version, coin.version + 1);
        assert_eq!(lookup.object(&coin.object_id).unwrap().object_ref, fee);
    }

    #[tokio::test]
    async fn test_failed_status_still_applies_effects() {
        let sender = Address::from_u64(1);
        let lookup = Arc::new(MockLookup::new());
        let coin = fund(&lookup, sender, 50, 10_000);
        let (executor, ledger) = executor(lookup);
        ledger.fail_next_execution(ExecutionFailure::InsufficientGas);

        let (bytes, signature) = signed(&executor, sender).await;
        let result = executor.execute(&bytes, &[signature], &sender).await.unwrap();

        assert!(!result.is_success());
        assert_eq!(result.status().error.as_deref(), Some("InsufficientGas"));
        assert_eq!(executor.cache().get_fee_object().unwrap().version, coin.version + 1);
    }

    #[tokio::test]
    async fn test_rejection_is_submission_error() {
        let sender = Address::from_u64(1);
        let lookup = Arc::new(MockLookup::new());
        fund(&lookup, sender, 50, 10_000);
        let (executor, ledger) = executor(lookup);
        ledger.fail_next_submit(ClientError::Transport("connection reset".to_string()));

        let (bytes, signature) = signed(&executor, sender).await;
        let err = executor.execute(&bytes, &[signature], &sender).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Submission(_)));
        assert!(err.is_retryable());
        assert_eq!(err.category(), "submission");
    }
}
