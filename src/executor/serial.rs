//! Single-flight executor for one sender
//!
//! Every `build` and `execute` holds the queue for its whole duration.
//! Waiters are served in arrival order (tokio's mutex is fair), so each
//! operation sees the cache exactly as its predecessor left it. Any failure
//! inside `execute` resets the cache before the error is returned, so the
//! next operation never pays with a fee object that may already be spent.

use super::{CachingExecutor, ExecutionResult, ExecutorError, Included, CancelSignal};
use crate::client::{LedgerClient, ObjectLookup, Signer};
use crate::config::{Config, InclusionConfig};
use crate::metrics::metrics;
use crate::observability::{Operation, TraceContext};
use crate::resolve::{IntentRegistry, Pipeline};
use crate::tx_builder::TransactionBuilder;
use crate::types::{Address, Digest};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{warn, Instrument};

/// What `execute` submits
#[derive(Debug, Clone)]
pub enum ExecuteRequest {
    /// Built inside the queue, against the current cache
    Builder(TransactionBuilder),
    /// Already built and encoded
    Bytes(Bytes),
}

impl From<TransactionBuilder> for ExecuteRequest {
    fn from(builder: TransactionBuilder) -> Self {
        ExecuteRequest::Builder(builder)
    }
}

impl From<Bytes> for ExecuteRequest {
    fn from(bytes: Bytes) -> Self {
        ExecuteRequest::Bytes(bytes)
    }
}

impl From<Vec<u8>> for ExecuteRequest {
    fn from(bytes: Vec<u8>) -> Self {
        ExecuteRequest::Bytes(Bytes::from(bytes))
    }
}

/// Decrements the queue depth gauge when an operation leaves the queue
struct QueueSlot;

impl QueueSlot {
    fn enter() -> Self {
        metrics().executor_queue_depth.inc();
        QueueSlot
    }
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        metrics().executor_queue_depth.dec();
    }
}

pub struct SerialExecutor {
    inner: CachingExecutor,
    signer: Arc<dyn Signer>,
    queue: Mutex<()>,
    default_gas_budget: u64,
    inclusion: InclusionConfig,
    last_digest: parking_lot::Mutex<Option<Digest>>,
    sequence: AtomicU64,
}

impl SerialExecutor {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        lookup: Arc<dyn ObjectLookup>,
        signer: Arc<dyn Signer>,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        Self::from_parts(
            CachingExecutor::new(client, pipeline).with_lookup(lookup),
            signer,
            &Config::default(),
        )
    }

    /// Executor with the standard pipeline and the configured limits
    pub fn from_config(
        client: Arc<dyn LedgerClient>,
        lookup: Arc<dyn ObjectLookup>,
        signer: Arc<dyn Signer>,
        config: &Config,
        intents: IntentRegistry,
    ) -> Self {
        let pipeline = Arc::new(Pipeline::standard(&config.resolver, intents));
        Self::from_parts(
            CachingExecutor::new(client, pipeline).with_lookup(lookup),
            signer,
            config,
        )
    }

    pub fn from_parts(inner: CachingExecutor, signer: Arc<dyn Signer>, config: &Config) -> Self {
        Self {
            inner,
            signer,
            queue: Mutex::new(()),
            default_gas_budget: config.executor.default_gas_budget,
            inclusion: config.inclusion.clone(),
            last_digest: parking_lot::Mutex::new(None),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn with_default_gas_budget(mut self, budget: u64) -> Self {
        self.default_gas_budget = budget;
        self
    }

    pub fn with_inclusion(mut self, inclusion: InclusionConfig) -> Self {
        self.inclusion = inclusion;
        self
    }

    /// The sender every transaction defaults to
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn inner(&self) -> &CachingExecutor {
        &self.inner
    }

    /// Digest of the last transaction this executor submitted successfully
    pub fn last_digest(&self) -> Option<Digest> {
        *self.last_digest.lock()
    }

    fn trace(&self, operation: Operation) -> TraceContext {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        TraceContext::new(operation, self.address(), sequence)
    }

    /// Build `builder` in queue order against the current cache
    pub async fn build(&self, builder: TransactionBuilder) -> Result<Bytes, ExecutorError> {
        let _slot = QueueSlot::enter();
        let trace = self.trace(Operation::Build);
        async {
            let _turn = self.queue.lock().await;
            self.build_locked(builder).await
        }
        .instrument(trace.span())
        .await
    }

    /// Build if needed, sign, submit and apply effects, in queue order
    pub async fn execute(
        &self,
        request: impl Into<ExecuteRequest>,
    ) -> Result<ExecutionResult, ExecutorError> {
        let request = request.into();
        let _slot = QueueSlot::enter();
        let trace = self.trace(Operation::Execute);
        async {
            let _turn = self.queue.lock().await;
            let result = self.execute_locked(request, &trace).await;
            match &result {
                Ok(executed) => {
                    *self.last_digest.lock() = Some(executed.digest);
                }
                Err(err) => {
                    metrics().record_submission_error(err.category());
                    warn!(error = %err, "execution failed, resetting object cache");
                    self.inner.reset();
                }
            }
            result
        }
        .instrument(trace.span())
        .await
    }

    /// Clear the object cache once every queued operation ahead has finished
    pub async fn reset_cache(&self) {
        let trace = self.trace(Operation::ResetCache);
        async {
            let _turn = self.queue.lock().await;
            self.inner.reset();
        }
        .instrument(trace.span())
        .await
    }

    /// Wait until `digest` is on the ledger; the cache is left untouched
    pub async fn wait_for_inclusion(
        &self,
        digest: &Digest,
        cancel: CancelSignal,
    ) -> Result<Included, ExecutorError> {
        let trace = self.trace(Operation::WaitForInclusion);
        Ok(self
            .inner
            .wait_for_inclusion(digest, &self.inclusion, cancel)
            .instrument(trace.span())
            .await?)
    }

    /// Wait for the last submitted transaction, if there is one
    pub async fn wait_for_last_transaction(
        &self,
        cancel: CancelSignal,
    ) -> Result<Option<Included>, ExecutorError> {
        match self.last_digest() {
            Some(digest) => self.wait_for_inclusion(&digest, cancel).await.map(Some),
            None => Ok(None),
        }
    }

    async fn build_locked(&self, mut builder: TransactionBuilder) -> Result<Bytes, ExecutorError> {
        let sender = self.signer.address();
        builder.set_sender_if_unset(sender);
        builder.set_gas_budget_if_unset(self.default_gas_budget);

        let data = builder.data();
        let self_paid = data.gas_owner() == Some(sender);
        if self_paid && data.gas.payment.is_none() {
            if let Some(fee_object) = self.inner.cache().get_fee_object() {
                builder.set_gas_payment(vec![fee_object]);
            }
        }

        let options = self.inner.build_options(Some(self.default_gas_budget));
        Ok(self.inner.build(&mut builder, &options).await?)
    }

    async fn execute_locked(
        &self,
        request: ExecuteRequest,
        trace: &TraceContext,
    ) -> Result<ExecutionResult, ExecutorError> {
        let bytes = match request {
            ExecuteRequest::Builder(builder) => {
                self.build_locked(builder)
                    .instrument(trace.child(Operation::Build).span())
                    .await?
            }
            ExecuteRequest::Bytes(bytes) => bytes,
        };
        let signature = self
            .signer
            .sign_transaction(&bytes)
            .await
            .map_err(ExecutorError::Signing)?;
        self.inner
            .execute(&bytes, &[signature], &self.signer.address())
            .await
    }
}
