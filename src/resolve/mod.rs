//! Asynchronous resolution pipeline
//!
//! A [`Pipeline`] is an ordered list of [`ResolutionStage`]s. Each stage may
//! look things up and rewrite the builder, then returns a [`Flow`]. Stages
//! run in registration order on a private copy of the builder; the copy is
//! committed only after every stage ran (or one returned [`Flow::Stop`]) and
//! the final completeness check passed.
//!
//! The standard order is:
//!
//! 1. [`NamedPackageStage`]: `@org/app` names to addresses
//! 2. [`IntentStage`]: intent commands to concrete commands
//! 3. [`ObjectStage`]: unresolved object inputs to object references
//! 4. [`GasStage`]: sender-derived gas owner, price, budget and payment

mod coins;
mod gas;
mod intents;
mod names;
mod objects;

pub use coins::CoinWithBalanceIntent;
pub use gas::GasStage;
pub use intents::{CallbackIntent, IntentHandler, IntentRegistry, IntentStage};
pub use names::NamedPackageStage;
pub use objects::ObjectStage;

use crate::cache::ObjectCache;
use crate::client::ObjectLookup;
use crate::config::ResolverConfig;
use crate::metrics::{metrics, Timer};
use crate::tx_builder::{BuildError, TransactionBuilder};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// What the driver does after a stage returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Skip the remaining stages; the final check still runs
    Stop,
}

/// Collaborators and switches for one build
#[derive(Clone, Default)]
pub struct BuildOptions {
    pub lookup: Option<Arc<dyn ObjectLookup>>,
    /// Object cache consulted before the lookup client
    pub cache: Option<Arc<ObjectCache>>,
    /// Encode only the transaction kind, without sender or gas
    pub only_transaction_kind: bool,
    /// Gas budget used when the transaction sets none
    pub default_budget: Option<u64>,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn ObjectLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn with_cache(mut self, cache: Arc<ObjectCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_default_budget(mut self, budget: u64) -> Self {
        self.default_budget = Some(budget);
        self
    }

    pub fn kind_only(mut self) -> Self {
        self.only_transaction_kind = true;
        self
    }

    /// The lookup client, or `MissingClient` naming what needed it
    pub(crate) fn require_lookup(
        &self,
        purpose: &'static str,
    ) -> Result<&Arc<dyn ObjectLookup>, BuildError> {
        self.lookup.as_ref().ok_or(BuildError::MissingClient(purpose))
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("lookup", &self.lookup.is_some())
            .field("cache", &self.cache.is_some())
            .field("only_transaction_kind", &self.only_transaction_kind)
            .field("default_budget", &self.default_budget)
            .finish()
    }
}

#[async_trait]
pub trait ResolutionStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(
        &self,
        builder: &mut TransactionBuilder,
        options: &BuildOptions,
    ) -> Result<Flow, BuildError>;
}

#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn ResolutionStage>>,
}

impl Pipeline {
    /// Pipeline without stages; only the final check runs
    pub fn new() -> Self {
        Self::default()
    }

    /// The four built-in stages in their standard order
    pub fn standard(config: &ResolverConfig, intents: IntentRegistry) -> Self {
        Self::new()
            .with_stage(NamedPackageStage::new(config.max_batch_size))
            .with_stage(IntentStage::new(intents))
            .with_stage(ObjectStage::new(config.max_batch_size))
            .with_stage(GasStage::new(config.max_gas_objects))
    }

    pub fn with_stage(mut self, stage: impl ResolutionStage + 'static) -> Self {
        self.push(stage);
        self
    }

    pub fn push(&mut self, stage: impl ResolutionStage + 'static) {
        self.stages.push(Box::new(stage));
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Resolve `builder` in place; on error it is left as it was
    pub async fn run(
        &self,
        builder: &mut TransactionBuilder,
        options: &BuildOptions,
    ) -> Result<(), BuildError> {
        let timer = Timer::new();
        metrics().builds_total.inc();

        let result = self.run_stages(builder, options).await;
        match &result {
            Ok(()) => timer.observe_duration(&metrics().build_latency),
            Err(err) => {
                metrics().record_build_failure(err.category());
                debug!(error = %err, "resolution failed");
            }
        }
        result
    }

    async fn run_stages(
        &self,
        builder: &mut TransactionBuilder,
        options: &BuildOptions,
    ) -> Result<(), BuildError> {
        let mut candidate = builder.clone();
        for stage in &self.stages {
            let flow = stage.resolve(&mut candidate, options).await?;
            debug!(stage = stage.name(), ?flow, "stage finished");
            if flow == Flow::Stop {
                break;
            }
        }
        candidate.validate_resolved()?;
        *builder = candidate;
        Ok(())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::{Argument, Command};
    use crate::types::Address;
    use std::collections::BTreeMap;

    /// Appends a marker command, then returns `flow`
    struct Marker(Flow);

    #[async_trait]
    impl ResolutionStage for Marker {
        fn name(&self) -> &'static str {
            "marker"
        }

        async fn resolve(
            &self,
            builder: &mut TransactionBuilder,
            _options: &BuildOptions,
        ) -> Result<Flow, BuildError> {
            builder.split_coins(Argument::FeeObject, vec![])?;
            Ok(self.0)
        }
    }

    struct Fails;

    #[async_trait]
    impl ResolutionStage for Fails {
        fn name(&self) -> &'static str {
            "fails"
        }

        async fn resolve(
            &self,
            builder: &mut TransactionBuilder,
            _options: &BuildOptions,
        ) -> Result<Flow, BuildError> {
            builder.split_coins(Argument::FeeObject, vec![])?;
            Err(BuildError::MissingClient("test"))
        }
    }

    #[tokio::test]
    async fn test_stop_skips_later_stages() {
        let pipeline = Pipeline::new()
            .with_stage(Marker(Flow::Stop))
            .with_stage(Marker(Flow::Continue));
        let mut tx = TransactionBuilder::new();
        pipeline.run(&mut tx, &BuildOptions::new()).await.unwrap();
        assert_eq!(tx.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_run_commits_nothing() {
        let pipeline = Pipeline::new()
            .with_stage(Marker(Flow::Continue))
            .with_stage(Fails);
        let mut tx = TransactionBuilder::new();
        let err = pipeline.run(&mut tx, &BuildOptions::new()).await.unwrap_err();
        assert!(matches!(err, BuildError::MissingClient("test")));
        assert!(tx.commands().is_empty());
    }

    #[tokio::test]
    async fn test_final_check_rejects_leftovers() {
        let mut tx = TransactionBuilder::new();
        tx.add_intent("Leftover", BTreeMap::new(), serde_json::Value::Null)
            .unwrap();
        tx.object_id(Address::from_u64(3)).unwrap();
        let before = tx.clone();

        let err = Pipeline::new()
            .run(&mut tx, &BuildOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Incomplete(_)));
        assert_eq!(tx, before);
        assert!(matches!(tx.commands()[0], Command::Intent(_)));
    }

    #[test]
    fn test_standard_stage_order() {
        let pipeline = Pipeline::standard(&ResolverConfig::default(), IntentRegistry::with_defaults());
        assert_eq!(
            pipeline.stage_names(),
            vec!["named_packages", "intents", "objects", "gas"]
        );
    }
}
