//! Intent dispatch
//!
//! Each `Intent` command is handed to the handler registered under its name.
//! A handler must consume the command, usually through
//! [`TransactionBuilder::replace_command`].

use super::coins::CoinWithBalanceIntent;
use super::{BuildOptions, Flow, ResolutionStage};
use crate::tx_builder::{BuildError, Command, IntentCommand, TransactionBuilder, COIN_WITH_BALANCE};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait IntentHandler: Send + Sync {
    /// Replace the intent at `index` with concrete commands
    async fn resolve(
        &self,
        builder: &mut TransactionBuilder,
        index: usize,
        intent: &IntentCommand,
        options: &BuildOptions,
    ) -> Result<(), BuildError>;
}

/// Handlers by intent name
#[derive(Clone, Default)]
pub struct IntentRegistry {
    handlers: HashMap<String, Arc<dyn IntentHandler>>,
}

impl IntentRegistry {
    /// Registry without any handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `CoinWithBalance` handler
    pub fn with_defaults() -> Self {
        Self::new().with(COIN_WITH_BALANCE, CoinWithBalanceIntent)
    }

    pub fn with(mut self, name: impl Into<String>, handler: impl IntentHandler + 'static) -> Self {
        self.register(name, handler);
        self
    }

    /// Register `handler`, returning the one it replaces
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: impl IntentHandler + 'static,
    ) -> Option<Arc<dyn IntentHandler>> {
        self.handlers.insert(name.into(), Arc::new(handler))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn IntentHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

impl fmt::Debug for IntentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("IntentRegistry").field("handlers", &names).finish()
    }
}

/// Passes the intent's data to a closure, then deletes the command
///
/// The intent's result must not be used by other commands.
pub struct CallbackIntent<F> {
    callback: F,
}

impl<F> CallbackIntent<F>
where
    F: Fn(&serde_json::Value) -> Result<(), String> + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> IntentHandler for CallbackIntent<F>
where
    F: Fn(&serde_json::Value) -> Result<(), String> + Send + Sync,
{
    async fn resolve(
        &self,
        builder: &mut TransactionBuilder,
        index: usize,
        intent: &IntentCommand,
        _options: &BuildOptions,
    ) -> Result<(), BuildError> {
        (self.callback)(&intent.data)
            .map_err(|reason| BuildError::intent_failed(&intent.name, reason))?;
        builder.replace_command(index, Vec::new(), None)
    }
}

#[derive(Debug)]
pub struct IntentStage {
    registry: IntentRegistry,
}

impl IntentStage {
    pub fn new(registry: IntentRegistry) -> Self {
        Self { registry }
    }
}

fn next_intent(builder: &TransactionBuilder) -> Option<(usize, IntentCommand)> {
    builder
        .commands()
        .iter()
        .enumerate()
        .find_map(|(index, command)| match command {
            Command::Intent(intent) => Some((index, intent.clone())),
            _ => None,
        })
}

fn intent_count(builder: &TransactionBuilder) -> usize {
    builder
        .commands()
        .iter()
        .filter(|command| matches!(command, Command::Intent(_)))
        .count()
}

#[async_trait]
impl ResolutionStage for IntentStage {
    fn name(&self) -> &'static str {
        "intents"
    }

    async fn resolve(
        &self,
        builder: &mut TransactionBuilder,
        options: &BuildOptions,
    ) -> Result<Flow, BuildError> {
        // fail before any handler runs
        for command in builder.commands() {
            if let Command::Intent(intent) = command {
                if !self.registry.contains(&intent.name) {
                    return Err(BuildError::UnregisteredIntent(intent.name.clone()));
                }
            }
        }

        while let Some((index, intent)) = next_intent(builder) {
            let handler = self
                .registry
                .get(&intent.name)
                .ok_or_else(|| BuildError::UnregisteredIntent(intent.name.clone()))?;
            let remaining = intent_count(builder);

            handler.resolve(builder, index, &intent, options).await?;

            if intent_count(builder) >= remaining {
                return Err(BuildError::intent_failed(
                    &intent.name,
                    "handler did not consume the intent command",
                ));
            }
            debug!(intent = %intent.name, index, "resolved intent");
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::Argument;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    fn with_callback_intent() -> TransactionBuilder {
        let mut tx = TransactionBuilder::new();
        tx.split_coins(Argument::FeeObject, vec![]).unwrap();
        tx.add_intent("Notify", BTreeMap::new(), serde_json::json!({ "tag": 7 }))
            .unwrap();
        let coin = tx.split_coins(Argument::FeeObject, vec![]).unwrap();
        tx.transfer_objects(vec![coin], Argument::FeeObject).unwrap();
        tx
    }

    #[tokio::test]
    async fn test_callback_receives_data_and_command_is_removed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let registry = IntentRegistry::new().with(
            "Notify",
            CallbackIntent::new(move |data: &serde_json::Value| {
                sink.lock().push(data.clone());
                Ok(())
            }),
        );

        let mut tx = with_callback_intent();
        IntentStage::new(registry)
            .resolve(&mut tx, &BuildOptions::new())
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![serde_json::json!({ "tag": 7 })]);
        assert_eq!(tx.commands().len(), 3);
        assert_eq!(
            tx.commands()[2],
            Command::TransferObjects {
                objects: vec![Argument::Result(1)],
                recipient: Argument::FeeObject,
            }
        );
    }

    #[tokio::test]
    async fn test_callback_error_fails_build() {
        let registry = IntentRegistry::new().with(
            "Notify",
            CallbackIntent::new(|_: &serde_json::Value| Err("refused".to_string())),
        );
        let err = IntentStage::new(registry)
            .resolve(&mut with_callback_intent(), &BuildOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Intent { reason, .. } if reason == "refused"));
    }

    #[tokio::test]
    async fn test_unregistered_intent() {
        let err = IntentStage::new(IntentRegistry::with_defaults())
            .resolve(&mut with_callback_intent(), &BuildOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::UnregisteredIntent(name) if name == "Notify"));
    }

    struct Lazy;

    #[async_trait]
    impl IntentHandler for Lazy {
        async fn resolve(
            &self,
            _builder: &mut TransactionBuilder,
            _index: usize,
            _intent: &IntentCommand,
            _options: &BuildOptions,
        ) -> Result<(), BuildError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_handler_must_consume_intent() {
        let registry = IntentRegistry::new().with("Notify", Lazy);
        let err = IntentStage::new(registry)
            .resolve(&mut with_callback_intent(), &BuildOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Intent { .. }));
    }
}
