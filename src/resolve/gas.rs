//! Gas completion
//!
//! Fills whatever gas data the transaction left unset: the owner defaults to
//! the sender, the price to the reference gas price, the budget to the
//! build's default, and the payment to the owner's native coins that the
//! transaction does not already use as inputs.

use super::{BuildOptions, Flow, ResolutionStage};
use crate::tx_builder::{BuildError, TransactionBuilder};
use crate::types::{Address, NATIVE_COIN_TYPE};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug)]
pub struct GasStage {
    max_gas_objects: usize,
}

impl GasStage {
    pub fn new(max_gas_objects: usize) -> Self {
        Self {
            max_gas_objects: max_gas_objects.max(1),
        }
    }
}

#[async_trait]
impl ResolutionStage for GasStage {
    fn name(&self) -> &'static str {
        "gas"
    }

    async fn resolve(
        &self,
        builder: &mut TransactionBuilder,
        options: &BuildOptions,
    ) -> Result<Flow, BuildError> {
        if options.only_transaction_kind {
            return Ok(Flow::Continue);
        }

        let sender = builder.data.sender.ok_or(BuildError::MissingSender)?;
        let owner = builder.data.gas.owner.unwrap_or(sender);
        builder.data.gas.owner = Some(owner);

        if builder.data.gas.budget.is_none() {
            let budget = options.default_budget.ok_or(BuildError::MissingGasBudget)?;
            builder.data.gas.budget = Some(budget);
        }

        if builder.data.gas.price.is_none() {
            let lookup = options.require_lookup("fetch the reference gas price")?;
            builder.data.gas.price = Some(lookup.reference_gas_price().await?);
        }

        if builder.data.gas.payment.is_none() {
            let lookup = options.require_lookup("select gas payment")?;
            let used: HashSet<Address> = builder
                .inputs()
                .iter()
                .filter_map(|input| input.object_id())
                .collect();
            let payment: Vec<_> = lookup
                .get_coins(owner, NATIVE_COIN_TYPE)
                .await?
                .into_iter()
                .map(|coin| coin.object_ref)
                .filter(|object_ref| !used.contains(&object_ref.object_id))
                .take(self.max_gas_objects)
                .collect();
            if payment.is_empty() {
                return Err(BuildError::NoGasCoins(owner));
            }
            debug!(owner = %owner, coins = payment.len(), "selected gas payment");
            builder.data.gas.payment = Some(payment);
        }

        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CoinInfo;
    use crate::test_utils::MockLookup;
    use crate::types::{Digest, ObjectRef};
    use std::sync::Arc;

    fn coin(n: u64) -> CoinInfo {
        CoinInfo {
            object_ref: ObjectRef::new(Address::from_u64(n), 1, Digest::new([n as u8; 32])),
            balance: 1_000,
        }
    }

    fn lookup(owner: Address) -> Arc<MockLookup> {
        let lookup = Arc::new(MockLookup::new());
        lookup.set_gas_price(750);
        lookup.add_coins(owner, NATIVE_COIN_TYPE, vec![coin(10), coin(11), coin(12)]);
        lookup
    }

    #[tokio::test]
    async fn test_fills_gas_from_lookup() {
        let me = Address::from_u64(1);
        let options = BuildOptions::new()
            .with_lookup(lookup(me))
            .with_default_budget(5_000);

        let mut tx = TransactionBuilder::new();
        tx.set_sender(me);
        // coin 11 is spent as a regular input
        tx.owned_object(coin(11).object_ref).unwrap();

        GasStage::new(256).resolve(&mut tx, &options).await.unwrap();
        let gas = &tx.data().gas;
        assert_eq!(gas.owner, Some(me));
        assert_eq!(gas.price, Some(750));
        assert_eq!(gas.budget, Some(5_000));
        assert_eq!(
            gas.payment,
            Some(vec![coin(10).object_ref, coin(12).object_ref])
        );
    }

    #[tokio::test]
    async fn test_respects_max_gas_objects() {
        let me = Address::from_u64(1);
        let options = BuildOptions::new()
            .with_lookup(lookup(me))
            .with_default_budget(5_000);
        let mut tx = TransactionBuilder::new();
        tx.set_sender(me);
        GasStage::new(1).resolve(&mut tx, &options).await.unwrap();
        assert_eq!(tx.data().gas.payment.as_ref().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_missing_budget_and_sender() {
        let me = Address::from_u64(1);
        let options = BuildOptions::new().with_lookup(lookup(me));

        let mut tx = TransactionBuilder::new();
        let err = GasStage::new(256).resolve(&mut tx, &options).await.unwrap_err();
        assert!(matches!(err, BuildError::MissingSender));

        tx.set_sender(me);
        let err = GasStage::new(256).resolve(&mut tx, &options).await.unwrap_err();
        assert!(matches!(err, BuildError::MissingGasBudget));
    }

    #[tokio::test]
    async fn test_no_coins() {
        let options = BuildOptions::new()
            .with_lookup(Arc::new(MockLookup::new()))
            .with_default_budget(5_000);
        let mut tx = TransactionBuilder::new();
        tx.set_sender(Address::from_u64(3));
        let err = GasStage::new(256).resolve(&mut tx, &options).await.unwrap_err();
        assert!(matches!(err, BuildError::NoGasCoins(owner) if owner == Address::from_u64(3)));
    }

    #[tokio::test]
    async fn test_kind_only_skips() {
        let mut tx = TransactionBuilder::new();
        GasStage::new(256)
            .resolve(&mut tx, &BuildOptions::new().kind_only())
            .await
            .unwrap();
        assert_eq!(tx.data().gas, Default::default());
    }
}
