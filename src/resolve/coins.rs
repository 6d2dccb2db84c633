//! `CoinWithBalance` intent handler
//!
//! Native coin balances are split from the fee object. Other coin types (and
//! native coins when only the transaction kind is built, since the fee
//! object then belongs to a sponsor) are taken from the sender's coins of
//! that type: merged into the first coin when several are needed, then
//! split. A zero balance becomes `coin::zero<T>()`.

use super::intents::IntentHandler;
use super::BuildOptions;
use crate::tx_builder::{
    Argument, BuildError, Command, IntentCommand, MoveCall, PackageRef, TransactionBuilder,
};
use crate::types::{normalize_type, Address, NATIVE_COIN_TYPE};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CoinWithBalanceData {
    #[serde(rename = "type")]
    coin_type: String,
    balance: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CoinWithBalanceIntent;

fn to_u16(index: usize) -> Result<u16, BuildError> {
    u16::try_from(index).map_err(|_| BuildError::TooMany("commands"))
}

impl CoinWithBalanceIntent {
    /// Pick the sender's coins of `coin_type` covering `balance`, skipping
    /// coins the transaction already uses
    async fn select_coins(
        builder: &mut TransactionBuilder,
        intent: &IntentCommand,
        data: &CoinWithBalanceData,
        options: &BuildOptions,
    ) -> Result<Vec<Argument>, BuildError> {
        let owner = builder.data.sender.ok_or(BuildError::MissingSender)?;
        let lookup = options.require_lookup("select coins")?;

        let used: HashSet<Address> = builder.inputs().iter().filter_map(|i| i.object_id()).collect();
        let coins = lookup.get_coins(owner, &data.coin_type).await?;

        let mut selected = Vec::new();
        let mut total: u128 = 0;
        for coin in coins.iter().filter(|c| !used.contains(&c.object_ref.object_id)) {
            if total >= u128::from(data.balance) {
                break;
            }
            total += u128::from(coin.balance);
            selected.push(coin.object_ref);
        }
        if total < u128::from(data.balance) {
            return Err(BuildError::intent_failed(
                &intent.name,
                format!(
                    "{} holds {} of {}, needs {}",
                    owner, total, data.coin_type, data.balance
                ),
            ));
        }

        selected
            .into_iter()
            .map(|object_ref| builder.owned_object(object_ref))
            .collect()
    }
}

#[async_trait]
impl IntentHandler for CoinWithBalanceIntent {
    async fn resolve(
        &self,
        builder: &mut TransactionBuilder,
        index: usize,
        intent: &IntentCommand,
        options: &BuildOptions,
    ) -> Result<(), BuildError> {
        let data: CoinWithBalanceData = serde_json::from_value(intent.data.clone())
            .map_err(|e| BuildError::intent_failed(&intent.name, e.to_string()))?;
        let native = normalize_type(NATIVE_COIN_TYPE)
            .map_err(|e| BuildError::internal(e.to_string()))?;
        let at = to_u16(index)?;

        if data.balance == 0 {
            let zero = Command::MoveCall(Box::new(MoveCall {
                package: PackageRef::Address(Address::from_u64(2)),
                module: "coin".to_string(),
                function: "zero".to_string(),
                type_arguments: vec![data.coin_type.clone()],
                arguments: Vec::new(),
            }));
            return builder.replace_command(index, vec![zero], Some(Argument::Result(at)));
        }

        let source = if data.coin_type == native && !options.only_transaction_kind {
            Argument::FeeObject
        } else {
            let coins = Self::select_coins(builder, intent, &data, options).await?;
            let (first, rest) = coins
                .split_first()
                .ok_or_else(|| BuildError::internal("coin selection returned no coins"))?;
            if rest.is_empty() {
                *first
            } else {
                let amount = builder.pure(&data.balance)?;
                let merge = Command::MergeCoins {
                    destination: *first,
                    sources: rest.to_vec(),
                };
                let split = Command::SplitCoins {
                    coin: *first,
                    amounts: vec![amount],
                };
                let split_at = to_u16(index + 1)?;
                debug!(coin_type = %data.coin_type, coins = coins.len(), "merging coins for balance");
                return builder.replace_command(
                    index,
                    vec![merge, split],
                    Some(Argument::NestedResult(split_at, 0)),
                );
            }
        };

        let amount = builder.pure(&data.balance)?;
        let split = Command::SplitCoins {
            coin: source,
            amounts: vec![amount],
        };
        builder.replace_command(index, vec![split], Some(Argument::NestedResult(at, 0)))
    }
}
