//! Transaction builder
//!
//! Mutable intermediate representation of a programmable transaction and the
//! operations that edit it.
//!
//! ## Architecture
//!
//! - **data**: inputs, commands, arguments and gas data
//! - **builder**: `TransactionBuilder`, typed helpers and command splicing
//! - **merge**: splicing another transaction's commands with input dedup
//! - **validate**: DAG and completeness checks
//! - **pure**: canonical encoding of pure values
//! - **errors**: `BuildError`
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use ledger_tx::tx_builder::{Argument, BuildError, TransactionBuilder};
//! use ledger_tx::types::Address;
//!
//! # fn example() -> Result<(), BuildError> {
//! let mut tx = TransactionBuilder::new();
//! let amount = tx.pure(&1u64)?;
//! let coin = tx.split_coins(Argument::FeeObject, vec![amount])?;
//! let recipient = tx.pure(&Address::from_u64(0xB0B))?;
//! tx.transfer_objects(vec![coin], recipient)?;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub use errors::BuildError;

mod builder;
mod data;
mod merge;
mod pure;
mod validate;

pub use builder::{TransactionBuilder, COIN_WITH_BALANCE};
pub use data::{
    Argument, Command, Expiration, GasData, Input, IntentCommand, MoveCall, ObjectArg,
    PackageRef, TransactionData, UnresolvedObject,
};
pub use pure::ToPure;
