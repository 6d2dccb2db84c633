//! ledger-tx - Programmable transaction client library
//!
//! Builds programmable transactions against an object-centric ledger,
//! resolves them through a pluggable pipeline, encodes them canonically and
//! executes them serially for one sender while tracking the fee object
//! across consecutive submissions.
//!
//! ## Modules
//!
//! - **tx_builder**: transaction IR, typed helpers, merge and validation
//! - **resolve**: async resolution pipeline (named packages, intents, objects, gas)
//! - **codec**: canonical wire codec for transactions and effects
//! - **cache**: object and fee-object cache
//! - **executor**: caching and serial executors, inclusion polling
//! - **client**: ledger, lookup and signer traits
//! - **wallet**: local Ed25519 signer
//! - **config / metrics / observability**: ambient configuration and telemetry

pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod executor;
pub mod metrics;
pub mod observability;
pub mod resolve;
pub mod test_utils;
pub mod tx_builder;
pub mod types;
pub mod wallet;

pub use cache::ObjectCache;
pub use client::{ClientError, LedgerClient, ObjectLookup, Signer};
pub use config::Config;
pub use executor::{CachingExecutor, ExecutionResult, ExecutorError, SerialExecutor};
pub use resolve::{BuildOptions, Pipeline};
pub use tx_builder::{Argument, BuildError, TransactionBuilder};
pub use types::{Address, Digest, ObjectId, ObjectRef};
