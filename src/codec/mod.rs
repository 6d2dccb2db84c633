//! Canonical binary wire codec
//!
//! Encodes transactions and decodes transactions and effects in the ledger's
//! canonical layout, and extracts execution status from effects without a
//! full decode.

mod bcs;
mod effects;
pub mod errors;
mod status;
mod transaction;

pub use bcs::{BcsReader, BcsWriter};
pub use effects::{
    decode_effects, encode_effects, simple_effects, ChangedObject, EffectsObjectChange,
    GasCostSummary, IdOperation, ObjectIn, ObjectOperation, ObjectOut, TransactionEffects,
    UnchangedSharedKind,
};
pub use errors::{DecodeError, DecodeResult, EncodeError};
pub use status::{
    status_of, CommandArgumentErrorKind, ExecutionFailure, ExecutionStatus, ModuleId,
    MoveLocation, PackageUpgradeErrorKind, StatusSummary, TypeArgumentErrorKind,
};
pub use transaction::{
    decode_transaction, decode_transaction_kind, encode_transaction, encode_transaction_kind,
    transaction_digest, ProgrammableKind,
};
