//! Execution status schema and fast-path status extraction
//!
//! The failure enum grows with every protocol upgrade. [`status_of`] reads
//! the effects prefix with the full schema and, when that fails on a variant
//! this build does not know, re-reads it treating every failure as opaque.
//!
//! Payload field names serialize in camelCase, matching the ledger's JSON
//! clients, so rendered errors read the same on both sides.

use super::bcs::{BcsReader, BcsWriter};
use super::effects::{EFFECTS_V1_TAG, EFFECTS_V2_TAG};
use super::errors::{DecodeError, DecodeResult};
use crate::types::{Address, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    Failure {
        error: ExecutionFailure,
        /// Index of the command that failed, when known
        command: Option<u64>,
    },
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }

    pub fn summary(&self) -> StatusSummary {
        match self {
            ExecutionStatus::Success => StatusSummary::success(),
            ExecutionStatus::Failure { error, .. } => StatusSummary {
                success: false,
                error: Some(error.render()),
            },
        }
    }
}

/// Result of [`status_of`]. `error` is absent for successes and for failures
/// whose payload this build cannot interpret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub success: bool,
    pub error: Option<String>,
}

impl StatusSummary {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn opaque_failure() -> Self {
        Self {
            success: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleId {
    pub address: Address,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveLocation {
    pub module: ModuleId,
    pub function: u16,
    pub instruction: u16,
    pub function_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all_fields = "camelCase")]
pub enum CommandArgumentErrorKind {
    TypeMismatch,
    InvalidBCSBytes,
    InvalidUsageOfPureArg,
    InvalidArgumentToPrivateEntryFunction,
    IndexOutOfBounds { idx: u16 },
    SecondaryIndexOutOfBounds { result_idx: u16, secondary_idx: u16 },
    InvalidResultArity { result_idx: u16 },
    InvalidGasCoinUsage,
    InvalidValueUsage,
    InvalidObjectByValue,
    InvalidObjectByMutRef,
    SharedObjectOperationNotAllowed,
    InvalidArgumentArity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeArgumentErrorKind {
    TypeNotFound,
    ConstraintNotSatisfied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all_fields = "camelCase")]
pub enum PackageUpgradeErrorKind {
    UnableToFetchPackage { package_id: ObjectId },
    NotAPackage { object_id: ObjectId },
    IncompatibleUpgrade,
    DigestDoesNotMatch { digest: Vec<u8> },
    UnknownUpgradePolicy { policy: u8 },
    PackageIDDoesNotMatch { package_id: ObjectId, ticket_id: ObjectId },
}

/// Reason a transaction failed during execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all_fields = "camelCase")]
pub enum ExecutionFailure {
    InsufficientGas,
    InvalidGasObject,
    InvariantViolation,
    FeatureNotYetSupported,
    MoveObjectTooBig { object_size: u64, max_object_size: u64 },
    MovePackageTooBig { object_size: u64, max_object_size: u64 },
    CircularObjectOwnership { object: ObjectId },
    InsufficientCoinBalance,
    CoinBalanceOverflow,
    PublishErrorNonZeroAddress,
    SuiMoveVerificationError,
    MovePrimitiveRuntimeError(Option<MoveLocation>),
    MoveAbort(MoveLocation, u64),
    VMVerificationOrDeserializationError,
    VMInvariantViolation,
    FunctionNotFound,
    ArityMismatch,
    TypeArityMismatch,
    NonEntryFunctionInvoked,
    CommandArgumentError { arg_idx: u16, kind: CommandArgumentErrorKind },
    TypeArgumentError { argument_idx: u16, kind: TypeArgumentErrorKind },
    UnusedValueWithoutDrop { result_idx: u16, secondary_idx: u16 },
    InvalidPublicFunctionReturnType { idx: u16 },
    InvalidTransferObject,
    EffectsTooLarge { current_size: u64, max_size: u64 },
    PublishUpgradeMissingDependency,
    PublishUpgradeDependencyDowngrade,
    PackageUpgradeError { upgrade_error: PackageUpgradeErrorKind },
    WrittenObjectsTooLarge { current_size: u64, max_size: u64 },
    CertificateDenied,
    SuiMoveVerificationTimedout,
    SharedObjectOperationNotAllowed,
    InputObjectDeleted,
    ExecutionCancelledDueToSharedObjectCongestion { congested_objects: Vec<ObjectId> },
    AddressDeniedForCoin { address: Address, coin_type: String },
    CoinTypeGlobalPause { coin_type: String },
    ExecutionCancelledDueToRandomnessUnavailable,
    MoveVectorElemTooBig { value_size: u64, max_scaled_size: u64 },
    MoveRawValueTooBig { value_size: u64, max_scaled_size: u64 },
    InvalidLinkage,
}

impl ExecutionFailure {
    /// `Kind` for payload-free errors, `Kind(<payload as JSON>)` otherwise.
    /// An absent optional payload counts as payload-free.
    pub fn render(&self) -> String {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(kind)) => kind,
            Ok(serde_json::Value::Object(map)) if map.len() == 1 => {
                let (kind, payload) = map.into_iter().next().unwrap_or_default();
                if payload.is_null() {
                    kind
                } else {
                    format!("{kind}({payload})")
                }
            }
            _ => format!("{self:?}"),
        }
    }
}

pub(crate) fn write_status(w: &mut BcsWriter, status: &ExecutionStatus) {
    match status {
        ExecutionStatus::Success => w.write_variant(0),
        ExecutionStatus::Failure { error, command } => {
            w.write_variant(1);
            write_failure(w, error);
            w.write_option(command.as_ref(), |w, index| w.write_u64(*index));
        }
    }
}

pub(crate) fn read_status(r: &mut BcsReader<'_>) -> DecodeResult<ExecutionStatus> {
    match r.read_variant()? {
        0 => Ok(ExecutionStatus::Success),
        1 => Ok(ExecutionStatus::Failure {
            error: read_failure(r)?,
            command: r.read_option(|r| r.read_u64())?,
        }),
        tag => Err(DecodeError::UnknownVariant {
            kind: "ExecutionStatus",
            tag,
        }),
    }
}

/// Extract success or failure from effects bytes without decoding the rest
pub fn status_of(effects: &[u8]) -> DecodeResult<StatusSummary> {
    let mut r = BcsReader::new(effects);
    read_effects_version(&mut r)?;

    match read_status(&mut r) {
        Ok(status) => Ok(status.summary()),
        Err(err) => {
            debug!(error = %err, "full status schema rejected effects, retrying as opaque");
            let mut r = BcsReader::new(effects);
            read_effects_version(&mut r)?;
            match r.read_variant()? {
                0 => Ok(StatusSummary::success()),
                1 => Ok(StatusSummary::opaque_failure()),
                tag => Err(DecodeError::UnknownVariant {
                    kind: "ExecutionStatus",
                    tag,
                }),
            }
        }
    }
}

fn read_effects_version(r: &mut BcsReader<'_>) -> DecodeResult<u32> {
    match r.read_variant()? {
        tag @ (EFFECTS_V1_TAG | EFFECTS_V2_TAG) => Ok(tag),
        tag => Err(DecodeError::UnknownVariant {
            kind: "TransactionEffects",
            tag,
        }),
    }
}

fn write_module_id(w: &mut BcsWriter, module: &ModuleId) {
    w.write_address(&module.address);
    w.write_str(&module.name);
}

fn read_module_id(r: &mut BcsReader<'_>) -> DecodeResult<ModuleId> {
    Ok(ModuleId {
        address: r.read_address()?,
        name: r.read_string()?,
    })
}

fn write_location(w: &mut BcsWriter, location: &MoveLocation) {
    write_module_id(w, &location.module);
    w.write_u16(location.function);
    w.write_u16(location.instruction);
    w.write_option(location.function_name.as_ref(), |w, name| w.write_str(name));
}

fn read_location(r: &mut BcsReader<'_>) -> DecodeResult<MoveLocation> {
    Ok(MoveLocation {
        module: read_module_id(r)?,
        function: r.read_u16()?,
        instruction: r.read_u16()?,
        function_name: r.read_option(|r| r.read_string())?,
    })
}

fn write_sizes(w: &mut BcsWriter, tag: u32, a: u64, b: u64) {
    w.write_variant(tag);
    w.write_u64(a);
    w.write_u64(b);
}

fn write_failure(w: &mut BcsWriter, failure: &ExecutionFailure) {
    use ExecutionFailure::*;
    match failure {
        InsufficientGas => w.write_variant(0),
        InvalidGasObject => w.write_variant(1),
        InvariantViolation => w.write_variant(2),
        FeatureNotYetSupported => w.write_variant(3),
        MoveObjectTooBig {
            object_size,
            max_object_size,
        } => write_sizes(w, 4, *object_size, *max_object_size),
        MovePackageTooBig {
            object_size,
            max_object_size,
        } => write_sizes(w, 5, *object_size, *max_object_size),
        CircularObjectOwnership { object } => {
            w.write_variant(6);
            w.write_address(object);
        }
        InsufficientCoinBalance => w.write_variant(7),
        CoinBalanceOverflow => w.write_variant(8),
        PublishErrorNonZeroAddress => w.write_variant(9),
        SuiMoveVerificationError => w.write_variant(10),
        MovePrimitiveRuntimeError(location) => {
            w.write_variant(11);
            w.write_option(location.as_ref(), write_location);
        }
        MoveAbort(location, code) => {
            w.write_variant(12);
            write_location(w, location);
            w.write_u64(*code);
        }
        VMVerificationOrDeserializationError => w.write_variant(13),
        VMInvariantViolation => w.write_variant(14),
        FunctionNotFound => w.write_variant(15),
        ArityMismatch => w.write_variant(16),
        TypeArityMismatch => w.write_variant(17),
        NonEntryFunctionInvoked => w.write_variant(18),
        CommandArgumentError { arg_idx, kind } => {
            w.write_variant(19);
            w.write_u16(*arg_idx);
            write_command_argument_error(w, kind);
        }
        TypeArgumentError { argument_idx, kind } => {
            w.write_variant(20);
            w.write_u16(*argument_idx);
            w.write_variant(match kind {
                TypeArgumentErrorKind::TypeNotFound => 0,
                TypeArgumentErrorKind::ConstraintNotSatisfied => 1,
            });
        }
        UnusedValueWithoutDrop {
            result_idx,
            secondary_idx,
        } => {
            w.write_variant(21);
            w.write_u16(*result_idx);
            w.write_u16(*secondary_idx);
        }
        InvalidPublicFunctionReturnType { idx } => {
            w.write_variant(22);
            w.write_u16(*idx);
        }
        InvalidTransferObject => w.write_variant(23),
        EffectsTooLarge {
            current_size,
            max_size,
        } => write_sizes(w, 24, *current_size, *max_size),
        PublishUpgradeMissingDependency => w.write_variant(25),
        PublishUpgradeDependencyDowngrade => w.write_variant(26),
        PackageUpgradeError { upgrade_error } => {
            w.write_variant(27);
            write_upgrade_error(w, upgrade_error);
        }
        WrittenObjectsTooLarge {
            current_size,
            max_size,
        } => write_sizes(w, 28, *current_size, *max_size),
        CertificateDenied => w.write_variant(29),
        SuiMoveVerificationTimedout => w.write_variant(30),
        SharedObjectOperationNotAllowed => w.write_variant(31),
        InputObjectDeleted => w.write_variant(32),
        ExecutionCancelledDueToSharedObjectCongestion { congested_objects } => {
            w.write_variant(33);
            w.write_seq(congested_objects, |w, id| w.write_address(id));
        }
        AddressDeniedForCoin { address, coin_type } => {
            w.write_variant(34);
            w.write_address(address);
            w.write_str(coin_type);
        }
        CoinTypeGlobalPause { coin_type } => {
            w.write_variant(35);
            w.write_str(coin_type);
        }
        ExecutionCancelledDueToRandomnessUnavailable => w.write_variant(36),
        MoveVectorElemTooBig {
            value_size,
            max_scaled_size,
        } => write_sizes(w, 37, *value_size, *max_scaled_size),
        MoveRawValueTooBig {
            value_size,
            max_scaled_size,
        } => write_sizes(w, 38, *value_size, *max_scaled_size),
        InvalidLinkage => w.write_variant(39),
    }
}

fn read_failure(r: &mut BcsReader<'_>) -> DecodeResult<ExecutionFailure> {
    use ExecutionFailure::*;
    let failure = match r.read_variant()? {
        0 => InsufficientGas,
        1 => InvalidGasObject,
        2 => InvariantViolation,
        3 => FeatureNotYetSupported,
        4 => MoveObjectTooBig {
            object_size: r.read_u64()?,
            max_object_size: r.read_u64()?,
        },
        5 => MovePackageTooBig {
            object_size: r.read_u64()?,
            max_object_size: r.read_u64()?,
        },
        6 => CircularObjectOwnership {
            object: r.read_address()?,
        },
        7 => InsufficientCoinBalance,
        8 => CoinBalanceOverflow,
        9 => PublishErrorNonZeroAddress,
        10 => SuiMoveVerificationError,
        11 => MovePrimitiveRuntimeError(r.read_option(read_location)?),
        12 => MoveAbort(read_location(r)?, r.read_u64()?),
        13 => VMVerificationOrDeserializationError,
        14 => VMInvariantViolation,
        15 => FunctionNotFound,
        16 => ArityMismatch,
        17 => TypeArityMismatch,
        18 => NonEntryFunctionInvoked,
        19 => CommandArgumentError {
            arg_idx: r.read_u16()?,
            kind: read_command_argument_error(r)?,
        },
        20 => TypeArgumentError {
            argument_idx: r.read_u16()?,
            kind: match r.read_variant()? {
                0 => TypeArgumentErrorKind::TypeNotFound,
                1 => TypeArgumentErrorKind::ConstraintNotSatisfied,
                tag => {
                    return Err(DecodeError::UnknownVariant {
                        kind: "TypeArgumentError",
                        tag,
                    })
                }
            },
        },
        21 => UnusedValueWithoutDrop {
            result_idx: r.read_u16()?,
            secondary_idx: r.read_u16()?,
        },
        22 => InvalidPublicFunctionReturnType { idx: r.read_u16()? },
        23 => InvalidTransferObject,
        24 => EffectsTooLarge {
            current_size: r.read_u64()?,
            max_size: r.read_u64()?,
        },
        25 => PublishUpgradeMissingDependency,
        26 => PublishUpgradeDependencyDowngrade,
        27 => PackageUpgradeError {
            upgrade_error: read_upgrade_error(r)?,
        },
        28 => WrittenObjectsTooLarge {
            current_size: r.read_u64()?,
            max_size: r.read_u64()?,
        },
        29 => CertificateDenied,
        30 => SuiMoveVerificationTimedout,
        31 => SharedObjectOperationNotAllowed,
        32 => InputObjectDeleted,
        33 => ExecutionCancelledDueToSharedObjectCongestion {
            congested_objects: r.read_seq(|r| r.read_address())?,
        },
        34 => AddressDeniedForCoin {
            address: r.read_address()?,
            coin_type: r.read_string()?,
        },
        35 => CoinTypeGlobalPause {
            coin_type: r.read_string()?,
        },
        36 => ExecutionCancelledDueToRandomnessUnavailable,
        37 => MoveVectorElemTooBig {
            value_size: r.read_u64()?,
            max_scaled_size: r.read_u64()?,
        },
        38 => MoveRawValueTooBig {
            value_size: r.read_u64()?,
            max_scaled_size: r.read_u64()?,
        },
        39 => InvalidLinkage,
        tag => {
            return Err(DecodeError::UnknownVariant {
                kind: "ExecutionFailureStatus",
                tag,
            })
        }
    };
    Ok(failure)
}

fn write_command_argument_error(w: &mut BcsWriter, kind: &CommandArgumentErrorKind) {
    use CommandArgumentErrorKind::*;
    match kind {
        TypeMismatch => w.write_variant(0),
        InvalidBCSBytes => w.write_variant(1),
        InvalidUsageOfPureArg => w.write_variant(2),
        InvalidArgumentToPrivateEntryFunction => w.write_variant(3),
        IndexOutOfBounds { idx } => {
            w.write_variant(4);
            w.write_u16(*idx);
        }
        SecondaryIndexOutOfBounds {
            result_idx,
            secondary_idx,
        } => {
            w.write_variant(5);
            w.write_u16(*result_idx);
            w.write_u16(*secondary_idx);
        }
        InvalidResultArity { result_idx } => {
            w.write_variant(6);
            w.write_u16(*result_idx);
        }
        InvalidGasCoinUsage => w.write_variant(7),
        InvalidValueUsage => w.write_variant(8),
        InvalidObjectByValue => w.write_variant(9),
        InvalidObjectByMutRef => w.write_variant(10),
        SharedObjectOperationNotAllowed => w.write_variant(11),
        InvalidArgumentArity => w.write_variant(12),
    }
}

fn read_command_argument_error(r: &mut BcsReader<'_>) -> DecodeResult<CommandArgumentErrorKind> {
    use CommandArgumentErrorKind::*;
    let kind = match r.read_variant()? {
        0 => TypeMismatch,
        1 => InvalidBCSBytes,
        2 => InvalidUsageOfPureArg,
        3 => InvalidArgumentToPrivateEntryFunction,
        4 => IndexOutOfBounds { idx: r.read_u16()? },
        5 => SecondaryIndexOutOfBounds {
            result_idx: r.read_u16()?,
            secondary_idx: r.read_u16()?,
        },
        6 => InvalidResultArity {
            result_idx: r.read_u16()?,
        },
        7 => InvalidGasCoinUsage,
        8 => InvalidValueUsage,
        9 => InvalidObjectByValue,
        10 => InvalidObjectByMutRef,
        11 => SharedObjectOperationNotAllowed,
        12 => InvalidArgumentArity,
        tag => {
            return Err(DecodeError::UnknownVariant {
                kind: "CommandArgumentError",
                tag,
            })
        }
    };
    Ok(kind)
}

fn write_upgrade_error(w: &mut BcsWriter, error: &PackageUpgradeErrorKind) {
    use PackageUpgradeErrorKind::*;
    match error {
        UnableToFetchPackage { package_id } => {
            w.write_variant(0);
            w.write_address(package_id);
        }
        NotAPackage { object_id } => {
            w.write_variant(1);
            w.write_address(object_id);
        }
        IncompatibleUpgrade => w.write_variant(2),
        DigestDoesNotMatch { digest } => {
            w.write_variant(3);
            w.write_bytes(digest);
        }
        UnknownUpgradePolicy { policy } => {
            w.write_variant(4);
            w.write_u8(*policy);
        }
        PackageIDDoesNotMatch {
            package_id,
            ticket_id,
        } => {
            w.write_variant(5);
            w.write_address(package_id);
            w.write_address(ticket_id);
        }
    }
}

fn read_upgrade_error(r: &mut BcsReader<'_>) -> DecodeResult<PackageUpgradeErrorKind> {
    use PackageUpgradeErrorKind::*;
    let error = match r.read_variant()? {
        0 => UnableToFetchPackage {
            package_id: r.read_address()?,
        },
        1 => NotAPackage {
            object_id: r.read_address()?,
        },
        2 => IncompatibleUpgrade,
        3 => DigestDoesNotMatch {
            digest: r.read_bytes()?,
        },
        4 => UnknownUpgradePolicy {
            policy: r.read_u8()?,
        },
        5 => PackageIDDoesNotMatch {
            package_id: r.read_address()?,
            ticket_id: r.read_address()?,
        },
        tag => {
            return Err(DecodeError::UnknownVariant {
                kind: "PackageUpgradeError",
                tag,
            })
        }
    };
    Ok(error)
}
