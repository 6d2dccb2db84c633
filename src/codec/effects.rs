//! Transaction effects (V2 layout)
//!
//! Only the V2 layout is decoded in full. V1 effects are still readable by
//! [`status_of`](super::status_of), which stops after the status field.

use super::bcs::{BcsReader, BcsWriter};
use super::errors::{DecodeError, DecodeResult};
use super::status::{read_status, write_status, ExecutionStatus};
use crate::types::{Address, Digest, ObjectId, ObjectRef, Owner, SequenceNumber};
use serde::{Deserialize, Serialize};

pub(crate) const EFFECTS_V1_TAG: u32 = 0;
pub(crate) const EFFECTS_V2_TAG: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasCostSummary {
    pub computation_cost: u64,
    pub storage_cost: u64,
    pub storage_rebate: u64,
    pub non_refundable_storage_fee: u64,
}

impl GasCostSummary {
    /// Net charge; negative when the rebate exceeds the cost
    pub fn net_gas_usage(&self) -> i128 {
        i128::from(self.computation_cost) + i128::from(self.storage_cost)
            - i128::from(self.storage_rebate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectIn {
    NotExist,
    Exist {
        version: SequenceNumber,
        digest: Digest,
        owner: Owner,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectOut {
    NotExist,
    ObjectWrite { digest: Digest, owner: Owner },
    PackageWrite {
        version: SequenceNumber,
        digest: Digest,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdOperation {
    None,
    Created,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectsObjectChange {
    pub input_state: ObjectIn,
    pub output_state: ObjectOut,
    pub id_operation: IdOperation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnchangedSharedKind {
    ReadOnlyRoot {
        version: SequenceNumber,
        digest: Digest,
    },
    MutateDeleted(SequenceNumber),
    ReadDeleted(SequenceNumber),
    Cancelled(SequenceNumber),
    PerEpochConfig,
}

/// What happened to an object in a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectOperation {
    Created,
    Mutated,
    Unwrapped,
    Deleted,
    Wrapped,
    UnwrappedThenDeleted,
}

impl ObjectOperation {
    /// The object no longer exists at the top level after the transaction
    pub fn is_removal(&self) -> bool {
        matches!(
            self,
            ObjectOperation::Deleted
                | ObjectOperation::Wrapped
                | ObjectOperation::UnwrappedThenDeleted
        )
    }
}

/// Flattened view of one changed object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedObject {
    pub object_id: ObjectId,
    /// Lamport version for written objects, input version for removed ones
    pub version: SequenceNumber,
    pub digest: Option<Digest>,
    pub owner: Option<Owner>,
    pub operation: ObjectOperation,
}

impl ChangedObject {
    pub fn object_ref(&self) -> Option<ObjectRef> {
        self.digest
            .map(|digest| ObjectRef::new(self.object_id, self.version, digest))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEffects {
    pub status: ExecutionStatus,
    pub executed_epoch: u64,
    pub gas_used: GasCostSummary,
    pub transaction_digest: Digest,
    pub gas_object_index: Option<u32>,
    pub events_digest: Option<Digest>,
    pub dependencies: Vec<Digest>,
    pub lamport_version: SequenceNumber,
    pub changed_objects: Vec<(ObjectId, EffectsObjectChange)>,
    pub unchanged_shared_objects: Vec<(ObjectId, UnchangedSharedKind)>,
    pub aux_data_digest: Option<Digest>,
}

impl TransactionEffects {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn changed_objects(&self) -> Vec<ChangedObject> {
        self.changed_objects
            .iter()
            .map(|(object_id, change)| self.classify(*object_id, change))
            .collect()
    }

    /// New reference and owner of the object that paid for the transaction
    pub fn fee_object(&self) -> Option<(ObjectRef, Owner)> {
        let index = self.gas_object_index? as usize;
        let (object_id, change) = self.changed_objects.get(index)?;
        match change.output_state {
            ObjectOut::ObjectWrite { digest, owner } => Some((
                ObjectRef::new(*object_id, self.lamport_version, digest),
                owner,
            )),
            _ => None,
        }
    }

    fn classify(&self, object_id: ObjectId, change: &EffectsObjectChange) -> ChangedObject {
        let input_version = match change.input_state {
            ObjectIn::Exist { version, .. } => Some(version),
            ObjectIn::NotExist => None,
        };
        let existed = input_version.is_some();

        let (version, digest, owner) = match change.output_state {
            ObjectOut::ObjectWrite { digest, owner } => {
                (self.lamport_version, Some(digest), Some(owner))
            }
            ObjectOut::PackageWrite { version, digest } => {
                (version, Some(digest), Some(Owner::Immutable))
            }
            ObjectOut::NotExist => (input_version.unwrap_or(self.lamport_version), None, None),
        };

        let operation = match (existed, &change.output_state, change.id_operation) {
            (_, ObjectOut::NotExist, IdOperation::Deleted) if !existed => {
                ObjectOperation::UnwrappedThenDeleted
            }
            (true, ObjectOut::NotExist, IdOperation::Deleted) => ObjectOperation::Deleted,
            (_, ObjectOut::NotExist, _) => ObjectOperation::Wrapped,
            (false, _, IdOperation::Created) => ObjectOperation::Created,
            (false, _, _) => ObjectOperation::Unwrapped,
            (true, _, _) => ObjectOperation::Mutated,
        };

        ChangedObject {
            object_id,
            version,
            digest,
            owner,
            operation,
        }
    }
}

/// Encode as the V2 layout
pub fn encode_effects(effects: &TransactionEffects) -> Vec<u8> {
    let mut w = BcsWriter::with_capacity(256);
    w.write_variant(EFFECTS_V2_TAG);
    write_status(&mut w, &effects.status);
    w.write_u64(effects.executed_epoch);
    w.write_u64(effects.gas_used.computation_cost);
    w.write_u64(effects.gas_used.storage_cost);
    w.write_u64(effects.gas_used.storage_rebate);
    w.write_u64(effects.gas_used.non_refundable_storage_fee);
    w.write_digest(&effects.transaction_digest);
    w.write_option(effects.gas_object_index.as_ref(), |w, index| w.write_u32(*index));
    w.write_option(effects.events_digest.as_ref(), |w, d| w.write_digest(d));
    w.write_seq(&effects.dependencies, |w, d| w.write_digest(d));
    w.write_u64(effects.lamport_version);
    w.write_seq(&effects.changed_objects, |w, (id, change)| {
        w.write_address(id);
        write_change(w, change);
    });
    w.write_seq(&effects.unchanged_shared_objects, |w, (id, kind)| {
        w.write_address(id);
        write_unchanged(w, kind);
    });
    w.write_option(effects.aux_data_digest.as_ref(), |w, d| w.write_digest(d));
    w.finish()
}

pub fn decode_effects(bytes: &[u8]) -> DecodeResult<TransactionEffects> {
    let mut r = BcsReader::new(bytes);
    match r.read_variant()? {
        EFFECTS_V2_TAG => {}
        EFFECTS_V1_TAG => {
            return Err(DecodeError::UnsupportedVersion {
                kind: "TransactionEffects",
                version: 1,
            })
        }
        tag => {
            return Err(DecodeError::UnknownVariant {
                kind: "TransactionEffects",
                tag,
            })
        }
    }

    let status = read_status(&mut r)?;
    let executed_epoch = r.read_u64()?;
    let gas_used = GasCostSummary {
        computation_cost: r.read_u64()?,
        storage_cost: r.read_u64()?,
        storage_rebate: r.read_u64()?,
        non_refundable_storage_fee: r.read_u64()?,
    };
    let transaction_digest = r.read_digest()?;
    let gas_object_index = r.read_option(|r| r.read_u32())?;
    let events_digest = r.read_option(|r| r.read_digest())?;
    let dependencies = r.read_seq(|r| r.read_digest())?;
    let lamport_version = r.read_u64()?;
    let changed_objects = r.read_seq(|r| Ok((r.read_address()?, read_change(r)?)))?;
    let unchanged_shared_objects = r.read_seq(|r| Ok((r.read_address()?, read_unchanged(r)?)))?;
    let aux_data_digest = r.read_option(|r| r.read_digest())?;
    r.finish()?;

    Ok(TransactionEffects {
        status,
        executed_epoch,
        gas_used,
        transaction_digest,
        gas_object_index,
        events_digest,
        dependencies,
        lamport_version,
        changed_objects,
        unchanged_shared_objects,
        aux_data_digest,
    })
}

fn write_change(w: &mut BcsWriter, change: &EffectsObjectChange) {
    match &change.input_state {
        ObjectIn::NotExist => w.write_variant(0),
        ObjectIn::Exist {
            version,
            digest,
            owner,
        } => {
            w.write_variant(1);
            w.write_u64(*version);
            w.write_digest(digest);
            w.write_owner(owner);
        }
    }
    match &change.output_state {
        ObjectOut::NotExist => w.write_variant(0),
        ObjectOut::ObjectWrite { digest, owner } => {
            w.write_variant(1);
            w.write_digest(digest);
            w.write_owner(owner);
        }
        ObjectOut::PackageWrite { version, digest } => {
            w.write_variant(2);
            w.write_u64(*version);
            w.write_digest(digest);
        }
    }
    w.write_variant(match change.id_operation {
        IdOperation::None => 0,
        IdOperation::Created => 1,
        IdOperation::Deleted => 2,
    });
}

fn read_change(r: &mut BcsReader<'_>) -> DecodeResult<EffectsObjectChange> {
    let input_state = match r.read_variant()? {
        0 => ObjectIn::NotExist,
        1 => ObjectIn::Exist {
            version: r.read_u64()?,
            digest: r.read_digest()?,
            owner: r.read_owner()?,
        },
        tag => return Err(DecodeError::UnknownVariant { kind: "ObjectIn", tag }),
    };
    let output_state = match r.read_variant()? {
        0 => ObjectOut::NotExist,
        1 => ObjectOut::ObjectWrite {
            digest: r.read_digest()?,
            owner: r.read_owner()?,
        },
        2 => ObjectOut::PackageWrite {
            version: r.read_u64()?,
            digest: r.read_digest()?,
        },
        tag => return Err(DecodeError::UnknownVariant { kind: "ObjectOut", tag }),
    };
    let id_operation = match r.read_variant()? {
        0 => IdOperation::None,
        1 => IdOperation::Created,
        2 => IdOperation::Deleted,
        tag => return Err(DecodeError::UnknownVariant { kind: "IDOperation", tag }),
    };
    Ok(EffectsObjectChange {
        input_state,
        output_state,
        id_operation,
    })
}

fn write_unchanged(w: &mut BcsWriter, kind: &UnchangedSharedKind) {
    match kind {
        UnchangedSharedKind::ReadOnlyRoot { version, digest } => {
            w.write_variant(0);
            w.write_u64(*version);
            w.write_digest(digest);
        }
        UnchangedSharedKind::MutateDeleted(version) => {
            w.write_variant(1);
            w.write_u64(*version);
        }
        UnchangedSharedKind::ReadDeleted(version) => {
            w.write_variant(2);
            w.write_u64(*version);
        }
        UnchangedSharedKind::Cancelled(version) => {
            w.write_variant(3);
            w.write_u64(*version);
        }
        UnchangedSharedKind::PerEpochConfig => w.write_variant(4),
    }
}

fn read_unchanged(r: &mut BcsReader<'_>) -> DecodeResult<UnchangedSharedKind> {
    match r.read_variant()? {
        0 => Ok(UnchangedSharedKind::ReadOnlyRoot {
            version: r.read_u64()?,
            digest: r.read_digest()?,
        }),
        1 => Ok(UnchangedSharedKind::MutateDeleted(r.read_u64()?)),
        2 => Ok(UnchangedSharedKind::ReadDeleted(r.read_u64()?)),
        3 => Ok(UnchangedSharedKind::Cancelled(r.read_u64()?)),
        4 => Ok(UnchangedSharedKind::PerEpochConfig),
        tag => Err(DecodeError::UnknownVariant {
            kind: "UnchangedSharedKind",
            tag,
        }),
    }
}

/// Effects for a transaction that spent only its fee object
///
/// Handy for mocks: the fee object moves to `lamport_version` and stays with
/// `owner`.
pub fn simple_effects(
    transaction_digest: Digest,
    fee_object: ObjectRef,
    new_digest: Digest,
    owner: Address,
    lamport_version: SequenceNumber,
) -> TransactionEffects {
    TransactionEffects {
        status: ExecutionStatus::Success,
        executed_epoch: 0,
        gas_used: GasCostSummary::default(),
        transaction_digest,
        gas_object_index: Some(0),
        events_digest: None,
        dependencies: Vec::new(),
        lamport_version,
        changed_objects: vec![(
            fee_object.object_id,
            EffectsObjectChange {
                input_state: ObjectIn::Exist {
                    version: fee_object.version,
                    digest: fee_object.digest,
                    owner: Owner::AddressOwner(owner),
                },
                output_state: ObjectOut::ObjectWrite {
                    digest: new_digest,
                    owner: Owner::AddressOwner(owner),
                },
                id_operation: IdOperation::None,
            },
        )],
        unchanged_shared_objects: Vec::new(),
        aux_data_digest: None,
    }
}
