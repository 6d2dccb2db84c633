//! Transaction intermediate representation
//!
//! `TransactionData` is the mutable IR a [`TransactionBuilder`] edits and the
//! codec serializes. Commands reference inputs and earlier command results
//! through [`Argument`]s; the builder keeps the reference graph free of
//! forward references.
//!
//! [`TransactionBuilder`]: super::TransactionBuilder

use crate::types::{Address, Digest, ObjectId, ObjectRef, SequenceNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::iter;

/// Reference used by a command argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Argument {
    /// The coin paying for the transaction
    FeeObject,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

impl Argument {
    /// `Result(i)` becomes `NestedResult(i, j)`; other kinds have no nested form
    pub fn nested(self, index: u16) -> Option<Argument> {
        match self {
            Argument::Result(i) => Some(Argument::NestedResult(i, index)),
            _ => None,
        }
    }

    /// Index of the command this argument reads from, if any
    pub fn command_index(&self) -> Option<u16> {
        match self {
            Argument::Result(i) | Argument::NestedResult(i, _) => Some(*i),
            _ => None,
        }
    }
}

/// A fully resolved object input
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectArg {
    /// Owned or immutable object at an exact version
    Owned(ObjectRef),
    Shared {
        object_id: ObjectId,
        initial_shared_version: SequenceNumber,
        mutable: bool,
    },
    /// Object sent to another object, received by this transaction
    Receiving(ObjectRef),
}

impl ObjectArg {
    pub fn object_id(&self) -> ObjectId {
        match self {
            ObjectArg::Owned(object_ref) | ObjectArg::Receiving(object_ref) => {
                object_ref.object_id
            }
            ObjectArg::Shared { object_id, .. } => *object_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ObjectArg::Owned(_) => "owned",
            ObjectArg::Shared { .. } => "shared",
            ObjectArg::Receiving(_) => "receiving",
        }
    }
}

/// An object known only by id, completed by the object resolution stage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnresolvedObject {
    pub object_id: ObjectId,
    pub version: Option<SequenceNumber>,
    pub digest: Option<Digest>,
    pub initial_shared_version: Option<SequenceNumber>,
    pub mutable: Option<bool>,
    pub receiving: bool,
}

impl UnresolvedObject {
    pub fn new(object_id: ObjectId) -> Self {
        Self {
            object_id,
            version: None,
            digest: None,
            initial_shared_version: None,
            mutable: None,
            receiving: false,
        }
    }

    pub fn receiving(object_id: ObjectId) -> Self {
        Self {
            receiving: true,
            ..Self::new(object_id)
        }
    }

    /// Enough information to build the owned/receiving ref without a lookup
    pub fn owned_ref(&self) -> Option<ObjectRef> {
        match (self.version, self.digest) {
            (Some(version), Some(digest)) => Some(ObjectRef::new(self.object_id, version, digest)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Input {
    /// Canonically encoded value
    Pure(Vec<u8>),
    Object(ObjectArg),
    UnresolvedObject(UnresolvedObject),
}

impl Input {
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Input::Pure(_) => None,
            Input::Object(arg) => Some(arg.object_id()),
            Input::UnresolvedObject(unresolved) => Some(unresolved.object_id),
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Input::UnresolvedObject(_))
    }
}

/// Target package of a call: an address, or a name awaiting resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageRef {
    Address(Address),
    Named(String),
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageRef::Address(address) => write!(f, "{}", address),
            PackageRef::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCall {
    pub package: PackageRef,
    pub module: String,
    pub function: String,
    /// Canonical type strings; may embed named packages until resolved
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Argument>,
}

impl MoveCall {
    pub fn target(&self) -> String {
        format!("{}::{}::{}", self.package, self.module, self.function)
    }
}

/// Placeholder carrying out-of-band data for a resolution stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentCommand {
    pub name: String,
    /// Arguments the intent reads, kept remappable like any command argument
    pub inputs: BTreeMap<String, Vec<Argument>>,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    MoveCall(Box<MoveCall>),
    TransferObjects {
        objects: Vec<Argument>,
        recipient: Argument,
    },
    SplitCoins {
        coin: Argument,
        amounts: Vec<Argument>,
    },
    MergeCoins {
        destination: Argument,
        sources: Vec<Argument>,
    },
    Publish {
        modules: Vec<Vec<u8>>,
        dependencies: Vec<ObjectId>,
    },
    MakeMoveVec {
        element_type: Option<String>,
        elements: Vec<Argument>,
    },
    Upgrade {
        modules: Vec<Vec<u8>>,
        dependencies: Vec<ObjectId>,
        package: ObjectId,
        ticket: Argument,
    },
    Intent(IntentCommand),
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::MoveCall(_) => "MoveCall",
            Command::TransferObjects { .. } => "TransferObjects",
            Command::SplitCoins { .. } => "SplitCoins",
            Command::MergeCoins { .. } => "MergeCoins",
            Command::Publish { .. } => "Publish",
            Command::MakeMoveVec { .. } => "MakeMoveVec",
            Command::Upgrade { .. } => "Upgrade",
            Command::Intent(_) => "Intent",
        }
    }

    pub fn arguments(&self) -> Vec<&Argument> {
        match self {
            Command::MoveCall(call) => call.arguments.iter().collect(),
            Command::TransferObjects { objects, recipient } => {
                objects.iter().chain(iter::once(recipient)).collect()
            }
            Command::SplitCoins { coin, amounts } => {
                iter::once(coin).chain(amounts.iter()).collect()
            }
            Command::MergeCoins {
                destination,
                sources,
            } => iter::once(destination).chain(sources.iter()).collect(),
            Command::Publish { .. } => Vec::new(),
            Command::MakeMoveVec { elements, .. } => elements.iter().collect(),
            Command::Upgrade { ticket, .. } => vec![ticket],
            Command::Intent(intent) => intent.inputs.values().flatten().collect(),
        }
    }

    pub fn arguments_mut(&mut self) -> Vec<&mut Argument> {
        match self {
            Command::MoveCall(call) => call.arguments.iter_mut().collect(),
            Command::TransferObjects { objects, recipient } => {
                objects.iter_mut().chain(iter::once(recipient)).collect()
            }
            Command::SplitCoins { coin, amounts } => {
                iter::once(coin).chain(amounts.iter_mut()).collect()
            }
            Command::MergeCoins {
                destination,
                sources,
            } => iter::once(destination).chain(sources.iter_mut()).collect(),
            Command::Publish { .. } => Vec::new(),
            Command::MakeMoveVec { elements, .. } => elements.iter_mut().collect(),
            Command::Upgrade { ticket, .. } => vec![ticket],
            Command::Intent(intent) => intent.inputs.values_mut().flatten().collect(),
        }
    }

    /// Rewrite every argument in place, stopping at the first error
    pub fn try_map_arguments<E>(
        &mut self,
        mut f: impl FnMut(&mut Argument) -> Result<(), E>,
    ) -> Result<(), E> {
        for argument in self.arguments_mut() {
            f(argument)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expiration {
    #[default]
    None,
    Epoch(u64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasData {
    pub payment: Option<Vec<ObjectRef>>,
    pub owner: Option<Address>,
    pub price: Option<u64>,
    pub budget: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    pub sender: Option<Address>,
    #[serde(default)]
    pub expiration: Expiration,
    #[serde(default)]
    pub gas: GasData,
    pub inputs: Vec<Input>,
    pub commands: Vec<Command>,
}

impl TransactionData {
    /// Gas owner, falling back to the sender
    pub fn gas_owner(&self) -> Option<Address> {
        self.gas.owner.or(self.sender)
    }
}
