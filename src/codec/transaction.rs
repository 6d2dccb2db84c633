//! Transaction data layout
//!
//! ```text
//! TransactionData::V1 {
//!     kind: TransactionKind::ProgrammableTransaction { inputs, commands },
//!     sender, gas_data { payment, owner, price, budget }, expiration,
//! }
//! ```

use super::bcs::{BcsReader, BcsWriter};
use super::errors::{DecodeError, DecodeResult, EncodeError};
use crate::tx_builder::{
    Argument, Command, Expiration, GasData, Input, MoveCall, ObjectArg, PackageRef,
    TransactionData,
};
use crate::types::{Blake2b256, Digest, StructTag, TypeTag};
use blake2::Digest as _;

/// Domain separator hashed in front of the bytes to form the transaction digest
const TRANSACTION_DIGEST_SALT: &[u8] = b"TransactionData::";

/// Nesting bound for decoded type tags
const MAX_TYPE_DEPTH: usize = 64;

/// Programmable inputs and commands, without sender or gas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgrammableKind {
    pub inputs: Vec<Input>,
    pub commands: Vec<Command>,
}

/// Encode a fully resolved transaction. The gas owner must be explicit, so
/// that decoding the bytes yields the same `TransactionData`.
pub fn encode_transaction(tx: &TransactionData) -> Result<Vec<u8>, EncodeError> {
    let sender = tx.sender.ok_or(EncodeError::MissingField("sender"))?;
    let owner = tx.gas.owner.ok_or(EncodeError::MissingField("gas owner"))?;
    let payment = tx
        .gas
        .payment
        .as_ref()
        .ok_or(EncodeError::MissingField("gas payment"))?;
    let price = tx.gas.price.ok_or(EncodeError::MissingField("gas price"))?;
    let budget = tx.gas.budget.ok_or(EncodeError::MissingField("gas budget"))?;

    let mut w = BcsWriter::with_capacity(256);
    w.write_variant(0);
    write_kind(&mut w, &tx.inputs, &tx.commands)?;
    w.write_address(&sender);
    w.write_seq(payment, |w, object_ref| w.write_object_ref(object_ref));
    w.write_address(&owner);
    w.write_u64(price);
    w.write_u64(budget);
    match tx.expiration {
        Expiration::None => w.write_variant(0),
        Expiration::Epoch(epoch) => {
            w.write_variant(1);
            w.write_u64(epoch);
        }
    }
    Ok(w.finish())
}

/// Encode only the transaction kind; used when a sponsor supplies gas
pub fn encode_transaction_kind(tx: &TransactionData) -> Result<Vec<u8>, EncodeError> {
    let mut w = BcsWriter::with_capacity(128);
    write_kind(&mut w, &tx.inputs, &tx.commands)?;
    Ok(w.finish())
}

pub fn decode_transaction(bytes: &[u8]) -> DecodeResult<TransactionData> {
    let mut r = BcsReader::new(bytes);
    match r.read_variant()? {
        0 => {}
        tag => {
            return Err(DecodeError::UnsupportedVersion {
                kind: "TransactionData",
                version: tag + 1,
            })
        }
    }

    let kind = read_kind(&mut r)?;
    let sender = r.read_address()?;
    let payment = r.read_seq(|r| r.read_object_ref())?;
    let owner = r.read_address()?;
    let price = r.read_u64()?;
    let budget = r.read_u64()?;
    let expiration = match r.read_variant()? {
        0 => Expiration::None,
        1 => Expiration::Epoch(r.read_u64()?),
        tag => {
            return Err(DecodeError::UnknownVariant {
                kind: "TransactionExpiration",
                tag,
            })
        }
    };
    r.finish()?;

    Ok(TransactionData {
        sender: Some(sender),
        expiration,
        gas: GasData {
            payment: Some(payment),
            owner: Some(owner),
            price: Some(price),
            budget: Some(budget),
        },
        inputs: kind.inputs,
        commands: kind.commands,
    })
}

pub fn decode_transaction_kind(bytes: &[u8]) -> DecodeResult<ProgrammableKind> {
    let mut r = BcsReader::new(bytes);
    let kind = read_kind(&mut r)?;
    r.finish()?;
    Ok(kind)
}

/// Digest identifying a transaction on the ledger: Blake2b-256 over the salt
/// and the encoded bytes
pub fn transaction_digest(bytes: &[u8]) -> Digest {
    let mut hasher = Blake2b256::new();
    hasher.update(TRANSACTION_DIGEST_SALT);
    hasher.update(bytes);
    Digest::new(hasher.finalize().into())
}

fn write_kind(w: &mut BcsWriter, inputs: &[Input], commands: &[Command]) -> Result<(), EncodeError> {
    // ProgrammableTransaction
    w.write_variant(0);
    w.write_len(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        write_input(w, index, input)?;
    }
    w.try_write_seq(commands, write_command)
}

fn read_kind(r: &mut BcsReader<'_>) -> DecodeResult<ProgrammableKind> {
    match r.read_variant()? {
        0 => Ok(ProgrammableKind {
            inputs: r.read_seq(read_input)?,
            commands: r.read_seq(read_command)?,
        }),
        tag => Err(DecodeError::Invalid(format!(
            "transaction kind {tag} is not programmable"
        ))),
    }
}

fn write_input(w: &mut BcsWriter, index: usize, input: &Input) -> Result<(), EncodeError> {
    match input {
        Input::Pure(bytes) => {
            w.write_variant(0);
            w.write_bytes(bytes);
        }
        Input::Object(arg) => {
            w.write_variant(1);
            match arg {
                ObjectArg::Owned(object_ref) => {
                    w.write_variant(0);
                    w.write_object_ref(object_ref);
                }
                ObjectArg::Shared {
                    object_id,
                    initial_shared_version,
                    mutable,
                } => {
                    w.write_variant(1);
                    w.write_address(object_id);
                    w.write_u64(*initial_shared_version);
                    w.write_bool(*mutable);
                }
                ObjectArg::Receiving(object_ref) => {
                    w.write_variant(2);
                    w.write_object_ref(object_ref);
                }
            }
        }
        Input::UnresolvedObject(unresolved) => {
            return Err(EncodeError::UnresolvedInput {
                index,
                object_id: unresolved.object_id.to_string(),
            })
        }
    }
    Ok(())
}

fn read_input(r: &mut BcsReader<'_>) -> DecodeResult<Input> {
    match r.read_variant()? {
        0 => Ok(Input::Pure(r.read_bytes()?)),
        1 => {
            let arg = match r.read_variant()? {
                0 => ObjectArg::Owned(r.read_object_ref()?),
                1 => ObjectArg::Shared {
                    object_id: r.read_address()?,
                    initial_shared_version: r.read_u64()?,
                    mutable: r.read_bool()?,
                },
                2 => ObjectArg::Receiving(r.read_object_ref()?),
                tag => return Err(DecodeError::UnknownVariant { kind: "ObjectArg", tag }),
            };
            Ok(Input::Object(arg))
        }
        tag => Err(DecodeError::UnknownVariant { kind: "CallArg", tag }),
    }
}

fn write_argument(w: &mut BcsWriter, argument: &Argument) {
    match argument {
        Argument::FeeObject => w.write_variant(0),
        Argument::Input(i) => {
            w.write_variant(1);
            w.write_u16(*i);
        }
        Argument::Result(i) => {
            w.write_variant(2);
            w.write_u16(*i);
        }
        Argument::NestedResult(i, j) => {
            w.write_variant(3);
            w.write_u16(*i);
            w.write_u16(*j);
        }
    }
}

fn read_argument(r: &mut BcsReader<'_>) -> DecodeResult<Argument> {
    match r.read_variant()? {
        0 => Ok(Argument::FeeObject),
        1 => Ok(Argument::Input(r.read_u16()?)),
        2 => Ok(Argument::Result(r.read_u16()?)),
        3 => Ok(Argument::NestedResult(r.read_u16()?, r.read_u16()?)),
        tag => Err(DecodeError::UnknownVariant { kind: "Argument", tag }),
    }
}

fn write_arguments(w: &mut BcsWriter, arguments: &[Argument]) {
    w.write_seq(arguments, write_argument);
}

fn write_modules(w: &mut BcsWriter, modules: &[Vec<u8>]) {
    w.write_seq(modules, |w, module| w.write_bytes(module));
}

fn parse_type(input: &str) -> Result<TypeTag, EncodeError> {
    if input.contains('@') {
        return Err(EncodeError::UnresolvedPackage(input.to_string()));
    }
    input
        .parse::<TypeTag>()
        .map_err(|e| EncodeError::InvalidType(e.to_string()))
}

fn write_command(w: &mut BcsWriter, command: &Command) -> Result<(), EncodeError> {
    match command {
        Command::MoveCall(call) => {
            let package = match &call.package {
                PackageRef::Address(address) => address,
                PackageRef::Named(name) => return Err(EncodeError::UnresolvedPackage(name.clone())),
            };
            let type_arguments = call
                .type_arguments
                .iter()
                .map(|t| parse_type(t))
                .collect::<Result<Vec<_>, _>>()?;

            w.write_variant(0);
            w.write_address(package);
            w.write_str(&call.module);
            w.write_str(&call.function);
            w.write_seq(&type_arguments, write_type_tag);
            write_arguments(w, &call.arguments);
        }
        Command::TransferObjects { objects, recipient } => {
            w.write_variant(1);
            write_arguments(w, objects);
            write_argument(w, recipient);
        }
        Command::SplitCoins { coin, amounts } => {
            w.write_variant(2);
            write_argument(w, coin);
            write_arguments(w, amounts);
        }
        Command::MergeCoins {
            destination,
            sources,
        } => {
            w.write_variant(3);
            write_argument(w, destination);
            write_arguments(w, sources);
        }
        Command::Publish {
            modules,
            dependencies,
        } => {
            w.write_variant(4);
            write_modules(w, modules);
            w.write_seq(dependencies, |w, id| w.write_address(id));
        }
        Command::MakeMoveVec {
            element_type,
            elements,
        } => {
            let element_type = element_type.as_deref().map(parse_type).transpose()?;
            w.write_variant(5);
            w.write_option(element_type.as_ref(), write_type_tag);
            write_arguments(w, elements);
        }
        Command::Upgrade {
            modules,
            dependencies,
            package,
            ticket,
        } => {
            w.write_variant(6);
            write_modules(w, modules);
            w.write_seq(dependencies, |w, id| w.write_address(id));
            w.write_address(package);
            write_argument(w, ticket);
        }
        Command::Intent(intent) => return Err(EncodeError::UnconsumedIntent(intent.name.clone())),
    }
    Ok(())
}

fn read_command(r: &mut BcsReader<'_>) -> DecodeResult<Command> {
    let command = match r.read_variant()? {
        0 => {
            let package = r.read_address()?;
            let module = r.read_string()?;
            let function = r.read_string()?;
            let type_arguments = r
                .read_seq(|r| read_type_tag(r, 0))?
                .iter()
                .map(TypeTag::to_string)
                .collect();
            let arguments = r.read_seq(read_argument)?;
            Command::MoveCall(Box::new(MoveCall {
                package: PackageRef::Address(package),
                module,
                function,
                type_arguments,
                arguments,
            }))
        }
        1 => Command::TransferObjects {
            objects: r.read_seq(read_argument)?,
            recipient: read_argument(r)?,
        },
        2 => Command::SplitCoins {
            coin: read_argument(r)?,
            amounts: r.read_seq(read_argument)?,
        },
        3 => Command::MergeCoins {
            destination: read_argument(r)?,
            sources: r.read_seq(read_argument)?,
        },
        4 => Command::Publish {
            modules: r.read_seq(|r| r.read_bytes())?,
            dependencies: r.read_seq(|r| r.read_address())?,
        },
        5 => Command::MakeMoveVec {
            element_type: r
                .read_option(|r| read_type_tag(r, 0))?
                .map(|tag| tag.to_string()),
            elements: r.read_seq(read_argument)?,
        },
        6 => Command::Upgrade {
            modules: r.read_seq(|r| r.read_bytes())?,
            dependencies: r.read_seq(|r| r.read_address())?,
            package: r.read_address()?,
            ticket: read_argument(r)?,
        },
        tag => return Err(DecodeError::UnknownVariant { kind: "Command", tag }),
    };
    Ok(command)
}

pub(crate) fn write_type_tag(w: &mut BcsWriter, tag: &TypeTag) {
    match tag {
        TypeTag::Bool => w.write_variant(0),
        TypeTag::U8 => w.write_variant(1),
        TypeTag::U64 => w.write_variant(2),
        TypeTag::U128 => w.write_variant(3),
        TypeTag::Address => w.write_variant(4),
        TypeTag::Signer => w.write_variant(5),
        TypeTag::Vector(inner) => {
            w.write_variant(6);
            write_type_tag(w, inner);
        }
        TypeTag::Struct(tag) => {
            w.write_variant(7);
            w.write_address(&tag.address);
            w.write_str(&tag.module);
            w.write_str(&tag.name);
            w.write_seq(&tag.type_params, write_type_tag);
        }
        TypeTag::U16 => w.write_variant(8),
        TypeTag::U32 => w.write_variant(9),
        TypeTag::U256 => w.write_variant(10),
    }
}

fn read_type_tag(r: &mut BcsReader<'_>, depth: usize) -> DecodeResult<TypeTag> {
    if depth > MAX_TYPE_DEPTH {
        return Err(DecodeError::Invalid("type tag nesting too deep".to_string()));
    }
    let tag = match r.read_variant()? {
        0 => TypeTag::Bool,
        1 => TypeTag::U8,
        2 => TypeTag::U64,
        3 => TypeTag::U128,
        4 => TypeTag::Address,
        5 => TypeTag::Signer,
        6 => TypeTag::Vector(Box::new(read_type_tag(r, depth + 1)?)),
        7 => TypeTag::Struct(Box::new(StructTag {
            address: r.read_address()?,
            module: r.read_string()?,
            name: r.read_string()?,
            type_params: r.read_seq(|r| read_type_tag(r, depth + 1))?,
        })),
        8 => TypeTag::U16,
        9 => TypeTag::U32,
        10 => TypeTag::U256,
        tag => return Err(DecodeError::UnknownVariant { kind: "TypeTag", tag }),
    };
    Ok(tag)
}
