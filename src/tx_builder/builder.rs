//! Core TransactionBuilder implementation
//!
//! The builder owns a [`TransactionData`] and keeps it structurally valid
//! after every call: inputs are deduplicated, and commands may only reference
//! inputs that exist and commands that precede them.

use super::data::{
    Argument, Command, Expiration, Input, IntentCommand, MoveCall, ObjectArg, PackageRef,
    TransactionData, UnresolvedObject,
};
use super::errors::BuildError;
use super::merge::merge_inputs;
use super::pure::ToPure;
use crate::codec;
use crate::resolve::{BuildOptions, Pipeline};
use crate::types::{normalize_type, Address, ObjectId, ObjectRef, NATIVE_COIN_TYPE};
use bytes::Bytes;
use std::collections::BTreeMap;
use tracing::debug;

/// Name of the balance reservation intent
pub const COIN_WITH_BALANCE: &str = "CoinWithBalance";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionBuilder {
    pub(crate) data: TransactionData,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing data, rejecting it if the reference graph is malformed
    pub fn from_data(data: TransactionData) -> Result<Self, BuildError> {
        let builder = Self { data };
        builder.validate()?;
        Ok(builder)
    }

    pub fn data(&self) -> &TransactionData {
        &self.data
    }

    pub fn into_data(self) -> TransactionData {
        self.data
    }

    pub fn inputs(&self) -> &[Input] {
        &self.data.inputs
    }

    pub fn commands(&self) -> &[Command] {
        &self.data.commands
    }

    /// Add an input, reusing the slot of an equal pure value or of the same object
    pub fn add_input(&mut self, input: Input) -> Result<Argument, BuildError> {
        let index = insert_input(&mut self.data.inputs, input)?;
        Ok(Argument::Input(index))
    }

    /// Append a command and return the argument naming its result
    pub fn add_command(&mut self, command: Command) -> Result<Argument, BuildError> {
        let index = self.data.commands.len();
        let index_u16 = u16::try_from(index).map_err(|_| BuildError::TooMany("commands"))?;
        self.check_arguments(index, &command)?;
        self.data.commands.push(command);
        Ok(Argument::Result(index_u16))
    }

    fn check_arguments(&self, index: usize, command: &Command) -> Result<(), BuildError> {
        for argument in command.arguments() {
            super::validate::check_argument(index, argument, self.data.inputs.len())?;
        }
        Ok(())
    }

    pub fn pure<T: ToPure + ?Sized>(&mut self, value: &T) -> Result<Argument, BuildError> {
        self.add_input(Input::Pure(value.to_pure()))
    }

    pub fn pure_bytes(&mut self, bytes: Vec<u8>) -> Result<Argument, BuildError> {
        self.add_input(Input::Pure(bytes))
    }

    pub fn object(&mut self, arg: ObjectArg) -> Result<Argument, BuildError> {
        self.add_input(Input::Object(arg))
    }

    pub fn owned_object(&mut self, object_ref: ObjectRef) -> Result<Argument, BuildError> {
        self.object(ObjectArg::Owned(object_ref))
    }

    pub fn shared_object(
        &mut self,
        object_id: ObjectId,
        initial_shared_version: u64,
        mutable: bool,
    ) -> Result<Argument, BuildError> {
        self.object(ObjectArg::Shared {
            object_id,
            initial_shared_version,
            mutable,
        })
    }

    /// Object known only by id; completed during resolution
    pub fn object_id(&mut self, object_id: ObjectId) -> Result<Argument, BuildError> {
        self.add_input(Input::UnresolvedObject(UnresolvedObject::new(object_id)))
    }

    pub fn unresolved_object(&mut self, object: UnresolvedObject) -> Result<Argument, BuildError> {
        self.add_input(Input::UnresolvedObject(object))
    }

    /// Object to be received by this transaction, completed during resolution
    pub fn receiving_object(&mut self, object_id: ObjectId) -> Result<Argument, BuildError> {
        self.add_input(Input::UnresolvedObject(UnresolvedObject::receiving(object_id)))
    }

    pub fn fee_object(&self) -> Argument {
        Argument::FeeObject
    }

    /// `target` is `package::module::function`; the package may be an
    /// address or a named package such as `@org/app`
    pub fn move_call(
        &mut self,
        target: &str,
        type_arguments: &[&str],
        arguments: Vec<Argument>,
    ) -> Result<Argument, BuildError> {
        let (package, module, function) = parse_target(target)?;
        let type_arguments = type_arguments
            .iter()
            .map(|t| normalize_type_argument(t))
            .collect::<Result<Vec<_>, _>>()?;
        self.add_command(Command::MoveCall(Box::new(MoveCall {
            package,
            module,
            function,
            type_arguments,
            arguments,
        })))
    }

    pub fn split_coins(
        &mut self,
        coin: Argument,
        amounts: Vec<Argument>,
    ) -> Result<Argument, BuildError> {
        self.add_command(Command::SplitCoins { coin, amounts })
    }

    pub fn merge_coins(
        &mut self,
        destination: Argument,
        sources: Vec<Argument>,
    ) -> Result<Argument, BuildError> {
        self.add_command(Command::MergeCoins {
            destination,
            sources,
        })
    }

    pub fn transfer_objects(
        &mut self,
        objects: Vec<Argument>,
        recipient: Argument,
    ) -> Result<Argument, BuildError> {
        self.add_command(Command::TransferObjects { objects, recipient })
    }

    pub fn make_move_vec(
        &mut self,
        element_type: Option<&str>,
        elements: Vec<Argument>,
    ) -> Result<Argument, BuildError> {
        let element_type = element_type.map(normalize_type_argument).transpose()?;
        self.add_command(Command::MakeMoveVec {
            element_type,
            elements,
        })
    }

    pub fn publish(
        &mut self,
        modules: Vec<Vec<u8>>,
        dependencies: Vec<ObjectId>,
    ) -> Result<Argument, BuildError> {
        self.add_command(Command::Publish {
            modules,
            dependencies,
        })
    }

    pub fn upgrade(
        &mut self,
        modules: Vec<Vec<u8>>,
        dependencies: Vec<ObjectId>,
        package: ObjectId,
        ticket: Argument,
    ) -> Result<Argument, BuildError> {
        self.add_command(Command::Upgrade {
            modules,
            dependencies,
            package,
            ticket,
        })
    }

    /// Placeholder command resolved by the handler registered under `name`
    pub fn add_intent(
        &mut self,
        name: impl Into<String>,
        inputs: BTreeMap<String, Vec<Argument>>,
        data: serde_json::Value,
    ) -> Result<Argument, BuildError> {
        self.add_command(Command::Intent(IntentCommand {
            name: name.into(),
            inputs,
            data,
        }))
    }

    /// A coin of `coin_type` holding exactly `balance`, split from the
    /// sender's coins during resolution
    pub fn coin_with_balance(&mut self, coin_type: &str, balance: u64) -> Result<Argument, BuildError> {
        let coin_type = normalize_type_argument(coin_type)?;
        self.add_intent(
            COIN_WITH_BALANCE,
            BTreeMap::new(),
            serde_json::json!({ "type": coin_type, "balance": balance }),
        )
    }

    /// Native coin variant of [`coin_with_balance`](Self::coin_with_balance)
    pub fn native_coin_with_balance(&mut self, balance: u64) -> Result<Argument, BuildError> {
        self.coin_with_balance(NATIVE_COIN_TYPE, balance)
    }

    pub fn set_sender(&mut self, sender: Address) -> &mut Self {
        self.data.sender = Some(sender);
        self
    }

    pub fn set_sender_if_unset(&mut self, sender: Address) -> &mut Self {
        self.data.sender.get_or_insert(sender);
        self
    }

    pub fn set_gas_budget(&mut self, budget: u64) -> &mut Self {
        self.data.gas.budget = Some(budget);
        self
    }

    pub fn set_gas_budget_if_unset(&mut self, budget: u64) -> &mut Self {
        self.data.gas.budget.get_or_insert(budget);
        self
    }

    pub fn set_gas_price(&mut self, price: u64) -> &mut Self {
        self.data.gas.price = Some(price);
        self
    }

    pub fn set_gas_owner(&mut self, owner: Address) -> &mut Self {
        self.data.gas.owner = Some(owner);
        self
    }

    pub fn set_gas_payment(&mut self, payment: Vec<ObjectRef>) -> &mut Self {
        self.data.gas.payment = Some(payment);
        self
    }

    pub fn set_expiration(&mut self, expiration: Expiration) -> &mut Self {
        self.data.expiration = expiration;
        self
    }

    /// Replace command `index` with `replacement` (possibly empty)
    ///
    /// Replacement commands are written with their final indices, starting at
    /// `index`. References to the replaced command are redirected to
    /// `result`: `Result(index)` becomes `result`, and `NestedResult(index, j)`
    /// becomes `NestedResult(r, j)` when `result` is `Result(r)`. References
    /// to later commands shift by `replacement.len() - 1`. Nothing is changed
    /// on error.
    pub fn replace_command(
        &mut self,
        index: usize,
        replacement: Vec<Command>,
        result: Option<Argument>,
    ) -> Result<(), BuildError> {
        let len = self.data.commands.len();
        if index >= len {
            return Err(BuildError::IndexOutOfRange { index, len });
        }

        let inserted = replacement.len();
        let new_len = len - 1 + inserted;
        if new_len > usize::from(u16::MAX) + 1 {
            return Err(BuildError::TooMany("commands"));
        }

        let remap = |argument: &mut Argument| -> Result<(), BuildError> {
            let Some(command) = argument.command_index().map(usize::from) else {
                return Ok(());
            };
            if command < index {
                return Ok(());
            }
            if command > index {
                let shifted = (command + inserted - 1) as u16;
                *argument = match *argument {
                    Argument::NestedResult(_, j) => Argument::NestedResult(shifted, j),
                    _ => Argument::Result(shifted),
                };
                return Ok(());
            }
            *argument = match (*argument, result) {
                (Argument::Result(_), Some(target)) => target,
                (Argument::NestedResult(_, j), Some(Argument::Result(r))) => {
                    Argument::NestedResult(r, j)
                }
                (Argument::NestedResult(..), Some(target)) => {
                    return Err(BuildError::internal(format!(
                        "cannot take a nested result of {target:?}"
                    )))
                }
                _ => return Err(BuildError::DanglingReference(index)),
            };
            Ok(())
        };

        let mut data = self.data.clone();
        let tail = data.commands.split_off(index + 1);
        data.commands.pop();
        data.commands.extend(replacement);
        for mut command in tail {
            command.try_map_arguments(&remap)?;
            data.commands.push(command);
        }

        let candidate = Self { data };
        candidate.validate()?;
        debug!(index, inserted, "replaced command");
        *self = candidate;
        Ok(())
    }

    /// Run the pipeline on this builder and encode the result
    ///
    /// With `options.only_transaction_kind` the gas stage is skipped and only
    /// the transaction kind is encoded.
    pub async fn build(
        &mut self,
        pipeline: &Pipeline,
        options: &BuildOptions,
    ) -> Result<Bytes, BuildError> {
        pipeline.run(self, options).await?;
        let bytes = if options.only_transaction_kind {
            codec::encode_transaction_kind(&self.data)?
        } else {
            codec::encode_transaction(&self.data)?
        };
        Ok(Bytes::from(bytes))
    }
}

/// Insert `input` into `inputs`, merging with an existing slot for the same
/// value or object. Returns the slot index.
pub(crate) fn insert_input(inputs: &mut Vec<Input>, input: Input) -> Result<u16, BuildError> {
    let existing = match &input {
        Input::Pure(bytes) => inputs
            .iter()
            .position(|i| matches!(i, Input::Pure(b) if b == bytes)),
        _ => {
            let id = input.object_id();
            inputs.iter().position(|i| i.object_id().is_some() && i.object_id() == id)
        }
    };

    match existing {
        Some(index) => {
            if !matches!(input, Input::Pure(_)) {
                inputs[index] = merge_inputs(&inputs[index], &input)?;
            }
            Ok(index as u16)
        }
        None => {
            let index = u16::try_from(inputs.len()).map_err(|_| BuildError::TooMany("inputs"))?;
            inputs.push(input);
            Ok(index)
        }
    }
}

fn parse_target(target: &str) -> Result<(PackageRef, String, String), BuildError> {
    let invalid = || BuildError::InvalidTarget(target.to_string());
    let mut parts = target.split("::");
    let (Some(package), Some(module), Some(function), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    if module.is_empty() || function.is_empty() {
        return Err(invalid());
    }

    let package = if package.starts_with('@') {
        PackageRef::Named(package.to_string())
    } else {
        PackageRef::Address(Address::from_hex(package).map_err(|_| invalid())?)
    };
    Ok((package, module.to_string(), function.to_string()))
}

/// Canonical form for concrete types; named packages are left for resolution
fn normalize_type_argument(input: &str) -> Result<String, BuildError> {
    if input.contains('@') {
        return Ok(input.trim().to_string());
    }
    normalize_type(input).map_err(|e| BuildError::InvalidType(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Digest;

    fn obj(n: u64) -> ObjectRef {
        ObjectRef::new(Address::from_u64(n), 1, Digest::new([n as u8; 32]))
    }

    #[test]
    fn test_pure_inputs_dedup_by_bytes() {
        let mut tx = TransactionBuilder::new();
        let a = tx.pure(&5u64).unwrap();
        let b = tx.pure(&5u64).unwrap();
        let c = tx.pure(&6u64).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(tx.inputs().len(), 2);
    }

    #[test]
    fn test_shared_object_dedup_upgrades_mutability() {
        let mut tx = TransactionBuilder::new();
        let id = Address::from_u64(6);
        let a = tx.shared_object(id, 1, false).unwrap();
        let b = tx.shared_object(id, 1, true).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            tx.inputs(),
            &[Input::Object(ObjectArg::Shared {
                object_id: id,
                initial_shared_version: 1,
                mutable: true,
            })]
        );
    }

    #[test]
    fn test_conflicting_object_kinds_rejected() {
        let mut tx = TransactionBuilder::new();
        tx.owned_object(obj(3)).unwrap();
        let err = tx.object(ObjectArg::Receiving(obj(3))).unwrap_err();
        assert!(matches!(err, BuildError::ConflictingInput { .. }));
    }

    #[test]
    fn test_add_command_rejects_forward_reference() {
        let mut tx = TransactionBuilder::new();
        let err = tx
            .transfer_objects(vec![Argument::Result(0)], Argument::FeeObject)
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidReference { command: 0, .. }));
        assert!(tx.commands().is_empty());

        let err = tx
            .split_coins(Argument::FeeObject, vec![Argument::Input(0)])
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidReference { .. }));
    }

    #[test]
    fn test_move_call_target_and_types() {
        let mut tx = TransactionBuilder::new();
        tx.move_call("0x2::coin::zero", &["0x2::sui::SUI"], vec![])
            .unwrap();
        tx.move_call("@org/app::pool::swap", &["@org/app::token::T"], vec![])
            .unwrap();

        let Command::MoveCall(call) = &tx.commands()[0] else {
            panic!("expected move call");
        };
        assert_eq!(call.package, PackageRef::Address(Address::from_u64(2)));
        assert_eq!(call.type_arguments[0], normalize_type("0x2::sui::SUI").unwrap());

        let Command::MoveCall(call) = &tx.commands()[1] else {
            panic!("expected move call");
        };
        assert_eq!(call.package, PackageRef::Named("@org/app".to_string()));
        assert_eq!(call.type_arguments[0], "@org/app::token::T");

        assert!(matches!(
            tx.move_call("0x2::coin", &[], vec![]),
            Err(BuildError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_replace_command_redirects_and_shifts() {
        let mut tx = TransactionBuilder::new();
        let coin = tx.native_coin_with_balance(10).unwrap();
        let other = tx.split_coins(Argument::FeeObject, vec![]).unwrap();
        let recipient = tx.pure(&Address::from_u64(9)).unwrap();
        tx.transfer_objects(vec![coin, other], recipient).unwrap();

        let amount = tx.pure(&10u64).unwrap();
        let replacement = vec![
            Command::SplitCoins {
                coin: Argument::FeeObject,
                amounts: vec![amount],
            },
            Command::MergeCoins {
                destination: Argument::FeeObject,
                sources: vec![],
            },
        ];
        tx.replace_command(0, replacement, Some(Argument::NestedResult(0, 0)))
            .unwrap();

        assert_eq!(tx.commands().len(), 4);
        assert_eq!(
            tx.commands()[3],
            Command::TransferObjects {
                objects: vec![Argument::NestedResult(0, 0), Argument::Result(2)],
                recipient,
            }
        );
    }

    #[test]
    fn test_replace_command_dangling_reference() {
        let mut tx = TransactionBuilder::new();
        let first = tx.split_coins(Argument::FeeObject, vec![]).unwrap();
        tx.transfer_objects(vec![first], Argument::FeeObject).unwrap();
        let before = tx.clone();

        let err = tx.replace_command(0, vec![], None).unwrap_err();
        assert!(matches!(err, BuildError::DanglingReference(0)));
        assert_eq!(tx, before);
    }

    #[test]
    fn test_replace_command_delete_unreferenced() {
        let mut tx = TransactionBuilder::new();
        tx.add_intent("Noop", BTreeMap::new(), serde_json::Value::Null)
            .unwrap();
        let second = tx.split_coins(Argument::FeeObject, vec![]).unwrap();
        tx.transfer_objects(vec![second], Argument::FeeObject).unwrap();

        tx.replace_command(0, vec![], None).unwrap();
        assert_eq!(tx.commands().len(), 2);
        assert_eq!(
            tx.commands()[1],
            Command::TransferObjects {
                objects: vec![Argument::Result(0)],
                recipient: Argument::FeeObject,
            }
        );
    }

    #[test]
    fn test_setters_if_unset() {
        let mut tx = TransactionBuilder::new();
        tx.set_sender(Address::from_u64(1))
            .set_sender_if_unset(Address::from_u64(2))
            .set_gas_budget_if_unset(100);
        assert_eq!(tx.data().sender, Some(Address::from_u64(1)));
        assert_eq!(tx.data().gas.budget, Some(100));
    }

    #[test]
    fn test_coin_with_balance_named_type() {
        let mut tx = TransactionBuilder::new();
        tx.coin_with_balance("@org/app::token::T", 5).unwrap();
        let Command::Intent(intent) = &tx.commands()[0] else {
            panic!("expected intent");
        };
        assert_eq!(intent.data["type"], "@org/app::token::T");

        assert!(matches!(
            tx.coin_with_balance("not a type", 5),
            Err(BuildError::InvalidType(_))
        ));
    }
}
