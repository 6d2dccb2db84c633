//! Structural validation of the transaction IR
//!
//! Two levels:
//! 1. `validate`: the reference graph is a DAG in command order and every
//!    input index exists. Holds after every builder mutation.
//! 2. `validate_resolved`: additionally nothing is left that the codec cannot
//!    encode (intents, unresolved objects, named packages).

use super::builder::TransactionBuilder;
use super::data::{Argument, Command, Input, PackageRef};
use super::errors::BuildError;

/// Argument indices are 16-bit
const MAX_ENTRIES: usize = u16::MAX as usize + 1;

/// Check one argument of command `command` against the current IR shape
pub(crate) fn check_argument(
    command: usize,
    argument: &Argument,
    input_count: usize,
) -> Result<(), BuildError> {
    match *argument {
        Argument::FeeObject => Ok(()),
        Argument::Input(i) if usize::from(i) < input_count => Ok(()),
        Argument::Input(i) => Err(BuildError::invalid_reference(
            command,
            format!("Input({i}) out of bounds for {input_count} inputs"),
        )),
        Argument::Result(i) | Argument::NestedResult(i, _) if usize::from(i) < command => Ok(()),
        other => Err(BuildError::invalid_reference(
            command,
            format!("{other:?} does not refer to a prior command"),
        )),
    }
}

impl TransactionBuilder {
    /// Check the forward-reference-free invariant and input bounds
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.data.inputs.len() > MAX_ENTRIES {
            return Err(BuildError::TooMany("inputs"));
        }
        if self.data.commands.len() > MAX_ENTRIES {
            return Err(BuildError::TooMany("commands"));
        }

        for (index, command) in self.data.commands.iter().enumerate() {
            for argument in command.arguments() {
                check_argument(index, argument, self.data.inputs.len())?;
            }
        }
        Ok(())
    }

    /// Everything `validate` checks, plus that the IR is ready for encoding
    pub fn validate_resolved(&self) -> Result<(), BuildError> {
        self.validate()?;

        for (index, input) in self.data.inputs.iter().enumerate() {
            if let Input::UnresolvedObject(unresolved) = input {
                return Err(BuildError::incomplete(format!(
                    "input {index} ({}) is unresolved",
                    unresolved.object_id
                )));
            }
        }

        for command in &self.data.commands {
            match command {
                Command::Intent(intent) => {
                    return Err(BuildError::incomplete(format!(
                        "intent '{}' was not resolved",
                        intent.name
                    )))
                }
                Command::MoveCall(call) => {
                    if let PackageRef::Named(name) = &call.package {
                        return Err(BuildError::UnresolvedName(name.clone()));
                    }
                    if let Some(t) = call.type_arguments.iter().find(|t| t.contains('@')) {
                        return Err(BuildError::UnresolvedName(t.clone()));
                    }
                }
                Command::MakeMoveVec {
                    element_type: Some(t),
                    ..
                } if t.contains('@') => return Err(BuildError::UnresolvedName(t.clone())),
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::TransactionData;
    use crate::types::Address;

    #[test]
    fn test_self_reference_rejected() {
        let data = TransactionData {
            commands: vec![Command::SplitCoins {
                coin: Argument::Result(0),
                amounts: vec![],
            }],
            ..Default::default()
        };
        assert!(matches!(
            TransactionBuilder::from_data(data),
            Err(BuildError::InvalidReference { command: 0, .. })
        ));
    }

    #[test]
    fn test_nested_result_of_prior_command_ok() {
        let data = TransactionData {
            commands: vec![
                Command::SplitCoins {
                    coin: Argument::FeeObject,
                    amounts: vec![],
                },
                Command::TransferObjects {
                    objects: vec![Argument::NestedResult(0, 1)],
                    recipient: Argument::FeeObject,
                },
            ],
            ..Default::default()
        };
        assert!(TransactionBuilder::from_data(data).is_ok());
    }

    #[test]
    fn test_validate_resolved_flags_leftovers() {
        let mut tx = TransactionBuilder::new();
        tx.object_id(Address::from_u64(4)).unwrap();
        assert!(tx.validate().is_ok());
        assert!(matches!(
            tx.validate_resolved(),
            Err(BuildError::Incomplete(_))
        ));

        let mut tx = TransactionBuilder::new();
        tx.move_call("@org/app::m::f", &[], vec![]).unwrap();
        assert!(matches!(
            tx.validate_resolved(),
            Err(BuildError::UnresolvedName(name)) if name == "@org/app"
        ));
    }
}
