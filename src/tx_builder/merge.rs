//! Splicing one transaction's commands into another
//!
//! `merge(at, other)` inserts `other.commands` before host command `at`:
//!
//! - `other`'s inputs are added through the same dedup path as `add_input`,
//!   so one object id keeps one slot and shared mutability is OR-ed.
//! - `other`'s `Result(k)` becomes `Result(at + k)`; its `Input(j)` is
//!   remapped to the merged slot.
//! - Host references to commands `>= at` shift by `other.commands.len()`.

use super::builder::{insert_input, TransactionBuilder};
use super::data::{Argument, Input, ObjectArg, TransactionData, UnresolvedObject};
use super::errors::BuildError;
use tracing::debug;

impl TransactionBuilder {
    /// Splice `other`'s commands at `at_index`. On error the builder is unchanged.
    pub fn merge(&mut self, at_index: usize, other: TransactionData) -> Result<(), BuildError> {
        let len = self.data.commands.len();
        if at_index > len {
            return Err(BuildError::IndexOutOfRange {
                index: at_index,
                len,
            });
        }
        if other.commands.is_empty() {
            return Ok(());
        }

        let spliced = other.commands.len();
        if len + spliced > usize::from(u16::MAX) + 1 {
            return Err(BuildError::TooMany("commands"));
        }
        // both bounded by the check above
        let at = at_index as u16;
        let shift = spliced as u16;

        let mut data = self.data.clone();

        let mut input_map = Vec::with_capacity(other.inputs.len());
        for input in other.inputs {
            input_map.push(insert_input(&mut data.inputs, input)?);
        }

        let mut incoming = other.commands;
        for (position, command) in incoming.iter_mut().enumerate() {
            command.try_map_arguments(|argument| {
                *argument = match *argument {
                    Argument::FeeObject => Argument::FeeObject,
                    Argument::Input(j) => {
                        let mapped = input_map.get(usize::from(j)).ok_or_else(|| {
                            BuildError::invalid_reference(
                                position,
                                format!("Input({j}) out of bounds in merged transaction"),
                            )
                        })?;
                        Argument::Input(*mapped)
                    }
                    // out-of-range values are caught by validate below
                    Argument::Result(k) => Argument::Result(at.saturating_add(k)),
                    Argument::NestedResult(k, j) => Argument::NestedResult(at.saturating_add(k), j),
                };
                Ok::<_, BuildError>(())
            })?;
        }

        for command in data.commands.iter_mut().skip(at_index) {
            command.try_map_arguments(|argument| {
                *argument = match *argument {
                    Argument::Result(i) if i >= at => Argument::Result(i + shift),
                    Argument::NestedResult(i, j) if i >= at => Argument::NestedResult(i + shift, j),
                    other => other,
                };
                Ok::<_, BuildError>(())
            })?;
        }

        let tail = data.commands.split_off(at_index);
        data.commands.extend(incoming);
        data.commands.extend(tail);

        let candidate = TransactionBuilder { data };
        candidate.validate()?;
        debug!(at_index, spliced, inputs = candidate.data.inputs.len(), "merged transaction");
        *self = candidate;
        Ok(())
    }
}

/// Combine two inputs naming the same object
pub(crate) fn merge_inputs(existing: &Input, incoming: &Input) -> Result<Input, BuildError> {
    let conflict = |object_id, existing: &'static str, incoming: &'static str| {
        BuildError::ConflictingInput {
            object_id,
            existing,
            incoming,
        }
    };

    match (existing, incoming) {
        (Input::Object(a), Input::Object(b)) => match (a, b) {
            (
                ObjectArg::Shared {
                    object_id,
                    initial_shared_version,
                    mutable: m1,
                },
                ObjectArg::Shared { mutable: m2, .. },
            ) => Ok(Input::Object(ObjectArg::Shared {
                object_id: *object_id,
                initial_shared_version: *initial_shared_version,
                mutable: *m1 || *m2,
            })),
            (ObjectArg::Owned(r1), ObjectArg::Owned(r2))
            | (ObjectArg::Receiving(r1), ObjectArg::Receiving(r2)) => {
                if r1 == r2 {
                    Ok(existing.clone())
                } else {
                    Err(conflict(r1.object_id, "version", "different version"))
                }
            }
            _ => Err(conflict(a.object_id(), a.kind(), b.kind())),
        },
        (Input::UnresolvedObject(u), Input::Object(arg))
        | (Input::Object(arg), Input::UnresolvedObject(u)) => {
            merge_unresolved_into(arg, u).map(Input::Object)
        }
        (Input::UnresolvedObject(a), Input::UnresolvedObject(b)) => {
            if a.receiving != b.receiving {
                return Err(conflict(a.object_id, kind_of(a), kind_of(b)));
            }
            Ok(Input::UnresolvedObject(UnresolvedObject {
                object_id: a.object_id,
                version: a.version.or(b.version),
                digest: a.digest.or(b.digest),
                initial_shared_version: a.initial_shared_version.or(b.initial_shared_version),
                mutable: merge_mutability(a.mutable, b.mutable),
                receiving: a.receiving,
            }))
        }
        _ => Err(BuildError::internal("merge_inputs called on pure input")),
    }
}

fn kind_of(unresolved: &UnresolvedObject) -> &'static str {
    if unresolved.receiving {
        "receiving"
    } else {
        "object"
    }
}

/// `Some(true)` wins, then `Some(false)`, then unknown
fn merge_mutability(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), _) | (_, Some(false)) => Some(false),
        _ => None,
    }
}

fn merge_unresolved_into(arg: &ObjectArg, unresolved: &UnresolvedObject) -> Result<ObjectArg, BuildError> {
    let conflict = |incoming| BuildError::ConflictingInput {
        object_id: unresolved.object_id,
        existing: arg.kind(),
        incoming,
    };
    match arg {
        ObjectArg::Shared {
            object_id,
            initial_shared_version,
            mutable,
        } => {
            if unresolved.receiving {
                return Err(conflict("receiving"));
            }
            Ok(ObjectArg::Shared {
                object_id: *object_id,
                initial_shared_version: *initial_shared_version,
                mutable: *mutable || unresolved.mutable == Some(true),
            })
        }
        ObjectArg::Owned(_) if unresolved.receiving => Err(conflict("receiving")),
        ObjectArg::Receiving(_) if !unresolved.receiving => Err(conflict("object")),
        _ => Ok(arg.clone()),
    }
}
