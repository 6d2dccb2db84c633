//! Object input resolution
//!
//! Completes `UnresolvedObject` inputs. Inputs that already carry enough
//! information (version and digest, or an initial shared version) are
//! converted directly. The rest are looked up, first in the object cache and
//! then through the lookup client in batches.

use super::{BuildOptions, Flow, ResolutionStage};
use crate::client::ObjectInfo;
use crate::metrics::metrics;
use crate::tx_builder::{BuildError, Input, ObjectArg, TransactionBuilder, UnresolvedObject};
use crate::types::{ObjectId, Owner};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug)]
pub struct ObjectStage {
    max_batch_size: usize,
}

impl ObjectStage {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
        }
    }
}

/// Conversion that needs no lookup
fn from_declared(unresolved: &UnresolvedObject) -> Option<ObjectArg> {
    if let Some(initial_shared_version) = unresolved.initial_shared_version {
        if !unresolved.receiving {
            return Some(ObjectArg::Shared {
                object_id: unresolved.object_id,
                initial_shared_version,
                mutable: unresolved.mutable.unwrap_or(true),
            });
        }
    }
    let object_ref = unresolved.owned_ref()?;
    Some(if unresolved.receiving {
        ObjectArg::Receiving(object_ref)
    } else {
        ObjectArg::Owned(object_ref)
    })
}

fn from_info(unresolved: &UnresolvedObject, info: &ObjectInfo) -> Result<ObjectArg, BuildError> {
    let shared_version = match info.owner {
        Owner::Shared {
            initial_shared_version,
        } => Some(initial_shared_version),
        Owner::ConsensusAddressOwner { start_version, .. } => Some(start_version),
        _ => None,
    };

    match (shared_version, unresolved.receiving) {
        (Some(_), true) => Err(BuildError::ConflictingInput {
            object_id: unresolved.object_id,
            existing: "shared",
            incoming: "receiving",
        }),
        (Some(initial_shared_version), false) => Ok(ObjectArg::Shared {
            object_id: unresolved.object_id,
            initial_shared_version,
            mutable: unresolved.mutable.unwrap_or(true),
        }),
        (None, true) => Ok(ObjectArg::Receiving(info.object_ref)),
        (None, false) => Ok(ObjectArg::Owned(info.object_ref)),
    }
}

#[async_trait]
impl ResolutionStage for ObjectStage {
    fn name(&self) -> &'static str {
        "objects"
    }

    async fn resolve(
        &self,
        builder: &mut TransactionBuilder,
        options: &BuildOptions,
    ) -> Result<Flow, BuildError> {
        let mut pending: Vec<(usize, UnresolvedObject)> = Vec::new();
        for (index, input) in builder.data.inputs.iter_mut().enumerate() {
            let declared = match input {
                Input::UnresolvedObject(unresolved) => {
                    let arg = from_declared(unresolved);
                    if arg.is_none() {
                        pending.push((index, unresolved.clone()));
                    }
                    arg
                }
                _ => None,
            };
            if let Some(arg) = declared {
                *input = Input::Object(arg);
            }
        }
        if pending.is_empty() {
            return Ok(Flow::Continue);
        }

        let mut known: HashMap<ObjectId, ObjectInfo> = HashMap::new();
        if let Some(cache) = &options.cache {
            for (_, unresolved) in &pending {
                if let Some(info) = cache.get_object(&unresolved.object_id) {
                    known.insert(unresolved.object_id, info);
                }
            }
        }

        let missing: Vec<ObjectId> = pending
            .iter()
            .map(|(_, u)| u.object_id)
            .filter(|id| !known.contains_key(id))
            .collect();
        if !missing.is_empty() {
            let lookup = options.require_lookup("resolve object inputs")?;
            for batch in missing.chunks(self.max_batch_size) {
                let found = lookup.get_objects(batch).await?;
                for (id, info) in batch.iter().zip(found) {
                    let info = info.ok_or(BuildError::ObjectNotFound(*id))?;
                    known.insert(*id, info);
                }
            }
            metrics().objects_fetched.inc_by(missing.len() as u64);
        }

        for (index, unresolved) in &pending {
            let info = known
                .get(&unresolved.object_id)
                .ok_or(BuildError::ObjectNotFound(unresolved.object_id))?;
            builder.data.inputs[*index] = Input::Object(from_info(unresolved, info)?);
        }
        debug!(
            resolved = pending.len(),
            fetched = missing.len(),
            "resolved object inputs"
        );
        Ok(Flow::Continue)
    }
}
