//! Scoped object cache with a dedicated fee-object slot
//!
//! One `ObjectCache` serves several lookup domains. Keys live in a
//! [`CacheScope`] so an object id and a package name never collide. The
//! executor owns the cache and is its only writer; resolution stages read it.
//!
//! After a successful submission the fee-object slot holds the fee object's
//! new reference, or is empty when the sender no longer owns it. `reset`
//! clears every scope and the slot under one write lock.

use crate::client::ObjectInfo;
use crate::codec::TransactionEffects;
use crate::metrics::metrics;
use crate::types::{Address, ObjectId, ObjectRef, Owner};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Namespace for cache keys
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// Objects exclusively owned by an address or another object
    OwnedObject,
    SharedOrImmutableObject,
    /// Named package to address
    PackageName,
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    Object(ObjectInfo),
    Address(Address),
    Value(serde_json::Value),
}

impl CacheEntry {
    pub fn as_object(&self) -> Option<&ObjectInfo> {
        match self {
            CacheEntry::Object(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            CacheEntry::Address(address) => Some(*address),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<(CacheScope, String), CacheEntry>,
    fee_object: Option<ObjectRef>,
}

#[derive(Debug, Default)]
pub struct ObjectCache {
    inner: RwLock<CacheInner>,
}

fn object_scope(owner: &Owner) -> CacheScope {
    match owner {
        Owner::AddressOwner(_) | Owner::ObjectOwner(_) => CacheScope::OwnedObject,
        Owner::Shared { .. } | Owner::Immutable | Owner::ConsensusAddressOwner { .. } => {
            CacheScope::SharedOrImmutableObject
        }
    }
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, scope: &CacheScope, key: &str) -> Option<CacheEntry> {
        self.inner
            .read()
            .entries
            .get(&(scope.clone(), key.to_string()))
            .cloned()
    }

    pub fn set(&self, scope: CacheScope, key: impl Into<String>, value: CacheEntry) {
        self.inner.write().entries.insert((scope, key.into()), value);
    }

    pub fn delete(&self, scope: &CacheScope, key: &str) -> Option<CacheEntry> {
        self.inner
            .write()
            .entries
            .remove(&(scope.clone(), key.to_string()))
    }

    /// Cached state of an object in either object scope
    pub fn get_object(&self, object_id: &ObjectId) -> Option<ObjectInfo> {
        let key = object_id.to_hex();
        let inner = self.inner.read();
        [CacheScope::OwnedObject, CacheScope::SharedOrImmutableObject]
            .into_iter()
            .find_map(|scope| inner.entries.get(&(scope, key.clone())))
            .and_then(|entry| entry.as_object().copied())
    }

    /// Store an object in the scope matching its owner, dropping any entry
    /// it had in the other scope
    pub fn set_object(&self, info: ObjectInfo) {
        let key = info.object_ref.object_id.to_hex();
        let scope = object_scope(&info.owner);
        let mut inner = self.inner.write();
        let stale = match scope {
            CacheScope::OwnedObject => CacheScope::SharedOrImmutableObject,
            _ => CacheScope::OwnedObject,
        };
        inner.entries.remove(&(stale, key.clone()));
        inner.entries.insert((scope, key), CacheEntry::Object(info));
    }

    pub fn delete_object(&self, object_id: &ObjectId) {
        let key = object_id.to_hex();
        let mut inner = self.inner.write();
        inner
            .entries
            .remove(&(CacheScope::OwnedObject, key.clone()));
        inner
            .entries
            .remove(&(CacheScope::SharedOrImmutableObject, key));
    }

    pub fn get_package(&self, name: &str) -> Option<Address> {
        self.get(&CacheScope::PackageName, name)
            .and_then(|entry| entry.as_address())
    }

    pub fn set_package(&self, name: &str, address: Address) {
        self.set(CacheScope::PackageName, name, CacheEntry::Address(address));
    }

    pub fn get_fee_object(&self) -> Option<ObjectRef> {
        self.inner.read().fee_object
    }

    pub fn set_fee_object(&self, object_ref: ObjectRef) {
        self.inner.write().fee_object = Some(object_ref);
    }

    pub fn clear_fee_object(&self) {
        self.inner.write().fee_object = None;
    }

    /// Drop every entry and the fee object
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.fee_object = None;
        metrics().cache_entries.set(0);
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fold the outcome of an executed transaction into the cache
    ///
    /// Removed objects are evicted, written objects are stored at the
    /// effects' lamport version, and the fee-object slot follows the fee
    /// object while `owner` still owns it.
    pub fn apply_effects(&self, effects: &TransactionEffects, owner: &Address) {
        let changed = effects.changed_objects();
        let fee_object = effects
            .fee_object()
            .filter(|(_, fee_owner)| fee_owner.is_owned_by(owner))
            .map(|(object_ref, _)| object_ref);

        let mut inner = self.inner.write();
        for change in &changed {
            let key = change.object_id.to_hex();
            inner
                .entries
                .remove(&(CacheScope::OwnedObject, key.clone()));
            inner
                .entries
                .remove(&(CacheScope::SharedOrImmutableObject, key.clone()));

            if change.operation.is_removal() {
                continue;
            }
            if let (Some(object_ref), Some(object_owner)) = (change.object_ref(), change.owner) {
                inner.entries.insert(
                    (object_scope(&object_owner), key),
                    CacheEntry::Object(ObjectInfo {
                        object_ref,
                        owner: object_owner,
                    }),
                );
            }
        }
        inner.fee_object = fee_object;
        metrics().cache_entries.set(inner.entries.len() as i64);

        debug!(
            digest = %effects.transaction_digest,
            changed = changed.len(),
            fee_object = ?fee_object,
            "applied effects to cache"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{simple_effects, EffectsObjectChange, IdOperation, ObjectIn, ObjectOut};
    use crate::types::Digest;

    fn object_ref(id: u64, version: u64) -> ObjectRef {
        ObjectRef::new(Address::from_u64(id), version, Digest::new([id as u8; 32]))
    }

    #[test]
    fn test_scopes_do_not_collide() {
        let cache = ObjectCache::new();
        cache.set(CacheScope::PackageName, "k", CacheEntry::Address(Address::from_u64(1)));
        cache.set(
            CacheScope::Custom("other".to_string()),
            "k",
            CacheEntry::Value(serde_json::json!(7)),
        );
        assert_eq!(cache.get_package("k"), Some(Address::from_u64(1)));
        assert_eq!(
            cache.get(&CacheScope::Custom("other".to_string()), "k"),
            Some(CacheEntry::Value(serde_json::json!(7)))
        );
        assert!(cache.get(&CacheScope::OwnedObject, "k").is_none());

        cache.delete(&CacheScope::PackageName, "k");
        assert_eq!(cache.get_package("k"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_object_moves_between_scopes() {
        let cache = ObjectCache::new();
        let me = Address::from_u64(1);
        cache.set_object(ObjectInfo {
            object_ref: object_ref(5, 1),
            owner: Owner::AddressOwner(me),
        });
        cache.set_object(ObjectInfo {
            object_ref: object_ref(5, 2),
            owner: Owner::Shared {
                initial_shared_version: 2,
            },
        });
        assert_eq!(cache.len(), 1);
        assert!(cache.get_object(&Address::from_u64(5)).unwrap().owner.is_shared());
    }

    #[test]
    fn test_apply_effects_tracks_fee_object() {
        let cache = ObjectCache::new();
        let me = Address::from_u64(1);
        let fee = object_ref(9, 3);
        let effects = simple_effects(Digest::new([1; 32]), fee, Digest::new([2; 32]), me, 4);

        cache.apply_effects(&effects, &me);
        let expected = ObjectRef::new(fee.object_id, 4, Digest::new([2; 32]));
        assert_eq!(cache.get_fee_object(), Some(expected));
        assert_eq!(cache.get_object(&fee.object_id).unwrap().object_ref, expected);

        // someone else's fee object is not ours to reuse
        cache.apply_effects(&effects, &Address::from_u64(2));
        assert_eq!(cache.get_fee_object(), None);
    }

    #[test]
    fn test_apply_effects_evicts_deleted() {
        let cache = ObjectCache::new();
        let me = Address::from_u64(1);
        let doomed = object_ref(7, 1);
        cache.set_object(ObjectInfo {
            object_ref: doomed,
            owner: Owner::AddressOwner(me),
        });

        let mut effects =
            simple_effects(Digest::new([1; 32]), object_ref(9, 3), Digest::new([2; 32]), me, 4);
        effects.changed_objects.push((
            doomed.object_id,
            EffectsObjectChange {
                input_state: ObjectIn::Exist {
                    version: 1,
                    digest: doomed.digest,
                    owner: Owner::AddressOwner(me),
                },
                output_state: ObjectOut::NotExist,
                id_operation: IdOperation::Deleted,
            },
        ));

        cache.apply_effects(&effects, &me);
        assert!(cache.get_object(&doomed.object_id).is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let cache = ObjectCache::new();
        cache.set_fee_object(object_ref(1, 1));
        cache.set_package("@org/app", Address::from_u64(3));
        cache.reset();
        assert!(cache.is_empty());
        assert_eq!(cache.get_fee_object(), None);
    }
}
