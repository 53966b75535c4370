//! Component Store - type-erased map of homogeneous buckets
//!
//! The outer map is keyed by `TypeId` and holds `Box<dyn ErasedBucket>`.
//! Each bucket is a strongly typed `HashMap<EntityId, Vec<T>>`. Lookups are
//! total: absence is returned as data, never as an error.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use loom_core::TypeKey;

use crate::component::Component;
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::query::Fetch;

/// Operations every bucket supports without knowing its component type
trait ErasedBucket: Send + Sync {
    fn remove_entity(&mut self, entity: EntityId) -> bool;
    fn contains(&self, entity: EntityId) -> bool;
    fn key(&self) -> TypeKey;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Bucket<T: Component> {
    instances: HashMap<EntityId, Vec<T>>,
}

impl<T: Component> Bucket<T> {
    fn new() -> Self {
        Self {
            instances: HashMap::new(),
        }
    }
}

impl<T: Component> ErasedBucket for Bucket<T> {
    fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.instances.remove(&entity).is_some()
    }

    fn contains(&self, entity: EntityId) -> bool {
        self.instances.contains_key(&entity)
    }

    fn key(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owns every component instance, keyed by type then entity
#[derive(Default)]
pub struct ComponentStore {
    buckets: HashMap<TypeId, Box<dyn ErasedBucket>>,
}

impl ComponentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket<T: Component>(&self) -> Option<&Bucket<T>> {
        let erased = self.buckets.get(&TypeId::of::<T>())?;
        let bucket = erased.as_any().downcast_ref::<Bucket<T>>();
        if bucket.is_none() {
            log::error!(
                "component bucket type mismatch: requested {}, stored {}",
                std::any::type_name::<T>(),
                erased.key().name()
            );
        }
        bucket
    }

    fn bucket_mut<T: Component>(&mut self) -> Option<&mut Bucket<T>> {
        let erased = self.buckets.get_mut(&TypeId::of::<T>())?;
        let stored = erased.key();
        let bucket = erased.as_any_mut().downcast_mut::<Bucket<T>>();
        if bucket.is_none() {
            log::error!(
                "component bucket type mismatch: requested {}, stored {}",
                std::any::type_name::<T>(),
                stored.name()
            );
        }
        bucket
    }

    fn bucket_or_insert<T: Component>(&mut self) -> Option<&mut Bucket<T>> {
        self.buckets
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Bucket::<T>::new()));
        self.bucket_mut::<T>()
    }

    /// Add a component to an entity.
    ///
    /// Fails with [`EcsError::DuplicateComponent`] if the entity already has
    /// an instance of `T` and `T` does not allow multiples. The existing
    /// instance is left untouched.
    pub fn add<T: Component>(&mut self, entity: EntityId, component: T) -> Result<()> {
        let Some(bucket) = self.bucket_or_insert::<T>() else {
            // Mismatch already logged; treat like an occupied slot
            return Err(EcsError::DuplicateComponent {
                entity,
                component: std::any::type_name::<T>(),
            });
        };

        let slot = bucket.instances.entry(entity).or_default();
        if !slot.is_empty() && !T::ALLOW_MULTIPLE {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: std::any::type_name::<T>(),
            });
        }
        slot.push(component);
        Ok(())
    }

    /// Remove every instance of `T` from an entity. Returns whether anything was removed.
    pub fn delete<T: Component>(&mut self, entity: EntityId) -> bool {
        self.bucket_mut::<T>()
            .map(|bucket| bucket.instances.remove(&entity).is_some())
            .unwrap_or(false)
    }

    /// Type-erased [`delete`](Self::delete)
    pub fn delete_key(&mut self, entity: EntityId, key: TypeKey) -> bool {
        self.buckets
            .get_mut(&key.type_id())
            .map(|bucket| bucket.remove_entity(entity))
            .unwrap_or(false)
    }

    /// Remove every component of every type from an entity.
    ///
    /// Returns the number of component types that held an instance.
    pub fn delete_all(&mut self, entity: EntityId) -> usize {
        self.buckets
            .values_mut()
            .map(|bucket| bucket.remove_entity(entity))
            .filter(|removed| *removed)
            .count()
    }

    /// Get the (first) instance of `T` on an entity
    pub fn try_get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.bucket::<T>()?.instances.get(&entity)?.first()
    }

    /// Optional-slot lookup: always succeeds, the inner option carries presence
    pub fn try_get_optional<T: Component>(&self, entity: EntityId) -> Option<Option<&T>> {
        Some(self.try_get::<T>(entity))
    }

    /// All instances of `T` on an entity, in insertion order
    pub fn try_get_all<T: Component>(&self, entity: EntityId) -> &[T] {
        self.bucket::<T>()
            .and_then(|bucket| bucket.instances.get(&entity))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Joined lookup over a fetch tuple.
    ///
    /// Returns `None` if any required slot is missing; optional slots are
    /// filled regardless.
    pub fn try_get_joined<Q: Fetch>(&self, entity: EntityId) -> Option<Q::Item<'_>> {
        Q::fetch(self, entity)
    }

    /// Mutable access to the (first) instance of `T`
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.bucket_mut::<T>()?.instances.get_mut(&entity)?.first_mut()
    }

    /// Mutable access to every instance of `T`
    pub fn get_all_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut Vec<T>> {
        self.bucket_mut::<T>()?.instances.get_mut(&entity)
    }

    /// Check if an entity has a `T`
    pub fn contains<T: Component>(&self, entity: EntityId) -> bool {
        self.contains_key(entity, TypeKey::of::<T>())
    }

    /// Type-erased [`contains`](Self::contains)
    pub fn contains_key(&self, entity: EntityId, key: TypeKey) -> bool {
        self.buckets
            .get(&key.type_id())
            .map(|bucket| bucket.contains(entity))
            .unwrap_or(false)
    }

    /// Number of entities holding a `T`
    pub fn len_of<T: Component>(&self) -> usize {
        self.bucket::<T>()
            .map(|bucket| bucket.instances.len())
            .unwrap_or(0)
    }

    /// Entities holding a `T`, sorted by id
    pub fn entities_with<T: Component>(&self) -> Vec<EntityId> {
        let mut entities: Vec<EntityId> = self
            .bucket::<T>()
            .map(|bucket| bucket.instances.keys().copied().collect())
            .unwrap_or_default();
        entities.sort_unstable();
        entities
    }

    /// Keys of every component type the entity holds
    pub fn component_keys(&self, entity: EntityId) -> Vec<TypeKey> {
        self.buckets
            .values()
            .filter(|bucket| bucket.contains(entity))
            .map(|bucket| bucket.key())
            .collect()
    }
}

impl std::fmt::Debug for ComponentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<TypeKey> = self.buckets.values().map(|bucket| bucket.key()).collect();
        f.debug_struct("ComponentStore").field("types", &keys).finish()
    }
}
