//! Resources - process-wide singletons keyed by type
//!
//! Each resource lives behind a shared [`Res<R>`] handle. The registry holds
//! at most one instance per type and never replaces one once registered.
//!
//! Systems cannot mutate the registry while a tick is running. They request
//! new resources through the [`ResourceQueue`], itself a resource registered
//! when the registry is created; the scheduler drains it between units.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use loom_core::TypeKey;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::ResourceError;

/// Marker for types usable as resources
pub trait Resource: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Resource for T {}

/// Shared handle to a registered resource
pub struct Res<R>(Arc<RwLock<R>>);

impl<R: Resource> Res<R> {
    fn new(value: R) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Shared read access
    pub fn read(&self) -> RwLockReadGuard<'_, R> {
        self.0.read()
    }

    /// Exclusive write access
    pub fn write(&self) -> RwLockWriteGuard<'_, R> {
        self.0.write()
    }

    /// Whether two handles point at the same instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<R> Clone for Res<R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<R: fmt::Debug> fmt::Debug for Res<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Res").field(&*self.0.read()).finish()
    }
}

struct ResourceEntry {
    key: TypeKey,
    /// Always a `Res<R>` for the `R` named by `key`
    handle: Box<dyn Any + Send + Sync>,
}

/// A resource waiting in the [`ResourceQueue`]
pub struct PendingResource {
    key: TypeKey,
    handle: Box<dyn Any + Send + Sync>,
}

impl PendingResource {
    fn new<R: Resource>(value: R) -> Self {
        Self {
            key: TypeKey::of::<R>(),
            handle: Box::new(Res::new(value)),
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }
}

impl fmt::Debug for PendingResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResource").field("key", &self.key).finish()
    }
}

/// Deferred registration queue.
///
/// Pushing only needs a shared reference, so systems can use it through a
/// read guard; cloned [`ResourceSender`]s work from other threads.
pub struct ResourceQueue {
    sender: Sender<PendingResource>,
    receiver: Receiver<PendingResource>,
}

impl ResourceQueue {
    fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Request that `value` be registered at the next drain point
    pub fn push<R: Resource>(&self, value: R) {
        // Both channel ends live in `self`, so the channel cannot be disconnected
        let _ = self.sender.send(PendingResource::new(value));
    }

    /// A sender that can be moved to another thread
    pub fn sender(&self) -> ResourceSender {
        ResourceSender {
            sender: self.sender.clone(),
        }
    }

    /// Number of queued requests
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    fn drain(&self) -> Vec<PendingResource> {
        self.receiver.try_iter().collect()
    }
}

/// Cloneable, thread-safe handle for pushing into a [`ResourceQueue`]
#[derive(Clone)]
pub struct ResourceSender {
    sender: Sender<PendingResource>,
}

impl ResourceSender {
    /// Request that `value` be registered. Returns `false` if the registry is gone.
    pub fn push<R: Resource>(&self, value: R) -> bool {
        self.sender.send(PendingResource::new(value)).is_ok()
    }
}

/// Type-keyed singleton storage
pub struct ResourceRegistry {
    entries: BTreeMap<TypeId, ResourceEntry>,
    queue: Res<ResourceQueue>,
}

impl ResourceRegistry {
    /// Create a registry holding only its own [`ResourceQueue`]
    pub fn new() -> Self {
        let queue = Res::new(ResourceQueue::new());
        let mut entries = BTreeMap::new();
        entries.insert(
            TypeId::of::<ResourceQueue>(),
            ResourceEntry {
                key: TypeKey::of::<ResourceQueue>(),
                handle: Box::new(queue.clone()),
            },
        );
        Self { entries, queue }
    }

    /// Register a resource.
    ///
    /// Fails with [`ResourceError::AlreadyRegistered`] if one of this type
    /// exists; the existing instance is kept.
    pub fn register<R: Resource>(&mut self, value: R) -> Result<Res<R>, ResourceError> {
        let key = TypeKey::of::<R>();
        if self.entries.contains_key(&key.type_id()) {
            return Err(ResourceError::AlreadyRegistered(key.name()));
        }

        let handle = Res::new(value);
        self.entries.insert(
            key.type_id(),
            ResourceEntry {
                key,
                handle: Box::new(handle.clone()),
            },
        );
        log::debug!("registered resource {}", key);
        Ok(handle)
    }

    /// Look up a resource
    pub fn try_get<R: Resource>(&self) -> Option<Res<R>> {
        let entry = self.entries.get(&TypeId::of::<R>())?;
        let handle = entry.handle.downcast_ref::<Res<R>>();
        if handle.is_none() {
            log::error!(
                "resource type mismatch: requested {}, stored {}",
                std::any::type_name::<R>(),
                entry.key.name()
            );
        }
        handle.cloned()
    }

    pub fn contains<R: Resource>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<R>())
    }

    pub fn contains_key(&self, key: TypeKey) -> bool {
        self.entries.contains_key(&key.type_id())
    }

    /// Keys of every registered resource
    pub fn keys(&self) -> Vec<TypeKey> {
        self.entries.values().map(|entry| entry.key).collect()
    }

    /// Number of registered resources, including the queue
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The pending-registration queue
    pub fn queue(&self) -> Res<ResourceQueue> {
        self.queue.clone()
    }

    /// Take every queued request, in push order
    pub fn drain_pending(&self) -> Vec<PendingResource> {
        self.queue.read().drain()
    }

    /// Commit a queued request
    pub fn insert_pending(&mut self, pending: PendingResource) -> Result<TypeKey, ResourceError> {
        let key = pending.key;
        if self.entries.contains_key(&key.type_id()) {
            return Err(ResourceError::AlreadyRegistered(key.name()));
        }
        self.entries.insert(
            key.type_id(),
            ResourceEntry {
                key,
                handle: pending.handle,
            },
        );
        log::debug!("registered queued resource {}", key);
        Ok(key)
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("resources", &self.keys())
            .finish()
    }
}
