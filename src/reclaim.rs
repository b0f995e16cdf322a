//! CacheRef and the reclamation path: strong owners whose last drop tears
//! a cache entry down.

use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};
use core::ops::Deref;
use std::collections::hash_map::RandomState;
use std::sync::Arc;

use crate::cache::Shared;
use crate::handle::WeakHandle;

/// Cleanup capability of cached values.
///
/// `destroy` consumes the value exactly once when it is reclaimed, after
/// its last [`CacheRef`] owner drops and teardown wins. It runs on a
/// detached thread with no cache lock held and on no particular schedule;
/// a panic in it is confined to that thread. Implement it as a no-op for
/// values that own nothing beyond memory.
///
/// A candidate discarded by a canonicalizing insert is dropped without
/// `destroy`: it was never cached.
pub trait Destroy {
    fn destroy(self);
}

/// A strong owner of a cached value.
///
/// The cache itself holds values weakly; refs are what keep a value alive.
/// `Clone` registers one more owner, `Deref` reads the value, and dropping
/// the last owner triggers teardown of the value's entry. Refs also keep
/// the cache internals alive, so teardown behaves the same after every
/// [`WeakCache`] clone is gone.
///
/// Two refs are equal exactly when they view the same canonical instance,
/// regardless of the values' own equality.
///
/// [`WeakCache`]: crate::WeakCache
pub struct CacheRef<K, T, S = RandomState>
where
    K: Eq + Hash + Clone,
    T: Destroy + Send + 'static,
    S: BuildHasher,
{
    key: K,
    handle: Arc<WeakHandle<T>>,
    shared: Arc<Shared<K, T, S>>,
}

impl<K, T, S> CacheRef<K, T, S>
where
    K: Eq + Hash + Clone,
    T: Destroy + Send + 'static,
    S: BuildHasher,
{
    /// Callers arrive here with an owner registration already made for
    /// them, either by `WeakHandle::new` or by a successful `acquire`.
    pub(crate) fn new(key: K, handle: Arc<WeakHandle<T>>, shared: Arc<Shared<K, T, S>>) -> Self {
        Self {
            key,
            handle,
            shared,
        }
    }

    /// The key this value is cached under.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Whether two refs view the same canonical instance.
    pub fn same_instance(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.handle, &other.handle)
    }
}

impl<K, T, S> Deref for CacheRef<K, T, S>
where
    K: Eq + Hash + Clone,
    T: Destroy + Send + 'static,
    S: BuildHasher,
{
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: this ref holds an owner registration for its whole
        // lifetime, which keeps the slot populated.
        unsafe { self.handle.value_unchecked() }
    }
}

impl<K, T, S> Clone for CacheRef<K, T, S>
where
    K: Eq + Hash + Clone,
    T: Destroy + Send + 'static,
    S: BuildHasher,
{
    fn clone(&self) -> Self {
        self.handle.retain();
        Self {
            key: self.key.clone(),
            handle: Arc::clone(&self.handle),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, T, S> Drop for CacheRef<K, T, S>
where
    K: Eq + Hash + Clone,
    T: Destroy + Send + 'static,
    S: BuildHasher,
{
    fn drop(&mut self) {
        if !self.handle.release() {
            return;
        }
        // Last owner. A deferred retire means a racing reader resurrected
        // the value (or another teardown already won); the surviving
        // owner's own drop re-triggers, so nothing further happens here.
        if let Some(value) = self.handle.retire() {
            self.shared.reclaim(&self.key, &self.handle, value);
        }
    }
}

impl<K, T, S> PartialEq for CacheRef<K, T, S>
where
    K: Eq + Hash + Clone,
    T: Destroy + Send + 'static,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        Self::same_instance(self, other)
    }
}

impl<K, T, S> Eq for CacheRef<K, T, S>
where
    K: Eq + Hash + Clone,
    T: Destroy + Send + 'static,
    S: BuildHasher,
{
}

impl<K, T, S> Hash for CacheRef<K, T, S>
where
    K: Eq + Hash + Clone,
    T: Destroy + Send + 'static,
    S: BuildHasher,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.handle) as usize).hash(state);
    }
}

impl<K, T, S> fmt::Debug for CacheRef<K, T, S>
where
    K: Eq + Hash + Clone + fmt::Debug,
    T: Destroy + Send + 'static + fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRef")
            .field("key", &self.key)
            .field("value", &**self)
            .finish()
    }
}
