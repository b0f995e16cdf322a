//! WeakCache: locked key→handle table with canonicalizing insert.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::handle::WeakHandle;
use crate::reclaim::{CacheRef, Destroy};

/// A concurrent map from keys to weakly held values.
///
/// The cache keeps no value alive: callers hold values through
/// [`CacheRef`] owners, and an entry is torn down after the last owner for
/// its value drops. [`insert`] canonicalizes: while a live value exists for
/// a key, later candidates for that key are discarded in favor of it.
///
/// Clones share one table; cloning is the way to hand the cache to another
/// thread.
///
/// The table lock protects only the key→handle mapping, never value
/// access. User code runs under it only through `K: Eq`/`Hash` during
/// probing and `K: Clone` when a ref captures its key; such impls must not
/// call back into the cache.
///
/// [`insert`]: WeakCache::insert
pub struct WeakCache<K, T, S = RandomState> {
    shared: Arc<Shared<K, T, S>>,
}

pub(crate) struct Shared<K, T, S> {
    table: RwLock<HashMap<K, Arc<WeakHandle<T>>, S>>,
}

impl<K, T> WeakCache<K, T>
where
    K: Eq + Hash + Clone,
    T: Destroy + Send + 'static,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, T> Default for WeakCache<K, T>
where
    K: Eq + Hash + Clone,
    T: Destroy + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T, S> Clone for WeakCache<K, T, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, T, S> WeakCache<K, T, S>
where
    K: Eq + Hash + Clone,
    T: Destroy + Send + 'static,
    S: BuildHasher + Clone + Default,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            shared: Arc::new(Shared {
                table: RwLock::new(HashMap::with_hasher(hasher)),
            }),
        }
    }

    /// Number of physical entries. May transiently count an entry whose
    /// value is already gone but whose lazy removal has not run yet.
    pub fn len(&self) -> usize {
        self.shared.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.table.read().is_empty()
    }

    /// Whether a live value is cached under `key`. Advisory, like any
    /// liveness answer from a concurrently mutated cache.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shared
            .table
            .read()
            .get(key)
            .map(|handle| !handle.is_dead())
            .unwrap_or(false)
    }

    /// Look up the value cached under `key` and register as an owner of it.
    ///
    /// `None` means there is no live value: never inserted, explicitly
    /// removed, or already reclaimed; the three are indistinguishable. A
    /// miss has no side effects.
    pub fn get<Q>(&self, key: &Q) -> Option<CacheRef<K, T, S>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let table = self.shared.table.read();
        let (stored, handle) = table.get_key_value(key)?;
        if !handle.acquire() {
            return None;
        }
        Some(CacheRef::new(
            stored.clone(),
            Arc::clone(handle),
            Arc::clone(&self.shared),
        ))
    }

    /// Insert `value` under `key` unless a live value is already cached
    /// there, and return the canonical value, which may not be `value`.
    ///
    /// While owners of an existing value are live, that value wins: the
    /// candidate is dropped (its [`Destroy`] hook is not run; it was never
    /// cached) and a ref to the existing value is returned. Under
    /// concurrent inserts for one key, exactly one candidate becomes
    /// canonical and every caller's ref views it.
    pub fn insert(&self, key: K, value: T) -> CacheRef<K, T, S> {
        let mut discarded = None;
        let stale;
        let canonical;
        {
            let mut table = self.shared.table.write();
            let existing = match table.get(&key) {
                Some(handle) if handle.acquire() => Some(Arc::clone(handle)),
                _ => None,
            };
            match existing {
                Some(handle) => {
                    canonical = CacheRef::new(key, handle, Arc::clone(&self.shared));
                    discarded = Some(value);
                    stale = None;
                }
                None => {
                    // Unlink any dead prior entry now, drop it after unlock.
                    stale = table.remove_entry(&key);
                    let handle = Arc::new(WeakHandle::new(value));
                    table.insert(key.clone(), Arc::clone(&handle));
                    canonical = CacheRef::new(key, handle, Arc::clone(&self.shared));
                }
            }
        }
        // A key or candidate drop may reenter the cache through refs it
        // holds, so both happen only once the table lock is released.
        drop(stale);
        drop(discarded);
        canonical
    }

    /// Remove the entry for `key` unconditionally, live or not. A no-op for
    /// an absent key.
    ///
    /// Eviction is not destruction: no cleanup runs here, and outstanding
    /// owners keep using the value. Its teardown still happens after the
    /// last of them drops.
    pub fn remove<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let removed;
        {
            let mut table = self.shared.table.write();
            removed = table.remove_entry(key);
        }
        // The evicted key may hold refs into this cache.
        drop(removed);
    }
}

impl<K, T, S> Shared<K, T, S>
where
    K: Eq + Hash,
    T: Destroy + Send + 'static,
    S: BuildHasher,
{
    /// Teardown tail, driven by the last owner of a value (never by
    /// callers). The retiring handle's entry is removed only if the key
    /// still maps to that identical handle, so a newer entry installed by
    /// an insert that won the lock first survives a stale teardown.
    pub(crate) fn reclaim(&self, key: &K, handle: &Arc<WeakHandle<T>>, value: T) {
        let removed;
        {
            let mut table = self.table.write();
            let current = table
                .get(key)
                .map(|entry| Arc::ptr_eq(entry, handle))
                .unwrap_or(false);
            removed = if current { table.remove_entry(key) } else { None };
        }
        drop(removed);
        // Cleanup runs on its own detached thread: never under the table
        // lock, never on a caller's schedule. A panic in it is confined to
        // that thread.
        std::thread::spawn(move || value.destroy());
    }
}
