//! weak-cache: a concurrent, canonicalizing key-value cache that holds its
//! values weakly: the cache keeps no value alive; callers do, through
//! `CacheRef` strong owners, and a value's entry is torn down after its
//! last owner drops.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: resolve the three races around a weakly held entry (a reader
//!   using the value, teardown clearing it, a writer installing a fresh
//!   value for the same key) without locking the hot read path, in safe,
//!   verifiable layers.
//! - Layers:
//!   - WeakHandle<T>: per-entry tri-state (alive / in-use / dead) plus an
//!     owner count, all lock-free. Readers register themselves under a
//!     short exclusive window; teardown only completes when it wins that
//!     window while no owner is registered, and otherwise defers to the
//!     interfering owner's own last drop.
//!   - WeakCache<K, T, S>: key→handle table behind one shared/exclusive
//!     lock. Insert canonicalizes: while a live value exists for a key,
//!     later candidates are discarded in its favor. Removal is lazy for
//!     reclaimed entries and unconditional for explicit removes.
//!   - CacheRef<K, T, S> (+ Destroy): the strong owner handed to callers.
//!     Its Drop is the reclamation trigger: the last owner retires the
//!     handle, unlinks the entry (only if the key still maps to that same
//!     handle), and runs the value's Destroy hook on a detached thread.
//!
//! Constraints
//! - Thread-safe throughout; per-entry state is mutated only by atomic
//!   compare-and-swap, the table lock covers only the key→handle mapping.
//! - `get` never blocks on the table beyond the lock itself; it spins
//!   (cooperative yield) only against another O(1) critical section on the
//!   same handle.
//! - `K: Clone`: every ref carries its key for the teardown path.
//! - `T: Send + 'static`: cleanup runs on a detached thread.
//!
//! Reentrancy policy
//! - User code runs under the table lock only via `K: Eq`/`Hash`/`Clone`
//!   during probing and key capture; those impls must not call back into
//!   the cache. Everything else (discarded candidates, evicted keys,
//!   Destroy hooks) runs after unlock or on another thread, so value and
//!   key drops may themselves hold and drop refs into the cache.
//! - A handle's in-use window is branch-free, O(1), and runs no user
//!   code, so the spin in `get` is bounded by construction: it only ever
//!   waits out another thread's few atomic operations.
//!
//! Notes and non-goals
//! - Absence is deliberately uninformative: "never inserted", "removed",
//!   and "reclaimed" are indistinguishable; weak references offer no
//!   observability into why a value vanished.
//! - Adversarially interleaved readers and teardowns can defer teardown
//!   indefinitely; each deferral hands the trigger to a live owner, so the
//!   value stays usable the whole time. No retry bound is imposed.
//! - No size or age eviction, no persistence, no cross-process sharing.
//! - Public API surface is `WeakCache`, `CacheRef`, and `Destroy`; the
//!   `handle` layer is exposed for reuse but has sharp pairing contracts.

mod cache;
pub mod handle;
mod handle_proptest;
mod reclaim;

// Public surface
pub use cache::WeakCache;
pub use reclaim::{CacheRef, Destroy};
