//! WeakHandle: lock-free tri-state holder for one cached value.
//!
//! A handle is either `alive` (slot populated, readable), `in-use` (one
//! thread has exclusive access to the slot for an O(1), branch-free
//! critical section), or `dead` (slot cleared, terminal). The state word
//! plus an owner count replace a per-entry lock: readers register
//! themselves under `in-use` exclusivity, and teardown only completes when
//! it wins the same exclusivity while no owner is registered.

use core::cell::UnsafeCell;
use core::fmt;
use core::sync::atomic::{fence, AtomicU8, AtomicUsize, Ordering};

const ALIVE: u8 = 0;
const IN_USE: u8 = 1;
const DEAD: u8 = 2;

/// Single-slot value holder gating concurrent reads against teardown.
///
/// The owner count tracks outstanding strong views of the value. The slot
/// is populated exactly while the state is not `dead`, and it stays
/// populated while the count is above zero: `retire` refuses to clear it
/// otherwise.
pub struct WeakHandle<T> {
    state: AtomicU8,
    owners: AtomicUsize,
    slot: UnsafeCell<Option<T>>,
}

// The slot is only written by the thread holding `in-use` exclusivity
// (registering readers do not touch it; the single teardown winner clears
// it), and shared `&T` views are only handed out while the owner count is
// above zero, which blocks that clear.
unsafe impl<T: Send> Send for WeakHandle<T> {}
unsafe impl<T: Send + Sync> Sync for WeakHandle<T> {}

impl<T> WeakHandle<T> {
    /// Create a live handle holding `value`, with one owner already
    /// registered for the caller.
    pub fn new(value: T) -> Self {
        Self {
            state: AtomicU8::new(ALIVE),
            owners: AtomicUsize::new(1),
            slot: UnsafeCell::new(Some(value)),
        }
    }

    /// Create a handle with no value. It is born `dead`: `acquire` always
    /// fails and no teardown will ever run.
    pub fn vacant() -> Self {
        Self {
            state: AtomicU8::new(DEAD),
            owners: AtomicUsize::new(0),
            slot: UnsafeCell::new(None),
        }
    }

    /// Register one more owner if the value is still present.
    ///
    /// Returns `false` immediately, without spinning, once teardown has
    /// completed. While another thread holds the handle `in-use`, retries
    /// after yielding; in-use sections are branch-free, O(1), and run no
    /// user code, so the spin only ever waits out a few atomic operations.
    ///
    /// Every `true` return must be paired with exactly one [`release`].
    ///
    /// [`release`]: WeakHandle::release
    pub fn acquire(&self) -> bool {
        loop {
            match self
                .state
                .compare_exchange(ALIVE, IN_USE, Ordering::Acquire, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(DEAD) => return false,
                // Another reader or a retiring teardown holds the handle.
                Err(_) => std::thread::yield_now(),
            }
        }
        self.owners.fetch_add(1, Ordering::Relaxed);
        self.state.store(ALIVE, Ordering::Release);
        true
    }

    /// Drop one owner registration. Returns `true` exactly when this was
    /// the last one; the caller is then responsible for attempting
    /// [`retire`].
    ///
    /// [`retire`]: WeakHandle::retire
    pub fn release(&self) -> bool {
        let prev = self.owners.fetch_sub(1, Ordering::Release);
        debug_assert!(prev != 0, "release without a registered owner");
        if prev != 1 {
            return false;
        }
        // Pairs with the Release decrements of the other owners, so the
        // teardown that follows sees all of their slot reads as finished.
        fence(Ordering::Acquire);
        true
    }

    /// Attempt teardown: clear the slot and enter the terminal `dead` state.
    ///
    /// Makes a single attempt. `None` means the attempt is deferred, not
    /// failed: either a reader currently holds the handle (it registers
    /// itself as an owner, and that owner's own last release re-triggers
    /// teardown), or an owner was registered between the last release and
    /// this call (the value was resurrected), or teardown already completed.
    /// `Some(value)` makes the caller the unique teardown owner; no later
    /// `acquire` will see the value again.
    pub fn retire(&self) -> Option<T> {
        if self
            .state
            .compare_exchange(ALIVE, IN_USE, Ordering::Acquire, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        if self.owners.load(Ordering::Acquire) > 0 {
            // Resurrected; the registered owner's release retries.
            self.state.store(ALIVE, Ordering::Release);
            return None;
        }
        // Exclusive and ownerless. Clearing the slot and entering `dead`
        // happen inside the same in-use window, so readers observe either a
        // populated, live handle or a dead one, never a half-cleared state.
        let value = unsafe { (*self.slot.get()).take() };
        self.state.store(DEAD, Ordering::Release);
        value
    }

    /// Whether teardown has completed. A `false` answer is advisory: the
    /// handle may die immediately afterwards.
    pub fn is_dead(&self) -> bool {
        self.state.load(Ordering::Acquire) == DEAD
    }

    /// Register one more owner on a handle that already has one.
    ///
    /// The existing registration keeps teardown from completing, so no
    /// state transition is needed.
    pub(crate) fn retain(&self) {
        let prev = self.owners.fetch_add(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "retain requires an existing owner");
    }

    /// Read the slot without checking liveness.
    ///
    /// # Safety
    ///
    /// The caller must hold an owner registration for the whole lifetime of
    /// the returned reference; the slot stays populated while the owner
    /// count is above zero.
    pub(crate) unsafe fn value_unchecked(&self) -> &T {
        (*self.slot.get())
            .as_ref()
            .expect("slot is populated while owners are registered")
    }
}

impl<T> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.load(Ordering::Acquire) {
            ALIVE => "alive",
            IN_USE => "in-use",
            _ => "dead",
        };
        f.debug_struct("WeakHandle")
            .field("state", &state)
            .field("owners", &self.owners.load(Ordering::Acquire))
            .finish()
    }
}
