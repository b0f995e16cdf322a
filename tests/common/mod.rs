// Shared helpers for the integration suites.
//
// Cleanup runs on detached threads, so assertions about destroy counts
// poll with a bounded deadline instead of assuming a schedule.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use weak_cache::Destroy;

/// A value that counts its `destroy` invocations. Plain drops (for
/// candidates discarded by a canonicalizing insert) do not count.
#[derive(Debug)]
pub struct Tracked {
    pub id: u32,
    destroyed: Arc<AtomicUsize>,
}

impl Tracked {
    pub fn new(id: u32) -> (Self, Arc<AtomicUsize>) {
        let destroyed = Arc::new(AtomicUsize::new(0));
        (
            Self {
                id,
                destroyed: Arc::clone(&destroyed),
            },
            destroyed,
        )
    }
}

impl Destroy for Tracked {
    fn destroy(self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn destroy_count(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Poll until `pred` holds or the deadline passes; returns the final
/// answer either way.
pub fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    pred()
}

pub const DESTROY_WAIT: Duration = Duration::from_secs(5);
