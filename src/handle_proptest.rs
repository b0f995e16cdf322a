#![cfg(test)]

// Property tests for WeakHandle kept inside the crate so they do not
// require feature gates to access internal modules.
//
// A sequential reference model tracks the state machine: `dead` is
// terminal, the owner count gates teardown, and a release that hits zero
// does not by itself kill the value; only a retire that finds the handle
// alive and ownerless does.

use crate::handle::WeakHandle;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Acquire,
    Release,
    Retire,
}

#[derive(Debug)]
struct Model {
    owners: usize,
    dead: bool,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![
            Just(Op::Acquire),
            Just(Op::Release),
            Just(Op::Retire),
        ],
        1..200,
    )
}

proptest! {
    /// For every op sequence, the handle agrees with the model:
    /// - `acquire` succeeds iff not dead, and registers an owner.
    /// - `release` (only issued while owners are registered) signals the
    ///   last owner exactly when the count hits zero.
    /// - `retire` returns the value iff the handle is alive and ownerless,
    ///   after which it is dead forever.
    #[test]
    fn handle_matches_reference_model(ops in arb_ops()) {
        let h = WeakHandle::new(42u32);
        let mut model = Model { owners: 1, dead: false };

        for op in ops {
            match op {
                Op::Acquire => {
                    let got = h.acquire();
                    prop_assert_eq!(got, !model.dead);
                    if got {
                        model.owners += 1;
                    }
                }
                Op::Release => {
                    // Only release owners we actually hold.
                    if model.owners == 0 {
                        continue;
                    }
                    let last = h.release();
                    model.owners -= 1;
                    prop_assert_eq!(last, model.owners == 0);
                }
                Op::Retire => {
                    let won = h.retire();
                    let expect_win = !model.dead && model.owners == 0;
                    prop_assert_eq!(won.is_some(), expect_win);
                    if expect_win {
                        prop_assert_eq!(won, Some(42u32));
                        model.dead = true;
                    }
                }
            }
            prop_assert_eq!(h.is_dead(), model.dead);
        }

        // Drain and tear down; the terminal state must be reachable and
        // observed exactly once.
        while model.owners > 0 {
            let last = h.release();
            model.owners -= 1;
            prop_assert_eq!(last, model.owners == 0);
        }
        if !model.dead {
            prop_assert_eq!(h.retire(), Some(42u32));
        }
        prop_assert!(h.is_dead());
        prop_assert_eq!(h.retire(), None);
        prop_assert!(!h.acquire());
    }

    /// A vacant handle never leaves `dead`, whatever is thrown at it.
    #[test]
    fn vacant_handle_stays_dead(ops in arb_ops()) {
        let h: WeakHandle<u32> = WeakHandle::vacant();
        for op in ops {
            match op {
                Op::Acquire => prop_assert!(!h.acquire()),
                // No owner was ever registered, so there is nothing to
                // release; retire must keep refusing.
                Op::Release => {}
                Op::Retire => prop_assert_eq!(h.retire(), None),
            }
            prop_assert!(h.is_dead());
        }
    }
}
