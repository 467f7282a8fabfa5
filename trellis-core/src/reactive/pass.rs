//! Propagation Pass Context
//!
//! Tracks whether a propagation pass is running on the current thread.
//! This is what makes writes from inside a listener safe: the write itself
//! is applied immediately, but its propagation is queued and runs as its own
//! pass once the in-flight pass has finished.
//!
//! # Implementation
//!
//! We use a thread-local depth counter plus a FIFO queue of deferred
//! batches. Entering a pass returns a guard; the guard decrements the depth
//! on drop, which keeps the state correct even if propagation unwinds.

use std::cell::RefCell;
use std::collections::VecDeque;

use super::{Change, Reactive};

thread_local! {
    static PASS_STATE: RefCell<PassState> = RefCell::new(PassState::default());
}

#[derive(Default)]
struct PassState {
    /// Number of passes currently on the stack.
    depth: usize,
    /// Batches whose propagation was requested during a pass.
    deferred: VecDeque<(Reactive, Vec<Change>)>,
}

/// Guard that marks a propagation pass as in flight.
pub(crate) struct PassGuard {
    _private: (),
}

impl PassGuard {
    pub(crate) fn enter() -> Self {
        PASS_STATE.with(|state| state.borrow_mut().depth += 1);
        Self { _private: () }
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        PASS_STATE.with(|state| {
            let mut state = state.borrow_mut();
            state.depth = state.depth.saturating_sub(1);
            // Anything left over belongs to a pass that unwound.
            if state.depth == 0 {
                state.deferred.clear();
            }
        });
    }
}

/// Whether a propagation pass is running on this thread.
pub fn is_propagating() -> bool {
    PASS_STATE.with(|state| state.borrow().depth > 0)
}

/// Queue a batch to propagate after the current pass.
pub(crate) fn defer(node: Reactive, changes: Vec<Change>) {
    PASS_STATE.with(|state| state.borrow_mut().deferred.push_back((node, changes)));
}

/// Take the oldest deferred batch, if any.
pub(crate) fn next_deferred() -> Option<(Reactive, Vec<Change>)> {
    PASS_STATE.with(|state| state.borrow_mut().deferred.pop_front())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::NOT_PRESENT;

    #[test]
    fn guard_tracks_activity() {
        assert!(!is_propagating());

        {
            let _pass = PassGuard::enter();
            assert!(is_propagating());

            {
                let _nested = PassGuard::enter();
                assert!(is_propagating());
            }

            // Still inside the outer pass
            assert!(is_propagating());
        }

        assert!(!is_propagating());
    }

    #[test]
    fn deferred_batches_are_fifo() {
        let first = Reactive::new(1).unwrap();
        let second = Reactive::new(2).unwrap();
        let _pass = PassGuard::enter();

        defer(first.clone(), vec![Change::root(NOT_PRESENT, NOT_PRESENT)]);
        defer(second.clone(), Vec::new());

        let (node, changes) = next_deferred().unwrap();
        assert!(node.ptr_eq(&first));
        assert_eq!(changes.len(), 1);
        assert!(next_deferred().unwrap().0.ptr_eq(&second));
        assert!(next_deferred().is_none());
    }

    #[test]
    fn leaving_the_outermost_pass_drops_leftovers() {
        {
            let _pass = PassGuard::enter();
            defer(Reactive::new(0).unwrap(), Vec::new());
        }
        assert!(next_deferred().is_none());
    }
}
