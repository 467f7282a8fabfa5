//! Listener types for the reactive system.
//!
//! A Listener is an externally registered callback that receives the batch of
//! change records reported at the node it is attached to.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::Change;

/// Unique identifier for a listener.
///
/// The propagation pass uses this ID to fire each listener at most once, even
/// when the listener is registered on several nodes reached by the same
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

type Callback = Arc<dyn Fn(&[Change]) + Send + Sync>;

/// An update callback with a stable identity.
///
/// Cloning keeps the identity, so a clone registered on another node counts
/// as the same listener.
#[derive(Clone)]
pub struct Listener {
    id: ListenerId,
    callback: Callback,
}

impl Listener {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&[Change]) + Send + Sync + 'static,
    {
        Self {
            id: ListenerId::new(),
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Invoke the callback. A panic inside it is contained and reported as
    /// `false` so that sibling listeners and ancestors still run.
    pub(crate) fn notify(&self, changes: &[Change]) -> bool {
        catch_unwind(AssertUnwindSafe(|| (self.callback)(changes))).is_ok()
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}
