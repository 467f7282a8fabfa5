//! Change Propagation
//!
//! `trigger_update` is the core update propagation mechanism. Given a batch
//! of change records at a node, it delivers to every node above it the
//! records as seen from there: each hop up the ownership graph prepends the
//! key under which the child is held.
//!
//! # How a Pass Works
//!
//! 1. **Discover.** Walk the reverse edges from the origin and collect every
//!    reachable ancestor, together with its parents and its listeners.
//!
//! 2. **Fold.** Starting at the origin, hand each node's batch to its
//!    parents, re-keyed once per key the parent holds it under. A parent is
//!    only folded further once every reached child has contributed, so a
//!    node reachable along several paths (a diamond in the ownership graph)
//!    ends up with the records of all of them in one batch.
//!
//! 3. **Notify.** Parents before children, in parent registration order,
//!    every node's listeners receive its batch. A listener registered on
//!    several reached nodes runs once, with the batch of the first of them.
//!
//! All bookkeeping lives in the pass, not in the nodes, and is discarded when
//! the pass ends.

use std::collections::{HashMap, HashSet, VecDeque};
use std::mem;

use tracing::{debug, trace};

use super::pass::{self, PassGuard};
use super::{Change, Key, Listener, ListenerId, Reactive};
use crate::graph::NodeId;

/// A node reached by a pass.
struct Visit {
    /// Parent positions in `Pass::visits`, with the keys they hold this
    /// node under, in registration order.
    parents: Vec<(usize, Vec<Key>)>,
    listeners: Vec<Listener>,
    /// Reached children whose records have not been folded in yet.
    pending: usize,
    batch: Vec<Change>,
    folded: bool,
    notified: bool,
}

/// Per-pass bookkeeping. The origin is at position 0.
struct Pass {
    visits: Vec<Visit>,
    notified: HashSet<ListenerId>,
}

impl Reactive {
    /// Report `changes` at this node and propagate them to every ancestor.
    ///
    /// When called while a pass is already running on this thread (from
    /// inside a listener), the batch is queued and propagated as its own
    /// pass right after the current one finishes.
    pub fn trigger_update(&self, changes: Vec<Change>) {
        if changes.is_empty() {
            return;
        }
        if pass::is_propagating() {
            debug!(
                node = ?self.id(),
                changes = changes.len(),
                "write during propagation; deferring"
            );
            pass::defer(self.clone(), changes);
            return;
        }

        let _guard = PassGuard::enter();
        self.run_pass(changes);
        while let Some((node, changes)) = pass::next_deferred() {
            node.run_pass(changes);
        }
    }

    fn run_pass(&self, changes: Vec<Change>) {
        let mut pass = Pass::discover(self);
        trace!(
            origin = ?self.id(),
            changes = changes.len(),
            nodes = pass.visits.len(),
            "propagation pass"
        );
        pass.fold(changes);
        pass.notify(0);
    }
}

impl Pass {
    fn discover(origin: &Reactive) -> Self {
        let mut found = vec![origin.clone()];
        let mut positions: HashMap<NodeId, usize> = HashMap::from([(origin.id(), 0)]);
        let mut visits = Vec::new();

        while let Some(node) = found.get(visits.len()).cloned() {
            let (parents, dead, listeners) = {
                let inner = node.cell.read();
                let (live, dead) = inner.parents.resolve();
                (live, dead, inner.listeners.clone())
            };
            if !dead.is_empty() {
                debug!(node = ?node.id(), dead = dead.len(), "pruning dropped parents");
                node.cell.write().parents.prune(&dead);
            }

            let parents = parents
                .into_iter()
                .map(|(parent, keys)| {
                    let position = *positions.entry(parent.id()).or_insert_with(|| {
                        found.push(parent);
                        found.len() - 1
                    });
                    (position, keys)
                })
                .collect();
            visits.push(Visit {
                parents,
                listeners,
                pending: 0,
                batch: Vec::new(),
                folded: false,
                notified: false,
            });
        }

        let edges: Vec<usize> = visits
            .iter()
            .flat_map(|visit| visit.parents.iter().map(|(parent, _)| *parent))
            .collect();
        for parent in edges {
            visits[parent].pending += 1;
        }

        Self {
            visits,
            notified: HashSet::new(),
        }
    }

    fn fold(&mut self, changes: Vec<Change>) {
        self.visits[0].batch = changes;
        let mut ready = VecDeque::from([0]);

        loop {
            let current = match ready.pop_front() {
                Some(current) => current,
                // Only a cycle leaves nodes waiting on a child that can never
                // finish first; release the earliest discovered one.
                None => match self.visits.iter().position(|visit| !visit.folded) {
                    Some(current) => current,
                    None => break,
                },
            };
            if mem::replace(&mut self.visits[current].folded, true) {
                continue;
            }

            let batch = mem::take(&mut self.visits[current].batch);
            let parents = mem::take(&mut self.visits[current].parents);
            for (parent, keys) in &parents {
                let target = &mut self.visits[*parent];
                if target.folded {
                    continue;
                }
                target.batch.extend(
                    keys.iter()
                        .flat_map(|key| batch.iter().map(move |change| change.prefixed(key))),
                );
                target.pending = target.pending.saturating_sub(1);
                if target.pending == 0 {
                    ready.push_back(*parent);
                }
            }
            self.visits[current].batch = batch;
            self.visits[current].parents = parents;
        }
    }

    fn notify(&mut self, position: usize) {
        if mem::replace(&mut self.visits[position].notified, true) {
            return;
        }
        for edge in 0..self.visits[position].parents.len() {
            let parent = self.visits[position].parents[edge].0;
            self.notify(parent);
        }

        let visit = &self.visits[position];
        if visit.batch.is_empty() {
            return;
        }
        for listener in &visit.listeners {
            if self.notified.insert(listener.id()) {
                // Failures are contained inside `notify`; keep going.
                listener.notify(&visit.batch);
            }
        }
    }
}
