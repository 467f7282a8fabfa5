//! Ownership Graph
//!
//! This module holds the bookkeeping that ties live nodes together.
//!
//! # Overview
//!
//! Every complex node owns its children through a forward map
//! (`key → child`). Every child remembers who owns it through a reverse map
//! (`parent → {keys}`). Both sides are updated together by `adopt` and
//! `disown`, so an edge exists in one map exactly when it exists in the
//! other.
//!
//! The graph is a DAG rather than a tree: the same child may be held under
//! several keys of one parent (for example after a sequence `fill`), or by
//! several parents at once. Each `(parent, key)` edge is tracked on its own,
//! which is what lets a change reach every owner with the right path and
//! lets each owner let go independently.
//!
//! # Design Decisions
//!
//! 1. The graph is distributed across the nodes instead of living in a
//!    central table. A node is a self-contained unit that can be built and
//!    dropped on its own.
//!
//! 2. Forward edges are strong and reverse edges are weak. Dropping the last
//!    handle to a root frees the whole tree below it, while a child that is
//!    still referenced elsewhere survives losing one of its parents.
//!
//! 3. Reverse edges keep parent registration order, which fixes the order in
//!    which changes propagate upward.

mod edges;

pub use edges::NodeId;
pub(crate) use edges::Parents;
