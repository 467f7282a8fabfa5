//! Reactive Nodes
//!
//! This module implements the live containers and the machinery that reports
//! their mutations.
//!
//! # Concepts
//!
//! ## Nodes
//!
//! A `Reactive` wraps one value. Primitives are stored directly; objects and
//! sequences are split into child nodes, one per key or element, linked
//! through the ownership graph (see `crate::graph`).
//!
//! ## Change records
//!
//! Every effective write produces `Change` records: a key path from the
//! reporting node down to the mutated slot, plus the new and old value.
//! `NOT_PRESENT` marks a slot that appeared or disappeared.
//!
//! ## Listeners
//!
//! A `Listener` receives the batch of records reported at the node it is
//! attached to, including changes that happened anywhere below it.
//!
//! # Implementation Notes
//!
//! Propagation is synchronous: a write returns only after every affected
//! listener has run. Each write is one propagation pass, during which any
//! listener fires at most once. A write issued from inside a listener is
//! applied at once but propagated in a follow-up pass, in the order such
//! writes were made.

mod change;
mod listener;
mod node;
mod pass;
mod propagate;

pub use change::{Change, Key, KeyPath, Slot, NOT_PRESENT};
pub use listener::{Listener, ListenerId};
pub use node::{create_reactive, Reactive};
pub use pass::is_propagating;

pub(crate) use node::{Content, Layout, NodeCell};
