//! Trellis Core
//!
//! This crate provides fine-grained reactive state containers. It
//! implements:
//!
//! - Reactive nodes wrapping primitives, objects and sequences
//! - An ownership graph linking every complex value to its parents
//! - Synchronous change propagation with per-pass listener dedup
//! - Structural wrappers for keyed and positional mutation
//! - Plain snapshots, JSON and MessagePack export
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: Plain values, shape classification and custom converters
//! - `reactive`: Nodes, change records, listeners and propagation
//! - `graph`: Reverse (parent) edges of the ownership graph
//! - `shape`: Object and sequence wrappers
//! - `snapshot`: Detached plain copies of a live tree
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use trellis_core::{create_reactive, Key, Slot, Value, NOT_PRESENT};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! let state = create_reactive(
//!     Value::object([("a", Value::from(1)), ("b", Value::array([1, 2, 3]))]),
//!     move |changes| sink.lock().unwrap().extend_from_slice(changes),
//! )?;
//!
//! state.child("b").unwrap().push([4])?;
//!
//! let seen = seen.lock().unwrap();
//! assert!(seen[0].is_at(&[Key::from("b"), Key::Length]));
//! assert_eq!(seen[1].new, Slot::present(4));
//! assert_eq!(seen[1].old, NOT_PRESENT);
//! # Ok::<(), trellis_core::Error>(())
//! ```

pub mod error;
pub mod graph;
pub mod reactive;
pub mod shape;
pub mod snapshot;
pub mod value;

pub use error::{Error, Result};
pub use reactive::{
    create_reactive, is_propagating, Change, Key, KeyPath, Listener, ListenerId, Reactive, Slot,
    NOT_PRESENT,
};
pub use shape::{ObjectShape, SequenceShape, Structure};
pub use snapshot::{to_json, to_msgpack, to_plain};
pub use value::{Classifier, Custom, Kind, Value};
