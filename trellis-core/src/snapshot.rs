//! Serialization Walk
//!
//! Turns a live tree into a detached plain `Value`, and from there into JSON
//! or MessagePack.
//!
//! The walk memoizes by node identity: a node shared under several keys is
//! materialized once and its plain value reused. A node reached again while
//! it is still being materialized is a back-reference (a cycle introduced by
//! adopting an ancestor); it renders as `Null`.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::error::Result;
use crate::graph::NodeId;
use crate::reactive::{Layout, Reactive};
use crate::value::Value;

/// A plain snapshot of `node` and everything below it.
pub fn to_plain(node: &Reactive) -> Value {
    Walk::default().visit(node)
}

/// The snapshot of `node` as a JSON value.
pub fn to_json(node: &Reactive) -> Result<serde_json::Value> {
    to_plain(node).to_json()
}

/// The snapshot of `node` encoded as MessagePack.
pub fn to_msgpack(node: &Reactive) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(&to_plain(node))?)
}

impl Reactive {
    /// A detached plain copy of this node's current value.
    pub fn snapshot(&self) -> Value {
        to_plain(self)
    }
}

#[derive(Default)]
struct Walk {
    done: HashMap<NodeId, Value>,
    active: HashSet<NodeId>,
}

impl Walk {
    fn visit(&mut self, node: &Reactive) -> Value {
        let id = node.id();
        if let Some(value) = self.done.get(&id) {
            return value.clone();
        }
        if !self.active.insert(id) {
            return Value::Null;
        }

        let value = match node.layout() {
            Layout::Primitive(value) => value,
            Layout::Object(children) => {
                let mut entries = IndexMap::with_capacity(children.len());
                for (key, child) in children {
                    entries.insert(key.to_string(), self.visit(&child));
                }
                Value::Object(entries)
            }
            Layout::Sequence { len, slots } => {
                let mut items = vec![Value::Null; len];
                for (index, child) in slots {
                    if let Some(item) = items.get_mut(index) {
                        *item = self.visit(&child);
                    }
                }
                Value::Array(items)
            }
        };

        self.active.remove(&id);
        self.done.insert(id, value.clone());
        value
    }
}
