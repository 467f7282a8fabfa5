//! Structural Wrappers
//!
//! A structural wrapper turns reads, writes and deletes on a complex node
//! into ownership-graph updates plus change records. There is one wrapper
//! per shape:
//!
//! - `ObjectShape` for string-keyed objects
//! - `SequenceShape` for positional sequences, which also provides the
//!   list mutators (`push`, `pop`, `shift`, `unshift`, `splice`, `sort_by`,
//!   `reverse`, `fill`, `remove`, `set_len`) as methods on `Reactive`
//!
//! `Reactive::get_key`, `set_key` and `delete_key` pick the wrapper from
//! the node's current kind.

mod object;
mod sequence;

pub use object::ObjectShape;
pub use sequence::SequenceShape;

use crate::error::{Error, Result};
use crate::reactive::{Key, Reactive};
use crate::value::{Kind, Value};

/// Keyed access to a complex node.
///
/// Every operation validates its arguments before it touches the node, and
/// reports its change records through `Reactive::trigger_update`.
pub trait Structure {
    /// The exposed value under `key`: a scalar, or a live handle for a
    /// complex child.
    fn get(node: &Reactive, key: Key) -> Option<Value>;

    /// Store `value` under `key`.
    fn set(node: &Reactive, key: Key, value: Value) -> Result<()>;

    /// Remove the value under `key`, returning its exposed value.
    fn delete(node: &Reactive, key: Key) -> Result<Option<Value>>;
}

impl Reactive {
    pub fn get_key(&self, key: impl Into<Key>) -> Result<Option<Value>> {
        match self.kind() {
            Kind::Object => Ok(ObjectShape::get(self, key.into())),
            Kind::Sequence => Ok(SequenceShape::get(self, key.into())),
            Kind::Primitive => Err(not_a_container()),
        }
    }

    pub fn set_key(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        match self.kind() {
            Kind::Object => ObjectShape::set(self, key.into(), value.into()),
            Kind::Sequence => SequenceShape::set(self, key.into(), value.into()),
            Kind::Primitive => Err(not_a_container()),
        }
    }

    pub fn delete_key(&self, key: impl Into<Key>) -> Result<Option<Value>> {
        match self.kind() {
            Kind::Object => ObjectShape::delete(self, key.into()),
            Kind::Sequence => SequenceShape::delete(self, key.into()),
            Kind::Primitive => Err(not_a_container()),
        }
    }
}

fn not_a_container() -> Error {
    Error::WrongKind {
        expected: Kind::Object,
        found: Kind::Primitive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_follows_the_current_kind() {
        let node = Reactive::new(Value::object([("a", 1)])).unwrap();
        assert_eq!(node.get_key("a").unwrap(), Some(Value::from(1)));

        node.set(Value::array(["x"])).unwrap();
        assert_eq!(node.get_key(0usize).unwrap(), Some(Value::from("x")));
        assert_eq!(node.get_key("length").unwrap(), Some(Value::from(1)));

        node.set(3).unwrap();
        assert!(matches!(node.get_key("a"), Err(Error::WrongKind { .. })));
        assert!(matches!(node.set_key("a", 1), Err(Error::WrongKind { .. })));
        assert!(matches!(node.delete_key("a"), Err(Error::WrongKind { .. })));
    }
}
