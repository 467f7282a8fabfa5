//! Change records.
//!
//! A change record says that the value reached by `path` went from `old` to
//! `new`. Paths are relative to the node that reports the record: each hop
//! up the ownership graph prepends the key under which the child is held.

use std::fmt;

use smallvec::SmallVec;

use super::Reactive;
use crate::value::Value;

/// A key under which a node holds a child.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// An object property.
    Name(String),
    /// A sequence position.
    Index(usize),
    /// The element count of a sequence.
    Length,
}

impl Key {
    /// The object form of this key.
    pub(crate) fn into_name(self) -> Key {
        match self {
            Key::Name(_) => self,
            other => Key::Name(other.to_string()),
        }
    }

    /// The sequence form of this key: `"length"` and canonical decimal names
    /// map to their dedicated variants. Signs, leading zeros and the like
    /// stay names.
    pub(crate) fn into_position(self) -> Key {
        match self {
            Key::Name(name) if name == "length" => Key::Length,
            Key::Name(name) => match canonical_index(&name) {
                Some(index) => Key::Index(index),
                None => Key::Name(name),
            },
            other => other,
        }
    }
}

/// The index spelled by `name`, if `name` is exactly how that index prints.
fn canonical_index(name: &str) -> Option<usize> {
    let digits = name.bytes().all(|b| b.is_ascii_digit());
    let padded = name.len() > 1 && name.starts_with('0');
    if name.is_empty() || !digits || padded {
        return None;
    }
    name.parse().ok()
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
            Key::Length => f.write_str("length"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

/// Keys from the reporting node down to the mutated slot.
pub type KeyPath = SmallVec<[Key; 4]>;

/// One side of a change: a value, or the absence of the slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    NotPresent,
    Present(Value),
}

/// The slot did not exist before, or no longer exists after, the change.
pub const NOT_PRESENT: Slot = Slot::NotPresent;

impl Slot {
    pub fn present(value: impl Into<Value>) -> Self {
        Slot::Present(value.into())
    }

    /// A detached snapshot of `node`.
    pub fn of(node: &Reactive) -> Self {
        Slot::Present(node.snapshot())
    }

    /// A snapshot of `node`, or `NotPresent` for an empty slot.
    pub fn of_node(node: Option<&Reactive>) -> Self {
        node.map_or(Slot::NotPresent, Slot::of)
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Slot::Present(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Slot::Present(value) => Some(value),
            Slot::NotPresent => None,
        }
    }
}

/// A single observed difference.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub path: KeyPath,
    pub new: Slot,
    pub old: Slot,
}

impl Change {
    pub fn new<K: Into<Key>>(path: impl IntoIterator<Item = K>, new: Slot, old: Slot) -> Self {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            new,
            old,
        }
    }

    /// A change of the reporting node's own value.
    pub fn root(new: Slot, old: Slot) -> Self {
        Self {
            path: KeyPath::new(),
            new,
            old,
        }
    }

    /// A change of one direct child slot.
    pub fn at(key: Key, new: Slot, old: Slot) -> Self {
        let mut path = KeyPath::new();
        path.push(key);
        Self { path, new, old }
    }

    /// This change as seen from a parent that holds the reporter under `key`.
    pub fn prefixed(&self, key: &Key) -> Self {
        let mut path = KeyPath::with_capacity(self.path.len() + 1);
        path.push(key.clone());
        path.extend(self.path.iter().cloned());
        Self {
            path,
            new: self.new.clone(),
            old: self.old.clone(),
        }
    }

    /// Whether the path equals `keys`.
    pub fn is_at<K>(&self, keys: &[K]) -> bool
    where
        K: Clone + Into<Key>,
    {
        self.path.len() == keys.len()
            && self
                .path
                .iter()
                .zip(keys)
                .all(|(have, want)| *have == want.clone().into())
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, key) in self.path.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{key}")?;
        }
        f.write_str("] ")?;
        match (&self.old, &self.new) {
            (Slot::NotPresent, Slot::Present(_)) => f.write_str("inserted"),
            (Slot::Present(_), Slot::NotPresent) => f.write_str("removed"),
            _ => f.write_str("changed"),
        }
    }
}
