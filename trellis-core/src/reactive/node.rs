//! Reactive Node
//!
//! A `Reactive` is the unit of live state. It wraps one value and reports
//! every mutation of that value, and of anything below it, as change
//! records.
//!
//! # How Nodes Work
//!
//! 1. A primitive is stored directly. The node has no children.
//!
//! 2. An object or a sequence is split into one child node per key or
//!    element. The parent adopts each child, which records the edge on both
//!    sides of the ownership graph.
//!
//! 3. A write produces change records at the node where it happens and hands
//!    them to `trigger_update`, which walks the reverse edges upward.
//!
//! # Locking
//!
//! Each node sits behind its own `RwLock`. A lock is only ever held for the
//! duration of one node's bookkeeping: never while another node is locked
//! and never while a listener runs. Listeners are therefore free to read or
//! write any node, including the one that notified them.
//!
//! Writers additionally hold the node's edit mutex from the moment they read
//! the current contents until the new contents are committed, so concurrent
//! writers on one node apply one after the other instead of diffing against
//! stale state. The edit mutex is released before propagation starts and is
//! never held while taking another node's edit mutex.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

use super::{Change, Key, Listener, ListenerId, Slot};
use crate::error::{Error, Result};
use crate::graph::{NodeId, Parents};
use crate::value::{Classifier, Kind, Value};

/// Shared storage behind every handle to one node.
pub(crate) struct NodeCell {
    state: RwLock<NodeInner>,
    edit: Mutex<()>,
}

impl NodeCell {
    fn new(inner: NodeInner) -> Self {
        Self {
            state: RwLock::new(inner),
            edit: Mutex::new(()),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, NodeInner> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, NodeInner> {
        self.state.write()
    }
}

/// What a node currently holds.
pub(crate) enum Content {
    Primitive(Value),
    Object,
    Sequence { len: usize },
}

impl Content {
    pub(crate) fn kind(&self) -> Kind {
        match self {
            Content::Primitive(_) => Kind::Primitive,
            Content::Object => Kind::Object,
            Content::Sequence { .. } => Kind::Sequence,
        }
    }
}

pub(crate) struct NodeInner {
    pub(crate) content: Content,
    /// Forward edges. Objects use `Key::Name`, sequences `Key::Index`
    /// below `len`; a missing index is a hole.
    pub(crate) children: IndexMap<Key, Reactive>,
    /// Reverse edges.
    pub(crate) parents: Parents,
    pub(crate) listeners: Vec<Listener>,
    pub(crate) classifier: Arc<Classifier>,
}

/// A read-only copy of a node's structure, taken under one lock.
pub(crate) enum Layout {
    Primitive(Value),
    Object(Vec<(Key, Reactive)>),
    /// Bound positions in ascending order; positions below `len` that are
    /// missing are holes.
    Sequence {
        len: usize,
        slots: Vec<(usize, Reactive)>,
    },
}

/// Handle to a live node.
///
/// Cloning is cheap and yields another handle to the same node; equality
/// is node identity.
#[derive(Clone)]
pub struct Reactive {
    id: NodeId,
    pub(crate) cell: Arc<NodeCell>,
}

impl Reactive {
    /// Wrap `value` in a new tree with its own classifier.
    ///
    /// A `Value::Node` is returned as is instead of being wrapped again.
    pub fn new(value: impl Into<Value>) -> Result<Self> {
        Self::with_classifier(value, Arc::new(Classifier::new()))
    }

    /// Like `new`, registering `on_update` as the first listener.
    pub fn with_listener<F>(value: impl Into<Value>, on_update: F) -> Result<Self>
    where
        F: Fn(&[Change]) + Send + Sync + 'static,
    {
        let node = Self::new(value)?;
        node.on_update(on_update);
        Ok(node)
    }

    /// Wrap `value` using `classifier` for it and every node created below.
    pub fn with_classifier(value: impl Into<Value>, classifier: Arc<Classifier>) -> Result<Self> {
        match value.into() {
            Value::Node(node) => Ok(node),
            value => {
                let resolved = classifier.resolve(value)?;
                Ok(Self::build(resolved, &classifier))
            }
        }
    }

    /// Build a node from a value that has already been resolved.
    ///
    /// Construction is not a change, so nothing is reported.
    pub(crate) fn build(value: Value, classifier: &Arc<Classifier>) -> Self {
        if let Value::Node(node) = value {
            return node;
        }
        let node = Self {
            id: NodeId::new(),
            cell: Arc::new(NodeCell::new(NodeInner {
                content: Content::Primitive(Value::Null),
                children: IndexMap::new(),
                parents: Parents::default(),
                listeners: Vec::new(),
                classifier: Arc::clone(classifier),
            })),
        };
        node.install(value);
        node
    }

    /// Replace the content with a resolved value. The node must have no
    /// children left.
    fn install(&self, value: Value) {
        let classifier = self.classifier();
        match value {
            Value::Array(items) => {
                self.cell.write().content = Content::Sequence { len: items.len() };
                for (index, item) in items.into_iter().enumerate() {
                    self.bind(Key::Index(index), Self::build(item, &classifier));
                }
            }
            Value::Object(entries) => {
                self.cell.write().content = Content::Object;
                for (name, item) in entries {
                    self.bind(Key::Name(name), Self::build(item, &classifier));
                }
            }
            Value::Node(other) => self.graft(&other),
            // Resolved values carry no custom payloads.
            primitive => self.cell.write().content = Content::Primitive(primitive),
        }
    }

    /// Take over `other`'s current contents, sharing its children.
    fn graft(&self, other: &Reactive) {
        match other.layout() {
            Layout::Primitive(value) => self.cell.write().content = Content::Primitive(value),
            Layout::Object(children) => {
                self.cell.write().content = Content::Object;
                for (key, child) in children {
                    self.bind(key, child);
                }
            }
            Layout::Sequence { len, slots } => {
                self.cell.write().content = Content::Sequence { len };
                for (index, child) in slots {
                    self.bind(Key::Index(index), child);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------------

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn downgrade(&self) -> Weak<NodeCell> {
        Arc::downgrade(&self.cell)
    }

    pub(crate) fn upgrade(id: NodeId, cell: &Weak<NodeCell>) -> Option<Self> {
        cell.upgrade().map(|cell| Self { id, cell })
    }

    pub fn classifier(&self) -> Arc<Classifier> {
        Arc::clone(&self.cell.read().classifier)
    }

    /// Exclusive right to restructure this node. Hold it across reading the
    /// current contents and committing the new ones, and drop it before
    /// calling `trigger_update`.
    pub(crate) fn edit(&self) -> MutexGuard<'_, ()> {
        self.cell.edit.lock()
    }

    // ------------------------------------------------------------------------
    // Read / write
    // ------------------------------------------------------------------------

    /// The exposed value: the scalar for a primitive node, a live handle to
    /// this node otherwise.
    pub fn get(&self) -> Value {
        match &self.cell.read().content {
            Content::Primitive(value) => value.clone(),
            _ => Value::Node(self.clone()),
        }
    }

    /// Replace this node's value.
    ///
    /// A write of an equal primitive, or of this node itself, is a no-op.
    /// Any other write detaches every current child, installs the new value
    /// and reports one change at the empty path. Complex values are never
    /// compared deeply: a new object with the same contents still counts as
    /// a change.
    ///
    /// Writing another live node copies its scalar or shares its children.
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let Value::Node(other) = &value {
            if other.ptr_eq(self) {
                return Ok(());
            }
        }
        let resolved = self.classifier().resolve(value)?;

        let incoming = match &resolved {
            Value::Node(other) => other.primitive_value(),
            plain if plain.is_primitive() => Some(plain.clone()),
            _ => None,
        };
        let change = {
            let _edit = self.edit();
            if let (Some(current), Some(incoming)) = (self.primitive_value(), incoming) {
                if current == incoming {
                    return Ok(());
                }
            }

            let old = self.snapshot();
            self.detach_all();
            self.install(resolved);
            Change::root(Slot::Present(self.snapshot()), Slot::Present(old))
        };
        self.trigger_update(vec![change]);
        Ok(())
    }

    /// Whether storing `value` in this node's slot would change nothing:
    /// it is this very node, or an equal primitive over a primitive node.
    pub(crate) fn holds(&self, value: &Value) -> bool {
        match value {
            Value::Node(other) => other.ptr_eq(self),
            plain if plain.is_primitive() => self.primitive_value().as_ref() == Some(plain),
            _ => false,
        }
    }

    pub fn kind(&self) -> Kind {
        self.cell.read().content.kind()
    }

    pub fn is_primitive(&self) -> bool {
        self.kind() == Kind::Primitive
    }

    /// The stored scalar, for primitive nodes.
    pub fn primitive_value(&self) -> Option<Value> {
        match &self.cell.read().content {
            Content::Primitive(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Element count for sequences, key count for objects, zero for
    /// primitives.
    pub fn len(&self) -> usize {
        let inner = self.cell.read();
        match inner.content {
            Content::Primitive(_) => 0,
            Content::Object => inner.children.len(),
            Content::Sequence { len } => len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn layout(&self) -> Layout {
        let inner = self.cell.read();
        match &inner.content {
            Content::Primitive(value) => Layout::Primitive(value.clone()),
            Content::Object => Layout::Object(
                inner
                    .children
                    .iter()
                    .map(|(key, child)| (key.clone(), child.clone()))
                    .collect(),
            ),
            Content::Sequence { len } => {
                let mut slots: Vec<(usize, Reactive)> = inner
                    .children
                    .iter()
                    .filter_map(|(key, child)| match key {
                        Key::Index(index) => Some((*index, child.clone())),
                        _ => None,
                    })
                    .collect();
                slots.sort_unstable_by_key(|(index, _)| *index);
                Layout::Sequence { len: *len, slots }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Ownership graph
    // ------------------------------------------------------------------------

    /// The key as this node's shape spells it.
    pub(crate) fn normalize(&self, key: Key) -> Key {
        match self.kind() {
            Kind::Sequence => key.into_position(),
            _ => key.into_name(),
        }
    }

    /// The child held under `key`.
    pub fn child(&self, key: impl Into<Key>) -> Option<Reactive> {
        let key = self.normalize(key.into());
        self.cell.read().children.get(&key).cloned()
    }

    /// The forward edges of this node.
    pub fn children(&self) -> Vec<(Key, Reactive)> {
        self.cell
            .read()
            .children
            .iter()
            .map(|(key, child)| (key.clone(), child.clone()))
            .collect()
    }

    /// Keys under which `parent` holds this node.
    pub fn parent_keys(&self, parent: &Reactive) -> Vec<Key> {
        self.cell.read().parents.keys_for(parent.id)
    }

    /// Number of distinct nodes holding this node.
    pub fn parent_count(&self) -> usize {
        self.cell.read().parents.len()
    }

    /// Store `value` under `key` without reporting a change.
    ///
    /// Any child already under `key` is disowned in the same step. On a
    /// sequence, `key` must name an existing position.
    pub fn adopt(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<Reactive> {
        let classifier = self.classifier();
        let resolved = classifier.resolve(value.into())?;
        let _edit = self.edit();
        let key = self.normalize(key.into());
        {
            let inner = self.cell.read();
            match (&inner.content, &key) {
                (Content::Primitive(_), _) => {
                    return Err(Error::WrongKind {
                        expected: Kind::Object,
                        found: Kind::Primitive,
                    })
                }
                (Content::Sequence { len }, Key::Index(index)) if index >= len => {
                    return Err(Error::IndexOutOfRange {
                        index: *index,
                        len: *len,
                    })
                }
                (Content::Sequence { .. }, Key::Index(_)) | (Content::Object, _) => {}
                (content, _) => {
                    return Err(Error::InvalidKey {
                        key: key.clone(),
                        kind: content.kind(),
                    })
                }
            }
        }
        let child = Self::build(resolved, &classifier);
        self.bind(key, child.clone());
        Ok(child)
    }

    /// Remove the child under `key` without reporting a change.
    ///
    /// Only the `(self, key)` edge goes away: the child keeps its other
    /// parents and its own children. On a sequence this leaves a hole.
    pub fn disown(&self, key: impl Into<Key>) -> Option<Reactive> {
        let _edit = self.edit();
        let key = self.normalize(key.into());
        self.unbind(&key)
    }

    /// Set the forward and reverse edge for `(self, key)`, returning the
    /// child it replaced.
    pub(crate) fn bind(&self, key: Key, child: Reactive) -> Option<Reactive> {
        let previous = self.cell.write().children.insert(key.clone(), child.clone());
        if let Some(previous) = &previous {
            previous.detach_from(self.id, &key);
        }
        child.attach_to(self, key.clone());
        trace!(parent = ?self.id, child = ?child.id, %key, "adopt");
        previous
    }

    /// Remove the forward and reverse edge for `(self, key)`.
    pub(crate) fn unbind(&self, key: &Key) -> Option<Reactive> {
        let removed = self.cell.write().children.shift_remove(key);
        if let Some(child) = &removed {
            child.detach_from(self.id, key);
            trace!(parent = ?self.id, child = ?child.id, %key, "disown");
        }
        removed
    }

    /// Disown every child.
    fn detach_all(&self) {
        let children: Vec<(Key, Reactive)> = self.cell.write().children.drain(..).collect();
        for (key, child) in children {
            child.detach_from(self.id, &key);
            trace!(parent = ?self.id, child = ?child.id, %key, "disown");
        }
    }

    pub(crate) fn attach_to(&self, parent: &Reactive, key: Key) {
        self.cell.write().parents.add(parent, key);
    }

    pub(crate) fn detach_from(&self, parent: NodeId, key: &Key) {
        self.cell.write().parents.remove(parent, key);
    }

    // ------------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------------

    /// Register `listener` on this node. Registering the same listener twice
    /// on one node has no extra effect.
    pub fn add_listener(&self, listener: &Listener) -> ListenerId {
        let mut inner = self.cell.write();
        if !inner.listeners.iter().any(|l| l.id() == listener.id()) {
            inner.listeners.push(listener.clone());
        }
        listener.id()
    }

    /// Register a callback for changes at or below this node.
    pub fn on_update<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&[Change]) + Send + Sync + 'static,
    {
        self.add_listener(&Listener::new(callback))
    }

    /// Returns whether the listener was registered here.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.cell.write();
        let before = inner.listeners.len();
        inner.listeners.retain(|l| l.id() != id);
        inner.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.cell.read().listeners.len()
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Reactive {}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.cell.read();
        let mut out = f.debug_struct("Reactive");
        out.field("id", &self.id);
        match &inner.content {
            Content::Primitive(value) => out.field("value", value),
            Content::Object => out.field("keys", &inner.children.len()),
            Content::Sequence { len } => out.field("len", len),
        };
        out.field("parents", &inner.parents.len())
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

/// Wrap `value` in a live node and register `on_update` on it.
pub fn create_reactive<F>(value: impl Into<Value>, on_update: F) -> Result<Reactive>
where
    F: Fn(&[Change]) + Send + Sync + 'static,
{
    Reactive::with_listener(value, on_update)
}
