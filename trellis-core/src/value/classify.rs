//! Value Classifier
//!
//! Decides how a value is stored. Plain values already carry their shape;
//! custom application types are turned into plain values by converter
//! functions registered per Rust type.
//!
//! A classifier is owned by a root node and shared (`Arc`) with every node
//! created beneath it, so two independent trees can register different
//! converters for the same type.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use tracing::debug;

use super::{Kind, Value};
use crate::error::{Error, Result};

/// An application value the engine does not know how to track on its own.
#[derive(Clone)]
pub struct Custom {
    type_id: TypeId,
    type_name: &'static str,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Custom {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            payload: Arc::new(value),
        }
    }

    /// The Rust type name of the payload, used in error messages.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub(crate) fn ptr_eq(&self, other: &Custom) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Debug for Custom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Custom")
            .field("type_name", &self.type_name)
            .finish()
    }
}

type Converter = Arc<dyn Fn(&Custom) -> Option<Value> + Send + Sync>;

/// Registry of converters for custom value types.
#[derive(Default)]
pub struct Classifier {
    converters: DashMap<TypeId, Converter>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the converter for values of type `T`, replacing any previous
    /// one. The converter may return nested plain values, live nodes, or
    /// other custom values that have their own converters.
    pub fn register<T, F>(&self, convert: F)
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        let converter: Converter =
            Arc::new(move |custom: &Custom| custom.downcast_ref::<T>().map(&convert));
        debug!(type_name = type_name::<T>(), "registered custom converter");
        self.converters.insert(TypeId::of::<T>(), converter);
    }

    /// Whether a converter exists for this custom value's type.
    pub fn supports(&self, custom: &Custom) -> bool {
        self.converters.contains_key(&custom.type_id)
    }

    /// The shape `value` will be stored as.
    pub fn classify(&self, value: &Value) -> Result<Kind> {
        match value {
            Value::Custom(custom) => self.classify(&self.convert(custom)?),
            other => Ok(other.kind().unwrap_or(Kind::Primitive)),
        }
    }

    /// Replace every custom value in `value` with its converted form.
    ///
    /// Fails with `UnsupportedValueKind` on the first custom value that has
    /// no converter. Live nodes are left as they are: they were classified
    /// when they were built.
    pub fn resolve(&self, value: Value) -> Result<Value> {
        match value {
            Value::Custom(custom) => self.resolve(self.convert(&custom)?),
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.resolve(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(entries) => entries
                .into_iter()
                .map(|(key, item)| Ok((key, self.resolve(item)?)))
                .collect::<Result<IndexMap<_, _>>>()
                .map(Value::Object),
            other => Ok(other),
        }
    }

    fn convert(&self, custom: &Custom) -> Result<Value> {
        // Clone out of the map so the shard lock is not held while the
        // converter runs.
        let converter = self
            .converters
            .get(&custom.type_id)
            .map(|entry| Arc::clone(entry.value()));
        let converted = converter
            .and_then(|convert| convert(custom))
            .ok_or(Error::UnsupportedValueKind {
                type_name: custom.type_name,
            })?;
        match converted {
            Value::Custom(inner) if inner.type_id == custom.type_id => {
                Err(Error::UnsupportedValueKind {
                    type_name: inner.type_name,
                })
            }
            other => Ok(other),
        }
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("converters", &self.converters.len())
            .finish()
    }
}
