//! # Definitions
//!
//! A [`Definition`] is the serializable description of one exposed context:
//! its methods, properties, and the events it may emit. Definitions are
//! created when a context is attached, are immutable once created, and are
//! identified by an id that is never reused while the owning process is
//! alive. Changing a context's shape requires detach + reattach, which
//! issues a new id.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Metadata for one exposed method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodMeta {
    /// Argument count hint, when the context declares one.
    pub arity: Option<usize>,
    /// Whether the method returns a value or is fire-and-forget.
    pub returns: bool,
}

/// Metadata for one exposed property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMeta {
    pub readable: bool,
    pub writable: bool,
}

/// The callable surface of a context, as supplied by the application when
/// implementing [`crate::registry::Context::shape`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextShape {
    pub methods: BTreeMap<String, MethodMeta>,
    pub properties: BTreeMap<String, PropertyMeta>,
    pub events: BTreeSet<String>,
}

impl ContextShape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a method.
    pub fn method(mut self, name: &str, arity: Option<usize>, returns: bool) -> Self {
        self.methods
            .insert(name.to_string(), MethodMeta { arity, returns });
        self
    }

    /// Declare a property.
    pub fn property(mut self, name: &str, readable: bool, writable: bool) -> Self {
        self.properties
            .insert(name.to_string(), PropertyMeta { readable, writable });
        self
    }

    /// Declare an event this context may emit.
    pub fn event(mut self, name: &str) -> Self {
        self.events.insert(name.to_string());
        self
    }
}

/// Serializable description of one exposed context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    /// Unique per-owning-netron identifier, never reused in-process.
    pub id: u64,
    /// Context name used for lookup.
    pub name: String,
    pub methods: BTreeMap<String, MethodMeta>,
    pub properties: BTreeMap<String, PropertyMeta>,
    pub events: BTreeSet<String>,
}

impl Definition {
    pub fn new(id: u64, name: &str, shape: ContextShape) -> Self {
        Self {
            id,
            name: name.to_string(),
            methods: shape.methods,
            properties: shape.properties,
            events: shape.events,
        }
    }

    pub fn method(&self, name: &str) -> Option<&MethodMeta> {
        self.methods.get(name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyMeta> {
        self.properties.get(name)
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events.contains(name)
    }
}
