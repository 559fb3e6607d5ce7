//! # Context Registry
//!
//! Local publication of contexts: definitions describing a context's
//! callable surface, stubs binding definitions to live instances, and the
//! registry mapping names and definition ids to stubs.
//!
//! ## Components
//! - **Definition**: serializable description of methods/properties/events
//! - **Context**: the trait application objects implement to be exposed
//! - **Stub**: server-side binding of a Definition to a live instance
//! - **ContextRegistry**: name/id lookup with attach/detach lifecycle
//!
//! The registry is one of the two cross-session shared resources (the other
//! being the active peer set); it is protected by `RwLock`s since inbound
//! dispatch on any session may race with attach/detach.

pub mod definition;
pub mod stub;

pub use definition::{ContextShape, Definition, MethodMeta, PropertyMeta};
pub use stub::{Context, Stub};

use crate::core::sequencer::LongSequencer;
use crate::error::{NetronError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Arena-style registry of locally published contexts.
///
/// Stubs are reached by integer definition id rather than by direct object
/// reference, keeping ownership acyclic between the manager, peers, and
/// stubs.
pub struct ContextRegistry {
    def_ids: LongSequencer,
    by_name: RwLock<HashMap<String, u64>>,
    stubs: RwLock<HashMap<u64, Arc<Stub>>>,
    /// Ids of detached definitions: lookups distinguish "never existed"
    /// from "existed and was detached".
    retired: RwLock<HashSet<u64>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self {
            def_ids: LongSequencer::new(),
            by_name: RwLock::new(HashMap::new()),
            stubs: RwLock::new(HashMap::new()),
            retired: RwLock::new(HashSet::new()),
        }
    }

    /// Publish a context instance under `name`.
    ///
    /// Reflects the instance's shape, assigns a fresh definition id, stores
    /// the stub, and returns the definition for advertisement to peers.
    pub fn attach(&self, name: &str, instance: Arc<dyn Context>) -> Result<Definition> {
        let mut by_name = self.by_name.write().unwrap_or_else(|e| e.into_inner());
        if by_name.contains_key(name) {
            return Err(NetronError::AlreadyAttached(name.to_string()));
        }

        let def = Definition::new(self.def_ids.next(), name, instance.shape());
        let stub = Arc::new(Stub::new(def.clone(), instance));

        by_name.insert(name.to_string(), def.id);
        self.stubs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(def.id, stub);

        info!(context = name, def_id = def.id, "Context attached");
        Ok(def)
    }

    /// Remove a context. Its definition id is invalidated for future calls;
    /// in-flight invocations already dispatched may still complete.
    pub fn detach(&self, name: &str) -> Result<Definition> {
        let def_id = self
            .by_name
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .ok_or_else(|| NetronError::NotAttached(name.to_string()))?;

        let stub = self
            .stubs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&def_id);
        self.retired
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(def_id);

        debug!(context = name, def_id, "Context detached");
        // The stub existed if the name mapping did; keep the definition for
        // the caller so detach can be advertised.
        stub.map(|s| s.definition().clone())
            .ok_or_else(|| NetronError::NotAttached(name.to_string()))
    }

    /// Resolve a stub by definition id.
    ///
    /// `ContextGone` when the id belonged to a detached context,
    /// `UnknownDefinition` when it was never issued here.
    pub fn stub_by_id(&self, def_id: u64) -> Result<Arc<Stub>> {
        if let Some(stub) = self
            .stubs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&def_id)
        {
            return Ok(stub.clone());
        }
        if self
            .retired
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&def_id)
        {
            Err(NetronError::ContextGone(def_id))
        } else {
            Err(NetronError::UnknownDefinition(def_id))
        }
    }

    /// Resolve a definition by context name.
    pub fn definition_by_name(&self, name: &str) -> Result<Definition> {
        let def_id = *self
            .by_name
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .ok_or_else(|| NetronError::UnknownContext(name.to_string()))?;
        Ok(self.stub_by_id(def_id)?.definition().clone())
    }

    /// Snapshot of every attached definition.
    pub fn definitions(&self) -> Vec<Definition> {
        self.stubs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|stub| stub.definition().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stubs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}
