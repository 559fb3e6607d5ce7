//! # Stubs
//!
//! A [`Stub`] is the server-side binding of a [`Definition`] to a live
//! context instance. It validates method and property access against the
//! definition's metadata before dispatching, and it wraps every
//! instance-raised error into a [`RemoteError`] so that a failing handler
//! produces an error reply instead of killing the peer session.

use crate::core::value::Value;
use crate::error::{kind, RemoteError};
use crate::registry::definition::{ContextShape, Definition};
use futures::future::BoxFuture;
use std::sync::Arc;

/// An application object exposed for remote invocation.
///
/// `shape()` plays the role of the reflection collaborator: it describes the
/// callable surface that becomes the context's [`Definition`]. The dispatch
/// methods may suspend; the session runs each inbound invocation on its own
/// task, so a slow handler never stalls the read loop.
pub trait Context: Send + Sync + 'static {
    /// Describe the methods, properties, and events this context exposes.
    fn shape(&self) -> ContextShape;

    /// Invoke a method. Only called for names present in the shape.
    fn call(&self, method: &str, args: Vec<Value>)
        -> BoxFuture<'static, Result<Value, RemoteError>>;

    /// Read a property. Only called for readable properties in the shape.
    fn get(&self, property: &str) -> BoxFuture<'static, Result<Value, RemoteError>>;

    /// Write a property. Only called for writable properties in the shape.
    fn set(&self, property: &str, value: Value)
        -> BoxFuture<'static, Result<(), RemoteError>>;
}

/// Server-side binding of a definition to a live instance.
///
/// Holds a shared, non-owning association with the instance; one stub exists
/// per (netron, context instance).
pub struct Stub {
    def: Definition,
    instance: Arc<dyn Context>,
}

impl Stub {
    pub fn new(def: Definition, instance: Arc<dyn Context>) -> Self {
        Self { def, instance }
    }

    pub fn definition(&self) -> &Definition {
        &self.def
    }

    /// Dispatch a method call to the live instance.
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
        if self.def.method(method).is_none() {
            return Err(RemoteError::new(kind::UNKNOWN_METHOD, method));
        }
        self.instance.call(method, args).await
    }

    /// Read a property, honoring the definition's metadata.
    ///
    /// A property declared non-readable is invisible to GET and fails the
    /// same way as an unknown name.
    pub async fn get_property(&self, property: &str) -> Result<Value, RemoteError> {
        match self.def.property(property) {
            Some(meta) if meta.readable => self.instance.get(property).await,
            _ => Err(RemoteError::new(kind::UNKNOWN_PROPERTY, property)),
        }
    }

    /// Write a property, honoring the definition's metadata.
    pub async fn set_property(&self, property: &str, value: Value) -> Result<(), RemoteError> {
        match self.def.property(property) {
            Some(meta) if meta.writable => self.instance.set(property, value).await,
            Some(_) => Err(RemoteError::new(kind::SET_ON_READ_ONLY, property)),
            None => Err(RemoteError::new(kind::UNKNOWN_PROPERTY, property)),
        }
    }
}
