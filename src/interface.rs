//! # Interface Proxies
//!
//! An [`Interface`] is a callable handle over a [`Definition`]: method calls
//! and property access translate into CALL/GET/SET requests on the owning
//! peer session, or dispatch straight into the local stub when the context
//! lives in this process.
//!
//! Access is validated against the definition's metadata before any round
//! trip, so unknown methods and read-only writes fail fast on the calling
//! side.

use crate::core::value::Value;
use crate::error::{NetronError, Result};
use crate::peer::PeerSession;
use crate::registry::{Definition, Stub};
use std::sync::Arc;

enum Backend {
    Remote(Arc<PeerSession>),
    Local(Arc<Stub>),
}

/// Callable proxy over a resolved definition.
pub struct Interface {
    def: Definition,
    backend: Backend,
}

impl Interface {
    pub(crate) fn remote(session: Arc<PeerSession>, def: Definition) -> Self {
        Self {
            def,
            backend: Backend::Remote(session),
        }
    }

    pub(crate) fn local(stub: Arc<Stub>) -> Self {
        Self {
            def: stub.definition().clone(),
            backend: Backend::Local(stub),
        }
    }

    pub fn definition(&self) -> &Definition {
        &self.def
    }

    /// Invoke a method on the underlying context.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        if self.def.method(method).is_none() {
            return Err(NetronError::UnknownMethod(method.to_string()));
        }
        match &self.backend {
            Backend::Remote(session) => session.call(self.def.id, method, args).await,
            Backend::Local(stub) => stub
                .invoke(method, args)
                .await
                .map_err(|e| e.into_error()),
        }
    }

    /// Read a property of the underlying context.
    pub async fn get(&self, property: &str) -> Result<Value> {
        match self.def.property(property) {
            Some(meta) if meta.readable => {}
            _ => return Err(NetronError::UnknownProperty(property.to_string())),
        }
        match &self.backend {
            Backend::Remote(session) => session.get_property(self.def.id, property).await,
            Backend::Local(stub) => stub
                .get_property(property)
                .await
                .map_err(|e| e.into_error()),
        }
    }

    /// Write a property of the underlying context.
    pub async fn set(&self, property: &str, value: Value) -> Result<()> {
        match self.def.property(property) {
            Some(meta) if meta.writable => {}
            Some(_) => return Err(NetronError::SetOnReadOnly(property.to_string())),
            None => return Err(NetronError::UnknownProperty(property.to_string())),
        }
        match &self.backend {
            Backend::Remote(session) => session.set_property(self.def.id, property, value).await,
            Backend::Local(stub) => stub
                .set_property(property, value)
                .await
                .map_err(|e| e.into_error()),
        }
    }
}
