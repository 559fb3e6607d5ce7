//! # Session Manager
//!
//! [`Netron`] owns the cross-session shared state: the context registry,
//! the task dispatcher, and the set of active peer sessions. It accepts
//! established transports into sessions, fans context attach/detach
//! advertisements and domain events out to peers, and surfaces peer
//! lifecycle transitions on a broadcast channel.
//!
//! Sessions report their own teardown through an internal lifecycle
//! channel; a pump task removes offline peers from the active set and
//! re-broadcasts the transition, so each peer goes offline exactly once
//! from every observer's point of view.

use crate::config::NetronConfig;
use crate::core::value::Value;
use crate::error::{NetronError, Result};
use crate::interface::Interface;
use crate::peer::{PeerEvent, PeerSession};
use crate::protocol::dispatcher::{TaskDispatcher, TaskResult};
use crate::registry::{Context, ContextRegistry};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Top-level session manager.
pub struct Netron {
    config: NetronConfig,
    registry: Arc<ContextRegistry>,
    tasks: Arc<TaskDispatcher>,
    peers: RwLock<HashMap<String, Arc<PeerSession>>>,
    peer_events: broadcast::Sender<PeerEvent>,
    lifecycle_tx: mpsc::UnboundedSender<PeerEvent>,
}

impl Netron {
    /// Create a manager and start its lifecycle pump.
    pub fn new(config: NetronConfig) -> Arc<Self> {
        let registry = Arc::new(ContextRegistry::new());
        let tasks = Arc::new(TaskDispatcher::new());

        // Built-in discovery task: peers call this to learn what contexts
        // this side publishes.
        let defs_registry = registry.clone();
        tasks.register("context_defs", move |_args| {
            Ok(TaskResult::Definitions(defs_registry.definitions()))
        });

        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
        let (peer_events, _) = broadcast::channel(config.event_buffer);

        let netron = Arc::new(Self {
            config,
            registry,
            tasks,
            peers: RwLock::new(HashMap::new()),
            peer_events,
            lifecycle_tx,
        });

        Self::spawn_lifecycle_pump(netron.clone(), lifecycle_rx);
        netron
    }

    fn spawn_lifecycle_pump(
        netron: Arc<Self>,
        mut lifecycle_rx: mpsc::UnboundedReceiver<PeerEvent>,
    ) {
        tokio::spawn(async move {
            while let Some(event) = lifecycle_rx.recv().await {
                if let PeerEvent::Offline { uid } = &event {
                    // A replacement session may already own this uid; only
                    // a mapped session that really went offline is evicted.
                    let removed = {
                        let mut peers =
                            netron.peers.write().unwrap_or_else(|e| e.into_inner());
                        match peers.get(uid) {
                            Some(session) if !session.is_online() => {
                                peers.remove(uid);
                                true
                            }
                            _ => false,
                        }
                    };
                    if !removed {
                        debug!(peer = %uid, "Offline notice for a superseded session");
                        continue;
                    }
                    debug!(peer = %uid, "Peer removed from active set");
                }
                // No receivers is fine; lifecycle observation is optional.
                let _ = netron.peer_events.send(event);
            }
        });
    }

    pub fn config(&self) -> &NetronConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    /// Register a named task callable by remote peers.
    pub fn register_task<F>(&self, name: &'static str, task: F)
    where
        F: Fn(Value) -> std::result::Result<TaskResult, crate::error::RemoteError>
            + Send
            + Sync
            + 'static,
    {
        self.tasks.register(name, task);
    }

    /// Observe peer lifecycle transitions.
    pub fn peer_events(&self) -> broadcast::Receiver<PeerEvent> {
        self.peer_events.subscribe()
    }

    // ------------------------------------------------------------- contexts

    /// Publish a context and advertise it to every online peer.
    pub async fn attach_context(
        &self,
        name: &str,
        instance: Arc<dyn Context>,
    ) -> Result<crate::registry::Definition> {
        let def = self.registry.attach(name, instance)?;
        for peer in self.peers() {
            if let Err(e) = peer.advertise(def.clone()).await {
                warn!(peer = %peer.uid(), context = name, error = %e, "Advertise failed");
            }
        }
        Ok(def)
    }

    /// Withdraw a context and tell every online peer it is gone.
    pub async fn detach_context(&self, name: &str) -> Result<()> {
        let def = self.registry.detach(name)?;
        for peer in self.peers() {
            if let Err(e) = peer.conceal(def.id, &def.name).await {
                warn!(peer = %peer.uid(), context = name, error = %e, "Conceal failed");
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------- peers

    /// Take ownership of an established transport as a peer session.
    ///
    /// A second transport under the same uid replaces the first; the old
    /// session is torn down without an offline notification, since the peer
    /// never logically left.
    pub fn accept_peer<T>(self: &Arc<Self>, uid: impl Into<String>, transport: T) -> Arc<PeerSession>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let uid = uid.into();
        let session = PeerSession::spawn(
            uid.clone(),
            transport,
            self.registry.clone(),
            self.tasks.clone(),
            self.config.clone(),
            self.lifecycle_tx.clone(),
        );

        let replaced = self
            .peers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(uid.clone(), session.clone());
        if let Some(old) = replaced {
            warn!(peer = %uid, "Replacing existing session for peer");
            old.mark_superseded();
            old.disconnect();
        }

        info!(peer = %uid, "Peer online");
        let _ = self.lifecycle_tx.send(PeerEvent::Online { uid });
        session
    }

    /// Dial a remote endpoint over TCP and register the session under its
    /// socket address.
    pub async fn connect(self: &Arc<Self>, addr: &str) -> Result<Arc<PeerSession>> {
        let stream = crate::transport::tcp::connect(addr).await?;
        let uid = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| addr.to_string());
        Ok(self.accept_peer(uid, stream))
    }

    pub fn peer(&self, uid: &str) -> Option<Arc<PeerSession>> {
        self.peers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(uid)
            .cloned()
    }

    /// Snapshot of the active sessions.
    pub fn peers(&self) -> Vec<Arc<PeerSession>> {
        self.peers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Tear down one peer session.
    pub fn disconnect_peer(&self, uid: &str) -> Result<()> {
        let session = self
            .peer(uid)
            .ok_or_else(|| NetronError::UnknownPeer(uid.to_string()))?;
        session.disconnect();
        Ok(())
    }

    /// Tear down every active session.
    pub fn shutdown(&self) {
        for peer in self.peers() {
            peer.disconnect();
        }
    }

    // ----------------------------------------------------------- interfaces

    /// Resolve a callable interface for a context published by `peer_uid`.
    pub async fn get_interface(&self, peer_uid: &str, name: &str) -> Result<Interface> {
        let session = self
            .peer(peer_uid)
            .ok_or_else(|| NetronError::UnknownPeer(peer_uid.to_string()))?;
        let def = session.definition_by_name(name).await?;
        Ok(Interface::remote(session, def))
    }

    /// Resolve a callable interface for a locally published context. No
    /// round trip is involved; calls dispatch straight into the stub.
    pub fn get_local_interface(&self, name: &str) -> Result<Interface> {
        let def = self.registry.definition_by_name(name)?;
        let stub = self.registry.stub_by_id(def.id)?;
        Ok(Interface::local(stub))
    }

    // --------------------------------------------------------------- events

    /// Emit a domain event to every peer subscribed to it.
    pub async fn emit(&self, event: &str, payload: Value) {
        for peer in self.peers() {
            if !peer.is_subscribed(event) {
                continue;
            }
            if let Err(e) = peer.emit_event(event, payload.clone()).await {
                debug!(peer = %peer.uid(), event, error = %e, "Event delivery failed");
            }
        }
    }
}
