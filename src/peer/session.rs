//! # Peer Session
//!
//! Owns one multiplexed duplex byte stream: turns inbound bytes into decoded
//! packets and routes them either to pending-request resolution or to the
//! inbound action handlers; turns outbound calls into packets and tracks
//! in-flight requests awaiting a response.
//!
//! Packets are processed strictly in arrival order on the read loop, but
//! CALL/GET/SET handlers run on their own tasks, so a slow context method
//! never stalls ping processing or other traffic. Replies may therefore be
//! written out of request order; correlation by id is what guarantees
//! correctness on the requester side.

use crate::config::NetronConfig;
use crate::core::codec::PacketCodec;
use crate::core::packet::Packet;
use crate::core::sequencer::FastSequencer;
use crate::core::value::Value;
use crate::error::{constants, NetronError, RemoteError, Result};
use crate::peer::{PeerEvent, PeerState, RemoteEvent};
use crate::protocol::dispatcher::{TaskDispatcher, TaskResult};
use crate::protocol::message::{Action, Message};
use crate::registry::{ContextRegistry, Definition};
use crate::utils::metrics::global_metrics;
use futures::{SinkExt, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

/// An in-flight request awaiting its reply.
struct Pending {
    tx: oneshot::Sender<Result<Message>>,
    created_at: Instant,
}

/// One peer session over an established duplex transport.
pub struct PeerSession {
    uid: String,
    config: NetronConfig,
    state: RwLock<PeerState>,
    ids: FastSequencer,
    /// In-flight requests keyed by correlation id. Exclusively owned by this
    /// session; entries leave on reply, timeout, or disconnect.
    pending: Mutex<HashMap<u32, Pending>>,
    outbound: mpsc::Sender<Packet>,
    registry: Arc<ContextRegistry>,
    tasks: Arc<TaskDispatcher>,
    /// Event names the remote side subscribed to.
    subscriptions: RwLock<HashSet<String>>,
    /// Definitions owned by the remote side, cached locally.
    remote_defs: RwLock<HashMap<u64, Definition>>,
    events_tx: broadcast::Sender<RemoteEvent>,
    lifecycle_tx: mpsc::UnboundedSender<PeerEvent>,
    offline_notified: AtomicBool,
    last_activity: Mutex<Instant>,
    shutdown_tx: watch::Sender<bool>,
}

impl PeerSession {
    /// Wrap an established transport in a session and start its read and
    /// write loops. The transport is assumed handshaken; the session begins
    /// Online.
    pub fn spawn<T>(
        uid: impl Into<String>,
        transport: T,
        registry: Arc<ContextRegistry>,
        tasks: Arc<TaskDispatcher>,
        config: NetronConfig,
        lifecycle_tx: mpsc::UnboundedSender<PeerEvent>,
    ) -> Arc<Self>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let uid = uid.into();
        let framed = Framed::new(transport, PacketCodec::new(config.max_payload_size));
        let (mut sink, mut stream) = framed.split();

        let (outbound, mut outbound_rx) = mpsc::channel::<Packet>(config.outbound_queue);
        let (events_tx, _) = broadcast::channel(config.event_buffer);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let session = Arc::new(Self {
            uid: uid.clone(),
            state: RwLock::new(PeerState::Online),
            ids: FastSequencer::new(),
            pending: Mutex::new(HashMap::new()),
            outbound,
            registry,
            tasks,
            subscriptions: RwLock::new(HashSet::new()),
            remote_defs: RwLock::new(HashMap::new()),
            events_tx,
            lifecycle_tx,
            offline_notified: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
            shutdown_tx,
            config,
        });
        global_metrics().session_opened();

        // Writer task: single owner of the sink half.
        let mut writer_shutdown = shutdown_rx.clone();
        let writer_uid = uid.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_shutdown.changed() => break,
                    packet = outbound_rx.recv() => match packet {
                        Some(packet) => {
                            let bytes = packet.encoded_len() as u64;
                            if let Err(e) = sink.send(packet).await {
                                warn!(peer = %writer_uid, error = %e, "Outbound write failed");
                                break;
                            }
                            global_metrics().packet_sent(bytes);
                        }
                        None => break,
                    }
                }
            }
        });

        // Read loop: drives inbound dispatch in arrival order.
        let reader = session.clone();
        let mut reader_shutdown = shutdown_rx;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader_shutdown.changed() => break,
                    next = stream.next() => match next {
                        Some(Ok(packet)) => reader.dispatch(packet).await,
                        Some(Err(e)) => {
                            // Framing is unrecoverable mid-stream.
                            error!(peer = %reader.uid, error = %e, "Fatal framing error");
                            break;
                        }
                        None => {
                            debug!(peer = %reader.uid, "Transport closed by remote");
                            break;
                        }
                    }
                }
            }
            reader.shutdown();
        });

        if let Some(interval) = session.config.ping_interval {
            Self::spawn_ping_loop(session.clone(), interval);
        }

        session
    }

    fn spawn_ping_loop(session: Arc<Self>, interval: Duration) {
        let mut shutdown_rx = session.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(interval) => {
                        match session.ping().await {
                            Ok(rtt) => {
                                debug!(peer = %session.uid, rtt_us = rtt.as_micros() as u64, "Ping")
                            }
                            Err(e) => {
                                warn!(peer = %session.uid, error = %e, "Liveness ping failed");
                                session.shutdown();
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn state(&self) -> PeerState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_online(&self) -> bool {
        self.state() == PeerState::Online
    }

    /// Number of in-flight requests currently tracked.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Instant of the last inbound packet.
    pub fn last_activity(&self) -> Instant {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Whether the remote side subscribed to `event`.
    pub fn is_subscribed(&self, event: &str) -> bool {
        self.subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(event)
    }

    /// Look up a cached remote definition.
    pub fn cached_definition(&self, def_id: u64) -> Option<Definition> {
        self.remote_defs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&def_id)
            .cloned()
    }

    // ---------------------------------------------------------------- send

    /// Drop the pending entry for `id`, if it is still tracked. Used by the
    /// timeout and failed-write paths; a reply arriving afterwards is stale.
    fn remove_pending(&self, id: u32) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    /// Issue a request and await its correlated reply.
    ///
    /// The pending entry is registered before the packet is written, so a
    /// reply arriving on an adversarially fast loopback still finds it.
    /// Rejects with `RequestTimeout` after the configured deadline (the
    /// entry is removed; a late reply becomes a logged no-op) or with
    /// `PeerDisconnected` when the session goes offline while pending.
    pub async fn request(&self, message: Message) -> Result<Message> {
        let action = message
            .action()
            .ok_or_else(|| NetronError::MalformedPacket(constants::ERR_ACTION_MISMATCH.into()))?;
        debug_assert!(!action.is_oneway(), "oneway actions take notify()");

        if !self.is_online() {
            return Err(NetronError::PeerDisconnected);
        }

        let id = self.ids.next();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.insert(
                id,
                Pending {
                    tx,
                    created_at: Instant::now(),
                },
            );
        }

        let packet = Packet::request(id, action.code(), message.encode()?)?;
        if self.outbound.send(packet).await.is_err() {
            self.remove_pending(id);
            return Err(NetronError::PeerDisconnected);
        }
        global_metrics().request_sent();

        match tokio::time::timeout(self.config.response_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(NetronError::PeerDisconnected),
            Err(_) => {
                self.remove_pending(id);
                global_metrics().request_timed_out();
                debug!(peer = %self.uid, id, "Request timed out");
                Err(NetronError::RequestTimeout)
            }
        }
    }

    /// Fire-and-forget notification (EVENT and the reserved control
    /// actions). Never registers a pending request.
    pub async fn notify(&self, message: Message) -> Result<()> {
        let action = message
            .action()
            .ok_or_else(|| NetronError::MalformedPacket(constants::ERR_ACTION_MISMATCH.into()))?;

        if !self.is_online() {
            return Err(NetronError::PeerDisconnected);
        }

        let packet = Packet::request(self.ids.next(), action.code(), message.encode()?)?;
        self.outbound
            .send(packet)
            .await
            .map_err(|_| NetronError::PeerDisconnected)
    }

    async fn send_reply(&self, id: u32, action: Action, message: Message) {
        match message
            .encode()
            .and_then(|payload| Packet::reply(id, action.code(), payload))
        {
            Ok(packet) => {
                if self.outbound.send(packet).await.is_err() {
                    debug!(peer = %self.uid, id, "Reply dropped, writer gone");
                }
            }
            Err(e) => error!(peer = %self.uid, id, error = %e, "Failed to encode reply"),
        }
    }

    async fn send_error_reply(&self, id: u32, action: Action, error: RemoteError) {
        global_metrics().dispatch_error();
        self.send_reply(id, action, Message::Err(error)).await;
    }

    // ------------------------------------------------------------ dispatch

    /// Route one inbound packet. Called from the read loop only, strictly in
    /// arrival order.
    async fn dispatch(self: &Arc<Self>, packet: Packet) {
        global_metrics().packet_received(packet.encoded_len() as u64);
        *self
            .last_activity
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Instant::now();

        if !packet.impulse() {
            self.settle(packet);
            return;
        }

        let id = packet.id;
        let action = match Action::try_from(packet.action()) {
            Ok(action) => action,
            Err(_) => {
                // Unknown action is answered, not fatal. PING is the echo
                // action so the caller's promise settles.
                warn!(peer = %self.uid, id, code = packet.action(), "Unrecognized action");
                let error = RemoteError::from(NetronError::InvalidAction(packet.action()));
                self.send_error_reply(id, Action::Ping, error).await;
                return;
            }
        };

        let message = match Message::decode(&packet.payload) {
            Ok(message) => message,
            Err(_) => {
                if action.is_oneway() {
                    warn!(peer = %self.uid, id, "Undecodable oneway payload dropped");
                } else {
                    let error = RemoteError::new(
                        crate::error::kind::MALFORMED_PAYLOAD,
                        constants::ERR_UNDECODABLE_PAYLOAD,
                    );
                    self.send_error_reply(id, action, error).await;
                }
                return;
            }
        };

        if message.expect_action(action).is_err() {
            let error =
                RemoteError::new(crate::error::kind::MALFORMED_PAYLOAD, constants::ERR_ACTION_MISMATCH);
            self.send_error_reply(id, action, error).await;
            return;
        }

        match message {
            Message::Ping => {
                // Answered inline; invocations run on their own tasks so the
                // read loop stays responsive for pings.
                self.send_reply(id, action, Message::Ok(Value::Null)).await;
            }
            Message::Call { .. } | Message::Get { .. } | Message::Set { .. } => {
                let session = self.clone();
                tokio::spawn(async move {
                    session.handle_invoke(id, action, message).await;
                });
            }
            Message::Subscribe { event } => {
                self.subscriptions
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(event.clone());
                debug!(peer = %self.uid, event, "Peer subscribed");
                self.send_reply(id, action, Message::Ok(Value::Null)).await;
            }
            Message::Unsubscribe { event } => {
                self.subscriptions
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&event);
                debug!(peer = %self.uid, event, "Peer unsubscribed");
                self.send_reply(id, action, Message::Ok(Value::Null)).await;
            }
            Message::Task { name, args } => {
                let reply = match self.tasks.dispatch(&name, args) {
                    Ok(TaskResult::Value(value)) => Message::Ok(value),
                    Ok(TaskResult::Definitions(defs)) => Message::Defs(defs),
                    Err(error) => Message::Err(error),
                };
                self.send_reply(id, action, reply).await;
            }
            Message::Event { event, payload } => {
                // No reply; deliver to local listeners, if any remain.
                let _ = self.events_tx.send(RemoteEvent { event, payload });
            }
            Message::ContextAttach { def } => {
                debug!(peer = %self.uid, context = %def.name, def_id = def.id, "Remote context attached");
                self.remote_defs
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(def.id, def);
            }
            Message::ContextDetach { def_id, name } => {
                debug!(peer = %self.uid, context = %name, def_id, "Remote context detached");
                self.remote_defs
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&def_id);
            }
            // Reply shapes cannot pass expect_action on an impulse packet.
            Message::Ok(_) | Message::Defs(_) | Message::Err(_) => {}
        }
    }

    /// Run a CALL/GET/SET against the local registry. Always answers, errors
    /// included, so the caller's promise settles.
    async fn handle_invoke(&self, id: u32, action: Action, message: Message) {
        let reply = match message {
            Message::Call {
                def_id,
                method,
                args,
            } => match self.registry.stub_by_id(def_id) {
                Ok(stub) => match stub.invoke(&method, args).await {
                    Ok(value) => Message::Ok(value),
                    Err(error) => Message::Err(error),
                },
                Err(e) => Message::Err(RemoteError::from(e)),
            },
            Message::Get { def_id, property } => match self.registry.stub_by_id(def_id) {
                Ok(stub) => match stub.get_property(&property).await {
                    Ok(value) => Message::Ok(value),
                    Err(error) => Message::Err(error),
                },
                Err(e) => Message::Err(RemoteError::from(e)),
            },
            Message::Set {
                def_id,
                property,
                value,
            } => match self.registry.stub_by_id(def_id) {
                Ok(stub) => match stub.set_property(&property, value).await {
                    Ok(()) => Message::Ok(Value::Null),
                    Err(error) => Message::Err(error),
                },
                Err(e) => Message::Err(RemoteError::from(e)),
            },
            _ => return,
        };
        self.send_reply(id, action, reply).await;
    }

    /// Resolve a non-impulse packet against the pending table. Unknown ids
    /// are stale replies (a timeout may have removed the entry) and are
    /// dropped silently.
    fn settle(&self, packet: Packet) {
        let entry = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&packet.id);

        let Some(pending) = entry else {
            debug!(peer = %self.uid, id = packet.id, "Stale reply dropped");
            global_metrics().stale_reply_dropped();
            return;
        };

        global_metrics().request_completed(pending.created_at.elapsed());
        let result = match Message::decode(&packet.payload) {
            Ok(Message::Err(error)) => Err(error.into_error()),
            Ok(message) => Ok(message),
            Err(e) => Err(e),
        };
        // The requester may have been cancelled; nothing to do then.
        let _ = pending.tx.send(result);
    }

    // ------------------------------------------------------- high level ops

    /// Liveness probe; resolves with the measured round-trip time.
    pub async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        self.request(Message::Ping).await?;
        Ok(started.elapsed())
    }

    /// Invoke a method on a remote definition.
    pub async fn call(&self, def_id: u64, method: &str, args: Vec<Value>) -> Result<Value> {
        let reply = self
            .request(Message::Call {
                def_id,
                method: method.to_string(),
                args,
            })
            .await?;
        expect_value(reply)
    }

    /// Read a property of a remote definition.
    pub async fn get_property(&self, def_id: u64, property: &str) -> Result<Value> {
        let reply = self
            .request(Message::Get {
                def_id,
                property: property.to_string(),
            })
            .await?;
        expect_value(reply)
    }

    /// Write a property of a remote definition.
    pub async fn set_property(&self, def_id: u64, property: &str, value: Value) -> Result<()> {
        self.request(Message::Set {
            def_id,
            property: property.to_string(),
            value,
        })
        .await?;
        Ok(())
    }

    /// Subscribe to an event on the remote side. The acknowledgement
    /// precedes any delivery; events arrive on the returned receiver.
    pub async fn subscribe(&self, event: &str) -> Result<broadcast::Receiver<RemoteEvent>> {
        self.request(Message::Subscribe {
            event: event.to_string(),
        })
        .await?;
        Ok(self.events_tx.subscribe())
    }

    pub async fn unsubscribe(&self, event: &str) -> Result<()> {
        self.request(Message::Unsubscribe {
            event: event.to_string(),
        })
        .await?;
        Ok(())
    }

    /// Run a named task on the remote side.
    pub async fn run_task(&self, name: &str, args: Value) -> Result<Message> {
        self.request(Message::Task {
            name: name.to_string(),
            args,
        })
        .await
    }

    /// Fetch the remote side's definitions and refresh the local cache.
    pub async fn query_definitions(&self) -> Result<Vec<Definition>> {
        match self.run_task("context_defs", Value::Null).await? {
            Message::Defs(defs) => {
                let mut cache = self.remote_defs.write().unwrap_or_else(|e| e.into_inner());
                for def in &defs {
                    cache.insert(def.id, def.clone());
                }
                Ok(defs)
            }
            _ => Err(NetronError::MalformedPacket(
                constants::ERR_UNDECODABLE_PAYLOAD.into(),
            )),
        }
    }

    /// Resolve a remote definition by context name, querying the remote
    /// side on a cache miss.
    pub async fn definition_by_name(&self, name: &str) -> Result<Definition> {
        {
            let cache = self.remote_defs.read().unwrap_or_else(|e| e.into_inner());
            if let Some(def) = cache.values().find(|def| def.name == name) {
                return Ok(def.clone());
            }
        }
        self.query_definitions().await?;
        let cache = self.remote_defs.read().unwrap_or_else(|e| e.into_inner());
        cache
            .values()
            .find(|def| def.name == name)
            .cloned()
            .ok_or_else(|| NetronError::UnknownContext(name.to_string()))
    }

    /// Push a local definition to the remote side (control notification).
    pub async fn advertise(&self, def: Definition) -> Result<()> {
        self.notify(Message::ContextAttach { def }).await
    }

    /// Tell the remote side a local definition went away.
    pub async fn conceal(&self, def_id: u64, name: &str) -> Result<()> {
        self.notify(Message::ContextDetach {
            def_id,
            name: name.to_string(),
        })
        .await
    }

    /// Deliver a domain event to the remote side (fire-and-forget).
    pub async fn emit_event(&self, event: &str, payload: Value) -> Result<()> {
        self.notify(Message::Event {
            event: event.to_string(),
            payload,
        })
        .await
    }

    // ------------------------------------------------------------ teardown

    /// Tear the session down. Idempotent; safe from any task.
    pub fn disconnect(&self) {
        self.shutdown();
    }

    /// Mark this session as superseded by a replacement under the same uid.
    /// Its teardown will not emit an Offline notification; the peer never
    /// logically left.
    pub(crate) fn mark_superseded(&self) {
        self.offline_notified.store(true, Ordering::SeqCst);
    }

    fn shutdown(&self) {
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if matches!(*state, PeerState::Offline) {
                return;
            }
            *state = PeerState::Disconnecting;
        }

        let _ = self.shutdown_tx.send(true);

        // Reject everything in flight; their callers settle immediately.
        let drained: Vec<Pending> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain().map(|(_, entry)| entry).collect()
        };
        let rejected = drained.len();
        for entry in drained {
            let _ = entry.tx.send(Err(NetronError::PeerDisconnected));
        }

        *self.state.write().unwrap_or_else(|e| e.into_inner()) = PeerState::Offline;
        global_metrics().session_closed();

        if !self.offline_notified.swap(true, Ordering::SeqCst) {
            info!(peer = %self.uid, rejected_requests = rejected, "Peer offline");
            let _ = self.lifecycle_tx.send(PeerEvent::Offline {
                uid: self.uid.clone(),
            });
        }
    }
}

fn expect_value(reply: Message) -> Result<Value> {
    match reply {
        Message::Ok(value) => Ok(value),
        _ => Err(NetronError::MalformedPacket(
            constants::ERR_UNDECODABLE_PAYLOAD.into(),
        )),
    }
}
