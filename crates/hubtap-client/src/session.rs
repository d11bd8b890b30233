//! The hub session: connection lifecycle, invocations, and dispatch.
//!
//! A [`HubSession`] owns one logical connection to a hub server. The
//! connection may be re-established many times; subscriptions, the armed
//! quit counter, and the invocation id sequence all survive transport loss.
//!
//! Task layout:
//!
//! - the caller's task drives [`HubSession::connect`], [`HubSession::send`],
//!   [`HubSession::invoke`] and friends
//! - one connection task per dial runs the read/write loop and, on loss,
//!   walks the reconnect delay ladder
//! - one dispatch task per session runs inbound invocation callbacks
//!   strictly one at a time, in arrival order
//!
//! Completions are resolved inline on the connection task (they only wake a
//! oneshot), while invocations are queued to the dispatch task so a slow
//! callback cannot stall frame delimiting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex, Notify};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use hubtap_core::{
    CatchAllCodec, CodecError, CompletionMessage, DynamicValue, HubCodec, HubMessage,
    InvocationIdSource, InvocationMessage, JsonHubCodec, ValueError,
};

use crate::registry::{SubscriptionCallback, SubscriptionRegistry};
use crate::transport::{self, HubTransport, TransportError, WsStream};

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Budget for the WebSocket upgrade plus the hub handshake.
    pub handshake_timeout: Duration,
    /// Interval between outbound keep-alive pings.
    pub keepalive_interval: Duration,
    /// Delays before each reconnect attempt after a lost transport.
    /// The session closes once the ladder is exhausted.
    pub reconnect_delays: Vec<Duration>,
    /// Capacity of the session event channel.
    pub event_capacity: usize,
    /// Capacity of the outbound frame queue.
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(15),
            keepalive_interval: Duration::from_secs(15),
            reconnect_delays: vec![
                Duration::ZERO,
                Duration::from_secs(2),
                Duration::from_secs(10),
                Duration::from_secs(30),
            ],
            event_capacity: 64,
            outbound_capacity: 64,
        }
    }
}

// ── Events, states, errors ────────────────────────────────────────────────────

/// Lifecycle notifications delivered through the receiver returned by
/// [`HubSession::new`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The transport was lost after a successful connect; retries are under way.
    Reconnecting { reason: String },
    /// A retry succeeded and the handshake completed again.
    Reconnected,
    /// Terminal close. `error` carries the server-supplied reason, if any.
    Closed { error: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("not connected (session is {state})")]
    NotConnected { state: ConnectionState },

    #[error("connect to {address} failed: {source}")]
    ConnectFailed {
        address: String,
        #[source]
        source: TransportError,
    },

    #[error("session is closed")]
    Closed,

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("server returned an error: {0}")]
    Server(String),

    #[error("argument conversion failed: {0}")]
    Argument(#[from] ValueError),

    #[error("codec failure: {0}")]
    Codec(#[from] CodecError),
}

// ── Session ───────────────────────────────────────────────────────────────────

type PendingSender = oneshot::Sender<Result<Option<DynamicValue>, SessionError>>;

/// Handle to the currently live transport. Replaced wholesale on every
/// successful dial; `generation` lets a stale connection task detect that
/// it has been superseded.
struct ConnectionHandle {
    outbound_tx: mpsc::Sender<Vec<u8>>,
    cancel: Arc<Notify>,
    generation: u64,
}

/// How a connection's read/write loop ended.
enum Ended {
    /// Cancelled locally (close, quit, or a replacing connect).
    Local,
    /// The server sent a hub close frame.
    Remote {
        error: Option<String>,
        allow_reconnect: bool,
    },
    /// The transport failed underneath us.
    Lost(String),
}

pub struct HubSession {
    config: SessionConfig,
    codec: CatchAllCodec<JsonHubCodec>,
    registry: Arc<SubscriptionRegistry>,
    ids: InvocationIdSource,
    state: RwLock<ConnectionState>,
    conn: AsyncMutex<Option<ConnectionHandle>>,
    generation: AtomicU64,
    pending: Mutex<HashMap<String, PendingSender>>,
    /// Remaining dispatches before an automatic close; zero means disarmed.
    quit_after: AtomicU64,
    events_tx: mpsc::Sender<SessionEvent>,
    dispatch_tx: Mutex<Option<mpsc::UnboundedSender<InvocationMessage>>>,
}

impl HubSession {
    /// Creates a session and the receiver for its lifecycle events.
    ///
    /// Spawns the dispatch task, so this must be called from within a Tokio
    /// runtime.
    pub fn new(config: SessionConfig) -> (Arc<Self>, mpsc::Receiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity);
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            config,
            codec: CatchAllCodec::new(JsonHubCodec::new()),
            registry: Arc::new(SubscriptionRegistry::new()),
            ids: InvocationIdSource::new(),
            state: RwLock::new(ConnectionState::Disconnected),
            conn: AsyncMutex::new(None),
            generation: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            quit_after: AtomicU64::new(0),
            events_tx,
            dispatch_tx: Mutex::new(Some(dispatch_tx)),
        });
        tokio::spawn(Arc::clone(&session).dispatch_loop(dispatch_rx));
        (session, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Dials `address`, runs the handshake, and starts the connection task.
    ///
    /// Calling this on an already-connected session tears the old transport
    /// down first; a failed dial then leaves the session disconnected.
    pub async fn connect(self: &Arc<Self>, address: &str) -> Result<(), SessionError> {
        if self.state() == ConnectionState::Closed {
            return Err(SessionError::Closed);
        }
        self.teardown_current().await;
        self.set_state(ConnectionState::Connecting);

        info!(%address, "connecting");
        let transport = match transport::open(address, self.config.handshake_timeout).await {
            Ok(transport) => transport,
            Err(source) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(SessionError::ConnectFailed {
                    address: address.to_owned(),
                    source,
                });
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_capacity);
        let cancel = Arc::new(Notify::new());
        {
            let mut conn = self.conn.lock().await;
            *conn = Some(ConnectionHandle {
                outbound_tx,
                cancel: Arc::clone(&cancel),
                generation,
            });
        }
        self.set_state(ConnectionState::Connected);
        info!(%address, "connected");

        tokio::spawn(Arc::clone(self).run_connection(
            generation,
            address.to_owned(),
            transport,
            outbound_rx,
            cancel,
        ));
        Ok(())
    }

    /// Fire-and-forget invocation; no completion is awaited.
    pub async fn send(
        &self,
        method: &str,
        arguments: Vec<DynamicValue>,
    ) -> Result<(), SessionError> {
        self.ensure_connected()?;
        let message = HubMessage::Invocation(InvocationMessage::send(
            method,
            to_wire_arguments(&arguments)?,
        ));
        let frame = self.codec.write_message(&message)?;
        debug!(%method, "sending fire-and-forget invocation");
        self.outbound(frame).await
    }

    /// Invokes `method` and waits for the server's completion.
    ///
    /// `Ok(None)` is a void completion; `Err(SessionError::Server)` carries a
    /// hub-level failure. There is no client-side timeout: the future
    /// resolves when the server completes, the transport drops, or the
    /// session closes.
    pub async fn invoke(
        &self,
        method: &str,
        arguments: Vec<DynamicValue>,
    ) -> Result<Option<DynamicValue>, SessionError> {
        self.ensure_connected()?;
        let invocation_id = self.ids.next_id();
        let (sender, receiver) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(invocation_id.clone(), sender);

        let message = HubMessage::Invocation(InvocationMessage::invoke(
            invocation_id.clone(),
            method,
            to_wire_arguments(&arguments)?,
        ));
        let frame = self.codec.write_message(&message)?;
        debug!(%method, %invocation_id, "invoking");
        if let Err(error) = self.outbound(frame).await {
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&invocation_id);
            return Err(error);
        }

        match receiver.await {
            Ok(outcome) => outcome,
            // sender dropped without a verdict; only happens at close
            Err(_) => Err(SessionError::Closed),
        }
    }

    /// Subscribes `callback` to inbound invocations of `method`.
    ///
    /// Registration works while disconnected; the subscription becomes
    /// active as soon as a connection exists. Re-registering a name replaces
    /// the earlier callback.
    pub fn listen(&self, method: &str, labels: Vec<String>, callback: SubscriptionCallback) {
        if !self.is_connected() {
            warn!(%method, "not connected; subscription becomes active after connect");
        }
        self.registry.register(method, labels, callback);
    }

    /// Removes the subscription for `method`. Returns `false` if none existed.
    pub fn stop_listen(&self, method: &str) -> bool {
        self.registry.remove(method)
    }

    /// Closes now (`after_count == 0`) or arms a counter that closes the
    /// session once that many further inbound invocations have been
    /// dispatched to their callbacks.
    pub async fn quit(&self, after_count: u64) {
        if after_count == 0 {
            self.close(None).await;
        } else {
            self.quit_after.store(after_count, Ordering::SeqCst);
            info!(count = after_count, "armed quit counter");
        }
    }

    // ── Lifecycle internals ───────────────────────────────────────────────────

    /// Terminal close. Idempotent; later calls are no-ops.
    async fn close(&self, error: Option<String>) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if *state == ConnectionState::Closed {
                return;
            }
            *state = ConnectionState::Closed;
        }
        self.teardown_current().await;
        self.dispatch_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.fail_pending("session closed");
        match error.as_deref() {
            Some(reason) => warn!(%reason, "session closed"),
            None => info!("session closed"),
        }
        let _ = self.events_tx.send(SessionEvent::Closed { error }).await;
    }

    async fn teardown_current(&self) {
        if let Some(handle) = self.conn.lock().await.take() {
            // permit-storing wakeup; the queue's sender is gone too, so the
            // connection task sees the cancellation either way
            handle.cancel.notify_one();
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            debug!(from = %*state, to = %next, "session state change");
            *state = next;
        }
    }

    fn ensure_connected(&self) -> Result<(), SessionError> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Closed => Err(SessionError::Closed),
            state => Err(SessionError::NotConnected { state }),
        }
    }

    /// Non-blocking event emission for reconnect progress; the retry loop
    /// must not wait on a slow consumer.
    fn try_emit(&self, event: SessionEvent) {
        if let Err(error) = self.events_tx.try_send(event) {
            debug!(%error, "dropping session event");
        }
    }

    /// Fails every pending invocation with `reason`.
    fn fail_pending(&self, reason: &str) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.is_empty() {
            return;
        }
        warn!(count = pending.len(), %reason, "failing pending invocations");
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(SessionError::ConnectionLost(reason.to_owned())));
        }
    }

    fn resolve_completion(&self, completion: CompletionMessage) {
        let entry = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&completion.invocation_id);
        let Some(sender) = entry else {
            warn!(
                invocation_id = %completion.invocation_id,
                "completion does not match a pending invocation"
            );
            return;
        };
        let outcome = match completion.error {
            Some(error) => Err(SessionError::Server(error)),
            None => Ok(completion.result.map(DynamicValue::from_json)),
        };
        // the invoking future may have been dropped; that is fine
        let _ = sender.send(outcome);
    }

    /// Decrements the armed quit counter. Returns true when it hits zero.
    fn note_dispatched(&self) -> bool {
        loop {
            let current = self.quit_after.load(Ordering::SeqCst);
            if current == 0 {
                return false;
            }
            if self
                .quit_after
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return current == 1;
            }
        }
    }

    fn dispatch_sender(&self) -> Option<mpsc::UnboundedSender<InvocationMessage>> {
        self.dispatch_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn is_current(&self, generation: u64) -> bool {
        self.conn
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| handle.generation == generation)
    }

    /// Queues an encoded frame for the live transport.
    async fn outbound(&self, frame: Vec<u8>) -> Result<(), SessionError> {
        let outbound_tx = {
            let conn = self.conn.lock().await;
            match conn.as_ref() {
                Some(handle) => handle.outbound_tx.clone(),
                None => {
                    return Err(SessionError::NotConnected {
                        state: self.state(),
                    })
                }
            }
        };
        outbound_tx
            .send(frame)
            .await
            .map_err(|_| SessionError::ConnectionLost("write queue closed".to_owned()))
    }

    // ── Connection task ───────────────────────────────────────────────────────

    async fn run_connection(
        self: Arc<Self>,
        generation: u64,
        address: String,
        mut transport: HubTransport,
        mut outbound_rx: mpsc::Receiver<Vec<u8>>,
        mut cancel: Arc<Notify>,
    ) {
        let Some(dispatch_tx) = self.dispatch_sender() else {
            return;
        };
        loop {
            let ended = self
                .drive(transport, &mut outbound_rx, &cancel, &dispatch_tx)
                .await;
            let reason = match ended {
                Ended::Local => return,
                Ended::Remote {
                    error,
                    allow_reconnect: false,
                } => {
                    self.close(error).await;
                    return;
                }
                Ended::Remote {
                    error,
                    allow_reconnect: true,
                } => error.unwrap_or_else(|| "server requested reconnect".to_owned()),
                Ended::Lost(reason) => reason,
            };

            if !self.is_current(generation).await {
                return;
            }
            warn!(%reason, "connection lost; attempting to reconnect");
            self.set_state(ConnectionState::Reconnecting);
            self.try_emit(SessionEvent::Reconnecting {
                reason: reason.clone(),
            });
            self.fail_pending(&reason);

            match self.reopen(generation, &address).await {
                Some((next, next_rx, next_cancel)) => {
                    transport = next;
                    outbound_rx = next_rx;
                    cancel = next_cancel;
                    self.set_state(ConnectionState::Connected);
                    info!(%address, "reconnected");
                    self.try_emit(SessionEvent::Reconnected);
                }
                None => {
                    if self.is_current(generation).await {
                        self.close(Some(format!("reconnect failed: {reason}"))).await;
                    }
                    return;
                }
            }
        }
    }

    /// Walks the reconnect delay ladder. Returns the fresh transport and its
    /// queue endpoints, or `None` when the ladder is exhausted or this
    /// connection task has been superseded.
    async fn reopen(
        &self,
        generation: u64,
        address: &str,
    ) -> Option<(HubTransport, mpsc::Receiver<Vec<u8>>, Arc<Notify>)> {
        for (attempt, delay) in self.config.reconnect_delays.iter().copied().enumerate() {
            sleep(delay).await;
            if !self.is_current(generation).await {
                return None;
            }
            debug!(attempt = attempt + 1, ?delay, "reconnect attempt");
            match transport::open(address, self.config.handshake_timeout).await {
                Ok(next) => {
                    let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_capacity);
                    let cancel = Arc::new(Notify::new());
                    let mut conn = self.conn.lock().await;
                    match conn.as_ref() {
                        Some(handle) if handle.generation == generation => {
                            *conn = Some(ConnectionHandle {
                                outbound_tx,
                                cancel: Arc::clone(&cancel),
                                generation,
                            });
                            return Some((next, outbound_rx, cancel));
                        }
                        // a newer connect or a close superseded this attempt
                        _ => return None,
                    }
                }
                Err(error) => {
                    warn!(attempt = attempt + 1, %error, "reconnect attempt failed");
                }
            }
        }
        None
    }

    /// Runs one transport until it ends: writes queued frames, answers the
    /// keep-alive timer, and decodes inbound bytes into hub messages.
    async fn drive(
        &self,
        transport: HubTransport,
        outbound_rx: &mut mpsc::Receiver<Vec<u8>>,
        cancel: &Notify,
        dispatch_tx: &mpsc::UnboundedSender<InvocationMessage>,
    ) -> Ended {
        let HubTransport { mut ws, leftover } = transport;
        let mut recv_buf = leftover;
        // the server may have pipelined messages behind its handshake
        if let Some(ended) = self.drain_frames(&mut recv_buf, dispatch_tx) {
            return ended;
        }

        let mut keepalive = interval_at(
            Instant::now() + self.config.keepalive_interval,
            self.config.keepalive_interval,
        );
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.notified() => return Ended::Local,

                queued = outbound_rx.recv() => match queued {
                    Some(frame) => {
                        let message = match transport::text_frame(frame) {
                            Ok(message) => message,
                            Err(error) => {
                                error!(%error, "dropping unencodable outbound frame");
                                continue;
                            }
                        };
                        if let Err(error) = ws.send(message).await {
                            return Ended::Lost(format!("write failed: {error}"));
                        }
                    }
                    None => return Ended::Local,
                },

                _ = keepalive.tick() => {
                    if let Some(ended) = self.send_ping(&mut ws).await {
                        return ended;
                    }
                }

                incoming = ws.next() => match incoming {
                    None => return Ended::Lost("connection closed by server".to_owned()),
                    Some(Err(error)) => return Ended::Lost(format!("read failed: {error}")),
                    Some(Ok(Message::Text(text))) => {
                        recv_buf.extend_from_slice(text.as_bytes());
                        if let Some(ended) = self.drain_frames(&mut recv_buf, dispatch_tx) {
                            return ended;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        recv_buf.extend_from_slice(&bytes);
                        if let Some(ended) = self.drain_frames(&mut recv_buf, dispatch_tx) {
                            return ended;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "WebSocket closed by server".to_owned());
                        return Ended::Lost(reason);
                    }
                    // WebSocket-level ping/pong is answered by the transport
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    /// Decodes every complete frame in `recv_buf`, stopping at a partial
    /// frame, a close message, or a protocol error.
    fn drain_frames(
        &self,
        recv_buf: &mut Vec<u8>,
        dispatch_tx: &mpsc::UnboundedSender<InvocationMessage>,
    ) -> Option<Ended> {
        loop {
            match self.codec.try_parse_message(recv_buf, self.registry.as_ref()) {
                Ok((message, consumed)) => {
                    recv_buf.drain(..consumed);
                    match message {
                        HubMessage::Invocation(invocation) => {
                            // queued so a slow callback cannot stall delimiting
                            let _ = dispatch_tx.send(invocation);
                        }
                        HubMessage::Completion(completion) => self.resolve_completion(completion),
                        HubMessage::Ping => trace!("server keep-alive"),
                        HubMessage::Close(close) => {
                            info!(
                                error = ?close.error,
                                allow_reconnect = close.allow_reconnect,
                                "server sent close"
                            );
                            return Some(Ended::Remote {
                                error: close.error,
                                allow_reconnect: close.allow_reconnect,
                            });
                        }
                    }
                }
                Err(CodecError::NeedMoreData { .. }) => return None,
                Err(error) => {
                    error!(%error, "undecodable hub frame; dropping connection");
                    return Some(Ended::Lost(format!("protocol error: {error}")));
                }
            }
        }
    }

    async fn send_ping(&self, ws: &mut WsStream) -> Option<Ended> {
        let frame = match self.codec.write_message(&HubMessage::Ping) {
            Ok(frame) => frame,
            Err(error) => {
                error!(%error, "failed to encode keep-alive ping");
                return None;
            }
        };
        let message = match transport::text_frame(frame) {
            Ok(message) => message,
            Err(error) => {
                error!(%error, "failed to wrap keep-alive ping");
                return None;
            }
        };
        match ws.send(message).await {
            Ok(()) => {
                trace!("keep-alive ping sent");
                None
            }
            Err(error) => Some(Ended::Lost(format!("keep-alive write failed: {error}"))),
        }
    }

    // ── Dispatch task ─────────────────────────────────────────────────────────

    async fn dispatch_loop(
        self: Arc<Self>,
        mut inbound: mpsc::UnboundedReceiver<InvocationMessage>,
    ) {
        while let Some(invocation) = inbound.recv().await {
            let Some(subscription) = self.registry.lookup(&invocation.target) else {
                debug!(target = %invocation.target, "inbound invocation has no subscription");
                continue;
            };
            let InvocationMessage {
                target, arguments, ..
            } = invocation;
            let arguments: Vec<DynamicValue> =
                arguments.into_iter().map(DynamicValue::from_json).collect();
            trace!(%target, count = arguments.len(), "dispatching inbound invocation");
            subscription.dispatch(&arguments);
            if self.note_dispatched() {
                info!("quit counter reached zero; closing session");
                self.close(None).await;
                break;
            }
        }
    }
}

// ── Argument marshaling ───────────────────────────────────────────────────────

/// Converts raw command-line argument text into wire values.
///
/// Single quotes around an argument are stripped; they only group words at
/// the command layer. Text that then starts with `{` is parsed as a JSON
/// document, everything else passes through as a string literal, numbers
/// included.
pub fn marshal_arguments(raw: &[String]) -> Result<Vec<DynamicValue>, ValueError> {
    raw.iter()
        .map(|argument| {
            let trimmed = argument.trim_matches('\'');
            if trimmed.starts_with('{') {
                DynamicValue::decode_str(trimmed)
            } else {
                Ok(DynamicValue::String(trimmed.to_owned()))
            }
        })
        .collect()
}

fn to_wire_arguments(arguments: &[DynamicValue]) -> Result<Vec<Value>, ValueError> {
    arguments.iter().map(DynamicValue::to_json).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();

        assert_eq!(config.handshake_timeout, Duration::from_secs(15));
        assert_eq!(config.keepalive_interval, Duration::from_secs(15));
        assert_eq!(
            config.reconnect_delays,
            vec![
                Duration::ZERO,
                Duration::from_secs(2),
                Duration::from_secs(10),
                Duration::from_secs(30),
            ]
        );
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
    }

    // ── Argument marshaling ───────────────────────────────────────────────────

    #[test]
    fn test_marshal_plain_text_stays_a_string() {
        let values = marshal_arguments(&["hello".to_owned()]).expect("plain text is valid");

        assert_eq!(values, vec![DynamicValue::String("hello".to_owned())]);
    }

    #[test]
    fn test_marshal_numeric_text_stays_a_string() {
        // only JSON documents are parsed; bare numbers travel as strings
        let values = marshal_arguments(&["42".to_owned()]).expect("valid argument");

        assert_eq!(values, vec![DynamicValue::String("42".to_owned())]);
    }

    #[test]
    fn test_marshal_strips_single_quotes() {
        let values =
            marshal_arguments(&["'hello world'".to_owned()]).expect("quoted text is valid");

        assert_eq!(values, vec![DynamicValue::String("hello world".to_owned())]);
    }

    #[test]
    fn test_marshal_parses_json_objects() {
        let values = marshal_arguments(&["{\"speed\":88}".to_owned()]).expect("valid JSON");

        assert_eq!(
            values,
            vec![DynamicValue::Map(vec![(
                "speed".to_owned(),
                DynamicValue::Integer(88),
            )])]
        );
    }

    #[test]
    fn test_marshal_parses_quoted_json_objects() {
        let values = marshal_arguments(&["'{\"on\":true}'".to_owned()]).expect("valid JSON");

        assert_eq!(
            values,
            vec![DynamicValue::Map(vec![(
                "on".to_owned(),
                DynamicValue::Bool(true),
            )])]
        );
    }

    #[test]
    fn test_marshal_rejects_malformed_json() {
        let result = marshal_arguments(&["{not json".to_owned()]);

        assert!(result.is_err(), "malformed JSON must fail marshaling");
    }

    #[test]
    fn test_marshal_preserves_argument_order() {
        let values = marshal_arguments(&[
            "first".to_owned(),
            "{\"n\":1}".to_owned(),
            "last".to_owned(),
        ])
        .expect("all arguments valid");

        assert_eq!(values.len(), 3);
        assert_eq!(values[0], DynamicValue::String("first".to_owned()));
        assert_eq!(values[2], DynamicValue::String("last".to_owned()));
    }

    // ── Session state machine ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_new_session_starts_disconnected() {
        let (session, _events) = HubSession::new(SessionConfig::default());

        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_send_requires_a_connection() {
        let (session, _events) = HubSession::new(SessionConfig::default());

        let result = session.send("ReportStatus", vec![]).await;

        assert!(
            matches!(
                result,
                Err(SessionError::NotConnected {
                    state: ConnectionState::Disconnected
                })
            ),
            "send without connect must fail, got {result:?}"
        );
    }

    #[tokio::test]
    async fn test_invoke_requires_a_connection() {
        let (session, _events) = HubSession::new(SessionConfig::default());

        let result = session.invoke("GetStatus", vec![]).await;

        assert!(matches!(result, Err(SessionError::NotConnected { .. })));
    }

    #[tokio::test]
    async fn test_listen_registers_while_disconnected() {
        let (session, _events) = HubSession::new(SessionConfig::default());

        session.listen("Tick", vec!["n".to_owned()], Box::new(|_| {}));

        assert!(session.stop_listen("Tick"), "subscription should exist");
        assert!(!session.stop_listen("Tick"), "second removal is a no-op");
    }

    #[tokio::test]
    async fn test_quit_zero_closes_immediately() {
        let (session, mut events) = HubSession::new(SessionConfig::default());

        session.quit(0).await;

        assert_eq!(session.state(), ConnectionState::Closed);
        assert_eq!(
            events.recv().await,
            Some(SessionEvent::Closed { error: None })
        );
    }

    #[tokio::test]
    async fn test_connect_after_close_is_rejected() {
        let (session, _events) = HubSession::new(SessionConfig::default());
        session.quit(0).await;

        let result = session.connect("http://localhost:1/hub").await;

        assert!(matches!(result, Err(SessionError::Closed)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (session, mut events) = HubSession::new(SessionConfig::default());

        session.quit(0).await;
        session.quit(0).await;

        assert_eq!(
            events.recv().await,
            Some(SessionEvent::Closed { error: None })
        );
        // second close must not emit a second terminal event
        assert!(events.try_recv().is_err());
    }
}
