//! The [`Client`] facade and the tasks that drive one connection.
//!
//! `connect()` spawns a supervisor task. It dials the endpoint, then splits
//! the work across two more tasks:
//!
//! - the **reader** receives fragments, reassembles them, and dispatches
//!   each complete message;
//! - the **writer** drains the outbound queue into the sink.
//!
//! Each half reports back to the supervisor when it has closed. Once both
//! have, the supervisor marks the connection `Closed`, abandons any calls
//! still pending, and emits the final [`ClientEvent::Closed`].
//!
//! ```text
//!            send_*() ──→ mpsc ──→ writer ──→ FrameSink
//!                                     │
//! FrameSource ──→ reader ──→ Reassembler ──→ Dispatcher ──→ EventHandler
//!                   │         │                 │
//!                   └─────────┴──→ supervisor ←─┘ (Signal: failed / closed)
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mirai_ws_protocol::{CallId, CallKind, Command, MessageChain, SendReceipt};
use mirai_ws_registry::{CallRegistry, Continuation};
use mirai_ws_transport::{
    Connector, Endpoint, FragmentKind, FrameSink, FrameSource, TransportError, WebSocketConnector,
};
use tokio::sync::{mpsc, oneshot, watch};

use crate::dispatch::Dispatcher;
use crate::reassembly::{Reassembler, Reassembly};
use crate::state::{ConnectionState, Half, TeardownTracker};
use crate::{ClientConfig, ClientError, ClientEvent, EventHandler};

/// Messages from the connection tasks to the supervisor.
#[derive(Debug)]
enum Signal {
    /// A half hit a transport error or saw the stream end.
    Failed(TransportError),
    /// A half has closed its side of the transport.
    Closed(Half),
}

/// State shared by the client handle and the connection tasks.
struct Shared {
    state: Mutex<ConnectionState>,
    registry: Arc<CallRegistry>,
    handler: Arc<dyn EventHandler>,
    /// Present only while streaming.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    shutdown: watch::Sender<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    /// Moves to `next` if that is a legal transition. Returns whether it did.
    fn transition(&self, next: ConnectionState) -> bool {
        let mut state = lock(&self.state);
        if !state.can_transition_to(next) {
            tracing::trace!(from = %*state, to = %next, "transition skipped");
            return false;
        }
        tracing::debug!(from = %*state, to = %next, "connection state");
        *state = next;
        true
    }

    fn emit(&self, event: ClientEvent) {
        self.handler.on_event(&event);
    }

    /// Asks both halves to close.
    fn begin_close(&self) {
        self.transition(ConnectionState::Closing);
        self.shutdown.send_replace(true);
    }

    /// Releases everything and emits the final event.
    fn finish(&self) {
        lock(&self.outbound).take();
        self.transition(ConnectionState::Closed);
        let abandoned = self.registry.clear();
        tracing::info!(abandoned, "connection closed");
        self.emit(ClientEvent::Closed);
    }
}

/// A client for one mirai-api-http WebSocket connection.
///
/// # Example
///
/// ```rust,no_run
/// use mirai_ws::prelude::*;
///
/// # async fn run() -> Result<(), ClientError> {
/// let config = ClientConfig::builder().verify_key("INITKEY").qq(10001).build();
/// let client = Client::new(config, |event: &ClientEvent| {
///     if let ClientEvent::FriendMessage(message) = event {
///         println!("{}: {}", message.sender.nickname, message.chain);
///     }
/// });
/// client.connect()?;
/// # Ok(())
/// # }
/// ```
///
/// A client connects once. After it reaches [`ConnectionState::Closed`] it
/// stays closed; create a new client to reconnect. Dropping the client
/// destroys the connection.
pub struct Client<C: Connector = WebSocketConnector> {
    shared: Arc<Shared>,
    connector: Arc<C>,
    config: ClientConfig,
}

impl Client<WebSocketConnector> {
    /// Creates a client that connects over WebSocket.
    pub fn new(config: ClientConfig, handler: impl EventHandler) -> Self {
        Self::with_connector(config, handler, WebSocketConnector)
    }
}

impl<C: Connector> Client<C> {
    /// Creates a client that connects through `connector`.
    pub fn with_connector(config: ClientConfig, handler: impl EventHandler, connector: C) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ConnectionState::Idle),
                registry: Arc::new(CallRegistry::new(config.max_pending_calls)),
                handler: Arc::new(handler),
                outbound: Mutex::new(None),
                shutdown,
            }),
            connector: Arc::new(connector),
            config,
        }
    }

    /// The configuration this client was created with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Number of sent calls still waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.shared.registry.len()
    }

    /// Starts connecting. Returns immediately.
    ///
    /// The outcome arrives as [`ClientEvent::Connected`], followed by the
    /// server's [`ClientEvent::Auth`] on success.
    ///
    /// # Errors
    /// - [`ClientError::InvalidState`] unless the client is idle.
    /// - [`ClientError::NoRuntime`] when called outside a Tokio runtime.
    pub fn connect(&self) -> Result<(), ClientError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ClientError::NoRuntime)?;
        if !self.shared.transition(ConnectionState::Handshaking) {
            return Err(ClientError::InvalidState {
                operation: "connect",
                state: self.state(),
            });
        }

        let endpoint = self.config.endpoint();
        tracing::info!(url = %endpoint.url(), "connecting");
        runtime.spawn(supervise(
            Arc::clone(&self.shared),
            Arc::clone(&self.connector),
            endpoint,
            self.config.clone(),
        ));
        Ok(())
    }

    /// Tears the connection down. Returns immediately.
    ///
    /// Completion is reported by [`ClientEvent::Closed`]. Calls still waiting
    /// for responses are abandoned; their callbacks never run. Calling this
    /// more than once, or after the connection closed on its own, is a
    /// no-op.
    pub fn destroy(&self) {
        match self.state() {
            ConnectionState::Idle => {
                // No tasks were ever started.
                if self.shared.transition(ConnectionState::Closing) {
                    self.shared.finish();
                }
            }
            ConnectionState::Closing | ConnectionState::Closed => {}
            _ => {
                tracing::debug!("destroy requested");
                self.shared.begin_close();
            }
        }
    }

    /// Sends a message to a friend.
    ///
    /// `callback` runs with the server's receipt when it arrives. Returns
    /// once the command is queued; never waits on the network.
    ///
    /// # Errors
    /// - [`ClientError::NotConnected`] unless the connection is streaming.
    /// - [`ClientError::Registry`] if too many calls are pending.
    /// - [`ClientError::Protocol`] if the command cannot be encoded.
    pub fn send_friend_message<F>(
        &self,
        target: i64,
        chain: &MessageChain,
        callback: F,
    ) -> Result<CallId, ClientError>
    where
        F: FnOnce(SendReceipt) + Send + 'static,
    {
        self.send(CallKind::FriendMessage, target, chain, Box::new(callback))
    }

    /// Sends a message to a group. See
    /// [`send_friend_message`](Self::send_friend_message).
    pub fn send_group_message<F>(
        &self,
        target: i64,
        chain: &MessageChain,
        callback: F,
    ) -> Result<CallId, ClientError>
    where
        F: FnOnce(SendReceipt) + Send + 'static,
    {
        self.send(CallKind::GroupMessage, target, chain, Box::new(callback))
    }

    /// Sends a message to a friend without observing the receipt.
    ///
    /// The call is still tracked, so the server's response is matched and
    /// discarded rather than reported as malformed.
    ///
    /// # Errors
    /// As [`send_friend_message`](Self::send_friend_message).
    pub fn send_friend_message_and_forget(
        &self,
        target: i64,
        chain: &MessageChain,
    ) -> Result<CallId, ClientError> {
        self.send(CallKind::FriendMessage, target, chain, discard_receipt())
    }

    /// Sends a message to a group without observing the receipt. See
    /// [`send_friend_message_and_forget`](Self::send_friend_message_and_forget).
    pub fn send_group_message_and_forget(
        &self,
        target: i64,
        chain: &MessageChain,
    ) -> Result<CallId, ClientError> {
        self.send(CallKind::GroupMessage, target, chain, discard_receipt())
    }

    /// Sends a message to a friend and waits for the receipt.
    ///
    /// # Errors
    /// As [`send_friend_message`](Self::send_friend_message), plus
    /// [`ClientError::CallAbandoned`] if the connection closes first.
    pub async fn send_friend_message_and_wait(
        &self,
        target: i64,
        chain: &MessageChain,
    ) -> Result<SendReceipt, ClientError> {
        self.send_and_wait(CallKind::FriendMessage, target, chain).await
    }

    /// Sends a message to a group and waits for the receipt.
    ///
    /// # Errors
    /// As [`send_friend_message_and_wait`](Self::send_friend_message_and_wait).
    pub async fn send_group_message_and_wait(
        &self,
        target: i64,
        chain: &MessageChain,
    ) -> Result<SendReceipt, ClientError> {
        self.send_and_wait(CallKind::GroupMessage, target, chain).await
    }

    async fn send_and_wait(
        &self,
        kind: CallKind,
        target: i64,
        chain: &MessageChain,
    ) -> Result<SendReceipt, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(
            kind,
            target,
            chain,
            Box::new(move |receipt| {
                let _ = tx.send(receipt);
            }),
        )?;
        rx.await.map_err(|_| ClientError::CallAbandoned)
    }

    fn send(
        &self,
        kind: CallKind,
        target: i64,
        chain: &MessageChain,
        continuation: Continuation,
    ) -> Result<CallId, ClientError> {
        let state = self.state();
        if state != ConnectionState::Streaming {
            return Err(ClientError::NotConnected(state));
        }
        let outbound = lock(&self.shared.outbound)
            .clone()
            .ok_or(ClientError::NotConnected(state))?;

        let registry = &self.shared.registry;
        let call_id = registry.allocate_boxed(kind, continuation)?;

        // Teardown clears the registry only after leaving `Streaming`. A call
        // allocated once that has happened would never be cleared.
        let state = self.state();
        if state.is_shutting_down() {
            registry.cancel(call_id);
            return Err(ClientError::NotConnected(state));
        }

        let text = match Command::send_message(call_id, kind, target, chain).to_json() {
            Ok(text) => text,
            Err(e) => {
                registry.cancel(call_id);
                return Err(e.into());
            }
        };
        if outbound.send(text).is_err() {
            // The writer is gone; the connection is tearing down.
            registry.cancel(call_id);
            return Err(ClientError::NotConnected(self.state()));
        }

        tracing::debug!(%call_id, %kind, target, "command queued");
        Ok(call_id)
    }
}

fn discard_receipt() -> Continuation {
    Box::new(|receipt: SendReceipt| {
        tracing::trace!(code = receipt.code, message_id = receipt.message_id, "receipt discarded");
    })
}

impl<C: Connector> Drop for Client<C> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<C: Connector> std::fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("registry", &self.shared.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Connection tasks
// ---------------------------------------------------------------------------

/// Drives one connection from dial to release.
async fn supervise<C: Connector>(
    shared: Arc<Shared>,
    connector: Arc<C>,
    endpoint: Endpoint,
    config: ClientConfig,
) {
    let mut shutdown = shared.shutdown.subscribe();

    let connected = tokio::select! {
        result = connector.connect(&endpoint) => result,
        _ = shutdown.wait_for(|stop| *stop) => {
            tracing::debug!("destroyed while handshaking");
            shared.finish();
            return;
        }
    };

    let (sink, source) = match connected {
        Ok(halves) => halves,
        Err(e) => {
            tracing::warn!(error = %e, "connect failed");
            shared.transition(ConnectionState::Errored);
            shared.emit(ClientEvent::Connected(Err(e)));
            shared.begin_close();
            shared.finish();
            return;
        }
    };

    // The queue is installed before the state flips, so a send issued from
    // the `Connected` callback already has somewhere to go.
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    *lock(&shared.outbound) = Some(outbound_tx);

    // `destroy()` may have won the race with the upgrade. The halves are
    // still handed to the tasks so they get closed, but nothing is announced.
    if shared.transition(ConnectionState::Streaming) {
        tracing::info!(url = %endpoint.url(), "connected");
        shared.emit(ClientEvent::Connected(Ok(())));
    }

    let (signal_tx, mut signals) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(
        Arc::clone(&shared.registry),
        Arc::clone(&shared.handler),
        config.reserved_sync_id,
    );
    tokio::spawn(read_loop(
        source,
        Reassembler::new(config.max_message_size),
        dispatcher,
        shared.shutdown.subscribe(),
        signal_tx.clone(),
    ));
    tokio::spawn(write_loop(
        sink,
        outbound_rx,
        shared.shutdown.subscribe(),
        signal_tx,
    ));

    let mut tracker = TeardownTracker::new();
    while let Some(signal) = signals.recv().await {
        match signal {
            Signal::Failed(e) => {
                if shared.transition(ConnectionState::Errored) {
                    tracing::warn!(error = %e, "connection failed");
                    shared.emit(ClientEvent::NetworkError(e));
                } else {
                    tracing::debug!(error = %e, "transport error during teardown");
                }
                shared.begin_close();
            }
            Signal::Closed(half) => {
                tracing::debug!(?half, "half closed");
                if tracker.confirm(half) {
                    break;
                }
            }
        }
    }

    shared.finish();
}

/// Receives fragments until shutdown or transport failure.
async fn read_loop<S: FrameSource>(
    mut source: S,
    mut reassembler: Reassembler,
    dispatcher: Dispatcher,
    mut shutdown: watch::Receiver<bool>,
    signals: mpsc::UnboundedSender<Signal>,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = shutdown.wait_for(|stop| *stop) => break,
            received = source.recv() => received,
        };

        let fragment = match received {
            Ok(Some(fragment)) => fragment,
            Ok(None) => {
                let closed = TransportError::ConnectionClosed("server closed the stream".into());
                let _ = signals.send(Signal::Failed(closed));
                break;
            }
            Err(e) => {
                let _ = signals.send(Signal::Failed(e));
                break;
            }
        };

        if fragment.kind == FragmentKind::Binary {
            tracing::debug!(len = fragment.data.len(), "ignoring binary fragment");
            continue;
        }

        match reassembler.push(&fragment) {
            Reassembly::Complete(message) => dispatcher.dispatch(&message),
            Reassembly::Overflowed(partial) => {
                let limit = reassembler.capacity();
                tracing::warn!(limit, "inbound message exceeds receive buffer");
                dispatcher.malformed(
                    &partial,
                    mirai_ws_protocol::ProtocolError::MessageTooLarge { limit },
                );
            }
            Reassembly::Partial | Reassembly::Skipped => {}
        }
    }

    if let Err(e) = source.close().await {
        tracing::debug!(error = %e, "closing source failed");
    }
    let _ = signals.send(Signal::Closed(Half::Source));
}

/// Writes queued commands until shutdown or transport failure.
async fn write_loop<K: FrameSink>(
    mut sink: K,
    mut outbound: mpsc::UnboundedReceiver<String>,
    mut shutdown: watch::Receiver<bool>,
    signals: mpsc::UnboundedSender<Signal>,
) {
    loop {
        let text = tokio::select! {
            biased;
            _ = shutdown.wait_for(|stop| *stop) => break,
            next = outbound.recv() => match next {
                Some(text) => text,
                None => break,
            },
        };

        if let Err(e) = sink.send_text(text).await {
            let _ = signals.send(Signal::Failed(e));
            break;
        }
    }

    if let Err(e) = sink.close().await {
        tracing::debug!(error = %e, "closing sink failed");
    }
    let _ = signals.send(Signal::Closed(Half::Sink));
}
