//! WebSocket subscription channel delivering model change notifications.
//!
//! A single long-lived channel per client instance, with lifecycle
//! `Idle → Connecting → Open → {Closed | Errored}`. Four event kinds —
//! opened, message, closed, errored — are delivered to zero or more
//! registered listeners in registration order, synchronously from the
//! reader task, so message order matches the order the server produced
//! the frames in.
//!
//! There is no replay: events emitted before a listener registers are lost.
//! Register listeners before calling `subscribe` to observe the opening event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex as StdMutex, RwLock as StdRwLock};
use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use modelserver_core::{ClientError, ClientResult};

/// WebSocket writer half, held only until the channel terminates.
type SocketWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
/// WebSocket reader half, consumed exclusively by the reader task.
type SocketReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Callback invoked when the channel opens.
pub type OpenListener = Box<dyn Fn() + Send + Sync>;
/// Callback invoked for each inbound push notification.
pub type MessageListener = Box<dyn Fn(&SubscriptionMessage) + Send + Sync>;
/// Callback invoked once when the channel closes.
pub type ClosedListener = Box<dyn Fn(&CloseNotice) + Send + Sync>;
/// Callback invoked once when the channel fails.
pub type ErrorListener = Box<dyn Fn(&ClientError) + Send + Sync>;

/// Lifecycle state of the subscription channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    /// No channel open; `subscribe` may open one.
    Idle,
    /// A `subscribe` for the contained model uri claimed the channel and is
    /// performing the handshake. Competing `subscribe` calls fail.
    Connecting(String),
    /// Channel open for the contained model uri.
    Open(String),
    /// Terminated by a close, local or remote. A fresh `subscribe` is allowed.
    Closed,
    /// Terminated by a transport failure. A fresh `subscribe` is allowed.
    Errored,
}

/// A push notification received over the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionMessage {
    /// A raw text frame.
    Text(String),
    /// The payload of a structured `{"body": ...}` frame.
    Body(Value),
}

impl SubscriptionMessage {
    fn from_frame(text: &str) -> Self {
        // A frame is structured iff it parses as a JSON object carrying a
        // `body` field; anything else is delivered as raw text.
        if let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(text) {
            if let Some(body) = object.remove("body") {
                return Self::Body(body);
            }
        }
        Self::Text(text.to_string())
    }
}

/// Close notification: the numeric close code and reason string of the
/// terminating frame, preserved verbatim for diagnostic rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseNotice {
    /// WebSocket close code.
    pub code: u16,
    /// Close reason reported by whoever closed the channel.
    pub reason: String,
}

/// Token returned by listener registration. Hand it back to
/// `remove_listener` to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    id: u64,
    kind: ListenerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ListenerKind {
    Open,
    Message,
    Closed,
    Error,
}

/// Ordered callback registry, one list per event kind.
///
/// Delivery snapshots a list under its lock and invokes the callbacks with
/// the lock released, so a callback may register or deregister listeners
/// (itself included); such changes take effect from the next event.
#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    open: StdMutex<Vec<(u64, Arc<dyn Fn() + Send + Sync>)>>,
    message: StdMutex<Vec<(u64, Arc<dyn Fn(&SubscriptionMessage) + Send + Sync>)>>,
    closed: StdMutex<Vec<(u64, Arc<dyn Fn(&CloseNotice) + Send + Sync>)>>,
    error: StdMutex<Vec<(u64, Arc<dyn Fn(&ClientError) + Send + Sync>)>>,
}

impl ListenerRegistry {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn add_open(&self, listener: OpenListener) -> ListenerHandle {
        let id = self.next_id();
        self.open
            .lock()
            .expect("listener registry poisoned")
            .push((id, Arc::from(listener)));
        ListenerHandle {
            id,
            kind: ListenerKind::Open,
        }
    }

    fn add_message(&self, listener: MessageListener) -> ListenerHandle {
        let id = self.next_id();
        self.message
            .lock()
            .expect("listener registry poisoned")
            .push((id, Arc::from(listener)));
        ListenerHandle {
            id,
            kind: ListenerKind::Message,
        }
    }

    fn add_closed(&self, listener: ClosedListener) -> ListenerHandle {
        let id = self.next_id();
        self.closed
            .lock()
            .expect("listener registry poisoned")
            .push((id, Arc::from(listener)));
        ListenerHandle {
            id,
            kind: ListenerKind::Closed,
        }
    }

    fn add_error(&self, listener: ErrorListener) -> ListenerHandle {
        let id = self.next_id();
        self.error
            .lock()
            .expect("listener registry poisoned")
            .push((id, Arc::from(listener)));
        ListenerHandle {
            id,
            kind: ListenerKind::Error,
        }
    }

    fn remove(&self, handle: ListenerHandle) {
        match handle.kind {
            ListenerKind::Open => self
                .open
                .lock()
                .expect("listener registry poisoned")
                .retain(|(id, _)| *id != handle.id),
            ListenerKind::Message => self
                .message
                .lock()
                .expect("listener registry poisoned")
                .retain(|(id, _)| *id != handle.id),
            ListenerKind::Closed => self
                .closed
                .lock()
                .expect("listener registry poisoned")
                .retain(|(id, _)| *id != handle.id),
            ListenerKind::Error => self
                .error
                .lock()
                .expect("listener registry poisoned")
                .retain(|(id, _)| *id != handle.id),
        }
    }

    fn fire_open(&self) {
        for listener in Self::snapshot(&self.open) {
            (*listener)();
        }
    }

    fn fire_message(&self, message: &SubscriptionMessage) {
        for listener in Self::snapshot(&self.message) {
            (*listener)(message);
        }
    }

    fn fire_closed(&self, notice: &CloseNotice) {
        for listener in Self::snapshot(&self.closed) {
            (*listener)(notice);
        }
    }

    fn fire_error(&self, error: &ClientError) {
        for listener in Self::snapshot(&self.error) {
            (*listener)(error);
        }
    }

    /// Clone the registered callbacks so delivery runs with the lock
    /// released.
    fn snapshot<L: ?Sized>(list: &StdMutex<Vec<(u64, Arc<L>)>>) -> Vec<Arc<L>> {
        list.lock()
            .expect("listener registry poisoned")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

/// The single subscription channel of a client instance.
///
/// At most one channel is open at a time; a second `subscribe` while one is
/// open fails with [`ClientError::AlreadySubscribed`]. Once terminated, a
/// fresh `subscribe` opens a new channel over the same listener registry.
pub struct SubscriptionChannel {
    state: Arc<StdRwLock<ChannelState>>,
    listeners: Arc<ListenerRegistry>,
    writer: Arc<Mutex<Option<SocketWriter>>>,
    shutdown: StdMutex<Option<broadcast::Sender<()>>>,
}

impl std::fmt::Debug for SubscriptionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionChannel")
            .field("state", &self.state())
            .finish()
    }
}

impl Default for SubscriptionChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionChannel {
    /// Create an idle channel with an empty listener registry.
    pub fn new() -> Self {
        Self {
            state: Arc::new(StdRwLock::new(ChannelState::Idle)),
            listeners: Arc::new(ListenerRegistry::default()),
            writer: Arc::new(Mutex::new(None)),
            shutdown: StdMutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        self.state
            .read()
            .expect("channel state lock poisoned")
            .clone()
    }

    /// Register a listener for the opening event.
    pub fn on_open(&self, listener: OpenListener) -> ListenerHandle {
        self.listeners.add_open(listener)
    }

    /// Register a listener for inbound push notifications.
    pub fn on_message(&self, listener: MessageListener) -> ListenerHandle {
        self.listeners.add_message(listener)
    }

    /// Register a listener for the closing event.
    pub fn on_closed(&self, listener: ClosedListener) -> ListenerHandle {
        self.listeners.add_closed(listener)
    }

    /// Register a listener for channel failures.
    pub fn on_error(&self, listener: ErrorListener) -> ListenerHandle {
        self.listeners.add_error(listener)
    }

    /// Deregister a previously registered listener.
    pub fn remove_listener(&self, handle: ListenerHandle) {
        self.listeners.remove(handle);
    }

    /// Open the channel against `endpoint_url` for `model_uri`.
    ///
    /// Returns `Err` only for the precondition violation of subscribing while
    /// a channel is open. Connect failures are reported through the error
    /// listeners and leave the channel `Errored`; the opening event fires to
    /// already-registered open listeners before any message is delivered.
    pub async fn subscribe(&self, endpoint_url: &str, model_uri: &str) -> ClientResult<()> {
        // Claim the channel before connecting so concurrent `subscribe` calls
        // cannot both pass the guard during the handshake. Only this call
        // transitions out of `Connecting`.
        {
            let mut state = self.state.write().expect("channel state lock poisoned");
            match &*state {
                ChannelState::Open(open_uri) | ChannelState::Connecting(open_uri) => {
                    return Err(ClientError::AlreadySubscribed(open_uri.clone()));
                }
                _ => *state = ChannelState::Connecting(model_uri.to_string()),
            }
        }

        debug!(%endpoint_url, "opening subscription channel");
        let stream = match connect_async(endpoint_url).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                warn!(%endpoint_url, error = %e, "subscription connect failed");
                self.set_state(ChannelState::Errored);
                self.listeners
                    .fire_error(&ClientError::ConnectionFailed(e.to_string()));
                return Ok(());
            }
        };

        let (writer, reader) = stream.split();
        *self.writer.lock().await = Some(writer);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        *self.shutdown.lock().expect("shutdown lock poisoned") = Some(shutdown_tx);

        self.set_state(ChannelState::Open(model_uri.to_string()));
        info!(%model_uri, "subscription channel open");
        self.listeners.fire_open();

        self.spawn_reader_task(reader, shutdown_rx);
        Ok(())
    }

    /// Close the channel locally.
    ///
    /// Sends a close frame, stops the reader task, and fires the closing
    /// event with code 1000. An in-flight message already queued for delivery
    /// may still reach listeners; nothing is delivered after the closing
    /// event. Fails with [`ClientError::NotSubscribed`] when no channel is
    /// open for `model_uri`.
    pub async fn unsubscribe(&self, model_uri: &str) -> ClientResult<()> {
        {
            let state = self.state.read().expect("channel state lock poisoned");
            match &*state {
                ChannelState::Open(open_uri) if open_uri == model_uri => {}
                _ => return Err(ClientError::NotSubscribed(model_uri.to_string())),
            }
        }

        // Mark closed before touching the socket so the reader task delivers
        // nothing past this point. A peer close racing us wins the transition
        // and has already fired the closing event.
        if !Self::terminate(&self.state, ChannelState::Closed) {
            return Err(ClientError::NotSubscribed(model_uri.to_string()));
        }

        if let Some(shutdown) = self
            .shutdown
            .lock()
            .expect("shutdown lock poisoned")
            .take()
        {
            let _ = shutdown.send(());
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.send(Message::Close(None)).await {
                debug!(error = %e, "close frame not delivered");
            }
        } else {
            return Err(ClientError::ChannelClosed(model_uri.to_string()));
        }

        info!(%model_uri, "subscription channel unsubscribed");
        self.listeners.fire_closed(&CloseNotice {
            code: 1000,
            reason: "unsubscribe".to_string(),
        });
        Ok(())
    }

    fn set_state(&self, new_state: ChannelState) {
        *self.state.write().expect("channel state lock poisoned") = new_state;
    }

    /// Spawn the reader task: the single consumer of the socket. Routes each
    /// frame to the listeners and terminates on close, failure, or shutdown.
    fn spawn_reader_task(&self, mut reader: SocketReader, mut shutdown_rx: broadcast::Receiver<()>) {
        let state = Arc::clone(&self.state);
        let listeners = Arc::clone(&self.listeners);
        let writer = Arc::clone(&self.writer);

        tokio::spawn(async move {
            debug!("subscription reader task started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("subscription reader received shutdown signal");
                        break;
                    }
                    frame = reader.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                if Self::is_open(&state) {
                                    let message = SubscriptionMessage::from_frame(text.as_str());
                                    listeners.fire_message(&message);
                                }
                            }
                            Some(Ok(Message::Close(close_frame))) => {
                                let notice = match close_frame {
                                    Some(frame) => CloseNotice {
                                        code: u16::from(frame.code),
                                        reason: frame.reason.to_string(),
                                    },
                                    // 1005: the peer closed without a status code.
                                    None => CloseNotice {
                                        code: 1005,
                                        reason: String::new(),
                                    },
                                };
                                if Self::terminate(&state, ChannelState::Closed) {
                                    info!(code = notice.code, "subscription channel closed by peer");
                                    listeners.fire_closed(&notice);
                                }
                                break;
                            }
                            Some(Ok(_)) => {
                                // Binary and ping/pong control frames carry no
                                // model notifications.
                            }
                            Some(Err(e)) => {
                                if Self::terminate(&state, ChannelState::Errored) {
                                    warn!(error = %e, "subscription channel failed");
                                    listeners.fire_error(&ClientError::ConnectionFailed(e.to_string()));
                                }
                                break;
                            }
                            None => {
                                // 1006: the connection dropped without a close frame.
                                if Self::terminate(&state, ChannelState::Closed) {
                                    warn!("subscription connection lost");
                                    listeners.fire_closed(&CloseNotice {
                                        code: 1006,
                                        reason: "connection lost".to_string(),
                                    });
                                }
                                break;
                            }
                        }
                    }
                }
            }
            writer.lock().await.take();
            debug!("subscription reader task finished");
        });
    }

    fn is_open(state: &StdRwLock<ChannelState>) -> bool {
        matches!(
            &*state.read().expect("channel state lock poisoned"),
            ChannelState::Open(_)
        )
    }

    /// Transition out of `Open`; returns `false` when the channel already
    /// terminated (a local unsubscribe racing the reader), so terminal events
    /// fire at most once.
    fn terminate(state: &StdRwLock<ChannelState>, terminal: ChannelState) -> bool {
        let mut state = state.write().expect("channel state lock poisoned");
        if matches!(&*state, ChannelState::Open(_)) {
            *state = terminal;
            true
        } else {
            false
        }
    }
}
