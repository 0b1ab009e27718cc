//! Push client lifecycle.
//!
//! [`PushClient`] owns the WebSocket and drives the connect / read /
//! reconnect cycle. `start()` blocks for the lifetime of the client:
//! it alternates between a connection attempt and a session read loop,
//! feeding failures into the backoff policy until stopped or the policy
//! denies another attempt. `stop()` is idempotent and may be called from
//! any task.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use kso_core::config::{ClientConfig, ReconnectConfig};
use kso_core::error::{KsoError, KsoResult};

use crate::backoff;
use crate::connection::{self, WsStream};
use crate::dispatcher::{handler_fn, EventDispatcher};
use crate::events::{AckMessage, ConnectionState, Event, GoAwayMessage, GoAwayReason};
use crate::pipeline::{EventSink, FrameOutcome, MessagePipeline};
use crate::signer::Signer;

/// How a session read loop ended.
enum SessionEnd {
    /// `stop()` was requested; the socket is closed.
    Stopped,
    /// The connection was lost; reconnect if policy allows.
    Lost(KsoError),
}

/// Client for the open event push service.
///
/// Configure credentials and an event sink, then call [`start`]. The
/// client maintains the connection across transient failures and
/// server-initiated teardowns; [`stop`] shuts it down for good.
///
/// [`start`]: PushClient::start
/// [`stop`]: PushClient::stop
pub struct PushClient {
    config: ClientConfig,
    signer: Signer,
    /// Backoff policy; mutated only by goaway handling.
    reconnect: Mutex<ReconnectConfig>,
    sink: Option<EventSink>,
    state_tx: watch::Sender<ConnectionState>,
    stop_tx: watch::Sender<bool>,
    running_tx: watch::Sender<bool>,
    received_goaway: AtomicBool,
}

impl PushClient {
    /// Create a client from a configuration. An event sink must be added
    /// with [`with_handler`](Self::with_handler) or
    /// [`with_dispatcher`](Self::with_dispatcher) before `start()`.
    pub fn new(config: ClientConfig) -> Self {
        let signer = Signer::new(&config.app_id, &config.app_secret);
        let reconnect = Mutex::new(config.reconnect.clone());
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (stop_tx, _) = watch::channel(false);
        let (running_tx, _) = watch::channel(false);

        Self {
            config,
            signer,
            reconnect,
            sink: None,
            state_tx,
            stop_tx,
            running_tx,
            received_goaway: AtomicBool::new(false),
        }
    }

    /// Route every event to a single handler function.
    ///
    /// Replaces any previously configured sink.
    pub fn with_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.sink = Some(EventSink::Handler(handler_fn(f)));
        self
    }

    /// Route events through a dispatcher.
    ///
    /// Replaces any previously configured sink.
    pub fn with_dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.sink = Some(EventSink::Dispatcher(dispatcher));
        self
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Whether the current or most recent session saw a goaway.
    pub fn received_goaway(&self) -> bool {
        self.received_goaway.load(Ordering::SeqCst)
    }

    /// Connect and process events until stopped or the reconnect policy
    /// gives up.
    ///
    /// Blocks for the lifetime of the client. Returns `Ok(())` after
    /// `stop()`, or the error that ended the lifecycle: a non-retryable
    /// handshake rejection, an exhausted retry budget
    /// (`ReconnectExceeded`), or the session loss itself when
    /// auto-reconnect is off.
    pub async fn start(&self) -> KsoResult<()> {
        self.config.validate()?;
        // No-op when the embedding application installed its own subscriber.
        kso_core::logging::init_console_logging(self.config.log_level);
        let sink = self.sink.as_ref().ok_or(KsoError::HandlerNotSet)?;
        match self.state() {
            ConnectionState::Disconnected => {}
            ConnectionState::Closed => return Err(KsoError::ClientClosed),
            _ => return Err(KsoError::AlreadyConnected),
        }

        self.running_tx.send_replace(true);
        let result = self.run(sink).await;
        self.running_tx.send_replace(false);
        result
    }

    /// Stop the client.
    ///
    /// Idempotent. Cancels a pending backoff wait or in-flight handshake,
    /// closes the socket, and returns once the `start()` driver has
    /// unwound. Handlers already running are not interrupted.
    pub async fn stop(&self) {
        if self.state() != ConnectionState::Closed {
            info!("stopping push client");
        }
        self.set_state(ConnectionState::Closed);
        self.stop_tx.send_replace(true);

        let mut running = self.running_tx.subscribe();
        while *running.borrow_and_update() {
            if running.changed().await.is_err() {
                break;
            }
        }
    }

    /// The lifecycle driver: connect, run the session, back off, repeat.
    async fn run(&self, sink: &EventSink) -> KsoResult<()> {
        let mut retry_count: u32 = 0;
        let mut stop_rx = self.stop_tx.subscribe();

        loop {
            if *stop_rx.borrow() {
                self.set_state(ConnectionState::Closed);
                return Ok(());
            }

            self.set_state(ConnectionState::Connecting);
            let connect = connection::open_socket(&self.config, &self.signer);
            tokio::pin!(connect);
            let attempt = tokio::select! {
                result = &mut connect => result,
                _ = stop_rx.changed() => {
                    debug!("handshake cancelled by stop");
                    self.set_state(ConnectionState::Closed);
                    return Ok(());
                }
            };

            match attempt {
                Ok(ws) => {
                    info!(endpoint = %self.config.endpoint, "connected to push service");
                    retry_count = 0;
                    self.received_goaway.store(false, Ordering::SeqCst);
                    self.set_state(ConnectionState::Connected);

                    match self.run_session(ws, sink, &mut stop_rx).await {
                        SessionEnd::Stopped => {
                            self.set_state(ConnectionState::Closed);
                            return Ok(());
                        }
                        SessionEnd::Lost(cause) => {
                            self.backoff_or_bail(&mut retry_count, &mut stop_rx, cause)
                                .await?;
                        }
                    }
                }
                Err(e) if e.is_retryable() => {
                    warn!("connection attempt failed: {e}");
                    self.backoff_or_bail(&mut retry_count, &mut stop_rx, e).await?;
                }
                Err(e) => {
                    error!("fatal connection error: {e}");
                    self.set_state(ConnectionState::Closed);
                    return Err(e);
                }
            }
        }
    }

    /// Gate a reconnect attempt on the backoff policy, then wait out the
    /// delay. Errors terminate the lifecycle.
    async fn backoff_or_bail(
        &self,
        retry_count: &mut u32,
        stop_rx: &mut watch::Receiver<bool>,
        cause: KsoError,
    ) -> KsoResult<()> {
        self.set_state(ConnectionState::Reconnecting);
        let policy = self.reconnect.lock().await.clone();

        if !backoff::should_reconnect(&policy, *retry_count) {
            self.set_state(ConnectionState::Closed);
            if policy.auto_reconnect && policy.max_retry >= 0 {
                error!(retries = *retry_count, "reconnect attempts exhausted");
                return Err(KsoError::ReconnectExceeded(*retry_count));
            }
            info!("auto-reconnect disabled, not reconnecting");
            return Err(cause);
        }

        *retry_count += 1;
        let delay = backoff::next_interval(&policy, *retry_count);
        info!(attempt = *retry_count, delay_ms = delay, "reconnecting after backoff");

        tokio::select! {
            _ = sleep(Duration::from_millis(delay)) => Ok(()),
            _ = stop_rx.changed() => {
                info!("backoff wait cancelled by stop");
                self.set_state(ConnectionState::Closed);
                Err(KsoError::ClientClosed)
            }
        }
    }

    /// Read frames until the socket dies, a pong deadline expires, or a
    /// stop is requested.
    async fn run_session(
        &self,
        mut ws: WsStream,
        sink: &EventSink,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let pipeline =
            MessagePipeline::new(&self.signer, &self.config.app_secret, self.config.ack_mode, sink);
        let pong_timeout = Duration::from_millis(self.config.pong_timeout_ms);
        let write_timeout = Duration::from_millis(self.config.write_timeout_ms);
        let mut pong_deadline = Instant::now() + pong_timeout;
        let mut goaway_seen = false;

        loop {
            tokio::select! {
                biased;

                _ = stop_rx.changed() => {
                    let _ = ws.close(None).await;
                    return SessionEnd::Stopped;
                }

                _ = sleep_until(pong_deadline) => {
                    warn!(
                        timeout_ms = self.config.pong_timeout_ms,
                        "pong deadline expired, forcing close"
                    );
                    let _ = ws.close(None).await;
                    return SessionEnd::Lost(KsoError::Connection(
                        "pong deadline expired".to_string(),
                    ));
                }

                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if goaway_seen {
                            debug!("frame after goaway dropped");
                            continue;
                        }
                        match pipeline.process_text(text.as_str()).await {
                            FrameOutcome::Ack(ack) => {
                                self.send_ack(&mut ws, &ack, write_timeout).await;
                            }
                            FrameOutcome::GoAway(goaway) => {
                                goaway_seen = true;
                                self.apply_goaway(&goaway).await;
                            }
                            FrameOutcome::Ignored => {}
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        pong_deadline = Instant::now() + pong_timeout;
                        if let Err(e) = ws.send(Message::Pong(payload)).await {
                            warn!("pong reply failed: {e}");
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("server closed the connection");
                        return SessionEnd::Lost(KsoError::Connection(
                            "connection closed by server".to_string(),
                        ));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("websocket error: {e}");
                        return SessionEnd::Lost(KsoError::Connection(e.to_string()));
                    }
                    None => {
                        info!("websocket stream ended");
                        return SessionEnd::Lost(KsoError::Connection(
                            "connection closed".to_string(),
                        ));
                    }
                }
            }
        }
    }

    /// Send an acknowledgement; failures are logged and swallowed.
    async fn send_ack(&self, ws: &mut WsStream, ack: &AckMessage, deadline: Duration) {
        let payload = match serde_json::to_string(ack) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("ack serialization failed: {e}");
                return;
            }
        };
        match timeout(deadline, ws.send(Message::Text(payload.into()))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(nonce = %ack.nonce, "ack send failed: {e}"),
            Err(_) => warn!(nonce = %ack.nonce, "ack send timed out"),
        }
    }

    /// Apply a goaway to this client's reconnect policy.
    async fn apply_goaway(&self, goaway: &GoAwayMessage) {
        self.received_goaway.store(true, Ordering::SeqCst);
        let mut policy = self.reconnect.lock().await;
        if goaway.reason == GoAwayReason::ConnectionReplaced {
            warn!("connection replaced by another client, auto-reconnect disabled");
            policy.auto_reconnect = false;
        } else if let Some(ms) = goaway.reconnect_ms {
            if ms > 0 {
                info!(reconnect_ms = ms, "server adjusted the reconnect base interval");
                policy.base_interval_ms = ms;
            }
        }
    }

    /// Transition the connection state. `Closed` is terminal; transitions
    /// out of it are silently ignored.
    fn set_state(&self, new_state: ConnectionState) {
        let old_state = *self.state_tx.borrow();
        if old_state == new_state || old_state == ConnectionState::Closed {
            return;
        }
        info!("client state: {old_state} -> {new_state}");
        self.state_tx.send_replace(new_state);
    }
}

impl std::fmt::Debug for PushClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushClient")
            .field("endpoint", &self.config.endpoint)
            .field("state", &self.state())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
