//! Inbound frame processing.
//!
//! Each text frame is demultiplexed into a teardown notification or an
//! encrypted event. Events are verified, decrypted, and delivered through
//! the configured sink; the outcome tells the socket owner what, if
//! anything, to write back. Per-event failures are logged and dropped,
//! never escalated to the connection.

use tracing::{debug, error, info};

use kso_core::constants;

use crate::crypto::EventCipher;
use crate::dispatcher::{EventDispatcher, EventHandler};
use crate::events::{AckMessage, Event, EventMessage, GoAwayMessage, ProbeFrame};
use crate::signer::Signer;

/// Where decoded events go: a single handler function or a dispatcher.
#[derive(Clone)]
pub(crate) enum EventSink {
    Handler(EventHandler),
    Dispatcher(EventDispatcher),
}

impl EventSink {
    /// Deliver an event and await its processing.
    pub(crate) async fn deliver(&self, event: Event) -> anyhow::Result<()> {
        match self {
            Self::Handler(handler) => handler(event).await,
            Self::Dispatcher(dispatcher) => dispatcher.handle(event).await,
        }
    }
}

/// What the session loop should do after a frame was processed.
#[derive(Debug)]
pub(crate) enum FrameOutcome {
    /// Nothing to write back.
    Ignored,
    /// Acknowledgement to send.
    Ack(AckMessage),
    /// Teardown notification for the lifecycle controller.
    GoAway(GoAwayMessage),
}

/// Per-session frame processor.
pub(crate) struct MessagePipeline<'a> {
    signer: &'a Signer,
    app_secret: &'a str,
    ack_mode: bool,
    sink: &'a EventSink,
}

impl<'a> MessagePipeline<'a> {
    pub(crate) fn new(
        signer: &'a Signer,
        app_secret: &'a str,
        ack_mode: bool,
        sink: &'a EventSink,
    ) -> Self {
        Self {
            signer,
            app_secret,
            ack_mode,
            sink,
        }
    }

    /// Process one inbound text frame.
    pub(crate) async fn process_text(&self, text: &str) -> FrameOutcome {
        let probe: ProbeFrame = match serde_json::from_str(text) {
            Ok(probe) => probe,
            Err(e) => {
                error!("unparseable frame dropped: {e}");
                return FrameOutcome::Ignored;
            }
        };

        if probe.msg_type == constants::FRAME_TYPE_GOAWAY {
            return match serde_json::from_str::<GoAwayMessage>(text) {
                Ok(goaway) => {
                    info!(reason = %goaway.reason, message = %goaway.message, "server sent goaway");
                    FrameOutcome::GoAway(goaway)
                }
                Err(e) => {
                    error!("malformed goaway frame dropped: {e}");
                    FrameOutcome::Ignored
                }
            };
        }

        if probe.topic.is_empty() || probe.operation.is_empty() {
            error!("frame missing topic or operation, dropped");
            return FrameOutcome::Ignored;
        }

        let message: EventMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                error!(topic = %probe.topic, "malformed event frame dropped: {e}");
                return FrameOutcome::Ignored;
            }
        };

        if !self.signer.verify_event(
            &message.topic,
            &message.nonce,
            message.time,
            &message.encrypted_data,
            &message.signature,
        ) {
            error!(topic = %message.topic, "event signature mismatch, dropped");
            return FrameOutcome::Ignored;
        }

        let plaintext =
            match EventCipher::decrypt(self.app_secret, &message.encrypted_data, &message.nonce) {
                Ok(plaintext) => plaintext,
                Err(e) => {
                    error!(topic = %message.topic, "event decrypt failed, dropped: {e}");
                    return FrameOutcome::Ignored;
                }
            };

        let event = Event::new(message.topic, message.operation, message.time, plaintext);
        debug!(event_code = event.event_code(), "dispatching event");

        let result = self.sink.deliver(event).await;
        if let Err(e) = &result {
            error!("event handler failed: {e:#}");
        }

        if self.ack_mode && !message.nonce.is_empty() {
            let ack = match result {
                Ok(()) => AckMessage::ok(message.nonce),
                Err(e) => AckMessage::handler_error(message.nonce, &format!("{e:#}")),
            };
            return FrameOutcome::Ack(ack);
        }

        FrameOutcome::Ignored
    }
}
