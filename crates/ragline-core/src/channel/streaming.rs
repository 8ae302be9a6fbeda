//! Streaming generation channel.
//!
//! A [`StreamingChannel`] is one connection attempt. It is created in
//! `Connecting`, moves to `Open` on handshake, and ends in `Closed` or
//! `Errored`. Terminal instances are never reused: the owner mints a new
//! [`ChannelId`] and opens a fresh instance to reconnect.
//!
//! Transport signals never mutate the channel directly. The connector posts
//! [`ChannelSignal`]s to the orchestrator inbox through a [`ChannelSink`], and
//! the orchestrator feeds them back into [`StreamingChannel::apply`] on its own
//! task. This keeps every transition on one event loop.

use ragline_types::notification::Severity;
use ragline_types::stream::{
    ChannelId, ChannelSignal, ChannelState, GenerationRequest, StreamEvent, StreamFrame,
};
use tokio::sync::mpsc;

use crate::chat::input::OrchestratorInput;
use crate::notify::NotificationBus;

/// Posts transport signals for one channel instance to the orchestrator.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    channel: ChannelId,
    inbox: mpsc::UnboundedSender<OrchestratorInput>,
}

impl ChannelSink {
    pub fn new(channel: ChannelId, inbox: mpsc::UnboundedSender<OrchestratorInput>) -> Self {
        Self { channel, inbox }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Returns false once the orchestrator has shut down.
    pub fn emit(&self, signal: ChannelSignal) -> bool {
        self.inbox
            .send(OrchestratorInput::Channel {
                channel: self.channel,
                signal,
            })
            .is_ok()
    }
}

/// Opens a duplex text connection.
///
/// `connect` must return immediately: the handshake runs in the background
/// and reports through `sink` (`Opened` or `Errored`, then frames, then
/// `Closed`/`Errored`). Text pushed into the returned sender is written to
/// the socket once open. Dropping the sender closes the connection without
/// emitting further signals the owner cares about.
pub trait ChannelConnector: Send + Sync {
    fn connect(&self, url: &str, sink: ChannelSink) -> mpsc::UnboundedSender<String>;
}

/// Outcome of applying a transport signal.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelUpdate {
    /// The channel moved to `state`. `detail` carries the close reason or
    /// transport error, if any.
    StateChanged {
        state: ChannelState,
        detail: Option<String>,
    },
    /// A well-formed frame arrived while open.
    Event(StreamEvent),
    /// Nothing changed (late signal, frame outside `Open`, malformed frame).
    Ignored,
}

/// Parse one server frame. Returns `None` for anything that is not a JSON
/// object of the expected shape.
pub fn parse_frame(text: &str) -> Option<StreamEvent> {
    serde_json::from_str::<StreamFrame>(text)
        .ok()
        .map(StreamEvent::from)
}

#[derive(Debug)]
pub struct StreamingChannel {
    id: ChannelId,
    url: String,
    state: ChannelState,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

impl StreamingChannel {
    /// Start a connection attempt. The returned channel is `Connecting`.
    pub fn open<C: ChannelConnector>(
        connector: &C,
        id: ChannelId,
        url: &str,
        inbox: mpsc::UnboundedSender<OrchestratorInput>,
    ) -> Self {
        tracing::info!(channel = %id, url, "opening generation channel");
        let outbound = connector.connect(url, ChannelSink::new(id, inbox));
        Self {
            id,
            url: url.to_string(),
            state: ChannelState::Connecting,
            outbound: Some(outbound),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// Send one generation request.
    ///
    /// Outside `Open` this is a no-op that raises a "channel not open"
    /// notification. Returns whether the frame was handed to the transport.
    pub fn send(
        &mut self,
        request: &GenerationRequest,
        notifications: &mut NotificationBus,
    ) -> bool {
        let Some(outbound) = self.outbound.as_ref().filter(|_| self.is_open()) else {
            tracing::warn!(channel = %self.id, state = %self.state, "send on channel that is not open");
            notifications.raise("Generation channel is not open", Severity::Bad);
            return false;
        };

        let payload = match serde_json::to_string(request) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(channel = %self.id, error = %e, "failed to encode generation request");
                notifications.raise("Failed to encode generation request", Severity::Bad);
                return false;
            }
        };

        if outbound.send(payload).is_err() {
            tracing::warn!(channel = %self.id, "transport task gone, channel not open");
            notifications.raise("Generation channel is not open", Severity::Bad);
            return false;
        }
        true
    }

    /// Close the channel. Idempotent.
    pub fn close(&mut self) {
        if self.state != ChannelState::Closed {
            tracing::debug!(channel = %self.id, from = %self.state, "closing generation channel");
        }
        self.state = ChannelState::Closed;
        self.outbound = None;
    }

    /// Apply a transport signal posted by the connector.
    pub fn apply(&mut self, signal: ChannelSignal) -> ChannelUpdate {
        match signal {
            ChannelSignal::Opened => {
                if self.state != ChannelState::Connecting {
                    return ChannelUpdate::Ignored;
                }
                self.state = ChannelState::Open;
                tracing::info!(channel = %self.id, "generation channel open");
                ChannelUpdate::StateChanged {
                    state: ChannelState::Open,
                    detail: None,
                }
            }
            ChannelSignal::Frame(text) => {
                if !self.is_open() {
                    tracing::debug!(channel = %self.id, state = %self.state, "frame outside open state dropped");
                    return ChannelUpdate::Ignored;
                }
                match parse_frame(&text) {
                    Some(event) => ChannelUpdate::Event(event),
                    None => {
                        tracing::warn!(channel = %self.id, frame = %text, "malformed frame ignored");
                        ChannelUpdate::Ignored
                    }
                }
            }
            ChannelSignal::Closed { reason } => self.terminate(ChannelState::Closed, reason),
            ChannelSignal::Errored(error) => self.terminate(ChannelState::Errored, Some(error)),
        }
    }

    fn terminate(&mut self, state: ChannelState, detail: Option<String>) -> ChannelUpdate {
        if self.state.is_terminal() {
            return ChannelUpdate::Ignored;
        }
        tracing::warn!(channel = %self.id, from = %self.state, to = %state, detail = ?detail, "generation channel ended");
        self.state = state;
        self.outbound = None;
        ChannelUpdate::StateChanged { state, detail }
    }
}
