//! Generation channel types: wire frames, parsed events, and channel lifecycle.
//!
//! The channel is text-framed with one JSON object per frame. The client sends
//! a single [`GenerationRequest`] per turn; the server answers with zero or more
//! non-terminal frames followed by exactly one terminal frame
//! (`finish_reason == "stop"`).

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::chat::Message;
use crate::serde_util::opt_string_or_number;

/// Finish reason that marks the terminal frame of a turn.
pub const FINISH_REASON_STOP: &str = "stop";

/// Client -> server frame, sent once per turn after retrieval succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub query: String,
    pub context: String,
    pub conversation: Vec<Message>,
}

/// Server -> client frame as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamFrame {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub finish_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub distance: Option<String>,
}

impl StreamFrame {
    pub fn is_terminal(&self) -> bool {
        self.finish_reason == FINISH_REASON_STOP
    }
}

/// One incremental unit of a generation, parsed from a [`StreamFrame`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text to append to the in-progress preview.
    Fragment { text: String },
    /// Last frame of the turn. `full_text` is authoritative over the
    /// concatenated fragments.
    Terminal {
        fragment: String,
        full_text: Option<String>,
        cached: bool,
        distance: Option<String>,
    },
}

impl StreamEvent {
    /// The fragment carried by this event, terminal or not.
    pub fn fragment(&self) -> &str {
        match self {
            StreamEvent::Fragment { text } => text,
            StreamEvent::Terminal { fragment, .. } => fragment,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Terminal { .. })
    }
}

impl From<StreamFrame> for StreamEvent {
    fn from(frame: StreamFrame) -> Self {
        if frame.is_terminal() {
            StreamEvent::Terminal {
                fragment: frame.message,
                full_text: frame.full_text,
                cached: frame.cached.unwrap_or(false),
                distance: frame.distance,
            }
        } else {
            StreamEvent::Fragment {
                text: frame.message,
            }
        }
    }
}

/// Lifecycle state of a generation channel instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
    Errored,
}

impl ChannelState {
    /// Closed and Errored instances are never reused.
    pub fn is_terminal(self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Errored)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Connecting => write!(f, "connecting"),
            ChannelState::Open => write!(f, "open"),
            ChannelState::Closed => write!(f, "closed"),
            ChannelState::Errored => write!(f, "errored"),
        }
    }
}

/// Identifier of one channel instance. A fresh id is minted per connection
/// attempt so signals from superseded instances can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl ChannelId {
    pub fn next(self) -> Self {
        ChannelId(self.0 + 1)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Transport-level signal posted by a channel connector.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSignal {
    /// Handshake completed.
    Opened,
    /// A raw text frame arrived. Parsing is the channel owner's job.
    Frame(String),
    /// The connection closed (by either side).
    Closed { reason: Option<String> },
    /// Connect failure or transport error.
    Errored(String),
}
