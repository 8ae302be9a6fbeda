//! Event types for the chat event bus.
//!
//! `ChatEvent` is broadcast by the orchestrator whenever UI-relevant state
//! changes. All variants are Clone + Send + Sync for use with tokio broadcast
//! channels.

use serde::{Deserialize, Serialize};

use crate::chat::{Message, TurnPhase};
use crate::notification::Notification;
use crate::retrieval::DocumentChunk;
use crate::stream::{ChannelId, ChannelState};

/// Events emitted while the orchestrator processes turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// The turn phase changed.
    PhaseChanged { phase: TurnPhase },

    /// A fragment was appended to the preview accumulator.
    PreviewUpdated { fragment: String, preview: String },

    /// A message was appended to the conversation at `index`.
    MessageCommitted { index: usize, message: Message },

    /// Retrieval evidence for the current turn is available.
    EvidenceReady { chunks: Vec<DocumentChunk>, took: f64 },

    /// Autocomplete candidates changed (empty when cleared).
    SuggestionsUpdated { suggestions: Vec<String> },

    /// The current channel instance changed state.
    ChannelStateChanged {
        channel: ChannelId,
        state: ChannelState,
    },

    /// A notification became visible, replacing any previous one.
    NotificationRaised { notification: Notification },

    /// The visible notification expired.
    NotificationCleared,

    /// The conversation was reset to the seed message.
    ConversationReset { conversation: Vec<Message> },
}
