//! Orchestrator inbox.
//!
//! Every state change the orchestrator makes starts as an [`OrchestratorInput`]
//! posted to its unbounded inbox: user actions through an
//! [`OrchestratorHandle`], transport signals through a `ChannelSink`, and
//! completions of the spawned HTTP calls from the tasks themselves.

use ragline_types::chat::TurnId;
use ragline_types::error::ClientError;
use ragline_types::retrieval::RetrievalResult;
use ragline_types::stream::{ChannelId, ChannelSignal};
use tokio::sync::{mpsc, oneshot};

use crate::chat::orchestrator::ChatSnapshot;

#[derive(Debug)]
pub enum OrchestratorInput {
    /// The user submitted a query.
    Submit(String),
    /// Clear the conversation back to the seed.
    Reset,
    /// Discard the current channel and open a fresh one.
    Reconnect,
    /// Request autocomplete candidates for partial input.
    Suggest(String),
    /// A retrieval call started for `turn` finished.
    RetrievalSettled {
        turn: TurnId,
        query: String,
        outcome: Result<RetrievalResult, ClientError>,
    },
    /// A suggestion call started at `epoch` finished.
    SuggestionsSettled {
        epoch: u64,
        outcome: Result<Vec<String>, ClientError>,
    },
    /// A transport signal from channel instance `channel`.
    Channel {
        channel: ChannelId,
        signal: ChannelSignal,
    },
    /// Reply with a copy of the current state.
    Snapshot(oneshot::Sender<ChatSnapshot>),
    /// Periodic housekeeping (notification expiry).
    Tick,
}

/// Cloneable front door to a running orchestrator.
///
/// Each method returns false once the orchestrator has stopped.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    inbox: mpsc::UnboundedSender<OrchestratorInput>,
}

impl OrchestratorHandle {
    pub fn new(inbox: mpsc::UnboundedSender<OrchestratorInput>) -> Self {
        Self { inbox }
    }

    pub fn submit(&self, query: impl Into<String>) -> bool {
        self.send(OrchestratorInput::Submit(query.into()))
    }

    pub fn reset(&self) -> bool {
        self.send(OrchestratorInput::Reset)
    }

    pub fn reconnect(&self) -> bool {
        self.send(OrchestratorInput::Reconnect)
    }

    pub fn suggest(&self, partial: impl Into<String>) -> bool {
        self.send(OrchestratorInput::Suggest(partial.into()))
    }

    /// Ask the running orchestrator for its current state. Returns `None`
    /// once it has stopped.
    pub async fn snapshot(&self) -> Option<ChatSnapshot> {
        let (tx, rx) = oneshot::channel();
        if !self.send(OrchestratorInput::Snapshot(tx)) {
            return None;
        }
        rx.await.ok()
    }

    pub fn send(&self, input: OrchestratorInput) -> bool {
        self.inbox.send(input).is_ok()
    }
}
