//! Conversation orchestration.
//!
//! - [`conversation`]: durable message history
//! - [`suggest`]: admission control for autocomplete calls
//! - [`input`]: the orchestrator's inbox vocabulary and handle
//! - [`orchestrator`]: the turn state machine tying everything together

pub mod conversation;
pub mod input;
pub mod orchestrator;
pub mod suggest;

pub use conversation::ConversationStore;
pub use input::{OrchestratorHandle, OrchestratorInput};
pub use orchestrator::{ChatOrchestrator, ChatSnapshot};
pub use suggest::SuggestionGate;
