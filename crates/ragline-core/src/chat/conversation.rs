//! Durable conversation history.
//!
//! The in-memory sequence is authoritative for the session. Storage failures
//! are logged and otherwise ignored; a corrupt or missing record loads as the
//! seed conversation.

use ragline_types::chat::Message;

use crate::storage::StateStore;

/// Storage key holding the serialized `Vec<Message>`.
pub const CONVERSATION_KEY: &str = "conversation";

/// Storage key holding the last retrieval context string.
pub const CONTEXT_KEY: &str = "context";

pub struct ConversationStore<S: StateStore> {
    store: S,
    intro: String,
    messages: Vec<Message>,
}

impl<S: StateStore> ConversationStore<S> {
    /// Create a store holding only the seed message. Call [`load`](Self::load)
    /// to restore persisted history.
    pub fn new(store: S, intro: impl Into<String>) -> Self {
        let intro = intro.into();
        let messages = vec![Message::system(intro.clone())];
        Self {
            store,
            intro,
            messages,
        }
    }

    /// The single-element conversation a fresh or reset session starts with.
    pub fn seed(&self) -> Vec<Message> {
        vec![Message::system(self.intro.clone())]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Access the underlying state store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Restore the persisted conversation, falling back to the seed when the
    /// record is absent, empty, or unreadable.
    pub async fn load(&mut self) -> &[Message] {
        self.messages = match self.store.get(CONVERSATION_KEY).await {
            Ok(Some(value)) => match serde_json::from_value::<Vec<Message>>(value) {
                Ok(messages) if !messages.is_empty() => {
                    tracing::debug!(count = messages.len(), "restored conversation");
                    messages
                }
                Ok(_) => self.seed(),
                Err(e) => {
                    tracing::warn!(error = %e, "stored conversation is corrupt, starting fresh");
                    self.seed()
                }
            },
            Ok(None) => self.seed(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read conversation, starting fresh");
                self.seed()
            }
        };
        &self.messages
    }

    /// Append a message. The full sequence is persisted only once it holds
    /// more than the seed, so a fresh start never overwrites saved history.
    pub async fn append(&mut self, message: Message) -> &[Message] {
        self.messages.push(message);
        if self.messages.len() > 1 {
            self.persist().await;
        }
        &self.messages
    }

    /// Clear persisted state and return to the seed conversation.
    pub async fn reset(&mut self) -> &[Message] {
        for key in [CONVERSATION_KEY, CONTEXT_KEY] {
            if let Err(e) = self.store.delete(key).await {
                tracing::warn!(key, error = %e, "failed to clear stored state");
            }
        }
        self.messages = self.seed();
        &self.messages
    }

    /// Remember the context handed to the last generation request.
    pub async fn save_context(&self, context: &str) {
        let value = serde_json::Value::String(context.to_string());
        if let Err(e) = self.store.set(CONTEXT_KEY, &value).await {
            tracing::warn!(error = %e, "failed to persist retrieval context");
        }
    }

    /// The last persisted context, or an empty string.
    pub async fn last_context(&self) -> String {
        match self.store.get(CONTEXT_KEY).await {
            Ok(Some(serde_json::Value::String(context))) => context,
            Ok(_) => String::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read retrieval context");
                String::new()
            }
        }
    }

    async fn persist(&self) {
        let value = match serde_json::to_value(&self.messages) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize conversation");
                return;
            }
        };
        if let Err(e) = self.store.set(CONVERSATION_KEY, &value).await {
            tracing::warn!(error = %e, "failed to persist conversation");
        }
    }
}
