//! One-shot request/response backends: retrieval and autocomplete.

pub mod retrieval;

pub use retrieval::{RetrievalClient, SuggestionClient};
