//! Retrieval and suggestion payloads.
//!
//! Wire shapes for the two one-shot HTTP calls:
//!
//! - retrieval: `{query}` -> `{error, chunks, context, took}`
//! - suggestion: `{query}` -> `{suggestions}`

use serde::{Deserialize, Serialize};

use crate::serde_util::string_or_number;

/// Request body shared by the retrieval and suggestion calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

/// A scored evidence fragment returned by retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub doc_name: String,
    pub doc_uuid: String,
    #[serde(deserialize_with = "string_or_number")]
    pub chunk_id: String,
    pub score: f64,
    pub text: String,
}

/// Supporting evidence for one submitted query.
///
/// A non-empty `error` is an application-level failure reported by the
/// server; it is returned as a value, not as an `Err`, so the caller can
/// surface the message instead of treating it as a transport failure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub chunks: Vec<DocumentChunk>,
    #[serde(default)]
    pub context: String,
    /// Elapsed server time in seconds.
    #[serde(default)]
    pub took: f64,
}

impl RetrievalResult {
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    pub fn has_context(&self) -> bool {
        !self.context.is_empty()
    }
}

/// Autocomplete candidates for a partial query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SuggestionResponse {
    #[serde(default)]
    pub suggestions: Vec<String>,
}
