//! Retrieval and suggestion client traits.
//!
//! Implementations live in ragline-infra (HTTP). Both calls are
//! request/response; neither mutates local state.

use ragline_types::error::ClientError;
use ragline_types::retrieval::RetrievalResult;

/// Fetches supporting evidence for a query.
///
/// A response whose `error` field is non-empty is returned as `Ok`; only
/// transport and protocol failures map to `Err`.
pub trait RetrievalClient: Send + Sync {
    fn retrieve(
        &self,
        query: &str,
    ) -> impl std::future::Future<Output = Result<RetrievalResult, ClientError>> + Send;
}

/// Fetches autocomplete candidates for partial input.
///
/// Admission control (empty input, busy turn, disabled feature) is the
/// caller's job; see `chat::suggest::SuggestionGate`.
pub trait SuggestionClient: Send + Sync {
    fn suggest(
        &self,
        partial: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, ClientError>> + Send;
}
