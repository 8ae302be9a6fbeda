//! HttpSuggestionClient -- concrete [`SuggestionClient`] over `POST /api/suggestions`.

use ragline_core::backend::SuggestionClient;
use ragline_types::error::ClientError;
use ragline_types::retrieval::SuggestionResponse;

use super::client::BackendHttp;

pub struct HttpSuggestionClient {
    http: BackendHttp,
}

impl HttpSuggestionClient {
    pub const PATH: &'static str = "/api/suggestions";

    pub fn new(http: BackendHttp) -> Self {
        Self { http }
    }
}

impl SuggestionClient for HttpSuggestionClient {
    /// Blank input yields no suggestions without a request. A body that is
    /// not a clean `{suggestions}` payload also yields none rather than an
    /// error.
    async fn suggest(&self, partial: &str) -> Result<Vec<String>, ClientError> {
        if partial.trim().is_empty() {
            return Ok(Vec::new());
        }
        let body = self.http.post_query(Self::PATH, partial).await?;
        match serde_json::from_str::<SuggestionResponse>(&body) {
            Ok(response) => Ok(response.suggestions),
            Err(e) => {
                tracing::debug!(error = %e, "unclean suggestion payload, treating as empty");
                Ok(Vec::new())
            }
        }
    }
}
