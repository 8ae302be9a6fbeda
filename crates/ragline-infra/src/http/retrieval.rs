//! HttpRetrievalClient -- concrete [`RetrievalClient`] over `POST /api/query`.

use ragline_core::backend::RetrievalClient;
use ragline_types::error::ClientError;
use ragline_types::retrieval::RetrievalResult;

use super::client::BackendHttp;

pub struct HttpRetrievalClient {
    http: BackendHttp,
}

impl HttpRetrievalClient {
    pub const PATH: &'static str = "/api/query";

    pub fn new(http: BackendHttp) -> Self {
        Self { http }
    }
}

impl RetrievalClient for HttpRetrievalClient {
    async fn retrieve(&self, query: &str) -> Result<RetrievalResult, ClientError> {
        let body = self.http.post_query(Self::PATH, query).await?;
        let result: RetrievalResult = serde_json::from_str(&body)
            .map_err(|e| ClientError::Decode(format!("invalid retrieval response: {e}")))?;

        tracing::debug!(
            chunks = result.chunks.len(),
            took = result.took,
            error = %result.error,
            "retrieval response"
        );
        Ok(result)
    }
}
