use std::time::Duration;

use ragline_types::config::ServerConfig;
use ragline_types::error::ClientError;
use ragline_types::retrieval::QueryRequest;
use secrecy::{ExposeSecret, SecretString};

/// Shared reqwest client for backend calls.
///
/// Cloning is cheap: `reqwest::Client` is reference counted.
#[derive(Clone)]
pub struct BackendHttp {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl BackendHttp {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }

    pub fn from_config(server: &ServerConfig) -> Result<Self, ClientError> {
        Self::new(
            server.base_url.clone(),
            server.api_key.clone().map(SecretString::from),
            Duration::from_secs(server.request_timeout_secs.max(1)),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST `{query}` to `path` and return the raw response body.
    ///
    /// Transport failures (including timeouts) map to `Network`; a non-2xx
    /// status maps to `Http` with the response body.
    pub async fn post_query(&self, path: &str, query: &str) -> Result<String, ClientError> {
        let url = self.url(path);
        let mut request = self.client.post(&url).json(&QueryRequest::new(query));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Network(format!(
                    "request to {url} timed out after {}s",
                    self.timeout.as_secs()
                ))
            } else {
                ClientError::Network(format!("request to {url} failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%url, status = status.as_u16(), "backend returned error status");
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .text()
            .await
            .map_err(|e| ClientError::Network(format!("failed to read response from {url}: {e}")))
    }
}

// Hand-written so the bearer token never reaches logs.
impl std::fmt::Debug for BackendHttp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendHttp")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.api_key.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let http = BackendHttp::new("http://localhost:8000/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(http.base_url(), "http://localhost:8000");
        assert_eq!(http.url("/api/query"), "http://localhost:8000/api/query");
    }

    #[test]
    fn debug_hides_api_key() {
        let http = BackendHttp::new(
            "http://localhost:8000",
            Some(SecretString::from("sk-hidden".to_string())),
            Duration::from_secs(5),
        )
        .unwrap();
        let debug = format!("{http:?}");
        assert!(!debug.contains("sk-hidden"));
        assert!(debug.contains("authenticated: true"));
    }

    #[test]
    fn from_config_uses_server_settings() {
        let server = ServerConfig {
            base_url: "https://rag.example.com".to_string(),
            request_timeout_secs: 0,
            ..ServerConfig::default()
        };
        let http = BackendHttp::from_config(&server).unwrap();
        assert_eq!(http.base_url(), "https://rag.example.com");
        assert_eq!(http.timeout, Duration::from_secs(1));
    }
}
