//! HTTP clients for the retrieval backend.
//!
//! Both calls are `POST {base_url}{path}` with a `{query}` JSON body. The
//! shared [`BackendHttp`] owns the reqwest client, the optional bearer token,
//! and the status/transport error mapping.

pub mod client;
pub mod retrieval;
pub mod suggestion;

pub use client::BackendHttp;
pub use retrieval::HttpRetrievalClient;
pub use suggestion::HttpSuggestionClient;
