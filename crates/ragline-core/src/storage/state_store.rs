//! Durable key-value state trait.
//!
//! Stores JSON values under string keys. The client uses a handful of
//! well-known keys (see `chat::conversation`); everything else is opaque.

use ragline_types::error::RepositoryError;

/// Trait for local durable key-value storage.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in ragline-infra.
pub trait StateStore: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, RepositoryError>> + Send;

    /// Set a value for a key (upsert).
    fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a key. No-op if key does not exist.
    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
