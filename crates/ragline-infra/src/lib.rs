//! Infrastructure layer for ragline.
//!
//! Contains implementations of the traits defined in `ragline-core`:
//! HTTP retrieval and suggestion clients (reqwest), the WebSocket generation
//! channel connector (tokio-tungstenite), SQLite and in-memory state stores,
//! and the `config.toml` loader.

pub mod config;
pub mod http;
pub mod memory;
pub mod sqlite;
pub mod ws;
