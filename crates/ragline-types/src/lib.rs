//! Shared domain types for ragline.
//!
//! This crate contains the data model exchanged between the chat orchestrator,
//! its backends, and the front ends: messages, retrieval results, streaming
//! frames, notifications, UI events, configuration, and error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod notification;
pub mod retrieval;
pub mod stream;

mod serde_util;
