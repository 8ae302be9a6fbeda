//! Storage abstractions for ragline.
//!
//! Defines the durable key-value port used to persist the conversation and
//! the last retrieval context. Implementations live in ragline-infra.

pub mod state_store;

pub use state_store::StateStore;
