//! Chat orchestration and backend trait definitions for ragline.
//!
//! This crate defines the "ports" (traits) that the infrastructure layer
//! implements -- durable state, retrieval, suggestions, and the generation
//! channel transport -- plus the state machines that drive a conversation.
//! It depends only on `ragline-types`, never on `ragline-infra` or any
//! network/database crate.

pub mod backend;
pub mod channel;
pub mod chat;
pub mod event;
pub mod notify;
pub mod storage;
