//! Generation channel lifecycle.
//!
//! The transport itself (WebSocket) is implemented in ragline-infra behind
//! [`ChannelConnector`]; this module owns the state machine and frame parsing.

pub mod streaming;

pub use streaming::{ChannelConnector, ChannelSink, ChannelUpdate, StreamingChannel, parse_frame};
