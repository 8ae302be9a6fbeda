//! WebSocket transport for the generation channel.

pub mod connector;

pub use connector::WsConnector;
