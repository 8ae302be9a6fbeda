//! WsConnector -- concrete [`ChannelConnector`] over tokio-tungstenite.
//!
//! Each `connect` spawns one task that owns the socket for the lifetime of
//! the channel instance. The task multiplexes outbound text from the
//! orchestrator with inbound frames from the server using `tokio::select!`
//! and reports everything through the instance's [`ChannelSink`]:
//!
//! - `Opened` after the handshake, or `Errored` if it fails
//! - `Frame` for every inbound text frame (parsing happens in the core)
//! - `Closed` / `Errored` when the connection ends
//!
//! Dropping the outbound sender (the orchestrator discarding the instance)
//! closes the socket quietly.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use ragline_core::channel::{ChannelConnector, ChannelSink};
use ragline_types::stream::ChannelSignal;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone)]
pub struct WsConnector {
    handshake_timeout: Duration,
}

impl WsConnector {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl ChannelConnector for WsConnector {
    fn connect(&self, url: &str, sink: ChannelSink) -> mpsc::UnboundedSender<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(
            url.to_string(),
            self.handshake_timeout,
            sink,
            rx,
        ));
        tx
    }
}

async fn run_connection(
    url: String,
    handshake_timeout: Duration,
    sink: ChannelSink,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let channel = sink.channel();
    let socket = match tokio::time::timeout(handshake_timeout, connect_async(url.as_str())).await {
        Ok(Ok((socket, _response))) => socket,
        Ok(Err(e)) => {
            tracing::warn!(%channel, %url, error = %e, "channel handshake failed");
            sink.emit(ChannelSignal::Errored(e.to_string()));
            return;
        }
        Err(_) => {
            tracing::warn!(%channel, %url, "channel handshake timed out");
            sink.emit(ChannelSignal::Errored(format!(
                "handshake timed out after {}s",
                handshake_timeout.as_secs()
            )));
            return;
        }
    };

    if !sink.emit(ChannelSignal::Opened) {
        return;
    }
    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            payload = outbound.recv() => match payload {
                Some(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text)).await {
                        sink.emit(ChannelSignal::Errored(e.to_string()));
                        break;
                    }
                }
                None => {
                    // Instance discarded by its owner.
                    let _ = ws_sender.close().await;
                    break;
                }
            },

            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if !sink.emit(ChannelSignal::Frame(text)) {
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty());
                    sink.emit(ChannelSignal::Closed { reason });
                    break;
                }
                Some(Err(e)) => {
                    sink.emit(ChannelSignal::Errored(e.to_string()));
                    break;
                }
                None => {
                    sink.emit(ChannelSignal::Closed { reason: None });
                    break;
                }
                // Binary, ping, and pong frames are handled by tungstenite.
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!(%channel, "channel transport task finished");
}
