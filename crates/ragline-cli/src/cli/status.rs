//! Status command: configuration, stored state, and backend reachability.

use std::time::Duration;

use anyhow::Result;
use console::style;

use ragline_core::backend::SuggestionClient;
use ragline_core::channel::{ChannelConnector, ChannelSink};
use ragline_core::chat::OrchestratorInput;
use ragline_infra::http::HttpSuggestionClient;
use ragline_infra::ws::WsConnector;
use ragline_types::error::ClientError;
use ragline_types::stream::{ChannelId, ChannelSignal};
use tokio::sync::mpsc;

use crate::state::{AppState, ClientStateStore};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one reachability check.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    Reachable(String),
    Unreachable(String),
}

impl Probe {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Probe::Reachable(_))
    }

    pub fn detail(&self) -> &str {
        match self {
            Probe::Reachable(detail) | Probe::Unreachable(detail) => detail,
        }
    }
}

/// Display configuration, storage, and whether both backend endpoints answer.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let mut conversation = state.conversation();
    let messages = conversation.load().await.len();
    let context_chars = conversation.last_context().await.chars().count();

    let entries = match state.store() {
        ClientStateStore::Sqlite(store) => Some(store.entries().await?),
        ClientStateStore::Memory(_) => None,
    };

    let http = probe_http(&HttpSuggestionClient::new(state.backend()?)).await;
    let channel = probe_channel(&WsConnector::default(), &state.config.server.channel_url).await;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "ephemeral": state.db_pool.is_none(),
            "server": {
                "base_url": state.config.server.base_url,
                "channel_url": state.config.server.channel_url,
                "api_key_set": state.config.server.api_key.is_some(),
            },
            "conversation": {
                "messages": messages,
                "last_context_chars": context_chars,
            },
            "stored_keys": entries.as_ref().map(|e| {
                e.iter()
                    .map(|(key, updated_at)| serde_json::json!({"key": key, "updated_at": updated_at}))
                    .collect::<Vec<_>>()
            }),
            "backend": {
                "http": { "reachable": http.is_reachable(), "detail": http.detail() },
                "channel": { "reachable": channel.is_reachable(), "detail": channel.detail() },
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} ragline v{}", style("◆").cyan(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Backend ──").dim());
    println!("  Base URL: {}", style(&state.config.server.base_url).bold());
    println!("  Channel:  {}", style(&state.config.server.channel_url).bold());
    println!(
        "  API key:  {}",
        if state.config.server.api_key.is_some() {
            style("set").green()
        } else {
            style("not set").dim()
        }
    );
    println!("  {} HTTP     {}", check_mark(&http), style(http.detail()).dim());
    println!("  {} Channel  {}", check_mark(&channel), style(channel.detail()).dim());
    println!();

    println!("  {}", style("── Conversation ──").dim());
    println!("  Messages:     {}", style(messages).bold());
    println!("  Last context: {} chars", context_chars);
    println!();

    println!("  {}", style("── Storage ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    match &entries {
        Some(entries) => {
            println!(
                "  Database: {}",
                style(format!("{} (SQLite, WAL mode)", state.config.storage.database_file)).dim()
            );
            for (key, updated_at) in entries {
                println!("    {} {}", style(key).cyan(), style(format!("updated {updated_at}")).dim());
            }
        }
        None => println!("  Database: {}", style("none (ephemeral)").yellow()),
    }
    println!();

    Ok(())
}

fn check_mark(probe: &Probe) -> String {
    if probe.is_reachable() {
        format!("{}", style("✓").green())
    } else {
        format!("{}", style("✗").red())
    }
}

/// Any HTTP answer, even an error status, means the server is up.
pub async fn probe_http<G: SuggestionClient>(client: &G) -> Probe {
    match tokio::time::timeout(PROBE_TIMEOUT, client.suggest("status")).await {
        Ok(Ok(_)) => Probe::Reachable("ok".to_string()),
        Ok(Err(ClientError::Http { status, .. })) => {
            Probe::Reachable(format!("answered with HTTP {status}"))
        }
        Ok(Err(err)) => Probe::Unreachable(err.to_string()),
        Err(_) => Probe::Unreachable("timed out".to_string()),
    }
}

/// Open a throwaway channel instance and wait for its first signal.
pub async fn probe_channel<C: ChannelConnector>(connector: &C, url: &str) -> Probe {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let outbound = connector.connect(url, ChannelSink::new(ChannelId(1), tx));

    let first = tokio::time::timeout(PROBE_TIMEOUT, async {
        while let Some(input) = rx.recv().await {
            if let OrchestratorInput::Channel { signal, .. } = input {
                return Some(signal);
            }
        }
        None
    })
    .await;
    drop(outbound);

    match first {
        Ok(Some(ChannelSignal::Opened)) => Probe::Reachable("handshake ok".to_string()),
        Ok(Some(ChannelSignal::Errored(err))) => Probe::Unreachable(err),
        Ok(Some(ChannelSignal::Closed { reason })) => Probe::Unreachable(
            reason.unwrap_or_else(|| "closed during handshake".to_string()),
        ),
        Ok(Some(ChannelSignal::Frame(_))) => Probe::Reachable("handshake ok".to_string()),
        Ok(None) => Probe::Unreachable("connector stopped".to_string()),
        Err(_) => Probe::Unreachable("timed out".to_string()),
    }
}
