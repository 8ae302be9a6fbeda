//! One-shot question: open the channel, run a single turn, print the answer.
//!
//! The turn goes through the same orchestrator as the interactive chat, so
//! the question and answer are saved to the conversation like any other turn.

use std::time::Duration;

use anyhow::{Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use ragline_core::chat::OrchestratorHandle;
use ragline_types::chat::{Message, MessageRole, TurnPhase};
use ragline_types::event::ChatEvent;
use ragline_types::notification::Severity;
use ragline_types::retrieval::DocumentChunk;
use ragline_types::stream::ChannelState;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::chat::renderer::{ChatRenderer, message_body, sources_table};
use crate::cli::shutdown_signal;
use crate::state::AppState;

/// Everything one turn produced.
#[derive(Debug, Default)]
pub struct TurnOutcome {
    pub answer: Option<Message>,
    pub sources: Vec<DocumentChunk>,
    pub took: Option<f64>,
    /// Text of the last failure notification raised during the turn.
    pub failure: Option<String>,
}

pub async fn ask(
    state: &AppState,
    query: &str,
    connect_timeout: u64,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        bail!("nothing to ask");
    }

    let mut orchestrator = state.orchestrator()?;
    orchestrator.restore().await;
    let handle = orchestrator.handle();
    let mut events = orchestrator.events();

    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let cancel = cancel.clone();
        async move { orchestrator.run(cancel).await }
    });

    let spinner = (!json && !quiet).then(new_spinner);
    // Fragments are streamed only in the plain, non-quiet mode.
    let mut renderer = spinner.as_ref().map(|_| ChatRenderer::new(std::io::stdout()));

    let result = tokio::select! {
        result = async {
            wait_for_channel(&mut events, Duration::from_secs(connect_timeout), spinner.as_ref()).await?;
            run_turn(&handle, &mut events, query, spinner.as_ref(), renderer.as_mut()).await
        } => result,
        _ = shutdown_signal() => Err(anyhow::anyhow!("interrupted")),
    };

    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }
    cancel.cancel();
    if let Err(err) = runner.await {
        warn!("orchestrator task failed: {err}");
    }

    let outcome = result?;
    let Some(answer) = outcome.answer.as_ref() else {
        bail!(
            "{}",
            outcome
                .failure
                .as_deref()
                .unwrap_or("no answer was produced")
        );
    };

    if json {
        let out = serde_json::json!({
            "query": query,
            "answer": message_body(answer),
            "cached": answer.cached,
            "distance": answer.distance,
            "took": outcome.took,
            "sources": outcome.sources,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if quiet {
        println!("{}", message_body(answer));
    } else if !outcome.sources.is_empty() {
        println!("{}", sources_table(&outcome.sources));
        if let Some(took) = outcome.took {
            println!("  {}", style(format!("retrieved in {took:.2}s")).dim());
        }
    }
    Ok(())
}

fn new_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("connecting...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Wait until the orchestrator's first channel is open.
async fn wait_for_channel(
    events: &mut broadcast::Receiver<ChatEvent>,
    timeout: Duration,
    spinner: Option<&ProgressBar>,
) -> Result<()> {
    let mut failure = None;
    let wait = async {
        loop {
            match events.recv().await {
                Ok(ChatEvent::ChannelStateChanged { state, .. }) => match state {
                    ChannelState::Open => return Ok(()),
                    ChannelState::Connecting => {}
                    ChannelState::Closed | ChannelState::Errored => {
                        // The matching notification may follow; give it a moment.
                        let _ = tokio::time::timeout(Duration::from_millis(50), async {
                            while let Ok(event) = events.recv().await {
                                if let ChatEvent::NotificationRaised { notification } = event {
                                    failure = Some(notification.text);
                                    break;
                                }
                            }
                        })
                        .await;
                        return Err(());
                    }
                },
                Ok(ChatEvent::NotificationRaised { notification })
                    if notification.severity == Severity::Bad =>
                {
                    failure = Some(notification.text);
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Err(()),
            }
        }
    };

    let waited = tokio::time::timeout(timeout, wait).await;
    match waited {
        Ok(Ok(())) => {
            if let Some(spinner) = spinner {
                spinner.set_message("searching documents...");
            }
            Ok(())
        }
        Ok(Err(())) => bail!(
            "could not connect to the generation service: {}",
            failure.as_deref().unwrap_or("connection closed")
        ),
        Err(_) => bail!("timed out connecting to the generation service"),
    }
}

/// Submit `query` and follow the turn's events until it returns to idle.
pub async fn run_turn<W: std::io::Write>(
    handle: &OrchestratorHandle,
    events: &mut broadcast::Receiver<ChatEvent>,
    query: &str,
    spinner: Option<&ProgressBar>,
    mut renderer: Option<&mut ChatRenderer<W>>,
) -> Result<TurnOutcome> {
    let mut outcome = TurnOutcome::default();

    handle.submit(query);
    // Submit and this snapshot are queued back to back, so the snapshot
    // shows whether the turn was accepted.
    let Some(snapshot) = handle.snapshot().await else {
        bail!("orchestrator stopped");
    };
    if snapshot.phase.is_idle() {
        outcome.failure = snapshot.notification.map(|n| n.text);
        return Ok(outcome);
    }

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "turn events skipped");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match event {
            ChatEvent::PhaseChanged { phase } => match phase {
                TurnPhase::Streaming => {
                    if let Some(spinner) = spinner {
                        spinner.set_message("generating...");
                    }
                }
                TurnPhase::Idle => break,
                TurnPhase::Retrieving => {}
            },
            ChatEvent::EvidenceReady { chunks, took } => {
                outcome.sources = chunks;
                outcome.took = Some(took);
            }
            ChatEvent::PreviewUpdated { fragment, .. } => {
                if let Some(renderer) = renderer.as_deref_mut() {
                    if let Some(spinner) = spinner {
                        spinner.finish_and_clear();
                    }
                    renderer.fragment(&fragment);
                }
            }
            ChatEvent::MessageCommitted { message, .. } if message.role == MessageRole::System => {
                if let Some(renderer) = renderer.as_deref_mut() {
                    if let Some(spinner) = spinner {
                        spinner.finish_and_clear();
                    }
                    renderer.committed(&message);
                }
                outcome.answer = Some(message);
            }
            ChatEvent::NotificationRaised { notification }
                if notification.severity == Severity::Bad =>
            {
                outcome.failure = Some(notification.text);
            }
            _ => {}
        }
    }

    if outcome.answer.is_none() {
        if let Some(renderer) = renderer {
            renderer.abandon_stream();
        }
    }
    Ok(outcome)
}
