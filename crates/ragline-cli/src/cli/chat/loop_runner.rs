//! Main chat loop.
//!
//! Spawns the orchestrator on its own task, then multiplexes two sources
//! with `tokio::select!`: lines typed at the prompt, and `ChatEvent`s
//! broadcast by the orchestrator. Input never waits for a turn to finish,
//! so `/reset` and `/reconnect` work while an answer is still streaming.

use std::io::Write;

use console::style;
use ragline_core::chat::OrchestratorHandle;
use ragline_types::chat::{MessageRole, TurnPhase};
use ragline_types::event::ChatEvent;
use ragline_types::retrieval::DocumentChunk;
use ragline_types::stream::ChannelState;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::AppState;

use super::banner::print_welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer::ChatRenderer;

/// What the loop knows about the orchestrator, built only from events.
#[derive(Debug, Default)]
pub struct ChatView {
    pub phase: TurnPhase,
    pub evidence: Option<(Vec<DocumentChunk>, f64)>,
    pub channel: Option<ChannelState>,
}

impl ChatView {
    /// Render one event and fold it into the view.
    pub fn apply<W: Write>(&mut self, event: ChatEvent, renderer: &mut ChatRenderer<W>) {
        match event {
            ChatEvent::PhaseChanged { phase } => {
                self.phase = phase;
                match phase {
                    TurnPhase::Retrieving => renderer.status("searching documents..."),
                    TurnPhase::Streaming => {}
                    TurnPhase::Idle => renderer.abandon_stream(),
                }
            }
            ChatEvent::PreviewUpdated { fragment, .. } => renderer.fragment(&fragment),
            ChatEvent::MessageCommitted { message, .. } => {
                // The prompt already echoed the user's line.
                if message.role == MessageRole::System {
                    renderer.committed(&message);
                }
            }
            ChatEvent::EvidenceReady { chunks, took } => {
                renderer.status(&format!(
                    "{} source(s) found in {took:.2}s, /sources to list",
                    chunks.len()
                ));
                self.evidence = Some((chunks, took));
            }
            ChatEvent::SuggestionsUpdated { suggestions } => {
                if !suggestions.is_empty() {
                    renderer.suggestions(&suggestions);
                }
            }
            ChatEvent::ChannelStateChanged { channel, state } => {
                debug!(%channel, %state, "channel state changed");
                self.channel = Some(state);
            }
            ChatEvent::NotificationRaised { notification } => renderer.notice(&notification),
            ChatEvent::NotificationCleared => {}
            ChatEvent::ConversationReset { conversation } => {
                self.evidence = None;
                renderer.abandon_stream();
                renderer.transcript(&conversation);
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.channel == Some(ChannelState::Open)
    }
}

/// Run the interactive chat loop until `/exit` or Ctrl+D.
pub async fn run_chat_loop(state: &AppState) -> anyhow::Result<()> {
    let mut orchestrator = state.orchestrator()?;
    let restored = orchestrator.restore().await.to_vec();
    let handle = orchestrator.handle();
    let mut events = orchestrator.events();

    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let cancel = cancel.clone();
        async move { orchestrator.run(cancel).await }
    });

    let storage = match &state.db_pool {
        Some(_) => state
            .data_dir
            .join(&state.config.storage.database_file)
            .display()
            .to_string(),
        None => "in memory (ephemeral)".to_string(),
    };
    print_welcome_banner(&state.config.server, &storage, restored.len());

    let (mut input, writer) = ChatInput::new(false)
        .map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;
    let mut renderer = ChatRenderer::new(writer);
    renderer.transcript(&restored);

    let mut view = ChatView::default();
    info!(restored = restored.len(), "chat session started");

    loop {
        tokio::select! {
            line = input.read_line() => match line {
                InputEvent::Eof => break,
                InputEvent::Interrupted => {
                    renderer.status("Press Ctrl+D or type /exit to leave.");
                }
                InputEvent::Message(text) => {
                    if text.is_empty() {
                        continue;
                    }
                    input.remember(&text);
                    if let Some(cmd) = commands::parse(&text) {
                        if !run_command(cmd, state, &handle, &view, &mut input, &mut renderer).await {
                            break;
                        }
                        continue;
                    }
                    if !view.phase.is_idle() {
                        renderer.status("Still answering the previous question.");
                        continue;
                    }
                    if !handle.submit(text) {
                        warn!("orchestrator stopped; leaving chat");
                        break;
                    }
                }
            },
            event = events.recv() => match event {
                Ok(event) => {
                    view.apply(event, &mut renderer);
                    input.set_connected(view.is_connected());
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "chat view fell behind; some events were skipped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    renderer.status("Session ended.");
    input.flush();
    cancel.cancel();
    if let Err(err) = runner.await {
        warn!("orchestrator task failed: {err}");
    }
    Ok(())
}

/// Execute one slash command. Returns false when the loop should exit.
async fn run_command<W: Write>(
    cmd: ChatCommand,
    state: &AppState,
    handle: &OrchestratorHandle,
    view: &ChatView,
    input: &mut ChatInput,
    renderer: &mut ChatRenderer<W>,
) -> bool {
    match cmd {
        ChatCommand::Help => renderer.raw(&commands::help_text()),
        ChatCommand::Clear => input.clear(),
        ChatCommand::Exit => return false,
        ChatCommand::Reset => {
            handle.reset();
        }
        ChatCommand::Reconnect => {
            renderer.status("Reconnecting...");
            handle.reconnect();
        }
        ChatCommand::History => match handle.snapshot().await {
            Some(snapshot) => renderer.transcript(&snapshot.conversation),
            None => return false,
        },
        ChatCommand::Sources => match &view.evidence {
            Some((chunks, took)) => renderer.sources(chunks, *took),
            None => renderer.status("No sources yet. Ask a question first."),
        },
        ChatCommand::Suggest(partial) => {
            if !state.config.chat.suggestions_enabled {
                renderer.status("Suggestions are disabled in the configuration.");
            } else if !view.phase.is_idle() {
                renderer.status("Suggestions are available once the answer is done.");
            } else {
                handle.suggest(partial);
            }
        }
        ChatCommand::Status => match handle.snapshot().await {
            Some(snapshot) => {
                let channel = snapshot
                    .channel
                    .map(|(id, state)| format!("{state} ({id})"))
                    .unwrap_or_else(|| "none".to_string());
                renderer.raw(&format!(
                    "\n  {}  {}\n  {}  {}\n  {}  {}\n  {}  {} chars\n\n",
                    style("Turn:").bold(),
                    snapshot.phase,
                    style("Channel:").bold(),
                    channel,
                    style("Messages:").bold(),
                    snapshot.conversation.len(),
                    style("Context:").bold(),
                    snapshot.context.chars().count(),
                ));
            }
            None => return false,
        },
        ChatCommand::Unknown(name) => renderer.status(&format!(
            "Unknown command: {name}. Type /help for available commands."
        )),
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ragline_types::chat::Message;
    use ragline_types::notification::{Notification, Severity};
    use ragline_types::stream::ChannelId;

    fn rendered(renderer: ChatRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    fn chunk() -> DocumentChunk {
        DocumentChunk {
            doc_name: "intro.md".to_string(),
            doc_uuid: "9f1c".to_string(),
            chunk_id: "4".to_string(),
            score: 0.82,
            text: "Vectors".to_string(),
        }
    }

    #[test]
    fn full_turn_renders_answer_once() {
        console::set_colors_enabled(false);
        let mut view = ChatView::default();
        let mut r = ChatRenderer::new(Vec::new());

        for event in [
            ChatEvent::MessageCommitted {
                index: 1,
                message: Message::user("what is rag"),
            },
            ChatEvent::PhaseChanged {
                phase: TurnPhase::Retrieving,
            },
            ChatEvent::EvidenceReady {
                chunks: vec![chunk()],
                took: 0.4,
            },
            ChatEvent::PhaseChanged {
                phase: TurnPhase::Streaming,
            },
            ChatEvent::PreviewUpdated {
                fragment: "Retrieval".to_string(),
                preview: "Retrieval".to_string(),
            },
            ChatEvent::PreviewUpdated {
                fragment: " augmented.".to_string(),
                preview: "Retrieval augmented.".to_string(),
            },
            ChatEvent::MessageCommitted {
                index: 2,
                message: Message::generated("Retrieval augmented.", false, None),
            },
            ChatEvent::PhaseChanged {
                phase: TurnPhase::Idle,
            },
        ] {
            view.apply(event, &mut r);
        }

        assert!(view.phase.is_idle());
        assert_eq!(view.evidence.as_ref().map(|(c, _)| c.len()), Some(1));
        let out = rendered(r);
        assert!(!out.contains("You > what is rag"));
        assert_eq!(out.matches("Retrieval augmented.").count(), 1);
        assert!(out.contains("1 source(s) found in 0.40s"));
        assert!(!out.contains("[interrupted]"));
    }

    #[test]
    fn idle_without_commit_marks_stream_interrupted() {
        console::set_colors_enabled(false);
        let mut view = ChatView::default();
        let mut r = ChatRenderer::new(Vec::new());
        view.apply(
            ChatEvent::PreviewUpdated {
                fragment: "half an ans".to_string(),
                preview: "half an ans".to_string(),
            },
            &mut r,
        );
        view.apply(
            ChatEvent::PhaseChanged {
                phase: TurnPhase::Idle,
            },
            &mut r,
        );
        assert!(rendered(r).contains("[interrupted]"));
    }

    #[test]
    fn reset_clears_evidence_and_reprints_seed() {
        console::set_colors_enabled(false);
        let mut view = ChatView {
            evidence: Some((vec![chunk()], 0.1)),
            ..ChatView::default()
        };
        let mut r = ChatRenderer::new(Vec::new());
        view.apply(
            ChatEvent::ConversationReset {
                conversation: vec![Message::system("Welcome!")],
            },
            &mut r,
        );
        assert!(view.evidence.is_none());
        assert!(rendered(r).contains("Assistant > Welcome!"));
    }

    #[test]
    fn channel_state_drives_connection_marker() {
        console::set_colors_enabled(false);
        let mut view = ChatView::default();
        let mut r = ChatRenderer::new(Vec::new());
        assert!(!view.is_connected());

        view.apply(
            ChatEvent::ChannelStateChanged {
                channel: ChannelId(1),
                state: ChannelState::Open,
            },
            &mut r,
        );
        assert!(view.is_connected());

        view.apply(
            ChatEvent::ChannelStateChanged {
                channel: ChannelId(1),
                state: ChannelState::Errored,
            },
            &mut r,
        );
        assert!(!view.is_connected());
    }

    #[test]
    fn notifications_are_printed() {
        console::set_colors_enabled(false);
        let mut view = ChatView::default();
        let mut r = ChatRenderer::new(Vec::new());
        view.apply(
            ChatEvent::NotificationRaised {
                notification: Notification::new(
                    "Retrieval failed: index unavailable",
                    Severity::Bad,
                    Utc::now(),
                ),
            },
            &mut r,
        );
        view.apply(ChatEvent::NotificationCleared, &mut r);
        assert!(rendered(r).contains("! Retrieval failed: index unavailable"));
    }
}
