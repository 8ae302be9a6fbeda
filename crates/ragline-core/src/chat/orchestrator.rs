//! Turn state machine.
//!
//! `ChatOrchestrator` owns the conversation, the notification slot, the
//! current generation channel, and the turn phase. It runs on a single task:
//! every transition is a call to [`ChatOrchestrator::dispatch`] with one
//! [`OrchestratorInput`], so no locking is needed. HTTP calls run on spawned
//! tasks that post their outcome back to the inbox, tagged with the turn (or
//! suggestion epoch) that started them; outcomes for superseded turns are
//! dropped.
//!
//! A turn is `Idle -> Retrieving -> Streaming -> Idle`. Any failure returns
//! the phase to `Idle` without committing an assistant message.

use std::sync::Arc;
use std::time::Duration;

use ragline_types::chat::{Message, TurnId, TurnPhase};
use ragline_types::config::ChatConfig;
use ragline_types::error::ClientError;
use ragline_types::event::ChatEvent;
use ragline_types::notification::{Notification, Severity};
use ragline_types::retrieval::RetrievalResult;
use ragline_types::stream::{ChannelId, ChannelSignal, ChannelState, GenerationRequest, StreamEvent};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{RetrievalClient, SuggestionClient};
use crate::channel::{ChannelConnector, ChannelUpdate, StreamingChannel};
use crate::chat::conversation::ConversationStore;
use crate::chat::input::{OrchestratorHandle, OrchestratorInput};
use crate::chat::suggest::SuggestionGate;
use crate::event::EventBus;
use crate::notify::NotificationBus;
use crate::storage::StateStore;

const EVENT_BUS_CAPACITY: usize = 1024;

/// Point-in-time copy of everything a frontend renders.
#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    pub phase: TurnPhase,
    pub preview: String,
    pub conversation: Vec<Message>,
    /// Context of the last generation request, restored across restarts.
    pub context: String,
    pub evidence: Option<RetrievalResult>,
    pub channel: Option<(ChannelId, ChannelState)>,
    pub notification: Option<Notification>,
    pub suggestions: Vec<String>,
}

pub struct ChatOrchestrator<R, G, C, S>
where
    R: RetrievalClient + 'static,
    G: SuggestionClient + 'static,
    C: ChannelConnector,
    S: StateStore,
{
    retrieval: Arc<R>,
    suggester: Arc<G>,
    connector: C,
    conversation: ConversationStore<S>,
    notifications: NotificationBus,
    events: EventBus,
    config: ChatConfig,
    channel_url: String,

    inbox_tx: mpsc::UnboundedSender<OrchestratorInput>,
    inbox_rx: mpsc::UnboundedReceiver<OrchestratorInput>,

    phase: TurnPhase,
    current_turn: TurnId,
    preview: String,
    context: String,
    evidence: Option<RetrievalResult>,

    channel: Option<StreamingChannel>,
    last_channel: ChannelId,
    /// Streams superseded by a reset whose terminal frame has not arrived yet.
    stale_streams: u32,

    suggest_gate: SuggestionGate,
    suggestions: Vec<String>,
    suggest_epoch: u64,
}

impl<R, G, C, S> ChatOrchestrator<R, G, C, S>
where
    R: RetrievalClient + 'static,
    G: SuggestionClient + 'static,
    C: ChannelConnector,
    S: StateStore,
{
    /// Build an idle orchestrator holding the seed conversation and no
    /// channel. Call [`restore`](Self::restore) to load saved history and
    /// [`connect`](Self::connect) (or [`run`](Self::run)) to open a channel.
    pub fn new(
        retrieval: Arc<R>,
        suggester: Arc<G>,
        connector: C,
        store: S,
        config: ChatConfig,
        channel_url: impl Into<String>,
    ) -> Self {
        let events = EventBus::new(EVENT_BUS_CAPACITY);
        let ttl = chrono::Duration::seconds(config.notification_ttl_secs.min(86_400) as i64);
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        Self {
            retrieval,
            suggester,
            connector,
            conversation: ConversationStore::new(store, config.intro_message.clone()),
            notifications: NotificationBus::new(ttl, events.clone()),
            events,
            suggest_gate: SuggestionGate::new(config.suggestions_enabled),
            config,
            channel_url: channel_url.into(),
            inbox_tx,
            inbox_rx,
            phase: TurnPhase::Idle,
            current_turn: TurnId::default(),
            preview: String::new(),
            context: String::new(),
            evidence: None,
            channel: None,
            last_channel: ChannelId::default(),
            stale_streams: 0,
            suggestions: Vec::new(),
            suggest_epoch: 0,
        }
    }

    /// Load the persisted conversation and the last retrieval context.
    pub async fn restore(&mut self) -> &[Message] {
        self.context = self.conversation.last_context().await;
        self.conversation.load().await
    }

    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle::new(self.inbox_tx.clone())
    }

    /// Subscribe to UI events.
    pub fn events(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    // --- Accessors ---

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn conversation(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn evidence(&self) -> Option<&RetrievalResult> {
        self.evidence.as_ref()
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notifications.current()
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn channel_state(&self) -> Option<ChannelState> {
        self.channel.as_ref().map(StreamingChannel::state)
    }

    /// The last context handed to the generation service, surviving restarts.
    pub fn last_context(&self) -> &str {
        &self.context
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            phase: self.phase,
            preview: self.preview.clone(),
            conversation: self.conversation.messages().to_vec(),
            context: self.context.clone(),
            evidence: self.evidence.clone(),
            channel: self.channel.as_ref().map(|c| (c.id(), c.state())),
            notification: self.notifications.current().cloned(),
            suggestions: self.suggestions.clone(),
        }
    }

    // --- Event loop ---

    /// Process inputs until `cancel` fires. Opens the first channel if none
    /// exists yet, and closes the current channel on exit.
    pub async fn run(&mut self, cancel: CancellationToken) {
        if self.channel.is_none() {
            self.connect();
        }

        let period = Duration::from_millis(self.config.tick_interval_ms.max(10));
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => self.dispatch(OrchestratorInput::Tick).await,
                input = self.inbox_rx.recv() => match input {
                    Some(input) => self.dispatch(input).await,
                    None => break,
                },
            }
        }

        if let Some(channel) = self.channel.as_mut() {
            channel.close();
        }
        info!("orchestrator stopped");
    }

    /// Apply one input. This is the only place state changes.
    pub async fn dispatch(&mut self, input: OrchestratorInput) {
        match input {
            OrchestratorInput::Submit(query) => self.on_submit(query).await,
            OrchestratorInput::Reset => self.on_reset().await,
            OrchestratorInput::Reconnect => self.reconnect(),
            OrchestratorInput::Suggest(partial) => self.on_suggest(partial),
            OrchestratorInput::RetrievalSettled {
                turn,
                query,
                outcome,
            } => self.on_retrieval_settled(turn, query, outcome).await,
            OrchestratorInput::SuggestionsSettled { epoch, outcome } => {
                self.on_suggestions_settled(epoch, outcome)
            }
            OrchestratorInput::Channel { channel, signal } => {
                self.on_channel_signal(channel, signal).await
            }
            OrchestratorInput::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            OrchestratorInput::Tick => self.notifications.tick(),
        }
    }

    // --- Channel lifecycle ---

    /// Open a fresh channel instance if none is live.
    pub fn connect(&mut self) {
        let live = self
            .channel
            .as_ref()
            .is_some_and(|c| !c.state().is_terminal());
        if !live {
            self.open_channel();
        }
    }

    /// Discard the current channel and open a fresh instance.
    ///
    /// A turn that was streaming on the old channel ends without a commit.
    pub fn reconnect(&mut self) {
        if let Some(mut old) = self.channel.take() {
            old.close();
            self.events.publish(ChatEvent::ChannelStateChanged {
                channel: old.id(),
                state: ChannelState::Closed,
            });
        }
        if self.phase == TurnPhase::Streaming {
            self.preview.clear();
            self.set_phase(TurnPhase::Idle);
        }
        self.stale_streams = 0;
        self.open_channel();
    }

    fn open_channel(&mut self) {
        self.last_channel = self.last_channel.next();
        let channel = StreamingChannel::open(
            &self.connector,
            self.last_channel,
            &self.channel_url,
            self.inbox_tx.clone(),
        );
        self.events.publish(ChatEvent::ChannelStateChanged {
            channel: channel.id(),
            state: channel.state(),
        });
        self.channel = Some(channel);
    }

    async fn on_channel_signal(&mut self, id: ChannelId, signal: ChannelSignal) {
        let Some(channel) = self.channel.as_mut().filter(|c| c.id() == id) else {
            debug!(channel = %id, "signal from superseded channel dropped");
            return;
        };

        match channel.apply(signal) {
            ChannelUpdate::StateChanged { state, detail } => {
                self.events
                    .publish(ChatEvent::ChannelStateChanged { channel: id, state });
                match state {
                    ChannelState::Open => {
                        self.notifications
                            .raise("Connected to generation service", Severity::Good);
                    }
                    ChannelState::Closed | ChannelState::Errored => {
                        if self.phase == TurnPhase::Streaming {
                            warn!(turn = %self.current_turn, "channel lost mid-stream, discarding preview");
                            self.preview.clear();
                            self.set_phase(TurnPhase::Idle);
                        }
                        self.stale_streams = 0;
                        let text = match detail {
                            Some(detail) => format!("Generation service offline: {detail}"),
                            None => "Generation service offline".to_string(),
                        };
                        self.notifications.raise(text, Severity::Bad);
                    }
                    ChannelState::Connecting => {}
                }
            }
            ChannelUpdate::Event(event) => self.on_stream_event(event).await,
            ChannelUpdate::Ignored => {}
        }
    }

    async fn on_stream_event(&mut self, event: StreamEvent) {
        if self.stale_streams > 0 {
            if event.is_terminal() {
                self.stale_streams -= 1;
            }
            debug!("frame from superseded turn dropped");
            return;
        }
        if self.phase != TurnPhase::Streaming {
            debug!(phase = %self.phase, "frame outside streaming phase dropped");
            return;
        }

        let fragment = event.fragment();
        if !fragment.is_empty() {
            self.preview.push_str(fragment);
            self.events.publish(ChatEvent::PreviewUpdated {
                fragment: fragment.to_string(),
                preview: self.preview.clone(),
            });
        }

        if let StreamEvent::Terminal {
            full_text,
            cached,
            distance,
            ..
        } = event
        {
            let preview = std::mem::take(&mut self.preview);
            // The terminal frame's text is authoritative; the preview is only
            // a fallback for servers that omit it.
            let text = full_text.unwrap_or(preview);
            self.commit(Message::generated(text, cached, distance)).await;
            self.set_phase(TurnPhase::Idle);
        }
    }

    // --- Turns ---

    async fn on_submit(&mut self, query: String) {
        if !self.phase.is_idle() {
            debug!(phase = %self.phase, "submit while busy ignored");
            return;
        }
        if query.trim().is_empty() {
            return;
        }

        let usable = self
            .channel
            .as_ref()
            .is_some_and(|c| !c.state().is_terminal());
        if !usable {
            self.notifications
                .raise("No connection to the generation service", Severity::Bad);
            self.open_channel();
            return;
        }

        self.current_turn = self.current_turn.next();
        info!(turn = %self.current_turn, "turn started");
        self.commit(Message::user(query.clone())).await;
        self.clear_suggestions();
        self.evidence = None;
        self.set_phase(TurnPhase::Retrieving);

        let retrieval = Arc::clone(&self.retrieval);
        let inbox = self.inbox_tx.clone();
        let turn = self.current_turn;
        tokio::spawn(async move {
            let outcome = retrieval.retrieve(&query).await;
            let _ = inbox.send(OrchestratorInput::RetrievalSettled {
                turn,
                query,
                outcome,
            });
        });
    }

    async fn on_retrieval_settled(
        &mut self,
        turn: TurnId,
        query: String,
        outcome: Result<RetrievalResult, ClientError>,
    ) {
        if turn != self.current_turn || self.phase != TurnPhase::Retrieving {
            debug!(%turn, current = %self.current_turn, "stale retrieval result dropped");
            return;
        }

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                self.notifications
                    .raise(format!("Retrieval failed: {e}"), Severity::Bad);
                self.set_phase(TurnPhase::Idle);
                return;
            }
        };
        if result.is_error() {
            self.notifications.raise(result.error.clone(), Severity::Bad);
            self.set_phase(TurnPhase::Idle);
            return;
        }

        debug!(%turn, chunks = result.chunks.len(), took = result.took, "retrieval complete");
        self.events.publish(ChatEvent::EvidenceReady {
            chunks: result.chunks.clone(),
            took: result.took,
        });
        let has_context = result.has_context();
        let context = result.context.clone();
        self.evidence = Some(result);

        if has_context {
            self.conversation.save_context(&context).await;
            self.context = context.clone();
        } else if !self.config.generate_without_context {
            info!(%turn, "no context retrieved, skipping generation");
            self.set_phase(TurnPhase::Idle);
            return;
        }

        let request = GenerationRequest {
            query,
            context,
            conversation: self.conversation.messages().to_vec(),
        };
        let sent = match self.channel.as_mut() {
            Some(channel) => channel.send(&request, &mut self.notifications),
            None => {
                self.notifications
                    .raise("Generation channel is not open", Severity::Bad);
                false
            }
        };
        self.set_phase(if sent {
            TurnPhase::Streaming
        } else {
            TurnPhase::Idle
        });
    }

    async fn on_reset(&mut self) {
        if self.phase == TurnPhase::Streaming {
            self.stale_streams += 1;
        }
        self.current_turn = self.current_turn.next();
        let conversation = self.conversation.reset().await.to_vec();
        self.preview.clear();
        self.context.clear();
        self.evidence = None;
        self.clear_suggestions();
        self.set_phase(TurnPhase::Idle);

        self.events
            .publish(ChatEvent::ConversationReset { conversation });
        self.notifications.raise("Conversation cleared", Severity::Good);
    }

    // --- Suggestions ---

    fn on_suggest(&mut self, partial: String) {
        if !self.suggest_gate.admit(&partial, self.phase) {
            if !self.suggest_gate.in_flight() {
                self.clear_suggestions();
            }
            return;
        }

        self.suggest_gate.begin();
        let suggester = Arc::clone(&self.suggester);
        let inbox = self.inbox_tx.clone();
        let epoch = self.suggest_epoch;
        tokio::spawn(async move {
            let outcome = suggester.suggest(&partial).await;
            let _ = inbox.send(OrchestratorInput::SuggestionsSettled { epoch, outcome });
        });
    }

    fn on_suggestions_settled(&mut self, epoch: u64, outcome: Result<Vec<String>, ClientError>) {
        self.suggest_gate.finish();
        if epoch != self.suggest_epoch || !self.phase.is_idle() {
            debug!(epoch, current = self.suggest_epoch, "stale suggestions dropped");
            return;
        }
        match outcome {
            Ok(suggestions) => {
                self.suggestions = suggestions;
                self.events.publish(ChatEvent::SuggestionsUpdated {
                    suggestions: self.suggestions.clone(),
                });
            }
            Err(e) => {
                self.notifications
                    .raise(format!("Suggestions unavailable: {e}"), Severity::Bad);
            }
        }
    }

    fn clear_suggestions(&mut self) {
        self.suggest_epoch += 1;
        if !self.suggestions.is_empty() {
            self.suggestions.clear();
            self.events.publish(ChatEvent::SuggestionsUpdated {
                suggestions: Vec::new(),
            });
        }
    }

    // --- Helpers ---

    async fn commit(&mut self, message: Message) {
        let index = self.conversation.messages().len();
        self.conversation.append(message.clone()).await;
        self.events
            .publish(ChatEvent::MessageCommitted { index, message });
    }

    fn set_phase(&mut self, phase: TurnPhase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, turn = %self.current_turn, "phase change");
            self.phase = phase;
            self.events.publish(ChatEvent::PhaseChanged { phase });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ragline_types::chat::MessageRole;
    use ragline_types::retrieval::DocumentChunk;

    use crate::channel::ChannelSink;
    use crate::storage::state_store::mock::MockStateStore;

    const INTRO: &str = "Welcome!";
    const QUERY: &str = "What is a vector database?";
    const FRAGMENT: &str = r#"{"message":"A vector","finish_reason":""}"#;
    const TERMINAL: &str = r#"{"message":" database.","finish_reason":"stop","full_text":"A vector database.","cached":false}"#;

    // --- Mocks ---

    #[derive(Default)]
    struct MockRetrieval {
        responses: Mutex<VecDeque<Result<RetrievalResult, ClientError>>>,
        calls: AtomicUsize,
    }

    impl MockRetrieval {
        fn push(&self, response: Result<RetrievalResult, ClientError>) {
            self.responses.lock().unwrap().push_back(response);
        }
    }

    impl RetrievalClient for MockRetrieval {
        async fn retrieve(&self, _query: &str) -> Result<RetrievalResult, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(evidence("ctx")))
        }
    }

    #[derive(Default)]
    struct MockSuggestions {
        calls: AtomicUsize,
    }

    impl SuggestionClient for MockSuggestions {
        async fn suggest(&self, partial: &str) -> Result<Vec<String>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![format!("{partial} database"), format!("{partial} index")])
        }
    }

    type Connection = (ChannelSink, mpsc::UnboundedReceiver<String>);

    #[derive(Clone, Default)]
    struct MockConnector {
        connections: Arc<Mutex<Vec<Connection>>>,
    }

    impl ChannelConnector for MockConnector {
        fn connect(&self, _url: &str, sink: ChannelSink) -> mpsc::UnboundedSender<String> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.connections.lock().unwrap().push((sink, rx));
            tx
        }
    }

    type TestOrchestrator =
        ChatOrchestrator<MockRetrieval, MockSuggestions, MockConnector, MockStateStore>;

    struct Harness {
        orch: TestOrchestrator,
        retrieval: Arc<MockRetrieval>,
        suggestions: Arc<MockSuggestions>,
        connector: MockConnector,
        store: MockStateStore,
    }

    fn evidence(context: &str) -> RetrievalResult {
        RetrievalResult {
            error: String::new(),
            chunks: vec![DocumentChunk {
                doc_name: "intro.md".to_string(),
                doc_uuid: "doc-1".to_string(),
                chunk_id: "0".to_string(),
                score: 0.91,
                text: "Vector databases index embeddings.".to_string(),
            }],
            context: context.to_string(),
            took: 0.4,
        }
    }

    fn harness_with(config: ChatConfig) -> Harness {
        let retrieval = Arc::new(MockRetrieval::default());
        let suggestions = Arc::new(MockSuggestions::default());
        let connector = MockConnector::default();
        let store = MockStateStore::default();
        let orch = ChatOrchestrator::new(
            Arc::clone(&retrieval),
            Arc::clone(&suggestions),
            connector.clone(),
            store.clone(),
            config,
            "ws://test/ws/generate_stream",
        );
        Harness {
            orch,
            retrieval,
            suggestions,
            connector,
            store,
        }
    }

    fn harness() -> Harness {
        harness_with(ChatConfig {
            intro_message: INTRO.to_string(),
            ..ChatConfig::default()
        })
    }

    impl Harness {
        /// Open a channel and deliver its handshake.
        async fn connect(&mut self) -> ChannelId {
            self.orch.connect();
            let id = self.orch.last_channel;
            self.signal(id, ChannelSignal::Opened).await;
            id
        }

        async fn signal(&mut self, channel: ChannelId, signal: ChannelSignal) {
            self.orch
                .dispatch(OrchestratorInput::Channel { channel, signal })
                .await;
        }

        async fn frame(&mut self, text: &str) {
            let id = self.orch.last_channel;
            self.signal(id, ChannelSignal::Frame(text.to_string())).await;
        }

        async fn submit(&mut self, query: &str) {
            self.orch
                .dispatch(OrchestratorInput::Submit(query.to_string()))
                .await;
        }

        /// Deliver the next input posted by a spawned task.
        async fn pump(&mut self) {
            let input = tokio::time::timeout(Duration::from_millis(500), self.orch.inbox_rx.recv())
                .await
                .expect("timed out waiting for orchestrator input")
                .expect("inbox closed");
            self.orch.dispatch(input).await;
        }

        /// Frames written to the transport of the `n`th connection.
        fn sent(&self, n: usize) -> Vec<String> {
            let mut connections = self.connector.connections.lock().unwrap();
            let mut frames = Vec::new();
            while let Ok(frame) = connections[n].1.try_recv() {
                frames.push(frame);
            }
            frames
        }

        fn retrieval_calls(&self) -> usize {
            self.retrieval.calls.load(Ordering::SeqCst)
        }

        fn texts(&self) -> Vec<String> {
            self.orch
                .conversation()
                .iter()
                .map(|m| m.text().unwrap_or_default().to_string())
                .collect()
        }
    }

    // --- Happy path ---

    #[tokio::test]
    async fn full_turn_commits_authoritative_text() {
        let mut h = harness();
        h.connect().await;

        h.submit(QUERY).await;
        assert_eq!(h.orch.phase(), TurnPhase::Retrieving);
        assert_eq!(h.orch.conversation().len(), 2);

        h.pump().await;
        assert_eq!(h.orch.phase(), TurnPhase::Streaming);
        assert_eq!(h.orch.evidence().unwrap().chunks.len(), 1);

        let sent = h.sent(0);
        assert_eq!(sent.len(), 1);
        let request: GenerationRequest = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(request.query, QUERY);
        assert_eq!(request.context, "ctx");
        assert_eq!(request.conversation.len(), 2);

        h.frame(FRAGMENT).await;
        assert_eq!(h.orch.preview(), "A vector");
        assert_eq!(h.orch.conversation().len(), 2);

        h.frame(TERMINAL).await;
        assert_eq!(h.orch.phase(), TurnPhase::Idle);
        assert_eq!(h.orch.preview(), "");
        assert_eq!(h.texts(), vec![INTRO, QUERY, "A vector database."]);
        let last = h.orch.conversation().last().unwrap();
        assert_eq!(last.role, MessageRole::System);
        assert!(!last.cached);
    }

    #[tokio::test]
    async fn full_text_wins_over_inconsistent_fragments() {
        let mut h = harness();
        h.connect().await;
        h.submit(QUERY).await;
        h.pump().await;

        h.frame(r#"{"message":"garbled","finish_reason":""}"#).await;
        h.frame(r#"{"message":"","finish_reason":"stop","full_text":"Clean answer.","cached":true,"distance":"0.07"}"#)
            .await;

        let last = h.orch.conversation().last().unwrap();
        assert_eq!(last.text(), Some("Clean answer."));
        assert!(last.cached);
        assert_eq!(last.distance.as_deref(), Some("0.07"));
    }

    #[tokio::test]
    async fn terminal_without_full_text_falls_back_to_preview() {
        let mut h = harness();
        h.connect().await;
        h.submit(QUERY).await;
        h.pump().await;

        h.frame(FRAGMENT).await;
        h.frame(r#"{"message":" db.","finish_reason":"stop"}"#).await;
        assert_eq!(h.orch.conversation().last().unwrap().text(), Some("A vector db."));
    }

    #[tokio::test]
    async fn turns_commit_in_completion_order() {
        let mut h = harness();
        h.connect().await;

        for (query, answer) in [("first?", "one"), ("second?", "two")] {
            h.submit(query).await;
            h.pump().await;
            h.frame(&format!(
                r#"{{"message":"{answer}","finish_reason":"stop","full_text":"{answer}"}}"#
            ))
            .await;
        }

        assert_eq!(h.texts(), vec![INTRO, "first?", "one", "second?", "two"]);
        let stored: Vec<Message> =
            serde_json::from_value(h.store.raw("conversation").unwrap()).unwrap();
        assert_eq!(stored, h.orch.conversation());
    }

    // --- Admission ---

    #[tokio::test]
    async fn submit_while_busy_is_ignored() {
        let mut h = harness();
        h.connect().await;

        h.submit(QUERY).await;
        h.submit("another").await;
        assert_eq!(h.orch.conversation().len(), 2);

        h.pump().await;
        h.submit("another").await;
        assert_eq!(h.orch.phase(), TurnPhase::Streaming);
        assert_eq!(h.orch.conversation().len(), 2);
        assert_eq!(h.retrieval_calls(), 1);
        assert_eq!(h.sent(0).len(), 1);

        h.frame(TERMINAL).await;
        assert_eq!(h.texts(), vec![INTRO, QUERY, "A vector database."]);
    }

    #[tokio::test]
    async fn blank_submit_is_silent_noop() {
        let mut h = harness();
        h.connect().await;

        h.submit("   ").await;
        assert_eq!(h.orch.phase(), TurnPhase::Idle);
        assert_eq!(h.orch.conversation().len(), 1);
        // Only the handshake notification is visible.
        assert_eq!(h.orch.notification().unwrap().severity, Severity::Good);
        assert_eq!(h.retrieval_calls(), 0);
    }

    #[tokio::test]
    async fn submitted_text_is_committed_as_typed() {
        let mut h = harness();
        h.connect().await;

        let typed = "  What is a vector database?\n";
        h.submit(typed).await;
        assert_eq!(h.texts(), vec![INTRO, typed]);

        h.pump().await;
        let request: GenerationRequest = serde_json::from_str(&h.sent(0)[0]).unwrap();
        assert_eq!(request.query, typed);
    }

    #[tokio::test]
    async fn submit_without_channel_notifies_and_reconnects() {
        let mut h = harness();

        h.submit(QUERY).await;

        assert_eq!(h.orch.phase(), TurnPhase::Idle);
        assert_eq!(h.orch.conversation().len(), 1);
        let note = h.orch.notification().unwrap();
        assert_eq!(note.severity, Severity::Bad);
        assert_eq!(note.text, "No connection to the generation service");
        assert_eq!(h.connector.connections.lock().unwrap().len(), 1);
        assert_eq!(h.orch.channel_state(), Some(ChannelState::Connecting));
    }

    #[tokio::test]
    async fn submit_after_channel_errored_opens_fresh_instance() {
        let mut h = harness();
        let first = h.connect().await;
        h.signal(first, ChannelSignal::Errored("reset by peer".to_string()))
            .await;

        h.submit(QUERY).await;

        assert_eq!(h.retrieval_calls(), 0);
        assert_ne!(h.orch.last_channel, first);
        assert_eq!(h.connector.connections.lock().unwrap().len(), 2);
    }

    // --- Retrieval outcomes ---

    #[tokio::test]
    async fn application_error_notifies_without_commit() {
        let mut h = harness();
        h.retrieval.push(Ok(RetrievalResult {
            error: "index unavailable".to_string(),
            ..RetrievalResult::default()
        }));
        h.connect().await;

        h.submit(QUERY).await;
        h.pump().await;

        assert_eq!(h.orch.phase(), TurnPhase::Idle);
        assert_eq!(h.texts(), vec![INTRO, QUERY]);
        let note = h.orch.notification().unwrap();
        assert_eq!(note.severity, Severity::Bad);
        assert_eq!(note.text, "index unavailable");
        assert!(h.sent(0).is_empty());
    }

    #[tokio::test]
    async fn network_error_notifies_and_returns_idle() {
        let mut h = harness();
        h.retrieval
            .push(Err(ClientError::Network("connection refused".to_string())));
        h.connect().await;

        h.submit(QUERY).await;
        h.pump().await;

        assert_eq!(h.orch.phase(), TurnPhase::Idle);
        let note = h.orch.notification().unwrap();
        assert_eq!(note.severity, Severity::Bad);
        assert!(note.text.contains("connection refused"));
        assert!(h.sent(0).is_empty());
    }

    #[tokio::test]
    async fn empty_context_skips_generation_by_default() {
        let mut h = harness();
        h.retrieval.push(Ok(evidence("")));
        h.connect().await;

        h.submit(QUERY).await;
        h.pump().await;

        assert_eq!(h.orch.phase(), TurnPhase::Idle);
        assert!(h.orch.evidence().is_some());
        assert!(h.sent(0).is_empty());
    }

    #[tokio::test]
    async fn empty_context_generates_when_configured() {
        let mut h = harness_with(ChatConfig {
            generate_without_context: true,
            ..ChatConfig::default()
        });
        h.retrieval.push(Ok(evidence("")));
        h.connect().await;

        h.submit(QUERY).await;
        h.pump().await;

        assert_eq!(h.orch.phase(), TurnPhase::Streaming);
        let request: GenerationRequest = serde_json::from_str(&h.sent(0)[0]).unwrap();
        assert_eq!(request.context, "");
    }

    #[tokio::test]
    async fn context_is_persisted_for_reload() {
        let mut h = harness();
        h.retrieval.push(Ok(evidence("Vector databases index embeddings.")));
        h.connect().await;

        h.submit(QUERY).await;
        h.pump().await;

        assert_eq!(h.orch.last_context(), "Vector databases index embeddings.");
        assert_eq!(
            h.orch.snapshot().context,
            "Vector databases index embeddings."
        );
    }

    #[tokio::test]
    async fn restore_brings_back_saved_context() {
        let mut h = harness();
        h.retrieval.push(Ok(evidence("Vector databases index embeddings.")));
        h.connect().await;
        h.submit(QUERY).await;
        h.pump().await;
        h.frame(TERMINAL).await;

        let mut restored = ChatOrchestrator::new(
            Arc::new(MockRetrieval::default()),
            Arc::new(MockSuggestions::default()),
            MockConnector::default(),
            h.store.clone(),
            ChatConfig::default(),
            "ws://test",
        );
        assert_eq!(restored.last_context(), "");
        restored.restore().await;
        assert_eq!(restored.last_context(), "Vector databases index embeddings.");
        assert_eq!(
            restored.snapshot().context,
            "Vector databases index embeddings."
        );

        restored.dispatch(OrchestratorInput::Reset).await;
        assert_eq!(restored.snapshot().context, "");
    }

    #[tokio::test]
    async fn send_while_connecting_notifies_and_returns_idle() {
        let mut h = harness();
        h.orch.connect();

        h.submit(QUERY).await;
        h.pump().await;

        assert_eq!(h.orch.phase(), TurnPhase::Idle);
        assert!(h.orch.notification().unwrap().text.contains("not open"));
    }

    // --- Channel failures ---

    #[tokio::test]
    async fn channel_drop_mid_stream_discards_preview() {
        let mut h = harness();
        let id = h.connect().await;
        h.submit(QUERY).await;
        h.pump().await;
        h.frame(FRAGMENT).await;

        h.signal(id, ChannelSignal::Closed { reason: None }).await;

        assert_eq!(h.orch.phase(), TurnPhase::Idle);
        assert_eq!(h.orch.preview(), "");
        assert_eq!(h.texts(), vec![INTRO, QUERY]);
        assert_eq!(h.orch.channel_state(), Some(ChannelState::Closed));
        assert_eq!(h.orch.notification().unwrap().severity, Severity::Bad);
    }

    #[tokio::test]
    async fn malformed_frame_does_not_end_turn() {
        let mut h = harness();
        h.connect().await;
        h.submit(QUERY).await;
        h.pump().await;

        h.frame("this is not json").await;
        assert_eq!(h.orch.phase(), TurnPhase::Streaming);
        assert_eq!(h.orch.channel_state(), Some(ChannelState::Open));

        h.frame(FRAGMENT).await;
        h.frame(TERMINAL).await;
        assert_eq!(h.texts(), vec![INTRO, QUERY, "A vector database."]);
    }

    #[tokio::test]
    async fn signals_from_superseded_channel_are_dropped() {
        let mut h = harness();
        let old = h.connect().await;

        h.orch.dispatch(OrchestratorInput::Reconnect).await;
        let new = h.orch.last_channel;
        assert_ne!(old, new);
        assert_eq!(h.orch.channel_state(), Some(ChannelState::Connecting));

        h.signal(old, ChannelSignal::Errored("late".to_string())).await;
        assert_eq!(h.orch.channel_state(), Some(ChannelState::Connecting));

        h.signal(new, ChannelSignal::Opened).await;
        assert_eq!(h.orch.channel_state(), Some(ChannelState::Open));
        assert_eq!(h.orch.notification().unwrap().severity, Severity::Good);
    }

    #[tokio::test]
    async fn reconnect_mid_stream_ends_turn_without_commit() {
        let mut h = harness();
        h.connect().await;
        h.submit(QUERY).await;
        h.pump().await;
        h.frame(FRAGMENT).await;

        h.orch.dispatch(OrchestratorInput::Reconnect).await;

        assert_eq!(h.orch.phase(), TurnPhase::Idle);
        assert_eq!(h.orch.preview(), "");
        assert_eq!(h.orch.conversation().len(), 2);
    }

    // --- Reset and supersession ---

    #[tokio::test]
    async fn reset_during_retrieval_discards_late_result() {
        let mut h = harness();
        h.connect().await;
        h.submit(QUERY).await;

        h.orch.dispatch(OrchestratorInput::Reset).await;
        h.pump().await;

        assert_eq!(h.orch.phase(), TurnPhase::Idle);
        assert_eq!(h.texts(), vec![INTRO]);
        assert!(h.sent(0).is_empty());
        assert!(h.orch.evidence().is_none());
    }

    #[tokio::test]
    async fn reset_during_streaming_discards_late_frames() {
        let mut h = harness();
        h.connect().await;
        h.submit(QUERY).await;
        h.pump().await;
        h.frame(FRAGMENT).await;

        h.orch.dispatch(OrchestratorInput::Reset).await;
        h.frame(TERMINAL).await;

        assert_eq!(h.orch.phase(), TurnPhase::Idle);
        assert_eq!(h.texts(), vec![INTRO]);
        assert_eq!(h.orch.channel_state(), Some(ChannelState::Open));
    }

    #[tokio::test]
    async fn superseded_terminal_arriving_during_next_turn_is_skipped() {
        let mut h = harness();
        h.connect().await;
        h.submit(QUERY).await;
        h.pump().await;
        h.orch.dispatch(OrchestratorInput::Reset).await;

        h.submit("next question").await;
        h.pump().await;
        assert_eq!(h.orch.phase(), TurnPhase::Streaming);

        // Tail of the old stream, then the new one.
        h.frame(TERMINAL).await;
        assert_eq!(h.orch.phase(), TurnPhase::Streaming);
        h.frame(r#"{"message":"fresh","finish_reason":"stop","full_text":"fresh"}"#)
            .await;

        assert_eq!(h.texts(), vec![INTRO, "next question", "fresh"]);
    }

    #[tokio::test]
    async fn reset_clears_storage_and_notifies() {
        let mut h = harness();
        h.connect().await;
        h.submit(QUERY).await;
        h.pump().await;
        h.frame(TERMINAL).await;
        assert!(h.store.raw("conversation").is_some());

        let mut events = h.orch.events();
        h.orch.dispatch(OrchestratorInput::Reset).await;

        assert!(h.store.raw("conversation").is_none());
        assert!(h.store.raw("context").is_none());
        assert_eq!(h.texts(), vec![INTRO]);
        assert_eq!(h.orch.notification().unwrap().text, "Conversation cleared");

        let mut saw_reset = false;
        while let Ok(event) = events.try_recv() {
            if let ChatEvent::ConversationReset { conversation } = event {
                assert_eq!(conversation.len(), 1);
                saw_reset = true;
            }
        }
        assert!(saw_reset);
    }

    #[tokio::test]
    async fn restore_loads_saved_history() {
        let mut h = harness();
        h.connect().await;
        h.submit(QUERY).await;
        h.pump().await;
        h.frame(TERMINAL).await;

        let mut restored = ChatOrchestrator::new(
            Arc::new(MockRetrieval::default()),
            Arc::new(MockSuggestions::default()),
            MockConnector::default(),
            h.store.clone(),
            ChatConfig {
                intro_message: INTRO.to_string(),
                ..ChatConfig::default()
            },
            "ws://test",
        );
        assert_eq!(restored.restore().await.len(), 3);
    }

    // --- Suggestions ---

    #[tokio::test]
    async fn empty_partial_makes_no_call() {
        let mut h = harness();
        h.orch
            .dispatch(OrchestratorInput::Suggest(String::new()))
            .await;

        tokio::task::yield_now().await;
        assert_eq!(h.suggestions.calls.load(Ordering::SeqCst), 0);
        assert!(h.orch.suggestions().is_empty());
    }

    #[tokio::test]
    async fn suggestions_arrive_and_clear_on_submit() {
        let mut h = harness();
        h.connect().await;

        h.orch
            .dispatch(OrchestratorInput::Suggest("vector".to_string()))
            .await;
        h.pump().await;
        assert_eq!(h.orch.suggestions(), ["vector database", "vector index"]);

        h.submit(QUERY).await;
        assert!(h.orch.suggestions().is_empty());
    }

    #[tokio::test]
    async fn second_suggest_while_in_flight_is_refused() {
        let mut h = harness();
        h.orch
            .dispatch(OrchestratorInput::Suggest("vec".to_string()))
            .await;
        h.orch
            .dispatch(OrchestratorInput::Suggest("vect".to_string()))
            .await;
        h.pump().await;

        assert_eq!(h.suggestions.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.orch.suggestions().len(), 2);
    }

    #[tokio::test]
    async fn suggest_refused_while_turn_busy() {
        let mut h = harness();
        h.connect().await;
        h.submit(QUERY).await;

        h.orch
            .dispatch(OrchestratorInput::Suggest("vec".to_string()))
            .await;
        h.pump().await;

        assert!(matches!(h.orch.phase(), TurnPhase::Streaming));
        assert_eq!(h.suggestions.calls.load(Ordering::SeqCst), 0);
    }

    // --- Event loop ---

    #[tokio::test]
    async fn run_connects_and_answers_snapshot_queries() {
        let h = harness();
        let mut orch = h.orch;
        let handle = orch.handle();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            orch.run(task_cancel).await;
            orch
        });

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, TurnPhase::Idle);
        assert_eq!(snapshot.conversation.len(), 1);
        assert_eq!(snapshot.channel, Some((ChannelId(1), ChannelState::Connecting)));

        cancel.cancel();
        let orch = task.await.unwrap();
        assert_eq!(orch.channel_state(), Some(ChannelState::Closed));
    }
}
