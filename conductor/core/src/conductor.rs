//! Conductor - The Turn Orchestrator
//!
//! The Conductor owns both participants' configuration and logs, the turn
//! pointer and the per-panel flags. It runs one turn at a time per side:
//!
//! ```text
//! request_turn ─► thinking (delay) ─► history ─► placeholder ─► stream
//!                                                                 │
//!        finish_turn ◄── Complete / Error ◄── paced characters ◄──┘
//! ```
//!
//! Nothing here blocks. Waiting is recorded as a deadline or a channel and
//! advanced by [`Conductor::poll`], which the surface calls every frame.
//!
//! # Stale turns
//!
//! Every turn carries the epoch it was started under. [`Conductor::reset`]
//! bumps the epoch; turns from an older epoch are still drained so their
//! producers finish, but nothing they emit is applied.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::backend::{GenerationError, LlmBackend, LlmRequest, StreamingToken};
use crate::conversation::{Conversation, ConversationLog, Message, MessageId};
use crate::events::SurfaceEvent;
use crate::history::{build_history, topic_seed, DEFAULT_CONTEXT_WINDOW};
use crate::messages::{ConductorMessage, NotifyLevel};
use crate::participant::{topic_system_prompt, ParticipantConfig, ParticipantId};
use crate::streaming::{split_units, Pacer, StreamingRegistry};
use crate::turn::{PanelFlags, TurnError, TurnPolicy, TurnState};

/// Default pre-response delay
pub const DEFAULT_THINKING_DELAY: Duration = Duration::from_millis(2000);

/// Default delay between revealed characters
pub const DEFAULT_REVEAL_DELAY: Duration = Duration::from_millis(15);

/// Default delay before a scheduled turn fires
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Conductor configuration
#[derive(Clone, Debug, PartialEq)]
pub struct ConductorConfig {
    /// Initial configuration of both participants
    pub participants: [ParticipantConfig; 2],
    /// Conversation topic
    pub topic: Option<String>,
    /// Who speaks first when a cycle starts without an explicit choice
    pub first_speaker: ParticipantId,
    /// Pre-response delay
    pub thinking_delay: Duration,
    /// Delay between revealed characters
    pub reveal_delay: Duration,
    /// Delay before autostart and auto-advance turns
    pub settle_delay: Duration,
    /// Entries per side fed back into prompts
    pub context_window: usize,
    /// Arbitration of concurrent turn requests
    pub turn_policy: TurnPolicy,
    /// Schedule the peer's turn after each successful completion
    pub auto_advance: bool,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            participants: [ParticipantConfig::default(), ParticipantConfig::default()],
            topic: None,
            first_speaker: ParticipantId::One,
            thinking_delay: DEFAULT_THINKING_DELAY,
            reveal_delay: DEFAULT_REVEAL_DELAY,
            settle_delay: DEFAULT_SETTLE_DELAY,
            context_window: DEFAULT_CONTEXT_WINDOW,
            turn_policy: TurnPolicy::default(),
            auto_advance: false,
        }
    }
}

impl ConductorConfig {
    /// Same configuration with every delay set to zero
    #[must_use]
    pub fn without_delays(mut self) -> Self {
        self.thinking_delay = Duration::ZERO;
        self.reveal_delay = Duration::ZERO;
        self.settle_delay = Duration::ZERO;
        self
    }
}

/// Where an in-flight turn is
enum Phase {
    /// Waiting out the thinking delay
    Thinking { until: Instant },
    /// Receiving paced tokens into a placeholder
    Streaming {
        rx: mpsc::Receiver<StreamingToken>,
        message_id: MessageId,
    },
}

/// One requested turn, from request to completion
struct InFlight {
    participant: ParticipantId,
    epoch: u64,
    /// Configuration frozen at request time
    config: ParticipantConfig,
    phase: Phase,
}

/// How a turn ended
enum Outcome {
    Completed,
    Failed(String),
}

/// A turn that fires once its deadline passes
#[derive(Clone, Copy, Debug)]
struct Scheduled {
    participant: ParticipantId,
    at: Instant,
}

/// The Conductor - headless turn orchestrator
pub struct Conductor<B: LlmBackend> {
    /// Configuration
    config: ConductorConfig,
    /// Generation backend
    backend: Arc<B>,
    /// Current participant configuration
    participants: [ParticipantConfig; 2],
    /// Both logs
    conversation: Conversation,
    /// Drafts currently being filled
    registry: StreamingRegistry,
    /// Turn pointer
    turn: TurnState,
    /// Per-panel transient flags
    flags: [PanelFlags; 2],
    /// Requested turns not yet finished (stale ones included)
    in_flight: Vec<InFlight>,
    /// Pending autostart or auto-advance turn
    scheduled: Option<Scheduled>,
    /// One-shot autostart latch
    autostart_fired: bool,
    /// Conversation topic
    topic: Option<String>,
    /// Bumped by every reset
    epoch: u64,
    /// Character reveal pacing
    pacer: Pacer,
    /// Channel to the surface
    tx: mpsc::UnboundedSender<ConductorMessage>,
    /// Messages sent so far, used to report progress from `poll`
    sent: u64,
}

impl<B: LlmBackend + 'static> Conductor<B> {
    /// Create a new Conductor with the given backend
    ///
    /// When a topic is configured, participants without a system
    /// instruction get one derived from the topic.
    pub fn new(
        backend: B,
        config: ConductorConfig,
        tx: mpsc::UnboundedSender<ConductorMessage>,
    ) -> Self {
        let topic = config
            .topic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let mut participants = config.participants.clone();
        if let Some(ref topic) = topic {
            for id in ParticipantId::ALL {
                let participant = &mut participants[id.index()];
                if participant.system_prompt.trim().is_empty() {
                    participant.system_prompt = topic_system_prompt(topic, id);
                }
            }
        }

        Self {
            pacer: Pacer::new(config.reveal_delay),
            backend: Arc::new(backend),
            participants,
            conversation: Conversation::new(),
            registry: StreamingRegistry::new(),
            turn: TurnState::default(),
            flags: [PanelFlags::default(); 2],
            in_flight: Vec::new(),
            scheduled: None,
            autostart_fired: false,
            topic,
            epoch: 0,
            tx,
            sent: 0,
            config,
        }
    }

    // ============================================
    // Queries
    // ============================================

    /// Current turn state
    #[must_use]
    pub fn turn(&self) -> TurnState {
        self.turn
    }

    /// Flags of one panel
    #[must_use]
    pub fn flags(&self, participant: ParticipantId) -> PanelFlags {
        self.flags[participant.index()]
    }

    /// Current configuration of one participant
    #[must_use]
    pub fn participant(&self, participant: ParticipantId) -> &ParticipantConfig {
        &self.participants[participant.index()]
    }

    /// Log of one participant
    #[must_use]
    pub fn log(&self, participant: ParticipantId) -> &ConversationLog {
        self.conversation.log(participant)
    }

    /// Drafts currently being filled
    #[must_use]
    pub fn registry(&self) -> &StreamingRegistry {
        &self.registry
    }

    /// Both logs merged by id, as seen from `viewer`'s panel
    #[must_use]
    pub fn panel_view(&self, viewer: ParticipantId) -> Vec<&Message> {
        self.conversation.panel_view(viewer, &self.registry)
    }

    /// Whether any participant is generating
    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.flags.iter().any(|f| f.generating)
    }

    /// Conversation topic
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Current generation epoch
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether turns are in flight or scheduled
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        !self.in_flight.is_empty() || self.scheduled.is_some()
    }

    /// Send the full state to a newly attached surface
    pub fn sync_surface(&mut self) {
        for id in ParticipantId::ALL {
            self.send(ConductorMessage::Config {
                participant: id,
                config: self.participants[id.index()].clone(),
            });
            self.send_flags(id);
        }
        self.send_turn();
    }

    // ============================================
    // Turn control
    // ============================================

    /// Request a turn for `participant`
    ///
    /// Resumes the cycle if none is running, keeping the counter of a paused
    /// one. The turn runs in the background;
    /// its progress is applied by [`Conductor::poll`].
    ///
    /// # Errors
    ///
    /// Returns [`TurnError`] when the turn policy refuses the request.
    pub fn request_turn(&mut self, participant: ParticipantId) -> Result<(), TurnError> {
        if self.flags[participant.index()].generating {
            return Err(TurnError::AlreadyGenerating(participant));
        }
        if self.config.turn_policy == TurnPolicy::Exclusive {
            if let Some(active) = ParticipantId::ALL
                .into_iter()
                .find(|p| self.flags[p.index()].generating)
            {
                return Err(TurnError::Busy { active });
            }
        }

        if !self.turn.running {
            self.turn.resume(participant);
            tracing::info!(participant = %participant, turn = self.turn.counter, "Cycle resumed");
            self.send_turn();
        }
        if self.scheduled.is_some_and(|s| s.participant == participant) {
            self.scheduled = None;
        }

        let config = self.participants[participant.index()].clone();
        tracing::info!(
            participant = %participant,
            model = %config.model,
            turn = self.turn.counter,
            "Turn requested"
        );

        let flags = &mut self.flags[participant.index()];
        flags.thinking = true;
        flags.generating = true;
        self.send_flags(participant);

        self.in_flight.push(InFlight {
            participant,
            epoch: self.epoch,
            config,
            phase: Phase::Thinking {
                until: Instant::now() + self.config.thinking_delay,
            },
        });

        Ok(())
    }

    /// Start a cycle; does not generate
    ///
    /// Drops a pending autostart or auto-advance turn.
    pub fn start(&mut self, first: Option<ParticipantId>) {
        let first = first.unwrap_or(self.config.first_speaker);
        self.turn.start(first);
        self.scheduled = None;
        tracing::info!(first = %first, "Cycle started");
        self.send_turn();
    }

    /// Stop the cycle; in-flight turns still complete
    pub fn pause(&mut self) {
        self.turn.pause();
        self.scheduled = None;
        tracing::info!("Cycle paused");
        self.send_turn();
    }

    /// Clear logs, flags, turn state and any scheduled turn
    ///
    /// Streaming turns are left to drain under the old epoch.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.turn = TurnState::default();
        self.conversation.clear();
        self.registry.clear();
        self.flags = [PanelFlags::default(); 2];
        self.scheduled = None;
        self.in_flight
            .retain(|t| matches!(t.phase, Phase::Streaming { .. }));

        tracing::info!(epoch = self.epoch, "Conversation reset");
        self.send(ConductorMessage::Reset);
        self.send_turn();
        for id in ParticipantId::ALL {
            self.send_flags(id);
        }
    }

    /// Kick off the conversation once
    ///
    /// Returns whether the latch fired. It fires at most once per Conductor,
    /// and only with a non-empty topic while no cycle is running.
    pub fn autostart(&mut self, topic: &str, first: ParticipantId) -> bool {
        let topic = topic.trim();
        if self.autostart_fired || topic.is_empty() || self.turn.running {
            return false;
        }
        self.autostart_fired = true;
        self.topic = Some(topic.to_string());

        for id in ParticipantId::ALL {
            if self.participants[id.index()].system_prompt.trim().is_empty() {
                self.participants[id.index()].system_prompt = topic_system_prompt(topic, id);
                self.send_config(id);
            }
        }

        tracing::info!(topic, first = %first, "Autostart scheduled");
        self.scheduled = Some(Scheduled {
            participant: first,
            at: Instant::now() + self.config.settle_delay,
        });
        true
    }

    // ============================================
    // Configuration
    // ============================================

    /// Change a participant's model
    pub fn set_model(&mut self, participant: ParticipantId, model: impl Into<String>) {
        self.participants[participant.index()].model = model.into();
        self.send_config(participant);
    }

    /// Change a participant's temperature (clamped)
    pub fn set_temperature(&mut self, participant: ParticipantId, temperature: f32) {
        self.participants[participant.index()].set_temperature(temperature);
        self.send_config(participant);
    }

    /// Change a participant's max output length (clamped)
    pub fn set_max_tokens(&mut self, participant: ParticipantId, max_tokens: u32) {
        self.participants[participant.index()].set_max_tokens(max_tokens);
        self.send_config(participant);
    }

    /// Change a participant's system instruction
    pub fn set_system_prompt(&mut self, participant: ParticipantId, system_prompt: impl Into<String>) {
        self.participants[participant.index()].system_prompt = system_prompt.into();
        self.send_config(participant);
    }

    /// Turn auto-advance on or off
    pub fn set_auto_advance(&mut self, enabled: bool) {
        self.config.auto_advance = enabled;
        if !enabled {
            self.scheduled = None;
        }
    }

    /// Whether auto-advance is on
    #[must_use]
    pub fn auto_advance(&self) -> bool {
        self.config.auto_advance
    }

    // ============================================
    // Surface events
    // ============================================

    /// Handle an event from a UI surface
    ///
    /// # Errors
    ///
    /// Returns an error when the surface channel is closed.
    pub fn handle_event(&mut self, event: SurfaceEvent) -> anyhow::Result<()> {
        if self.tx.is_closed() {
            anyhow::bail!("surface channel closed");
        }

        match event {
            SurfaceEvent::ModelChanged { participant, model } => {
                self.set_model(participant, model);
            }
            SurfaceEvent::TemperatureChanged {
                participant,
                temperature,
            } => self.set_temperature(participant, temperature),
            SurfaceEvent::MaxTokensChanged {
                participant,
                max_tokens,
            } => self.set_max_tokens(participant, max_tokens),
            SurfaceEvent::SystemPromptChanged {
                participant,
                system_prompt,
            } => self.set_system_prompt(participant, system_prompt),

            SurfaceEvent::SendMessage { participant } => {
                if let Err(e) = self.request_turn(participant) {
                    tracing::warn!(participant = %participant, reason = %e, "Turn request refused");
                    self.notify(NotifyLevel::Warning, None, e.to_string());
                }
            }
            SurfaceEvent::Start { first } => self.start(first),
            SurfaceEvent::Pause => self.pause(),
            SurfaceEvent::Reset => self.reset(),
            SurfaceEvent::Autostart { topic, first } => {
                if !self.autostart(&topic, first) {
                    tracing::debug!("Autostart ignored");
                }
            }

            SurfaceEvent::QuitRequested => {
                self.send(ConductorMessage::Quit { message: None });
            }
        }

        Ok(())
    }

    // ============================================
    // Polling
    // ============================================

    /// Advance scheduled turns, thinking deadlines and streams
    ///
    /// Returns true if anything was sent to the surface.
    pub async fn poll(&mut self) -> bool {
        let sent_before = self.sent;

        if let Some(scheduled) = self.scheduled {
            if Instant::now() >= scheduled.at {
                self.scheduled = None;
                if self.is_superseded(scheduled.participant) {
                    tracing::debug!(
                        participant = %scheduled.participant,
                        "Scheduled turn superseded"
                    );
                } else if let Err(e) = self.request_turn(scheduled.participant) {
                    tracing::warn!(reason = %e, "Scheduled turn refused");
                    self.notify(NotifyLevel::Warning, None, e.to_string());
                }
            }
        }

        let turns = std::mem::take(&mut self.in_flight);
        let mut remaining = Vec::with_capacity(turns.len());
        for turn in turns {
            if let Some(turn) = self.step(turn).await {
                remaining.push(turn);
            }
        }
        remaining.append(&mut self.in_flight);
        self.in_flight = remaining;

        self.sent != sent_before
    }

    /// Whether a user-requested turn already covers a scheduled one
    fn is_superseded(&self, participant: ParticipantId) -> bool {
        if self.flags[participant.index()].generating {
            return true;
        }
        self.config.turn_policy == TurnPolicy::Exclusive
            && ParticipantId::ALL
                .into_iter()
                .any(|p| self.flags[p.index()].generating)
    }

    /// Advance one turn; `None` once it is finished
    async fn step(&mut self, turn: InFlight) -> Option<InFlight> {
        let due = match turn.phase {
            Phase::Thinking { until } => Some(Instant::now() >= until),
            Phase::Streaming { .. } => None,
        };
        let turn = match due {
            Some(false) => return Some(turn),
            Some(true) => self.begin_streaming(turn).await?,
            None => turn,
        };
        self.drain(turn)
    }

    /// Thinking is over: build the prompt and open the stream
    async fn begin_streaming(&mut self, turn: InFlight) -> Option<InFlight> {
        let participant = turn.participant;

        self.flags[participant.index()].thinking = false;
        self.flags[participant.peer().index()].typing = true;
        self.send_flags(participant);
        self.send_flags(participant.peer());

        let mut history = build_history(
            self.conversation.log(ParticipantId::One),
            self.conversation.log(ParticipantId::Two),
            participant,
            self.config.context_window,
        );
        if history.is_empty() {
            match self.topic {
                Some(ref topic) => history.push(topic_seed(topic)),
                None => tracing::debug!(participant = %participant, "No history and no topic"),
            }
        }

        let message_id = self.conversation.start_streaming(participant);
        self.registry.insert(message_id);
        let timestamp = self
            .conversation
            .log(participant)
            .get(message_id)
            .map_or(0, |m| m.timestamp);
        self.send(ConductorMessage::MessageStarted {
            participant,
            message_id,
            timestamp,
        });

        let request = LlmRequest::from_participant(&turn.config, history);
        let backend = Arc::clone(&self.backend);
        match backend.send_streaming(&request).await {
            Ok(rx) => Some(InFlight {
                phase: Phase::Streaming {
                    rx: self.pacer.pace(rx),
                    message_id,
                },
                ..turn
            }),
            Err(e) => {
                self.finish_turn(&turn, message_id, Outcome::Failed(e.to_string()));
                None
            }
        }
    }

    /// Apply whatever the stream has delivered
    fn drain(&mut self, mut turn: InFlight) -> Option<InFlight> {
        let (message_id, received, closed) = match turn.phase {
            Phase::Streaming {
                ref mut rx,
                message_id,
            } => {
                let (received, closed) = collect_tokens(rx);
                (message_id, received, closed)
            }
            Phase::Thinking { .. } => return Some(turn),
        };

        let stale = turn.epoch != self.epoch;
        if stale {
            let finished = closed || received.last().is_some_and(StreamingToken::is_terminal);
            if finished {
                tracing::debug!(epoch = turn.epoch, "Stale turn drained");
                return None;
            }
            return Some(turn);
        }

        for token in received {
            match token {
                StreamingToken::Token(text) => self.reveal(turn.participant, message_id, &text),
                StreamingToken::Complete { .. } => {
                    self.finish_turn(&turn, message_id, Outcome::Completed);
                    return None;
                }
                StreamingToken::Error(error) => {
                    self.finish_turn(&turn, message_id, Outcome::Failed(error));
                    return None;
                }
            }
        }

        if closed {
            let error = GenerationError::Transport("stream closed before completion".to_string());
            self.finish_turn(&turn, message_id, Outcome::Failed(error.to_string()));
            return None;
        }

        Some(turn)
    }

    /// Append a fragment one character at a time
    fn reveal(&mut self, participant: ParticipantId, message_id: MessageId, text: &str) {
        for unit in split_units(text) {
            if !self
                .conversation
                .log_mut(participant)
                .append(message_id, &unit)
            {
                return;
            }
            self.send(ConductorMessage::Token {
                participant,
                message_id,
                text: unit,
            });
        }
    }

    /// Clear every transient trace of a turn and apply its outcome
    fn finish_turn(&mut self, turn: &InFlight, message_id: MessageId, outcome: Outcome) {
        let participant = turn.participant;

        self.flags[participant.peer().index()].typing = false;
        let flags = &mut self.flags[participant.index()];
        flags.thinking = false;
        flags.generating = false;
        self.registry.remove(message_id);
        self.send_flags(participant);
        self.send_flags(participant.peer());

        let failure = match outcome {
            Outcome::Completed => {
                let blank = self
                    .conversation
                    .log(participant)
                    .get(message_id)
                    .map_or(true, Message::is_blank);
                if blank {
                    Some(format!(
                        "{} from {}",
                        GenerationError::EmptyResult,
                        turn.config.model
                    ))
                } else {
                    None
                }
            }
            Outcome::Failed(error) => Some(error),
        };

        if let Some(error) = failure {
            self.conversation.log_mut(participant).discard(message_id);
            self.send(ConductorMessage::MessageDiscarded {
                participant,
                message_id,
            });
            tracing::warn!(participant = %participant, error = %error, "Turn failed");
            self.notify(
                NotifyLevel::Error,
                Some(format!("{participant} ({})", turn.config.model)),
                error,
            );
            return;
        }

        let final_content = self
            .conversation
            .log_mut(participant)
            .finalize(message_id)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.send(ConductorMessage::StreamEnd {
            participant,
            message_id,
            final_content,
        });

        self.turn.advance(participant);
        tracing::info!(
            participant = %participant,
            next = %participant.peer(),
            turn = self.turn.counter,
            "Turn completed"
        );
        self.send_turn();

        if self.config.auto_advance && self.turn.running {
            self.scheduled = Some(Scheduled {
                participant: participant.peer(),
                at: Instant::now() + self.config.settle_delay,
            });
        }
    }

    // ============================================
    // Surface output
    // ============================================

    fn send_flags(&mut self, participant: ParticipantId) {
        self.send(ConductorMessage::Panel {
            participant,
            flags: self.flags[participant.index()],
        });
    }

    fn send_turn(&mut self) {
        self.send(ConductorMessage::Turn {
            turn: self.turn.into(),
        });
    }

    fn send_config(&mut self, participant: ParticipantId) {
        self.send(ConductorMessage::Config {
            participant,
            config: self.participants[participant.index()].clone(),
        });
    }

    fn notify(&mut self, level: NotifyLevel, title: Option<String>, message: String) {
        self.send(ConductorMessage::Notify {
            level,
            title,
            message,
        });
    }

    fn send(&mut self, msg: ConductorMessage) {
        self.sent += 1;
        if let Err(e) = self.tx.send(msg) {
            tracing::warn!("Failed to send message to surface: {}", e);
        }
    }
}

/// Take everything available, stopping after a terminal event
///
/// The flag reports whether the producer went away.
fn collect_tokens(rx: &mut mpsc::Receiver<StreamingToken>) -> (Vec<StreamingToken>, bool) {
    let mut received = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(token) => {
                let terminal = token.is_terminal();
                received.push(token);
                if terminal {
                    return (received, false);
                }
            }
            Err(TryRecvError::Empty) => return (received, false),
            Err(TryRecvError::Disconnected) => return (received, true),
        }
    }
}
