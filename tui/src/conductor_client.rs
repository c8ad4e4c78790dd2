//! Conductor Client
//!
//! Thin wrapper around the Conductor for TUI integration. The Conductor is
//! embedded directly (no network hop between surface and orchestrator).
//!
//! # Architecture
//!
//! The TUI is a "thin client": it holds no turn logic. Its job is:
//! 1. Convert key presses to presentation callbacks
//! 2. Forward them to the Conductor as `SurfaceEvent`s
//! 3. Drain `ConductorMessage`s every frame
//! 4. Render the display state derived from them

use tokio::sync::mpsc;

use duet_conductor::{
    Conductor, ConductorConfig, ConductorMessage, DuetConfig, HttpBackend, LlmBackend,
    ParticipantId, SurfaceEvent,
};

/// Client for communicating with the embedded Conductor
pub struct ConductorClient<B: LlmBackend + 'static = HttpBackend> {
    /// The embedded Conductor instance
    conductor: Conductor<B>,
    /// Receiver for messages from the Conductor
    rx: mpsc::UnboundedReceiver<ConductorMessage>,
}

impl ConductorClient<HttpBackend> {
    /// Create a client talking to the gateway described by `config`
    pub fn from_config(config: &DuetConfig) -> Self {
        let backend = HttpBackend::from_settings(&config.backend);
        Self::with_backend(backend, config.conductor.clone())
    }
}

impl<B: LlmBackend + 'static> ConductorClient<B> {
    /// Create a client around any backend
    pub fn with_backend(backend: B, config: ConductorConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let conductor = Conductor::new(backend, config, tx);
        Self { conductor, rx }
    }

    /// Ask the Conductor for its full state
    pub fn sync(&mut self) {
        self.conductor.sync_surface();
    }

    // ============================================
    // Presentation callbacks
    // ============================================

    /// A panel's model selector changed
    pub fn on_model_change(&mut self, participant: ParticipantId, model: String) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::ModelChanged { participant, model })
    }

    /// A panel's temperature changed
    pub fn on_temperature_change(
        &mut self,
        participant: ParticipantId,
        temperature: f32,
    ) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::TemperatureChanged {
            participant,
            temperature,
        })
    }

    /// A panel's max output length changed
    pub fn on_max_tokens_change(
        &mut self,
        participant: ParticipantId,
        max_tokens: u32,
    ) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::MaxTokensChanged {
            participant,
            max_tokens,
        })
    }

    /// A panel's system instruction was edited
    pub fn on_system_prompt_change(
        &mut self,
        participant: ParticipantId,
        system_prompt: String,
    ) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::SystemPromptChanged {
            participant,
            system_prompt,
        })
    }

    /// A panel's send control was pressed
    pub fn on_send_message(&mut self, participant: ParticipantId) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::SendMessage { participant })
    }

    /// Start control
    pub fn on_start(&mut self, first: Option<ParticipantId>) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::Start { first })
    }

    /// Pause control
    pub fn on_pause(&mut self) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::Pause)
    }

    /// Reset control
    pub fn on_reset(&mut self) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::Reset)
    }

    /// Launch-time kickoff; ignored after the first time
    pub fn autostart(&mut self, topic: String, first: ParticipantId) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::Autostart { topic, first })
    }

    /// The user wants to quit
    pub fn request_quit(&mut self) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::QuitRequested)
    }

    /// Send a raw surface event to the Conductor
    pub fn send_event(&mut self, event: SurfaceEvent) -> anyhow::Result<()> {
        self.conductor.handle_event(event)
    }

    // ============================================
    // Polling
    // ============================================

    /// Advance the Conductor (must be called every frame)
    pub async fn poll(&mut self) -> bool {
        self.conductor.poll().await
    }

    /// Receive all pending messages from the Conductor (non-blocking)
    pub fn recv_all(&mut self) -> Vec<ConductorMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Whether turns are in flight or scheduled
    pub fn is_busy(&self) -> bool {
        self.conductor.has_pending_work()
    }
}
