//! Main Application
//!
//! The App manages the TUI lifecycle as a thin display client:
//! - Event loop (keyboard, resize) raced against a frame tick
//! - ConductorClient for orchestration
//! - DisplayState for rendering
//!
//! Every frame it polls the Conductor, applies whatever messages arrived,
//! and redraws both columns.

use std::io;
use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use unicode_width::UnicodeWidthChar;

use duet_conductor::{DuetConfig, HttpBackend, LlmBackend, NotifyLevel, ParticipantId};

use crate::conductor_client::ConductorClient;
use crate::display::{DisplayState, PanelState};
use crate::theme;

/// Frame tick; also bounds how long a revealed character waits to be drawn
const FRAME_TICK: Duration = Duration::from_millis(16);

/// Temperature change per key press
const TEMPERATURE_STEP: f32 = 0.1;

/// Max tokens change per key press
const MAX_TOKENS_STEP: u32 = 50;

/// Lines scrolled per key press
const SCROLL_STEP: usize = 5;

/// Rows above the message list inside a panel
const PANEL_HEADER_HEIGHT: u16 = 2;

/// What a key press asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Move focus to the other panel
    SwitchFocus,
    /// Let the focused participant speak
    Send,
    /// Start a cycle with the focused participant
    Start,
    /// Pause the cycle
    Pause,
    /// Clear everything
    Reset,
    /// Next model from the configured list
    CycleModel,
    /// Raise temperature
    TemperatureUp,
    /// Lower temperature
    TemperatureDown,
    /// Raise max tokens
    MaxTokensUp,
    /// Lower max tokens
    MaxTokensDown,
    /// Open the system prompt editor
    EditPrompt,
    /// Scroll the focused panel back
    ScrollUp,
    /// Scroll the focused panel forward
    ScrollDown,
    /// Type into the prompt editor
    EditInsert(char),
    /// Delete from the prompt editor
    EditBackspace,
    /// Apply the edited prompt
    EditCommit,
    /// Close the editor without applying
    EditCancel,
    /// Leave the application
    Quit,
}

impl Action {
    /// Map a key press, given whether the prompt editor is open
    pub fn from_key(key: KeyEvent, editing: bool) -> Option<Self> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Self::Quit);
        }

        if editing {
            return match key.code {
                KeyCode::Enter => Some(Self::EditCommit),
                KeyCode::Esc => Some(Self::EditCancel),
                KeyCode::Backspace => Some(Self::EditBackspace),
                KeyCode::Char(c) => Some(Self::EditInsert(c)),
                _ => None,
            };
        }

        match key.code {
            KeyCode::Esc => Some(Self::Quit),
            KeyCode::Tab | KeyCode::BackTab => Some(Self::SwitchFocus),
            KeyCode::Enter => Some(Self::Send),
            KeyCode::Char('s') => Some(Self::Start),
            KeyCode::Char('p') => Some(Self::Pause),
            KeyCode::Char('r') => Some(Self::Reset),
            KeyCode::Char('m') => Some(Self::CycleModel),
            KeyCode::Char('+' | '=') => Some(Self::TemperatureUp),
            KeyCode::Char('-') => Some(Self::TemperatureDown),
            KeyCode::Char(']') => Some(Self::MaxTokensUp),
            KeyCode::Char('[') => Some(Self::MaxTokensDown),
            KeyCode::Char('e') => Some(Self::EditPrompt),
            KeyCode::PageUp | KeyCode::Up => Some(Self::ScrollUp),
            KeyCode::PageDown | KeyCode::Down => Some(Self::ScrollDown),
            _ => None,
        }
    }
}

/// System prompt being edited
#[derive(Clone, Debug)]
struct PromptEditor {
    participant: ParticipantId,
    buffer: String,
}

/// Main application state
pub struct App<B: LlmBackend + 'static = HttpBackend> {
    // === Core State ===
    /// Is the app still running?
    running: bool,

    // === Conductor Integration ===
    /// Client for communicating with the embedded Conductor
    client: ConductorClient<B>,
    /// Display state derived from ConductorMessages
    display: DisplayState,

    // === Input State ===
    /// Panel receiving per-panel keys
    focus: ParticipantId,
    /// Open prompt editor
    editor: Option<PromptEditor>,
    /// Scroll offset per panel (lines from bottom, 0 = latest)
    scroll: [usize; 2],

    // === Launch ===
    /// Models offered by `m`
    models: Vec<String>,
    /// Topic and first speaker for the one-shot autostart
    launch: Option<(String, ParticipantId)>,
}

impl App<HttpBackend> {
    /// Create the application from the loaded configuration
    pub fn new(config: &DuetConfig) -> Self {
        let launch = config
            .conductor
            .topic
            .clone()
            .map(|topic| (topic, config.conductor.first_speaker));
        Self::with_client(ConductorClient::from_config(config), config.models.clone(), launch)
    }
}

impl<B: LlmBackend + 'static> App<B> {
    /// Create the application around an existing client
    pub fn with_client(
        client: ConductorClient<B>,
        models: Vec<String>,
        launch: Option<(String, ParticipantId)>,
    ) -> Self {
        Self {
            running: true,
            client,
            display: DisplayState::new(),
            focus: ParticipantId::One,
            editor: None,
            scroll: [0; 2],
            models,
            launch,
        }
    }

    /// Main event loop
    pub async fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        let mut event_stream = EventStream::new();

        self.launch()?;
        self.render(terminal)?;

        while self.running {
            tokio::select! {
                biased;

                maybe_event = event_stream.next() => match maybe_event {
                    // Only handle Press events (not Release or Repeat)
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        self.handle_key(key);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => tracing::warn!(error = %e, "Terminal event error"),
                    None => self.running = false,
                },

                () = tokio::time::sleep(FRAME_TICK) => {}
            }

            self.tick().await;
            self.render(terminal)?;
        }

        Ok(())
    }

    /// Sync the surface and fire the autostart once
    pub fn launch(&mut self) -> anyhow::Result<()> {
        self.client.sync();
        if let Some((topic, first)) = self.launch.take() {
            tracing::info!(topic = %topic, first = %first, "Launching with topic");
            self.client.autostart(topic, first)?;
        }
        self.process_conductor_messages();
        Ok(())
    }

    /// Poll the Conductor and apply what it sent
    pub async fn tick(&mut self) {
        self.client.poll().await;
        self.process_conductor_messages();
        if self.display.quit {
            self.running = false;
        }
    }

    /// Process all pending messages from the Conductor
    fn process_conductor_messages(&mut self) {
        for msg in self.client.recv_all() {
            self.display.apply_message(msg);
        }
    }

    /// Handle keyboard input
    pub fn handle_key(&mut self, key: KeyEvent) {
        let Some(action) = Action::from_key(key, self.editor.is_some()) else {
            return;
        };
        if let Err(e) = self.dispatch(action) {
            tracing::warn!(action = ?action, error = %e, "Action failed");
            self.display.notify(NotifyLevel::Error, e.to_string());
        }
        self.process_conductor_messages();
    }

    /// Carry out one action
    pub fn dispatch(&mut self, action: Action) -> anyhow::Result<()> {
        let focus = self.focus;
        let config = self.display.panel(focus).config.clone();

        match action {
            Action::SwitchFocus => self.focus = focus.peer(),
            Action::Send => {
                if self.display.can_send(focus) {
                    self.scroll[focus.index()] = 0;
                    self.client.on_send_message(focus)?;
                } else {
                    self.display
                        .notify(NotifyLevel::Warning, format!("Not {focus}'s turn yet"));
                }
            }
            Action::Start => self.client.on_start(Some(focus))?,
            Action::Pause => self.client.on_pause()?,
            Action::Reset => {
                self.scroll = [0; 2];
                self.client.on_reset()?;
            }
            Action::CycleModel => {
                if let Some(model) = next_model(&self.models, &config.model) {
                    self.client.on_model_change(focus, model)?;
                }
            }
            Action::TemperatureUp => self
                .client
                .on_temperature_change(focus, step_temperature(config.temperature, 1.0))?,
            Action::TemperatureDown => self
                .client
                .on_temperature_change(focus, step_temperature(config.temperature, -1.0))?,
            Action::MaxTokensUp => self
                .client
                .on_max_tokens_change(focus, config.max_tokens.saturating_add(MAX_TOKENS_STEP))?,
            Action::MaxTokensDown => self
                .client
                .on_max_tokens_change(focus, config.max_tokens.saturating_sub(MAX_TOKENS_STEP))?,
            Action::EditPrompt => {
                self.editor = Some(PromptEditor {
                    participant: focus,
                    buffer: config.system_prompt,
                });
            }
            Action::ScrollUp => {
                let offset = &mut self.scroll[focus.index()];
                *offset = offset.saturating_add(SCROLL_STEP);
            }
            Action::ScrollDown => {
                let offset = &mut self.scroll[focus.index()];
                *offset = offset.saturating_sub(SCROLL_STEP);
            }
            Action::EditInsert(c) => {
                if let Some(ref mut editor) = self.editor {
                    editor.buffer.push(c);
                }
            }
            Action::EditBackspace => {
                if let Some(ref mut editor) = self.editor {
                    editor.buffer.pop();
                }
            }
            Action::EditCommit => {
                if let Some(editor) = self.editor.take() {
                    self.client
                        .on_system_prompt_change(editor.participant, editor.buffer)?;
                }
            }
            Action::EditCancel => self.editor = None,
            Action::Quit => {
                self.client.request_quit()?;
                self.running = false;
            }
        }
        Ok(())
    }

    // ============================================
    // Rendering
    // ============================================

    /// Render the UI
    fn render(&self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> anyhow::Result<()> {
        terminal.draw(|frame| self.draw(frame))?;
        Ok(())
    }

    /// Draw both panels and the status bar
    pub fn draw(&self, frame: &mut Frame) {
        let [main, status] =
            Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(frame.area());
        let [left, right] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                .areas(main);

        self.draw_panel(frame, left, ParticipantId::One);
        self.draw_panel(frame, right, ParticipantId::Two);
        self.draw_status(frame, status);
    }

    fn draw_panel(&self, frame: &mut Frame, area: Rect, participant: ParticipantId) {
        let panel = self.display.panel(participant);
        let focused = self.focus == participant;
        let accent = theme::participant_color(participant);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::border_style(participant, focused))
            .title(Span::styled(
                format!(" {participant} - {} ", panel.config.model),
                Style::default().fg(accent).add_modifier(Modifier::BOLD),
            ));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [header, body] = Layout::vertical([
            Constraint::Length(PANEL_HEADER_HEIGHT),
            Constraint::Min(1),
        ])
        .areas(inner);

        frame.render_widget(Paragraph::new(self.header_lines(panel, header.width)), header);

        let lines = message_lines(panel, usize::from(body.width));
        let height = usize::from(body.height);
        let offset = self.scroll[participant.index()].min(lines.len().saturating_sub(height));
        let start = lines.len().saturating_sub(height + offset);
        let visible: Vec<Line> = lines.into_iter().skip(start).take(height).collect();
        frame.render_widget(Paragraph::new(visible), body);
    }

    /// Settings line and system prompt line
    fn header_lines(&self, panel: &PanelState, width: u16) -> Vec<Line<'static>> {
        let width = usize::from(width);
        let indicator_style = if panel.flags.any() {
            Style::default().fg(theme::INDICATOR_BLUE)
        } else {
            Style::default().fg(theme::DIM_GRAY)
        };
        let settings = Line::from(vec![
            Span::raw(format!(
                "temp {:.1} | max {} | ",
                panel.config.temperature, panel.config.max_tokens
            )),
            Span::styled(panel.flags.label(), indicator_style),
        ]);

        let prompt = match self.editor {
            Some(ref editor) if editor.participant == panel.participant => Line::styled(
                truncate_to_width(&format!("prompt> {}_", editor.buffer), width),
                Style::default().fg(theme::WARNING_YELLOW),
            ),
            _ if panel.config.system_prompt.is_empty() => {
                Line::styled("(no system prompt)", Style::default().fg(theme::DIM_GRAY))
            }
            _ => Line::styled(
                truncate_to_width(&panel.config.system_prompt, width),
                Style::default().fg(theme::DIM_GRAY),
            ),
        };

        vec![settings, prompt]
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let (text, style) = match self.display.notification {
            Some(ref note) => (note.line(), Style::default().fg(theme::notify_color(note.level))),
            None if self.editor.is_some() => (
                "Enter save | Esc cancel".to_string(),
                Style::default().fg(theme::DIM_GRAY),
            ),
            None => (
                "Tab focus | Enter send | s start | p pause | r reset | m model | +/- temp | ]/[ max | e prompt | Esc quit"
                    .to_string(),
                Style::default().fg(theme::DIM_GRAY),
            ),
        };

        let status = format!(" {} | {}", self.display.turn_label(), text);
        frame.render_widget(
            Paragraph::new(Line::styled(
                truncate_to_width(&status, usize::from(area.width)),
                style,
            )),
            area,
        );
    }

    // ============================================
    // Accessors
    // ============================================

    /// Display state
    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Focused panel
    pub fn focus(&self) -> ParticipantId {
        self.focus
    }

    /// Whether the prompt editor is open
    pub fn is_editing(&self) -> bool {
        self.editor.is_some()
    }

    /// Whether the loop should keep going
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The embedded client
    pub fn client(&self) -> &ConductorClient<B> {
        &self.client
    }

    /// Goodbye message for display after the TUI closes
    pub fn goodbye(&self) -> Option<&str> {
        self.display.goodbye.as_deref()
    }
}

/// Wrapped lines of a panel's messages
pub fn message_lines(panel: &PanelState, width: usize) -> Vec<Line<'static>> {
    if width < 4 {
        return Vec::new();
    }

    if panel.messages.is_empty() {
        return vec![Line::styled(
            format!("Press Enter to let {} speak", panel.participant),
            Style::default().fg(theme::DIM_GRAY),
        )];
    }

    let mut lines = Vec::new();
    for msg in &panel.messages {
        let accent = theme::participant_color(msg.participant);
        let label = if msg.participant == panel.participant {
            msg.participant.to_string()
        } else {
            format!("{} (peer)", msg.participant)
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!("[{}] ", msg.time_label()),
                Style::default().fg(theme::DIM_GRAY),
            ),
            Span::styled(label, Style::default().fg(accent).add_modifier(Modifier::BOLD)),
        ]));

        let content = if msg.streaming {
            format!("{}_", msg.content)
        } else {
            msg.content.clone()
        };
        for line in textwrap::wrap(&content, width) {
            lines.push(Line::raw(line.into_owned()));
        }
        lines.push(Line::default());
    }
    lines
}

/// Cut `text` to at most `width` terminal columns
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        if c == '\n' {
            break;
        }
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

/// Model after `current` in `models`, wrapping around
fn next_model(models: &[String], current: &str) -> Option<String> {
    if models.is_empty() {
        return None;
    }
    let next = models
        .iter()
        .position(|m| m == current)
        .map_or(0, |idx| (idx + 1) % models.len());
    Some(models[next].clone())
}

/// Temperature one step up or down, kept on the 0.1 grid
fn step_temperature(current: f32, direction: f32) -> f32 {
    ((current + direction * TEMPERATURE_STEP) * 10.0).round() / 10.0
}
