//! Theme and Colors
//!
//! One accent per participant, plus the shared chrome colors.

use ratatui::style::{Color, Modifier, Style};

use duet_conductor::{NotifyLevel, ParticipantId};

// ============================================================================
// Participant Accents
// ============================================================================

/// Participant 1 - teal
pub const PARTICIPANT_ONE: Color = Color::Rgb(94, 200, 200);

/// Participant 2 - coral
pub const PARTICIPANT_TWO: Color = Color::Rgb(255, 140, 120);

// ============================================================================
// UI Colors
// ============================================================================

/// System/dim text
pub const DIM_GRAY: Color = Color::Rgb(100, 100, 100);

/// Border of the unfocused panel
pub const BORDER_IDLE: Color = Color::Rgb(70, 70, 70);

/// Thinking/typing indicator
pub const INDICATOR_BLUE: Color = Color::Rgb(150, 180, 255);

/// Warning yellow
pub const WARNING_YELLOW: Color = Color::Rgb(255, 210, 90);

/// Error red
pub const ERROR_RED: Color = Color::Rgb(255, 80, 80);

/// Accent of a participant
pub fn participant_color(participant: ParticipantId) -> Color {
    match participant {
        ParticipantId::One => PARTICIPANT_ONE,
        ParticipantId::Two => PARTICIPANT_TWO,
    }
}

/// Panel border, highlighted when focused
pub fn border_style(participant: ParticipantId, focused: bool) -> Style {
    if focused {
        Style::default()
            .fg(participant_color(participant))
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(BORDER_IDLE)
    }
}

/// Status bar color for a notification level
pub fn notify_color(level: NotifyLevel) -> Color {
    match level {
        NotifyLevel::Info => DIM_GRAY,
        NotifyLevel::Warning => WARNING_YELLOW,
        NotifyLevel::Error => ERROR_RED,
    }
}
