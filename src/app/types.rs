use std::fmt;

use ratatui::style::{Color, Modifier, Style};

use crate::service::{FragmentStream, ServiceError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum ThemePreset {
    Fjord,
    #[default]
    Graphite,
    Ember,
}

impl ThemePreset {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            ThemePreset::Fjord => "fjord",
            ThemePreset::Graphite => "graphite",
            ThemePreset::Ember => "ember",
        }
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "fjord" | "nord" | "blue" => Some(ThemePreset::Fjord),
            "graphite" | "slate" | "gray" => Some(ThemePreset::Graphite),
            "ember" | "warm" | "copper" => Some(ThemePreset::Ember),
            _ => None,
        }
    }

    pub(crate) fn palette(self) -> ThemePalette {
        match self {
            ThemePreset::Fjord => ThemePalette {
                prompt: Color::Rgb(136, 192, 208),
                input_text: Color::Rgb(229, 233, 240),
                muted_text: Color::Rgb(97, 110, 136),
                status_text: Color::Rgb(129, 161, 193),
                user_label: Color::Rgb(180, 142, 173),
                bot_label: Color::Rgb(163, 190, 140),
                error_label: Color::Rgb(191, 97, 106),
                body_text: Color::Rgb(216, 222, 233),
                error_text: Color::Rgb(208, 135, 112),
                panel_bg: Color::Rgb(46, 52, 64),
                panel_fg: Color::Rgb(216, 222, 233),
                border: Color::Rgb(76, 86, 106),
                title: Color::Rgb(236, 239, 244),
            },
            ThemePreset::Graphite => ThemePalette {
                prompt: Color::Rgb(100, 150, 200),
                input_text: Color::Rgb(180, 200, 220),
                muted_text: Color::Rgb(80, 100, 120),
                status_text: Color::Rgb(90, 110, 130),
                user_label: Color::Rgb(200, 120, 220),
                bot_label: Color::Rgb(110, 200, 130),
                error_label: Color::Rgb(220, 100, 100),
                body_text: Color::Rgb(170, 190, 210),
                error_text: Color::Rgb(230, 120, 120),
                panel_bg: Color::Rgb(10, 20, 30),
                panel_fg: Color::Rgb(170, 190, 210),
                border: Color::Rgb(40, 60, 80),
                title: Color::Rgb(150, 170, 190),
            },
            ThemePreset::Ember => ThemePalette {
                prompt: Color::Rgb(230, 150, 90),
                input_text: Color::Rgb(238, 238, 238),
                muted_text: Color::Rgb(153, 153, 153),
                status_text: Color::Rgb(170, 170, 170),
                user_label: Color::Rgb(255, 160, 110),
                bot_label: Color::Rgb(200, 210, 120),
                error_label: Color::Rgb(220, 90, 80),
                body_text: Color::Rgb(220, 220, 220),
                error_text: Color::Rgb(235, 125, 110),
                panel_bg: Color::Rgb(18, 12, 10),
                panel_fg: Color::Rgb(220, 220, 220),
                border: Color::Rgb(90, 60, 45),
                title: Color::Rgb(230, 200, 170),
            },
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) struct ThemePalette {
    pub(crate) prompt: Color,
    pub(crate) input_text: Color,
    pub(crate) muted_text: Color,
    pub(crate) status_text: Color,
    pub(crate) user_label: Color,
    pub(crate) bot_label: Color,
    pub(crate) error_label: Color,
    pub(crate) body_text: Color,
    pub(crate) error_text: Color,
    pub(crate) panel_bg: Color,
    pub(crate) panel_fg: Color,
    pub(crate) border: Color,
    pub(crate) title: Color,
}

impl ThemePalette {
    pub(crate) fn prompt_style(self) -> Style {
        Style::default()
            .fg(self.prompt)
            .add_modifier(Modifier::BOLD)
    }

    pub(crate) fn title_style(self) -> Style {
        Style::default().fg(self.title).add_modifier(Modifier::BOLD)
    }

    pub(crate) fn label_style(self, color: Color) -> Style {
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    pub(crate) fn body_style(self) -> Style {
        Style::default().fg(self.body_text)
    }

    pub(crate) fn error_style(self) -> Style {
        Style::default().fg(self.error_text)
    }

    pub(crate) fn muted_style(self) -> Style {
        Style::default().fg(self.muted_text)
    }

    pub(crate) fn status_style(self) -> Style {
        Style::default().fg(self.status_text)
    }

    pub(crate) fn panel_surface_style(self) -> Style {
        Style::default().bg(self.panel_bg).fg(self.panel_fg)
    }

    pub(crate) fn panel_border_style(self) -> Style {
        Style::default().fg(self.border)
    }

    pub(crate) fn input_surface_style(self) -> Style {
        Style::default().fg(self.input_text)
    }
}

/// Identifies one stream session; results tagged with an older id are stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SessionId(pub(crate) u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Results posted back by stream workers.
pub(crate) enum StreamEvent {
    Opened {
        session: SessionId,
        stream: Box<dyn FragmentStream>,
    },
    OpenFailed {
        session: SessionId,
        error: ServiceError,
    },
    Fragment {
        session: SessionId,
        text: String,
        stream: Box<dyn FragmentStream>,
    },
    Ended {
        session: SessionId,
    },
    Failed {
        session: SessionId,
        error: ServiceError,
    },
}

impl StreamEvent {
    pub(crate) fn session(&self) -> SessionId {
        match self {
            StreamEvent::Opened { session, .. }
            | StreamEvent::OpenFailed { session, .. }
            | StreamEvent::Fragment { session, .. }
            | StreamEvent::Ended { session }
            | StreamEvent::Failed { session, .. } => *session,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            StreamEvent::Opened { .. } => "opened",
            StreamEvent::OpenFailed { .. } => "open-failed",
            StreamEvent::Fragment { .. } => "fragment",
            StreamEvent::Ended { .. } => "ended",
            StreamEvent::Failed { .. } => "failed",
        }
    }
}

impl fmt::Debug for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEvent::Fragment { session, text, .. } => f
                .debug_struct("Fragment")
                .field("session", session)
                .field("text", text)
                .finish_non_exhaustive(),
            StreamEvent::OpenFailed { session, error } | StreamEvent::Failed { session, error } => f
                .debug_struct(self.name())
                .field("session", session)
                .field("error", error)
                .finish(),
            other => f
                .debug_struct(other.name())
                .field("session", &other.session())
                .finish_non_exhaustive(),
        }
    }
}

/// Everything the dispatch loop feeds into the app, in arrival order.
#[derive(Debug)]
pub(crate) enum AppEvent {
    Terminal(crossterm::event::Event),
    Stream(StreamEvent),
    Tick,
}
