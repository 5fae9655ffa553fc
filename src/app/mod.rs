use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Sender};
use crossterm::event::{self, Event, KeyEventKind, MouseEventKind};
use ratatui::backend::CrosstermBackend;
use ratatui::text::{Line, Text};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Terminal;
use tracing::info;

use crate::config::Config;
use crate::service::GenerationService;
use crate::{input_cursor_position, truncate};

mod controller;
mod input;
mod log;
mod render;
mod runtime;
mod stream;
mod text;
mod types;
mod ui;
mod worker;

use controller::{Command, ControlEvent, Controller, ControllerConfig, Notice, Phase};
pub(crate) use runtime::run_app;
use stream::Task;
use text::sanitize_runtime_text;
pub(crate) use types::ThemePreset;
use types::{AppEvent, ThemePalette};

const PROMPT_PREFIX: &str = "┃ ";
const WHEEL_SCROLL_LINES: u16 = 3;
const PAGE_SCROLL_LINES: u16 = 5;
/// Borders plus one column of padding on each side.
const PANEL_HORIZONTAL_INSET: u16 = 4;
const PANEL_VERTICAL_INSET: u16 = 2;
const STATUS_HEIGHT: u16 = 1;
const WELCOME_TEXT: &str = "Welcome to the LLM Chat!\nType a message and press Enter to send.";
const REJECTED_STATUS: &str = "generation in progress; wait for it to finish";

/// Cached transcript layout, rebuilt when the transcript or viewport changes.
struct RenderCache {
    generation: u64,
    width: u16,
    height: u16,
    lines: Vec<Line<'static>>,
    scroll_max: u16,
}

impl RenderCache {
    fn new() -> Self {
        Self {
            generation: u64::MAX, // force first rebuild
            width: 0,
            height: 0,
            lines: Vec::new(),
            scroll_max: 0,
        }
    }
}

struct App {
    controller: Controller,
    theme: ThemePreset,
    endpoint: String,
    should_quit: bool,
    spinner_idx: usize,

    input: String,
    cursor: usize,
    input_limit: usize,
    history: Vec<String>,
    history_pos: Option<usize>,

    /// Latest snapshot pushed by the controller.
    transcript: String,
    scroll: u16,
    autoscroll: bool,
    viewport_width: u16,
    viewport_height: u16,

    last_status: String,
    render_generation: u64,
    render_cache: RenderCache,
}

impl App {
    fn new(config: &Config) -> Self {
        Self {
            controller: Controller::new(ControllerConfig {
                max_tokens: config.max_tokens,
                timeout: config.timeout,
            }),
            theme: config.theme,
            endpoint: config.endpoint.clone(),
            should_quit: false,
            spinner_idx: 0,
            input: String::new(),
            cursor: 0,
            input_limit: config.input_limit,
            history: Vec::new(),
            history_pos: None,
            transcript: String::new(),
            scroll: 0,
            autoscroll: true,
            viewport_width: 80,
            viewport_height: 24,
            last_status: "ready".to_string(),
            render_generation: 0,
            render_cache: RenderCache::new(),
        }
    }

    fn is_generating(&self) -> bool {
        matches!(
            self.controller.phase(),
            Phase::AwaitingStreamOpen | Phase::Streaming
        )
    }

    fn theme_palette(&self) -> ThemePalette {
        self.theme.palette()
    }

    /// Feed one dispatch-loop event through the app; returns work to schedule.
    fn handle(&mut self, event: AppEvent, now: Instant) -> Vec<Task> {
        match event {
            AppEvent::Tick => {
                if self.is_generating() {
                    self.spinner_idx = self.spinner_idx.wrapping_add(1);
                }
                self.control(ControlEvent::Tick, now)
            }
            AppEvent::Stream(stream_event) => self.control(ControlEvent::Stream(stream_event), now),
            AppEvent::Terminal(Event::Key(key)) => {
                if matches!(key.kind, KeyEventKind::Release) {
                    return Vec::new();
                }
                self.handle_key(key, now)
            }
            AppEvent::Terminal(Event::Paste(text)) => {
                self.handle_paste(&text);
                Vec::new()
            }
            AppEvent::Terminal(Event::Resize(width, height)) => {
                self.update_viewport(width, height);
                Vec::new()
            }
            AppEvent::Terminal(Event::Mouse(mouse)) => {
                match mouse.kind {
                    MouseEventKind::ScrollUp => self.scroll_up(WHEEL_SCROLL_LINES),
                    MouseEventKind::ScrollDown => self.scroll_down(WHEEL_SCROLL_LINES),
                    _ => {}
                }
                Vec::new()
            }
            AppEvent::Terminal(_) => Vec::new(),
        }
    }

    fn control(&mut self, event: ControlEvent, now: Instant) -> Vec<Task> {
        let commands = self.controller.handle(event, now);
        self.apply(commands)
    }

    fn apply(&mut self, commands: Vec<Command>) -> Vec<Task> {
        let mut tasks = Vec::new();
        for command in commands {
            match command {
                Command::Spawn(task) => tasks.push(task),
                Command::Render(snapshot) => self.show_transcript(snapshot),
                Command::Notice(notice) => self.apply_notice(notice),
                Command::Exit => self.should_quit = true,
            }
        }
        tasks
    }

    fn apply_notice(&mut self, notice: Notice) {
        match notice {
            Notice::Submitted => {
                let submitted = std::mem::take(&mut self.input);
                if self.history.last() != Some(&submitted) {
                    self.history.push(submitted);
                }
                self.history_pos = None;
                self.cursor = 0;
                self.autoscroll = true;
                self.last_status = "waiting for stream".to_string();
            }
            Notice::Rejected => self.last_status = REJECTED_STATUS.to_string(),
            Notice::Completed => self.last_status = "done".to_string(),
            Notice::Failed(description) => {
                self.last_status = format!("error: {}", truncate(&description, 48));
            }
        }
    }

    fn show_transcript(&mut self, snapshot: String) {
        self.transcript = snapshot;
        self.follow_scroll();
    }

    fn invalidate_render_cache(&mut self) {
        self.render_generation = self.render_generation.wrapping_add(1);
    }

    /// Invalidate the cache and keep the view pinned to the bottom when following.
    fn follow_scroll(&mut self) {
        self.invalidate_render_cache();
        if self.autoscroll {
            self.scroll = self.scroll_max();
        } else {
            self.scroll = self.scroll.min(self.scroll_max());
        }
    }

    fn transcript_width(&self) -> u16 {
        self.viewport_width
            .saturating_sub(PANEL_HORIZONTAL_INSET)
            .max(1)
    }

    fn composer_height(&self) -> u16 {
        let prompt_width = unicode_width::UnicodeWidthStr::width(PROMPT_PREFIX) as u16;
        let max_rows = self.viewport_height.saturating_sub(8).max(1);
        self.input_height(self.transcript_width(), prompt_width)
            .min(max_rows)
            .saturating_add(PANEL_VERTICAL_INSET)
    }

    fn transcript_height(&self) -> u16 {
        self.viewport_height
            .saturating_sub(self.composer_height())
            .saturating_sub(STATUS_HEIGHT)
            .saturating_sub(PANEL_VERTICAL_INSET)
    }

    /// Returns true if the cache was rebuilt.
    fn ensure_render_cache(&mut self) -> bool {
        let need_rebuild = self.render_cache.generation != self.render_generation
            || self.render_cache.width != self.viewport_width
            || self.render_cache.height != self.viewport_height;
        if !need_rebuild {
            return false;
        }

        let width = self.transcript_width();
        let lines = self.render_transcript_lines();
        let paragraph = Paragraph::new(Text::from(lines.clone())).wrap(Wrap { trim: false });
        let rendered = paragraph.line_count(width).min(u16::MAX as usize) as u16;
        let scroll_max = rendered.saturating_sub(self.transcript_height());

        self.render_cache = RenderCache {
            generation: self.render_generation,
            width: self.viewport_width,
            height: self.viewport_height,
            lines,
            scroll_max,
        };
        true
    }

    fn scroll_max(&mut self) -> u16 {
        self.ensure_render_cache();
        self.render_cache.scroll_max
    }

    fn cached_transcript_lines(&self) -> &[Line<'static>] {
        &self.render_cache.lines
    }

    fn update_viewport(&mut self, width: u16, height: u16) {
        self.viewport_width = width.max(1);
        self.viewport_height = height.max(1);
        let max_scroll = self.scroll_max();
        if self.autoscroll {
            self.scroll = max_scroll;
        } else {
            self.scroll = self.scroll.min(max_scroll);
        }
    }

    fn scroll_up(&mut self, n: u16) {
        let from = if self.autoscroll {
            self.scroll_max()
        } else {
            self.scroll
        };
        self.autoscroll = false;
        self.scroll = from.saturating_sub(n);
    }

    fn scroll_down(&mut self, n: u16) {
        let max_scroll = self.scroll_max();
        self.scroll = self.scroll.saturating_add(n).min(max_scroll);
        if self.scroll >= max_scroll {
            self.autoscroll = true;
        }
    }

    fn input_height(&self, width: u16, prompt_width: u16) -> u16 {
        if self.input.is_empty() {
            return 1;
        }
        let (_, end_y) = input_cursor_position(&self.input, self.input.len(), width, prompt_width);
        end_y.saturating_add(1).max(1)
    }

    fn running_elapsed_secs(&self, now: Instant) -> u64 {
        self.controller
            .session()
            .map(|s| now.saturating_duration_since(s.started_at()).as_secs())
            .unwrap_or(0)
    }
}
