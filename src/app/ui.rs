use std::time::Instant;

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::Style;
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Padding, Paragraph, Wrap};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use super::log::Role;
use super::{
    App, Phase, ThemePalette, PANEL_HORIZONTAL_INSET, PROMPT_PREFIX, REJECTED_STATUS,
    STATUS_HEIGHT,
};
use crate::{input_cursor_position, truncate};

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub(super) fn draw(f: &mut Frame, app: &App) {
    let frame_area = f.area();
    let theme = app.theme_palette();
    let prompt_width = UnicodeWidthStr::width(PROMPT_PREFIX) as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(app.composer_height()),
            Constraint::Length(STATUS_HEIGHT),
        ])
        .split(frame_area);
    let (transcript_chunk, input_chunk, status_chunk) = (chunks[0], chunks[1], chunks[2]);

    let transcript = Paragraph::new(Text::from(app.cached_transcript_lines().to_vec()))
        .style(theme.panel_surface_style())
        .block(panel_block(theme, "chat"))
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));
    f.render_widget(transcript, transcript_chunk);

    let input = Paragraph::new(Text::from(build_input_lines(app, theme)))
        .style(theme.input_surface_style())
        .block(panel_block(theme, "message"))
        .wrap(Wrap { trim: false });
    f.render_widget(input, input_chunk);

    if app.controller.phase() != Phase::Finishing {
        let content_width = input_chunk
            .width
            .saturating_sub(PANEL_HORIZONTAL_INSET)
            .max(1);
        let content_height = input_chunk.height.saturating_sub(2).max(1);
        let (cx, cy) = input_cursor_position(&app.input, app.cursor, content_width, prompt_width);
        let cursor_x = input_chunk.x + 2 + cx.min(content_width.saturating_sub(1));
        let cursor_y = input_chunk.y + 1 + cy.min(content_height.saturating_sub(1));
        f.set_cursor_position((cursor_x, cursor_y));
    }

    let status = Paragraph::new(build_status_line(app, theme, Instant::now()))
        .style(theme.status_style());
    f.render_widget(status, status_chunk);
}

pub(super) fn draw_exit(f: &mut Frame) {
    f.render_widget(Clear, f.area());
}

fn panel_block(theme: ThemePalette, title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme.panel_border_style())
        .title(Span::styled(format!(" {} ", title), theme.title_style()))
        .padding(Padding::horizontal(1))
        .style(theme.panel_surface_style())
}

fn build_input_lines(app: &App, theme: ThemePalette) -> Vec<Line<'static>> {
    let prompt_style = theme.prompt_style();
    if app.input.is_empty() {
        let placeholder = if app.is_generating() {
            "Waiting for the reply..."
        } else {
            "Send a message..."
        };
        return vec![Line::from(vec![
            Span::styled(PROMPT_PREFIX.to_string(), prompt_style),
            Span::styled(placeholder, theme.muted_style()),
        ])];
    }
    vec![Line::from(vec![
        Span::styled(PROMPT_PREFIX.to_string(), prompt_style),
        Span::styled(app.input.clone(), Style::default().fg(theme.input_text)),
    ])]
}

fn build_status_line(app: &App, theme: ThemePalette, now: Instant) -> Line<'static> {
    let phase = app.controller.phase();
    let mut spans = Vec::new();
    if app.is_generating() {
        let frame = SPINNER[app.spinner_idx % SPINNER.len()];
        let elapsed = app.running_elapsed_secs(now);
        let mut activity = format!(
            " {frame} {} {:02}:{:02}",
            phase.as_str(),
            elapsed / 60,
            elapsed % 60
        );
        if let Some(session) = app.controller.session() {
            if session.fragments() > 0 {
                activity.push_str(&format!(
                    " · {} fragments, {} chars",
                    session.fragments(),
                    session.accumulated().chars().count()
                ));
            }
        }
        spans.push(Span::styled(activity, theme.prompt_style()));
        if app.last_status == REJECTED_STATUS {
            spans.push(Span::styled(format!(" · {REJECTED_STATUS}"), theme.error_style()));
        }
    } else {
        spans.push(Span::styled(
            format!(" {}", truncate(&app.last_status, 60)),
            theme.status_style(),
        ));
    }
    let turns = app
        .controller
        .log()
        .entries()
        .iter()
        .filter(|entry| entry.role == Role::User)
        .count();
    spans.push(Span::styled(
        format!(
            " | {} | {} turns | Enter send | PgUp/PgDn scroll | Esc quit",
            truncate(&app.endpoint, 40),
            turns
        ),
        theme.muted_style(),
    ));
    Line::from(spans)
}
