use super::log::Role;
use super::*;
use ratatui::style::Style;
use ratatui::text::Span;

fn role_styles(role: Role, palette: ThemePalette) -> (Style, Style) {
    match role {
        Role::User => (palette.label_style(palette.user_label), palette.body_style()),
        Role::Bot => (palette.label_style(palette.bot_label), palette.body_style()),
        Role::Error => (palette.label_style(palette.error_label), palette.error_style()),
    }
}

impl App {
    /// Lines follow the snapshot layout, but roles come from the log entries
    /// so reply text that looks like a label stays body text.
    pub(super) fn render_transcript_lines(&self) -> Vec<Line<'static>> {
        let palette = self.theme_palette();
        if self.transcript.is_empty() {
            return WELCOME_TEXT
                .lines()
                .map(|line| Line::from(Span::styled(line.to_string(), palette.muted_style())))
                .collect();
        }

        let mut lines = Vec::new();
        for (idx, entry) in self.controller.log().entries().iter().enumerate() {
            if idx > 0 {
                lines.push(Line::default());
            }
            let (label_style, body_style) = role_styles(entry.role, palette);
            let text = sanitize_runtime_text(&entry.text);
            let mut rows = text.split('\n');
            let first = rows.next().unwrap_or_default();
            lines.push(Line::from(vec![
                Span::styled(entry.role.label().to_string(), label_style),
                Span::styled(first.to_string(), body_style),
            ]));
            lines.extend(rows.map(|row| Line::from(Span::styled(row.to_string(), body_style))));
        }
        lines
    }
}
