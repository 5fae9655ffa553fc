const TAB_WIDTH: usize = 4;

/// Strip terminal escape sequences and control characters from generated
/// text before it reaches the screen. Tabs become spaces, lone carriage
/// returns become line breaks.
pub(super) fn sanitize_runtime_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\u{1b}' => match chars.next() {
                // CSI: parameters until a final byte in '@'..='~'.
                Some('[') => {
                    for c in chars.by_ref() {
                        if ('@'..='~').contains(&c) {
                            break;
                        }
                    }
                }
                // OSC: terminated by BEL or ESC '\'.
                Some(']') => {
                    while let Some(c) = chars.next() {
                        if c == '\u{7}' {
                            break;
                        }
                        if c == '\u{1b}' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    out.push('\n');
                }
            }
            '\t' => out.push_str(&" ".repeat(TAB_WIDTH)),
            '\n' => out.push('\n'),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_codes() {
        assert_eq!(sanitize_runtime_text("\u{1b}[31mred\u{1b}[0m"), "red");
    }

    #[test]
    fn strips_osc_titles() {
        assert_eq!(
            sanitize_runtime_text("a\u{1b}]0;title\u{7}b\u{1b}]2;x\u{1b}\\c"),
            "abc"
        );
    }

    #[test]
    fn normalizes_line_breaks_and_tabs() {
        assert_eq!(sanitize_runtime_text("a\r\nb\rc\td"), "a\nb\nc    d");
        assert_eq!(sanitize_runtime_text("bell\u{7}"), "bell");
    }

    #[test]
    fn keeps_unicode_text() {
        assert_eq!(sanitize_runtime_text("你好, world"), "你好, world");
    }
}
