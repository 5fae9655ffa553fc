#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Role {
    User,
    Bot,
    Error,
}

impl Role {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Role::User => "You: ",
            Role::Bot => "Bot: ",
            Role::Error => "Error: ",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ConversationEntry {
    pub(crate) role: Role,
    pub(crate) text: String,
}

impl ConversationEntry {
    pub(crate) fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("replace_last requires a trailing bot entry, found {found}")]
pub(crate) struct InvariantViolation {
    found: &'static str,
}

/// Separator between entries in the rendered transcript.
const ENTRY_GAP: &str = "\n\n";

/// Append-only conversation record. Only the trailing bot entry may change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ConversationLog {
    entries: Vec<ConversationEntry>,
}

impl ConversationLog {
    pub(crate) fn append(&mut self, entry: ConversationEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn replace_last(&mut self, text: impl Into<String>) -> Result<(), InvariantViolation> {
        match self.entries.last_mut() {
            Some(entry) if entry.role == Role::Bot => {
                entry.text = text.into();
                Ok(())
            }
            Some(entry) => Err(InvariantViolation {
                found: match entry.role {
                    Role::User => "a user entry",
                    Role::Error => "an error entry",
                    Role::Bot => "a bot entry",
                },
            }),
            None => Err(InvariantViolation {
                found: "an empty log",
            }),
        }
    }

    pub(crate) fn render_snapshot(&self) -> String {
        self.entries
            .iter()
            .map(|entry| format!("{}{}", entry.role.label(), entry.text))
            .collect::<Vec<_>>()
            .join(ENTRY_GAP)
    }

    pub(crate) fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_last_rewrites_trailing_bot_entry() {
        let mut log = ConversationLog::default();
        log.append(ConversationEntry::new(Role::User, "hello"));
        log.append(ConversationEntry::new(Role::Bot, "Hi"));

        log.replace_last("Hi there").expect("bot tail");

        assert_eq!(
            log.entries(),
            &[
                ConversationEntry::new(Role::User, "hello"),
                ConversationEntry::new(Role::Bot, "Hi there"),
            ]
        );
    }

    #[test]
    fn replace_last_refuses_non_bot_tail() {
        let mut log = ConversationLog::default();
        assert!(log.replace_last("x").is_err());

        log.append(ConversationEntry::new(Role::User, "hello"));
        let err = log.replace_last("x").expect_err("user tail");
        assert!(err.to_string().contains("user entry"));
        assert_eq!(log.entries()[0].text, "hello");

        log.append(ConversationEntry::new(Role::Error, "boom"));
        assert!(log.replace_last("x").is_err());
    }

    #[test]
    fn snapshot_joins_labelled_entries_with_blank_line() {
        let mut log = ConversationLog::default();
        assert_eq!(log.render_snapshot(), "");

        log.append(ConversationEntry::new(Role::User, "hi"));
        log.append(ConversationEntry::new(Role::Bot, "par"));
        log.append(ConversationEntry::new(Role::Error, "connection reset"));

        assert_eq!(
            log.render_snapshot(),
            "You: hi\n\nBot: par\n\nError: connection reset"
        );
        assert_eq!(log.len(), 3);
    }
}
