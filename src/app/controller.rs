use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::log::{ConversationEntry, ConversationLog, Role};
use super::stream::{StreamSession, Task};
use super::types::{SessionId, StreamEvent};
use crate::service::{FragmentStream, ServiceError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    AwaitingStreamOpen,
    Streaming,
    /// Quit requested; every later event is ignored.
    Finishing,
}

impl Phase {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "ready",
            Phase::AwaitingStreamOpen => "connecting",
            Phase::Streaming => "streaming",
            Phase::Finishing => "closing",
        }
    }
}

#[derive(Debug)]
pub(crate) enum ControlEvent {
    Submit(String),
    Quit,
    /// Periodic clock event; enforces the generation ceiling.
    Tick,
    Stream(StreamEvent),
}

/// Outcome notes for the status line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Notice {
    Submitted,
    Rejected,
    Completed,
    Failed(String),
}

pub(crate) enum Command {
    Spawn(Task),
    /// Full transcript, pushed after every log mutation.
    Render(String),
    Notice(Notice),
    Exit,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ControllerConfig {
    pub(crate) max_tokens: u32,
    pub(crate) timeout: Duration,
}

pub(crate) struct Controller {
    config: ControllerConfig,
    phase: Phase,
    log: ConversationLog,
    session: Option<StreamSession>,
    next_session: u64,
}

impl Controller {
    pub(crate) fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            log: ConversationLog::default(),
            session: None,
            next_session: 1,
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub(crate) fn session(&self) -> Option<&StreamSession> {
        self.session.as_ref()
    }

    fn is_current(&self, id: SessionId) -> bool {
        self.session.as_ref().is_some_and(|s| s.id() == id)
    }

    /// Every transition lives in this table.
    pub(crate) fn handle(&mut self, event: ControlEvent, now: Instant) -> Vec<Command> {
        if let ControlEvent::Stream(stream_event) = &event {
            if !self.is_current(stream_event.session()) {
                debug!(
                    session = %stream_event.session(),
                    kind = stream_event.name(),
                    "dropping result from stale session"
                );
                return Vec::new();
            }
        }

        match (self.phase, event) {
            (Phase::Finishing, _) => Vec::new(),
            (_, ControlEvent::Quit) => self.quit(),

            (Phase::Idle, ControlEvent::Submit(text)) => self.submit(text, now),
            (_, ControlEvent::Submit(text)) => self.reject(&text),

            (Phase::AwaitingStreamOpen, ControlEvent::Stream(StreamEvent::Opened { stream, .. })) => {
                self.on_opened(stream)
            }
            (
                Phase::AwaitingStreamOpen,
                ControlEvent::Stream(StreamEvent::OpenFailed { error, .. }),
            ) => self.fail(error),

            (Phase::Streaming, ControlEvent::Stream(StreamEvent::Fragment { text, stream, .. })) => {
                self.on_fragment(text, stream)
            }
            (Phase::Streaming, ControlEvent::Stream(StreamEvent::Ended { .. })) => self.finish(),
            (Phase::Streaming, ControlEvent::Stream(StreamEvent::Failed { error, .. })) => {
                self.fail(error)
            }

            (Phase::AwaitingStreamOpen | Phase::Streaming, ControlEvent::Tick) => {
                self.enforce_deadline(now)
            }
            (Phase::Idle, ControlEvent::Tick) => Vec::new(),

            (phase, ControlEvent::Stream(event)) => {
                warn!(?phase, ?event, "stream event does not apply in this phase");
                Vec::new()
            }
        }
    }

    fn submit(&mut self, text: String, now: Instant) -> Vec<Command> {
        if text.is_empty() {
            return Vec::new();
        }

        let id = SessionId(self.next_session);
        self.next_session += 1;
        self.log.append(ConversationEntry::new(Role::User, text.clone()));
        let session = StreamSession::new(id, text, now, self.config.timeout);
        let task = session.open_task(self.config.max_tokens, now);
        info!(
            session = %id,
            prompt_chars = session.prompt().chars().count(),
            "generation requested"
        );
        self.session = Some(session);
        self.phase = Phase::AwaitingStreamOpen;

        vec![
            Command::Render(self.log.render_snapshot()),
            Command::Notice(Notice::Submitted),
            Command::Spawn(task),
        ]
    }

    fn reject(&self, text: &str) -> Vec<Command> {
        if text.is_empty() {
            return Vec::new();
        }
        debug!(phase = ?self.phase, "submission rejected while a generation is in flight");
        vec![Command::Notice(Notice::Rejected)]
    }

    fn on_opened(&mut self, stream: Box<dyn FragmentStream>) -> Vec<Command> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        debug!(session = %session.id(), "stream opened");
        session.store(stream);
        self.phase = Phase::Streaming;
        session.pull_task().map(Command::Spawn).into_iter().collect()
    }

    fn on_fragment(&mut self, text: String, stream: Box<dyn FragmentStream>) -> Vec<Command> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        session.store(stream);

        let mut commands = Vec::new();
        // Empty fragments carry nothing to show; they would otherwise open a blank bot entry.
        if !text.is_empty() {
            if session.absorb(&text) {
                self.log.append(ConversationEntry::new(Role::Bot, text));
            } else if let Err(err) = self.log.replace_last(session.accumulated()) {
                unreachable!("streaming bot entry lost: {err}");
            }
            commands.push(Command::Render(self.log.render_snapshot()));
        }
        if let Some(task) = session.pull_task() {
            commands.push(Command::Spawn(task));
        }
        commands
    }

    fn finish(&mut self) -> Vec<Command> {
        if let Some(session) = self.session.take() {
            info!(
                session = %session.id(),
                fragments = session.fragments(),
                elapsed_ms = session.started_at().elapsed().as_millis() as u64,
                "generation completed"
            );
        }
        self.phase = Phase::Idle;
        vec![Command::Notice(Notice::Completed)]
    }

    fn fail(&mut self, error: ServiceError) -> Vec<Command> {
        let description = error.to_string();
        if let Some(session) = self.session.take() {
            warn!(
                session = %session.id(),
                fragments = session.fragments(),
                error = %description,
                "generation failed"
            );
        }
        self.phase = Phase::Idle;
        self.log
            .append(ConversationEntry::new(Role::Error, description.clone()));
        vec![
            Command::Render(self.log.render_snapshot()),
            Command::Notice(Notice::Failed(description)),
        ]
    }

    fn enforce_deadline(&mut self, now: Instant) -> Vec<Command> {
        let expired = self.session.as_ref().is_some_and(|s| s.is_expired(now));
        if !expired {
            return Vec::new();
        }
        self.fail(ServiceError::Timeout(self.config.timeout.as_secs()))
    }

    fn quit(&mut self) -> Vec<Command> {
        if let Some(session) = self.session.take() {
            info!(session = %session.id(), "quit with generation in flight; discarding stream");
        }
        self.phase = Phase::Finishing;
        vec![Command::Exit]
    }
}
