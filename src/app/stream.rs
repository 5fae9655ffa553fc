use std::time::{Duration, Instant};

use tracing::debug;

use super::types::SessionId;
use crate::service::{CancelFlag, FragmentStream, GenerateRequest};

/// Work the dispatch loop runs off-thread; results come back as stream events.
pub(crate) enum Task {
    Open {
        session: SessionId,
        request: GenerateRequest,
        cancel: CancelFlag,
    },
    Pull {
        session: SessionId,
        stream: Box<dyn FragmentStream>,
        cancel: CancelFlag,
    },
}

impl Task {
    pub(crate) fn session(&self) -> SessionId {
        match self {
            Task::Open { session, .. } | Task::Pull { session, .. } => *session,
        }
    }

    pub(crate) fn cancel_flag(&self) -> CancelFlag {
        match self {
            Task::Open { cancel, .. } | Task::Pull { cancel, .. } => cancel.clone(),
        }
    }
}

/// One request/response cycle. The receive handle is held here between
/// pulls and travels with the pull task while one is outstanding, so a
/// session can never have two pulls in flight. Dropping the session raises
/// its cancel flag, which tells any worker still holding the handle to
/// discard it.
pub(crate) struct StreamSession {
    id: SessionId,
    prompt: String,
    stream: Option<Box<dyn FragmentStream>>,
    accumulated: String,
    fragments: usize,
    started_at: Instant,
    deadline: Instant,
    cancel: CancelFlag,
}

impl StreamSession {
    pub(crate) fn new(id: SessionId, prompt: String, now: Instant, timeout: Duration) -> Self {
        Self {
            id,
            prompt,
            stream: None,
            accumulated: String::new(),
            fragments: 0,
            started_at: now,
            deadline: now + timeout,
            cancel: CancelFlag::new(),
        }
    }

    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) fn prompt(&self) -> &str {
        &self.prompt
    }

    pub(crate) fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub(crate) fn fragments(&self) -> usize {
        self.fragments
    }

    pub(crate) fn started_at(&self) -> Instant {
        self.started_at
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    pub(crate) fn open_task(&self, max_tokens: u32, now: Instant) -> Task {
        Task::Open {
            session: self.id,
            request: GenerateRequest {
                prompt: self.prompt.clone(),
                max_tokens,
                timeout: self.deadline.saturating_duration_since(now),
            },
            cancel: self.cancel.clone(),
        }
    }

    /// Hand the receive handle back after an open or a pull resolved.
    pub(crate) fn store(&mut self, stream: Box<dyn FragmentStream>) {
        self.stream = Some(stream);
    }

    /// Move the handle into a pull task. `None` while a pull is already out.
    pub(crate) fn pull_task(&mut self) -> Option<Task> {
        let stream = self.stream.take()?;
        Some(Task::Pull {
            session: self.id,
            stream,
            cancel: self.cancel.clone(),
        })
    }

    /// Record a fragment; returns true when it is the first of the cycle.
    pub(crate) fn absorb(&mut self, text: &str) -> bool {
        let first = self.accumulated.is_empty();
        self.accumulated.push_str(text);
        self.fragments += 1;
        first
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        debug!(
            session = %self.id,
            fragments = self.fragments,
            chars = self.accumulated.chars().count(),
            held_handle = self.stream.is_some(),
            "stream session released"
        );
    }
}
