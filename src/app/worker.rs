use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use super::stream::Task;
use super::types::{AppEvent, SessionId, StreamEvent};
use crate::service::{CancelFlag, GenerationService, ServiceError};

/// Run a stream task on its own thread and post the result back into the
/// dispatch loop. A cancelled session's result is dropped here, releasing
/// the handle without touching the loop.
pub(crate) fn spawn_task(task: Task, service: &Arc<dyn GenerationService>, tx: &Sender<AppEvent>) {
    let session = task.session();
    let pulling = matches!(task, Task::Pull { .. });
    let cancel = task.cancel_flag();
    let worker_tx = tx.clone();
    let service = Arc::clone(service);
    let spawned = std::thread::Builder::new()
        .name(format!("stream-{}", session.0))
        .spawn(move || {
            let (event, cancel) = run_task(task, service.as_ref());
            post(event, &cancel, &worker_tx);
        });
    if let Err(err) = spawned {
        report_spawn_failure(session, pulling, &err, &cancel, tx);
    }
}

/// The task died with the closure, so the session is told directly instead
/// of waiting out its deadline.
fn report_spawn_failure(
    session: SessionId,
    pulling: bool,
    err: &std::io::Error,
    cancel: &CancelFlag,
    tx: &Sender<AppEvent>,
) {
    warn!(%session, error = %err, "failed to spawn stream worker");
    let error = ServiceError::Worker(err.to_string());
    let event = if pulling {
        StreamEvent::Failed { session, error }
    } else {
        StreamEvent::OpenFailed { session, error }
    };
    post(event, cancel, tx);
}

pub(crate) fn run_task(task: Task, service: &dyn GenerationService) -> (StreamEvent, CancelFlag) {
    match task {
        Task::Open {
            session,
            request,
            cancel,
        } => {
            let event = match service.open(&request) {
                Ok(stream) => StreamEvent::Opened { session, stream },
                Err(error) => StreamEvent::OpenFailed { session, error },
            };
            (event, cancel)
        }
        Task::Pull {
            session,
            mut stream,
            cancel,
        } => {
            let event = match stream.next_fragment() {
                Ok(Some(text)) => StreamEvent::Fragment {
                    session,
                    text,
                    stream,
                },
                Ok(None) => StreamEvent::Ended { session },
                Err(error) => StreamEvent::Failed { session, error },
            };
            (event, cancel)
        }
    }
}

fn post(event: StreamEvent, cancel: &CancelFlag, tx: &Sender<AppEvent>) {
    let session: SessionId = event.session();
    if cancel.is_cancelled() {
        debug!(%session, kind = event.name(), "session cancelled; discarding result");
        return;
    }
    if tx.send(AppEvent::Stream(event)).is_err() {
        debug!(%session, "dispatch loop gone; discarding result");
    }
}
