use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub(crate) mod http;

pub(crate) use http::HttpService;

/// One generation request as sent to the remote service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct GenerateRequest {
    pub(crate) prompt: String,
    pub(crate) max_tokens: u32,
    /// Ceiling for establishment plus the whole stream.
    pub(crate) timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ServiceError {
    /// Remote could not be reached (connection refused, DNS, TLS, ...).
    #[error("{0}")]
    Connect(String),

    #[error("server returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Error reported by the remote in the middle of a stream.
    #[error("{0}")]
    Remote(String),

    #[error("generation timed out after {0}s")]
    Timeout(u64),

    #[error("stream read failed: {0}")]
    Io(String),

    #[error("malformed stream chunk: {0}")]
    Protocol(String),

    #[error("could not start stream worker: {0}")]
    Worker(String),
}

impl ServiceError {
    /// Read errors become `Timeout` when the socket deadline fired.
    pub(crate) fn from_io(err: std::io::Error, ceiling: Duration) -> Self {
        if is_timeout(&err) {
            return ServiceError::Timeout(ceiling.as_secs());
        }
        ServiceError::Io(err.to_string())
    }
}

pub(crate) fn is_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Protocol(err.to_string())
    }
}

/// Entry point into the remote generation service. `open` blocks until the
/// stream is established, so callers run it off the UI thread.
pub(crate) trait GenerationService: Send + Sync {
    fn open(&self, request: &GenerateRequest) -> Result<Box<dyn FragmentStream>, ServiceError>;
}

/// Receive side of an established generation stream.
pub(crate) trait FragmentStream: Send {
    /// Blocks until the next fragment arrives. `Ok(None)` is normal end of stream.
    fn next_fragment(&mut self) -> Result<Option<String>, ServiceError>;
}

/// Shared cancellation marker between a stream session and the worker
/// currently holding its handle.
#[derive(Clone, Debug, Default)]
pub(crate) struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
