//! Newline-delimited JSON streaming over HTTP.
//!
//! `POST <endpoint>` with `{"prompt", "max_tokens"}`; the body comes back one
//! JSON object per line: `{"token": ..}`, `{"error": ..}` or `{"done": true}`.

use std::io::{BufRead, BufReader, Read};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{is_timeout, FragmentStream, GenerateRequest, GenerationService, ServiceError};
use crate::truncate;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const STATUS_BODY_PREVIEW_CHARS: usize = 160;

#[derive(Serialize)]
struct GenerateBody<'a> {
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
struct TokenChunk {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Chunk {
    Token(String),
    Error(String),
    Done,
}

pub(crate) fn parse_chunk_line(line: &str) -> Result<Chunk, ServiceError> {
    let chunk: TokenChunk = serde_json::from_str(line)?;
    if let Some(err) = chunk.error.filter(|e| !e.trim().is_empty()) {
        return Ok(Chunk::Error(err));
    }
    if let Some(token) = chunk.token {
        return Ok(Chunk::Token(token));
    }
    if chunk.done {
        return Ok(Chunk::Done);
    }
    Err(ServiceError::Protocol(format!(
        "expected token, error or done: {}",
        truncate(line, 80)
    )))
}

impl From<ureq::Error> for ServiceError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => {
                let body = response.into_string().unwrap_or_default();
                let body = body.trim();
                let message = if body.is_empty() {
                    "request rejected".to_string()
                } else {
                    truncate(body, STATUS_BODY_PREVIEW_CHARS)
                };
                ServiceError::Status { status, message }
            }
            ureq::Error::Transport(transport) => ServiceError::Connect(transport.to_string()),
        }
    }
}

/// Like the `From` conversion, but a request that ran out of time reports
/// the generation ceiling rather than a transport failure.
fn open_error(err: ureq::Error, ceiling: Duration) -> ServiceError {
    if let ureq::Error::Transport(transport) = &err {
        let timed_out = transport.kind() == ureq::ErrorKind::Io
            && std::error::Error::source(transport)
                .and_then(|source| source.downcast_ref::<std::io::Error>())
                .is_some_and(is_timeout);
        if timed_out {
            return ServiceError::Timeout(ceiling.as_secs());
        }
    }
    err.into()
}

pub(crate) struct HttpService {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpService {
    pub(crate) fn new(endpoint: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .build();
        Self {
            agent,
            endpoint: endpoint.into(),
        }
    }
}

impl GenerationService for HttpService {
    fn open(&self, request: &GenerateRequest) -> Result<Box<dyn FragmentStream>, ServiceError> {
        let body = serde_json::to_string(&GenerateBody {
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
        })?;
        debug!(
            endpoint = %self.endpoint,
            max_tokens = request.max_tokens,
            timeout_secs = request.timeout.as_secs(),
            "opening generation stream"
        );
        // Request timeout covers reading the body too, so it bounds the whole stream.
        let response = self
            .agent
            .post(&self.endpoint)
            .timeout(request.timeout)
            .set("Content-Type", "application/json")
            .set("Accept", "application/x-ndjson")
            .send_string(&body)
            .map_err(|err| open_error(err, request.timeout))?;
        debug!(status = response.status(), "generation stream established");
        Ok(Box::new(NdjsonStream::new(
            response.into_reader(),
            request.timeout,
        )))
    }
}

pub(crate) struct NdjsonStream<R> {
    reader: BufReader<R>,
    line: String,
    finished: bool,
    ceiling: Duration,
}

impl<R: Read> NdjsonStream<R> {
    pub(crate) fn new(reader: R, ceiling: Duration) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: String::new(),
            finished: false,
            ceiling,
        }
    }
}

impl<R: Read + Send> FragmentStream for NdjsonStream<R> {
    fn next_fragment(&mut self) -> Result<Option<String>, ServiceError> {
        if self.finished {
            return Ok(None);
        }
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .map_err(|err| ServiceError::from_io(err, self.ceiling))?;
            if read == 0 {
                self.finished = true;
                return Ok(None);
            }
            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            return match parse_chunk_line(line)? {
                Chunk::Token(token) => Ok(Some(token)),
                Chunk::Error(msg) => {
                    self.finished = true;
                    Err(ServiceError::Remote(msg))
                }
                Chunk::Done => {
                    self.finished = true;
                    Ok(None)
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(body: &str) -> (Vec<String>, Option<String>) {
        let mut stream = NdjsonStream::new(body.as_bytes(), Duration::from_secs(60));
        let mut fragments = Vec::new();
        loop {
            match stream.next_fragment() {
                Ok(Some(fragment)) => fragments.push(fragment),
                Ok(None) => return (fragments, None),
                Err(err) => return (fragments, Some(err.to_string())),
            }
        }
    }

    #[test]
    fn parse_chunk_line_reads_each_kind() {
        assert_eq!(
            parse_chunk_line(r#"{"token":"Hi"}"#).expect("token"),
            Chunk::Token("Hi".to_string())
        );
        assert_eq!(
            parse_chunk_line(r#"{"error":"model not loaded"}"#).expect("error"),
            Chunk::Error("model not loaded".to_string())
        );
        assert_eq!(parse_chunk_line(r#"{"done":true}"#).expect("done"), Chunk::Done);
    }

    #[test]
    fn parse_chunk_line_rejects_garbage() {
        assert!(matches!(
            parse_chunk_line("not json"),
            Err(ServiceError::Protocol(_))
        ));
        assert!(matches!(
            parse_chunk_line(r#"{"unrelated":1}"#),
            Err(ServiceError::Protocol(_))
        ));
    }

    #[test]
    fn stream_yields_tokens_in_order_and_skips_blank_lines() {
        let body = "{\"token\":\"Hi\"}\n\n{\"token\":\" there\"}\n";
        let (fragments, err) = collect(body);
        assert_eq!(fragments, vec!["Hi".to_string(), " there".to_string()]);
        assert_eq!(err, None);
    }

    #[test]
    fn done_marker_ends_stream_before_eof() {
        let body = "{\"token\":\"a\"}\n{\"done\":true}\n{\"token\":\"ignored\"}\n";
        let (fragments, err) = collect(body);
        assert_eq!(fragments, vec!["a".to_string()]);
        assert_eq!(err, None);
    }

    #[test]
    fn remote_error_after_partial_output() {
        let body = "{\"token\":\"par\"}\n{\"error\":\"connection reset\"}\n";
        let (fragments, err) = collect(body);
        assert_eq!(fragments, vec!["par".to_string()]);
        assert_eq!(err.as_deref(), Some("connection reset"));
    }

    #[test]
    fn empty_token_is_still_a_fragment() {
        let (fragments, _) = collect("{\"token\":\"\"}\n");
        assert_eq!(fragments, vec![String::new()]);
    }

    /// Yields one line, then fails the way a socket read deadline does.
    struct StallingReader {
        served: bool,
    }

    impl Read for StallingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.served {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "read timed out",
                ));
            }
            self.served = true;
            let line = b"{\"token\":\"slow\"}\n";
            buf[..line.len()].copy_from_slice(line);
            Ok(line.len())
        }
    }

    #[test]
    fn read_deadline_surfaces_as_generation_timeout() {
        let mut stream = NdjsonStream::new(
            StallingReader { served: false },
            Duration::from_secs(60),
        );
        assert_eq!(
            stream.next_fragment().expect("first line").as_deref(),
            Some("slow")
        );
        let err = stream.next_fragment().expect_err("stalled read");
        assert!(matches!(err, ServiceError::Timeout(60)));
        assert_eq!(err.to_string(), "generation timed out after 60s");
    }
}
