//! Failure payloads and the places they are routed to.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};


/// Status reported when the request never produced an HTTP response.
pub const TRANSPORT_STATUS: u16 = 0;

const SUMMARY_MAX_LEN: usize = 200;

/// A request that did not succeed: raw response body plus HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// HTTP status code, or [`TRANSPORT_STATUS`] when no response arrived.
    pub status: u16,
    /// Raw response body text (or the transport error message).
    pub body: String,
}

impl Failure {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a failure for a request that never got a response.
    pub fn transport(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("Request timed out: {err}")
        } else if err.is_connect() {
            format!("Connection failed: {err}")
        } else {
            format!("Network error: {err}")
        };
        Self::new(TRANSPORT_STATUS, message)
    }

    pub fn is_transport(&self) -> bool {
        self.status == TRANSPORT_STATUS
    }

    /// First non-empty line of the body, truncated.
    ///
    /// The service answers errors with plain text (or an HTML page), so the
    /// first line is the message.
    pub fn summary(&self) -> String {
        self.body
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map_or_else(|| "no response body".to_string(), truncate)
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= SUMMARY_MAX_LEN {
        return text.to_string();
    }
    let mut out: String = text.chars().take(SUMMARY_MAX_LEN).collect();
    out.push_str("...");
    out
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_transport() {
            write!(f, "{}", self.body)
        } else {
            write!(f, "HTTP {}: {}", self.status, self.summary())
        }
    }
}

impl std::error::Error for Failure {}

/// Callback invoked with (message, status) when a request fails.
pub type FailureHandler = Arc<dyn Fn(&str, u16) + Send + Sync>;

/// Wraps a closure as a [`FailureHandler`].
pub fn failure_handler<F>(f: F) -> FailureHandler
where
    F: Fn(&str, u16) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Surface replaced wholesale with the server's error body when a failure
/// reaches no handler.
pub trait Document: Send + Sync {
    fn replace_body(&self, body: &str);
}

/// Writes the error body to stdout, as a terminal stands in for the page.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleDocument;

impl Document for ConsoleDocument {
    fn replace_body(&self, body: &str) {
        let mut stdout = std::io::stdout().lock();
        // Nothing left to report to if stdout is gone.
        let _ = writeln!(stdout, "{body}");
        let _ = stdout.flush();
    }
}

/// In-memory document; keeps the last body it was replaced with.
#[derive(Debug, Default, Clone)]
pub struct BufferDocument {
    body: Arc<Mutex<Option<String>>>,
}

impl BufferDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current contents, `None` if never replaced.
    pub fn contents(&self) -> Option<String> {
        self.body
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Document for BufferDocument {
    fn replace_body(&self, body: &str) {
        *self.body.lock().unwrap_or_else(PoisonError::into_inner) = Some(body.to_string());
    }
}
