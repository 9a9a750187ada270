//! Token-gated request dispatcher.
//!
//! Every request except the bootstrap fetch carries the CSRF protection
//! token in the `X-CSRFToken` header. The token is fetched lazily on first
//! use and shared by all clones of a [`RequestDispatcher`]. Parameters are
//! serialized to JSON and responses are decoded as JSON.
//!
//! On failure the error body and status go to the per-call handler if one
//! was given, else to the dispatcher-wide handler, else the [`Document`] is
//! replaced with the raw body.

mod failure;
mod token;

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

pub use failure::{
    BufferDocument, ConsoleDocument, Document, Failure, FailureHandler, TRANSPORT_STATUS,
    failure_handler,
};
use token::TokenSlot;

/// Header carrying the CSRF protection token.
pub const CSRF_HEADER: &str = "X-CSRFToken";
/// Endpoint that issues the CSRF protection token.
pub const DEFAULT_CSRF_PATH: &str = "/auth/api/csrftoken/";
/// Content type of JSON request bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// HTTP methods the access-control API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct CsrfTokenResponse {
    #[serde(rename = "csrfToken")]
    csrf_token: String,
}

/// Builder for [`RequestDispatcher`].
pub struct DispatcherBuilder {
    base_url: Url,
    csrf_path: String,
    timeout: Option<Duration>,
    document: Arc<dyn Document>,
    error_handler: Option<FailureHandler>,
}

impl DispatcherBuilder {
    /// Overrides the bootstrap endpoint (resolved against the base URL).
    #[must_use]
    pub fn csrf_path(mut self, path: impl Into<String>) -> Self {
        self.csrf_path = path.into();
        self
    }

    /// Sets a per-request timeout. `None` leaves requests unbounded.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the surface that receives error bodies no handler consumed.
    #[must_use]
    pub fn document(mut self, document: Arc<dyn Document>) -> Self {
        self.document = document;
        self
    }

    /// Installs the dispatcher-wide failure handler up front.
    #[must_use]
    pub fn error_handler(mut self, handler: FailureHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Builds the dispatcher.
    ///
    /// # Errors
    /// Returns an error if the CSRF path cannot be resolved or the HTTP
    /// client cannot be created.
    pub fn build(self) -> Result<RequestDispatcher> {
        let csrf_url = self
            .base_url
            .join(&self.csrf_path)
            .with_context(|| format!("Invalid CSRF token path: {}", self.csrf_path))?;

        let mut http = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        let http = http.build().context("Failed to build HTTP client")?;

        Ok(RequestDispatcher {
            inner: Arc::new(Inner {
                http,
                base_url: self.base_url,
                csrf_url,
                token: TokenSlot::new(),
                default_handler: RwLock::new(self.error_handler),
                document: self.document,
            }),
        })
    }
}

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("whisper/", env!("CARGO_PKG_VERSION"));

struct Inner {
    http: reqwest::Client,
    base_url: Url,
    csrf_url: Url,
    token: TokenSlot,
    default_handler: RwLock<Option<FailureHandler>>,
    document: Arc<dyn Document>,
}

/// Sends requests to the access-control service, making sure each one
/// carries the CSRF protection token.
///
/// Cloning is cheap; clones share the token and the default handler.
#[derive(Clone)]
pub struct RequestDispatcher {
    inner: Arc<Inner>,
}

impl RequestDispatcher {
    /// Starts building a dispatcher whose resources resolve against
    /// `base_url` the way a browser resolves links on a page at that URL.
    pub fn builder(base_url: Url) -> DispatcherBuilder {
        DispatcherBuilder {
            base_url,
            csrf_path: DEFAULT_CSRF_PATH.to_string(),
            timeout: None,
            document: Arc::new(ConsoleDocument),
            error_handler: None,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Returns true once the CSRF token has been fetched.
    pub async fn has_token(&self) -> bool {
        self.inner.token.is_ready().await
    }

    /// Replaces the dispatcher-wide failure handler.
    ///
    /// A handler passed directly to [`send`](Self::send) takes precedence.
    pub fn set_error_handler(&self, handler: FailureHandler) {
        *self
            .inner
            .default_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Removes the dispatcher-wide failure handler.
    pub fn clear_error_handler(&self) {
        *self
            .inner
            .default_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Invokes `method` on `resource`, passing `params` as a JSON body when
    /// present, and hands the decoded response to `on_success`.
    ///
    /// Returns immediately; the request runs on a spawned task. On failure
    /// the error goes through the handler chain (see [`report_failure`]).
    /// The returned handle may be dropped.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    ///
    /// [`report_failure`]: Self::report_failure
    pub fn send<F>(
        &self,
        method: Method,
        resource: impl Into<String>,
        params: Option<Value>,
        on_success: F,
        on_failure: Option<FailureHandler>,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Value) + Send + 'static,
    {
        let dispatcher = self.clone();
        let resource = resource.into();
        tokio::spawn(async move {
            match dispatcher.request(method, &resource, params.as_ref()).await {
                Ok(value) => on_success(value),
                Err(failure) => dispatcher.report_failure(&failure, on_failure.as_ref()),
            }
        })
    }

    /// Awaitable form of [`send`](Self::send): fetches the token if needed,
    /// issues the request and returns the decoded response body.
    ///
    /// A 2xx response with an empty body decodes to `Value::Null`.
    ///
    /// # Errors
    /// Returns a [`Failure`] if the token fetch or the request fails, or if
    /// a successful response is not valid JSON.
    pub async fn request(
        &self,
        method: Method,
        resource: &str,
        params: Option<&Value>,
    ) -> Result<Value, Failure> {
        let url = self.resolve(resource)?;
        let token = self.csrf_token().await?;

        debug!(%method, %url, has_body = params.is_some(), "dispatching request");

        let mut builder = self
            .inner
            .http
            .request(method.to_reqwest(), url)
            .header(CSRF_HEADER, token)
            .header(ACCEPT, "application/json");
        if let Some(params) = params {
            let body = serde_json::to_string(params).map_err(|e| {
                Failure::new(TRANSPORT_STATUS, format!("Failed to encode params: {e}"))
            })?;
            builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE).body(body);
        }

        let response = builder.send().await.map_err(|e| Failure::transport(&e))?;
        let (status, text) = read_success(response).await?;
        parse_json(status, text)
    }

    /// Routes a failure through the handler chain: `on_failure`, else the
    /// dispatcher-wide handler, else the document is replaced with the body.
    pub fn report_failure(&self, failure: &Failure, on_failure: Option<&FailureHandler>) {
        if let Some(handler) = on_failure {
            handler(&failure.body, failure.status);
            return;
        }

        let default = self
            .inner
            .default_handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(handler) = default {
            handler(&failure.body, failure.status);
            return;
        }

        warn!(
            status = failure.status,
            "no failure handler installed, replacing document with error body"
        );
        self.inner.document.replace_body(&failure.body);
    }

    fn resolve(&self, resource: &str) -> Result<Url, Failure> {
        self.inner.base_url.join(resource).map_err(|e| {
            Failure::new(
                TRANSPORT_STATUS,
                format!("Invalid resource '{resource}': {e}"),
            )
        })
    }

    async fn csrf_token(&self) -> Result<String, Failure> {
        self.inner
            .token
            .acquire(|| self.start_token_fetch())
            .await
    }

    fn start_token_fetch(&self) -> BoxFuture<'static, Result<String, Failure>> {
        let http = self.inner.http.clone();
        let url = self.inner.csrf_url.clone();
        async move {
            info!(%url, "fetching csrf token");
            let response = http
                .post(url)
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| Failure::transport(&e))?;
            let (status, text) = read_success(response).await?;
            let parsed: CsrfTokenResponse = match serde_json::from_str(&text) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(status, error = %e, "malformed csrf token response");
                    return Err(Failure::new(status, text));
                }
            };
            debug!("csrf token acquired");
            Ok(parsed.csrf_token)
        }
        .boxed()
    }
}

/// Returns (status, body) for 2xx responses, a [`Failure`] otherwise.
async fn read_success(response: reqwest::Response) -> Result<(u16, String), Failure> {
    let status = response.status();
    let text = response.text().await.map_err(|e| Failure::transport(&e))?;
    if status.is_success() {
        Ok((status.as_u16(), text))
    } else {
        debug!(status = status.as_u16(), "request failed");
        Err(Failure::new(status.as_u16(), text))
    }
}

fn parse_json(status: u16, text: String) -> Result<Value, Failure> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    match serde_json::from_str(&text) {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!(status, error = %e, "response body is not valid JSON");
            Err(Failure::new(status, text))
        }
    }
}
