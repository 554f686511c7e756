//! High-level transport tying the runner, resolver, and parser together.
//!
//! A [`Transport`] holds the per-transport configuration (client binary,
//! default timeout, optional cookie jar) resolved once and passed down
//! explicitly; the runner and parser never consult ambient state, which
//! keeps each layer independently testable.
//!
//! # Example
//!
//! ```ignore
//! use subcurl::{AssembledRequest, PerformOptions, Transport};
//!
//! let transport = Transport::builder()
//!     .binary("/usr/bin/curl")
//!     .build()?;
//!
//! let request = AssembledRequest::new(vec![
//!     "-sS".into(), "-i".into(), "https://example.com".into(),
//! ]);
//! let response = transport.perform(&request, &PerformOptions::new()).await?;
//! println!("{} {}", response.status, response.status_text);
//! ```

use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::request::{AssembledRequest, CookieJar};
use crate::response::{parse_response, HttpResponse, ResponseHead, ResponseParser};
use crate::runner::{self, Invocation, InvocationOutput};
use crate::script;
use crate::{Error, Result};

/// The one exit code that means "transport succeeded but the HTTP status
/// was in an error class the client flags by default". Captured output is
/// still parsed before the code is treated as fatal.
pub const HTTP_ERROR_EXIT_CODE: i32 = 22;

/// Default name of the executable a wrapper script is expected to invoke.
const DEFAULT_CLIENT_NAME: &str = "curl.exe";

/// Per-transport configuration, resolved once and reused across requests.
#[derive(Clone)]
pub struct TransportConfig {
    /// Client binary, or a batch wrapper script fronting it.
    pub binary: PathBuf,
    /// Name of the underlying executable a wrapper invokes.
    pub client_name: String,
    /// Default timeout applied when a request supplies none.
    pub timeout: Option<Duration>,
    /// Optional cookie jar whose persistence flags join every request.
    pub cookie_jar: Option<Arc<dyn CookieJar>>,
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("binary", &self.binary)
            .field("client_name", &self.client_name)
            .field("timeout", &self.timeout)
            .field("cookie_jar", &self.cookie_jar.is_some())
            .finish()
    }
}

/// HTTP transport over an external curl-compatible client.
///
/// One subprocess is spawned per request; there is no pooling and no
/// shared mutable state between concurrent requests, so a `Transport` can
/// be cloned and shared freely across tasks.
#[derive(Debug, Clone)]
pub struct Transport {
    config: Arc<TransportConfig>,
}

/// Builder for [`Transport`].
#[derive(Default)]
pub struct TransportBuilder {
    binary: Option<PathBuf>,
    client_name: Option<String>,
    timeout: Option<Duration>,
    cookie_jar: Option<Arc<dyn CookieJar>>,
}

impl TransportBuilder {
    /// Set the client binary or wrapper script path (required).
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Set the name of the underlying executable a wrapper script invokes.
    /// Defaults to `curl.exe`.
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Set the default request timeout.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Attach a cookie jar contributing persistence flags to each request.
    pub fn cookie_jar(mut self, jar: Arc<dyn CookieJar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when no binary was set.
    pub fn build(self) -> Result<Transport> {
        let binary = self
            .binary
            .ok_or_else(|| Error::InvalidConfig("client binary is required".into()))?;
        Ok(Transport {
            config: Arc::new(TransportConfig {
                binary,
                client_name: self.client_name.unwrap_or_else(|| DEFAULT_CLIENT_NAME.into()),
                timeout: self.timeout,
                cookie_jar: self.cookie_jar,
            }),
        })
    }
}

/// Per-request execution options.
#[derive(Debug, Clone, Default)]
pub struct PerformOptions {
    /// Overrides the transport's default timeout.
    pub timeout: Option<Duration>,
    /// External cancellation signal.
    pub cancel: Option<CancellationToken>,
}

impl PerformOptions {
    /// Options with no timeout override and no cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a request timeout.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Attach a cancellation token.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl Transport {
    /// Create a builder for configuring a new transport.
    pub fn builder() -> TransportBuilder {
        TransportBuilder::default()
    }

    /// Get a reference to the transport's configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Execute one request and reconstruct the buffered response.
    ///
    /// The assembled argv is extended with the cookie jar's flags, the
    /// wrapper script (if the configured binary is one) is resolved, the
    /// process runs to completion, and the exit-status convention is
    /// applied: `0` parses the output; the reserved HTTP-error code still
    /// attempts a parse before failing; every other non-zero code is a
    /// fatal [`Error::TransportFailed`] carrying the raw diagnostics.
    pub async fn perform(
        &self,
        request: &AssembledRequest,
        opts: &PerformOptions,
    ) -> Result<HttpResponse> {
        let invocation = self.build_invocation(request, opts).await;
        let output = runner::execute(&invocation).await?;
        reconstruct(output)
    }

    /// Execute one request, streaming the response.
    ///
    /// The returned [`ResponseStream`] yields one [`ResponseEvent::Head`]
    /// followed by [`ResponseEvent::Body`] chunks in arrival order.
    ///
    /// # Cancellation
    ///
    /// Dropping the stream cancels the request and kills the subprocess.
    pub async fn send(
        &self,
        request: &AssembledRequest,
        opts: &PerformOptions,
    ) -> Result<ResponseStream> {
        let cancel = opts.cancel.clone().unwrap_or_default();
        let mut invocation = self.build_invocation(request, opts).await;
        invocation.cancel = Some(cancel.clone());

        let (tx, rx) = mpsc::unbounded_channel();

        // Background task: drive the process, feed the parser, forward
        // events. Send failures mean the receiver is gone; the cancel
        // token (triggered by the stream's Drop) stops the process.
        tokio::spawn(async move {
            let mut parser = ResponseParser::new();
            let mut head_sent = false;

            let streamed = runner::execute_streaming(&invocation, |chunk| {
                let body = parser.push(chunk);
                if !head_sent && parser.is_in_body() {
                    if let Some(head) = parser.head() {
                        head_sent = true;
                        let _ = tx.send(Ok(ResponseEvent::Head(head.clone())));
                    }
                }
                if !body.is_empty() {
                    let _ = tx.send(Ok(ResponseEvent::Body(body)));
                }
            })
            .await;

            match streamed {
                Err(e) => {
                    let _ = tx.send(Err(e));
                }
                Ok(out) => {
                    let code = out.exit_code.unwrap_or(-1);
                    if code != 0 && code != HTTP_ERROR_EXIT_CODE {
                        let _ = tx.send(Err(transport_failed(code, &out.stderr)));
                        return;
                    }
                    match parser.finish() {
                        Ok((head, trailing)) => {
                            if !head_sent {
                                let _ = tx.send(Ok(ResponseEvent::Head(head)));
                            }
                            if !trailing.is_empty() {
                                let _ = tx.send(Ok(ResponseEvent::Body(trailing)));
                            }
                        }
                        Err(e) => {
                            let err = if code == HTTP_ERROR_EXIT_CODE {
                                transport_failed(code, &out.stderr)
                            } else {
                                e
                            };
                            let _ = tx.send(Err(err));
                        }
                    }
                }
            }
        });

        Ok(ResponseStream {
            rx,
            cancel,
            head: None,
        })
    }

    /// Build the invocation for one request: cookie-jar flags appended,
    /// wrapper script resolved, timeout and cancellation attached.
    async fn build_invocation(
        &self,
        request: &AssembledRequest,
        opts: &PerformOptions,
    ) -> Invocation {
        let mut argv = request.argv.clone();
        if let Some(jar) = &self.config.cookie_jar {
            argv.extend(jar.curl_args());
        }

        let (target, argv) = if runner::requires_interpreter(&self.config.binary) {
            script::resolve(&self.config.binary, &self.config.client_name, &argv)
                .await
                .into_parts()
        } else {
            (self.config.binary.clone(), argv)
        };

        let mut invocation = Invocation::new(target, argv);
        invocation.stdin = request.stdin.clone();
        invocation.timeout = opts.timeout.or(self.config.timeout);
        invocation.cancel = opts.cancel.clone();
        invocation
    }
}

/// Apply the exit-status convention and parse the buffered output.
fn reconstruct(output: InvocationOutput) -> Result<HttpResponse> {
    let code = output.exit_code.unwrap_or(-1);
    match code {
        0 => parse_response(&output.stdout),
        HTTP_ERROR_EXIT_CODE => parse_response(&output.stdout).map_err(|e| {
            tracing::debug!(error = %e, "no parseable response behind HTTP-error exit code");
            transport_failed(code, &output.stderr)
        }),
        _ => Err(transport_failed(code, &output.stderr)),
    }
}

fn transport_failed(code: i32, stderr: &[u8]) -> Error {
    Error::TransportFailed {
        code,
        stderr: String::from_utf8_lossy(stderr).into_owned(),
    }
}

/// One event from a streaming response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    /// The terminal header block; emitted exactly once, before any body.
    Head(ResponseHead),
    /// One fragment of body bytes, in arrival order.
    Body(Vec<u8>),
}

/// A stream of events from one in-flight request.
///
/// Implements [`futures::Stream`] for use with async combinators.
/// Dropping the stream cancels the request; the background task then
/// terminates and reaps the subprocess.
pub struct ResponseStream {
    rx: mpsc::UnboundedReceiver<Result<ResponseEvent>>,
    cancel: CancellationToken,
    head: Option<ResponseHead>,
}

impl ResponseStream {
    /// The response head, once it has been yielded by the stream.
    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    /// Drain the stream into a buffered [`HttpResponse`].
    pub async fn collect(mut self) -> Result<HttpResponse> {
        use futures::StreamExt;

        let mut head = None;
        let mut body = Vec::new();
        while let Some(event) = self.next().await {
            match event? {
                ResponseEvent::Head(h) => head = Some(h),
                ResponseEvent::Body(chunk) => body.extend_from_slice(&chunk),
            }
        }
        let head = head.ok_or_else(|| Error::no_response(&body))?;
        Ok(HttpResponse {
            status: head.status,
            status_text: head.status_text,
            headers: head.headers,
            body,
        })
    }
}

impl Stream for ResponseStream {
    type Item = Result<ResponseEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(event))) => {
                if let ResponseEvent::Head(ref head) = event {
                    this.head = Some(head.clone());
                }
                Poll::Ready(Some(Ok(event)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        // Stops the background task's process at the next poll; the task
        // itself exits once its sends start failing.
        self.cancel.cancel();
    }
}
