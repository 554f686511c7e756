//! HTTP transport over an external curl-compatible client.
//!
//! Instead of speaking HTTP itself, this crate launches a separately
//! installed client binary (or a batch wrapper script fronting one) as a
//! short-lived subprocess per request, captures its raw output, and
//! reconstructs a structured HTTP response from it. The point of the
//! indirection is TLS fingerprinting: clients such as `curl-impersonate`
//! produce browser-accurate handshakes that an in-process HTTP stack
//! cannot, and driving them as subprocesses inherits that fidelity.
//!
//! # Quick start
//!
//! ```ignore
//! use subcurl::{AssembledRequest, PerformOptions, Transport};
//!
//! #[tokio::main]
//! async fn main() -> subcurl::Result<()> {
//!     let transport = Transport::builder()
//!         .binary("/opt/impersonate/curl_chrome124.bat")
//!         .build()?;
//!
//!     let request = AssembledRequest::new(vec![
//!         "-sS".into(),
//!         "-i".into(),
//!         "https://example.com".into(),
//!     ]);
//!
//!     let response = transport.perform(&request, &PerformOptions::new()).await?;
//!     println!("{} {}", response.status, response.status_text);
//!     println!("{}", response.body_text());
//!     Ok(())
//! }
//! ```
//!
//! # Streaming
//!
//! [`Transport::send`] returns a [`ResponseStream`] that yields the header
//! block as soon as it is complete and body chunks as they arrive, without
//! buffering the body:
//!
//! ```ignore
//! use futures::StreamExt;
//! use subcurl::{PerformOptions, ResponseEvent};
//!
//! let mut stream = transport.send(&request, &PerformOptions::new()).await?;
//! while let Some(event) = stream.next().await {
//!     match event? {
//!         ResponseEvent::Head(head) => println!("status {}", head.status),
//!         ResponseEvent::Body(chunk) => std::io::Write::write_all(
//!             &mut std::io::stdout(), &chunk)?,
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`runner`]: spawns the subprocess, pipes stdin, drains stdout and
//!   stderr concurrently, enforces timeout and cancellation.
//! - [`script`]: parses batch wrapper scripts so their baked-in flags can
//!   be replayed against the underlying binary directly.
//! - [`response`]: incrementally reduces raw client output (including
//!   redirect and provisional header blocks) to one logical response.
//! - [`transport`]: ties the layers together behind [`Transport`].
//!
//! Request construction and cookie persistence stay behind the
//! [`RequestAssembler`] and [`CookieJar`] traits; this crate consumes
//! their output without knowing how it was produced.

pub mod error;
pub mod request;
pub mod response;
pub mod runner;
pub mod script;
pub mod transport;

pub use error::{Error, Result};
pub use request::{AssembledRequest, Cookie, CookieJar, RequestAssembler};
pub use response::{Headers, HttpResponse, ResponseHead, ResponseParser};
pub use runner::{Invocation, InvocationOutput, StreamedOutput};
pub use transport::{
    PerformOptions, ResponseEvent, ResponseStream, Transport, TransportBuilder,
    HTTP_ERROR_EXIT_CODE,
};
