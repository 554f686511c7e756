//! Collaborator interfaces: request assembly and cookie persistence.
//!
//! The transport core consumes these interfaces but does not implement
//! them. A request assembler owns body-encoding policy (text, JSON, form,
//! binary) and default header injection; a cookie jar owns a line-oriented
//! cookie file and contributes persistence flags to the argument vector.

use crate::Result;

/// The argument vector and body bytes produced for one request.
///
/// Created by a [`RequestAssembler`] and consumed by the transport within
/// a single request.
#[derive(Debug, Clone, Default)]
pub struct AssembledRequest {
    /// Ordered client arguments (URL, method, header flags, ...).
    pub argv: Vec<String>,
    /// Request body delivered on the child's stdin.
    pub stdin: Option<Vec<u8>>,
}

impl AssembledRequest {
    /// Create a request from an argument vector alone.
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv, stdin: None }
    }

    /// Set the body bytes.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(body.into());
        self
    }
}

/// Builds the argument vector and body bytes from a request description.
///
/// Implementations own encoding policy and default headers; the transport
/// only consumes their output.
pub trait RequestAssembler: Send + Sync {
    /// Produce the argv and stdin bytes for one request.
    fn assemble(&self) -> Result<AssembledRequest>;
}

/// One record in a line-oriented (Netscape format) cookie file.
///
/// The `http_only` flag is carried by the file's `#HttpOnly_` domain-prefix
/// convention rather than a separate field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    /// Unix expiry timestamp; `0` for session cookies.
    pub expires: u64,
    pub name: String,
    pub value: String,
    pub http_only: bool,
}

/// Persistence of cookies across requests, backed by a cookie file the
/// external client reads and writes.
///
/// The transport treats a jar purely as an opaque argv contributor: the
/// flags from [`curl_args`](Self::curl_args) are appended to every request.
/// Concurrent requests sharing one jar race at the filesystem level; no
/// in-process locking is provided.
pub trait CookieJar: Send + Sync {
    /// Persistence flags referencing the jar file (typically read-from and
    /// write-to flags), appended to each request's argv.
    fn curl_args(&self) -> Vec<String>;

    /// All cookies currently in the jar.
    fn cookies(&self) -> Result<Vec<Cookie>>;

    /// Insert or replace a cookie.
    fn set_cookie(&self, cookie: Cookie) -> Result<()>;

    /// Remove a cookie by domain and name.
    fn delete_cookie(&self, domain: &str, name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AssembledRequest>();
        assert_send_sync::<Cookie>();
    }

    #[test]
    fn assembled_request_builder() {
        let req = AssembledRequest::new(vec!["-i".into(), "https://example.com".into()])
            .body(b"payload".to_vec());
        assert_eq!(req.argv.len(), 2);
        assert_eq!(req.stdin.as_deref(), Some(&b"payload"[..]));
    }

    #[test]
    fn trait_objects_are_usable() {
        struct Fixed;
        impl RequestAssembler for Fixed {
            fn assemble(&self) -> Result<AssembledRequest> {
                Ok(AssembledRequest::new(vec!["https://example.com".into()]))
            }
        }
        let assembler: Box<dyn RequestAssembler> = Box::new(Fixed);
        let req = assembler.assemble().unwrap();
        assert_eq!(req.argv, vec!["https://example.com".to_string()]);
    }
}
