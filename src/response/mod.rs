//! Reconstruction of one logical HTTP response from raw client output.
//!
//! The wrapped client is run with "include response headers" enabled, so
//! its stdout is one or more `HTTP/<version> <code> [<reason>]` header
//! blocks (redirects and provisional responses each add one) concatenated
//! with the body, with no explicit length framing. [`ResponseParser`]
//! reduces that stream to exactly one status/headers/body tuple, keeping
//! only the terminal header block.

mod parser;
mod status;

pub use parser::ResponseParser;
pub use status::reason_phrase;

/// Ordered mapping of lowercase header names to values.
///
/// Insertion order is preserved; inserting an existing name replaces its
/// value in place (last wins). Names are always compared case-insensitively
/// and stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, lower-casing the name. An existing entry with the
    /// same name is overwritten in place.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref().to_ascii_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Look up a header value by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Check for the presence of a header by case-insensitive name.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Status line and headers of the terminal header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP status code; `0` when the status line was malformed.
    pub status: u16,
    /// Reason phrase, filled from a static table when the client omits it.
    pub status_text: String,
    /// Headers of the terminal block only.
    pub headers: Headers,
}

/// One fully reconstructed HTTP response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase.
    pub status_text: String,
    /// Headers of the terminal header block.
    pub headers: Headers,
    /// Body bytes, exactly as received.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Check for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossily-decoded text.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Parse a complete buffered output stream into one response.
///
/// Convenience wrapper over [`ResponseParser`] for the buffered execution
/// mode, where the whole stream is available at once.
pub fn parse_response(raw: &[u8]) -> crate::Result<HttpResponse> {
    let mut parser = ResponseParser::new();
    let mut body = parser.push(raw);
    let (head, trailing) = parser.finish()?;
    body.extend_from_slice(&trailing);
    Ok(HttpResponse {
        status: head.status,
        status_text: head.status_text,
        headers: head.headers,
        body,
    })
}
