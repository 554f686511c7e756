//! Incremental header-block/body parser.

use super::status::reason_phrase;
use super::{Headers, ResponseHead};
use crate::{Error, Result};

/// Leading bytes of a status line.
const STATUS_MARKER: &[u8] = b"HTTP/";

/// Parsing state.
///
/// `AwaitingHeaders` is the initial state; `InBody` is terminal. The rescan
/// for further header blocks applies only while awaiting headers, so a body
/// that happens to start with `HTTP/` is never reinterpreted once body mode
/// has been entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingHeaders,
    InBody,
}

/// Incremental parser reducing raw client output to one logical response.
///
/// Feed arrival-ordered chunks with [`push`](Self::push); each call returns
/// the body bytes that chunk made available. Headers are buffered (they are
/// bounded), while body bytes pass through immediately without accumulation
/// (bodies are unbounded). Finish with [`finish`](Self::finish) to obtain
/// the terminal header block and any trailing buffered bytes.
///
/// A parser is created fresh per request and discarded after `finish`.
///
/// # Example
///
/// ```
/// use subcurl::response::ResponseParser;
///
/// let mut parser = ResponseParser::new();
/// let mut body = parser.push(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nHello");
/// let (head, trailing) = parser.finish().unwrap();
/// body.extend_from_slice(&trailing);
/// assert_eq!(head.status, 200);
/// assert_eq!(body, b"Hello");
/// ```
#[derive(Debug)]
pub struct ResponseParser {
    state: State,
    buf: Vec<u8>,
    head: Option<ResponseHead>,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    /// Create a parser in the initial `AwaitingHeaders` state.
    pub fn new() -> Self {
        Self {
            state: State::AwaitingHeaders,
            buf: Vec::new(),
            head: None,
        }
    }

    /// Check whether the parser has transitioned to body mode.
    pub fn is_in_body(&self) -> bool {
        self.state == State::InBody
    }

    /// The most recently completed header block, if any.
    ///
    /// Older blocks (redirects, provisional responses) are discarded as
    /// soon as a newer one completes; only the terminal block survives.
    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    /// Feed one chunk; returns the body bytes it released.
    ///
    /// Returns an empty vector while header blocks are still being
    /// consumed. Once in body mode, every chunk passes through verbatim.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<u8> {
        if self.state == State::InBody {
            return chunk.to_vec();
        }

        self.buf.extend_from_slice(chunk);

        // Consume complete header blocks. The loop only continues while the
        // remainder starts with a status-line marker, so arbitrarily many
        // redirect/provisional blocks collapse without recursion. Anything
        // that never presents a status line never completes a block, and
        // finish() reports it as "no response found".
        while self.buf.starts_with(STATUS_MARKER) {
            match find_block_end(&self.buf) {
                Some(end) => {
                    self.head = Some(parse_head(&self.buf[..end]));
                    self.buf.drain(..end);
                }
                None => break,
            }
        }

        // Transition to body mode once a head exists and the remainder can
        // no longer grow into another status line. An empty remainder stays
        // ambiguous until more bytes (or end of stream) arrive.
        if self.head.is_some() && !self.buf.is_empty() && !could_be_status_line(&self.buf) {
            self.state = State::InBody;
            return std::mem::take(&mut self.buf);
        }

        Vec::new()
    }

    /// Finish parsing at end of stream.
    ///
    /// Returns the terminal header block plus any bytes still buffered,
    /// which belong to the body. Fails with [`Error::NoResponseFound`]
    /// (carrying a bounded preview of the received bytes) when no header
    /// block ever completed.
    pub fn finish(self) -> Result<(ResponseHead, Vec<u8>)> {
        match self.head {
            // Bytes still buffered after the terminal block belong to the
            // body (for example an incomplete-looking `HTTP/` prefix).
            Some(head) => Ok((head, self.buf)),
            None => Err(Error::no_response(&self.buf)),
        }
    }
}

/// Find the end offset (exclusive, past the blank-line terminator) of the
/// first complete header block in `buf`.
fn find_block_end(buf: &[u8]) -> Option<usize> {
    // A block ends at the first blank line: either CRLF CRLF or LF LF.
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            if buf[i + 1..].starts_with(b"\r\n") {
                return Some(i + 3);
            }
            if buf[i + 1..].starts_with(b"\n") {
                return Some(i + 2);
            }
        }
        i += 1;
    }
    None
}

/// Check whether `buf` is, or could still become, a status line.
///
/// A remainder shorter than the marker is treated as "could be" while it is
/// a prefix of `HTTP/`, so a blank-line separator split across two chunks
/// is not mistaken for body bytes.
fn could_be_status_line(buf: &[u8]) -> bool {
    if buf.len() < STATUS_MARKER.len() {
        STATUS_MARKER.starts_with(buf)
    } else {
        buf.starts_with(STATUS_MARKER)
    }
}

/// Parse one header block (status line plus header lines).
fn parse_head(block: &[u8]) -> ResponseHead {
    let text = String::from_utf8_lossy(block);
    let mut lines = text.lines();

    let (status, status_text) = parse_status_line(lines.next().unwrap_or(""));

    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        // A line without a colon is ignored, not fatal.
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() {
                headers.insert(name, value.trim());
            }
        }
    }

    ResponseHead {
        status,
        status_text,
        headers,
    }
}

/// Parse `HTTP/<version> <code> [<reason>]`.
///
/// A missing reason phrase is filled from the static status table. A
/// malformed line is recovered, not fatal: the status is recorded as 0 with
/// an empty reason, and the block still counts as completed.
fn parse_status_line(line: &str) -> (u16, String) {
    let mut parts = line.splitn(3, ' ');
    let _version = parts.next();
    let status = parts
        .next()
        .and_then(|code| code.trim().parse::<u16>().ok())
        .unwrap_or(0);
    let status_text = parts
        .next()
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .map(str::to_string)
        .or_else(|| reason_phrase(status).map(str::to_string))
        .unwrap_or_default();
    (status, status_text)
}
