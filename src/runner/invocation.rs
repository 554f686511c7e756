//! Invocation descriptor and result types.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Description of one external command execution.
///
/// `argv` order is significant: the wrapped client's browser-fingerprint
/// flags are order-sensitive, so elements are passed to the OS exactly as
/// given and never reshuffled.
///
/// A descriptor is created and consumed within a single request.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Path to the client binary or wrapper script.
    pub binary: PathBuf,
    /// Ordered argument vector.
    pub argv: Vec<String>,
    /// Bytes written to the child's stdin, which is then closed.
    pub stdin: Option<Vec<u8>>,
    /// Upper bound on total process runtime.
    pub timeout: Option<Duration>,
    /// External cancellation signal.
    pub cancel: Option<CancellationToken>,
}

impl Invocation {
    /// Create a descriptor with no stdin, timeout, or cancellation.
    pub fn new(binary: impl Into<PathBuf>, argv: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            argv,
            stdin: None,
            timeout: None,
            cancel: None,
        }
    }

    /// Set the bytes delivered on the child's stdin.
    pub fn stdin(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(body.into());
        self
    }

    /// Set the execution timeout.
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

/// Full outcome of a buffered execution.
#[derive(Debug, Clone, Default)]
pub struct InvocationOutput {
    /// The process exit code, or `None` if it was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Everything the process wrote to stdout.
    pub stdout: Vec<u8>,
    /// Everything the process wrote to stderr.
    pub stderr: Vec<u8>,
}

impl InvocationOutput {
    /// Check whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stderr as lossily-decoded text, for diagnostics.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Outcome of a streaming execution.
///
/// Stdout is not retained here; it was delivered chunk-by-chunk to the
/// caller's callback as it arrived.
#[derive(Debug, Clone, Default)]
pub struct StreamedOutput {
    /// The process exit code, or `None` if it was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Everything the process wrote to stderr.
    pub stderr: Vec<u8>,
}

impl StreamedOutput {
    /// Check whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stderr as lossily-decoded text, for diagnostics.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_methods_chain() {
        let token = CancellationToken::new();
        let inv = Invocation::new("/usr/bin/curl", vec!["-i".into(), "https://example.com".into()])
            .stdin(b"payload".to_vec())
            .timeout(Duration::from_secs(30))
            .cancel_token(token);

        assert_eq!(inv.binary, PathBuf::from("/usr/bin/curl"));
        assert_eq!(inv.argv, vec!["-i".to_string(), "https://example.com".to_string()]);
        assert_eq!(inv.stdin.as_deref(), Some(&b"payload"[..]));
        assert_eq!(inv.timeout, Some(Duration::from_secs(30)));
        assert!(inv.cancel.is_some());
    }

    #[test]
    fn argv_order_is_preserved() {
        let argv: Vec<String> = ["--ciphers", "X", "-H", "A: 1", "-H", "B: 2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let inv = Invocation::new("curl", argv.clone());
        assert_eq!(inv.argv, argv);
    }

    #[test]
    fn output_success_requires_zero_exit() {
        let mut out = InvocationOutput::default();
        assert!(!out.success());
        out.exit_code = Some(0);
        assert!(out.success());
        out.exit_code = Some(22);
        assert!(!out.success());
    }

    #[test]
    fn stderr_text_is_lossy() {
        let out = StreamedOutput {
            exit_code: Some(1),
            stderr: vec![b'e', b'r', b'r', 0xff],
        };
        assert!(out.stderr_text().starts_with("err"));
    }
}
