use std::time::Duration;

/// Maximum number of bytes of raw output retained in a
/// [`NoResponseFound`](Error::NoResponseFound) diagnostic preview.
const PREVIEW_LIMIT: usize = 256;

/// Errors that can occur when using subcurl.
///
/// Errors are organized by category:
/// - Configuration errors: detected at `build()` time
/// - Spawn errors: failed to start the external client process
/// - IO errors: communication failures with the subprocess
/// - Runtime errors: timeout, cancellation, transport failure
/// - Parser errors: no reconstructable response in the captured output
/// - Resolver errors: wrapper-script read/parse problems (recoverable by
///   falling back to verbatim script execution)
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    // -------------------------------------------------------------------------
    // Configuration errors (detected at build() time)
    // -------------------------------------------------------------------------
    /// Invalid configuration provided to builder.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -------------------------------------------------------------------------
    // Spawn errors
    // -------------------------------------------------------------------------
    /// The configured client binary does not exist.
    ///
    /// Raised by the pre-spawn existence check; OS process creation is never
    /// attempted for a missing binary.
    #[error("client binary not found: {path}")]
    BinaryNotFound { path: String },

    /// The OS failed to create the process.
    #[error("failed to spawn client process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    // -------------------------------------------------------------------------
    // IO errors
    // -------------------------------------------------------------------------
    /// IO error communicating with the subprocess.
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    // -------------------------------------------------------------------------
    // Runtime errors
    // -------------------------------------------------------------------------
    /// The process did not exit within the configured timeout.
    ///
    /// The process has been terminated and reaped; any partial output was
    /// discarded.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The request was cancelled before the process exited.
    #[error("request cancelled")]
    Cancelled,

    /// The client exited with a fatal transport-level code.
    ///
    /// The exit code is the process's own status, distinct from any HTTP
    /// status carried inside its output. The raw diagnostic stream is
    /// attached verbatim.
    #[error("client exited with code {code}: {stderr}")]
    TransportFailed { code: i32, stderr: String },

    // -------------------------------------------------------------------------
    // Parser errors
    // -------------------------------------------------------------------------
    /// End of stream was reached without a single complete header block.
    #[error("no HTTP response found in output (received: {preview:?})")]
    NoResponseFound { preview: String },

    // -------------------------------------------------------------------------
    // Resolver errors (recoverable: trigger wrapper-script fallback)
    // -------------------------------------------------------------------------
    /// The wrapper script could not be read from disk.
    #[error("failed to read wrapper script {path}: {source}")]
    ScriptRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The wrapper script's argument list could not be extracted.
    #[error("failed to parse wrapper script: {reason}")]
    ScriptParse { reason: String },
}

/// A specialized Result type for subcurl operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an IO error.
    pub fn io(source: std::io::Error) -> Self {
        Self::Io(source)
    }

    /// Create a `NoResponseFound` error with a bounded preview of the raw
    /// bytes received, for diagnostics.
    pub fn no_response(received: &[u8]) -> Self {
        let end = received.len().min(PREVIEW_LIMIT);
        Self::NoResponseFound {
            preview: String::from_utf8_lossy(&received[..end]).into_owned(),
        }
    }

    /// Check if this error is a timeout or cancellation.
    ///
    /// Both are races against natural process exit; the process has already
    /// been terminated and reaped when one of these is returned.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Cancelled)
    }

    /// Check if this error came from wrapper-script resolution.
    ///
    /// These are recoverable: the resolver falls back to executing the
    /// wrapper script verbatim instead of failing the request.
    pub fn is_script_error(&self) -> bool {
        matches!(self, Error::ScriptRead { .. } | Error::ScriptParse { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
