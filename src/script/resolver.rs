//! Selection between direct-binary and verbatim-wrapper execution.

use std::path::{Path, PathBuf};

use super::{header_names_in, WrapperScript};
use crate::{Error, Result};

/// The command actually handed to the process runner.
///
/// The two variants are interchangeable argv-producing strategies selected
/// by a single runtime capability probe: can the underlying binary be
/// located, or must the wrapper script run through the interpreter?
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCommand {
    /// The underlying binary is invoked directly with the merged argument
    /// list (filtered wrapper defaults followed by caller arguments).
    Direct { binary: PathBuf, argv: Vec<String> },
    /// The wrapper script runs verbatim through the interpreter; it bakes
    /// its own defaults, so only the caller arguments are appended.
    Wrapper { script: PathBuf, argv: Vec<String> },
}

impl ResolvedCommand {
    /// The executable or script to launch.
    pub fn target(&self) -> &Path {
        match self {
            ResolvedCommand::Direct { binary, .. } => binary,
            ResolvedCommand::Wrapper { script, .. } => script,
        }
    }

    /// The argument vector to launch it with.
    pub fn argv(&self) -> &[String] {
        match self {
            ResolvedCommand::Direct { argv, .. } => argv,
            ResolvedCommand::Wrapper { argv, .. } => argv,
        }
    }

    /// Whether the interpreter is bypassed.
    pub fn is_direct(&self) -> bool {
        matches!(self, ResolvedCommand::Direct { .. })
    }

    /// Split into `(target, argv)`.
    pub fn into_parts(self) -> (PathBuf, Vec<String>) {
        match self {
            ResolvedCommand::Direct { binary, argv } => (binary, argv),
            ResolvedCommand::Wrapper { script, argv } => (script, argv),
        }
    }
}

/// Resolve a wrapper script into a runnable command.
///
/// On success the underlying binary is invoked directly with the wrapper's
/// baked arguments merged in: wrapper header flags colliding with a
/// caller-supplied header name are dropped, and caller arguments are
/// appended last so they are never shadowed.
///
/// A read or parse failure is recoverable: it falls back to executing the
/// wrapper verbatim through the interpreter with the caller arguments
/// appended, never aborting the request.
pub async fn resolve(script: &Path, binary_name: &str, caller_argv: &[String]) -> ResolvedCommand {
    let parsed = match read_and_parse(script, binary_name).await {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(
                script = %script.display(),
                error = %e,
                "wrapper script extraction failed, executing script verbatim"
            );
            return wrapper_fallback(script, caller_argv);
        }
    };

    match locate_underlying(script, parsed.invocation_token()) {
        Some(binary) => {
            let caller_headers = header_names_in(caller_argv);
            let mut argv = parsed.filtered_argv(&caller_headers);
            argv.extend(caller_argv.iter().cloned());
            tracing::debug!(binary = %binary.display(), "bypassing wrapper script");
            ResolvedCommand::Direct { binary, argv }
        }
        None => {
            tracing::debug!(
                script = %script.display(),
                token = parsed.invocation_token(),
                "underlying binary not located, executing script verbatim"
            );
            wrapper_fallback(script, caller_argv)
        }
    }
}

fn wrapper_fallback(script: &Path, caller_argv: &[String]) -> ResolvedCommand {
    ResolvedCommand::Wrapper {
        script: script.to_path_buf(),
        argv: caller_argv.to_vec(),
    }
}

async fn read_and_parse(script: &Path, binary_name: &str) -> Result<WrapperScript> {
    let text = tokio::fs::read_to_string(script)
        .await
        .map_err(|source| Error::ScriptRead {
            path: script.display().to_string(),
            source,
        })?;
    WrapperScript::parse(&text, binary_name)
}

/// Locate the binary the wrapper's invocation token refers to.
///
/// `%~dp0` expands to the script's own directory, so such tokens (and any
/// relative-path token) resolve against it; a bare name is tried as a
/// sibling first, then on `PATH`.
fn locate_underlying(script: &Path, token: &str) -> Option<PathBuf> {
    let dir = script.parent().unwrap_or_else(|| Path::new("."));
    let tail = token.strip_prefix("%~dp0").unwrap_or(token);
    let tail = tail.replace('\\', "/");

    if tail.contains('/') || token.starts_with("%~dp0") {
        let mut candidate = dir.to_path_buf();
        candidate.extend(tail.split('/').filter(|part| !part.is_empty()));
        return candidate.is_file().then_some(candidate);
    }

    let sibling = dir.join(&tail);
    if sibling.is_file() {
        return Some(sibling);
    }
    which::which(&tail).ok()
}
