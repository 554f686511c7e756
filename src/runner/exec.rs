//! Subprocess execution with timeout/cancellation races.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use super::invocation::{Invocation, InvocationOutput, StreamedOutput};
use super::READ_CHUNK_SIZE;
use crate::{Error, Result};

/// Run an external command to completion, buffering its output.
///
/// The binary path is existence-checked before launch; a missing binary
/// fails with [`Error::BinaryNotFound`] without ever creating a process.
/// If `stdin` bytes are supplied they are written to the child's input
/// stream, which is then closed.
///
/// Timeout and cancellation are races against natural exit: whichever fires
/// first determines the result, and on either one the child is terminated
/// and reaped before this call returns.
pub async fn execute(invocation: &Invocation) -> Result<InvocationOutput> {
    let mut stdout = Vec::new();
    let streamed = execute_streaming(invocation, |chunk| {
        stdout.extend_from_slice(chunk);
    })
    .await?;
    Ok(InvocationOutput {
        exit_code: streamed.exit_code,
        stdout,
        stderr: streamed.stderr,
    })
}

/// Run an external command, delivering stdout fragments as they arrive.
///
/// `on_chunk` is invoked for each output fragment in arrival order, before
/// the terminal result resolves. Chunks are never split or reordered by the
/// runner, but their boundaries carry no meaning: callers must not assume
/// they align with logical units such as header lines.
///
/// The contract is otherwise identical to [`execute`]. Output delivered
/// before a timeout or cancellation is considered discarded, since a
/// partial response cannot be safely reconstructed.
pub async fn execute_streaming<F>(invocation: &Invocation, mut on_chunk: F) -> Result<StreamedOutput>
where
    F: FnMut(&[u8]),
{
    let binary = locate_binary(&invocation.binary)?;
    tracing::debug!(binary = %binary.display(), argv = ?invocation.argv, "spawning client process");

    let mut cmd = build_command(&binary, &invocation.argv);
    cmd.stdin(if invocation.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::BinaryNotFound {
                path: binary.display().to_string(),
            }
        } else {
            Error::SpawnFailed(e)
        }
    })?;

    // Write the request body concurrently with output draining, so a child
    // that floods stdout before reading stdin cannot deadlock the pipe.
    if let Some(body) = invocation.stdin.clone() {
        let mut stdin = child.stdin.take().expect("stdin was configured");
        tokio::spawn(async move {
            // A child may exit without reading its input; a broken pipe
            // here is not an error for the request as a whole.
            let _ = stdin.write_all(&body).await;
            let _ = stdin.shutdown().await;
        });
    }

    let mut stdout = child.stdout.take().expect("stdout was configured");
    let mut stderr_pipe = child.stderr.take().expect("stderr was configured");

    let limit = invocation.timeout;
    let deadline = sleep_or_never(limit);
    let cancelled = cancelled_or_never(invocation.cancel.clone());
    tokio::pin!(deadline, cancelled);

    let mut stderr = Vec::new();
    let mut out_buf = vec![0u8; READ_CHUNK_SIZE];
    let mut err_buf = vec![0u8; READ_CHUNK_SIZE];
    let mut out_done = false;
    let mut err_done = false;

    let status = loop {
        tokio::select! {
            biased;

            _ = &mut cancelled => {
                terminate(&mut child).await;
                return Err(Error::Cancelled);
            }
            _ = &mut deadline => {
                terminate(&mut child).await;
                return Err(Error::Timeout(limit.unwrap_or_default()));
            }
            read = stdout.read(&mut out_buf), if !out_done => {
                let n = read.map_err(Error::io)?;
                if n == 0 {
                    out_done = true;
                } else {
                    on_chunk(&out_buf[..n]);
                }
            }
            read = stderr_pipe.read(&mut err_buf), if !err_done => {
                let n = read.map_err(Error::io)?;
                if n == 0 {
                    err_done = true;
                } else {
                    stderr.extend_from_slice(&err_buf[..n]);
                }
            }
            status = child.wait(), if out_done && err_done => {
                break status.map_err(Error::io)?;
            }
        }
    };

    tracing::debug!(exit_code = ?status.code(), "client process exited");
    Ok(StreamedOutput {
        exit_code: status.code(),
        stderr,
    })
}

/// Request termination and wait for the OS to acknowledge it.
///
/// Termination is requested, not assumed instantaneous: resolving before
/// the child is reaped would leak a dangling process handle.
async fn terminate(child: &mut Child) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}

/// Resolve and existence-check the binary path before any spawn attempt.
fn locate_binary(binary: &Path) -> Result<PathBuf> {
    let not_found = || Error::BinaryNotFound {
        path: binary.display().to_string(),
    };

    if binary.is_absolute() || binary.components().count() > 1 {
        if binary.is_file() {
            Ok(binary.to_path_buf())
        } else {
            Err(not_found())
        }
    } else {
        // Bare executable name: search PATH.
        which::which(binary).map_err(|_| not_found())
    }
}

/// Check whether a target must be invoked through the command interpreter.
pub(crate) fn requires_interpreter(binary: &Path) -> bool {
    matches!(
        binary.extension().and_then(|e| e.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("bat") || ext.eq_ignore_ascii_case("cmd")
    )
}

fn build_command(binary: &Path, argv: &[String]) -> Command {
    if requires_interpreter(binary) {
        interpreter_command(binary, argv)
    } else {
        let mut cmd = Command::new(binary);
        cmd.args(argv);
        cmd
    }
}

/// Invoke a batch script through `cmd.exe` with a pre-quoted command line.
///
/// `/s /c "…"` hands the inner line to the batch parser with the outer
/// quotes stripped, so our own quoting (see [`super::quoting`]) is the only
/// layer applied to each element.
#[cfg(windows)]
fn interpreter_command(script: &Path, argv: &[String]) -> Command {
    let line = super::quoting::build_command_line(script, argv);
    let mut cmd = Command::new("cmd.exe");
    cmd.arg("/d").arg("/s").arg("/c");
    cmd.raw_arg(format!("\"{line}\""));
    cmd
}

/// Batch scripts only exist on Windows; elsewhere the target is handed to
/// the OS directly and fails at spawn time like any other non-executable.
#[cfg(not(windows))]
fn interpreter_command(script: &Path, argv: &[String]) -> Command {
    let mut cmd = Command::new(script);
    cmd.args(argv);
    cmd
}

/// A future that resolves after `limit`, or never when no limit is set.
async fn sleep_or_never(limit: Option<std::time::Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}

/// A future that resolves on cancellation, or never without a token.
async fn cancelled_or_never(token: Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
