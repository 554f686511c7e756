//! Process execution for the external HTTP client.
//!
//! This module runs one external command per logical request and delivers
//! its output either buffered or as a stream of chunks. There is no process
//! pool: every call spawns, drains, and reaps exactly one child.
//!
//! # Architecture
//!
//! ```text
//! subcurl                            curl-compatible client
//! ┌──────────────┐                   ┌─────────────┐
//! │  Invocation  │───stdin (body)───▶│             │
//! │              │◀──stdout (bytes)──│             │
//! │              │◀──stderr (diag)───│             │
//! └──────────────┘                   └─────────────┘
//! ```
//!
//! # Timeout and cancellation
//!
//! Both race against natural process exit; whichever fires first determines
//! the outcome. On timeout or cancellation the child is forcibly terminated
//! and the call does not resolve until the OS has reaped it, so no dangling
//! process handle can leak. Output captured up to that point is discarded.
//!
//! # Windows batch targets
//!
//! A `.bat`/`.cmd` target cannot be spawned directly; it is invoked through
//! `cmd.exe`, with the script path and every argument quoted per the rules
//! in [`quoting`]. Native targets receive an exact argv vector with no shell
//! interpretation.

mod exec;
mod invocation;
pub mod quoting;

pub use exec::{execute, execute_streaming};
pub use invocation::{Invocation, InvocationOutput, StreamedOutput};

pub(crate) use exec::requires_interpreter;

/// Read buffer size for draining child stdout/stderr.
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Invocation>();
        assert_send_sync::<InvocationOutput>();
        assert_send_sync::<StreamedOutput>();
    }
}
