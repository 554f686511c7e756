//! Argument quoting and path normalization for `cmd.exe` invocations.
//!
//! When a batch script is the target, the whole command line passes through
//! the `cmd.exe` parser, which splits on unquoted whitespace and gives
//! meaning to several metacharacters. Native executables never go through
//! this path; they get an exact argv vector.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// Characters that force an argument to be quoted for `cmd.exe`, beyond
/// whitespace.
const CMD_SPECIAL: &[char] = &['&', '|', '<', '>', '^', '"', '%', '!'];

/// Check whether an argument must be quoted before handing it to `cmd.exe`.
pub fn needs_quoting(arg: &str) -> bool {
    arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || CMD_SPECIAL.contains(&c))
}

/// Quote a single argument for `cmd.exe`.
///
/// Arguments without whitespace or metacharacters pass through verbatim.
/// Otherwise the argument is wrapped in double quotes, with embedded double
/// quotes escaped by doubling.
pub fn quote_arg(arg: &str) -> String {
    if !needs_quoting(arg) {
        return arg.to_string();
    }
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if c == '"' {
            quoted.push('"');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Normalize a script path before quoting.
///
/// Separator style is unified to the native one and relative paths are
/// resolved to absolute. This must happen *before* quoting: an unnormalized
/// path containing spaces makes `cmd.exe` split it into multiple tokens and
/// fail with a misleading "command not found".
pub fn normalize_script_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    PathBuf::from(unify_separators(&absolute.to_string_lossy()))
}

/// Convert forward slashes to the native separator.
fn unify_separators(path: &str) -> String {
    if MAIN_SEPARATOR == '\\' {
        path.replace('/', "\\")
    } else {
        path.to_string()
    }
}

/// Build the full quoted command line for an interpreter invocation: the
/// normalized script path followed by each argument, space-separated.
pub fn build_command_line(script: &Path, argv: &[String]) -> String {
    let script = normalize_script_path(script);
    let mut line = quote_arg(&script.to_string_lossy());
    for arg in argv {
        line.push(' ');
        line.push_str(&quote_arg(arg));
    }
    line
}
