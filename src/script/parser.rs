//! Batch wrapper-script parsing: extracting the baked argument list.

use std::collections::HashSet;

use super::{header_name, header_names_in};
use crate::{Error, Result};

/// Token marking where the wrapper forwards caller arguments.
pub const CALLER_ARGS_PLACEHOLDER: &str = "%*";

/// Trailing line-continuation token in batch scripts.
const CONTINUATION: char = '^';

/// A parsed wrapper script: the underlying-binary invocation token, the
/// baked argument list as data, and the header names it declares.
#[derive(Debug, Clone)]
pub struct WrapperScript {
    invocation_token: String,
    argv: Vec<String>,
    header_names: HashSet<String>,
}

impl WrapperScript {
    /// Extract the baked argument list from the raw script text.
    ///
    /// `binary_name` is the underlying executable the script is expected to
    /// invoke (for example `curl.exe`); the invocation line is located by a
    /// relative-path token such as `%~dp0curl.exe` or a bare executable
    /// name. Comment (`::`, `rem`) and echo-suppression lines are skipped;
    /// caret continuations are joined (single space outside quoted spans,
    /// no space inside, so a long quoted value spanning physical lines
    /// reassembles intact); tokenization honors single and double quoting
    /// and stops at the `%*` placeholder.
    ///
    /// Fails with [`Error::ScriptParse`] when no invocation line or no
    /// placeholder is found; callers treat that as a signal to execute the
    /// wrapper verbatim instead.
    pub fn parse(text: &str, binary_name: &str) -> Result<Self> {
        let mut lines = text.lines();

        let (invocation_token, first_piece) = loop {
            let Some(line) = lines.next() else {
                return Err(Error::ScriptParse {
                    reason: format!("no {binary_name} invocation found"),
                });
            };
            let mut line = line.trim();
            if line.is_empty() || is_comment(line) {
                continue;
            }
            if let Some(rest) = line.strip_prefix('@') {
                // `@echo off` is suppression noise; any other `@`-prefixed
                // line is the statement itself with echo disabled.
                let rest = rest.trim_start();
                if first_word_is_ci(rest, "echo") {
                    continue;
                }
                line = rest;
            }
            if let Some(found) = split_invocation(line, binary_name) {
                break found;
            }
        };

        // Everything after the invocation token begins the argument
        // section; join caret continuations into one logical string.
        let mut logical = String::new();
        let mut quote: Option<char> = None;
        let (mut piece, mut continued) = strip_continuation(first_piece);
        loop {
            append_piece(&mut logical, piece, &mut quote);
            if !continued {
                break;
            }
            match lines.next() {
                Some(next) => (piece, continued) = strip_continuation(next),
                None => break,
            }
        }

        let mut argv = tokenize(&logical);
        match argv.iter().position(|t| t == CALLER_ARGS_PLACEHOLDER) {
            Some(pos) => argv.truncate(pos),
            None => {
                return Err(Error::ScriptParse {
                    reason: "caller-argument placeholder %* not found".into(),
                })
            }
        }

        let header_names = header_names_in(&argv);
        Ok(Self {
            invocation_token,
            argv,
            header_names,
        })
    }

    /// The token the script uses to invoke the underlying binary, quotes
    /// stripped (for example `%~dp0curl.exe`).
    pub fn invocation_token(&self) -> &str {
        &self.invocation_token
    }

    /// The baked argument list, in script order, placeholder excluded.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Header names (lower-cased) the script declares via `-H` flags.
    pub fn header_names(&self) -> &HashSet<String> {
        &self.header_names
    }

    /// The baked argv with every header flag whose name appears in
    /// `caller_headers` removed (flag and value token together). All other
    /// tokens keep their relative order and verbatim form.
    pub fn filtered_argv(&self, caller_headers: &HashSet<String>) -> Vec<String> {
        let mut out = Vec::with_capacity(self.argv.len());
        let mut iter = self.argv.iter().peekable();
        while let Some(token) = iter.next() {
            if token == "-H" || token == "--header" {
                let collides = iter
                    .peek()
                    .and_then(|value| header_name(value))
                    .is_some_and(|name| caller_headers.contains(&name));
                if collides {
                    iter.next();
                    continue;
                }
            } else if let Some(rest) = token.strip_prefix("-H") {
                let collides =
                    header_name(rest).is_some_and(|name| caller_headers.contains(&name));
                if collides {
                    continue;
                }
            }
            out.push(token.clone());
        }
        out
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with("::") || first_word_is_ci(line, "rem")
}

/// ASCII case-insensitive first-word check: the prefix must be followed by
/// whitespace or end of line, so `remote\curl.exe` is not a `rem` comment.
fn first_word_is_ci(line: &str, word: &str) -> bool {
    line.len() >= word.len()
        && line.is_char_boundary(word.len())
        && line[..word.len()].eq_ignore_ascii_case(word)
        && line[word.len()..].chars().next().map_or(true, char::is_whitespace)
}

/// Split the first (possibly quoted) token off `line`; return it with
/// quotes stripped together with the rest of the line, when the token
/// references `binary_name`.
fn split_invocation<'a>(line: &'a str, binary_name: &str) -> Option<(String, &'a str)> {
    let line = line.trim_start();
    let mut in_quote = false;
    let mut end = line.len();
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quote = !in_quote,
            c if c.is_whitespace() && !in_quote => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    let token = line[..end].trim_matches('"');
    if references_binary(token, binary_name) {
        Some((token.to_string(), &line[end..]))
    } else {
        None
    }
}

/// Check whether an invocation token refers to the expected executable,
/// tolerating `%~dp0`/path prefixes and a missing `.exe` suffix.
fn references_binary(token: &str, binary_name: &str) -> bool {
    let tail = token.strip_prefix("%~dp0").unwrap_or(token);
    let base = tail.rsplit(['/', '\\']).next().unwrap_or(tail);
    strip_exe(base).eq_ignore_ascii_case(strip_exe(binary_name))
}

fn strip_exe(name: &str) -> &str {
    let len = name.len();
    if len >= 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".exe")
    {
        &name[..len - 4]
    } else {
        name
    }
}

/// Remove the trailing continuation caret, reporting whether the line
/// continues onto the next one.
fn strip_continuation(line: &str) -> (&str, bool) {
    let line = line.trim_end();
    match line.strip_suffix(CONTINUATION) {
        Some(rest) => (rest, true),
        None => (line, false),
    }
}

/// Append one physical-line piece to the logical argument string: a single
/// joining space outside quoted spans, direct concatenation inside.
///
/// Quote tracking follows the same rules as [`tokenize`] (single and
/// double quotes, closed only by the matching character), so a quoted
/// value spanning physical lines reassembles the same way it tokenizes.
fn append_piece(logical: &mut String, piece: &str, quote: &mut Option<char>) {
    let piece = if quote.is_some() { piece } else { piece.trim() };
    if piece.is_empty() {
        return;
    }
    if !logical.is_empty() && quote.is_none() {
        logical.push(' ');
    }
    logical.push_str(piece);
    for c in piece.chars() {
        match *quote {
            Some(q) if c == q => *quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => *quote = Some(c),
            None => {}
        }
    }
}

/// Split a logical argument string into tokens, honoring single and double
/// quoting: an unescaped quote toggles quoted mode, and whitespace inside
/// quoted mode is part of the token.
fn tokenize(logical: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut has_content = false;
    let mut quote: Option<char> = None;

    for c in logical.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    has_content = true;
                }
                c if c.is_whitespace() => {
                    if has_content {
                        tokens.push(std::mem::take(&mut current));
                        has_content = false;
                    }
                }
                _ => {
                    current.push(c);
                    has_content = true;
                }
            },
        }
    }
    if has_content {
        tokens.push(current);
    }
    tokens
}
