// src/cli/handlers/commons.rs

//! Argument and path helpers shared by the handlers.

// Shared helpers for the built-in handlers.

use anyhow::{Result, anyhow, bail};
use std::path::{Path, PathBuf};

use crate::{
    cli::dispatcher,
    models::{Arg, Segment},
    session::Session,
};

/// A usage error for `verb`, built from its registry entry.
pub fn usage(verb: &str) -> anyhow::Error {
    match dispatcher::find_command(verb) {
        Some(command) => anyhow!("Usage: {}", command.usage),
        None => anyhow!("Unknown command '{}'", verb),
    }
}

/// The positional argument at `position`, or the usage of `verb`.
pub fn required_arg<'a>(segment: &'a Segment, position: usize, verb: &str) -> Result<&'a Arg> {
    segment.arg(position).ok_or_else(|| usage(verb))
}

/// The argument following the bare `keyword`, or the usage of `verb`.
pub fn keyword_arg<'a>(segment: &'a Segment, keyword: &str, verb: &str) -> Result<&'a Arg> {
    segment.after_keyword(keyword).ok_or_else(|| usage(verb))
}

/// Resolves the argument after `keyword`, defaulting to the working directory.
pub fn dir_after_keyword(session: &Session, segment: &Segment, keyword: &str) -> PathBuf {
    segment
        .after_keyword(keyword)
        .map_or_else(|| session.cwd().to_path_buf(), |arg| session.resolve_path(&arg.text))
}

/// User-facing form of a path.
pub fn display(path: &Path) -> String {
    dunce::simplified(path).display().to_string()
}

/// Fails with "Not found" when nothing exists at `path`.
pub fn require_exists(path: &Path) -> Result<()> {
    if path.symlink_metadata().is_err() {
        bail!("Not found: {}", display(path));
    }
    Ok(())
}

/// Fails unless `path` is an existing directory.
pub fn require_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        bail!("Not a directory: {}", display(path));
    }
    Ok(())
}

/// The last component of `path`, as the name it keeps when moved or copied.
pub fn file_name(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name()
        .ok_or_else(|| anyhow!("'{}' has no file name", display(path)))
}

/// `1536` -> `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS.iter().skip(1) {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    if unit == "B" {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, unit)
    }
}

/// Parses a whole number of seconds (or lines, or results).
pub fn parse_count(arg: &Arg, what: &str) -> Result<u64> {
    arg.text
        .trim()
        .parse::<u64>()
        .map_err(|_| anyhow!("Invalid {} '{}': expected a whole number.", what, arg.text))
}

/// Free text following the verb: a single quoted argument is unwrapped,
/// anything else is taken verbatim.
pub fn free_text(segment: &Segment, from_token: usize) -> String {
    let tail = segment.tail(from_token);
    unquote(tail).to_string()
}

/// Strips one pair of matching outer quotes.
pub fn unquote(text: &str) -> &str {
    let trimmed = text.trim();
    for quote in ['\'', '"'] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            if !inner.contains(quote) {
                return inner;
            }
        }
    }
    trimmed
}

/// Splits `name [=] body` as used by `macro add` and `alias add`.
pub fn split_definition(text: &str) -> Option<(&str, &str)> {
    let text = text.trim();
    let name_end = text
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(text.len());
    let (name, rest) = text.split_at(name_end);
    let rest = rest.trim_start();
    let body = rest.strip_prefix('=').unwrap_or(rest).trim();
    if name.is_empty() || body.is_empty() {
        return None;
    }
    Some((name, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_split_definition() {
        assert_eq!(split_definition("ll = list"), Some(("ll", "list")));
        assert_eq!(split_definition("ll list 'x'"), Some(("ll", "list 'x'")));
        assert_eq!(split_definition("demo=pwd; echo 'a'"), Some(("demo", "pwd; echo 'a'")));
        assert_eq!(split_definition("lonely ="), None);
        assert_eq!(split_definition(""), None);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'Done!'"), "Done!");
        assert_eq!(unquote("\"tea\""), "tea");
        assert_eq!(unquote("'a' and 'b'"), "'a' and 'b'");
        assert_eq!(unquote("plain words"), "plain words");
    }
}
