// src/core/lexer.rs

//! Turns raw input into command segments.
//!
//! Two stages live here:
//!
//! - **Chain splitting** (`split_chain`, `split_line`): a line is cut on `;`
//!   wherever the separator is outside a single- or double-quoted region.
//! - **Tokenizing** (`tokenize`): one segment becomes a [`Segment`] made of a
//!   head token, positional arguments and `key=value` operators.

use crate::constants::CHAIN_SEPARATOR;
use crate::core::errors::CmcError;
use crate::models::{Arg, ArgKind, NamedOperator, Segment};

/// Lines whose first words match one of these are kept as a single segment.
/// Their handlers interpret the separators themselves.
const GREEDY_PREFIXES: &[&[&str]] = &[&["macro", "add"], &["alias", "add"], &["timer"]];

// ============================================================================
// Chain splitting
// ============================================================================

/// Splits a raw line into trimmed segment strings.
///
/// An empty (or whitespace-only) line yields no segments.
///
/// # Errors
/// Returns `CmcError::Syntax` for an unterminated quote, a leading or
/// trailing separator, or an empty segment between two separators.
pub fn split_chain(line: &str) -> Result<Vec<String>, CmcError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in trimmed.chars() {
        match quote {
            Some(open) => {
                if ch == open {
                    quote = None;
                }
                current.push(ch);
            }
            None if ch == CHAIN_SEPARATOR => {
                let segment = current.trim();
                if segment.is_empty() {
                    return Err(if segments.is_empty() {
                        CmcError::syntax("line starts with a chain separator")
                    } else {
                        CmcError::syntax("empty command between chain separators")
                    });
                }
                segments.push(segment.to_string());
                current.clear();
            }
            None => {
                if is_quote(ch) {
                    quote = Some(ch);
                }
                current.push(ch);
            }
        }
    }

    if let Some(open) = quote {
        return Err(CmcError::syntax(format!("unterminated {} quote", open)));
    }

    let last = current.trim();
    if last.is_empty() {
        return Err(CmcError::syntax("line ends with a chain separator"));
    }
    segments.push(last.to_string());

    Ok(segments)
}

/// Splits a line the way the console executes it.
///
/// The whole line is validated by [`split_chain`] first. Lines starting with
/// `macro add`, `alias add` or `timer` are then returned as one segment.
pub fn split_line(line: &str) -> Result<Vec<String>, CmcError> {
    let segments = split_chain(line)?;
    if segments.len() > 1 && is_greedy(line) {
        return Ok(vec![line.trim().to_string()]);
    }
    Ok(segments)
}

/// True for lines handled whole by their command (`macro add`, `alias add`,
/// `timer`). Their text is expanded when the command runs, not when planned.
pub fn is_greedy(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().take(2).collect();
    GREEDY_PREFIXES.iter().any(|prefix| {
        prefix.len() <= words.len()
            && prefix
                .iter()
                .zip(&words)
                .all(|(expected, word)| word.eq_ignore_ascii_case(expected))
    })
}

fn is_quote(ch: char) -> bool {
    ch == '\'' || ch == '"'
}

// ============================================================================
// Tokenizing
// ============================================================================

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos..)?.chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Reads a quoted region; the cursor must be on the opening quote.
    fn read_quoted(&mut self) -> Result<Arg, CmcError> {
        let open = self.bump().unwrap_or('\'');
        let start = self.pos;
        loop {
            match self.bump() {
                Some(ch) if ch == open => break,
                Some(_) => {}
                None => return Err(CmcError::syntax(format!("unterminated {} quote", open))),
            }
        }
        let text = self.input.get(start..self.pos - 1).unwrap_or("");
        let kind = if open == '"' {
            ArgKind::QuotedLiteral
        } else {
            ArgKind::QuotedPath
        };
        Ok(Arg {
            kind,
            text: text.to_string(),
        })
    }

    /// Reads an unquoted word, stopping at whitespace or a quote.
    fn read_bare(&mut self) -> &'a str {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|ch| !ch.is_whitespace() && !is_quote(ch))
        {
            self.bump();
        }
        self.input.get(start..self.pos).unwrap_or("")
    }
}

enum Token {
    Arg(Arg),
    Operator(NamedOperator),
}

/// Splits `key=value` when `key` is a plain identifier.
fn split_operator(word: &str) -> Option<(String, &str)> {
    let (key, value) = word.split_once('=')?;
    let mut chars = key.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then(|| (key.to_lowercase(), value))
}

/// Tokenizes one (already variable-expanded) segment.
///
/// # Errors
/// Returns `CmcError::Syntax` for an empty segment or an unterminated quote.
pub fn tokenize(text: &str) -> Result<Segment, CmcError> {
    let raw = text.trim();
    let mut lexer = Lexer::new(raw);

    let mut head: Option<Arg> = None;
    let mut args = Vec::new();
    let mut operators = Vec::new();
    let mut token_starts = Vec::new();

    loop {
        lexer.skip_whitespace();
        let start = lexer.pos;
        let Some(ch) = lexer.peek() else { break };

        let token = if is_quote(ch) {
            Token::Arg(lexer.read_quoted()?)
        } else {
            let word = lexer.read_bare();
            if head.is_none() {
                Token::Arg(Arg::bare(word))
            } else {
                match split_operator(word) {
                    Some((key, "")) if lexer.peek().is_some_and(is_quote) => {
                        Token::Operator(NamedOperator {
                            key,
                            value: lexer.read_quoted()?,
                        })
                    }
                    Some((key, value)) if !value.is_empty() => Token::Operator(NamedOperator {
                        key,
                        value: Arg::bare(value),
                    }),
                    _ => Token::Arg(Arg::bare(word)),
                }
            }
        };

        token_starts.push(start);
        match token {
            Token::Arg(arg) if head.is_none() => head = Some(arg),
            Token::Arg(arg) => args.push(arg),
            Token::Operator(op) => operators.push(op),
        }
    }

    let head = head.ok_or_else(|| CmcError::syntax("empty command"))?;
    log::trace!("Tokenized '{}' -> head {:?}, {} args", raw, head, args.len());

    Ok(Segment {
        raw: raw.to_string(),
        head,
        args,
        operators,
        token_starts,
    })
}
