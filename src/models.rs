// src/models.rs

//! Types shared by the lexer, the resolver and the handlers.

use serde::{Deserialize, Serialize};
use std::fmt;

// --- COMMAND SEGMENT MODELS ---

/// How an argument token was written by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// An unquoted word.
    Bare,
    /// A single-quoted region, conventionally a filesystem path.
    QuotedPath,
    /// A double-quoted region, conventionally free text.
    QuotedLiteral,
}

/// One argument token of a command segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    /// How the token was written.
    pub kind: ArgKind,
    /// Token text without quotes.
    pub text: String,
}

impl Arg {
    /// An unquoted word.
    pub fn bare(text: impl Into<String>) -> Self {
        Self {
            kind: ArgKind::Bare,
            text: text.into(),
        }
    }

    /// A single-quoted path.
    pub fn path(text: impl Into<String>) -> Self {
        Self {
            kind: ArgKind::QuotedPath,
            text: text.into(),
        }
    }

    /// A double-quoted literal.
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            kind: ArgKind::QuotedLiteral,
            text: text.into(),
        }
    }

    /// True for single- or double-quoted tokens.
    pub fn is_quoted(&self) -> bool {
        self.kind != ArgKind::Bare
    }

    /// True when the token is the unquoted word `word` (case-insensitive).
    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == ArgKind::Bare && self.text.eq_ignore_ascii_case(word)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ArgKind::Bare => write!(f, "{}", self.text),
            ArgKind::QuotedPath => write!(f, "'{}'", self.text),
            ArgKind::QuotedLiteral => write!(f, "\"{}\"", self.text),
        }
    }
}

/// A `key=value` token following the verb (e.g. `text="hello"`, `head=5`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedOperator {
    /// Lowercased key.
    pub key: String,
    /// The value after `=`.
    pub value: Arg,
}

/// A single logical instruction produced by the lexer. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The trimmed source text of the segment.
    pub raw: String,
    /// The first token (the verb, or a lone path literal).
    pub head: Arg,
    /// Positional arguments, in source order.
    pub args: Vec<Arg>,
    /// Named operators, in source order.
    pub operators: Vec<NamedOperator>,
    /// Byte offset in `raw` where each token starts (head first, source order).
    pub(crate) token_starts: Vec<usize>,
}

impl Segment {
    /// The lowercased verb used for registry lookup, without a leading `/`.
    /// Quoted heads never name a verb.
    pub fn verb(&self) -> Option<String> {
        if self.head.is_quoted() {
            return None;
        }
        let verb = self.head.text.trim_start_matches('/');
        if verb.is_empty() {
            None
        } else {
            Some(verb.to_lowercase())
        }
    }

    /// Positional argument at `position`.
    pub fn arg(&self, position: usize) -> Option<&Arg> {
        self.args.get(position)
    }

    /// Looks up a named operator by (case-insensitive) key.
    pub fn operator(&self, key: &str) -> Option<&Arg> {
        self.operators
            .iter()
            .find(|op| op.key.eq_ignore_ascii_case(key))
            .map(|op| &op.value)
    }

    /// Returns the argument that directly follows the bare keyword `keyword`.
    pub fn after_keyword(&self, keyword: &str) -> Option<&Arg> {
        let position = self.args.iter().position(|a| a.is_keyword(keyword))?;
        self.args.get(position + 1)
    }

    /// True when the segment is a single token with no arguments.
    pub fn is_single_token(&self) -> bool {
        self.args.is_empty() && self.operators.is_empty()
    }

    /// The raw source text starting at token `index` (0 = head), trimmed.
    /// Returns an empty string past the last token.
    pub fn tail(&self, index: usize) -> &str {
        self.token_starts
            .get(index)
            .and_then(|start| self.raw.get(*start..))
            .map(str::trim)
            .unwrap_or("")
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

// --- ACTION MODELS ---

/// The risk level a handler declares for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Never prompts.
    None,
    /// May replace existing data.
    OverwriteRisk,
    /// Cannot be undone.
    Irreversible,
}

impl Classification {
    /// True for anything that needs confirmation.
    pub fn is_destructive(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::OverwriteRisk => "overwrite-risk",
            Self::Irreversible => "irreversible",
        };
        write!(f, "{}", label)
    }
}

/// Whether a handler performs its effects or only reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Perform the effects.
    Execute,
    /// Describe the effects without performing them.
    Simulate,
}

/// The successful result of one action handler invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Text shown to the user.
    pub message: String,
    /// One line per mutation performed (or, when simulated, that would be performed).
    pub side_effects: Vec<String>,
    /// True when produced under dry-run.
    pub simulated: bool,
}

impl ActionOutcome {
    /// A completed action with no side effect to journal.
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// An outcome for `Mode::Simulate` describing the effect that was skipped.
    pub fn simulated(effect: impl Into<String>) -> Self {
        let effect = effect.into();
        Self {
            message: format!("DRY-RUN {}", effect),
            side_effects: vec![effect],
            simulated: true,
        }
    }

    /// Like [`ActionOutcome::simulated`] for several effects, one line each.
    pub fn simulated_all(effects: Vec<String>) -> Self {
        let lines: Vec<String> = effects.iter().map(|e| format!("DRY-RUN {}", e)).collect();
        Self {
            message: lines.join("\n"),
            side_effects: effects,
            simulated: true,
        }
    }

    /// Adds a side effect for the journal.
    pub fn with_effect(mut self, effect: impl Into<String>) -> Self {
        self.side_effects.push(effect.into());
        self
    }
}

// --- PATH INDEX MODELS ---

/// One scanned filesystem object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// `/`-separated, no duplicate separators, no trailing separator unless a root.
    pub path: String,
    /// True for directories.
    pub is_dir: bool,
    /// Byte size, files only.
    pub size: Option<u64>,
    /// Modification time in seconds since the Unix epoch.
    pub modified: Option<u64>,
}
