// src/core/errors.rs

//! The error type every chain step reports.

use thiserror::Error;

/// Errors produced while interpreting a command line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CmcError {
    /// Malformed chaining or quoting. Detected before any segment runs.
    #[error("Syntax error: {0}")]
    Syntax(String),
    /// A segment that is neither a built-in, an alias, a macro nor a path.
    #[error("Unknown command: '{0}'")]
    UnknownCommand(String),
    /// Macro expansion revisited a macro already being expanded.
    #[error("Recursive macro detected: {}", .chain.join(" -> "))]
    RecursiveMacro {
        /// The expansion path, ending with the repeated name.
        chain: Vec<String>,
    },
    /// An alias expanded into another alias.
    #[error("Recursive alias detected: {}", .chain.join(" -> "))]
    RecursiveAlias {
        /// The expansion path, ending with the offending name.
        chain: Vec<String>,
    },
    /// The user answered no (or nothing) to a confirmation prompt.
    #[error("Declined: {0}")]
    ConfirmationDeclined(String),
    /// A handler-level failure carrying the handler's own message.
    #[error("{0}")]
    Action(String),
    /// An error the dispatcher policy elected to treat as chain-terminating.
    #[error("Chain aborted: {0}")]
    FatalChain(Box<CmcError>),
}

impl CmcError {
    /// Shorthand for `CmcError::Syntax`.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    /// Wraps `inner` as chain-terminating; already fatal errors are returned as is.
    pub fn fatal(inner: Self) -> Self {
        match inner {
            Self::FatalChain(_) => inner,
            other => Self::FatalChain(Box::new(other)),
        }
    }

    /// Unwraps a `FatalChain` to the error that caused it.
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::FatalChain(inner) => inner.root_cause(),
            other => other,
        }
    }

    /// True for cycle errors raised by macro or alias expansion.
    pub fn is_cycle(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::RecursiveMacro { .. } | Self::RecursiveAlias { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_the_expansion_path() {
        let err = CmcError::RecursiveMacro {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Recursive macro detected: a -> b -> a");
        assert!(err.is_cycle());
    }

    #[test]
    fn test_fatal_does_not_double_wrap() {
        let err = CmcError::fatal(CmcError::fatal(CmcError::Action("boom".into())));
        assert_eq!(err.to_string(), "Chain aborted: boom");
        assert_eq!(err.root_cause(), &CmcError::Action("boom".into()));
    }
}
