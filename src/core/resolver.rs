// src/core/resolver.rs

//! Decides what a segment names: a built-in, an alias, a macro or a path to open.

use crate::core::errors::CmcError;
use crate::core::store::{AliasStore, MacroStore};
use crate::models::{Arg, Segment};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref USER_NAME_RE: Regex =
        Regex::new(r"^[A-Za-z0-9_-]+$").expect("user name pattern is a valid regex");
}

/// The table of built-in verbs, as seen by the resolver.
pub trait VerbTable {
    /// Returns the canonical verb for `verb` (already lowercased), if it is a built-in.
    fn canonical(&self, verb: &str) -> Option<&'static str>;
}

/// What a command segment refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A built-in command.
    Builtin {
        /// Canonical verb.
        verb: &'static str,
        /// The segment as typed.
        segment: Segment,
    },
    /// A user alias; extra words are appended to its target.
    Alias {
        /// Lowercased alias name.
        name: String,
        /// The segment as typed.
        segment: Segment,
    },
    /// A user macro.
    Macro {
        /// Lowercased macro name.
        name: String,
        /// The segment as typed.
        segment: Segment,
    },
    /// A lone path to open.
    PathLiteral(String),
}

/// Classifies one tokenized segment.
///
/// Order: built-in verb, alias, macro, lone path-like token. Lookups are
/// case-insensitive.
///
/// # Errors
/// Returns `CmcError::UnknownCommand` when nothing matches.
pub fn resolve(
    segment: Segment,
    verbs: &dyn VerbTable,
    aliases: &AliasStore,
    macros: &MacroStore,
) -> Result<Resolution, CmcError> {
    if let Some(verb) = segment.verb() {
        if let Some(canonical) = verbs.canonical(&verb) {
            return Ok(Resolution::Builtin {
                verb: canonical,
                segment,
            });
        }
        if aliases.contains(&verb) {
            return Ok(Resolution::Alias {
                name: verb,
                segment,
            });
        }
        if macros.contains(&verb) {
            return Ok(Resolution::Macro {
                name: verb,
                segment,
            });
        }
    }

    if segment.is_single_token() && is_path_like(&segment.head) {
        return Ok(Resolution::PathLiteral(segment.head.text));
    }

    Err(CmcError::UnknownCommand(segment.raw))
}

/// Quoted tokens always count as paths; bare ones need a path shape.
fn is_path_like(arg: &Arg) -> bool {
    let text = arg.text.trim();
    if text.is_empty() {
        return false;
    }
    if arg.is_quoted() {
        return true;
    }
    let has_drive = text.len() >= 2 && text.as_bytes().get(1) == Some(&b':');
    let has_extension = text
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty());
    text.contains('/')
        || text.contains('\\')
        || text.starts_with('~')
        || text.starts_with('.')
        || has_drive
        || has_extension
}

/// Reasons a macro or alias name is refused at creation time.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NameError {
    /// No name was given.
    #[error("A name is required.")]
    Empty,
    /// The name is not a single word of letters, digits, `_` or `-`.
    #[error("Invalid name '{0}': use a single word of letters, digits, '_' or '-'.")]
    InvalidChars(String),
    /// The name would shadow a built-in verb.
    #[error("'{0}' is a built-in command and cannot be redefined.")]
    ReservedVerb(String),
}

/// Validates a user-defined name and returns its lowercase form.
pub fn validate_user_name(raw: &str, verbs: &dyn VerbTable) -> Result<String, NameError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if !USER_NAME_RE.is_match(name) {
        return Err(NameError::InvalidChars(name.to_string()));
    }
    let lower = name.to_lowercase();
    if verbs.canonical(&lower).is_some() {
        return Err(NameError::ReservedVerb(lower));
    }
    Ok(lower)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::lexer::tokenize;
    use crate::core::store::NamedStore;

    /// A tiny verb table for resolver-level tests.
    pub(crate) struct TestVerbs;

    impl VerbTable for TestVerbs {
        fn canonical(&self, verb: &str) -> Option<&'static str> {
            match verb {
                "pwd" => Some("pwd"),
                "echo" => Some("echo"),
                "delete" | "del" => Some("delete"),
                "macro" => Some("macro"),
                "alias" => Some("alias"),
                "open" => Some("open"),
                _ => None,
            }
        }
    }

    fn stores() -> (AliasStore, MacroStore) {
        let mut aliases = NamedStore::in_memory();
        aliases.insert("ll", "echo listing".to_string());
        let mut macros = NamedStore::in_memory();
        macros.insert("Deploy", vec!["pwd".to_string()]);
        macros.insert("ll", vec!["pwd".to_string()]);
        (aliases, macros)
    }

    fn run(text: &str) -> Result<Resolution, CmcError> {
        let (aliases, macros) = stores();
        resolve(tokenize(text).unwrap(), &TestVerbs, &aliases, &macros)
    }

    #[test]
    fn test_builtins_win_and_are_case_insensitive() {
        let resolution = run("DEL 'x.txt'").unwrap();
        assert!(matches!(resolution, Resolution::Builtin { verb: "delete", .. }));
    }

    #[test]
    fn test_alias_is_checked_before_macro() {
        assert!(matches!(run("LL").unwrap(), Resolution::Alias { name, .. } if name == "ll"));
        assert!(matches!(run("deploy").unwrap(), Resolution::Macro { name, .. } if name == "deploy"));
    }

    #[test]
    fn test_lone_paths_become_path_literals() {
        assert_eq!(
            run("'My Documents'").unwrap(),
            Resolution::PathLiteral("My Documents".into())
        );
        assert_eq!(
            run("notes.txt").unwrap(),
            Resolution::PathLiteral("notes.txt".into())
        );
        assert_eq!(run("~/bin").unwrap(), Resolution::PathLiteral("~/bin".into()));
    }

    #[test]
    fn test_unknown_words_fail() {
        assert_eq!(
            run("frobnicate now"),
            Err(CmcError::UnknownCommand("frobnicate now".into()))
        );
        assert!(run("frobnicate").is_err());
        // Paths with trailing arguments are not path literals.
        assert!(run("'a.txt' extra").is_err());
    }

    #[test]
    fn test_name_validation() {
        assert_eq!(validate_user_name("My-Macro_2", &TestVerbs), Ok("my-macro_2".into()));
        assert_eq!(
            validate_user_name("Echo", &TestVerbs),
            Err(NameError::ReservedVerb("echo".into()))
        );
        assert_eq!(
            validate_user_name("del", &TestVerbs),
            Err(NameError::ReservedVerb("del".into()))
        );
        assert!(matches!(
            validate_user_name("two words", &TestVerbs),
            Err(NameError::InvalidChars(_))
        ));
        assert_eq!(validate_user_name("  ", &TestVerbs), Err(NameError::Empty));
    }
}
