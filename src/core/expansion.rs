// src/core/expansion.rs

//! Turns one input line into a flat, ordered list of built-in invocations.
//!
//! Every segment goes through variable expansion, tokenizing and resolution.
//! Aliases and macros are replaced in place by what they stand for:
//!
//! - an alias yields exactly one segment (its target plus any extra words),
//!   which is resolved once more and may not be another alias;
//! - a macro yields its body, each element re-entering the pipeline from
//!   variable expansion, so `%NOW%` reflects the time the macro runs.
//!
//! An explicit expansion stack records the aliases and macros currently
//! being expanded; meeting one of them again is a cycle error. Planning
//! finishes before anything runs, so resolution errors never leave a line
//! half-executed.

use crate::core::errors::CmcError;
use crate::core::lexer;
use crate::core::resolver::{self, Resolution, VerbTable};
use crate::core::store::{AliasStore, MacroStore};
use crate::core::variables::RuntimeVariables;
use crate::models::{Arg, Segment};
use std::borrow::Cow;

/// Built-in verb that path literals are dispatched to.
pub const OPEN_VERB: &str = "open";

/// Read-only view of everything needed to resolve a line.
pub struct PlanContext<'a> {
    /// Built-in verb lookup.
    pub verbs: &'a dyn VerbTable,
    /// User aliases.
    pub aliases: &'a AliasStore,
    /// User macros.
    pub macros: &'a MacroStore,
    /// Values for `%DATE%`, `%NOW%` and `%HOME%`.
    pub variables: &'a RuntimeVariables,
}

/// Where a planned step came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Typed on the line (directly or through an alias).
    Line,
    /// Part of the body of the named macro (innermost macro wins).
    Macro(String),
}

impl Origin {
    /// True for steps taken from a macro body.
    pub fn is_macro(&self) -> bool {
        matches!(self, Self::Macro(_))
    }
}

/// One built-in invocation ready for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    /// Canonical built-in verb.
    pub verb: &'static str,
    /// Arguments with aliases and variables expanded.
    pub segment: Segment,
    /// Where the step came from.
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Alias(String),
    Macro(String),
}

impl Frame {
    fn label(&self) -> String {
        match self {
            Self::Alias(name) => format!("alias {}", name),
            Self::Macro(name) => format!("macro {}", name),
        }
    }
}

/// The aliases and macros currently being expanded, outermost first.
#[derive(Debug, Default)]
struct ExpansionStack {
    frames: Vec<Frame>,
}

impl ExpansionStack {
    fn contains(&self, frame: &Frame) -> bool {
        self.frames.contains(frame)
    }

    fn chain_with(&self, frame: &Frame) -> Vec<String> {
        self.frames
            .iter()
            .chain(std::iter::once(frame))
            .map(Frame::label)
            .collect()
    }
}

/// `macro run <name>` and `alias run <name>` are expanded during planning.
enum Directive {
    RunMacro(String),
    RunAlias(String),
}

fn directive(verb: &str, segment: &Segment) -> Option<Directive> {
    if !segment.arg(0).is_some_and(|a| a.is_keyword("run")) {
        return None;
    }
    let name = segment.arg(1)?.text.to_lowercase();
    match verb {
        "macro" => Some(Directive::RunMacro(name)),
        "alias" => Some(Directive::RunAlias(name)),
        _ => None,
    }
}

/// Plans a full input line.
///
/// # Errors
/// Any syntax, resolution or cycle error; no step is returned in that case.
pub fn plan_line(line: &str, ctx: &PlanContext<'_>) -> Result<Vec<PlannedStep>, CmcError> {
    let mut steps = Vec::new();
    let mut stack = ExpansionStack::default();
    for text in lexer::split_line(line)? {
        plan_segment(&text, &Origin::Line, ctx, &mut stack, &mut steps, false)?;
    }
    log::debug!("Planned '{}' into {} step(s)", line.trim(), steps.len());
    Ok(steps)
}

fn plan_segment(
    text: &str,
    origin: &Origin,
    ctx: &PlanContext<'_>,
    stack: &mut ExpansionStack,
    out: &mut Vec<PlannedStep>,
    from_alias: bool,
) -> Result<(), CmcError> {
    let expanded = if lexer::is_greedy(text) {
        Cow::Borrowed(text)
    } else {
        ctx.variables.expand(text)
    };
    let segment = lexer::tokenize(&expanded)?;
    let resolution = resolver::resolve(segment, ctx.verbs, ctx.aliases, ctx.macros)?;

    match resolution {
        Resolution::Builtin { verb, segment } => match directive(verb, &segment) {
            Some(Directive::RunMacro(name)) => expand_macro(&name, ctx, stack, out),
            Some(Directive::RunAlias(name)) => {
                if from_alias {
                    return Err(alias_chain_error(stack, name));
                }
                let extra = segment.tail(3).to_string();
                expand_alias(&name, &extra, origin, ctx, stack, out)
            }
            None => {
                out.push(PlannedStep {
                    verb,
                    segment,
                    origin: origin.clone(),
                });
                Ok(())
            }
        },
        Resolution::Alias { name, segment } => {
            if from_alias {
                return Err(alias_chain_error(stack, name));
            }
            let extra = segment.tail(1).to_string();
            expand_alias(&name, &extra, origin, ctx, stack, out)
        }
        Resolution::Macro { name, .. } => expand_macro(&name, ctx, stack, out),
        Resolution::PathLiteral(path) => {
            let verb = ctx
                .verbs
                .canonical(OPEN_VERB)
                .ok_or_else(|| CmcError::UnknownCommand(path.clone()))?;
            out.push(PlannedStep {
                verb,
                segment: open_segment(path),
                origin: origin.clone(),
            });
            Ok(())
        }
    }
}

fn alias_chain_error(stack: &ExpansionStack, name: String) -> CmcError {
    CmcError::RecursiveAlias {
        chain: stack.chain_with(&Frame::Alias(name)),
    }
}

fn expand_alias(
    name: &str,
    extra: &str,
    origin: &Origin,
    ctx: &PlanContext<'_>,
    stack: &mut ExpansionStack,
    out: &mut Vec<PlannedStep>,
) -> Result<(), CmcError> {
    let frame = Frame::Alias(name.to_string());
    if stack.contains(&frame) {
        return Err(CmcError::RecursiveAlias {
            chain: stack.chain_with(&frame),
        });
    }
    let target = ctx
        .aliases
        .get(name)
        .ok_or_else(|| CmcError::UnknownCommand(format!("alias {}", name)))?;
    let text = if extra.is_empty() {
        target.clone()
    } else {
        format!("{} {}", target, extra)
    };

    log::debug!("Alias '{}' -> '{}'", name, text);
    stack.frames.push(frame);
    let result = plan_segment(&text, origin, ctx, stack, out, true);
    stack.frames.pop();
    result
}

fn expand_macro(
    name: &str,
    ctx: &PlanContext<'_>,
    stack: &mut ExpansionStack,
    out: &mut Vec<PlannedStep>,
) -> Result<(), CmcError> {
    let frame = Frame::Macro(name.to_string());
    if stack.contains(&frame) {
        return Err(CmcError::RecursiveMacro {
            chain: stack.chain_with(&frame),
        });
    }
    let body = ctx
        .macros
        .get(name)
        .ok_or_else(|| CmcError::UnknownCommand(format!("macro {}", name)))?;

    log::debug!("Expanding macro '{}' ({} step(s))", name, body.len());
    stack.frames.push(frame);
    let origin = Origin::Macro(name.to_string());
    let result = body
        .iter()
        .try_for_each(|element| plan_segment(element, &origin, ctx, stack, out, false));
    stack.frames.pop();
    result
}

fn open_segment(path: String) -> Segment {
    let raw = format!("{} '{}'", OPEN_VERB, path);
    Segment {
        raw,
        head: Arg::bare(OPEN_VERB),
        args: vec![Arg::path(path)],
        operators: Vec::new(),
        token_starts: vec![0, OPEN_VERB.len() + 1],
    }
}
