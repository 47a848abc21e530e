// src/cli/handlers/alias.rs

//! `alias add|list|delete|clear`.

use anyhow::{Result, bail};
use colored::*;

use crate::{
    cli::{dispatcher::BuiltinVerbs, handlers::commons},
    core::{lexer, resolver::{self, VerbTable}},
    models::{ActionOutcome, Mode, Segment},
    session::Session,
};

/// `alias add|list|delete|clear`. `alias run` is expanded at plan time.
pub fn handle(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let Some(sub) = segment.arg(0) else {
        return Err(commons::usage("alias"));
    };

    match sub.text.to_lowercase().as_str() {
        "add" => add(session, segment.tail(2)),
        "list" | "ls" => Ok(list(session)),
        "delete" | "del" | "remove" => {
            let name = commons::required_arg(segment, 1, "alias")?;
            if session.aliases.remove(&name.text).is_none() {
                bail!("No alias named '{}'.", name.text);
            }
            log::info!("Deleted alias '{}'", name.text);
            Ok(ActionOutcome::done(format!(
                "Alias '{}' deleted.",
                name.text.to_lowercase()
            )))
        }
        "clear" => clear(session, mode),
        _ => Err(commons::usage("alias")),
    }
}

/// Validates and stores `name [=] target`.
///
/// The target is exactly one segment and must start with a built-in verb,
/// so an alias can never expand into another alias or a chain.
fn add(session: &mut Session, definition: &str) -> Result<ActionOutcome> {
    let Some((raw_name, target)) = commons::split_definition(definition) else {
        return Err(commons::usage("alias"));
    };
    let name = resolver::validate_user_name(raw_name, &BuiltinVerbs)?;

    if lexer::split_chain(target)?.len() > 1 {
        bail!("An alias expands to exactly one command; use a macro for chains.");
    }
    let parsed = lexer::tokenize(target)?;
    let verb = parsed.verb().unwrap_or_default();
    let Some(canonical) = BuiltinVerbs.canonical(&verb) else {
        bail!(
            "Alias target must start with a built-in command, not '{}'.",
            parsed.head.text
        );
    };
    if canonical == "alias" && parsed.arg(0).is_some_and(|sub| sub.is_keyword("run")) {
        bail!("An alias cannot run another alias.");
    }

    let replaced = session.aliases.insert(&name, target.to_string()).is_some();
    log::info!("Saved alias '{}' -> '{}'", name, target);
    Ok(ActionOutcome::done(format!(
        "Alias '{}' {} → {}",
        name,
        if replaced { "updated" } else { "saved" },
        target
    )))
}

fn clear(session: &mut Session, mode: Mode) -> Result<ActionOutcome> {
    let effect = format!("CLEARED {} alias(es)", session.aliases().len());
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }
    let removed = session.aliases.clear();
    log::info!("Cleared {} aliases", removed);
    Ok(ActionOutcome::done(format!("Removed {} alias(es).", removed)).with_effect(effect))
}

fn list(session: &Session) -> ActionOutcome {
    if session.aliases().is_empty() {
        return ActionOutcome::done("No aliases defined.");
    }
    let lines: Vec<String> = session
        .aliases()
        .iter()
        .map(|(name, target)| format!("  {} → {}", name.cyan(), target))
        .collect();
    ActionOutcome::done(format!("Aliases ({}):\n{}", lines.len(), lines.join("\n")))
}
