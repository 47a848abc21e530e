// src/cli/handlers/macros.rs

//! `macro add|list|run|delete|clear`.

use anyhow::{Result, bail};
use colored::*;

use crate::{
    cli::{dispatcher::BuiltinVerbs, handlers::commons},
    core::{lexer, resolver},
    models::{ActionOutcome, Mode, Segment},
    session::Session,
};

/// `macro add|list|delete|clear`. `macro run` never reaches this handler:
/// it is expanded while the line is planned.
pub fn handle(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let Some(sub) = segment.arg(0) else {
        return Err(commons::usage("macro"));
    };

    match sub.text.to_lowercase().as_str() {
        "add" => add(session, segment.tail(2)),
        "list" | "ls" => Ok(list(session)),
        "delete" | "del" | "remove" => {
            let name = commons::required_arg(segment, 1, "macro")?;
            delete(session, &name.text)
        }
        "clear" => clear(session, mode),
        _ => Err(commons::usage("macro")),
    }
}

fn add(session: &mut Session, definition: &str) -> Result<ActionOutcome> {
    let Some((raw_name, body)) = commons::split_definition(definition) else {
        return Err(commons::usage("macro"));
    };
    let name = resolver::validate_user_name(raw_name, &BuiltinVerbs)?;
    let steps = lexer::split_chain(body)?;
    // Every step must at least tokenize; resolution happens at run time.
    for step in &steps {
        lexer::tokenize(step)?;
    }

    let count = steps.len();
    let replaced = session.macros.insert(&name, steps).is_some();
    log::info!("Saved macro '{}' ({} steps)", name, count);

    let verb = if replaced { "updated" } else { "saved" };
    Ok(ActionOutcome::done(format!(
        "Macro '{}' {} ({} step{}).",
        name,
        verb,
        count,
        if count == 1 { "" } else { "s" }
    )))
}

fn list(session: &Session) -> ActionOutcome {
    if session.macros().is_empty() {
        return ActionOutcome::done("No macros defined.");
    }
    let lines: Vec<String> = session
        .macros()
        .iter()
        .map(|(name, body)| format!("  {} = {}", name.cyan(), body.join("; ")))
        .collect();
    ActionOutcome::done(format!("Macros ({}):\n{}", lines.len(), lines.join("\n")))
}

fn delete(session: &mut Session, name: &str) -> Result<ActionOutcome> {
    if session.macros.remove(name).is_none() {
        bail!("No macro named '{}'.", name);
    }
    log::info!("Deleted macro '{}'", name);
    Ok(ActionOutcome::done(format!("Macro '{}' deleted.", name.to_lowercase())))
}

fn clear(session: &mut Session, mode: Mode) -> Result<ActionOutcome> {
    let effect = format!("CLEARED {} macro(s)", session.macros().len());
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }
    let removed = session.macros.clear();
    log::info!("Cleared {} macros", removed);
    Ok(ActionOutcome::done(format!("Removed {} macro(s).", removed)).with_effect(effect))
}

#[cfg(test)]
mod tests {
    use crate::core::safety::ScriptedConfirmer;
    use crate::session::Session;
    use tempfile::tempdir;

    fn session(dir: &std::path::Path) -> Session {
        Session::in_memory(dir, Box::new(ScriptedConfirmer::default()))
    }

    #[test]
    fn test_add_splits_the_body_and_lowercases_the_name() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());

        let report = session
            .run_line("macro add Demo = create folder 'T' in '.'; create file 'f.txt' in 'T'")
            .unwrap();

        assert_eq!(report.executed, 1);
        assert_eq!(
            session.macros().get("demo"),
            Some(&vec![
                "create folder 'T' in '.'".to_string(),
                "create file 'f.txt' in 'T'".to_string()
            ])
        );
    }

    #[test]
    fn test_add_rejects_builtin_names_and_bad_bodies() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());

        assert_eq!(session.run_line("macro add delete = pwd").unwrap().failed, 1);
        assert_eq!(session.run_line("macro add 'quoted' = pwd").unwrap().failed, 1);
        assert_eq!(session.run_line("macro add empty =").unwrap().failed, 1);
        assert_eq!(session.run_line("macro add broken = pwd;;pwd").unwrap().failed, 1);
        assert!(session.macros().is_empty());
    }

    #[test]
    fn test_delete_and_clear() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());
        session.run_line("macro add a = pwd").unwrap();
        session.run_line("macro add b = pwd").unwrap();
        session.run_line("macro add c = pwd").unwrap();

        assert_eq!(session.run_line("macro delete A").unwrap().failed, 0);
        assert_eq!(session.run_line("macro delete a").unwrap().failed, 1);
        // `clear` is irreversible: declined by the scripted confirmer.
        assert_eq!(session.run_line("macro clear").unwrap().skipped, 1);
        assert_eq!(session.macros().len(), 2);

        session.run_line("batch on; macro clear").unwrap();
        assert!(session.macros().is_empty());
    }

    #[test]
    fn test_clear_under_dry_run_keeps_every_macro() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());
        session.run_line("macro add a = pwd").unwrap();
        session.run_line("macro add b = pwd; home").unwrap();

        let report = session.run_line("batch on; dry-run on; macro clear").unwrap();

        assert_eq!(report.failed, 0);
        assert_eq!(session.macros().len(), 2);
        assert!(report.outcomes().last().is_some_and(|o| o.simulated));
    }

    #[test]
    fn test_placeholders_are_stored_verbatim() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());

        session.run_line("macro add stamp = echo '%NOW%'").unwrap();

        assert_eq!(
            session.macros().get("stamp"),
            Some(&vec!["echo '%NOW%'".to_string()])
        );
    }
}
