// src/cli/handlers/console.rs

//! Session-level built-ins: the safety toggles, `status`, `help`, `exit`,
//! `log` and `undo`.

use anyhow::{Context, Result, bail};
use std::fs;

use crate::{
    cli::{dispatcher, handlers::commons},
    core::safety::{SafetyState, on_off, parse_switch},
    models::{ActionOutcome, Mode, Segment},
    session::Session,
};

/// Reads `on`/`off` and applies it to one flag. Without an argument the
/// current value is reported.
fn toggle(
    session: &mut Session,
    segment: &Segment,
    verb: &str,
    label: &str,
    flag: fn(&mut SafetyState) -> &mut bool,
) -> Result<ActionOutcome> {
    let Some(arg) = segment.arg(0) else {
        let current = *flag(&mut session.safety);
        return Ok(ActionOutcome::done(format!("{}: {}", label, on_off(current))));
    };
    let value = parse_switch(&arg.text).ok_or_else(|| commons::usage(verb))?;
    *flag(&mut session.safety) = value;
    log::debug!("{} set to {}", label, on_off(value));
    Ok(ActionOutcome::done(format!("{} {}", label, on_off(value))))
}

/// `batch on|off`
pub fn batch(session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    toggle(session, segment, "batch", "Batch mode", |s| &mut s.batch)
}

/// `dry-run on|off`
pub fn dry_run(session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    toggle(session, segment, "dry-run", "Dry-run", |s| &mut s.dry_run)
}

/// `ssl on|off`
pub fn ssl(session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    toggle(session, segment, "ssl", "SSL verification", |s| &mut s.ssl_verify)
}

/// `status`: safety flags, working directory and store sizes.
pub fn status(session: &mut Session, _segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let lines = [
        session.safety().summary(),
        format!("Directory: {}", commons::display(session.cwd())),
        format!(
            "Macros: {} | Aliases: {} | Indexed paths: {}",
            session.macros().len(),
            session.aliases().len(),
            session.index().count()
        ),
        format!(
            "Macro failures: {}",
            session.config().session.macro_failure_policy.as_str()
        ),
    ];
    Ok(ActionOutcome::done(lines.join("\n")))
}

/// `help [command]`
pub fn help(_session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    if let Some(topic) = segment.arg(0) {
        let name = topic.text.trim_start_matches('/').to_lowercase();
        let Some(command) = dispatcher::find_command(&name) else {
            bail!("No built-in command named '{}'.", topic.text);
        };
        let mut text = format!("{}\n  {}", command.summary, command.usage);
        if !command.aliases.is_empty() {
            text.push_str(&format!("\n  Also: {}", command.aliases.join(", ")));
        }
        return Ok(ActionOutcome::done(text));
    }

    let mut lines = vec!["Commands (chain with ';', see 'help <command>'):".to_string()];
    lines.extend(
        dispatcher::commands()
            .iter()
            .map(|c| format!("  {:<10} {}", c.name, c.summary)),
    );
    lines.push("Variables: %DATE%, %NOW%, %HOME%".to_string());
    Ok(ActionOutcome::done(lines.join("\n")))
}

/// `exit`
pub fn exit(session: &mut Session, _segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    session.request_exit();
    Ok(ActionOutcome::done("Goodbye."))
}

/// `log`: the most recent journal entries.
pub fn log(session: &mut Session, _segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let entries = session.recent_journal();
    if entries.is_empty() {
        return Ok(ActionOutcome::done("No log entries yet."));
    }
    Ok(ActionOutcome::done(entries.join("\n")))
}

/// `undo`: reverses the last move or rename.
pub fn undo(session: &mut Session, _segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let Some(last) = session.last_undo().cloned() else {
        return Ok(ActionOutcome::done("Nothing to undo."));
    };
    let current = commons::display(&last.current);
    let original = commons::display(&last.original);

    let effect = format!("UNDO {} {} -> {}", last.kind.to_uppercase(), current, original);
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }

    if last.original.symlink_metadata().is_ok() {
        bail!("Cannot undo {}: '{}' exists again.", last.kind, original);
    }
    fs::rename(&last.current, &last.original)
        .with_context(|| format!("Undo failed: {} → {}", current, original))?;
    session.pop_undo();
    log::info!("Undid {} '{}' -> '{}'", last.kind, current, original);

    Ok(ActionOutcome::done(format!("Undid last {}.", last.kind)).with_effect(effect))
}

#[cfg(test)]
mod tests {
    use crate::core::safety::ScriptedConfirmer;
    use crate::session::Session;
    use tempfile::tempdir;

    #[test]
    fn test_toggles_flip_only_their_flag() {
        let dir = tempdir().unwrap();
        let mut session = Session::in_memory(dir.path(), Box::new(ScriptedConfirmer::default()));

        session.run_line("batch on; ssl off").unwrap();

        assert!(session.safety().batch);
        assert!(!session.safety().dry_run);
        assert!(!session.safety().ssl_verify);
    }

    #[test]
    fn test_toggles_work_under_dry_run() {
        let dir = tempdir().unwrap();
        let mut session = Session::in_memory(dir.path(), Box::new(ScriptedConfirmer::default()));

        session.run_line("dry-run on").unwrap();
        session.run_line("dry-run off").unwrap();

        assert!(!session.safety().dry_run);
    }

    #[test]
    fn test_bad_switch_is_a_usage_error() {
        let dir = tempdir().unwrap();
        let mut session = Session::in_memory(dir.path(), Box::new(ScriptedConfirmer::default()));

        let report = session.run_line("batch maybe").unwrap();

        assert_eq!(report.failed, 1);
        assert!(!session.safety().batch);
    }

    #[test]
    fn test_status_and_help() {
        let dir = tempdir().unwrap();
        let mut session = Session::in_memory(dir.path(), Box::new(ScriptedConfirmer::default()));

        let report = session.run_line("status; help del").unwrap();

        let messages: Vec<&str> = report.outcomes().map(|o| o.message.as_str()).collect();
        assert!(messages[0].starts_with("Batch: OFF | Dry-Run: OFF | SSL: ON"));
        assert!(messages[0].contains("Macro failures: continue"));
        assert!(messages[1].contains("delete '<path>'"));
    }

    #[test]
    fn test_undo_reverses_a_rename() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("old.txt"), "x").unwrap();
        let mut session = Session::in_memory(dir.path(), Box::new(ScriptedConfirmer::default()));
        session.run_line("batch on").unwrap();
        session.run_line("rename 'old.txt' to 'new.txt'").unwrap();
        assert!(dir.path().join("new.txt").exists());

        // --- Execute ---
        let report = session.run_line("undo; undo").unwrap();

        // --- Assert ---
        assert!(dir.path().join("old.txt").exists());
        assert!(!dir.path().join("new.txt").exists());
        let messages: Vec<&str> = report.outcomes().map(|o| o.message.as_str()).collect();
        assert_eq!(messages, vec!["Undid last rename.", "Nothing to undo."]);
    }
}
