// src/cli/handlers/process.rs

//! `open`, `run` and `cmd`.

use anyhow::Result;

use crate::{
    cli::handlers::commons::{self, display},
    models::{ActionOutcome, Mode, Segment},
    session::Session,
    system::executor,
};

/// `open '<path>'` or `open url <url>`. Path literals typed on their own are
/// dispatched here too.
pub fn open(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let first = commons::required_arg(segment, 0, "open")?;

    let target = if first.is_keyword("url") {
        let url = commons::required_arg(segment, 1, "open")?.text.trim();
        if url.contains("://") {
            url.to_string()
        } else {
            format!("https://{}", url)
        }
    } else {
        let path = session.resolve_path(&first.text);
        commons::require_exists(&path)?;
        display(&path)
    };

    let effect = format!("OPENED {}", target);
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }
    executor::open_detached(&target)?;
    log::info!("Opened '{}'", target);
    Ok(ActionOutcome::done(format!("Opened {}", target)).with_effect(effect))
}

/// `run '<command>' [in '<dir>']`: waits for the program to exit.
pub fn run(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let command = commons::required_arg(segment, 0, "run")?.text.clone();
    let cwd = commons::dir_after_keyword(session, segment, "in");
    commons::require_dir(&cwd)?;

    let effect = format!("RUN {} (in {})", command, display(&cwd));
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }
    log::info!("Running '{}' in '{}'", command, cwd.display());
    executor::execute_command(&command, &cwd)?;
    Ok(ActionOutcome::done(format!("Finished: {}", command)).with_effect(effect))
}

/// `cmd <shell line>`: the rest of the segment goes to the system shell.
pub fn shell(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let line = commons::free_text(segment, 1);
    if line.is_empty() {
        return Err(commons::usage("cmd"));
    }
    let cwd = session.cwd().to_path_buf();

    let effect = format!("RUN {}", line);
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }
    log::info!("Shell: '{}' in '{}'", line, cwd.display());
    executor::execute_shell_line(&line, &cwd)?;
    Ok(ActionOutcome::done(format!("Finished: {}", line)).with_effect(effect))
}

#[cfg(test)]
mod tests {
    use crate::core::safety::ScriptedConfirmer;
    use crate::session::Session;
    use tempfile::tempdir;

    fn batch_session(dir: &std::path::Path) -> Session {
        let mut session = Session::in_memory(dir, Box::new(ScriptedConfirmer::default()));
        session.run_line("batch on").unwrap();
        session
    }

    #[test]
    fn test_open_is_simulated_under_dry_run() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("doc.txt"), "x").unwrap();
        let mut session = batch_session(dir.path());

        let report = session
            .run_line("dry-run on; open 'doc.txt'; open url example.com; 'doc.txt'")
            .unwrap();

        let messages: Vec<&str> = report
            .outcomes()
            .filter(|o| o.simulated)
            .map(|o| o.message.as_str())
            .collect();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].starts_with("DRY-RUN OPENED "));
        assert_eq!(messages[1], "DRY-RUN OPENED https://example.com");
        assert!(session.journal().is_empty());
    }

    #[test]
    fn test_open_missing_path_fails() {
        let dir = tempdir().unwrap();
        let mut session = batch_session(dir.path());

        let report = session.run_line("dry-run on; open 'nowhere.txt'").unwrap();

        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_run_is_gated_as_irreversible() {
        let dir = tempdir().unwrap();
        let mut session = Session::in_memory(dir.path(), Box::new(ScriptedConfirmer::default()));

        let report = session.run_line("run 'anything'").unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.executed, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_and_cmd_report_exit_status() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let mut session = batch_session(dir.path());

        // --- Execute ---
        let report = session
            .run_line("run 'true'; run 'false'; cmd touch made.txt")
            .unwrap();

        // --- Assert ---
        assert_eq!((report.executed, report.failed), (2, 1));
        assert!(dir.path().join("made.txt").exists());
        assert_eq!(session.journal().len(), 2);
    }
}
