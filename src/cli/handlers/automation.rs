// src/cli/handlers/automation.rs

//! `echo` and `timer`.

use anyhow::{Result, anyhow, bail};
use std::thread;
use std::time::Duration;

use crate::{
    cli::{
        dispatcher::{ChainReport, StepStatus},
        handlers::commons,
    },
    core::errors::CmcError,
    models::{ActionOutcome, Mode, Segment},
    session::Session,
};

/// `echo <text>`: prints the text with variables expanded.
pub fn echo(_session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    Ok(ActionOutcome::done(commons::free_text(segment, 1)))
}

/// Blocks the chain for the given number of seconds, dry-run or not.
pub fn sleep(_session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let seconds = commons::parse_count(commons::required_arg(segment, 0, "sleep")?, "duration")?;
    thread::sleep(Duration::from_secs(seconds));
    Ok(ActionOutcome::done(format!("Slept {} s.", seconds)))
}

/// `timer <seconds> [command or text]`.
///
/// The rest of the line is planned when the timer fires. If it resolves it
/// runs through the same confirmation gate as a typed command; otherwise it
/// is printed as a reminder.
pub fn timer(session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let seconds = commons::parse_count(commons::required_arg(segment, 0, "timer")?, "delay")?;
    if seconds == 0 {
        bail!("Timer delay must be positive.");
    }
    let action = segment.tail(2).to_string();

    thread::sleep(Duration::from_secs(seconds));

    if action.is_empty() {
        return Ok(ActionOutcome::done(format!("Timer finished ({} s).", seconds)));
    }

    // Quoted text is always a reminder, never a path to open.
    let planned = if action.starts_with(['\'', '"']) {
        None
    } else {
        match session.plan(&action) {
            Ok(steps) => Some(steps),
            Err(CmcError::UnknownCommand(_)) => None,
            Err(e) => return Err(e.into()),
        }
    };
    let Some(steps) = planned else {
        let text = session.variables().expand(commons::unquote(&action)).into_owned();
        return Ok(ActionOutcome::done(format!("⏰ {}", text)));
    };

    log::info!("Timer triggered: {}", action);
    let report = session.run_nested(steps)?;
    summarize(&action, &report)
}

fn summarize(action: &str, report: &ChainReport) -> Result<ActionOutcome> {
    let mut lines = vec![format!("⏰ Timer triggered: {}", action)];
    for record in &report.records {
        let line = match &record.status {
            StepStatus::Completed(outcome) => format!("  → {}: {}", record.text, outcome.message),
            StepStatus::Failed(error) => format!("  ✗ {}: {}", record.text, error),
            StepStatus::Declined => format!("  - {}: declined", record.text),
            StepStatus::Skipped => format!("  - {}: skipped", record.text),
        };
        lines.push(line);
    }

    if let Some(fatal) = &report.fatal {
        lines.push(fatal.to_string());
        return Err(anyhow!(lines.join("\n")));
    }
    if report.failed > 0 {
        bail!(lines.join("\n"));
    }

    // Nested steps were journaled as they ran.
    Ok(ActionOutcome::done(lines.join("\n")))
}
