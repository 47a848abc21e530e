// src/cli/dispatcher.rs

//! The command registry and the loop that runs planned steps through the confirmation gate.

use anyhow::Result;

use crate::{
    cli::handlers,
    core::{
        config::FailurePolicy,
        errors::CmcError,
        expansion::{Origin, PlannedStep},
        resolver::VerbTable,
        safety::{self, GateDecision},
    },
    models::{ActionOutcome, Classification, Mode, Segment},
    session::Session,
};

// --- Command Definition and Registry ---

/// Defines a built-in command: its names, its help text, its destructive
/// classification and its handler.
pub struct CommandDefinition {
    /// Canonical name shown by `help`.
    pub name: &'static str,
    /// Other names that dispatch here.
    pub aliases: &'static [&'static str],
    /// Syntax line shown by `help`.
    pub usage: &'static str,
    /// One-line description.
    pub summary: &'static str,
    /// Decides whether a given invocation needs confirmation.
    pub classify: fn(&Segment) -> Classification,
    /// Runs the command; `Mode::Simulate` must not change anything.
    pub handler: fn(&mut Session, &Segment, Mode) -> Result<ActionOutcome>,
}

fn harmless(_: &Segment) -> Classification {
    Classification::None
}

fn overwrite_risk(_: &Segment) -> Classification {
    Classification::OverwriteRisk
}

fn irreversible(_: &Segment) -> Classification {
    Classification::Irreversible
}

/// Store management is harmless except for wiping a whole store.
fn store_management(segment: &Segment) -> Classification {
    if segment.arg(0).is_some_and(|a| a.is_keyword("clear")) {
        Classification::Irreversible
    } else {
        Classification::None
    }
}

/// The single source of truth for all built-in commands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    // Session
    CommandDefinition {
        name: "batch",
        aliases: &[],
        usage: "batch on|off",
        summary: "Skip confirmation prompts.",
        classify: harmless,
        handler: handlers::console::batch,
    },
    CommandDefinition {
        name: "dry-run",
        aliases: &["dryrun"],
        usage: "dry-run on|off",
        summary: "Report actions instead of performing them.",
        classify: harmless,
        handler: handlers::console::dry_run,
    },
    CommandDefinition {
        name: "ssl",
        aliases: &[],
        usage: "ssl on|off",
        summary: "Verify TLS certificates on downloads.",
        classify: harmless,
        handler: handlers::console::ssl,
    },
    CommandDefinition {
        name: "status",
        aliases: &[],
        usage: "status",
        summary: "Show the session flags and counters.",
        classify: harmless,
        handler: handlers::console::status,
    },
    CommandDefinition {
        name: "help",
        aliases: &["?"],
        usage: "help [command]",
        summary: "List commands, or show one command's usage.",
        classify: harmless,
        handler: handlers::console::help,
    },
    CommandDefinition {
        name: "exit",
        aliases: &["quit"],
        usage: "exit",
        summary: "Save and leave the console.",
        classify: harmless,
        handler: handlers::console::exit,
    },
    CommandDefinition {
        name: "log",
        aliases: &[],
        usage: "log",
        summary: "Show the action journal.",
        classify: harmless,
        handler: handlers::console::log,
    },
    CommandDefinition {
        name: "undo",
        aliases: &[],
        usage: "undo",
        summary: "Reverse the last move or rename.",
        classify: overwrite_risk,
        handler: handlers::console::undo,
    },
    // Automation
    CommandDefinition {
        name: "echo",
        aliases: &["say"],
        usage: "echo <text>",
        summary: "Print text.",
        classify: harmless,
        handler: handlers::automation::echo,
    },
    CommandDefinition {
        name: "sleep",
        aliases: &["wait"],
        usage: "sleep <seconds>",
        summary: "Pause the chain.",
        classify: harmless,
        handler: handlers::automation::sleep,
    },
    CommandDefinition {
        name: "timer",
        aliases: &[],
        usage: "timer <seconds> [command or text]",
        summary: "Wait, then run a command (in batch mode) or print a message.",
        classify: harmless,
        handler: handlers::automation::timer,
    },
    CommandDefinition {
        name: "macro",
        aliases: &[],
        usage: "macro add <name> = <cmd>; <cmd> | macro run|delete <name> | macro list | macro clear",
        summary: "Manage and run macros.",
        classify: store_management,
        handler: handlers::macros::handle,
    },
    CommandDefinition {
        name: "alias",
        aliases: &[],
        usage: "alias add <name> = <command> | alias run|delete <name> | alias list | alias clear",
        summary: "Manage single-command shortcuts.",
        classify: store_management,
        handler: handlers::alias::handle,
    },
    // Navigation
    CommandDefinition {
        name: "pwd",
        aliases: &[],
        usage: "pwd",
        summary: "Show the working directory.",
        classify: harmless,
        handler: handlers::navigation::pwd,
    },
    CommandDefinition {
        name: "cd",
        aliases: &[],
        usage: "cd '<path>'",
        summary: "Change the working directory.",
        classify: harmless,
        handler: handlers::navigation::cd,
    },
    CommandDefinition {
        name: "back",
        aliases: &[],
        usage: "back",
        summary: "Return to the previous directory.",
        classify: harmless,
        handler: handlers::navigation::back,
    },
    CommandDefinition {
        name: "home",
        aliases: &[],
        usage: "home",
        summary: "Go to the home directory.",
        classify: harmless,
        handler: handlers::navigation::home,
    },
    CommandDefinition {
        name: "list",
        aliases: &["ls"],
        usage: "list ['<path>']",
        summary: "List a directory.",
        classify: harmless,
        handler: handlers::navigation::list,
    },
    CommandDefinition {
        name: "info",
        aliases: &[],
        usage: "info '<path>'",
        summary: "Show type, size and modification time.",
        classify: harmless,
        handler: handlers::navigation::info,
    },
    // Files
    CommandDefinition {
        name: "create",
        aliases: &[],
        usage: "create file '<name>' in '<dir>' [with text=\"...\"] | create folder '<name>' in '<dir>'",
        summary: "Create a file or folder.",
        classify: overwrite_risk,
        handler: handlers::files::create,
    },
    CommandDefinition {
        name: "write",
        aliases: &[],
        usage: "write '<path>' text=\"...\"",
        summary: "Replace a file's contents.",
        classify: overwrite_risk,
        handler: handlers::files::write,
    },
    CommandDefinition {
        name: "read",
        aliases: &["cat"],
        usage: "read '<path>' [head=N]",
        summary: "Print a text file.",
        classify: harmless,
        handler: handlers::files::read,
    },
    CommandDefinition {
        name: "copy",
        aliases: &["cp"],
        usage: "copy '<source>' to '<dir>'",
        summary: "Copy a file or folder into a directory.",
        classify: overwrite_risk,
        handler: handlers::files::copy,
    },
    CommandDefinition {
        name: "move",
        aliases: &["mv"],
        usage: "move '<source>' to '<dir>'",
        summary: "Move a file or folder into a directory (undoable).",
        classify: overwrite_risk,
        handler: handlers::files::move_into,
    },
    CommandDefinition {
        name: "rename",
        aliases: &[],
        usage: "rename '<path>' to '<new name>'",
        summary: "Rename a file or folder (undoable).",
        classify: overwrite_risk,
        handler: handlers::files::rename,
    },
    CommandDefinition {
        name: "delete",
        aliases: &["del", "rm"],
        usage: "delete '<path>'",
        summary: "Delete a file or folder.",
        classify: irreversible,
        handler: handlers::files::delete,
    },
    CommandDefinition {
        name: "zip",
        aliases: &[],
        usage: "zip '<path>'",
        summary: "Compress a file or folder next to itself.",
        classify: overwrite_risk,
        handler: handlers::files::zip,
    },
    CommandDefinition {
        name: "unzip",
        aliases: &[],
        usage: "unzip '<archive>' to '<dir>'",
        summary: "Extract an archive.",
        classify: overwrite_risk,
        handler: handlers::files::unzip,
    },
    CommandDefinition {
        name: "backup",
        aliases: &[],
        usage: "backup '<source>' '<dir>'",
        summary: "Zip a file or folder into a timestamped archive.",
        classify: overwrite_risk,
        handler: handlers::files::backup,
    },
    // Directory search
    CommandDefinition {
        name: "find",
        aliases: &[],
        usage: "find '<name>'",
        summary: "Find files and folders under the working directory by name.",
        classify: harmless,
        handler: handlers::search::find,
    },
    CommandDefinition {
        name: "findext",
        aliases: &[],
        usage: "findext '.<ext>'",
        summary: "Find files under the working directory by extension.",
        classify: harmless,
        handler: handlers::search::find_ext,
    },
    CommandDefinition {
        name: "recent",
        aliases: &[],
        usage: "recent ['<path>']",
        summary: "The most recently modified files.",
        classify: harmless,
        handler: handlers::search::recent,
    },
    CommandDefinition {
        name: "biggest",
        aliases: &[],
        usage: "biggest ['<path>']",
        summary: "The largest files.",
        classify: harmless,
        handler: handlers::search::biggest,
    },
    CommandDefinition {
        name: "search",
        aliases: &[],
        usage: "search '<text>'",
        summary: "Find files under the working directory containing the text.",
        classify: harmless,
        handler: handlers::search::search,
    },
    // Processes & network
    CommandDefinition {
        name: "open",
        aliases: &[],
        usage: "open '<path>' | open url <url>",
        summary: "Open a path or URL with the default application.",
        classify: harmless,
        handler: handlers::process::open,
    },
    CommandDefinition {
        name: "run",
        aliases: &[],
        usage: "run '<command>' [in '<dir>']",
        summary: "Run a program and wait for it.",
        classify: irreversible,
        handler: handlers::process::run,
    },
    CommandDefinition {
        name: "cmd",
        aliases: &["sh"],
        usage: "cmd <shell line>",
        summary: "Run a line through the system shell.",
        classify: irreversible,
        handler: handlers::process::shell,
    },
    CommandDefinition {
        name: "download",
        aliases: &[],
        usage: "download '<url>' to '<dir>'",
        summary: "Download a file (size-capped).",
        classify: overwrite_risk,
        handler: handlers::download::handle,
    },
    CommandDefinition {
        name: "downloadlist",
        aliases: &[],
        usage: "downloadlist '<file>' to '<dir>'",
        summary: "Download every URL listed in a file, one per line.",
        classify: overwrite_risk,
        handler: handlers::download::download_list,
    },
    // Path index
    CommandDefinition {
        name: "qfind",
        aliases: &[],
        usage: "qfind <terms...> [limit]",
        summary: "Search the path index.",
        classify: harmless,
        handler: handlers::index::qfind,
    },
    CommandDefinition {
        name: "qcount",
        aliases: &[],
        usage: "qcount",
        summary: "Count indexed paths.",
        classify: harmless,
        handler: handlers::index::qcount,
    },
    CommandDefinition {
        name: "qbuild",
        aliases: &[],
        usage: "qbuild ['<root>'...]",
        summary: "Rebuild the path index.",
        classify: harmless,
        handler: handlers::index::qbuild,
    },
];

/// Finds a command definition in the registry by its name or alias.
pub fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Every built-in, in registry order.
pub fn commands() -> &'static [CommandDefinition] {
    COMMAND_REGISTRY
}

/// The registry as seen by the resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinVerbs;

impl VerbTable for BuiltinVerbs {
    fn canonical(&self, verb: &str) -> Option<&'static str> {
        find_command(verb).map(|cmd| cmd.name)
    }
}

// --- Chain execution ---

/// What happened to one step of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The handler succeeded.
    Completed(ActionOutcome),
    /// The handler, or planning, failed.
    Failed(CmcError),
    /// The confirmation prompt was answered "no".
    Declined,
    /// Not run because the chain stopped earlier.
    Skipped,
}

/// One step of a chain and how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// The step as written, after expansion.
    pub text: String,
    /// Typed on the line or taken from a macro.
    pub origin: Origin,
    /// How the step ended.
    pub status: StepStatus,
}

/// Aggregate result of one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainReport {
    /// Steps that completed.
    pub executed: usize,
    /// Steps whose handler returned an error.
    pub failed: usize,
    /// Declined steps plus steps never reached.
    pub skipped: usize,
    /// The error that stopped the chain, if any.
    pub fatal: Option<CmcError>,
    /// Every step in order, including skipped ones.
    pub records: Vec<StepRecord>,
}

impl ChainReport {
    /// True when every step completed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.skipped == 0 && self.fatal.is_none()
    }

    /// Outcomes of the steps that completed, in order.
    pub fn outcomes(&self) -> impl Iterator<Item = &ActionOutcome> {
        self.records.iter().filter_map(|record| match &record.status {
            StepStatus::Completed(outcome) => Some(outcome),
            _ => None,
        })
    }
}

/// Executes planned steps strictly left to right.
///
/// - A failing action is recorded and the chain continues, unless it came
///   from a macro and the failure policy is `stop`.
/// - A declined confirmation skips that step; inside a macro it also stops
///   the chain.
/// - `exit` stops the chain without an error.
///
/// Every record is passed to `observer` as soon as it exists.
pub fn dispatch(
    session: &mut Session,
    steps: Vec<PlannedStep>,
    observer: &mut dyn FnMut(&StepRecord),
) -> ChainReport {
    let mut report = ChainReport::default();
    let mut remaining = steps.into_iter();

    for step in remaining.by_ref() {
        let record = run_step(session, step, &mut report);
        observer(&record);
        report.records.push(record);

        if report.fatal.is_some() || session.exit_requested() {
            break;
        }
    }

    for step in remaining {
        report.skipped += 1;
        let record = StepRecord {
            text: step.segment.raw,
            origin: step.origin,
            status: StepStatus::Skipped,
        };
        observer(&record);
        report.records.push(record);
    }

    log::debug!(
        "Chain finished: {} executed, {} failed, {} skipped{}",
        report.executed,
        report.failed,
        report.skipped,
        if report.fatal.is_some() { " (aborted)" } else { "" }
    );
    report
}

fn run_step(session: &mut Session, step: PlannedStep, report: &mut ChainReport) -> StepRecord {
    let status = match find_command(step.verb) {
        Some(command) => {
            let classification = (command.classify)(&step.segment);
            let prompt = format!("{} ({}). Proceed?", step.segment, classification);
            let decision = safety::gate(
                &session.safety,
                classification,
                &prompt,
                session.confirmer.as_mut(),
            );
            match decision {
                GateDecision::Declined => {
                    report.skipped += 1;
                    if step.origin.is_macro() {
                        report.fatal = Some(CmcError::fatal(CmcError::ConfirmationDeclined(
                            step.segment.raw.clone(),
                        )));
                    }
                    StepStatus::Declined
                }
                GateDecision::Proceed(mode) => {
                    match (command.handler)(session, &step.segment, mode) {
                        Ok(outcome) => {
                            report.executed += 1;
                            if !outcome.simulated {
                                for effect in &outcome.side_effects {
                                    session.record(effect);
                                }
                            }
                            StepStatus::Completed(outcome)
                        }
                        Err(e) => {
                            report.failed += 1;
                            let error = CmcError::Action(format!("{:#}", e));
                            log::debug!("'{}' failed: {}", step.segment, error);
                            if step.origin.is_macro()
                                && session.config.session.macro_failure_policy
                                    == FailurePolicy::Stop
                            {
                                report.fatal = Some(CmcError::fatal(error.clone()));
                            }
                            StepStatus::Failed(error)
                        }
                    }
                }
            }
        }
        None => {
            report.failed += 1;
            StepStatus::Failed(CmcError::UnknownCommand(step.segment.raw.clone()))
        }
    };

    StepRecord {
        text: step.segment.raw,
        origin: step.origin,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CmcConfig;
    use crate::core::safety::ScriptedConfirmer;
    use std::fs;
    use tempfile::tempdir;

    fn session_in(dir: &std::path::Path, answers: &[bool]) -> Session {
        Session::in_memory(dir, Box::new(ScriptedConfirmer::new(answers.to_vec())))
    }

    fn statuses(report: &ChainReport) -> Vec<&StepStatus> {
        report.records.iter().map(|r| &r.status).collect()
    }

    #[test]
    fn test_every_registry_name_is_unique() {
        let mut names: Vec<&str> = commands()
            .iter()
            .flat_map(|c| std::iter::once(c.name).chain(c.aliases.iter().copied()))
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_failures_do_not_stop_a_top_level_chain() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let mut session = session_in(dir.path(), &[]);

        // --- Execute ---
        let report = session
            .run_line("read 'missing.txt'; echo 'still here'")
            .unwrap();

        // --- Assert ---
        assert_eq!((report.executed, report.failed, report.skipped), (1, 1, 0));
        assert!(matches!(statuses(&report)[0], StepStatus::Failed(CmcError::Action(m)) if m.contains("missing.txt")));
        assert_eq!(report.outcomes().next().map(|o| o.message.as_str()), Some("still here"));
        assert!(report.fatal.is_none());
    }

    #[test]
    fn test_declined_step_is_skipped_and_chain_continues() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), "x").unwrap();
        let mut session = session_in(dir.path(), &[false]);

        let report = session.run_line("delete 'keep.txt'; echo 'after'").unwrap();

        assert!(dir.path().join("keep.txt").exists());
        assert_eq!(statuses(&report)[0], &StepStatus::Declined);
        assert_eq!((report.executed, report.skipped), (1, 1));
        assert!(report.fatal.is_none());
    }

    #[test]
    fn test_declined_step_inside_macro_aborts_the_line() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        let mut session = session_in(dir.path(), &[false]);
        session
            .run_line("macro add wipe = delete 'a.txt'; echo 'wiped'")
            .unwrap();

        // --- Execute ---
        let report = session.run_line("wipe; echo 'later'").unwrap();

        // --- Assert ---
        assert_eq!(
            report.fatal.as_ref().map(CmcError::root_cause),
            Some(&CmcError::ConfirmationDeclined("delete 'a.txt'".into()))
        );
        assert_eq!((report.executed, report.failed, report.skipped), (0, 0, 3));
        assert_eq!(statuses(&report)[2], &StepStatus::Skipped);
    }

    #[test]
    fn test_macro_failure_policy_is_observable() {
        let dir = tempdir().unwrap();
        let line = "macro add m = read 'nope.txt'; echo 'next'";

        let mut continuing = session_in(dir.path(), &[]);
        continuing.run_line(line).unwrap();
        let report = continuing.run_line("m").unwrap();
        assert_eq!((report.executed, report.failed, report.skipped), (1, 1, 0));

        let mut config = CmcConfig::default();
        config.session.macro_failure_policy = FailurePolicy::Stop;
        let mut stopping = session_in(dir.path(), &[]).with_config(config);
        stopping.run_line(line).unwrap();
        let report = stopping.run_line("m").unwrap();
        assert_eq!((report.executed, report.failed, report.skipped), (0, 1, 1));
        assert!(matches!(report.fatal, Some(CmcError::FatalChain(_))));
    }

    #[test]
    fn test_exit_stops_the_chain_without_error() {
        let dir = tempdir().unwrap();
        let mut session = session_in(dir.path(), &[]);

        let report = session.run_line("echo 'a'; exit; echo 'b'").unwrap();

        assert!(session.exit_requested());
        assert_eq!((report.executed, report.skipped), (2, 1));
        assert!(report.fatal.is_none());
    }

    #[test]
    fn test_resolution_errors_run_nothing() {
        let dir = tempdir().unwrap();
        let mut session = session_in(dir.path(), &[]);

        let result = session.run_line("create folder 'x' in '.'; frobnicate");

        assert_eq!(result, Err(CmcError::UnknownCommand("frobnicate".into())));
        assert!(!dir.path().join("x").exists());
    }

    #[test]
    fn test_mutations_are_journaled_but_simulations_are_not() {
        let dir = tempdir().unwrap();
        let mut session = session_in(dir.path(), &[]);
        session.run_line("batch on").unwrap();

        session.run_line("create folder 'real' in '.'").unwrap();
        session.run_line("dry-run on; create folder 'fake' in '.'").unwrap();

        assert_eq!(session.journal().len(), 1);
        assert!(session.journal()[0].contains("CREATED FOLDER"));
    }
}
