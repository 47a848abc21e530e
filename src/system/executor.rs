// src/system/executor.rs

//! Spawning programs and handing targets to the desktop opener.

use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command as StdCommand, Stdio};
use thiserror::Error;

/// Errors raised while starting or waiting for a process.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Unbalanced quotes in the command line.
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    /// Nothing to run.
    #[error("No command specified to run.")]
    EmptyCommand,
    /// The program could not be started.
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    /// The program ran and failed.
    #[error("Command '{command}' exited with status {code}.")]
    NonZeroExitStatus {
        /// The command line.
        command: String,
        /// Exit code, `-1` when killed by a signal.
        code: i32,
    },
    /// The system opener refused the target.
    #[error("Could not open '{target}': {source}")]
    OpenFailed {
        /// Path or URL.
        target: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Runs a program with arguments parsed shell-style from `command_line`.
///
/// Output goes straight to the user's terminal. Blocks until the process
/// exits; a non-zero exit code is an error.
pub fn execute_command(command_line: &str, cwd: &Path) -> Result<(), ExecutionError> {
    let trimmed_command = command_line.trim();
    if trimmed_command.is_empty() {
        return Err(ExecutionError::EmptyCommand);
    }

    let parts = shlex::split(trimmed_command)
        .ok_or_else(|| ExecutionError::CommandParse(trimmed_command.to_string()))?;
    let Some((program, args)) = parts.split_first() else {
        return Err(ExecutionError::EmptyCommand);
    };
    let clean_cwd = dunce::simplified(cwd);

    let mut command = StdCommand::new(program);
    command
        .args(args)
        .current_dir(clean_cwd)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    // Windows built-ins like `echo` only exist inside cmd.exe.
    let status = match command.status() {
        Ok(status) => status,
        Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
            log::debug!("Command '{}' not found. Retrying with cmd /C.", program);
            return execute_shell_line(trimmed_command, cwd);
        }
        Err(e) => {
            return Err(ExecutionError::CommandFailed(trimmed_command.to_string(), e));
        }
    };

    check_status(trimmed_command, status)
}

/// Runs a full line through the platform shell (`sh -c` or `cmd /C`).
pub fn execute_shell_line(line: &str, cwd: &Path) -> Result<(), ExecutionError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ExecutionError::EmptyCommand);
    }

    let mut command = if cfg!(target_os = "windows") {
        let mut cmd = StdCommand::new("cmd");
        cmd.arg("/C");
        cmd
    } else {
        let mut sh = StdCommand::new("sh");
        sh.arg("-c");
        sh
    };

    let status = command
        .arg(trimmed)
        .current_dir(dunce::simplified(cwd))
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| ExecutionError::CommandFailed(trimmed.to_string(), e))?;

    check_status(trimmed, status)
}

fn check_status(command: &str, status: std::process::ExitStatus) -> Result<(), ExecutionError> {
    if status.success() {
        return Ok(());
    }
    Err(ExecutionError::NonZeroExitStatus {
        command: command.to_string(),
        code: status.code().unwrap_or(-1),
    })
}

/// Hands a path or URL to the desktop's default handler without waiting.
pub fn open_detached(target: &str) -> Result<(), ExecutionError> {
    let mut command = if cfg!(target_os = "windows") {
        let mut cmd = StdCommand::new("cmd");
        cmd.args(["/C", "start", ""]);
        cmd
    } else if cfg!(target_os = "macos") {
        StdCommand::new("open")
    } else {
        StdCommand::new("xdg-open")
    };

    command
        .arg(target)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|child| log::debug!("Opened '{}' (PID: {})", target, child.id()))
        .map_err(|source| ExecutionError::OpenFailed {
            target: target.to_string(),
            source,
        })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_execute_command_runs_in_the_given_directory() {
        // --- Setup ---
        let dir = tempdir().unwrap();

        // --- Execute ---
        execute_command("touch 'made here.txt'", dir.path()).unwrap();

        // --- Assert ---
        assert!(dir.path().join("made here.txt").exists());
    }

    #[test]
    fn test_non_zero_exit_is_an_error() {
        let dir = tempdir().unwrap();

        let err = execute_shell_line("exit 3", dir.path()).unwrap_err();

        assert!(matches!(err, ExecutionError::NonZeroExitStatus { code: 3, .. }));
    }

    #[test]
    fn test_empty_and_unparsable_commands() {
        let dir = tempdir().unwrap();

        assert!(matches!(
            execute_command("   ", dir.path()),
            Err(ExecutionError::EmptyCommand)
        ));
        assert!(matches!(
            execute_command("echo 'unterminated", dir.path()),
            Err(ExecutionError::CommandParse(_))
        ));
    }
}
