// src/cli/handlers/navigation.rs

//! The virtual working directory (`pwd`, `cd`, `back`, `home`) and the
//! read-only `list` and `info` views.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use colored::*;
use walkdir::WalkDir;

use crate::{
    cli::handlers::commons,
    models::{ActionOutcome, Mode, Segment},
    session::Session,
};

/// `pwd`
pub fn pwd(session: &mut Session, _segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    Ok(ActionOutcome::done(commons::display(session.cwd())))
}

/// `cd '<dir>'`
pub fn cd(session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let target = session.resolve_path(&commons::required_arg(segment, 0, "cd")?.text);
    commons::require_dir(&target)?;
    let shown = commons::display(&target);
    session.change_dir(target);
    log::debug!("cwd -> {}", shown);
    Ok(ActionOutcome::done(shown))
}

/// `back`: returns to the previous directory.
pub fn back(session: &mut Session, _segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    match session.go_back() {
        Some(previous) => Ok(ActionOutcome::done(commons::display(previous))),
        None => Ok(ActionOutcome::done("No previous directory.")),
    }
}

/// `home`
pub fn home(session: &mut Session, _segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let home = session.home().to_path_buf();
    commons::require_dir(&home)?;
    let shown = commons::display(&home);
    session.change_dir(home);
    Ok(ActionOutcome::done(shown))
}

/// Which entry kinds `list` shows (`only=dirs|files`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Only {
    All,
    Dirs,
    Files,
}

/// `list ['<path>'] [depth=N] [only=dirs|files]`.
///
/// Directories come first, then files, each group sorted by path.
pub fn list(session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let root = segment
        .arg(0)
        .map_or_else(|| session.cwd().to_path_buf(), |arg| session.resolve_path(&arg.text));
    commons::require_dir(&root)?;

    let depth = match segment.operator("depth") {
        Some(arg) => usize::try_from(commons::parse_count(arg, "depth")?)?.max(1),
        None => 1,
    };
    let only = match segment.operator("only").map(|a| a.text.to_lowercase()) {
        None => Only::All,
        Some(kind) if kind == "dirs" => Only::Dirs,
        Some(kind) if kind == "files" => Only::Files,
        Some(other) => bail!("Invalid only='{}': expected 'dirs' or 'files'.", other),
    };

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in WalkDir::new(&root).min_depth(1).max_depth(depth) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry under '{}': {}", root.display(), e);
                continue;
            }
        };
        let shown = commons::display(entry.path());
        if entry.file_type().is_dir() {
            dirs.push(shown);
        } else {
            files.push(shown);
        }
    }
    dirs.sort();
    files.sort();

    let mut lines = vec![format!("Listing: {}", commons::display(&root))];
    if only != Only::Files {
        lines.extend(dirs.iter().map(|d| format!("  {}  {}", "dir ".blue(), d)));
    }
    if only != Only::Dirs {
        lines.extend(files.iter().map(|f| format!("  {}  {}", "file", f)));
    }
    if lines.len() == 1 {
        lines.push("  (empty)".to_string());
    }
    Ok(ActionOutcome::done(lines.join("\n")))
}

/// Type, size (recursive for folders) and modification time.
pub fn info(session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let target = session.resolve_path(&commons::required_arg(segment, 0, "info")?.text);
    commons::require_exists(&target)?;

    let metadata = target
        .metadata()
        .with_context(|| format!("Cannot read metadata of '{}'", commons::display(&target)))?;
    let (kind, size) = if metadata.is_dir() {
        let total: u64 = WalkDir::new(&target)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum();
        ("dir", total)
    } else {
        ("file", metadata.len())
    };
    let modified = metadata
        .modified()
        .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    Ok(ActionOutcome::done(format!(
        "Info: {}\n  Type: {}\n  Size: {} ({} bytes)\n  Modified: {}",
        commons::display(&target),
        kind,
        commons::format_size(size),
        size,
        modified
    )))
}
