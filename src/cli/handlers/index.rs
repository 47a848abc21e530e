// src/cli/handlers/index.rs

//! `qfind`, `qcount` and `qbuild` over the session's path index.

use anyhow::{Result, bail};
use colored::*;
use std::path::PathBuf;

use crate::{
    cli::handlers::commons,
    core::path_query::MatchMode,
    models::{ActionOutcome, ArgKind, Mode, Segment},
    session::Session,
};

/// `qfind <terms...> [limit]`: a trailing bare number is the result limit.
pub fn qfind(session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let mut words: Vec<&str> = segment.args.iter().map(|a| a.text.as_str()).collect();
    let explicit_limit = match segment.args.last() {
        Some(last)
            if segment.args.len() > 1
                && last.kind == ArgKind::Bare
                && last.text.chars().all(|c| c.is_ascii_digit()) =>
        {
            words.pop();
            Some(commons::parse_count(last, "limit")?)
        }
        _ => None,
    };
    let terms = words.join(" ");
    if terms.trim().is_empty() {
        return Err(commons::usage("qfind"));
    }

    let config = session.config();
    let limit = match explicit_limit {
        Some(requested) => config.clamp_query_limit(usize::try_from(requested)?),
        None => config.default_query_limit(),
    };
    let result = session.index().query(&terms, limit);
    log::debug!(
        "qfind '{}' -> {} hits ({:?}, limit {})",
        terms,
        result.hits.len(),
        result.mode,
        limit
    );

    if result.hits.is_empty() {
        return Ok(ActionOutcome::done(format!("No matches found for '{}'.", terms)));
    }
    let mut lines = vec![format!("Top {} results for '{}':", result.hits.len(), terms)];
    if result.mode == MatchMode::Any {
        lines.push("  (no path matched every term; showing partial matches)".yellow().to_string());
    }
    lines.extend(result.hits.iter().map(|hit| {
        let marker = if hit.entry.is_dir { "/" } else { "" };
        format!("  {}{}", hit.entry.path, marker)
    }));
    Ok(ActionOutcome::done(lines.join("\n")))
}

/// `qcount`: number of indexed entries.
pub fn qcount(session: &mut Session, _segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    Ok(ActionOutcome::done(format!("Indexed paths: {}", session.index().count())))
}

/// `qbuild ['<root>'...]`: rescans the given roots, or the configured ones.
pub fn qbuild(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let roots: Vec<PathBuf> = if segment.args.is_empty() {
        session.config().index.roots.clone()
    } else {
        segment
            .args
            .iter()
            .map(|arg| root_path(session, &arg.text))
            .collect()
    };
    if roots.is_empty() {
        bail!("No roots to index: pass them to qbuild or set [index] roots in config.toml.");
    }

    let listed: Vec<String> = roots.iter().map(|r| commons::display(r)).collect();
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(format!(
            "INDEX REBUILD {}",
            listed.join(", ")
        )));
    }

    let index = std::sync::Arc::clone(session.index());
    let report = index.rebuild(&roots)?;
    if report.scanned.is_empty() {
        let reasons: Vec<String> = report
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.root, f.reason))
            .collect();
        bail!("Nothing was indexed.\n  {}", reasons.join("\n  "));
    }

    let mut lines: Vec<String> = report
        .scanned
        .iter()
        .map(|scan| {
            format!(
                "Indexed {}: {} entries ({} replaced, {} unreadable)",
                scan.root, scan.entries, scan.purged, scan.unreadable
            )
        })
        .collect();
    lines.extend(
        report
            .failures
            .iter()
            .map(|f| format!("{} {}: {}", "Skipped".yellow(), f.root, f.reason)),
    );
    lines.push(format!(
        "Total indexed paths: {} ({:.2?})",
        report.total_entries, report.elapsed
    ));
    Ok(ActionOutcome::done(lines.join("\n")))
}

/// A single drive letter names a drive root on Windows; anything else is a
/// path relative to the working directory.
fn root_path(session: &Session, text: &str) -> PathBuf {
    let trimmed = text.trim().trim_end_matches([':', '/', '\\']);
    let is_drive_letter = trimmed.len() == 1 && trimmed.chars().all(|c| c.is_ascii_alphabetic());
    if cfg!(windows) && is_drive_letter {
        return PathBuf::from(format!("{}:/", trimmed.to_uppercase()));
    }
    session.resolve_path(text)
}
