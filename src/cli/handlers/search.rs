// src/cli/handlers/search.rs

//! Walks of a directory tree that need no index: `find`, `findext`,
//! `recent`, `biggest` and `search`. Unreadable entries are skipped.

use anyhow::{Result, bail};
use chrono::{DateTime, Local};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::{DirEntry, WalkDir};

use crate::{
    cli::handlers::commons::{self, display},
    models::{ActionOutcome, Mode, Segment},
    session::Session,
};

/// Paths shown by `find`, `findext` and `search`.
const MATCH_LIMIT: usize = 20;
/// Entries shown by `recent` and `biggest`.
const RANKING_LIMIT: usize = 10;
/// `search` does not read files larger than this.
const SEARCH_MAX_FILE_BYTES: u64 = 16 * 1024 * 1024;

fn walk(root: &Path) -> impl Iterator<Item = DirEntry> + '_ {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!("Skipping unreadable entry under '{}': {}", root.display(), e);
                None
            }
        })
}

/// The optional first argument as a directory, or the working directory.
fn base_dir(session: &Session, segment: &Segment) -> Result<PathBuf> {
    let base = segment
        .arg(0)
        .map_or_else(|| session.cwd().to_path_buf(), |arg| session.resolve_path(&arg.text));
    commons::require_dir(&base)?;
    Ok(base)
}

/// `Found N match(es):` followed by the first paths.
fn matches(mut paths: Vec<String>) -> String {
    paths.sort();
    let total = paths.len();
    let mut lines = vec![format!("Found {} match(es):", total)];
    lines.extend(paths.iter().take(MATCH_LIMIT).map(|p| format!("  {}", p)));
    if total > MATCH_LIMIT {
        lines.push(format!("  ... and {} more", total - MATCH_LIMIT));
    }
    lines.join("\n")
}

/// `find '<name>'`: files and folders whose name contains `name`, ignoring case.
pub fn find(session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let name = commons::free_text(segment, 1);
    if name.is_empty() {
        return Err(commons::usage("find"));
    }
    let needle = name.to_lowercase();

    let hits: Vec<String> = walk(session.cwd())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .contains(&needle)
        })
        .map(|entry| display(entry.path()))
        .collect();

    if hits.is_empty() {
        return Ok(ActionOutcome::done(format!("No matches for '{}'.", name)));
    }
    Ok(ActionOutcome::done(matches(hits)))
}

/// Lowercased extension with its leading dot. Only letters and digits are accepted.
fn normalize_extension(raw: &str) -> Option<String> {
    let bare = raw.trim().trim_start_matches('.');
    if bare.is_empty() || !bare.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!(".{}", bare.to_ascii_lowercase()))
}

/// `findext '.<ext>'`: files ending in the extension, ignoring case.
pub fn find_ext(session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let raw = commons::required_arg(segment, 0, "findext")?;
    let Some(extension) = normalize_extension(&raw.text) else {
        bail!("Invalid extension '{}': expected something like '.txt'.", raw.text);
    };

    let hits: Vec<String> = walk(session.cwd())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .to_ascii_lowercase()
                .ends_with(&extension)
        })
        .map(|entry| display(entry.path()))
        .collect();

    if hits.is_empty() {
        return Ok(ActionOutcome::done(format!("No *{} files found.", extension)));
    }
    Ok(ActionOutcome::done(matches(hits)))
}

/// `recent ['<path>']`: the most recently modified files, newest first.
pub fn recent(session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let base = base_dir(session, segment)?;

    let mut files: Vec<(SystemTime, PathBuf)> = walk(&base)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, entry.into_path()))
        })
        .collect();
    if files.is_empty() {
        return Ok(ActionOutcome::done(format!("No files under '{}'.", display(&base))));
    }
    files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut lines = vec![format!("Most recent under {}:", display(&base))];
    lines.extend(files.iter().take(RANKING_LIMIT).map(|(modified, path)| {
        let stamp = DateTime::<Local>::from(*modified).format("%Y-%m-%d %H:%M:%S");
        format!("  {}  {}", stamp, display(path))
    }));
    Ok(ActionOutcome::done(lines.join("\n")))
}

/// `biggest ['<path>']`: the largest files, largest first.
pub fn biggest(session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let base = base_dir(session, segment)?;

    let mut files: Vec<(u64, PathBuf)> = walk(&base)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let size = entry.metadata().ok()?.len();
            Some((size, entry.into_path()))
        })
        .collect();
    if files.is_empty() {
        return Ok(ActionOutcome::done(format!("No files under '{}'.", display(&base))));
    }
    files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut lines = vec![format!("Largest under {}:", display(&base))];
    lines.extend(
        files
            .iter()
            .take(RANKING_LIMIT)
            .map(|(size, path)| format!("  {:>10}  {}", commons::format_size(*size), display(path))),
    );
    Ok(ActionOutcome::done(lines.join("\n")))
}

fn contains_text(path: &Path, needle: &str) -> bool {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).to_lowercase().contains(needle),
        Err(e) => {
            log::debug!("Cannot read '{}': {}", path.display(), e);
            false
        }
    }
}

/// `search '<text>'`: files whose content contains the text, ignoring case.
/// Files are read in parallel; content that is not UTF-8 is read lossily.
pub fn search(session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let text = commons::free_text(segment, 1);
    if text.is_empty() {
        return Err(commons::usage("search"));
    }
    let needle = text.to_lowercase();

    let candidates: Vec<PathBuf> = walk(session.cwd())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .metadata()
                .is_ok_and(|m| m.len() <= SEARCH_MAX_FILE_BYTES)
        })
        .map(DirEntry::into_path)
        .collect();
    log::debug!("search '{}' over {} files", text, candidates.len());

    let hits: Vec<String> = candidates
        .par_iter()
        .filter(|path| contains_text(path, &needle))
        .map(|path| display(path))
        .collect();

    if hits.is_empty() {
        return Ok(ActionOutcome::done(format!("No files contain '{}'.", text)));
    }
    Ok(ActionOutcome::done(matches(hits)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::safety::ScriptedConfirmer;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::tempdir;

    /// `docs/Report.TXT`, `docs/notes.md`, `src/main.rs` and an empty `reports/` folder.
    fn tree(root: &Path) {
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("reports")).unwrap();
        fs::write(root.join("docs/Report.TXT"), "Quarterly NUMBERS").unwrap();
        fs::write(root.join("docs/notes.md"), "nothing to see").unwrap();
        fs::write(root.join("src/main.rs"), "fn main() { /* numbers */ }").unwrap();
    }

    fn session(dir: &Path) -> Session {
        Session::in_memory(dir, Box::new(ScriptedConfirmer::default()))
    }

    fn message(session: &mut Session, line: &str) -> String {
        let report = session.run_line(line).unwrap();
        assert_eq!(report.failed, 0, "{}", line);
        report.outcomes().next().map(|o| o.message.clone()).unwrap_or_default()
    }

    #[test]
    fn test_find_matches_files_and_folders_ignoring_case() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        tree(dir.path());
        let mut session = session(dir.path());

        // --- Execute ---
        let found = message(&mut session, "find 'REPORT'");
        let missing = message(&mut session, "find 'budget'");

        // --- Assert ---
        assert!(found.starts_with("Found 2 match(es):"));
        assert!(found.contains("Report.TXT"));
        assert!(found.contains("reports"));
        assert_eq!(missing, "No matches for 'budget'.");
    }

    #[test]
    fn test_findext_accepts_the_extension_with_or_without_a_dot() {
        let dir = tempdir().unwrap();
        tree(dir.path());
        let mut session = session(dir.path());

        let dotted = message(&mut session, "findext '.txt'");
        let bare = message(&mut session, "findext MD");
        let none = message(&mut session, "findext .zip");

        assert!(dotted.starts_with("Found 1 match(es):"));
        assert!(dotted.contains("Report.TXT"));
        assert!(bare.contains("notes.md"));
        assert_eq!(none, "No *.zip files found.");
    }

    #[test]
    fn test_findext_rejects_a_pattern() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());

        let report = session.run_line("findext '*.t?t'").unwrap();

        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_recent_lists_newest_first() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        tree(dir.path());
        let base = SystemTime::now() - Duration::from_secs(3600);
        for (offset, name) in [(1, "docs/notes.md"), (2, "docs/Report.TXT"), (3, "src/main.rs")] {
            File::options()
                .write(true)
                .open(dir.path().join(name))
                .unwrap()
                .set_modified(base + Duration::from_secs(offset * 60))
                .unwrap();
        }
        let mut session = session(dir.path());

        // --- Execute ---
        let listing = message(&mut session, "recent");

        // --- Assert ---
        let order: Vec<usize> = ["main.rs", "Report.TXT", "notes.md"]
            .iter()
            .filter_map(|name| listing.find(name))
            .collect();
        assert_eq!(order.len(), 3);
        assert!(order.windows(2).all(|pair| pair.first() < pair.last()));
    }

    #[test]
    fn test_biggest_orders_by_size_under_the_given_folder() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/small.bin"), vec![0u8; 10]).unwrap();
        fs::write(dir.path().join("data/large.bin"), vec![0u8; 4096]).unwrap();
        fs::write(dir.path().join("outside.bin"), vec![0u8; 9000]).unwrap();
        let mut session = session(dir.path());

        let listing = message(&mut session, "biggest 'data'");

        assert!(!listing.contains("outside.bin"));
        let large = listing.find("large.bin").unwrap();
        let small = listing.find("small.bin").unwrap();
        assert!(large < small);
        assert!(listing.contains("4.0 KB"));
    }

    #[test]
    fn test_search_reads_contents_ignoring_case() {
        let dir = tempdir().unwrap();
        tree(dir.path());
        let mut session = session(dir.path());

        let found = message(&mut session, "search 'numbers'");
        let missing = message(&mut session, "search 'absent phrase'");

        assert!(found.starts_with("Found 2 match(es):"));
        assert!(found.contains("Report.TXT"));
        assert!(found.contains("main.rs"));
        assert!(!found.contains("notes.md"));
        assert_eq!(missing, "No files contain 'absent phrase'.");
    }

    #[test]
    fn test_match_list_is_truncated() {
        let paths: Vec<String> = (0..25).map(|i| format!("file{:02}.txt", i)).collect();

        let text = matches(paths);

        assert!(text.starts_with("Found 25 match(es):"));
        assert!(text.contains("file19.txt"));
        assert!(!text.contains("file20.txt"));
        assert!(text.ends_with("... and 5 more"));
    }
}
