// src/cli/handlers/files.rs

//! Filesystem actions. Every handler validates its inputs first, then either
//! reports the effect (`Mode::Simulate`) or performs it and returns the
//! journal line describing it.

use anyhow::{Context, Result, anyhow, bail};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::{
    cli::handlers::commons::{self, display},
    models::{ActionOutcome, Mode, Segment},
    session::{Session, UndoRecord},
};

// --- Create / write / read ---

/// `create file '<name>' in '<dir>' [with text="..."]` or
/// `create folder '<name>' in '<dir>'`. Missing parent folders are created.
pub fn create(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let kind = commons::required_arg(segment, 0, "create")?.text.to_lowercase();
    let name = &commons::required_arg(segment, 1, "create")?.text;
    let parent = commons::dir_after_keyword(session, segment, "in");
    let target = parent.join(name);

    match kind.as_str() {
        "file" => {
            let text = segment.operator("text").map_or("", |arg| arg.text.as_str());
            let effect = format!("CREATED FILE {}", display(&target));
            if mode == Mode::Simulate {
                return Ok(ActionOutcome::simulated(effect));
            }
            if target.is_dir() {
                bail!("'{}' is a folder.", display(&target));
            }
            fs::create_dir_all(&parent)
                .with_context(|| format!("Cannot create folder '{}'", display(&parent)))?;
            fs::write(&target, text)
                .with_context(|| format!("Cannot write '{}'", display(&target)))?;
            log::info!("Created file '{}'", target.display());
            Ok(ActionOutcome::done(format!("Created: {}", display(&target))).with_effect(effect))
        }
        "folder" | "dir" => {
            let effect = format!("CREATED FOLDER {}", display(&target));
            if mode == Mode::Simulate {
                return Ok(ActionOutcome::simulated(effect));
            }
            fs::create_dir_all(&target)
                .with_context(|| format!("Cannot create folder '{}'", display(&target)))?;
            log::info!("Created folder '{}'", target.display());
            Ok(ActionOutcome::done(format!("Created folder: {}", display(&target)))
                .with_effect(effect))
        }
        _ => Err(commons::usage("create")),
    }
}

/// `write '<path>' text="..."` replaces the whole file.
pub fn write(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let target = session.resolve_path(&commons::required_arg(segment, 0, "write")?.text);
    let text = segment
        .operator("text")
        .ok_or_else(|| commons::usage("write"))?
        .text
        .clone();

    let effect = format!("WROTE {}", display(&target));
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }
    if target.is_dir() {
        bail!("'{}' is a folder.", display(&target));
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create folder '{}'", display(parent)))?;
    }
    fs::write(&target, &text).with_context(|| format!("Cannot write '{}'", display(&target)))?;
    log::info!("Wrote {} bytes to '{}'", text.len(), target.display());
    Ok(ActionOutcome::done(format!("Written: {}", display(&target))).with_effect(effect))
}

/// `read '<path>' [head=N]`. Invalid UTF-8 is replaced, not rejected.
pub fn read(session: &mut Session, segment: &Segment, _mode: Mode) -> Result<ActionOutcome> {
    let target = session.resolve_path(&commons::required_arg(segment, 0, "read")?.text);
    if !target.is_file() {
        bail!("Not found: {}", display(&target));
    }
    let bytes = fs::read(&target).with_context(|| format!("Cannot read '{}'", display(&target)))?;
    let content = String::from_utf8_lossy(&bytes);

    let shown = match segment.operator("head") {
        Some(arg) => {
            let head = usize::try_from(commons::parse_count(arg, "head")?)?;
            content.lines().take(head).collect::<Vec<_>>().join("\n")
        }
        None => content.into_owned(),
    };
    Ok(ActionOutcome::done(shown))
}

// --- Copy / move / rename / delete ---

/// `copy '<source>' to '<dir>'`: the source keeps its name inside `dir`.
pub fn copy(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let source = session.resolve_path(&commons::required_arg(segment, 0, "copy")?.text);
    let dest_dir = session.resolve_path(&commons::keyword_arg(segment, "to", "copy")?.text);
    commons::require_exists(&source)?;
    let target = dest_dir.join(commons::file_name(&source)?);

    let effect = format!("COPIED {} -> {}", display(&source), display(&target));
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }
    if source.is_dir() && target.starts_with(&source) {
        bail!("Cannot copy '{}' into itself.", display(&source));
    }
    fs::create_dir_all(&dest_dir)
        .with_context(|| format!("Cannot create folder '{}'", display(&dest_dir)))?;
    let copied = copy_recursive(&source, &target)?;
    log::info!("Copied '{}' to '{}' ({} files)", source.display(), target.display(), copied);
    Ok(ActionOutcome::done(format!("Copied to {}", display(&dest_dir))).with_effect(effect))
}

/// `move '<source>' to '<dir>'`. Undoable.
pub fn move_into(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let source = session.resolve_path(&commons::required_arg(segment, 0, "move")?.text);
    let dest_dir = session.resolve_path(&commons::keyword_arg(segment, "to", "move")?.text);
    commons::require_exists(&source)?;
    let target = dest_dir.join(commons::file_name(&source)?);

    let effect = format!("MOVED {} -> {}", display(&source), display(&target));
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }
    if target.symlink_metadata().is_ok() {
        bail!("'{}' already exists.", display(&target));
    }
    fs::create_dir_all(&dest_dir)
        .with_context(|| format!("Cannot create folder '{}'", display(&dest_dir)))?;
    move_path(&source, &target)?;

    session.push_undo(UndoRecord {
        kind: "move",
        current: target.clone(),
        original: source.clone(),
    });
    log::info!("Moved '{}' to '{}'", source.display(), target.display());
    Ok(ActionOutcome::done(format!("Moved to {}", display(&target))).with_effect(effect))
}

/// `rename '<path>' to '<new name>'`: stays in the same folder. Undoable.
pub fn rename(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let source = session.resolve_path(&commons::required_arg(segment, 0, "rename")?.text);
    let new_name = &commons::keyword_arg(segment, "to", "rename")?.text;
    commons::require_exists(&source)?;
    if new_name.contains(['/', '\\']) {
        bail!("'{}' is a name, not a path; use move to change folders.", new_name);
    }
    let parent = source
        .parent()
        .ok_or_else(|| anyhow!("Cannot rename '{}'", display(&source)))?;
    let target = parent.join(new_name);

    let effect = format!("RENAMED {} -> {}", display(&source), display(&target));
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }
    if target.symlink_metadata().is_ok() {
        bail!("'{}' already exists.", display(&target));
    }
    fs::rename(&source, &target)
        .with_context(|| format!("Cannot rename '{}'", display(&source)))?;

    session.push_undo(UndoRecord {
        kind: "rename",
        current: target.clone(),
        original: source.clone(),
    });
    log::info!("Renamed '{}' to '{}'", source.display(), target.display());
    Ok(ActionOutcome::done(format!("Renamed to {}", display(&target))).with_effect(effect))
}

/// `delete '<path>'`: removes a file or a whole folder.
pub fn delete(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let target = session.resolve_path(&commons::required_arg(segment, 0, "delete")?.text);
    commons::require_exists(&target)?;
    if target.parent().is_none() {
        bail!("Refusing to delete the root '{}'.", display(&target));
    }

    let effect = format!("DELETED {}", display(&target));
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }
    let result = if target.is_dir() && !target.is_symlink() {
        fs::remove_dir_all(&target)
    } else {
        fs::remove_file(&target)
    };
    result.with_context(|| format!("Cannot delete '{}'", display(&target)))?;
    log::info!("Deleted '{}'", target.display());
    Ok(ActionOutcome::done(format!("Deleted {}", display(&target))).with_effect(effect))
}

// --- Archives ---

/// `zip '<path>'`: `a.txt` -> `a.zip`, folder `d` -> `d.zip` beside it.
pub fn zip(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let source = session.resolve_path(&commons::required_arg(segment, 0, "zip")?.text);
    commons::require_exists(&source)?;
    let archive = if source.is_dir() {
        let name = commons::file_name(&source)?.to_string_lossy().into_owned();
        source.with_file_name(format!("{}.zip", name))
    } else {
        source.with_extension("zip")
    };
    if archive == source {
        bail!("'{}' is already a zip archive.", display(&source));
    }

    let effect = format!("ZIPPED {} -> {}", display(&source), display(&archive));
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }
    let files = write_archive(&source, &archive)?;
    log::info!("Zipped '{}' ({} files)", source.display(), files);
    Ok(ActionOutcome::done(format!("Zipped to: {}", display(&archive))).with_effect(effect))
}

/// `unzip '<archive>' to '<dir>'`. Entries escaping `dir` are refused.
pub fn unzip(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let archive = session.resolve_path(&commons::required_arg(segment, 0, "unzip")?.text);
    let dest = commons::dir_after_keyword(session, segment, "to");
    if !archive.is_file() {
        bail!("Not found: {}", display(&archive));
    }

    let effect = format!("UNZIPPED {} -> {}", display(&archive), display(&dest));
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }
    let file = File::open(&archive).with_context(|| format!("Cannot open '{}'", display(&archive)))?;
    let mut zip = ZipArchive::new(file)
        .with_context(|| format!("'{}' is not a valid zip archive", display(&archive)))?;
    fs::create_dir_all(&dest).with_context(|| format!("Cannot create folder '{}'", display(&dest)))?;
    zip.extract(&dest)
        .with_context(|| format!("Failed to extract '{}'", display(&archive)))?;
    log::info!("Unzipped '{}' ({} entries)", archive.display(), zip.len());
    Ok(ActionOutcome::done(format!("Unzipped to: {}", display(&dest))).with_effect(effect))
}

/// `backup '<source>' '<dir>'` -> `dir/<name>_YYYY-MM-DD_HH-MM-SS.zip`.
pub fn backup(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let source = session.resolve_path(&commons::required_arg(segment, 0, "backup")?.text);
    let dest_arg = segment
        .args
        .iter()
        .skip(1)
        .find(|arg| !arg.is_keyword("to"))
        .ok_or_else(|| commons::usage("backup"))?;
    let dest_dir = session.resolve_path(&dest_arg.text);
    commons::require_exists(&source)?;

    let name = if source.is_dir() {
        source.file_name()
    } else {
        source.file_stem()
    };
    let stem = name
        .ok_or_else(|| anyhow!("'{}' has no name", display(&source)))?
        .to_string_lossy()
        .into_owned();
    let stamp = session.now().format("%Y-%m-%d_%H-%M-%S");
    let archive = dest_dir.join(format!("{}_{}.zip", stem, stamp));

    let effect = format!("BACKUP_ZIP {} -> {}", display(&source), display(&archive));
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }
    fs::create_dir_all(&dest_dir)
        .with_context(|| format!("Cannot create folder '{}'", display(&dest_dir)))?;
    let files = write_archive(&source, &archive)?;
    log::info!("Backed up '{}' ({} files)", source.display(), files);
    Ok(ActionOutcome::done(format!("Backup created: {}", display(&archive))).with_effect(effect))
}

// --- Helpers ---

/// Copies a file, or a folder tree into `target`. Returns the file count.
fn copy_recursive(source: &Path, target: &Path) -> Result<usize> {
    if !source.is_dir() {
        fs::copy(source, target).with_context(|| {
            format!("Cannot copy '{}' to '{}'", display(source), display(target))
        })?;
        return Ok(1);
    }

    let mut copied = 0;
    for entry in WalkDir::new(source) {
        let entry = entry.with_context(|| format!("Cannot read '{}'", display(source)))?;
        let relative = entry.path().strip_prefix(source)?;
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)
                .with_context(|| format!("Cannot create folder '{}'", display(&destination)))?;
        } else {
            fs::copy(entry.path(), &destination)
                .with_context(|| format!("Cannot copy '{}'", display(entry.path())))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Renames, falling back to copy-and-delete across filesystems.
fn move_path(source: &Path, target: &Path) -> Result<()> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            log::debug!("Cross-device move of '{}', copying instead", source.display());
            copy_recursive(source, target)?;
            if source.is_dir() {
                fs::remove_dir_all(source)?;
            } else {
                fs::remove_file(source)?;
            }
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Cannot move '{}'", display(source))),
    }
}

/// Writes `source` (a file, or a folder under its own name) into a new
/// deflate archive. Written through a temporary file so a failure never
/// leaves a truncated archive behind.
fn write_archive(source: &Path, archive: &Path) -> Result<usize> {
    let dir = archive
        .parent()
        .ok_or_else(|| anyhow!("Invalid archive path '{}'", display(archive)))?;
    let tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Cannot write in '{}'", display(dir)))?;
    let mut writer = ZipWriter::new(tmp);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut count = 0;
    if source.is_dir() {
        let base = source.parent().unwrap_or(source);
        for entry in WalkDir::new(source).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Cannot read '{}'", display(source)))?;
            let path = entry.path();
            if path == archive {
                continue;
            }
            let name = entry_name(path.strip_prefix(base)?);
            if entry.file_type().is_dir() {
                writer.add_directory(name, options)?;
            } else if entry.file_type().is_file() {
                writer.start_file(name, options)?;
                let mut input = File::open(path)
                    .with_context(|| format!("Cannot read '{}'", display(path)))?;
                io::copy(&mut input, &mut writer)?;
                count += 1;
            }
        }
    } else {
        let name = commons::file_name(source)?.to_string_lossy().into_owned();
        writer.start_file(name, options)?;
        let mut input =
            File::open(source).with_context(|| format!("Cannot read '{}'", display(source)))?;
        io::copy(&mut input, &mut writer)?;
        count = 1;
    }

    let mut tmp = writer.finish()?;
    tmp.flush()?;
    tmp.persist(archive)
        .with_context(|| format!("Cannot create '{}'", display(archive)))?;
    Ok(count)
}

/// Archive entry names always use `/`.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
