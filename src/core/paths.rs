// src/core/paths.rs

//! Locations of the config directory and the files inside it.

use crate::constants::CONFIG_DIR_NAME;
use lazy_static::lazy_static;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

lazy_static! {
    static ref CMC_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

/// Errors raised while locating cmc directories.
#[derive(Error, Debug)]
pub enum PathError {
    /// The platform has no config directory.
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    /// `~/.config/cmc` could not be created.
    #[error("Could not create config directory at '{path}': {source}")]
    ConfigDirCreation {
        /// The directory that was being created.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Returns the path to the cmc configuration directory (`~/.config/cmc`).
/// Creates it if it doesn't exist.
///
/// This function is memoized: the first call computes and caches the path,
/// subsequent calls return the cached value instantly.
pub fn get_cmc_config_dir() -> Result<PathBuf, PathError> {
    let mut cached_path_guard = CMC_CONFIG_DIR
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(path) = &*cached_path_guard {
        return Ok(path.clone());
    }

    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME);
    ensure_dir(&config_path)?;

    *cached_path_guard = Some(config_path.clone());
    Ok(config_path)
}

/// Creates `path` (and its parents) when missing.
pub fn ensure_dir(path: &Path) -> Result<(), PathError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| PathError::ConfigDirCreation {
            path: path.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}

/// Resolves user input against the session's working directory.
///
/// `~` is expanded, relative paths are joined onto `cwd`, and `.`/`..`
/// components are folded lexically (the target does not need to exist).
pub fn resolve_user_path(cwd: &Path, input: &str) -> PathBuf {
    let expanded = shellexpand::tilde(input.trim());
    let candidate = PathBuf::from(expanded.as_ref());
    let joined = if candidate.is_absolute() || has_drive_prefix(expanded.as_ref()) {
        candidate
    } else {
        cwd.join(candidate)
    };
    clean_components(&joined)
}

fn has_drive_prefix(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 2
        && bytes.first().is_some_and(u8::is_ascii_alphabetic)
        && bytes.get(1) == Some(&b':')
}

fn clean_components(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    cleaned.push(component);
                }
            }
            other => cleaned.push(other),
        }
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}

/// Canonical string form of a path for the index.
pub fn normalize_path(path: &Path) -> String {
    normalize_str(&dunce::simplified(path).to_string_lossy())
}

/// Uses `/` as the only separator, collapses repeated separators and drops a
/// trailing separator unless the path is a root (`/` or `C:/`).
pub fn normalize_str(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    let mut previous_was_separator = false;
    for ch in raw.chars() {
        let is_separator = ch == '/' || ch == '\\';
        if is_separator && previous_was_separator {
            continue;
        }
        previous_was_separator = is_separator;
        normalized.push(if is_separator { '/' } else { ch });
    }
    while normalized.len() > 1 && normalized.ends_with('/') && !is_drive_root(&normalized) {
        normalized.pop();
    }
    normalized
}

fn is_drive_root(text: &str) -> bool {
    text.len() == 3 && has_drive_prefix(text) && text.ends_with('/')
}

/// True when `path` equals `root` or lies below it (both normalized).
pub fn is_under(path: &str, root: &str) -> bool {
    if root.ends_with('/') {
        return path.starts_with(root);
    }
    path == root
        || (path.starts_with(root) && path.as_bytes().get(root.len()) == Some(&b'/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_str() {
        assert_eq!(normalize_str(r"C:\Users\\me\"), "C:/Users/me");
        assert_eq!(normalize_str("/srv//data///"), "/srv/data");
        assert_eq!(normalize_str("/"), "/");
        assert_eq!(normalize_str(r"D:\"), "D:/");
        assert_eq!(normalize_str("relative/dir/"), "relative/dir");
    }

    #[test]
    fn test_is_under() {
        assert!(is_under("/srv/data", "/srv"));
        assert!(is_under("/srv", "/srv"));
        assert!(!is_under("/srvx/data", "/srv"));
        assert!(is_under("/anything", "/"));
        assert!(is_under("C:/x", "C:/"));
    }

    #[test]
    fn test_resolve_user_path_folds_dots() {
        let cwd = Path::new("/work/project");
        assert_eq!(resolve_user_path(cwd, "src/../docs/./a.md"), PathBuf::from("/work/project/docs/a.md"));
        assert_eq!(resolve_user_path(cwd, "/etc/hosts"), PathBuf::from("/etc/hosts"));
        assert_eq!(resolve_user_path(cwd, ".."), PathBuf::from("/work"));
    }
}
