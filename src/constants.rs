// src/constants.rs

//! File names and limits used across the crate.

/// The name of the cmc configuration directory (inside the system config dir).
pub const CONFIG_DIR_NAME: &str = "cmc";

/// The main configuration file (in ~/.config/cmc/).
pub const CONFIG_FILENAME: &str = "config.toml";

/// The persisted macro store.
pub const MACROS_FILENAME: &str = "macros.json";

/// The persisted alias store.
pub const ALIASES_FILENAME: &str = "aliases.json";

/// The persisted path index snapshot.
pub const PATH_INDEX_FILENAME: &str = "paths.idx";

/// The chain separator between command segments.
pub const CHAIN_SEPARATOR: char = ';';

/// Maximum number of nested line executions (`timer` running a macro running a timer...).
pub const MAX_NESTING_DEPTH: usize = 8;

/// Number of journal entries shown by the `log` command.
pub const JOURNAL_DISPLAY_LIMIT: usize = 200;

/// Result limit for `qfind` when none is given.
pub const DEFAULT_QUERY_LIMIT: usize = 20;
/// Lowest accepted `index.default_limit`.
pub const MIN_DEFAULT_QUERY_LIMIT: usize = 15;
/// Highest accepted `index.default_limit`.
pub const MAX_DEFAULT_QUERY_LIMIT: usize = 50;

/// Download size cap (1 GB).
pub const DOWNLOAD_CAP_BYTES: u64 = 1_000_000_000;
