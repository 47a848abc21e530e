// src/session.rs

//! The explicit context every command runs against.
//!
//! A [`Session`] owns the Safety State, the working directory, the macro and
//! alias stores, the path index, the action journal and the undo stack. It is
//! passed by `&mut` to the dispatcher and to every handler; nothing here is
//! global.

use crate::cli::dispatcher::{self, BuiltinVerbs, ChainReport, StepRecord};
use crate::constants::{
    ALIASES_FILENAME, JOURNAL_DISPLAY_LIMIT, MACROS_FILENAME, MAX_NESTING_DEPTH,
    PATH_INDEX_FILENAME,
};
use crate::core::config::{self, CmcConfig};
use crate::core::errors::CmcError;
use crate::core::expansion::{self, PlanContext, PlannedStep};
use crate::core::path_index::PathIndex;
use crate::core::paths;
use crate::core::safety::{Confirmer, DialoguerConfirmer, SafetyState};
use crate::core::store::{self, AliasStore, MacroStore, NamedStore, StoreError};
use crate::core::variables::{Clock, RuntimeVariables, SystemClock};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A reversible filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoRecord {
    /// `"move"` or `"rename"`.
    pub kind: &'static str,
    /// Where the object is now.
    pub current: PathBuf,
    /// Where it was before.
    pub original: PathBuf,
}

/// All state of one console: safety flags, stores, navigation, journal and undo.
pub struct Session {
    pub(crate) safety: SafetyState,
    pub(crate) config: CmcConfig,
    pub(crate) confirmer: Box<dyn Confirmer>,
    pub(crate) macros: MacroStore,
    pub(crate) aliases: AliasStore,
    cwd: PathBuf,
    history: Vec<PathBuf>,
    home: PathBuf,
    index: Arc<PathIndex>,
    journal: Vec<String>,
    undo: Vec<UndoRecord>,
    clock: Box<dyn Clock>,
    exit_requested: bool,
    depth: usize,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("safety", &self.safety)
            .field("cwd", &self.cwd)
            .field("macros", &self.macros.len())
            .field("aliases", &self.aliases.len())
            .field("indexed", &self.index.count())
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Opens a session backed by the files in the user's config directory.
    pub fn open_default() -> Result<Self> {
        let config_dir = paths::get_cmc_config_dir()?;
        Self::open(&config_dir)
    }

    /// Opens a session backed by the files in `config_dir`.
    ///
    /// A corrupt path index is discarded (and logged); corrupt macro or
    /// alias files are reported as errors so they are never overwritten.
    pub fn open(config_dir: &Path) -> Result<Self> {
        paths::ensure_dir(config_dir)?;
        let config = config::load_or_create(config_dir)?;
        let macros = store::open_json_store(config_dir.join(MACROS_FILENAME))
            .context("Failed to load the macro store")?;
        let aliases = store::open_json_store(config_dir.join(ALIASES_FILENAME))
            .context("Failed to load the alias store")?;
        let index = PathIndex::open_or_reset(config_dir.join(PATH_INDEX_FILENAME));
        let cwd = std::env::current_dir().context("Failed to read the working directory")?;
        let home = dirs::home_dir().unwrap_or_else(|| cwd.clone());

        log::debug!(
            "Session opened from '{}' ({} macros, {} aliases, {} indexed paths)",
            config_dir.display(),
            macros.len(),
            aliases.len(),
            index.count()
        );

        Ok(Self {
            safety: config.initial_safety(),
            config,
            confirmer: Box::new(DialoguerConfirmer),
            macros,
            aliases,
            cwd: dunce::simplified(&cwd).to_path_buf(),
            history: Vec::new(),
            home,
            index: Arc::new(index),
            journal: Vec::new(),
            undo: Vec::new(),
            clock: Box::new(SystemClock),
            exit_requested: false,
            depth: 0,
        })
    }

    /// A session with default settings and nothing persisted.
    pub fn in_memory(cwd: impl Into<PathBuf>, confirmer: Box<dyn Confirmer>) -> Self {
        let cwd = cwd.into();
        let config = CmcConfig::default();
        Self {
            safety: config.initial_safety(),
            config,
            confirmer,
            macros: NamedStore::in_memory(),
            aliases: NamedStore::in_memory(),
            home: cwd.clone(),
            cwd,
            history: Vec::new(),
            index: Arc::new(PathIndex::in_memory()),
            journal: Vec::new(),
            undo: Vec::new(),
            clock: Box::new(SystemClock),
            exit_requested: false,
            depth: 0,
        }
    }

    /// Replaces the clock used for `%DATE%` and `%NOW%`.
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the configuration and re-seeds the Safety State from it.
    pub fn with_config(mut self, config: CmcConfig) -> Self {
        self.safety = config.initial_safety();
        self.config = config;
        self
    }

    /// Replaces the home directory used by `home` and `%HOME%`.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    // --- Accessors ---

    /// Current safety flags.
    pub fn safety(&self) -> &SafetyState {
        &self.safety
    }

    /// Loaded configuration.
    pub fn config(&self) -> &CmcConfig {
        &self.config
    }

    /// Current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Home directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Macro store.
    pub fn macros(&self) -> &MacroStore {
        &self.macros
    }

    /// Alias store.
    pub fn aliases(&self) -> &AliasStore {
        &self.aliases
    }

    /// Shared path index.
    pub fn index(&self) -> &Arc<PathIndex> {
        &self.index
    }

    /// Side effects recorded so far, oldest first.
    pub fn journal(&self) -> &[String] {
        &self.journal
    }

    /// True after `exit`.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Current local time from the session clock.
    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    /// `%DATE%`, `%NOW%` and `%HOME%` as of this instant.
    pub fn variables(&self) -> RuntimeVariables {
        RuntimeVariables::at(self.now(), dunce::simplified(&self.home).display().to_string())
    }

    // --- Line execution ---

    /// Plans a line without running anything.
    pub fn plan(&self, line: &str) -> Result<Vec<PlannedStep>, CmcError> {
        let variables = self.variables();
        let ctx = PlanContext {
            verbs: &BuiltinVerbs,
            aliases: &self.aliases,
            macros: &self.macros,
            variables: &variables,
        };
        expansion::plan_line(line, &ctx)
    }

    /// Runs one input line and reports every step.
    pub fn run_line(&mut self, line: &str) -> Result<ChainReport, CmcError> {
        self.run_line_with(line, &mut |_| {})
    }

    /// Plans and runs one input line, reporting every step to `observer` as
    /// soon as it finishes.
    ///
    /// # Errors
    /// Syntax, resolution and cycle errors. Nothing has run in that case.
    /// Failures of individual steps are part of the returned report.
    pub fn run_line_with(
        &mut self,
        line: &str,
        observer: &mut dyn FnMut(&StepRecord),
    ) -> Result<ChainReport, CmcError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(ChainReport::default());
        }

        let steps = self.plan(trimmed)?;
        let report = dispatcher::dispatch(self, steps, observer);

        if let Err(e) = self.flush() {
            log::warn!("Failed to save stores: {}", e);
        }
        Ok(report)
    }

    /// Runs already planned steps from inside a handler (`timer`).
    pub(crate) fn run_nested(&mut self, steps: Vec<PlannedStep>) -> Result<ChainReport> {
        if self.depth >= MAX_NESTING_DEPTH {
            bail!(
                "Nested execution is limited to {} levels.",
                MAX_NESTING_DEPTH
            );
        }
        self.depth += 1;
        let mut nested = scopeguard::guard(self, |s| s.depth -= 1);
        let report = dispatcher::dispatch(&mut nested, steps, &mut |record: &StepRecord| {
            log::debug!("nested: {} -> {:?}", record.text, record.status);
        });
        Ok(report)
    }

    /// Writes pending macro and alias changes.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.macros.flush()? {
            log::debug!("Macro store saved");
        }
        if self.aliases.flush()? {
            log::debug!("Alias store saved");
        }
        Ok(())
    }

    pub(crate) fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    // --- Navigation ---

    /// Resolves user input relative to the session's working directory.
    pub fn resolve_path(&self, input: &str) -> PathBuf {
        paths::resolve_user_path(&self.cwd, input)
    }

    pub(crate) fn change_dir(&mut self, target: PathBuf) {
        let previous = std::mem::replace(&mut self.cwd, target);
        self.history.push(previous);
    }

    /// Returns to the previous directory, if there is one.
    pub(crate) fn go_back(&mut self) -> Option<&Path> {
        let previous = self.history.pop()?;
        self.cwd = previous;
        Some(&self.cwd)
    }

    // --- Journal & undo ---

    /// Appends a `[YYYY-MM-DD HH:MM:SS] TEXT` line to the action journal.
    pub(crate) fn record(&mut self, text: &str) {
        let stamp = self.now().format("%Y-%m-%d %H:%M:%S");
        self.journal.push(format!("[{}] {}", stamp, text));
    }

    /// The newest journal entries, oldest first.
    pub fn recent_journal(&self) -> &[String] {
        let start = self.journal.len().saturating_sub(JOURNAL_DISPLAY_LIMIT);
        self.journal.get(start..).unwrap_or_default()
    }

    pub(crate) fn push_undo(&mut self, record: UndoRecord) {
        self.undo.push(record);
    }

    pub(crate) fn last_undo(&self) -> Option<&UndoRecord> {
        self.undo.last()
    }

    pub(crate) fn pop_undo(&mut self) -> Option<UndoRecord> {
        self.undo.pop()
    }
}
