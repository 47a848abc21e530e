// src/core/safety.rs

//! Batch, dry-run and SSL flags, and the confirmation gate.

use crate::models::{Classification, Mode};
use anyhow::Result;
use dialoguer::{Confirm, theme::ColorfulTheme};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// The session's safety flags. Each flag is toggled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyState {
    /// Skip confirmation prompts.
    pub batch: bool,
    /// Run handlers in simulate mode.
    pub dry_run: bool,
    /// Verify TLS certificates on downloads.
    pub ssl_verify: bool,
}

impl Default for SafetyState {
    fn default() -> Self {
        Self {
            batch: false,
            dry_run: false,
            ssl_verify: true,
        }
    }
}

impl SafetyState {
    /// `Simulate` while dry-run is on.
    pub fn mode(&self) -> Mode {
        if self.dry_run {
            Mode::Simulate
        } else {
            Mode::Execute
        }
    }

    /// True when `classification` is destructive and batch is off.
    pub fn needs_confirmation(&self, classification: Classification) -> bool {
        classification.is_destructive() && !self.batch
    }

    /// One-line summary, e.g. `Batch: OFF | Dry-Run: ON | SSL: ON`.
    pub fn summary(&self) -> String {
        format!(
            "Batch: {} | Dry-Run: {} | SSL: {}",
            on_off(self.batch),
            on_off(self.dry_run),
            on_off(self.ssl_verify)
        )
    }
}

/// `"ON"` or `"OFF"`.
pub fn on_off(flag: bool) -> &'static str {
    if flag { "ON" } else { "OFF" }
}

/// Parses `on`/`off` style switch words.
pub fn parse_switch(word: &str) -> Option<bool> {
    match word.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Asks the user a yes/no question.
pub trait Confirmer {
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Interactive prompt on the terminal. Defaults to "no".
#[derive(Debug, Default)]
pub struct DialoguerConfirmer;

impl Confirmer for DialoguerConfirmer {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        Ok(Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()?)
    }
}

/// Answers prompts from a fixed list and records every prompt it was shown.
/// Once the answers run out every further prompt is declined.
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answers: VecDeque<bool>,
    prompts: Rc<RefCell<Vec<String>>>,
}

impl ScriptedConfirmer {
    /// A confirmer that answers with `answers` in order, then declines.
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            prompts: Rc::default(),
        }
    }

    /// Shared handle on the prompts shown so far.
    pub fn prompt_log(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.prompts)
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok(self.answers.pop_front().unwrap_or(false))
    }
}

/// Result of passing one action through the confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Run the action in the given mode.
    Proceed(Mode),
    /// The user answered "no".
    Declined,
}

/// Applies the confirmation policy for one action.
///
/// Destructive actions prompt unless batch mode is on. Dry-run does not skip
/// the prompt; it only selects `Mode::Simulate` once the action is allowed.
/// A prompt that cannot be shown counts as a "no".
pub fn gate(
    state: &SafetyState,
    classification: Classification,
    prompt: &str,
    confirmer: &mut dyn Confirmer,
) -> GateDecision {
    if state.needs_confirmation(classification) {
        match confirmer.confirm(prompt) {
            Ok(true) => {}
            Ok(false) => return GateDecision::Declined,
            Err(e) => {
                log::warn!("Confirmation prompt failed, treating as declined: {}", e);
                return GateDecision::Declined;
            }
        }
    } else if classification.is_destructive() {
        log::debug!("Batch mode: auto-confirmed '{}'", prompt);
    }
    GateDecision::Proceed(state.mode())
}
