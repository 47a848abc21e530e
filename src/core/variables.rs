// src/core/variables.rs

//! `%DATE%`, `%NOW%` and `%HOME%` expansion.

use chrono::{DateTime, Local};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::borrow::Cow;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex =
        Regex::new(r"%([A-Za-z_]+)%").expect("placeholder pattern is a valid regex");
}

/// A source of the current time, injectable so expansions can be tested.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

/// The wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// The values of `%DATE%`, `%NOW%` and `%HOME%` captured at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeVariables {
    date: String,
    now: String,
    home: String,
}

impl RuntimeVariables {
    /// Values frozen at `time`.
    pub fn at(time: DateTime<Local>, home: impl Into<String>) -> Self {
        Self {
            date: time.format("%Y-%m-%d").to_string(),
            now: time.format("%Y-%m-%d_%H-%M-%S").to_string(),
            home: home.into(),
        }
    }

    /// Value of a recognized variable. Names are case-sensitive.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "DATE" => Some(&self.date),
            "NOW" => Some(&self.now),
            "HOME" => Some(&self.home),
            _ => None,
        }
    }

    /// Replaces every recognized `%NAME%` token in a single pass.
    /// Unrecognized tokens are left exactly as written.
    pub fn expand<'t>(&self, text: &'t str) -> Cow<'t, str> {
        PLACEHOLDER_RE.replace_all(text, |caps: &Captures<'_>| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            caps.get(1)
                .and_then(|name| self.lookup(name.as_str()))
                .unwrap_or(whole)
                .to_string()
        })
    }
}
