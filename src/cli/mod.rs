// src/cli/mod.rs

//! Command-line arguments, the command registry and its handlers.

use clap::Parser;

pub mod dispatcher;
pub mod handlers;

/// cmc: a local command console.
///
/// Without arguments, cmc reads lines from the terminal (or from piped
/// stdin) until `exit`. Chain commands with `;`, define shortcuts with
/// `alias add` and `macro add`, and type `help` for the command list.
///
/// With arguments, they are joined into a single line, run once, and cmc
/// exits.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// A line to run instead of starting the console, e.g. `cmc "qfind server logs"`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub line: Vec<String>,
}

impl Cli {
    /// The one-shot line, if any was given.
    pub fn one_shot(&self) -> Option<String> {
        if self.line.is_empty() {
            None
        } else {
            Some(self.line.join(" "))
        }
    }
}
