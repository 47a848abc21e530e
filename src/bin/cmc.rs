// src/bin/cmc.rs

use anyhow::Result;
use clap::Parser;
use cmc::{
    cli::{
        Cli,
        dispatcher::{ChainReport, StepRecord, StepStatus},
    },
    core::errors::CmcError,
    session::Session,
};
use colored::*;
use dialoguer::{Input, theme::ColorfulTheme};
use std::io::{self, BufRead, IsTerminal};

/// Sets up logging, opens the session and runs either the one-shot line or
/// the read loop. Startup failures are printed and exit with status 1.
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    log::debug!("CLI args parsed: {:?}", cli);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let mut session = Session::open_default()?;

    if let Some(line) = cli.one_shot() {
        let clean = run_one(&mut session, &line);
        session.flush()?;
        return Ok(if clean { 0 } else { 1 });
    }

    if io::stdin().is_terminal() {
        interactive_loop(&mut session)?;
    } else {
        for line in io::stdin().lock().lines() {
            let line = line?;
            run_one(&mut session, &line);
            if session.exit_requested() {
                break;
            }
        }
    }

    session.flush()?;
    Ok(0)
}

fn interactive_loop(session: &mut Session) -> Result<()> {
    println!(
        "{} {}",
        "cmc".cyan().bold(),
        "type 'help' for commands, 'exit' to leave.".dimmed()
    );
    println!("{}", session.safety().summary().dimmed());

    let theme = ColorfulTheme::default();
    while !session.exit_requested() {
        let prompt = cmc::cli::handlers::commons::display(session.cwd());
        let line: String = match Input::with_theme(&theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            Err(e) => {
                // Ctrl+C / closed terminal ends the session normally.
                log::debug!("Input ended: {}", e);
                break;
            }
        };
        run_one(session, &line);
    }
    Ok(())
}

/// Runs one line and prints it step by step. Returns whether it ran cleanly.
fn run_one(session: &mut Session, line: &str) -> bool {
    match session.run_line_with(line, &mut print_record) {
        Ok(report) => {
            print_summary(&report);
            report.is_clean()
        }
        Err(e) => {
            print_line_error(&e);
            false
        }
    }
}

fn print_record(record: &StepRecord) {
    match &record.status {
        StepStatus::Completed(outcome) => {
            println!("{} {}", "→".cyan(), record.text);
            if outcome.message.is_empty() {
                return;
            }
            if outcome.simulated {
                println!("{}", outcome.message.yellow());
            } else {
                println!("{}", outcome.message);
            }
        }
        StepStatus::Failed(error) => {
            println!("{} {}", "→".cyan(), record.text);
            eprintln!("{} {}", "✗".red().bold(), error.to_string().red());
        }
        StepStatus::Declined => {
            println!("{} {}", "→".cyan(), record.text);
            println!("{}", "Declined.".yellow());
        }
        StepStatus::Skipped => {
            println!("{} {}", "·".dimmed(), format!("skipped: {}", record.text).dimmed());
        }
    }
}

fn print_summary(report: &ChainReport) {
    if let Some(fatal) = &report.fatal {
        eprintln!("{}", fatal.to_string().red().bold());
    }
    if report.is_clean() {
        return;
    }
    println!(
        "{}",
        format!(
            "{} executed, {} failed, {} skipped",
            report.executed, report.failed, report.skipped
        )
        .dimmed()
    );
}

fn print_line_error(error: &CmcError) {
    // Nothing ran: the whole line was rejected while planning.
    eprintln!("{}: {}", "Error".red().bold(), error);
    if error.is_cycle() {
        eprintln!("{}", "Nothing was executed.".dimmed());
    }
}
