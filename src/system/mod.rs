//! # System Interaction Layer
//!
//! The boundary between the console and the operating system.
//!
//! - **`executor`**: spawns external processes for `run` and `cmd` (inheriting
//!   the terminal, with the `cmd /C` fallback for Windows built-ins) and hands
//!   paths or URLs to the desktop opener for `open`.

pub mod executor;
