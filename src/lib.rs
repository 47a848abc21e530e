//! `cmc`: a local command console.
//!
//! Lines are split into chained segments, resolved against built-ins, aliases
//! and macros, and executed under a confirmation / dry-run policy. A parallel
//! path index backs the `qfind` family of commands.

pub mod cli;
pub mod constants;
pub mod core;
pub mod dev_utils;
pub mod models;
pub mod session;
pub mod system;
