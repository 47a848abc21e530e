// src/cli/handlers/mod.rs

//! One module per command family. Every handler has the same signature so the
//! registry can hold plain function pointers.

pub mod alias;
pub mod automation;
pub mod commons;
pub mod console;
pub mod download;
pub mod files;
pub mod index;
pub mod macros;
pub mod navigation;
pub mod process;
pub mod search;
