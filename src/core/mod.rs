// src/core/mod.rs

//! Line parsing, name resolution, persistence and the path index.

pub mod config;
pub mod errors;
pub mod expansion;
pub mod lexer;
pub mod path_index;
pub mod path_query;
pub mod paths;
pub mod resolver;
pub mod safety;
pub mod store;
pub mod variables;
