//! CLI command implementations.

pub mod common;
pub mod config;
pub mod grid;
pub mod solve;
pub mod version;
