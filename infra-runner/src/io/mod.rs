//! I/O helpers for runner commands.

pub mod config;
pub mod process;
pub mod terraform;
