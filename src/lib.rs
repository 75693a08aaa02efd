// ABOUTME: Library root for guardian - exposes the remote execution and trust subsystem.
// ABOUTME: The main binary is in main.rs.

pub mod backup;
pub mod config;
pub mod error;
pub mod output;
pub mod prompt;
pub mod ssh;
pub mod workspace;
