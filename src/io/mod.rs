//! I/O helpers for the orchestrator.

pub mod config;
pub mod discover;
pub mod document_store;
pub mod interrupt;
pub mod paths;
pub mod process;
pub mod retry;
pub mod run_log;
pub mod session;
pub mod worker;
