//! QUINIELA — National Lottery agency client
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod protocol;
pub mod transport;
pub mod records;
pub mod upload;
pub mod session;
pub mod shutdown;
