//! Connection directory, idle watchdog, and the per-connection session loop.

pub mod connection;
pub mod session;
pub mod watchdog;
