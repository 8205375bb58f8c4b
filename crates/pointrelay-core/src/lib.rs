//! # pointrelay-core
//!
//! Transport-agnostic rendezvous engine for the pointrelay server.
//!
//! - **IDs**: [`ConnectionId`] newtype identifying one transport session
//! - **Registry**: point table and per-connection role lock behind a single mutex
//! - **Rate limiting**: escalating per-connection request throttle
//! - **Protocol**: command parsing, dispatch onto the registry, wire replies
//! - **Errors**: [`RelayError`] whose `Display` text is the wire message
//! - **Logging**: global `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod dispatch;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod protocol;
pub mod rate_limit;
pub mod registry;

pub use errors::{ErrorKind, RelayError, Result};
pub use ids::ConnectionId;
pub use registry::Registry;
