//! # pointrelay-server
//!
//! Axum WebSocket front end for the rendezvous registry.
//!
//! - `WebSocket` gateway: one [`websocket::session`] per connection
//! - Per-connection idle watchdog and request-rate enforcement
//! - Peer eviction when a point owner disconnects
//! - `/health` endpoint with live connection and point counts
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod transport;
pub mod websocket;
