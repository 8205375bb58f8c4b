//! Command dispatch: routes a parsed command to the registry and renders the
//! single reply frame.

use std::sync::Arc;

use tracing::debug;

use crate::errors::{RelayError, Result};
use crate::ids::ConnectionId;
use crate::protocol::{self, Command};
use crate::registry::Registry;

/// Outcome of dispatching one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Send this reply and keep the session open.
    Reply(String),
    /// The client asked to quit; tear down and close.
    Quit,
}

/// Maps commands onto [`Registry`] operations.
#[derive(Clone, Default)]
pub struct CommandDispatcher {
    registry: Arc<Registry>,
}

impl CommandDispatcher {
    /// Create a dispatcher over a shared registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The registry commands are applied to.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Parse and execute one frame.
    pub fn dispatch(&self, conn: &ConnectionId, line: &str) -> Dispatch {
        self.execute(conn, Command::parse(line))
    }

    /// Execute an already-parsed frame. Parse errors become validation replies.
    pub fn execute(&self, conn: &ConnectionId, parsed: Result<Command>) -> Dispatch {
        let command = match parsed {
            Ok(Command::Quit) => return Dispatch::Quit,
            Ok(command) => command,
            Err(err) => {
                debug!(connection_id = %conn, error = %err, "invalid command");
                return Dispatch::Reply(protocol::error_reply(&err));
            }
        };

        let verb = command.verb();
        let reply = match command {
            Command::SetPoint { point } => self
                .registry
                .create_point(&point, conn)
                .map(|()| protocol::point_set_reply(&point)),
            Command::JoinPoint { point } => match self.registry.join_point(&point, conn) {
                Ok(()) => Ok(protocol::joined_reply(&point)),
                Err(RelayError::NotFound | RelayError::AlreadyOccupied) => {
                    debug!(connection_id = %conn, verb, point = %point, "point unavailable");
                    return Dispatch::Reply(protocol::JOIN_UNAVAILABLE.to_owned());
                }
                Err(err) => Err(err),
            },
            Command::Send { point, payload } => self
                .registry
                .send(&point, conn, payload)
                .map(|()| protocol::SENT_ACTION.to_owned()),
            Command::Get { point } => self.registry.receive(&point, conn),
            Command::Quit => return Dispatch::Quit,
        };

        Dispatch::Reply(reply.unwrap_or_else(|err| {
            debug!(connection_id = %conn, verb, error = %err, kind = ?err.kind(), "command rejected");
            protocol::error_reply(&err)
        }))
    }
}
