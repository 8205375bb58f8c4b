//! Rendezvous error type.
//!
//! Every variant renders to the exact text sent back to the client (without
//! the `ERR: ` prefix, see [`crate::protocol::error_reply`]). None of these
//! close the connection; rate and idle disconnects are session outcomes, not
//! errors.

use thiserror::Error;

/// Classification of a rejected command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: bad point name, missing parameters, unknown verb.
    Validation,
    /// Well-formed command that the current rendezvous state rejects.
    State,
}

/// Reasons a command is rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Point name length outside `3..=32`.
    #[error("Invalid point name length.")]
    InvalidName,
    /// A point with this name already exists.
    #[error("point has already been set.")]
    NameTaken,
    /// The connection already owns or controls a point.
    #[error("You cannot perform set/join point operations.")]
    RoleConflict,
    /// No point with this name.
    #[error("point doesn't exist.")]
    NotFound,
    /// The point has (or had) a controller.
    #[error("point has already been occupied.")]
    AlreadyOccupied,
    /// No controller is bound to the point.
    #[error("No one has joined point yet.")]
    NotOccupied,
    /// The connection does not hold the role this operation requires.
    #[error("you are NOT him.")]
    WrongRole,
    /// The action queue has nothing to pop.
    #[error("action list is empty.")]
    QueueEmpty,
    /// The command carried no parameters.
    #[error("invalid number of parameters")]
    MissingParams,
    /// The verb is not recognised.
    #[error("invalid request")]
    UnknownCommand,
}

impl RelayError {
    /// Error class for logging and reply handling.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName | Self::MissingParams | Self::UnknownCommand => {
                ErrorKind::Validation
            }
            Self::NameTaken
            | Self::RoleConflict
            | Self::NotFound
            | Self::AlreadyOccupied
            | Self::NotOccupied
            | Self::WrongRole
            | Self::QueueEmpty => ErrorKind::State,
        }
    }
}

/// Result type for registry and dispatch operations.
pub type Result<T> = std::result::Result<T, RelayError>;
