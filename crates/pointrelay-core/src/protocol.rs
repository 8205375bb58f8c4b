//! Line protocol: command parsing and reply texts.
//!
//! A command is one text frame of space-delimited tokens. The first token is
//! the verb; the rest are parameters. Replies are plain text, errors carry an
//! `ERR: ` prefix.

use std::time::Duration;

use crate::errors::{RelayError, Result};

/// Prefix for every error reply.
pub const ERR_PREFIX: &str = "ERR: ";

/// Reply to a successful `send`.
pub const SENT_ACTION: &str = "Sent action";

/// Sent when the connection is dropped for rate violations.
pub const TOO_MANY_REQUESTS: &str = "ERR: Too many requests.";

/// Sent when the idle watchdog fires.
pub const CONNECTION_CLOSED: &str = "ERR: Connection closed.";

/// Sent to a controller whose point owner went away.
pub const OWNER_GONE: &str = "ERR: Connection closed by point. Press any key to continue";

/// Reply to `join-point` when the point is missing or no longer open.
pub const JOIN_UNAVAILABLE: &str = "ERR: point doesn't exist or has already been occupied.";

/// A parsed client command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Close the connection.
    Quit,
    /// `set-point <point>`
    SetPoint {
        /// Point name.
        point: String,
    },
    /// `join-point <point>`
    JoinPoint {
        /// Point name.
        point: String,
    },
    /// `send <point> <words...>`
    Send {
        /// Point name.
        point: String,
        /// Remaining words joined by single spaces; may be empty.
        payload: String,
    },
    /// `get <point>`
    Get {
        /// Point name.
        point: String,
    },
}

impl Command {
    /// Parse one frame.
    ///
    /// Tokens are separated by spaces. `quit` needs no parameters. Any other
    /// frame without parameters is [`RelayError::MissingParams`], even if the
    /// verb is unknown; an unknown verb with parameters is
    /// [`RelayError::UnknownCommand`]. A `send` payload is the rest of the
    /// line after the point name, spacing and all.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (verb, rest) = next_token(line);
        if verb == "quit" {
            return Ok(Self::Quit);
        }

        let (point, payload) = next_token(rest);
        if point.is_empty() {
            return Err(RelayError::MissingParams);
        }
        let point = point.to_owned();

        match verb {
            "set-point" => Ok(Self::SetPoint { point }),
            "join-point" => Ok(Self::JoinPoint { point }),
            "get" => Ok(Self::Get { point }),
            "send" => Ok(Self::Send {
                point,
                payload: payload.to_owned(),
            }),
            _ => Err(RelayError::UnknownCommand),
        }
    }

    /// Verb as written on the wire.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::SetPoint { .. } => "set-point",
            Self::JoinPoint { .. } => "join-point",
            Self::Send { .. } => "send",
            Self::Get { .. } => "get",
        }
    }
}

/// Split off the next space-delimited token. The remainder starts after the
/// single separating space and is otherwise untouched.
fn next_token(s: &str) -> (&str, &str) {
    let s = s.trim_start_matches(' ');
    s.split_once(' ').unwrap_or((s, ""))
}

/// Render an error as a reply frame.
pub fn error_reply(err: &RelayError) -> String {
    format!("{ERR_PREFIX}{err}")
}

/// Reply to a successful `set-point`.
pub fn point_set_reply(point: &str) -> String {
    format!("Point set on: {point}")
}

/// Reply to a successful `join-point`.
pub fn joined_reply(point: &str) -> String {
    format!("Joined point: {point}")
}

/// Notice sent when a command is suppressed by the rate limiter.
pub fn throttle_reply(delay: Duration) -> String {
    format!(
        "{ERR_PREFIX}You are sending requests too fast! Time before you can OPEN YOUR MOUTH to SPEAK again: {:?}",
        delay.as_secs_f64()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parse_quit() {
        assert_eq!(Command::parse("quit"), Ok(Command::Quit));
        assert_eq!(Command::parse("quit now"), Ok(Command::Quit));
    }

    #[test]
    fn parse_set_and_join() {
        assert_eq!(
            Command::parse("set-point foo"),
            Ok(Command::SetPoint { point: "foo".into() })
        );
        assert_eq!(
            Command::parse("join-point foo"),
            Ok(Command::JoinPoint { point: "foo".into() })
        );
    }

    #[test]
    fn parse_send_keeps_payload_verbatim() {
        assert_eq!(
            Command::parse("send foo move   left"),
            Ok(Command::Send {
                point: "foo".into(),
                payload: "move   left".into(),
            })
        );
        assert_eq!(
            Command::parse("send foo x  =  1\ty"),
            Ok(Command::Send {
                point: "foo".into(),
                payload: "x  =  1\ty".into(),
            })
        );
    }

    #[test]
    fn parse_tolerates_extra_separators_before_payload() {
        assert_eq!(
            Command::parse("  send   foo  left\r\n"),
            Ok(Command::Send {
                point: "foo".into(),
                payload: " left".into(),
            })
        );
        assert_eq!(
            Command::parse("get foo\n"),
            Ok(Command::Get { point: "foo".into() })
        );
    }

    #[test]
    fn parse_send_without_words_has_empty_payload() {
        assert_matches!(
            Command::parse("send foo"),
            Ok(Command::Send { payload, .. }) if payload.is_empty()
        );
    }

    #[test]
    fn parse_get() {
        assert_eq!(Command::parse("get foo"), Ok(Command::Get { point: "foo".into() }));
    }

    #[test]
    fn missing_params() {
        assert_eq!(Command::parse("get"), Err(RelayError::MissingParams));
        assert_eq!(Command::parse(""), Err(RelayError::MissingParams));
        assert_eq!(Command::parse("   "), Err(RelayError::MissingParams));
        assert_eq!(Command::parse("bogus"), Err(RelayError::MissingParams));
    }

    #[test]
    fn unknown_verb() {
        assert_eq!(Command::parse("bogus foo"), Err(RelayError::UnknownCommand));
        assert_eq!(Command::parse("sendx foo bar"), Err(RelayError::UnknownCommand));
    }

    #[test]
    fn verbs() {
        assert_eq!(Command::Quit.verb(), "quit");
        assert_eq!(Command::Get { point: "x".into() }.verb(), "get");
    }

    #[test]
    fn replies() {
        assert_eq!(point_set_reply("foo"), "Point set on: foo");
        assert_eq!(joined_reply("foo"), "Joined point: foo");
        assert_eq!(error_reply(&RelayError::QueueEmpty), "ERR: action list is empty.");
        assert_eq!(
            error_reply(&RelayError::MissingParams),
            "ERR: invalid number of parameters"
        );
    }

    #[test]
    fn throttle_text() {
        assert_eq!(
            throttle_reply(Duration::from_secs(3)),
            "ERR: You are sending requests too fast! Time before you can OPEN YOUR MOUTH to SPEAK again: 3.0"
        );
        assert!(throttle_reply(Duration::from_millis(5500)).ends_with("5.5"));
    }
}
