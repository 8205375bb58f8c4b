//! Session lifecycle: handles a single client from accept through teardown.

use std::sync::Arc;

use pointrelay_core::{ConnectionId, RelayError};
use pointrelay_core::dispatch::{CommandDispatcher, Dispatch};
use pointrelay_core::protocol::{self, Command};
use pointrelay_core::rate_limit::{RateDecision, RateLimiter};
use pointrelay_core::registry::TeardownNotice;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::{ConnectionDirectory, PeerSignal};
use super::watchdog::IdleWatchdog;
use crate::config::SessionPolicy;
use crate::transport::Transport;

/// Shared state every session needs.
#[derive(Clone)]
pub struct SessionContext {
    /// Command router over the shared registry.
    pub dispatcher: CommandDispatcher,
    /// Live connections, for cross-session eviction.
    pub directory: Arc<ConnectionDirectory>,
    /// Idle and rate limits.
    pub policy: SessionPolicy,
    /// Server-wide shutdown signal.
    pub shutdown: CancellationToken,
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client sent `quit`.
    Quit,
    /// Transport closed or errored.
    Closed,
    /// No command within the idle timeout.
    IdleTimeout,
    /// Too many rate violations.
    RateLimited,
    /// The point this connection controlled was removed.
    Evicted,
    /// Server shutting down.
    Shutdown,
}

enum Event {
    Frame(Option<String>),
    Idle,
    Peer(Option<PeerSignal>),
    Shutdown,
}

/// Run a session until the client leaves or is disconnected.
///
/// 1. Registers the connection in the directory
/// 2. Reads frames, applies rate limiting, dispatches and replies
/// 3. Closes on idle timeout, eviction, or shutdown
/// 4. Tears down registry state and notifies affected controllers
#[instrument(skip_all, fields(connection_id = %conn))]
pub async fn run_session<T: Transport>(
    mut transport: T,
    conn: ConnectionId,
    ctx: SessionContext,
) -> SessionEnd {
    let mut signals = ctx.directory.register(conn.clone());
    let mut watchdog = IdleWatchdog::new(ctx.policy.idle_timeout);
    let mut limiter = RateLimiter::new(ctx.policy.rate, Instant::now().into_std());
    info!("client connected");

    let end = loop {
        let event = tokio::select! {
            frame = transport.recv() => Event::Frame(frame),
            () = watchdog.expired() => Event::Idle,
            signal = signals.recv() => Event::Peer(signal),
            () = ctx.shutdown.cancelled() => Event::Shutdown,
        };

        match event {
            Event::Frame(None) => break SessionEnd::Closed,
            Event::Frame(Some(line)) => {
                watchdog.touch();
                if let Some(end) =
                    handle_frame(&mut transport, &conn, &ctx.dispatcher, &mut limiter, &line)
                        .await
                {
                    break end;
                }
            }
            Event::Idle => {
                info!(timeout = ?watchdog.timeout(), "idle timeout");
                let _ = transport.send(protocol::CONNECTION_CLOSED.to_string()).await;
                break SessionEnd::IdleTimeout;
            }
            Event::Peer(Some(PeerSignal::Evict { notice })) => {
                let _ = transport.send(notice).await;
                break SessionEnd::Evicted;
            }
            // Directory dropped our sender; nobody can reach us any more
            Event::Peer(None) => break SessionEnd::Evicted,
            Event::Shutdown => break SessionEnd::Shutdown,
        }
    };

    teardown(&conn, &ctx);
    transport.close().await;
    info!(?end, "client disconnected");
    end
}

/// Handle one inbound frame. Returns `Some` when the session must end.
async fn handle_frame<T: Transport>(
    transport: &mut T,
    conn: &ConnectionId,
    dispatcher: &CommandDispatcher,
    limiter: &mut RateLimiter,
    line: &str,
) -> Option<SessionEnd> {
    let parsed = Command::parse(line);
    // quit is honoured regardless of rate state
    if matches!(parsed, Ok(Command::Quit)) {
        debug!("quit requested");
        return Some(SessionEnd::Quit);
    }

    match limiter.check(Instant::now().into_std()) {
        RateDecision::Allow => {}
        RateDecision::Throttle { delay } => {
            warn!(violations = limiter.violations(), ?delay, "throttling client");
            return (!transport.send(protocol::throttle_reply(delay)).await)
                .then_some(SessionEnd::Closed);
        }
        RateDecision::Disconnect => {
            warn!(violations = limiter.violations(), "rate limit exceeded, disconnecting");
            let _ = transport.send(protocol::TOO_MANY_REQUESTS.to_string()).await;
            return Some(SessionEnd::RateLimited);
        }
    }

    // A frame without parameters is answered but does not count as a command
    let counts = !matches!(parsed, Err(RelayError::MissingParams));
    let reply = match dispatcher.execute(conn, parsed) {
        Dispatch::Quit => return Some(SessionEnd::Quit),
        Dispatch::Reply(reply) => reply,
    };
    let delivered = transport.send(reply).await;
    if counts {
        limiter.record(Instant::now().into_std());
    }
    (!delivered).then_some(SessionEnd::Closed)
}

/// Release everything this connection held and evict orphaned controllers.
///
/// Safe to call more than once.
fn teardown(conn: &ConnectionId, ctx: &SessionContext) {
    for notice in ctx.dispatcher.registry().teardown(conn) {
        match notice {
            TeardownNotice::OwnerGone { controller, point } => {
                let delivered = ctx.directory.signal(
                    &controller,
                    PeerSignal::Evict {
                        notice: protocol::OWNER_GONE.to_string(),
                    },
                );
                info!(point = %point, controller = %controller, delivered, "owner gone, evicting controller");
            }
        }
    }
    ctx.directory.unregister(conn);
}
