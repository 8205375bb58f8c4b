//! Point registry: the single source of truth for rendezvous state.
//!
//! The registry owns two tables behind one mutex:
//!
//! - `points`: point name → [`PointRecord`]
//! - `roles`: connection → [`Role`] (the role lock)
//!
//! Every operation takes the lock for its whole duration and never awaits
//! while holding it, so the invariants below hold across threads:
//!
//! - every key in `points` equals its record's `name`
//! - a connection appears in `roles` at most once, and its role names a point
//!   it actually owns or controls
//! - a record exists only between a successful `create_point` and its owner's
//!   teardown

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::debug;

use crate::errors::{RelayError, Result};
use crate::ids::ConnectionId;

/// Minimum point name length in characters.
pub const MIN_POINT_NAME_LEN: usize = 3;

/// Maximum point name length in characters.
pub const MAX_POINT_NAME_LEN: usize = 32;

/// The rendezvous role a connection holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// Created the named point.
    Owner(String),
    /// Joined the named point as its controller.
    Controller(String),
}

impl Role {
    /// Name of the point this role is bound to.
    pub fn point(&self) -> &str {
        match self {
            Self::Owner(p) | Self::Controller(p) => p,
        }
    }
}

/// Controller binding of a point.
///
/// A slot moves `Open → Bound → Vacated` and never goes back: once the
/// controller leaves, the point cannot be joined again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControllerSlot {
    /// No controller has joined yet.
    Open,
    /// A controller is bound.
    Bound(ConnectionId),
    /// The controller disconnected.
    Vacated,
}

/// One named rendezvous point.
#[derive(Clone, Debug)]
pub struct PointRecord {
    name: String,
    owner: ConnectionId,
    controller: ControllerSlot,
    actions: VecDeque<String>,
}

impl PointRecord {
    fn new(name: String, owner: ConnectionId) -> Self {
        Self {
            name,
            owner,
            controller: ControllerSlot::Open,
            actions: VecDeque::new(),
        }
    }

    /// Whether a controller is currently bound.
    pub fn occupied(&self) -> bool {
        matches!(self.controller, ControllerSlot::Bound(_))
    }

    fn controller_id(&self) -> Option<&ConnectionId> {
        match &self.controller {
            ControllerSlot::Bound(id) => Some(id),
            ControllerSlot::Open | ControllerSlot::Vacated => None,
        }
    }
}

/// Read-only view of a point, for health reporting and tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointSnapshot {
    /// Point name.
    pub name: String,
    /// Owning connection.
    pub owner: ConnectionId,
    /// Controller slot state.
    pub controller: ControllerSlot,
    /// Number of queued actions.
    pub pending_actions: usize,
}

impl PointSnapshot {
    /// Whether a controller is currently bound.
    pub fn occupied(&self) -> bool {
        matches!(self.controller, ControllerSlot::Bound(_))
    }
}

/// Message a teardown asks the caller to deliver to another connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TeardownNotice {
    /// The owner of `point` left; its bound controller must be told and closed.
    OwnerGone {
        /// Controller to notify.
        controller: ConnectionId,
        /// Point that was removed.
        point: String,
    },
}

#[derive(Default)]
struct RegistryState {
    points: HashMap<String, PointRecord>,
    roles: HashMap<ConnectionId, Role>,
}

/// Process-wide rendezvous registry.
#[derive(Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
}

/// Check a point name's length (in characters).
pub fn validate_point_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if (MIN_POINT_NAME_LEN..=MAX_POINT_NAME_LEN).contains(&len) {
        Ok(())
    } else {
        Err(RelayError::InvalidName)
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new point owned by `owner`.
    pub fn create_point(&self, name: &str, owner: &ConnectionId) -> Result<()> {
        let mut state = self.state.lock();
        if state.roles.contains_key(owner) {
            return Err(RelayError::RoleConflict);
        }
        validate_point_name(name)?;
        if state.points.contains_key(name) {
            return Err(RelayError::NameTaken);
        }

        let _ = state
            .points
            .insert(name.to_owned(), PointRecord::new(name.to_owned(), owner.clone()));
        let _ = state.roles.insert(owner.clone(), Role::Owner(name.to_owned()));
        debug!(point = name, connection_id = %owner, "point created");
        Ok(())
    }

    /// Bind `controller` to an open point.
    pub fn join_point(&self, name: &str, controller: &ConnectionId) -> Result<()> {
        let mut state = self.state.lock();
        if state.roles.contains_key(controller) {
            return Err(RelayError::RoleConflict);
        }
        let record = state.points.get_mut(name).ok_or(RelayError::NotFound)?;
        if record.controller != ControllerSlot::Open {
            return Err(RelayError::AlreadyOccupied);
        }

        record.controller = ControllerSlot::Bound(controller.clone());
        let _ = state
            .roles
            .insert(controller.clone(), Role::Controller(name.to_owned()));
        debug!(point = name, connection_id = %controller, "controller joined");
        Ok(())
    }

    /// Append an action to the point's queue. Only the bound controller may send.
    pub fn send(&self, name: &str, sender: &ConnectionId, payload: String) -> Result<()> {
        let mut state = self.state.lock();
        let record = state.points.get_mut(name).ok_or(RelayError::NotFound)?;
        let controller = record.controller_id().ok_or(RelayError::NotOccupied)?;
        if controller != sender {
            return Err(RelayError::WrongRole);
        }
        record.actions.push_back(payload);
        Ok(())
    }

    /// Pop the oldest queued action. Only the owner may receive, and only
    /// while a controller is bound.
    pub fn receive(&self, name: &str, receiver: &ConnectionId) -> Result<String> {
        let mut state = self.state.lock();
        let record = state.points.get_mut(name).ok_or(RelayError::NotFound)?;
        if !record.occupied() {
            return Err(RelayError::NotOccupied);
        }
        if &record.owner != receiver {
            return Err(RelayError::WrongRole);
        }
        record.actions.pop_front().ok_or(RelayError::QueueEmpty)
    }

    /// Release every binding held by `conn`.
    ///
    /// An owner's point is removed and its bound controller (if any) is
    /// released too and reported in the returned notices. A controller only
    /// vacates its slot; the owner is not notified. Calling this for a
    /// connection with no role is a no-op.
    pub fn teardown(&self, conn: &ConnectionId) -> Vec<TeardownNotice> {
        let mut state = self.state.lock();
        let Some(role) = state.roles.remove(conn) else {
            return Vec::new();
        };

        let mut notices = Vec::new();
        match role {
            Role::Owner(name) => {
                if let Some(record) = state.points.remove(&name) {
                    if let ControllerSlot::Bound(controller) = record.controller {
                        let _ = state.roles.remove(&controller);
                        notices.push(TeardownNotice::OwnerGone {
                            controller,
                            point: name.clone(),
                        });
                    }
                }
                debug!(point = %name, connection_id = %conn, "point removed");
            }
            Role::Controller(name) => {
                if let Some(record) = state.points.get_mut(&name) {
                    record.controller = ControllerSlot::Vacated;
                }
                debug!(point = %name, connection_id = %conn, "controller vacated");
            }
        }
        notices
    }

    /// Role currently held by `conn`.
    pub fn role_of(&self, conn: &ConnectionId) -> Option<Role> {
        self.state.lock().roles.get(conn).cloned()
    }

    /// Snapshot of a single point.
    pub fn snapshot(&self, name: &str) -> Option<PointSnapshot> {
        self.state.lock().points.get(name).map(|r| PointSnapshot {
            name: r.name.clone(),
            owner: r.owner.clone(),
            controller: r.controller.clone(),
            pending_actions: r.actions.len(),
        })
    }

    /// Number of registered points.
    pub fn point_count(&self) -> usize {
        self.state.lock().points.len()
    }

    /// Number of connections holding a role.
    pub fn bound_connections(&self) -> usize {
        self.state.lock().roles.len()
    }
}
