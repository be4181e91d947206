//! Events published by [`SessionClient`](crate::SessionClient).

use mc_protocol::Session;
use mc_runtime::{Listener, NotificationCallback};
use serde::Serialize;

/// What happened to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionChangeKind {
	Created,
	Updated,
	Revoked,
}

/// Payload of a `sessionChanged` event.
///
/// For [`SessionChangeKind::Revoked`] the session is the snapshot that was
/// removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionChangedEvent {
	#[serde(rename = "type")]
	pub kind: SessionChangeKind,
	pub session: Session,
}

impl SessionChangedEvent {
	pub fn new(kind: SessionChangeKind, session: Session) -> Self {
		Self { kind, session }
	}
}

/// Callback receiving session changes.
pub type SessionChangedCallback = Listener<SessionChangedEvent>;

/// Listener registered with [`SessionClient::add_listener`](crate::SessionClient::add_listener).
#[derive(Clone)]
pub enum ClientListener {
	/// Created, updated, and revoked sessions.
	SessionChanged(SessionChangedCallback),
	/// Every notification that is not a session push, verbatim.
	Notification(NotificationCallback),
}

impl std::fmt::Debug for ClientListener {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ClientListener::SessionChanged(_) => f.write_str("ClientListener::SessionChanged"),
			ClientListener::Notification(_) => f.write_str("ClientListener::Notification"),
		}
	}
}
