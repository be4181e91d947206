//! Session storage strategies.
//!
//! [`SessionClient`](crate::SessionClient) is parameterized by a
//! [`SessionStore`] chosen from [`SessionMode`] at construction. The client
//! never branches on the mode itself; lookups, push targeting, and merging
//! go through the store.

use std::collections::HashMap;

use mc_protocol::{DEFAULT_SESSION_ID, Session, SessionChangedParams};

use crate::config::{MergePolicy, SessionMode};

/// Storage for held sessions.
pub trait SessionStore: Send + Sync {
	/// Session held under `key`.
	fn get(&self, key: &str) -> Option<&Session>;

	fn get_mut(&mut self, key: &str) -> Option<&mut Session>;

	/// Stores `session` under `key`, replacing whatever was there.
	fn insert(&mut self, key: &str, session: Session);

	fn remove(&mut self, key: &str) -> Option<Session>;

	/// Key of the session a `wallet_sessionChanged` push applies to.
	fn push_target(&self, push: &SessionChangedParams) -> Option<String>;

	/// Keys of every held session.
	fn keys(&self) -> Vec<String>;

	fn clear(&mut self);

	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Builds the store for `mode`.
pub fn store_for_mode(mode: SessionMode) -> Box<dyn SessionStore> {
	match mode {
		SessionMode::Single => Box::new(SingleSessionStore::default()),
		SessionMode::Multi => Box::new(MultiSessionStore::default()),
	}
}

/// Holds at most one session.
///
/// An explicit key matches the held session when it equals the held session's
/// id, when the held session has no id, or when the key is
/// [`DEFAULT_SESSION_ID`].
#[derive(Debug, Default)]
pub struct SingleSessionStore {
	slot: Option<(String, Session)>,
}

impl SingleSessionStore {
	fn matches(key: &str, held_key: &str, session: &Session) -> bool {
		key == DEFAULT_SESSION_ID || key == held_key || session.session_id.as_deref().is_none_or(|id| id == key)
	}
}

impl SessionStore for SingleSessionStore {
	fn get(&self, key: &str) -> Option<&Session> {
		self.slot
			.as_ref()
			.filter(|(held_key, session)| Self::matches(key, held_key, session))
			.map(|(_, session)| session)
	}

	fn get_mut(&mut self, key: &str) -> Option<&mut Session> {
		self.slot
			.as_mut()
			.filter(|(held_key, session)| Self::matches(key, held_key, session))
			.map(|(_, session)| session)
	}

	fn insert(&mut self, key: &str, session: Session) {
		self.slot = Some((key.to_string(), session));
	}

	fn remove(&mut self, key: &str) -> Option<Session> {
		let held = self.get(key).is_some();
		if held {
			self.slot.take().map(|(_, session)| session)
		} else {
			None
		}
	}

	fn push_target(&self, _push: &SessionChangedParams) -> Option<String> {
		self.slot.as_ref().map(|(key, _)| key.clone())
	}

	fn keys(&self) -> Vec<String> {
		self.slot.iter().map(|(key, _)| key.clone()).collect()
	}

	fn clear(&mut self) {
		self.slot = None;
	}

	fn len(&self) -> usize {
		usize::from(self.slot.is_some())
	}
}

/// Sessions keyed by session id.
#[derive(Debug, Default)]
pub struct MultiSessionStore {
	sessions: HashMap<String, Session>,
}

impl SessionStore for MultiSessionStore {
	fn get(&self, key: &str) -> Option<&Session> {
		self.sessions.get(key)
	}

	fn get_mut(&mut self, key: &str) -> Option<&mut Session> {
		self.sessions.get_mut(key)
	}

	fn insert(&mut self, key: &str, session: Session) {
		self.sessions.insert(key.to_string(), session);
	}

	fn remove(&mut self, key: &str) -> Option<Session> {
		self.sessions.remove(key)
	}

	/// The push's own session id when held. A push without an id targets the
	/// default key when held; a push naming an unheld id targets nothing.
	fn push_target(&self, push: &SessionChangedParams) -> Option<String> {
		let key = push.session_id.as_deref().unwrap_or(DEFAULT_SESSION_ID);
		self.sessions.contains_key(key).then(|| key.to_string())
	}

	fn keys(&self) -> Vec<String> {
		let mut keys: Vec<String> = self.sessions.keys().cloned().collect();
		keys.sort();
		keys
	}

	fn clear(&mut self) {
		self.sessions.clear();
	}

	fn len(&self) -> usize {
		self.sessions.len()
	}
}

/// Applies a `wallet_sessionChanged` push to `session`.
pub fn merge_push(session: &mut Session, push: SessionChangedParams, policy: MergePolicy) {
	match policy {
		MergePolicy::Overwrite => {
			session.session_scopes = push.session_scopes.unwrap_or_default();
			session.session_properties = push.session_properties;
			session.expiry = push.expiry;
			session.session_id = push.session_id;
			session.scoped_properties = push.scoped_properties;
		}
		MergePolicy::PresentFieldsOnly => {
			if let Some(scopes) = push.session_scopes {
				session.session_scopes = scopes;
			}
			if push.session_properties.is_some() {
				session.session_properties = push.session_properties;
			}
			if push.expiry.is_some() {
				session.expiry = push.expiry;
			}
			if push.session_id.is_some() {
				session.session_id = push.session_id;
			}
			if push.scoped_properties.is_some() {
				session.scoped_properties = push.scoped_properties;
			}
		}
	}
}
