//! Session lifecycle client.
//!
//! [`SessionClient`] sits on top of a [`TransportProvider`]. It issues the
//! four wallet methods, holds the sessions the wallet granted, and reconciles
//! `wallet_sessionChanged` pushes into them.
//!
//! # Notification routing
//!
//! Every raw notification from the transport is classified once:
//!
//! - `{method: "wallet_sessionChanged", params: {sessionScopes, ..}}` is merged
//!   into the held session it targets and republished as an `updated` event.
//!   A push with no matching session is dropped.
//! - Anything else is republished verbatim to notification listeners.

use std::sync::{Arc, Weak};

use mc_protocol::{
	CreateSessionParams, DEFAULT_SESSION_ID, InvokeMethodParams, PropertyMap, RpcPayload, Session,
	SessionChangedParams, methods,
};
use mc_runtime::{
	ConnectOptions, ListenerId, ListenerRegistry, Logger, NotificationCallback, NotificationRegistry, TransportKind,
	TransportProvider,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::config::{BootstrapScope, MergePolicy, SessionClientConfig, SessionMode};
use crate::error::{Error, Result};
use crate::events::{ClientListener, SessionChangeKind, SessionChangedCallback, SessionChangedEvent};
use crate::scopes::{account_address, normalize_optional_scopes};
use crate::store::{SessionStore, merge_push, store_for_mode};

/// Arguments of [`SessionClient::create_session`]. Every map defaults to empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateSessionRequest {
	pub required_scopes: PropertyMap,
	/// Raw scopes, normalized before sending.
	pub optional_scopes: Map<String, Value>,
	pub scoped_properties: PropertyMap,
	pub session_properties: PropertyMap,
}

impl CreateSessionRequest {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an optional scope with the given methods and accounts.
	pub fn optional_scope<M, A>(mut self, scope: impl Into<String>, methods: M, accounts: A) -> Self
	where
		M: IntoIterator,
		M::Item: Into<String>,
		A: IntoIterator,
		A::Item: Into<String>,
	{
		let methods: Vec<String> = methods.into_iter().map(Into::into).collect();
		let accounts: Vec<String> = accounts.into_iter().map(Into::into).collect();
		self.optional_scopes
			.insert(scope.into(), json!({"methods": methods, "accounts": accounts}));
		self
	}

	fn into_params(self) -> CreateSessionParams {
		CreateSessionParams {
			optional_scopes: normalize_optional_scopes(&self.optional_scopes),
			required_scopes: self.required_scopes,
			scoped_properties: self.scoped_properties,
			session_properties: self.session_properties,
		}
	}
}

/// Result of [`SessionClient::connect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connected {
	pub transport: TransportKind,
	/// Addresses granted by the bootstrap session. Empty without bootstrap.
	pub accounts: Vec<String>,
}

struct ClientInner {
	transport: TransportProvider,
	mode: SessionMode,
	merge_policy: MergePolicy,
	bootstrap: Option<BootstrapScope>,
	logger: Arc<dyn Logger>,
	store: Mutex<Box<dyn SessionStore>>,
	session_listeners: ListenerRegistry<SessionChangedEvent>,
	notification_listeners: NotificationRegistry,
	forwarder: Mutex<Option<ListenerId>>,
}

impl ClientInner {
	fn publish(&self, event: SessionChangedEvent) {
		self.logger.debug(format_args!(
			"[SessionClient] notifying {} sessionChanged listeners ({:?})",
			self.session_listeners.len(),
			event.kind
		));
		self.session_listeners.emit(&event, &*self.logger);
	}

	fn handle_notification(&self, notification: &Value) {
		self.logger
			.debug(format_args!("[SessionClient] received notification: {notification}"));

		match SessionChangedParams::from_notification(notification) {
			Some(Ok(push)) => self.apply_push(push),
			Some(Err(e)) => self.logger.error(format_args!(
				"[SessionClient] dropping undecodable wallet_sessionChanged: {e}"
			)),
			None => {
				self.logger
					.error(format_args!("[SessionClient] received unknown notification: {notification}"));
				self.notification_listeners.emit(notification, &*self.logger);
			}
		}
	}

	fn apply_push(&self, push: SessionChangedParams) {
		let updated = {
			let mut store = self.store.lock();
			let Some(key) = store.push_target(&push) else {
				self.logger.debug(format_args!(
					"[SessionClient] wallet_sessionChanged for unknown session {:?}, dropping",
					push.session_id
				));
				return;
			};
			let Some(session) = store.get_mut(&key) else {
				return;
			};
			merge_push(session, push, self.merge_policy);
			self.logger
				.debug(format_args!("[SessionClient] updated session '{key}'"));
			session.clone()
		};

		self.publish(SessionChangedEvent::new(SessionChangeKind::Updated, updated));
	}
}

/// Client owning session state on top of a [`TransportProvider`].
///
/// Cloning is cheap and yields a handle to the same client.
#[derive(Clone)]
pub struct SessionClient {
	inner: Arc<ClientInner>,
}

impl SessionClient {
	pub fn new(transport: TransportProvider, config: SessionClientConfig) -> Self {
		let SessionClientConfig {
			mode,
			merge_policy,
			bootstrap,
			logger,
		} = config;

		logger.debug(format_args!(
			"[SessionClient] initializing: mode={mode:?}, merge_policy={merge_policy:?}, bootstrap={:?}",
			bootstrap.as_ref().map(|b| b.scope.as_str())
		));

		Self {
			inner: Arc::new(ClientInner {
				transport,
				mode,
				merge_policy,
				bootstrap,
				logger,
				store: Mutex::new(store_for_mode(mode)),
				session_listeners: ListenerRegistry::new("sessionChanged"),
				notification_listeners: NotificationRegistry::new("notification"),
				forwarder: Mutex::new(None),
			}),
		}
	}

	pub fn transport(&self) -> &TransportProvider {
		&self.inner.transport
	}

	pub fn mode(&self) -> SessionMode {
		self.inner.mode
	}

	/// Connects the transport and subscribes to its notifications.
	///
	/// With a bootstrap scope configured, also creates a session for it and
	/// returns the granted addresses.
	///
	/// # Errors
	///
	/// Propagates transport failures and bootstrap session failures.
	pub async fn connect(&self, options: ConnectOptions) -> Result<Connected> {
		let inner = &self.inner;
		inner.logger.log(format_args!(
			"[SessionClient] connecting... extension_id={:?}",
			options.extension_id
		));

		let transport = match inner.transport.connect(options).await {
			Ok(kind) => kind,
			Err(e) => {
				inner
					.logger
					.error(format_args!("[SessionClient] connect failed: {e}"));
				return Err(e.into());
			}
		};
		self.subscribe();

		let accounts = match inner.bootstrap.clone() {
			Some(scope) => self.bootstrap(scope).await?,
			None => Vec::new(),
		};

		inner.logger.log(format_args!(
			"[SessionClient] connected via {transport} ({} accounts)",
			accounts.len()
		));
		Ok(Connected { transport, accounts })
	}

	/// Clears local state and disconnects the transport.
	///
	/// In [`SessionMode::Single`] the held session is revoked first. A failing
	/// revoke is logged and does not stop the disconnect.
	pub async fn disconnect(&self) {
		let inner = &self.inner;
		inner
			.logger
			.debug(format_args!("[SessionClient] disconnecting..."));

		if inner.mode == SessionMode::Single && inner.transport.is_connected() {
			if let Err(e) = self.revoke_session(None).await {
				inner.logger.error(format_args!(
					"[SessionClient] failed to revoke session during disconnect: {e}"
				));
			}
		}

		inner.store.lock().clear();
		inner.session_listeners.clear();
		inner.notification_listeners.clear();
		inner.forwarder.lock().take();
		inner.transport.disconnect();
	}

	/// Requests a new session and stores it.
	///
	/// Returns the raw `wallet_createSession` reply.
	///
	/// # Errors
	///
	/// Transport and remote failures leave local state untouched.
	/// [`Error::InvalidReply`] if the reply does not decode as a session.
	pub async fn create_session(&self, request: CreateSessionRequest) -> Result<Value> {
		let inner = &self.inner;
		let params = serde_json::to_value(request.into_params())?;
		inner
			.logger
			.debug(format_args!("[SessionClient] creating session with params: {params}"));

		let reply = inner
			.transport
			.request(RpcPayload::new(methods::CREATE_SESSION, params))
			.await?;
		inner
			.logger
			.debug(format_args!("[SessionClient] wallet_createSession response: {reply}"));

		let session = Session::from_reply(&reply)?;
		let key = session.store_key().to_string();
		inner.store.lock().insert(&key, session.clone());
		inner.publish(SessionChangedEvent::new(SessionChangeKind::Created, session));

		Ok(reply)
	}

	/// Revokes the session under `session_id` (or the default key).
	///
	/// The wallet is sent the held session's own id when it has one, so the
	/// default key still revokes the real remote session. Returns `false`
	/// without sending anything when no such session is held.
	pub async fn revoke_session(&self, session_id: Option<&str>) -> Result<bool> {
		let inner = &self.inner;
		let key = session_id.unwrap_or(DEFAULT_SESSION_ID);
		let Some(snapshot) = inner.store.lock().get(key).cloned() else {
			inner
				.logger
				.debug(format_args!("[SessionClient] no session found to revoke for '{key}'"));
			return Ok(false);
		};

		let remote_id = snapshot.session_id.as_deref().unwrap_or(key);
		inner
			.logger
			.debug(format_args!("[SessionClient] revoking session '{remote_id}' (held as '{key}')"));
		inner
			.transport
			.request(RpcPayload::new(methods::REVOKE_SESSION, json!([remote_id])))
			.await?;

		let removed = inner.store.lock().remove(key).unwrap_or(snapshot);
		inner.publish(SessionChangedEvent::new(SessionChangeKind::Revoked, removed));
		Ok(true)
	}

	/// Returns the held session, asking the wallet when none is cached.
	///
	/// A fetched session is cached but publishes no event. In
	/// [`SessionMode::Single`] it is only cached when the slot is empty, so a
	/// read never evicts the held session. `Ok(None)` means the wallet has no
	/// session either.
	pub async fn get_session(&self, session_id: Option<&str>) -> Result<Option<Session>> {
		let inner = &self.inner;
		let key = session_id.unwrap_or(DEFAULT_SESSION_ID);
		if let Some(session) = inner.store.lock().get(key).cloned() {
			return Ok(Some(session));
		}

		inner.logger.debug(format_args!(
			"[SessionClient] session '{key}' not cached, calling wallet_getSession"
		));
		let reply = inner
			.transport
			.request(RpcPayload::new(methods::GET_SESSION, json!([key])))
			.await?;
		if reply.is_null() {
			return Ok(None);
		}
		if !reply.is_object() {
			return Err(Error::InvalidReply(format!("wallet_getSession returned {reply}")));
		}

		let session = Session::from_reply(&reply)?;
		let mut store = inner.store.lock();
		if inner.mode == SessionMode::Single && !store.is_empty() {
			inner.logger.debug(format_args!(
				"[SessionClient] not caching session '{key}', another session is held"
			));
		} else {
			store.insert(key, session.clone());
		}
		Ok(Some(session))
	}

	/// Runs `request` under `scope` through `wallet_invokeMethod`.
	pub async fn invoke_method(&self, scope: impl Into<String>, request: RpcPayload) -> Result<Value> {
		let scope = scope.into();
		self.inner.logger.debug(format_args!(
			"[SessionClient] invoking method {} on scope {scope}",
			request.method
		));

		let params = serde_json::to_value(InvokeMethodParams { scope, request })?;
		let result = self
			.inner
			.transport
			.request(RpcPayload::new(methods::INVOKE_METHOD, params))
			.await?;
		Ok(result)
	}

	/// Held session under `key`, without contacting the wallet.
	pub fn cached_session(&self, key: &str) -> Option<Session> {
		self.inner.store.lock().get(key).cloned()
	}

	/// Store keys of every held session.
	pub fn session_keys(&self) -> Vec<String> {
		self.inner.store.lock().keys()
	}

	pub fn add_listener(&self, listener: ClientListener) -> ListenerId {
		match listener {
			ClientListener::SessionChanged(callback) => self.inner.session_listeners.add(callback),
			ClientListener::Notification(callback) => self.inner.notification_listeners.add(callback),
		}
	}

	/// Removes a listener of either kind. Returns false if it was not registered.
	pub fn remove_listener(&self, id: ListenerId) -> bool {
		self.inner.session_listeners.remove(id) || self.inner.notification_listeners.remove(id)
	}

	pub fn on_session_changed<F>(&self, callback: F) -> ListenerId
	where
		F: Fn(&SessionChangedEvent) + Send + Sync + 'static,
	{
		let callback: SessionChangedCallback = Arc::new(callback);
		self.add_listener(ClientListener::SessionChanged(callback))
	}

	pub fn on_notification<F>(&self, callback: F) -> ListenerId
	where
		F: Fn(&Value) + Send + Sync + 'static,
	{
		let callback: NotificationCallback = Arc::new(callback);
		self.add_listener(ClientListener::Notification(callback))
	}

	/// Number of registered listeners of both kinds.
	pub fn listener_count(&self) -> usize {
		self.inner.session_listeners.len() + self.inner.notification_listeners.len()
	}

	/// Feeds a raw notification through reconciliation.
	///
	/// The transport forwarder calls this for every inbound notification.
	pub fn handle_notification(&self, notification: &Value) {
		self.inner.handle_notification(notification);
	}

	/// Registers the forwarder with the transport, replacing any earlier one.
	fn subscribe(&self) {
		let weak: Weak<ClientInner> = Arc::downgrade(&self.inner);
		let forwarder: NotificationCallback = Arc::new(move |notification: &Value| {
			if let Some(inner) = weak.upgrade() {
				inner.handle_notification(notification);
			}
		});

		let id = self.inner.transport.on_notification(forwarder);
		if let Some(previous) = self.inner.forwarder.lock().replace(id) {
			self.inner.transport.remove_notification_listener(previous);
		}
	}

	async fn bootstrap(&self, scope: BootstrapScope) -> Result<Vec<String>> {
		self.inner.logger.debug(format_args!(
			"[SessionClient] creating bootstrap session for {}",
			scope.scope
		));

		let request = CreateSessionRequest::new().optional_scope(
			scope.scope.clone(),
			scope.methods,
			Vec::<String>::new(),
		);
		let reply = self.create_session(request).await?;
		let session = Session::from_reply(&reply)?;

		Ok(session
			.session_scopes
			.get(&scope.scope)
			.map(|granted| {
				granted
					.accounts
					.iter()
					.map(|account| account_address(account).to_string())
					.collect()
			})
			.unwrap_or_default())
	}
}

impl std::fmt::Debug for SessionClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionClient")
			.field("mode", &self.inner.mode)
			.field("merge_policy", &self.inner.merge_policy)
			.field("sessions", &self.session_keys())
			.field("transport", &self.inner.transport)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn create_request_normalizes_and_omits_empty_maps() {
		let request = CreateSessionRequest::new().optional_scope("eip155:1", ["eth_call"], ["eip155:1:0xabc"]);
		let params = serde_json::to_value(request.into_params()).unwrap();

		assert_eq!(
			params,
			json!({
				"optionalScopes": {
					"eip155:1": {
						"methods": ["eth_call"],
						"notifications": [],
						"accounts": ["eip155:1:0xabc"]
					}
				}
			})
		);
	}

	#[test]
	fn create_request_keeps_non_empty_maps() {
		let mut request = CreateSessionRequest::new();
		request
			.session_properties
			.insert("expiry".to_string(), json!("2026-01-01T00:00:00Z"));
		request
			.required_scopes
			.insert("eip155:1".to_string(), json!({"methods": []}));

		let params = serde_json::to_value(request.into_params()).unwrap();
		assert_eq!(params["sessionProperties"]["expiry"], json!("2026-01-01T00:00:00Z"));
		assert_eq!(params["requiredScopes"]["eip155:1"], json!({"methods": []}));
		assert!(params.get("scopedProperties").is_none());
		assert_eq!(params["optionalScopes"], json!({}));
	}
}
