//! Scripted wallet used by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use mc_protocol::methods;
use mc_runtime::{ListenerId, NotificationCallback, NotificationRegistry, NullLogger, RpcProvider};
use multichain::{
	MergePolicy, ProviderConfig, RecordingLogger, RpcPayload, SessionChangedEvent, SessionClient, SessionClientConfig,
	SessionMode, TransportProvider,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

pub const EXPIRY: &str = "2026-12-31T00:00:00Z";

/// Direct provider that grants whatever scopes are requested.
///
/// `wallet_createSession` echoes the normalized optional scopes back as the
/// granted `sessionScopes`. With `assign_ids` every session gets a fresh
/// `session-N` id, otherwise replies carry no id.
pub struct MockWallet {
	calls: Mutex<Vec<RpcPayload>>,
	failing: Mutex<HashSet<String>>,
	get_reply: Mutex<Value>,
	assign_ids: bool,
	next_session: AtomicU64,
	notifications: NotificationRegistry,
}

impl MockWallet {
	pub fn new() -> Arc<Self> {
		Self::build(false)
	}

	pub fn with_session_ids() -> Arc<Self> {
		Self::build(true)
	}

	fn build(assign_ids: bool) -> Arc<Self> {
		Arc::new(Self {
			calls: Mutex::new(Vec::new()),
			failing: Mutex::new(HashSet::new()),
			get_reply: Mutex::new(Value::Null),
			assign_ids,
			next_session: AtomicU64::new(1),
			notifications: NotificationRegistry::new("mock wallet"),
		})
	}

	/// Makes `method` fail with a user-rejection error.
	pub fn fail(&self, method: &str) {
		self.failing.lock().insert(method.to_string());
	}

	/// Reply served for `wallet_getSession`.
	pub fn set_get_reply(&self, reply: Value) {
		*self.get_reply.lock() = reply;
	}

	/// Every call made with `method`.
	pub fn calls(&self, method: &str) -> Vec<RpcPayload> {
		self.calls
			.lock()
			.iter()
			.filter(|call| call.method == method)
			.cloned()
			.collect()
	}

	pub fn total_calls(&self) -> usize {
		self.calls.lock().len()
	}

	/// Pushes a notification to the subscribed transport.
	pub fn push(&self, notification: Value) {
		self.notifications.emit(&notification, &NullLogger);
	}

	pub fn subscriber_count(&self) -> usize {
		self.notifications.len()
	}

	fn answer(&self, payload: &RpcPayload) -> mc_runtime::Result<Value> {
		if self.failing.lock().contains(&payload.method) {
			return Err(mc_runtime::Error::Remote {
				code: 4001,
				message: "User rejected the request.".to_string(),
				data: None,
			});
		}

		Ok(match payload.method.as_str() {
			methods::CREATE_SESSION => {
				let mut reply = json!({
					"sessionScopes": payload.params["optionalScopes"],
					"sessionProperties": {"expiry": EXPIRY}
				});
				if self.assign_ids {
					let n = self.next_session.fetch_add(1, Ordering::SeqCst);
					reply["sessionId"] = json!(format!("session-{n}"));
				}
				reply
			}
			methods::REVOKE_SESSION => json!(true),
			methods::GET_SESSION => self.get_reply.lock().clone(),
			methods::INVOKE_METHOD => json!({"echo": payload.params}),
			_ => Value::Null,
		})
	}
}

impl RpcProvider for MockWallet {
	fn request(&self, payload: RpcPayload) -> BoxFuture<'_, mc_runtime::Result<Value>> {
		self.calls.lock().push(payload.clone());
		let result = self.answer(&payload);
		Box::pin(async move { result })
	}

	fn on_notification(&self, callback: NotificationCallback) -> Option<ListenerId> {
		Some(self.notifications.add(callback))
	}

	fn remove_notification_listener(&self, id: ListenerId) {
		self.notifications.remove(id);
	}
}

/// Client over `wallet`, not yet connected.
pub fn client_for(wallet: &Arc<MockWallet>, mode: SessionMode, policy: MergePolicy) -> (SessionClient, Arc<RecordingLogger>) {
	let logger = Arc::new(RecordingLogger::new());
	let transport = TransportProvider::new(
		ProviderConfig::new()
			.with_provider(wallet.clone())
			.logger(logger.clone()),
	);
	let client = SessionClient::new(
		transport,
		SessionClientConfig::new()
			.mode(mode)
			.merge_policy(policy)
			.logger(logger.clone()),
	);
	(client, logger)
}

/// Collects every session event into a channel.
pub fn record_events(client: &SessionClient) -> mpsc::UnboundedReceiver<SessionChangedEvent> {
	let (tx, rx) = mpsc::unbounded_channel();
	client.on_session_changed(move |event| {
		let _ = tx.send(event.clone());
	});
	rx
}

/// Drains everything already delivered.
pub fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
	let mut items = Vec::new();
	while let Ok(item) = rx.try_recv() {
		items.push(item);
	}
	items
}

/// Waits for the next item, failing the test after a second.
pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
	tokio::time::timeout(Duration::from_secs(1), rx.recv())
		.await
		.expect("timed out waiting for event")
		.expect("event channel closed")
}

pub fn eth_mainnet_push(accounts: &[&str]) -> Value {
	json!({
		"method": "wallet_sessionChanged",
		"params": {
			"sessionScopes": {
				"eip155:1": {"methods": ["eth_call"], "notifications": [], "accounts": accounts}
			},
			"expiry": "2027-06-30T00:00:00Z"
		}
	})
}
