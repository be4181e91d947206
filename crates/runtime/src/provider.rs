//! Request/notification contract implemented by every provider object.
//!
//! A direct provider is any caller-supplied type implementing [`RpcProvider`].
//! The stream transport adapts a duplex stream into the same contract (see
//! [`StreamProvider`](crate::transport::StreamProvider)).

use futures_util::future::BoxFuture;
use mc_protocol::RpcPayload;
use serde_json::Value;

use crate::error::Result;
use crate::registry::{ListenerId, NotificationCallback};

/// Object that can answer requests and push notifications.
pub trait RpcProvider: Send + Sync {
	/// Sends `payload` to the remote and resolves with its result.
	fn request(&self, payload: RpcPayload) -> BoxFuture<'_, Result<Value>>;

	/// Registers a callback for notifications pushed by the remote.
	///
	/// Returns `None` if this provider never emits notifications.
	fn on_notification(&self, callback: NotificationCallback) -> Option<ListenerId> {
		let _ = callback;
		None
	}

	/// Removes a callback registered with [`on_notification`](Self::on_notification).
	fn remove_notification_listener(&self, id: ListenerId) {
		let _ = id;
	}
}
