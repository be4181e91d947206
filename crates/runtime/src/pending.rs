//! Pending-request table shared by the correlating transports.
//!
//! Every outbound request registers a oneshot sender under its integer id.
//! The entry is destroyed exactly once: when the matching reply arrives, when
//! the transport rejects everything on teardown, or when the waiting
//! [`PendingRequest`] is dropped (timeout or caller cancellation).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use mc_protocol::{RpcErrorObject, RpcResponse};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::logger::Logger;

/// In-flight requests keyed by correlation id.
pub struct PendingRequests {
	entries: DashMap<u64, oneshot::Sender<Result<Value>>>,
	logger: Arc<dyn Logger>,
}

impl PendingRequests {
	pub fn new(logger: Arc<dyn Logger>) -> Self {
		Self {
			entries: DashMap::new(),
			logger,
		}
	}

	/// Registers `id` and returns the handle the caller awaits on.
	pub fn register(self: &Arc<Self>, id: u64) -> PendingRequest {
		let (tx, rx) = oneshot::channel();
		self.entries.insert(id, tx);
		PendingRequest {
			id,
			rx,
			table: Arc::clone(self),
		}
	}

	/// Completes the request matching `response.id`.
	///
	/// Returns false when no request with that id is pending, in which case
	/// the reply is stale and the caller should drop it.
	pub fn resolve(&self, response: RpcResponse) -> bool {
		let Some((_, tx)) = self.entries.remove(&response.id) else {
			return false;
		};

		let result = match response.error {
			Some(error) => Err(remote_error(error)),
			None => Ok(response.result.unwrap_or(Value::Null)),
		};
		let _ = tx.send(result);
		true
	}

	/// Fails every pending request with an error built by `make_error`.
	///
	/// Returns the number of requests rejected.
	pub fn reject_all(&self, make_error: impl Fn() -> Error) -> usize {
		let ids: Vec<u64> = self.entries.iter().map(|entry| *entry.key()).collect();
		let mut rejected = 0;
		for id in ids {
			if let Some((_, tx)) = self.entries.remove(&id) {
				let _ = tx.send(Err(make_error()));
				rejected += 1;
			}
		}
		rejected
	}

	pub fn contains(&self, id: u64) -> bool {
		self.entries.contains_key(&id)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl fmt::Debug for PendingRequests {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PendingRequests")
			.field("len", &self.entries.len())
			.finish_non_exhaustive()
	}
}

/// Converts a reply error payload into [`Error::Remote`].
fn remote_error(error: RpcErrorObject) -> Error {
	Error::Remote {
		code: error.code,
		message: error.message,
		data: error.data,
	}
}

/// Caller side of one pending request.
///
/// Dropping it removes the table entry if it is still present, so a timed
/// out or abandoned request never leaks its slot.
#[derive(Debug)]
pub struct PendingRequest {
	id: u64,
	rx: oneshot::Receiver<Result<Value>>,
	table: Arc<PendingRequests>,
}

impl PendingRequest {
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Waits for the reply, failing with [`Error::RequestTimeout`] after `timeout`.
	pub async fn wait(mut self, method: &str, timeout: Duration) -> Result<Value> {
		match tokio::time::timeout(timeout, &mut self.rx).await {
			Ok(Ok(result)) => result,
			Ok(Err(_)) => Err(Error::ChannelClosed),
			Err(_) => {
				self.table.logger.debug(format_args!(
					"[PendingRequests] request '{method}' (id={}) timed out after {}ms",
					self.id,
					timeout.as_millis()
				));
				Err(Error::RequestTimeout {
					method: method.to_string(),
					id: self.id,
					timeout,
				})
			}
		}
	}
}

impl Drop for PendingRequest {
	fn drop(&mut self) {
		if self.table.entries.remove(&self.id).is_some() {
			self.table
				.logger
				.debug(format_args!("[PendingRequests] removed abandoned pending request id={}", self.id));
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::logger::{LogLevel, NullLogger, RecordingLogger};

	fn table() -> Arc<PendingRequests> {
		Arc::new(PendingRequests::new(Arc::new(NullLogger)))
	}

	#[tokio::test]
	async fn test_resolve_success() {
		let table = table();
		let pending = table.register(1);
		assert!(table.contains(1));

		assert!(table.resolve(RpcResponse {
			id: 1,
			result: Some(json!({"status": "ok"})),
			error: None,
		}));

		let result = pending.wait("test", Duration::from_secs(1)).await.unwrap();
		assert_eq!(result["status"], "ok");
		assert!(table.is_empty());
	}

	#[tokio::test]
	async fn test_resolve_error() {
		let table = table();
		let pending = table.register(2);

		table.resolve(RpcResponse {
			id: 2,
			result: None,
			error: Some(RpcErrorObject {
				code: 4100,
				message: "Unauthorized".to_string(),
				data: None,
			}),
		});

		let err = pending.wait("test", Duration::from_secs(1)).await.unwrap_err();
		assert_eq!(err.remote_code(), Some(4100));
		assert_eq!(err.to_string(), "Unauthorized");
	}

	#[tokio::test]
	async fn test_missing_result_is_null() {
		let table = table();
		let pending = table.register(3);
		table.resolve(RpcResponse {
			id: 3,
			result: None,
			error: None,
		});
		assert_eq!(pending.wait("test", Duration::from_secs(1)).await.unwrap(), Value::Null);
	}

	#[test]
	fn test_stale_reply_is_reported() {
		let table = PendingRequests::new(Arc::new(NullLogger));
		assert!(!table.resolve(RpcResponse {
			id: 99,
			result: Some(json!(1)),
			error: None,
		}));
	}

	#[tokio::test]
	async fn test_timeout_removes_entry_once() {
		let logger = Arc::new(RecordingLogger::new());
		let table = Arc::new(PendingRequests::new(logger.clone()));
		let pending = table.register(4);

		let err = pending
			.wait("wallet_getSession", Duration::from_millis(20))
			.await
			.unwrap_err();
		assert!(err.is_timeout());
		assert!(table.is_empty());
		assert!(logger.contains(LogLevel::Debug, "request 'wallet_getSession' (id=4) timed out"));

		// A late reply no longer finds the entry.
		assert!(!table.resolve(RpcResponse {
			id: 4,
			result: Some(json!(1)),
			error: None,
		}));
	}

	#[tokio::test]
	async fn test_reject_all() {
		let table = table();
		let first = table.register(5);
		let second = table.register(6);

		assert_eq!(table.reject_all(|| Error::PortDisconnected), 2);
		assert!(table.is_empty());

		for pending in [first, second] {
			let err = pending.wait("test", Duration::from_secs(1)).await.unwrap_err();
			assert!(matches!(err, Error::PortDisconnected));
		}
	}

	#[test]
	fn test_drop_cleans_up() {
		let logger = Arc::new(RecordingLogger::new());
		let table = Arc::new(PendingRequests::new(logger.clone()));
		{
			let _pending = table.register(7);
			assert_eq!(table.len(), 1);
		}
		assert!(table.is_empty());
		assert!(logger.contains(LogLevel::Debug, "removed abandoned pending request id=7"));
	}
}
