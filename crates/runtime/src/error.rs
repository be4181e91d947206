//! Error types for the transport runtime.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportKind;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while negotiating a transport or issuing requests.
#[derive(Debug, Error)]
pub enum Error {
	/// No configured transport could be established or selected.
	#[error("No valid provider available")]
	NoTransportAvailable,

	/// A request was issued before a successful `connect`.
	#[error("Not connected")]
	NotConnected,

	/// The caller pinned a transport kind that is not the active one.
	#[error("Preferred transport '{0}' requested but not connected")]
	PreferredTransportUnavailable(TransportKind),

	/// No reply arrived within the request timeout.
	#[error("Request '{method}' (id={id}) timed out after {}ms", timeout.as_millis())]
	RequestTimeout {
		method: String,
		id: u64,
		timeout: Duration,
	},

	/// The remote answered with an error envelope.
	#[error("{message}")]
	Remote {
		/// JSON-RPC error code (zero when the remote omitted it)
		code: i64,
		/// Message surfaced verbatim from the remote
		message: String,
		/// Optional structured error details
		data: Option<Value>,
	},

	/// The native port signalled disconnect while the request was pending.
	#[error("Native port disconnected")]
	PortDisconnected,

	/// A transport could not be established.
	#[error("Failed to connect: {0}")]
	ConnectionFailed(String),

	/// Transport-level failure (posting to a port, writing a frame, teardown).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Protocol-level failure (unexpected message shape).
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// The transport was torn down while the request was pending.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if this is a request timeout.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::RequestTimeout { .. })
	}

	/// Returns true if the remote rejected the request.
	pub fn is_remote(&self) -> bool {
		matches!(self, Error::Remote { .. })
	}

	/// Returns the JSON-RPC error code if this is a remote error.
	pub fn remote_code(&self) -> Option<i64> {
		match self {
			Error::Remote { code, .. } => Some(*code),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remote_error_displays_message_verbatim() {
		let err = Error::Remote {
			code: 4001,
			message: "User rejected the request.".to_string(),
			data: None,
		};
		assert_eq!(err.to_string(), "User rejected the request.");
		assert!(err.is_remote());
		assert_eq!(err.remote_code(), Some(4001));
		assert!(!err.is_timeout());
	}

	#[test]
	fn timeout_display() {
		let err = Error::RequestTimeout {
			method: "wallet_getSession".to_string(),
			id: 3,
			timeout: Duration::from_secs(30),
		};
		assert!(err.is_timeout());
		assert_eq!(
			err.to_string(),
			"Request 'wallet_getSession' (id=3) timed out after 30000ms"
		);
	}
}
