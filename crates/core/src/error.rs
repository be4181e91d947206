//! Error type for session operations.

use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`SessionClient`](crate::SessionClient).
#[derive(Debug, Error)]
pub enum Error {
	/// Transport or remote failure, passed through unchanged.
	#[error(transparent)]
	Transport(#[from] mc_runtime::Error),

	/// The wallet replied with something that is not a session.
	#[error("Invalid reply: {0}")]
	InvalidReply(String),
}

impl Error {
	/// Returns the underlying transport error, if any.
	pub fn transport(&self) -> Option<&mc_runtime::Error> {
		match self {
			Error::Transport(e) => Some(e),
			Error::InvalidReply(_) => None,
		}
	}

	pub fn is_timeout(&self) -> bool {
		self.transport().is_some_and(mc_runtime::Error::is_timeout)
	}

	pub fn is_remote(&self) -> bool {
		self.transport().is_some_and(mc_runtime::Error::is_remote)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::InvalidReply(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transport_errors_keep_their_message() {
		let err: Error = mc_runtime::Error::Remote {
			code: 4001,
			message: "User rejected the request.".to_string(),
			data: None,
		}
		.into();
		assert_eq!(err.to_string(), "User rejected the request.");
		assert!(err.is_remote());
		assert!(!err.is_timeout());
	}

	#[test]
	fn invalid_reply_has_no_transport_source() {
		let err = Error::InvalidReply("expected object".to_string());
		assert!(err.transport().is_none());
		assert_eq!(err.to_string(), "Invalid reply: expected object");
	}
}
