use multichain::TransportError as Rt;
use serde_json::json;
use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, McError>;

#[derive(Debug, Error)]
pub enum McError {
	#[error("failed to start wallet: {0}")]
	WalletSpawn(String),

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error(transparent)]
	Client(#[from] multichain::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl McError {
	/// Maps the error onto the structured output envelope.
	pub fn to_command_error(&self) -> CommandError {
		let (code, details) = match self {
			McError::WalletSpawn(_) => (ErrorCode::WalletSpawnFailed, None),
			McError::InvalidInput(_) | McError::Json(_) => (ErrorCode::InvalidInput, None),
			McError::Client(err) => classify_client_error(err),
			McError::Io(_) => (ErrorCode::IoError, None),
			McError::Anyhow(_) => (ErrorCode::InternalError, None),
		};

		CommandError {
			code,
			message: self.to_string(),
			details,
		}
	}
}

fn classify_client_error(err: &multichain::Error) -> (ErrorCode, Option<serde_json::Value>) {
	match err {
		multichain::Error::InvalidReply(_) => (ErrorCode::InvalidReply, None),
		multichain::Error::Transport(Rt::Remote { code, data, .. }) => {
			(ErrorCode::RemoteError, Some(json!({"code": code, "data": data})))
		}
		multichain::Error::Transport(Rt::RequestTimeout { .. }) => (ErrorCode::Timeout, None),
		multichain::Error::Transport(
			Rt::NoTransportAvailable
			| Rt::NotConnected
			| Rt::ConnectionFailed(_)
			| Rt::PreferredTransportUnavailable(_)
			| Rt::PortDisconnected
			| Rt::ChannelClosed,
		) => (ErrorCode::ConnectionFailed, None),
		multichain::Error::Transport(Rt::Io(_)) => (ErrorCode::IoError, None),
		multichain::Error::Transport(_) => (ErrorCode::InternalError, None),
	}
}
