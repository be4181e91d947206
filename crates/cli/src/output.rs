//! Structured output envelope for all CLI commands.
//!
//! Every command prints one result envelope on stdout:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "ok": true,
//!   "command": "create-session",
//!   "data": { ... },
//!   "timings": { "durationMs": 12 }
//! }
//! ```
//!
//! On failure `data` is replaced by `error: { code, message }`. The `listen`
//! command additionally streams one line per event before its envelope.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Current schema version for command output.
pub const SCHEMA_VERSION: u32 = 1;

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Pretty-printed JSON
	#[default]
	Json,
	/// One compact JSON document per line
	Ndjson,
	/// Human-readable text
	Text,
}

impl std::str::FromStr for OutputFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"json" => Ok(OutputFormat::Json),
			"ndjson" => Ok(OutputFormat::Ndjson),
			"text" => Ok(OutputFormat::Text),
			_ => Err(format!("unknown format: {s}")),
		}
	}
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Ndjson => write!(f, "ndjson"),
			OutputFormat::Text => write!(f, "text"),
		}
	}
}

/// The result envelope returned by all commands.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub schema_version: Option<u32>,

	pub ok: bool,

	/// Command name (e.g., "create-session", "invoke")
	pub command: String,

	/// Transport the wallet was reached over
	#[serde(skip_serializing_if = "Option::is_none")]
	pub transport: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

/// Error information for failed commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,

	pub message: String,

	/// Remote error code or payload, when the wallet supplied one
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Standardized error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Wallet process could not be started
	WalletSpawnFailed,
	/// No transport could be established
	ConnectionFailed,
	/// The wallet did not answer in time
	Timeout,
	/// The wallet answered with an error
	RemoteError,
	/// The wallet answered with something unusable
	InvalidReply,
	/// Invalid input provided
	InvalidInput,
	/// File or pipe I/O failed
	IoError,
	/// Unknown/internal error
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ErrorCode::WalletSpawnFailed => write!(f, "WALLET_SPAWN_FAILED"),
			ErrorCode::ConnectionFailed => write!(f, "CONNECTION_FAILED"),
			ErrorCode::Timeout => write!(f, "TIMEOUT"),
			ErrorCode::RemoteError => write!(f, "REMOTE_ERROR"),
			ErrorCode::InvalidReply => write!(f, "INVALID_REPLY"),
			ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
			ErrorCode::IoError => write!(f, "IO_ERROR"),
			ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: duration.as_millis() as u64,
		}
	}
}

/// Builder for constructing command results
pub struct ResultBuilder<T: Serialize> {
	schema_version: Option<u32>,
	command: String,
	transport: Option<String>,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	/// Starts a result for `command`, timing from now.
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			schema_version: Some(SCHEMA_VERSION),
			command: command.into(),
			transport: None,
			data: None,
			error: None,
			start_time: Instant::now(),
		}
	}

	pub fn transport(mut self, transport: impl ToString) -> Self {
		self.transport = Some(transport.to_string());
		self
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, error: CommandError) -> Self {
		self.error = Some(error);
		self
	}

	pub fn build(self) -> CommandResult<T> {
		let ok = self.error.is_none() && self.data.is_some();
		CommandResult {
			schema_version: self.schema_version,
			ok,
			command: self.command,
			transport: self.transport,
			data: self.data,
			error: self.error,
			timings: Some(Timings::from(self.start_time.elapsed())),
		}
	}
}

/// Print a command result to stdout in the specified format
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();

	if result.ok {
		if let Some(ref data) = result.data {
			if let Ok(json) = serde_json::to_string_pretty(data) {
				let _ = writeln!(stdout, "{json}");
			}
		}
	} else if let Some(ref error) = result.error {
		let _ = writeln!(stdout, "Error [{}]: {}", error.code, error.message);
	}

	if let Some(ref timings) = result.timings {
		let _ = writeln!(stdout, "Completed in {}ms", timings.duration_ms);
	}
}

/// Prints one streamed event (`listen`). Text and ndjson both use one line.
pub fn print_event<T: Serialize>(event: &T, format: OutputFormat) {
	let rendered = match format {
		OutputFormat::Json => serde_json::to_string_pretty(event),
		OutputFormat::Ndjson | OutputFormat::Text => serde_json::to_string(event),
	};
	if let Ok(line) = rendered {
		println!("{line}");
	}
}

/// Print an error to stderr in human-readable format
pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn result_builder_success() {
		let result = ResultBuilder::new("get-session")
			.transport("stream")
			.data(json!({"sessionScopes": {}}))
			.build();

		assert!(result.ok);
		assert_eq!(result.command, "get-session");
		assert_eq!(result.transport.as_deref(), Some("stream"));
		assert!(result.error.is_none());
	}

	#[test]
	fn result_builder_error() {
		let result: CommandResult<()> = ResultBuilder::new("invoke")
			.error(CommandError {
				code: ErrorCode::RemoteError,
				message: "User rejected the request.".into(),
				details: Some(json!({"code": 4001})),
			})
			.build();

		assert!(!result.ok);
		assert!(result.data.is_none());
		assert_eq!(result.error.as_ref().map(|e| e.code), Some(ErrorCode::RemoteError));
	}

	#[test]
	fn envelope_serializes_camel_case() {
		let result = ResultBuilder::new("revoke-session").data(true).build();
		let value = serde_json::to_value(&result).unwrap();

		assert_eq!(value["schemaVersion"], json!(SCHEMA_VERSION));
		assert_eq!(value["ok"], json!(true));
		assert!(value["timings"]["durationMs"].is_u64());
		assert!(value.get("error").is_none());
	}

	#[test]
	fn error_code_display() {
		assert_eq!(ErrorCode::RemoteError.to_string(), "REMOTE_ERROR");
		assert_eq!(ErrorCode::WalletSpawnFailed.to_string(), "WALLET_SPAWN_FAILED");
		assert_eq!(
			serde_json::to_value(ErrorCode::InvalidReply).unwrap(),
			json!("INVALID_REPLY")
		);
	}

	#[test]
	fn output_format_parse() {
		assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
		assert_eq!("NDJSON".parse::<OutputFormat>().unwrap(), OutputFormat::Ndjson);
		assert!("toon".parse::<OutputFormat>().is_err());
	}
}
