//! Injectable logging capability.
//!
//! Components receive an `Arc<dyn Logger>` at construction instead of
//! reaching for process-wide state. [`TracingLogger`] is the default and
//! forwards to `tracing` under the `multichain` target.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Minimal logging interface shared by the transport and session layers.
pub trait Logger: Send + Sync {
	fn debug(&self, args: fmt::Arguments<'_>);
	fn log(&self, args: fmt::Arguments<'_>);
	fn error(&self, args: fmt::Arguments<'_>);
}

/// Forwards to the `tracing` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
	fn debug(&self, args: fmt::Arguments<'_>) {
		tracing::debug!(target: "multichain", "{}", args);
	}

	fn log(&self, args: fmt::Arguments<'_>) {
		tracing::info!(target: "multichain", "{}", args);
	}

	fn error(&self, args: fmt::Arguments<'_>) {
		tracing::error!(target: "multichain", "{}", args);
	}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
	fn debug(&self, _args: fmt::Arguments<'_>) {}
	fn log(&self, _args: fmt::Arguments<'_>) {}
	fn error(&self, _args: fmt::Arguments<'_>) {}
}

/// Log level recorded by [`RecordingLogger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
	Debug,
	Log,
	Error,
}

/// Keeps every line in memory. Useful for asserting that dropped messages
/// were reported.
#[derive(Debug, Default)]
pub struct RecordingLogger {
	lines: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingLogger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of all recorded lines.
	pub fn lines(&self) -> Vec<(LogLevel, String)> {
		self.lines.lock().clone()
	}

	/// Returns true if any line at `level` contains `needle`.
	pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
		self.lines
			.lock()
			.iter()
			.any(|(l, line)| *l == level && line.contains(needle))
	}

	fn push(&self, level: LogLevel, args: fmt::Arguments<'_>) {
		self.lines.lock().push((level, args.to_string()));
	}
}

impl Logger for RecordingLogger {
	fn debug(&self, args: fmt::Arguments<'_>) {
		self.push(LogLevel::Debug, args);
	}

	fn log(&self, args: fmt::Arguments<'_>) {
		self.push(LogLevel::Log, args);
	}

	fn error(&self, args: fmt::Arguments<'_>) {
		self.push(LogLevel::Error, args);
	}
}

/// The logger used when none is injected.
pub fn default_logger() -> Arc<dyn Logger> {
	Arc::new(TracingLogger)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn recording_logger_keeps_levels() {
		let logger = RecordingLogger::new();
		logger.debug(format_args!("hello {}", 1));
		logger.error(format_args!("boom"));

		assert_eq!(
			logger.lines(),
			vec![
				(LogLevel::Debug, "hello 1".to_string()),
				(LogLevel::Error, "boom".to_string()),
			]
		);
		assert!(logger.contains(LogLevel::Error, "boom"));
		assert!(!logger.contains(LogLevel::Debug, "boom"));
	}
}
