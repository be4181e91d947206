//! Wallet process management
//!
//! The wallet runs as a child process. Requests go to its stdin and replies
//! come back on its stdout, both framed by the stream transport. Its stderr
//! is passed through so wallet diagnostics reach the terminal.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info};

use crate::error::{McError, Result};

/// How long a freshly spawned wallet must stay up to count as started.
const STARTUP_GRACE: Duration = Duration::from_millis(100);

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A running wallet child process.
#[derive(Debug)]
pub struct WalletProcess {
	program: PathBuf,
	process: Child,
}

impl WalletProcess {
	/// Spawns `program` with `args` and piped stdio.
	///
	/// # Errors
	///
	/// Returns [`McError::WalletSpawn`] if the process cannot be started or
	/// exits within the startup grace period.
	pub async fn spawn(program: &Path, args: &[String]) -> Result<Self> {
		debug!(target: "mc::wallet", program = %program.display(), ?args, "spawning wallet");

		let mut child = Command::new(program)
			.args(args)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::inherit())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| McError::WalletSpawn(format!("{}: {e}", program.display())))?;

		tokio::time::sleep(STARTUP_GRACE).await;

		match child.try_wait() {
			Ok(Some(status)) => {
				return Err(McError::WalletSpawn(format!(
					"{} exited immediately with status: {status}",
					program.display()
				)));
			}
			Ok(None) => {}
			Err(e) => {
				return Err(McError::WalletSpawn(format!("failed to check wallet status: {e}")));
			}
		}

		info!(target: "mc::wallet", pid = ?child.id(), "wallet started");

		Ok(Self {
			program: program.to_path_buf(),
			process: child,
		})
	}

	/// Takes the wallet's stdout (read side) and stdin (write side).
	///
	/// Returns `None` if the pipes were already taken.
	pub fn take_stdio(&mut self) -> Option<(ChildStdout, ChildStdin)> {
		let stdout = self.process.stdout.take()?;
		let stdin = self.process.stdin.take()?;
		Some((stdout, stdin))
	}

	/// Closes the wallet's stdin and waits for it to exit, killing it after a
	/// timeout.
	pub async fn shutdown(mut self) -> Result<()> {
		drop(self.process.stdin.take());
		drop(self.process.stdout.take());

		match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.process.wait()).await {
			Ok(Ok(status)) => {
				debug!(target: "mc::wallet", %status, "wallet exited");
				Ok(())
			}
			Ok(Err(e)) => Err(e.into()),
			Err(_) => {
				debug!(
					target: "mc::wallet",
					program = %self.program.display(),
					"wallet did not exit after {SHUTDOWN_TIMEOUT:?}, killing"
				);
				self.kill().await
			}
		}
	}

	/// Force kill the wallet process.
	pub async fn kill(mut self) -> Result<()> {
		self.process.kill().await?;
		Ok(())
	}
}
