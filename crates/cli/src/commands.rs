//! Command dispatch.
//!
//! Every command follows the same lifecycle: spawn the wallet, connect a
//! [`SessionClient`] over its stdio, run one action, print the envelope, then
//! disconnect and shut the wallet down whether or not the action succeeded.

use std::time::Duration;

use anyhow::Context;
use multichain::{
	ConnectOptions, CreateSessionRequest, ProviderConfig, RpcPayload, SessionClient, SessionClientConfig,
	TransportProvider,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::{Cli, Commands};
use crate::error::{McError, Result};
use crate::output::{OutputFormat, ResultBuilder, print_event, print_result};
use crate::wallet::WalletProcess;

/// How often `listen` checks whether the wallet is still there.
const LISTEN_POLL: Duration = Duration::from_millis(250);

/// A parsed, validated command ready to run against a connected client.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
	CreateSession(CreateSessionRequest),
	GetSession(Option<String>),
	RevokeSession(Option<String>),
	Invoke { scope: String, payload: RpcPayload },
	Listen(Option<usize>),
}

impl Action {
	/// Validates command arguments without touching the wallet.
	pub fn from_command(command: Commands) -> Result<Self> {
		Ok(match command {
			Commands::CreateSession {
				scope,
				methods,
				accounts,
			} => Action::CreateSession(CreateSessionRequest::new().optional_scope(scope, methods, accounts)),
			Commands::GetSession { session_id } => Action::GetSession(session_id),
			Commands::RevokeSession { session_id } => Action::RevokeSession(session_id),
			Commands::Invoke { scope, method, params } => {
				let params = match params {
					Some(raw) => serde_json::from_str(&raw)
						.map_err(|e| McError::InvalidInput(format!("--params is not valid JSON: {e}")))?,
					None => json!([]),
				};
				Action::Invoke {
					scope,
					payload: RpcPayload::new(method, params),
				}
			}
			Commands::Listen { count } => Action::Listen(count),
		})
	}
}

pub async fn dispatch(cli: Cli) -> Result<()> {
	let Cli {
		format,
		wallet,
		wallet_args,
		mode,
		timeout_ms,
		command,
		..
	} = cli;

	let name = command.name();
	let action = Action::from_command(command)?;
	let program = wallet.ok_or_else(|| McError::InvalidInput("no wallet program given (--wallet or MC_WALLET)".into()))?;

	let mut process = WalletProcess::spawn(&program, &wallet_args).await?;
	let Some((stdout, stdin)) = process.take_stdio() else {
		return Err(McError::WalletSpawn("wallet stdio unavailable".into()));
	};

	let mut config = ProviderConfig::new().with_stream(stdout, stdin);
	if let Some(ms) = timeout_ms {
		config = config.request_timeout(Duration::from_millis(ms));
	}
	let client = SessionClient::new(TransportProvider::new(config), SessionClientConfig::new().mode(mode.into()));

	let outcome = run(&client, name, action, format).await;

	client.disconnect().await;
	if let Err(e) = process.shutdown().await {
		debug!(target: "mc::commands", error = %e, "wallet shutdown failed");
	}

	outcome
}

async fn run(client: &SessionClient, name: &'static str, action: Action, format: OutputFormat) -> Result<()> {
	let connected = client.connect(ConnectOptions::default()).await?;
	info!(target: "mc::commands", command = name, transport = %connected.transport, "connected to wallet");

	let builder = ResultBuilder::new(name).transport(connected.transport);

	let data = match action {
		Action::CreateSession(request) => client.create_session(request).await?,
		Action::GetSession(session_id) => {
			let session = client.get_session(session_id.as_deref()).await?;
			serde_json::to_value(session).context("failed to encode session")?
		}
		Action::RevokeSession(session_id) => json!(client.revoke_session(session_id.as_deref()).await?),
		Action::Invoke { scope, payload } => client.invoke_method(scope, payload).await?,
		Action::Listen(count) => listen(client, count, format).await,
	};

	print_result(&builder.data(data).build(), format);
	Ok(())
}

/// Streams events until `count` is reached, the wallet goes away, or ctrl-c.
async fn listen(client: &SessionClient, count: Option<usize>, format: OutputFormat) -> Value {
	let (tx, mut rx) = mpsc::unbounded_channel::<Value>();

	let session_tx = tx.clone();
	let session_listener = client.on_session_changed(move |event| {
		if let Ok(payload) = serde_json::to_value(event) {
			let _ = session_tx.send(json!({"event": "sessionChanged", "payload": payload}));
		}
	});
	let notification_listener = client.on_notification(move |notification: &Value| {
		let _ = tx.send(json!({"event": "notification", "payload": notification}));
	});

	let mut poll = tokio::time::interval(LISTEN_POLL);
	let mut seen = 0usize;
	while count.is_none_or(|limit| seen < limit) {
		tokio::select! {
			event = rx.recv() => {
				let Some(event) = event else { break };
				print_event(&event, format);
				seen += 1;
			}
			_ = poll.tick() => {
				if !client.transport().is_transport_alive() {
					info!(target: "mc::commands", "wallet went away, stopping");
					break;
				}
			}
			_ = tokio::signal::ctrl_c() => break,
		}
	}

	client.remove_listener(session_listener);
	client.remove_listener(notification_listener);

	json!({"events": seen})
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use clap::Parser;
	use multichain::NullLogger;

	use super::*;
	use crate::output::ErrorCode;

	fn action(args: &[&str]) -> Result<Action> {
		let cli = Cli::try_parse_from(std::iter::once("mc").chain(args.iter().copied())).unwrap();
		Action::from_command(cli.command)
	}

	#[test]
	fn invoke_params_default_to_empty_array() {
		let parsed = action(&["invoke", "--scope", "eip155:1", "--method", "eth_chainId"]).unwrap();
		assert_eq!(
			parsed,
			Action::Invoke {
				scope: "eip155:1".into(),
				payload: RpcPayload::new("eth_chainId", json!([])),
			}
		);
	}

	#[test]
	fn invoke_params_must_be_json() {
		let err = action(&["invoke", "--scope", "eip155:1", "--method", "eth_call", "--params", "{oops"]).unwrap_err();
		assert_eq!(err.to_command_error().code, ErrorCode::InvalidInput);
	}

	#[test]
	fn create_session_builds_optional_scope() {
		let parsed = action(&[
			"create-session",
			"--scope",
			"eip155:1",
			"--method",
			"eth_call",
			"--account",
			"eip155:1:0xabc",
		])
		.unwrap();
		assert_eq!(
			parsed,
			Action::CreateSession(CreateSessionRequest::new().optional_scope(
				"eip155:1",
				["eth_call"],
				["eip155:1:0xabc"]
			))
		);
	}

	#[tokio::test]
	async fn listen_stops_when_wallet_hangs_up() {
		let (wallet_end, client_end) = tokio::io::duplex(4096);
		let client = SessionClient::new(
			TransportProvider::new(
				ProviderConfig::new()
					.with_duplex(client_end)
					.logger(Arc::new(NullLogger)),
			),
			SessionClientConfig::new().logger(Arc::new(NullLogger)),
		);
		client.connect(ConnectOptions::default()).await.unwrap();
		drop(wallet_end);

		let summary = tokio::time::timeout(Duration::from_secs(5), listen(&client, None, OutputFormat::Ndjson))
			.await
			.unwrap();
		assert_eq!(summary, json!({"events": 0}));
		assert_eq!(client.listener_count(), 0);
	}

	#[tokio::test]
	async fn missing_wallet_is_invalid_input() {
		let mut cli = Cli::try_parse_from(["mc", "listen"]).unwrap();
		cli.wallet = None;
		let err = dispatch(cli).await.unwrap_err();
		assert!(matches!(err, McError::InvalidInput(_)));
	}
}
