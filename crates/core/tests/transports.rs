//! End-to-end runs over the native-port and stream transports.

mod support;

use std::sync::Arc;

use mc_runtime::transport::{read_frame, write_frame};
use multichain::{
	BootstrapScope, ConnectOptions, CreateSessionRequest, MemoryMessaging, NullLogger, ProviderConfig, RpcPayload,
	SessionChangeKind, SessionClient, SessionClientConfig, SessionMode, TransportKind, TransportProvider,
};
use serde_json::{Value, json};
use support::{next, record_events};

const EXTENSION_ID: &str = "nkbihfbeogaeaoehlefnkodbefgpgknn";

/// Grants the requested scopes with a fixed account.
fn grant(request: &Value) -> Value {
	let mut scopes = request["params"]["optionalScopes"].clone();
	if let Some(scopes) = scopes.as_object_mut() {
		for scope in scopes.values_mut() {
			scope["accounts"] = json!(["eip155:1:0x5cfe73b6021e818b776b421b1c4db2474086a7e1"]);
		}
	}
	json!({"sessionScopes": scopes, "sessionProperties": {"expiry": "2026-12-31T00:00:00Z"}})
}

#[tokio::test]
async fn native_port_session_round_trip() {
	let messaging = Arc::new(MemoryMessaging::new());
	let mut incoming = messaging.listen(EXTENSION_ID);

	tokio::spawn(async move {
		let Some(mut port) = incoming.recv().await else {
			return;
		};
		while let Some(message) = port.recv().await {
			if message["type"] != "caip-x" {
				continue;
			}
			let request = &message["data"];
			// The scope change is announced ahead of the invoke reply.
			if request["method"] == "wallet_invokeMethod" {
				port.post(json!({"type": "caip-x", "data": {
					"method": "wallet_sessionChanged",
					"params": {"sessionScopes": {"eip155:1": {"methods": ["eth_call", "eth_chainId"]}}}
				}}));
			}

			let result = match request["method"].as_str() {
				Some("wallet_createSession") => grant(request),
				Some("wallet_invokeMethod") => json!("0x1"),
				_ => Value::Null,
			};
			port.post(json!({"type": "caip-x", "data": {"id": request["id"], "jsonrpc": "2.0", "result": result}}));
		}
	});

	let transport = TransportProvider::new(
		ProviderConfig::new()
			.with_native_messaging(messaging)
			.logger(Arc::new(NullLogger)),
	);
	let client = SessionClient::new(
		transport,
		SessionClientConfig::new()
			.mode(SessionMode::Single)
			.logger(Arc::new(NullLogger)),
	);

	let connected = client
		.connect(ConnectOptions::extension(EXTENSION_ID))
		.await
		.unwrap();
	assert_eq!(connected.transport, TransportKind::NativePort);

	let mut events = record_events(&client);
	client
		.create_session(CreateSessionRequest::new().optional_scope("eip155:1", ["eth_call"], Vec::<String>::new()))
		.await
		.unwrap();

	let created = next(&mut events).await;
	assert_eq!(created.kind, SessionChangeKind::Created);

	let chain_id = client
		.invoke_method("eip155:1", RpcPayload::new("eth_chainId", json!([])))
		.await
		.unwrap();
	assert_eq!(chain_id, json!("0x1"));

	let updated = next(&mut events).await;
	assert_eq!(updated.kind, SessionChangeKind::Updated);
	assert_eq!(
		updated.session.session_scopes["eip155:1"].methods,
		vec!["eth_call", "eth_chainId"]
	);

	client.disconnect().await;
	assert!(!client.transport().is_connected());
	assert_eq!(client.transport().pending_requests(), 0);
}

#[tokio::test]
async fn stream_bootstrap_returns_addresses() {
	let (client_io, wallet_io) = tokio::io::duplex(8192);
	tokio::spawn(async move {
		let (mut reader, mut writer) = tokio::io::split(wallet_io);
		while let Ok(Some(body)) = read_frame(&mut reader).await {
			let Ok(request) = serde_json::from_slice::<Value>(&body) else {
				continue;
			};
			let result = match request["method"].as_str() {
				Some("wallet_createSession") => grant(&request),
				_ => Value::Null,
			};
			let reply = json!({"id": request["id"], "jsonrpc": "2.0", "result": result});
			if write_frame(&mut writer, &reply).await.is_err() {
				break;
			}
		}
	});

	let transport = TransportProvider::new(
		ProviderConfig::new()
			.with_duplex(client_io)
			.logger(Arc::new(NullLogger)),
	);
	let client = SessionClient::new(
		transport,
		SessionClientConfig::new()
			.bootstrap(BootstrapScope::new("eip155:1").method("eth_accounts"))
			.logger(Arc::new(NullLogger)),
	);

	let connected = client.connect(ConnectOptions::default()).await.unwrap();
	assert_eq!(connected.transport, TransportKind::Stream);
	assert_eq!(connected.accounts, vec!["0x5cfe73b6021e818b776b421b1c4db2474086a7e1"]);
	assert_eq!(client.session_keys().len(), 1);
}
