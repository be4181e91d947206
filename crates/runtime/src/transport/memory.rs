//! In-process native messaging.
//!
//! [`MemoryMessaging`] implements [`NativeMessaging`] with channel pairs so an
//! in-process wallet can sit behind a native port. Endpoints register under a
//! target id with [`MemoryMessaging::listen`] and receive a [`RemotePort`] for
//! every connection. Connecting to a target nobody listens on yields a port
//! that disconnects immediately.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::native::{NativeMessaging, NativePort, PortConnection, PortEvent};
use crate::error::{Error, Result};

/// Registry of in-process endpoints.
#[derive(Debug, Default)]
pub struct MemoryMessaging {
	acceptors: Mutex<HashMap<String, mpsc::UnboundedSender<RemotePort>>>,
}

impl MemoryMessaging {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an endpoint under `target` and returns the ports opened to it.
	///
	/// Registering the same target again replaces the previous endpoint.
	pub fn listen(&self, target: impl Into<String>) -> mpsc::UnboundedReceiver<RemotePort> {
		let (tx, rx) = mpsc::unbounded_channel();
		self.acceptors.lock().insert(target.into(), tx);
		rx
	}

	/// Removes the endpoint registered under `target`.
	pub fn unlisten(&self, target: &str) -> bool {
		self.acceptors.lock().remove(target).is_some()
	}
}

impl NativeMessaging for MemoryMessaging {
	fn connect(&self, target: &str) -> Result<PortConnection> {
		let (event_tx, events) = mpsc::unbounded_channel();
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

		let port = MemoryPort {
			to_remote: Mutex::new(Some(inbound_tx)),
		};
		let remote = RemotePort {
			inbound: inbound_rx,
			outbound: event_tx.clone(),
		};

		let accepted = self
			.acceptors
			.lock()
			.get(target)
			.map(|acceptor| acceptor.send(remote).is_ok())
			.unwrap_or(false);
		if !accepted {
			let _ = event_tx.send(PortEvent::Disconnected);
		}

		Ok(PortConnection {
			port: std::sync::Arc::new(port),
			events,
		})
	}
}

/// Client half of an in-process port.
#[derive(Debug)]
struct MemoryPort {
	to_remote: Mutex<Option<mpsc::UnboundedSender<Value>>>,
}

impl NativePort for MemoryPort {
	fn post_message(&self, message: Value) -> Result<()> {
		let guard = self.to_remote.lock();
		let sender = guard
			.as_ref()
			.ok_or_else(|| Error::TransportError("port is closed".to_string()))?;
		sender
			.send(message)
			.map_err(|_| Error::TransportError("remote end dropped".to_string()))
	}

	fn disconnect(&self) -> Result<()> {
		self.to_remote.lock().take();
		Ok(())
	}
}

/// Endpoint half of an in-process port.
///
/// Dropping it disconnects the client side.
#[derive(Debug)]
pub struct RemotePort {
	inbound: mpsc::UnboundedReceiver<Value>,
	outbound: mpsc::UnboundedSender<PortEvent>,
}

impl RemotePort {
	/// Next message posted by the client. `None` once the client disconnects.
	pub async fn recv(&mut self) -> Option<Value> {
		self.inbound.recv().await
	}

	/// Posts a message to the client. Returns false if the client is gone.
	pub fn post(&self, message: Value) -> bool {
		self.outbound.send(PortEvent::Message(message)).is_ok()
	}

	/// Signals disconnect to the client.
	pub fn disconnect(self) {
		let _ = self.outbound.send(PortEvent::Disconnected);
	}
}
