//! Native messaging port transport.
//!
//! A native port only offers `post`, an inbound message stream, and a
//! disconnect signal. Correlation is layered on top: every request gets the
//! next integer id, is wrapped as `{type: "caip-x", data: {id, jsonrpc,
//! method, params}}`, and is matched against replies echoing that id inside
//! `data`. Inbound `data` without an id is a notification.
//!
//! # Connection liveness
//!
//! Right after the port opens the transport waits for a short window. A
//! disconnect inside that window fails the connection attempt instead of
//! leaving a half-open handle. Messages that arrive during the window are
//! buffered and dispatched once the port is accepted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use mc_protocol::{PortEnvelope, RpcPayload, RpcRequest};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{RequestContext, route_inbound};
use crate::error::{Error, Result};
use crate::registry::NotificationRegistry;

/// Event delivered by a native port.
#[derive(Debug, Clone, PartialEq)]
pub enum PortEvent {
	/// A message posted by the remote end.
	Message(Value),
	/// The port closed. No further events follow.
	Disconnected,
}

/// Outbound half of a native messaging port.
pub trait NativePort: Send + Sync {
	/// Posts a message to the remote end.
	fn post_message(&self, message: Value) -> Result<()>;

	/// Closes the port. Calling it more than once is harmless.
	fn disconnect(&self) -> Result<()>;
}

/// A freshly opened port and its inbound event stream.
///
/// The stream ending is treated the same as [`PortEvent::Disconnected`].
pub struct PortConnection {
	pub port: Arc<dyn NativePort>,
	pub events: mpsc::UnboundedReceiver<PortEvent>,
}

/// Host capability for opening native messaging ports.
pub trait NativeMessaging: Send + Sync {
	/// Opens a port to the extension identified by `target`.
	fn connect(&self, target: &str) -> Result<PortConnection>;
}

/// Hook run by the dispatch loop when the port disconnects on its own.
pub(crate) type DisconnectHook = Box<dyn FnOnce() + Send>;

/// Correlating transport over a [`NativePort`].
pub struct NativePortTransport {
	port: Arc<dyn NativePort>,
	ctx: RequestContext,
	alive: Arc<AtomicBool>,
	dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl NativePortTransport {
	/// Opens a port to `target`, runs the liveness check, and starts dispatching.
	pub(crate) async fn open(
		messaging: &dyn NativeMessaging,
		target: &str,
		ctx: RequestContext,
		notifications: Arc<NotificationRegistry>,
		liveness_window: Duration,
		on_disconnect: DisconnectHook,
	) -> Result<Self> {
		ctx.logger
			.debug(format_args!("[NativePort] connecting to '{target}'"));
		let PortConnection { port, mut events } = messaging.connect(target)?;

		let mut early = Vec::new();
		let window = tokio::time::sleep(liveness_window);
		tokio::pin!(window);
		loop {
			tokio::select! {
				biased;
				event = events.recv() => match event {
					Some(PortEvent::Message(message)) => early.push(message),
					Some(PortEvent::Disconnected) | None => {
						ctx.logger.error(format_args!(
							"[NativePort] port to '{target}' disconnected during liveness check"
						));
						return Err(Error::ConnectionFailed(format!(
							"native port to '{target}' disconnected during liveness check"
						)));
					}
				},
				_ = &mut window => break,
			}
		}

		let alive = Arc::new(AtomicBool::new(true));
		let dispatch = tokio::spawn(dispatch_loop(
			events,
			early,
			ctx.clone(),
			notifications,
			Arc::clone(&alive),
			on_disconnect,
		));

		let transport = Self {
			port,
			ctx,
			alive,
			dispatch: Mutex::new(Some(dispatch)),
		};

		if let Err(e) = transport.port.post_message(serde_json::to_value(PortEnvelope::Ping)?) {
			transport.close();
			return Err(e);
		}

		Ok(transport)
	}

	/// Returns false once the port has disconnected or been closed.
	pub fn is_alive(&self) -> bool {
		self.alive.load(Ordering::SeqCst)
	}

	pub(crate) async fn request(&self, payload: RpcPayload) -> Result<Value> {
		if !self.is_alive() {
			return Err(Error::PortDisconnected);
		}

		let id = self.ctx.next_id();
		let method = payload.method.clone();
		let envelope = serde_json::to_value(PortEnvelope::Rpc {
			data: RpcRequest::new(id, payload),
		})?;
		self.ctx
			.logger
			.debug(format_args!("[NativePort] sending request: {envelope}"));

		let pending = self.ctx.pending.register(id);
		self.port.post_message(envelope)?;
		pending.wait(&method, self.ctx.request_timeout).await
	}

	/// Stops dispatching and closes the port. Teardown errors are logged.
	pub(crate) fn close(&self) {
		self.alive.store(false, Ordering::SeqCst);
		if let Some(dispatch) = self.dispatch.lock().take() {
			dispatch.abort();
		}
		if let Err(e) = self.port.disconnect() {
			self.ctx
				.logger
				.error(format_args!("[NativePort] error disconnecting port: {e}"));
		}
	}
}

impl Drop for NativePortTransport {
	fn drop(&mut self) {
		if let Some(dispatch) = self.dispatch.get_mut().take() {
			dispatch.abort();
		}
	}
}

impl std::fmt::Debug for NativePortTransport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NativePortTransport")
			.field("alive", &self.is_alive())
			.finish_non_exhaustive()
	}
}

async fn dispatch_loop(
	mut events: mpsc::UnboundedReceiver<PortEvent>,
	early: Vec<Value>,
	ctx: RequestContext,
	notifications: Arc<NotificationRegistry>,
	alive: Arc<AtomicBool>,
	on_disconnect: DisconnectHook,
) {
	for message in early {
		route_port_message(message, &ctx, &notifications);
	}

	while let Some(event) = events.recv().await {
		match event {
			PortEvent::Message(message) => route_port_message(message, &ctx, &notifications),
			PortEvent::Disconnected => break,
		}
	}

	alive.store(false, Ordering::SeqCst);
	let rejected = ctx.pending.reject_all(|| Error::PortDisconnected);
	ctx.logger.error(format_args!(
		"[NativePort] port disconnected ({rejected} pending requests rejected)"
	));
	on_disconnect();
}

fn route_port_message(message: Value, ctx: &RequestContext, notifications: &NotificationRegistry) {
	match PortEnvelope::inbound_data(message) {
		Some(data) => route_inbound(data, ctx, notifications, "NativePort"),
		None => ctx
			.logger
			.debug(format_args!("[NativePort] dropping message without data")),
	}
}
