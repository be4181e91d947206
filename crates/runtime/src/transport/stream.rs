//! Stream-wrapped provider.
//!
//! Adapts a duplex byte stream into the [`RpcProvider`] contract. Messages
//! are framed as a 4-byte little-endian length prefix followed by a JSON
//! document:
//!
//! ```text
//! [len: u32 LE][JSON bytes]
//! ```
//!
//! A reader task routes inbound frames (replies to the pending table,
//! notifications to the provider's own listener set) and a writer task
//! drains the outbound queue, so a slow remote never blocks request issuers.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::BoxFuture;
use mc_protocol::{RpcPayload, RpcRequest};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{RequestContext, route_inbound};
use crate::error::{Error, Result};
use crate::provider::RpcProvider;
use crate::registry::{ListenerId, NotificationCallback, NotificationRegistry};

/// Frames larger than this are treated as a corrupt length prefix.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

pub type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;
pub type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Read and write halves of a duplex stream.
pub struct StreamParts {
	pub reader: BoxedReader,
	pub writer: BoxedWriter,
}

impl StreamParts {
	pub fn new<R, W>(reader: R, writer: W) -> Self
	where
		R: AsyncRead + Unpin + Send + 'static,
		W: AsyncWrite + Unpin + Send + 'static,
	{
		Self {
			reader: Box::new(reader),
			writer: Box::new(writer),
		}
	}

	/// Splits a single bidirectional stream.
	pub fn from_duplex<S>(stream: S) -> Self
	where
		S: AsyncRead + AsyncWrite + Send + 'static,
	{
		let (reader, writer) = tokio::io::split(stream);
		Self::new(reader, writer)
	}
}

impl std::fmt::Debug for StreamParts {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StreamParts").finish_non_exhaustive()
	}
}

/// Writes one length-prefixed JSON frame and flushes.
pub async fn write_frame<W>(writer: &mut W, message: &Value) -> io::Result<()>
where
	W: AsyncWrite + Unpin + ?Sized,
{
	let bytes = serde_json::to_vec(message)?;
	let length = u32::try_from(bytes.len())
		.map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame exceeds u32 length"))?;

	writer.write_all(&length.to_le_bytes()).await?;
	writer.write_all(&bytes).await?;
	writer.flush().await
}

/// Reads one frame body. Returns `Ok(None)` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
	R: AsyncRead + Unpin + ?Sized,
{
	let mut len_buf = [0u8; 4];
	match reader.read_exact(&mut len_buf).await {
		Ok(_) => {}
		Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
		Err(e) => return Err(e),
	}

	let length = u32::from_le_bytes(len_buf) as usize;
	if length > MAX_FRAME_LEN {
		return Err(io::Error::new(
			io::ErrorKind::InvalidData,
			format!("frame length {length} exceeds limit of {MAX_FRAME_LEN} bytes"),
		));
	}

	let mut body = vec![0u8; length];
	reader.read_exact(&mut body).await?;
	Ok(Some(body))
}

/// Provider object wrapping a duplex stream.
pub struct StreamProvider {
	outbound: mpsc::UnboundedSender<Value>,
	ctx: RequestContext,
	notifications: Arc<NotificationRegistry>,
	closed: Arc<AtomicBool>,
	tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl StreamProvider {
	/// Starts the reader and writer tasks. Must be called inside a Tokio runtime.
	pub(crate) fn spawn(parts: StreamParts, ctx: RequestContext) -> Self {
		ctx.logger.debug(format_args!("[StreamProvider] wrapping stream as provider"));

		let StreamParts { reader, writer } = parts;
		let (outbound, outbound_rx) = mpsc::unbounded_channel();
		let notifications = Arc::new(NotificationRegistry::new("stream notification"));
		let closed = Arc::new(AtomicBool::new(false));

		let reader_handle = tokio::spawn(read_loop(
			reader,
			ctx.clone(),
			Arc::clone(&notifications),
			Arc::clone(&closed),
		));
		let writer_handle = tokio::spawn(write_loop(writer, outbound_rx, ctx.clone()));

		Self {
			outbound,
			ctx,
			notifications,
			closed,
			tasks: Mutex::new(vec![reader_handle, writer_handle]),
		}
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Removes all listeners, stops both tasks, and fails pending requests.
	pub fn destroy(&self) {
		self.closed.store(true, Ordering::SeqCst);
		self.notifications.clear();
		for task in self.tasks.lock().drain(..) {
			task.abort();
		}
		let rejected = self.ctx.pending.reject_all(|| Error::ChannelClosed);
		self.ctx.logger.debug(format_args!(
			"[StreamProvider] destroyed stream ({rejected} pending requests rejected)"
		));
	}

	async fn send(&self, payload: RpcPayload) -> Result<Value> {
		if self.is_closed() {
			return Err(Error::ChannelClosed);
		}

		let id = self.ctx.next_id();
		let method = payload.method.clone();
		let request = serde_json::to_value(RpcRequest::new(id, payload))?;
		self.ctx
			.logger
			.debug(format_args!("[StreamProvider] sending request: {request}"));

		let pending = self.ctx.pending.register(id);
		if self.outbound.send(request).is_err() {
			self.ctx.logger.error(format_args!(
				"[StreamProvider] failed to queue request: outbound channel closed"
			));
			return Err(Error::ChannelClosed);
		}

		pending.wait(&method, self.ctx.request_timeout).await
	}
}

impl RpcProvider for StreamProvider {
	fn request(&self, payload: RpcPayload) -> BoxFuture<'_, Result<Value>> {
		Box::pin(self.send(payload))
	}

	fn on_notification(&self, callback: NotificationCallback) -> Option<ListenerId> {
		Some(self.notifications.add(callback))
	}

	fn remove_notification_listener(&self, id: ListenerId) {
		self.notifications.remove(id);
	}
}

impl Drop for StreamProvider {
	fn drop(&mut self) {
		for task in self.tasks.get_mut().drain(..) {
			task.abort();
		}
	}
}

impl std::fmt::Debug for StreamProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StreamProvider")
			.field("closed", &self.is_closed())
			.field("listeners", &self.notifications.len())
			.finish()
	}
}

async fn read_loop(
	mut reader: BoxedReader,
	ctx: RequestContext,
	notifications: Arc<NotificationRegistry>,
	closed: Arc<AtomicBool>,
) {
	loop {
		match read_frame(&mut reader).await {
			Ok(Some(body)) => match serde_json::from_slice::<Value>(&body) {
				Ok(message) => route_inbound(message, &ctx, &notifications, "StreamProvider"),
				Err(e) => ctx
					.logger
					.error(format_args!("[StreamProvider] dropping malformed frame: {e}")),
			},
			Ok(None) => {
				ctx.logger.debug(format_args!("[StreamProvider] stream ended"));
				break;
			}
			Err(e) => {
				ctx.logger
					.error(format_args!("[StreamProvider] stream read error: {e}"));
				break;
			}
		}
	}

	closed.store(true, Ordering::SeqCst);
	ctx.pending.reject_all(|| Error::ChannelClosed);
}

async fn write_loop(mut writer: BoxedWriter, mut outbound_rx: mpsc::UnboundedReceiver<Value>, ctx: RequestContext) {
	while let Some(message) = outbound_rx.recv().await {
		if let Err(e) = write_frame(&mut writer, &message).await {
			ctx.logger
				.error(format_args!("[StreamProvider] stream write error: {e}"));
			break;
		}
	}
}
