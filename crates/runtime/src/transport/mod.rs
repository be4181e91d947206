//! Transport negotiation and the uniform request/notification surface.
//!
//! [`TransportProvider`] owns at most one active transport at a time:
//!
//! - **Direct**: a caller-supplied [`RpcProvider`], used as-is.
//! - **Stream**: a duplex byte stream adapted by [`StreamProvider`].
//! - **Native port**: a [`NativePort`] with id correlation layered on top.
//!
//! `connect` tries them in that order (the native port only when a target id
//! is given and the host exposes [`NativeMessaging`]). Whatever was picked,
//! callers see the same `request` / `on_notification` API.

mod memory;
mod native;
mod stream;


use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use mc_protocol::{InboundMessage, RpcPayload};
pub use memory::{MemoryMessaging, RemotePort};
pub use native::{NativeMessaging, NativePort, NativePortTransport, PortConnection, PortEvent};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
pub use stream::{BoxedReader, BoxedWriter, MAX_FRAME_LEN, StreamParts, StreamProvider, read_frame, write_frame};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Error, Result};
use crate::logger::{Logger, default_logger};
use crate::pending::PendingRequests;
use crate::provider::RpcProvider;
use crate::registry::{ListenerId, NotificationCallback, NotificationRegistry};

/// How long a request waits for its reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a fresh native port must stay open before `connect` succeeds.
pub const DEFAULT_LIVENESS_WINDOW: Duration = Duration::from_millis(10);

/// Kind of the active transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
	Direct,
	Stream,
	NativePort,
}

impl fmt::Display for TransportKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			TransportKind::Direct => "direct",
			TransportKind::Stream => "stream",
			TransportKind::NativePort => "native-port",
		})
	}
}

/// Per-call connect options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
	/// Native messaging target. Without it the native port is never tried.
	pub extension_id: Option<String>,
}

impl ConnectOptions {
	pub fn extension(extension_id: impl Into<String>) -> Self {
		Self {
			extension_id: Some(extension_id.into()),
		}
	}
}

/// Construction-time configuration for [`TransportProvider`].
pub struct ProviderConfig {
	direct_provider: Option<Arc<dyn RpcProvider>>,
	stream: Option<StreamParts>,
	native_messaging: Option<Arc<dyn NativeMessaging>>,
	preferred: Option<TransportKind>,
	request_timeout: Duration,
	liveness_window: Duration,
	logger: Arc<dyn Logger>,
}

impl Default for ProviderConfig {
	fn default() -> Self {
		Self {
			direct_provider: None,
			stream: None,
			native_messaging: None,
			preferred: None,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			liveness_window: DEFAULT_LIVENESS_WINDOW,
			logger: default_logger(),
		}
	}
}

impl ProviderConfig {
	pub fn new() -> Self {
		Self::default()
	}

	/// Supplies a ready-made provider. It wins over every other transport.
	pub fn with_provider(mut self, provider: Arc<dyn RpcProvider>) -> Self {
		self.direct_provider = Some(provider);
		self
	}

	/// Supplies separate read and write halves of a duplex stream.
	pub fn with_stream<R, W>(mut self, reader: R, writer: W) -> Self
	where
		R: AsyncRead + Unpin + Send + 'static,
		W: AsyncWrite + Unpin + Send + 'static,
	{
		self.stream = Some(StreamParts::new(reader, writer));
		self
	}

	/// Supplies a single bidirectional stream.
	pub fn with_duplex<S>(mut self, stream: S) -> Self
	where
		S: AsyncRead + AsyncWrite + Send + 'static,
	{
		self.stream = Some(StreamParts::from_duplex(stream));
		self
	}

	/// Exposes native messaging. Its presence is the capability flag.
	pub fn with_native_messaging(mut self, messaging: Arc<dyn NativeMessaging>) -> Self {
		self.native_messaging = Some(messaging);
		self
	}

	/// Pins requests to one transport kind.
	pub fn prefer(mut self, kind: TransportKind) -> Self {
		self.preferred = Some(kind);
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	pub fn liveness_window(mut self, window: Duration) -> Self {
		self.liveness_window = window;
		self
	}

	pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
		self.logger = logger;
		self
	}
}

impl fmt::Debug for ProviderConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProviderConfig")
			.field("has_direct_provider", &self.direct_provider.is_some())
			.field("has_stream", &self.stream.is_some())
			.field("has_native_messaging", &self.native_messaging.is_some())
			.field("preferred", &self.preferred)
			.field("request_timeout", &self.request_timeout)
			.field("liveness_window", &self.liveness_window)
			.finish()
	}
}

/// Correlation state shared by the stream and native-port transports.
///
/// Ids start at 1 and are never reused for the lifetime of the provider.
#[derive(Clone)]
pub(crate) struct RequestContext {
	ids: Arc<AtomicU64>,
	pub(crate) pending: Arc<PendingRequests>,
	pub(crate) request_timeout: Duration,
	pub(crate) logger: Arc<dyn Logger>,
}

impl RequestContext {
	pub(crate) fn new(request_timeout: Duration, logger: Arc<dyn Logger>) -> Self {
		Self {
			ids: Arc::new(AtomicU64::new(1)),
			pending: Arc::new(PendingRequests::new(Arc::clone(&logger))),
			request_timeout,
			logger,
		}
	}

	pub(crate) fn next_id(&self) -> u64 {
		self.ids.fetch_add(1, Ordering::SeqCst)
	}
}

/// Routes one inbound message to at most one destination.
///
/// Replies go to their pending request (stale ones are dropped), anything
/// carrying an unusable id is dropped, and id-less messages reach every
/// notification callback.
pub(crate) fn route_inbound(message: Value, ctx: &RequestContext, notifications: &NotificationRegistry, source: &str) {
	match InboundMessage::classify(message) {
		InboundMessage::Reply(response) => {
			let id = response.id;
			if !ctx.pending.resolve(response) {
				ctx.logger
					.debug(format_args!("[{source}] dropping stale reply id={id}"));
			}
		}
		InboundMessage::Foreign(message) => ctx
			.logger
			.debug(format_args!("[{source}] dropping unroutable message: {message}")),
		InboundMessage::Notification(notification) => {
			ctx.logger
				.debug(format_args!("[{source}] notification: {notification}"));
			notifications.emit(&notification, &*ctx.logger);
		}
	}
}

#[derive(Clone)]
enum ActiveTransport {
	Direct {
		provider: Arc<dyn RpcProvider>,
		forwarder: Option<ListenerId>,
	},
	Stream {
		provider: Arc<StreamProvider>,
		forwarder: Option<ListenerId>,
	},
	NativePort(Arc<NativePortTransport>),
}

impl ActiveTransport {
	fn kind(&self) -> TransportKind {
		match self {
			ActiveTransport::Direct { .. } => TransportKind::Direct,
			ActiveTransport::Stream { .. } => TransportKind::Stream,
			ActiveTransport::NativePort(_) => TransportKind::NativePort,
		}
	}

	fn is_alive(&self) -> bool {
		match self {
			ActiveTransport::Direct { .. } => true,
			ActiveTransport::Stream { provider, .. } => !provider.is_closed(),
			ActiveTransport::NativePort(port) => port.is_alive(),
		}
	}

	fn teardown(self, logger: &dyn Logger) {
		logger.debug(format_args!("[TransportProvider] tearing down {} transport", self.kind()));
		match self {
			ActiveTransport::Direct { provider, forwarder } => {
				if let Some(id) = forwarder {
					provider.remove_notification_listener(id);
				}
			}
			ActiveTransport::Stream { provider, forwarder } => {
				if let Some(id) = forwarder {
					provider.remove_notification_listener(id);
				}
				provider.destroy();
			}
			ActiveTransport::NativePort(port) => port.close(),
		}
	}
}

struct Active {
	generation: u64,
	transport: ActiveTransport,
}

struct Inner {
	direct_provider: Option<Arc<dyn RpcProvider>>,
	stream: Mutex<Option<StreamParts>>,
	native_messaging: Option<Arc<dyn NativeMessaging>>,
	preferred: Option<TransportKind>,
	liveness_window: Duration,
	ctx: RequestContext,
	notifications: Arc<NotificationRegistry>,
	active: Mutex<Option<Active>>,
	generation: AtomicU64,
	connected: AtomicBool,
}

impl Inner {
	fn logger(&self) -> &dyn Logger {
		&*self.ctx.logger
	}

	/// Clears the active port if it is still the one that disconnected.
	fn port_lost(&self, generation: u64) {
		let lost = {
			let mut active = self.active.lock();
			match active.as_ref() {
				Some(current) if current.generation == generation => active.take(),
				_ => None,
			}
		};

		if lost.is_some() {
			self.connected.store(false, Ordering::SeqCst);
			self.logger().error(format_args!(
				"[TransportProvider] native port disconnected, provider is no longer connected"
			));
		}
	}
}

/// Owns the single active transport and exposes a uniform RPC surface.
///
/// Cloning is cheap and yields a handle to the same provider.
#[derive(Clone)]
pub struct TransportProvider {
	inner: Arc<Inner>,
}

impl TransportProvider {
	pub fn new(config: ProviderConfig) -> Self {
		let ProviderConfig {
			direct_provider,
			stream,
			native_messaging,
			preferred,
			request_timeout,
			liveness_window,
			logger,
		} = config;

		logger.debug(format_args!(
			"[TransportProvider] initialized with: has_direct_provider={}, has_stream={}, preferred={:?}",
			direct_provider.is_some(),
			stream.is_some(),
			preferred
		));

		Self {
			inner: Arc::new(Inner {
				direct_provider,
				stream: Mutex::new(stream),
				native_messaging,
				preferred,
				liveness_window,
				ctx: RequestContext::new(request_timeout, logger),
				notifications: Arc::new(NotificationRegistry::new("notification")),
				active: Mutex::new(None),
				generation: AtomicU64::new(0),
				connected: AtomicBool::new(false),
			}),
		}
	}

	/// Establishes a transport, trying direct, native port, then stream.
	///
	/// Connecting while already connected returns the active kind without
	/// renegotiating. A stream is consumed by the first successful wrap and
	/// cannot be reused after `disconnect`.
	///
	/// # Errors
	///
	/// Returns [`Error::NoTransportAvailable`] when nothing applies. A failed
	/// native port attempt, including a port that dies right after opening,
	/// is logged and falls through to the stream.
	pub async fn connect(&self, options: ConnectOptions) -> Result<TransportKind> {
		let inner = &self.inner;
		inner.logger().debug(format_args!(
			"[TransportProvider] connect called: extension_id={:?}, has_direct_provider={}, has_stream={}, can_use_native_messaging={}",
			options.extension_id,
			inner.direct_provider.is_some(),
			inner.stream.lock().is_some(),
			inner.native_messaging.is_some()
		));

		if self.is_connected() {
			if let Some(kind) = self.active_transport() {
				inner
					.logger()
					.debug(format_args!("[TransportProvider] already connected via {kind}"));
				return Ok(kind);
			}
		}

		if let Some(provider) = &inner.direct_provider {
			inner
				.logger()
				.debug(format_args!("[TransportProvider] using existing provider"));
			let forwarder = provider.on_notification(self.forwarder());
			self.activate(ActiveTransport::Direct {
				provider: Arc::clone(provider),
				forwarder,
			});
			return Ok(TransportKind::Direct);
		}

		if let (Some(target), Some(messaging)) = (options.extension_id.as_deref(), &inner.native_messaging) {
			let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
			let result = NativePortTransport::open(
				messaging.as_ref(),
				target,
				inner.ctx.clone(),
				Arc::clone(&inner.notifications),
				inner.liveness_window,
				self.port_lost_hook(generation),
			)
			.await;

			match result {
				Ok(port) => {
					let port = Arc::new(port);
					self.activate_with(generation, ActiveTransport::NativePort(Arc::clone(&port)));
					// Lets the dispatch loop observe a hang-up that raced the ping.
					tokio::task::yield_now().await;
					if port.is_alive() {
						return Ok(TransportKind::NativePort);
					}
					inner.port_lost(generation);
					port.close();
					inner.logger().error(format_args!(
						"[TransportProvider] native port connection failed: port to '{target}' closed while connecting"
					));
				}
				Err(e) => inner
					.logger()
					.error(format_args!("[TransportProvider] native port connection failed: {e}")),
			}
		}

		let stream = inner.stream.lock().take();
		if let Some(parts) = stream {
			inner
				.logger()
				.debug(format_args!("[TransportProvider] using existing stream"));
			let provider = Arc::new(StreamProvider::spawn(parts, inner.ctx.clone()));
			let forwarder = provider.on_notification(self.forwarder());
			self.activate(ActiveTransport::Stream { provider, forwarder });
			return Ok(TransportKind::Stream);
		}

		inner
			.logger()
			.error(format_args!("[TransportProvider] no valid provider available"));
		Err(Error::NoTransportAvailable)
	}

	/// Tears down the active transport and clears all bookkeeping.
	///
	/// Idempotent and infallible: teardown errors are logged and swallowed.
	pub fn disconnect(&self) {
		let inner = &self.inner;
		inner
			.logger()
			.debug(format_args!("[TransportProvider] disconnecting..."));

		let active = inner.active.lock().take();
		if let Some(active) = active {
			active.transport.teardown(inner.logger());
		}

		inner.connected.store(false, Ordering::SeqCst);
		inner.ctx.pending.reject_all(|| Error::ChannelClosed);
		self.remove_all_notification_listeners();
	}

	/// Reflects the `connect` / `disconnect` lifecycle only.
	pub fn is_connected(&self) -> bool {
		self.inner.connected.load(Ordering::SeqCst)
	}

	/// Whether the active transport can still carry requests.
	///
	/// Unlike [`is_connected`](Self::is_connected) this turns false as soon
	/// as the remote end goes away (stream EOF or a closed port), before
	/// anyone calls `disconnect`.
	pub fn is_transport_alive(&self) -> bool {
		self.inner
			.active
			.lock()
			.as_ref()
			.is_some_and(|active| active.transport.is_alive())
	}

	/// Kind of the active transport, if any.
	pub fn active_transport(&self) -> Option<TransportKind> {
		self.inner
			.active
			.lock()
			.as_ref()
			.map(|active| active.transport.kind())
	}

	/// Sends `payload` over the active transport and awaits the result.
	///
	/// # Errors
	///
	/// - [`Error::NotConnected`] before a successful `connect`
	/// - [`Error::PreferredTransportUnavailable`] if a pinned kind is not active
	/// - [`Error::RequestTimeout`] / [`Error::Remote`] from the remote exchange
	pub async fn request(&self, payload: RpcPayload) -> Result<Value> {
		if !self.is_connected() {
			return Err(Error::NotConnected);
		}

		match self.select_transport()? {
			ActiveTransport::Direct { provider, .. } => provider.request(payload).await,
			ActiveTransport::Stream { provider, .. } => provider.request(payload).await,
			ActiveTransport::NativePort(port) => port.request(payload).await,
		}
	}

	/// Registers a notification callback.
	pub fn on_notification(&self, callback: NotificationCallback) -> ListenerId {
		self.inner
			.logger()
			.debug(format_args!("[TransportProvider] adding notification listener"));
		self.inner.notifications.add(callback)
	}

	/// Removes a notification callback. Returns false if it was not registered.
	pub fn remove_notification_listener(&self, id: ListenerId) -> bool {
		self.inner
			.logger()
			.debug(format_args!("[TransportProvider] removing notification listener"));
		self.inner.notifications.remove(id)
	}

	pub fn remove_all_notification_listeners(&self) {
		self.inner
			.logger()
			.debug(format_args!("[TransportProvider] removing all notification listeners"));
		self.inner.notifications.clear();
	}

	pub fn notification_listener_count(&self) -> usize {
		self.inner.notifications.len()
	}

	/// Number of requests awaiting a reply.
	pub fn pending_requests(&self) -> usize {
		self.inner.ctx.pending.len()
	}

	/// The injected logger.
	pub fn logger(&self) -> Arc<dyn Logger> {
		Arc::clone(&self.inner.ctx.logger)
	}

	fn select_transport(&self) -> Result<ActiveTransport> {
		let active = self.inner.active.lock();
		let Some(active) = active.as_ref() else {
			return Err(Error::NoTransportAvailable);
		};

		match self.inner.preferred {
			Some(kind) if kind != active.transport.kind() => Err(Error::PreferredTransportUnavailable(kind)),
			_ => Ok(active.transport.clone()),
		}
	}

	fn activate(&self, transport: ActiveTransport) {
		let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
		self.activate_with(generation, transport);
	}

	/// Installs `transport`, tearing down any previous handle.
	fn activate_with(&self, generation: u64, transport: ActiveTransport) {
		let previous = self
			.inner
			.active
			.lock()
			.replace(Active { generation, transport });
		if let Some(previous) = previous {
			previous.transport.teardown(self.inner.logger());
		}
		self.inner.connected.store(true, Ordering::SeqCst);
	}

	/// Callback handed to provider objects, fanning their pushes into our registry.
	fn forwarder(&self) -> NotificationCallback {
		let notifications = Arc::clone(&self.inner.notifications);
		let logger = Arc::clone(&self.inner.ctx.logger);
		Arc::new(move |notification: &Value| {
			logger.debug(format_args!("[TransportProvider] provider notification: {notification}"));
			notifications.emit(notification, &*logger);
		})
	}

	fn port_lost_hook(&self, generation: u64) -> native::DisconnectHook {
		let inner: Weak<Inner> = Arc::downgrade(&self.inner);
		Box::new(move || {
			if let Some(inner) = inner.upgrade() {
				inner.port_lost(generation);
			}
		})
	}
}

impl fmt::Debug for TransportProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TransportProvider")
			.field("connected", &self.is_connected())
			.field("active", &self.active_transport())
			.field("pending", &self.pending_requests())
			.field("listeners", &self.notification_listener_count())
			.finish()
	}
}
