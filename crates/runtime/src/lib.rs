//! Multichain runtime - transport negotiation and request correlation
//!
//! This crate owns everything below the session layer:
//!
//! - **Transport provider**: picks one of direct provider, native port, or stream
//! - **Correlation**: integer ids, a pending-request table, per-request timeouts
//! - **Notification fan-out**: id-less inbound messages reach every callback
//! - **Logging**: an injectable [`Logger`] instead of process-wide state
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  SessionClient   │  mc-client
//! └────────┬─────────┘
//!          │ request / on_notification
//! ┌────────▼─────────┐
//! │ TransportProvider│  This crate
//! │  ┌────────────┐  │
//! │  │ Direct     │  │  caller-supplied RpcProvider
//! │  │ NativePort │  │  caip-x envelopes over a port
//! │  │ Stream     │  │  length-prefixed JSON frames
//! │  └────────────┘  │
//! └──────────────────┘
//! ```

pub mod error;
pub mod logger;
pub mod pending;
pub mod provider;
pub mod registry;
pub mod transport;

pub use error::{Error, Result};
pub use logger::{LogLevel, Logger, NullLogger, RecordingLogger, TracingLogger, default_logger};
pub use pending::{PendingRequest, PendingRequests};
pub use provider::RpcProvider;
pub use registry::{Listener, ListenerId, ListenerRegistry, NotificationCallback, NotificationRegistry};
pub use transport::{
	ConnectOptions, DEFAULT_LIVENESS_WINDOW, DEFAULT_REQUEST_TIMEOUT, MemoryMessaging, NativeMessaging, NativePort,
	NativePortTransport, PortConnection, PortEvent, ProviderConfig, RemotePort, StreamParts, StreamProvider,
	TransportKind, TransportProvider,
};
