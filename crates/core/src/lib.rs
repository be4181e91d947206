//! multichain: session lifecycle client for multichain wallets
//!
//! [`SessionClient`] creates, fetches, and revokes wallet sessions, invokes
//! scoped methods, and keeps its held sessions in sync with
//! `wallet_sessionChanged` pushes. It runs over a
//! [`TransportProvider`](mc_runtime::TransportProvider), which picks a direct
//! provider, a native messaging port, or a duplex stream.
//!
//! # Example
//!
//! ```ignore
//! use multichain::{CreateSessionRequest, ProviderConfig, SessionClient, SessionClientConfig, TransportProvider};
//!
//! let transport = TransportProvider::new(ProviderConfig::new().with_stream(stdout, stdin));
//! let client = SessionClient::new(transport, SessionClientConfig::default());
//! client.connect(Default::default()).await?;
//!
//! client.on_session_changed(|event| println!("{:?}: {:?}", event.kind, event.session.session_scopes));
//! client
//!     .create_session(CreateSessionRequest::new().optional_scope("eip155:1", ["eth_call"], ["eip155:1:0xabc"]))
//!     .await?;
//! ```

mod client;
pub mod config;
mod error;
pub mod events;
pub mod scopes;
pub mod store;

pub use client::{Connected, CreateSessionRequest, SessionClient};
pub use config::{BootstrapScope, MergePolicy, SessionClientConfig, SessionMode};
pub use error::{Error, Result};
pub use events::{ClientListener, SessionChangeKind, SessionChangedCallback, SessionChangedEvent};
pub use mc_protocol::{DEFAULT_SESSION_ID, RpcPayload, ScopeMap, ScopeObject, Session};
pub use mc_runtime::Error as TransportError;
pub use mc_runtime::{
	ConnectOptions, ListenerId, Logger, MemoryMessaging, NativeMessaging, NullLogger, ProviderConfig, RecordingLogger,
	RpcProvider, TracingLogger, TransportKind, TransportProvider,
};
pub use store::{MultiSessionStore, SessionStore, SingleSessionStore};
