//! Wire types shared by the multichain transport and session layers.
//!
//! - [`rpc`]: JSON-RPC 2.0 request/reply envelopes, inbound message
//!   classification, and the native-port wrapper envelope.
//! - [`session`]: session records, scope objects, and the fixed wallet
//!   method names.

pub mod rpc;
pub mod session;

pub use rpc::{InboundMessage, JSONRPC_VERSION, PortEnvelope, RpcErrorObject, RpcPayload, RpcRequest, RpcResponse};
pub use session::{
	CreateSessionParams, DEFAULT_SESSION_ID, InvokeMethodParams, PropertyMap, ScopeMap, ScopeObject, Session,
	SessionChangedParams, methods,
};
