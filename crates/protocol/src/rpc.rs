//! JSON-RPC 2.0 envelopes.
//!
//! Outbound calls start life as an [`RpcPayload`] (method and params only).
//! A transport that needs correlation wraps the payload into an
//! [`RpcRequest`] carrying a numeric id, and native ports additionally wrap
//! that request in a [`PortEnvelope`].
//!
//! Inbound traffic is classified by [`InboundMessage::classify`]: anything
//! carrying an `id` is a reply, anything without one is a notification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version string sent with every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// A method call as issued by callers, before any correlation id is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcPayload {
	/// Remote method name.
	pub method: String,
	/// Method parameters, omitted from the wire when null.
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub params: Value,
}

impl RpcPayload {
	pub fn new(method: impl Into<String>, params: Value) -> Self {
		Self {
			method: method.into(),
			params,
		}
	}
}

/// Outbound request with a correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
	/// Correlation id echoed back by the remote in its reply.
	pub id: u64,
	/// Always [`JSONRPC_VERSION`].
	pub jsonrpc: String,
	/// Remote method name.
	pub method: String,
	/// Method parameters.
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub params: Value,
}

impl RpcRequest {
	/// Assigns `id` to a caller payload.
	pub fn new(id: u64, payload: RpcPayload) -> Self {
		Self {
			id,
			jsonrpc: JSONRPC_VERSION.to_string(),
			method: payload.method,
			params: payload.params,
		}
	}
}

/// Reply to an [`RpcRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
	/// Id of the request this reply answers.
	pub id: u64,
	/// Success result (mutually exclusive with `error`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Error result (mutually exclusive with `result`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<RpcErrorObject>,
}

/// Error payload of a failed reply, surfaced verbatim to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
	/// JSON-RPC error code. Zero when the remote omitted it.
	#[serde(default)]
	pub code: i64,
	/// Human-readable message.
	#[serde(default)]
	pub message: String,
	/// Optional structured details.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

/// Classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
	/// Message with a numeric `id`, routed to the matching pending request.
	Reply(RpcResponse),
	/// Message with an `id` that can never match a request issued here
	/// (non-numeric id, or a malformed reply body). Dropped by transports.
	Foreign(Value),
	/// Message without an `id`, fanned out to notification listeners.
	Notification(Value),
}

impl InboundMessage {
	/// Routes a raw message by the presence of its correlation id.
	///
	/// A missing or null `id` marks a notification. Every other message is a
	/// reply candidate and is never treated as a notification.
	pub fn classify(value: Value) -> Self {
		match value.get("id") {
			None | Some(Value::Null) => Self::Notification(value),
			Some(_) => match RpcResponse::deserialize(&value) {
				Ok(response) => Self::Reply(response),
				Err(_) => Self::Foreign(value),
			},
		}
	}
}

/// Envelope posted on a native messaging port.
///
/// The `type` tag separates correlated calls from the liveness probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PortEnvelope {
	/// A correlated RPC call.
	#[serde(rename = "caip-x")]
	Rpc { data: RpcRequest },
	/// Liveness probe posted right after a port opens.
	#[serde(rename = "ping")]
	Ping,
}

impl PortEnvelope {
	/// Extracts the inner message of an inbound port envelope.
	///
	/// Replies and notifications both travel inside `data`; envelopes without
	/// an object `data` field carry nothing routable.
	pub fn inbound_data(message: Value) -> Option<Value> {
		match message {
			Value::Object(mut map) => match map.remove("data") {
				Some(data @ Value::Object(_)) => Some(data),
				_ => None,
			},
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn request_wire_format() {
		let request = RpcRequest::new(7, RpcPayload::new("wallet_getSession", json!(["abc"])));
		let value = serde_json::to_value(&request).unwrap();

		assert_eq!(
			value,
			json!({"id": 7, "jsonrpc": "2.0", "method": "wallet_getSession", "params": ["abc"]})
		);
	}

	#[test]
	fn null_params_are_omitted() {
		let request = RpcRequest::new(1, RpcPayload::new("eth_chainId", Value::Null));
		let value = serde_json::to_value(&request).unwrap();
		assert!(value.get("params").is_none());
	}

	#[test]
	fn port_envelope_tags() {
		let rpc = PortEnvelope::Rpc {
			data: RpcRequest::new(3, RpcPayload::new("wallet_invokeMethod", json!({}))),
		};
		let value = serde_json::to_value(&rpc).unwrap();
		assert_eq!(value["type"], "caip-x");
		assert_eq!(value["data"]["id"], 3);
		assert_eq!(value["data"]["jsonrpc"], "2.0");

		let ping = serde_json::to_value(PortEnvelope::Ping).unwrap();
		assert_eq!(ping, json!({"type": "ping"}));
	}

	#[test]
	fn classify_reply() {
		let message = InboundMessage::classify(json!({"id": 42, "result": {"ok": true}}));
		match message {
			InboundMessage::Reply(response) => {
				assert_eq!(response.id, 42);
				assert_eq!(response.result, Some(json!({"ok": true})));
				assert!(response.error.is_none());
			}
			other => panic!("Expected Reply, got {other:?}"),
		}
	}

	#[test]
	fn classify_error_reply() {
		let message = InboundMessage::classify(json!({
			"id": 5,
			"error": {"code": 4100, "message": "Unauthorized"}
		}));
		match message {
			InboundMessage::Reply(response) => {
				let error = response.error.unwrap();
				assert_eq!(error.code, 4100);
				assert_eq!(error.message, "Unauthorized");
			}
			other => panic!("Expected Reply, got {other:?}"),
		}
	}

	#[test]
	fn classify_notification() {
		let raw = json!({"method": "wallet_notify", "params": {"scope": "eip155:1"}});
		assert_eq!(InboundMessage::classify(raw.clone()), InboundMessage::Notification(raw));

		let null_id = json!({"id": null, "method": "wallet_notify"});
		assert!(matches!(
			InboundMessage::classify(null_id),
			InboundMessage::Notification(_)
		));
	}

	#[test]
	fn classify_string_id_is_foreign() {
		let raw = json!({"id": "abc", "result": 1});
		assert_eq!(InboundMessage::classify(raw.clone()), InboundMessage::Foreign(raw));
	}

	#[test]
	fn inbound_data_extraction() {
		let data = PortEnvelope::inbound_data(json!({"type": "caip-x", "data": {"id": 1, "result": 2}}));
		assert_eq!(data, Some(json!({"id": 1, "result": 2})));

		assert_eq!(PortEnvelope::inbound_data(json!({"type": "pong"})), None);
		assert_eq!(PortEnvelope::inbound_data(json!({"data": "text"})), None);
		assert_eq!(PortEnvelope::inbound_data(json!([1, 2])), None);
	}
}
