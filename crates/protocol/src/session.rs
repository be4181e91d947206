//! Session records and wallet method parameters.
//!
//! A session is the remote wallet's current grant of capability scopes.
//! Every scope id (for example `eip155:1`) maps to a [`ScopeObject`] listing
//! the methods, notifications, and accounts granted under it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rpc::RpcPayload;

/// Fixed wallet method names.
pub mod methods {
	pub const CREATE_SESSION: &str = "wallet_createSession";
	pub const REVOKE_SESSION: &str = "wallet_revokeSession";
	pub const GET_SESSION: &str = "wallet_getSession";
	pub const INVOKE_METHOD: &str = "wallet_invokeMethod";
	/// Inbound push announcing a change to the granted scopes.
	pub const SESSION_CHANGED: &str = "wallet_sessionChanged";
}

/// Store key used when the wallet does not hand out session ids.
pub const DEFAULT_SESSION_ID: &str = "SINGLE_SESSION_ONLY";

/// Opaque property bag.
pub type PropertyMap = serde_json::Map<String, Value>;

/// Scope id to granted capabilities. Ordered for stable output.
pub type ScopeMap = BTreeMap<String, ScopeObject>;

/// Capabilities granted under one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeObject {
	#[serde(default)]
	pub methods: Vec<String>,
	#[serde(default)]
	pub notifications: Vec<String>,
	/// CAIP-10 account ids (`namespace:reference:address`).
	#[serde(default)]
	pub accounts: Vec<String>,
}

/// Locally held view of a remote session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	/// Remote session id, absent when the wallet only supports one session.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
	#[serde(default)]
	pub session_scopes: ScopeMap,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scoped_properties: Option<PropertyMap>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_properties: Option<PropertyMap>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expiry: Option<String>,
}

impl Session {
	/// Builds a session from a `wallet_createSession` or `wallet_getSession` reply.
	///
	/// The expiry is read from the top-level `expiry` field, falling back to
	/// `sessionProperties.expiry`.
	pub fn from_reply(reply: &Value) -> Result<Self, serde_json::Error> {
		let mut session = Session::deserialize(reply)?;
		if session.expiry.is_none() {
			session.expiry = session
				.session_properties
				.as_ref()
				.and_then(|props| props.get("expiry"))
				.and_then(Value::as_str)
				.map(str::to_string);
		}
		Ok(session)
	}

	/// Key this session is stored under.
	pub fn store_key(&self) -> &str {
		self.session_id.as_deref().unwrap_or(DEFAULT_SESSION_ID)
	}
}

/// Params of an inbound `wallet_sessionChanged` push.
///
/// Every field is optional so that merge policies can tell an absent field
/// from a present one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionChangedParams {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_scopes: Option<ScopeMap>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scoped_properties: Option<PropertyMap>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_properties: Option<PropertyMap>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expiry: Option<String>,
}

impl SessionChangedParams {
	/// Recognizes a `wallet_sessionChanged` push.
	///
	/// Returns `None` for every other notification, including pushes whose
	/// params lack the `sessionScopes` discriminator. Returns `Some(Err(_))`
	/// when the push is recognized but its params do not decode.
	pub fn from_notification(notification: &Value) -> Option<Result<Self, serde_json::Error>> {
		if notification.get("method").and_then(Value::as_str) != Some(methods::SESSION_CHANGED) {
			return None;
		}
		let params = notification.get("params").filter(|p| p.is_object())?;
		params.get("sessionScopes")?;
		Some(SessionChangedParams::deserialize(params))
	}
}

/// Params of `wallet_createSession`.
///
/// Required scopes and both property maps are left out of the payload
/// entirely when empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionParams {
	pub optional_scopes: ScopeMap,
	#[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
	pub required_scopes: PropertyMap,
	#[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
	pub scoped_properties: PropertyMap,
	#[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
	pub session_properties: PropertyMap,
}

/// Params of `wallet_invokeMethod`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeMethodParams {
	/// Scope the inner request is routed to.
	pub scope: String,
	/// Inner request executed by the wallet under `scope`.
	pub request: RpcPayload,
}
