//! Scope helpers.

use mc_protocol::{ScopeMap, ScopeObject};
use serde_json::{Map, Value};

/// Normalizes caller-supplied optional scopes for `wallet_createSession`.
///
/// `methods` and `accounts` are kept when they are arrays and replaced by an
/// empty list otherwise. Non-string items are dropped. `notifications` is
/// always sent empty.
pub fn normalize_optional_scopes(scopes: &Map<String, Value>) -> ScopeMap {
	scopes
		.iter()
		.map(|(scope_id, scope)| {
			let normalized = ScopeObject {
				methods: string_list(scope.get("methods")),
				notifications: Vec::new(),
				accounts: string_list(scope.get("accounts")),
			};
			(scope_id.clone(), normalized)
		})
		.collect()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
	match value {
		Some(Value::Array(items)) => items
			.iter()
			.filter_map(Value::as_str)
			.map(str::to_string)
			.collect(),
		_ => Vec::new(),
	}
}

/// Address part of a CAIP-10 account id (`eip155:1:0xabc` -> `0xabc`).
pub fn account_address(account: &str) -> &str {
	account.rsplit(':').next().unwrap_or(account)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn normalizes_methods_accounts_and_notifications() {
		let raw = json!({
			"eip155:1": {
				"methods": ["eth_call", 7, "eth_sendTransaction"],
				"notifications": ["eth_subscription"],
				"accounts": ["eip155:1:0xabc"]
			},
			"eip155:10": {"methods": "eth_call", "accounts": null},
			"solana:mainnet": 42
		});
		let scopes = normalize_optional_scopes(raw.as_object().unwrap());

		let mainnet = &scopes["eip155:1"];
		assert_eq!(mainnet.methods, vec!["eth_call", "eth_sendTransaction"]);
		assert!(mainnet.notifications.is_empty());
		assert_eq!(mainnet.accounts, vec!["eip155:1:0xabc"]);

		assert_eq!(scopes["eip155:10"], ScopeObject::default());
		assert_eq!(scopes["solana:mainnet"], ScopeObject::default());
	}

	#[test]
	fn account_address_takes_last_segment() {
		assert_eq!(account_address("eip155:1:0xabc"), "0xabc");
		assert_eq!(account_address("0xabc"), "0xabc");
		assert_eq!(account_address("eip155:1:"), "");
	}
}
