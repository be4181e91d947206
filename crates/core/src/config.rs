//! [`SessionClient`](crate::SessionClient) configuration.

use std::sync::Arc;

use mc_runtime::{Logger, default_logger};

/// How many sessions the client holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionMode {
	/// One session slot. Disconnecting revokes the held session first.
	Single,
	/// Sessions keyed by id, falling back to
	/// [`DEFAULT_SESSION_ID`](mc_protocol::DEFAULT_SESSION_ID).
	#[default]
	Multi,
}

/// How a `wallet_sessionChanged` push is merged into a held session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
	/// Replace all five session fields, clearing the ones the push omits.
	Overwrite,
	/// Replace only the fields the push carries.
	#[default]
	PresentFieldsOnly,
}

/// Scope requested implicitly on connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapScope {
	/// Scope id, e.g. `eip155:1`.
	pub scope: String,
	pub methods: Vec<String>,
}

impl BootstrapScope {
	pub fn new(scope: impl Into<String>) -> Self {
		Self {
			scope: scope.into(),
			methods: Vec::new(),
		}
	}

	pub fn method(mut self, method: impl Into<String>) -> Self {
		self.methods.push(method.into());
		self
	}
}

/// Options for [`SessionClient::new`](crate::SessionClient::new).
#[derive(Clone)]
pub struct SessionClientConfig {
	pub mode: SessionMode,
	pub merge_policy: MergePolicy,
	/// When set, `connect` creates a session for this scope.
	pub bootstrap: Option<BootstrapScope>,
	pub logger: Arc<dyn Logger>,
}

impl Default for SessionClientConfig {
	fn default() -> Self {
		Self {
			mode: SessionMode::default(),
			merge_policy: MergePolicy::default(),
			bootstrap: None,
			logger: default_logger(),
		}
	}
}

impl SessionClientConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn mode(mut self, mode: SessionMode) -> Self {
		self.mode = mode;
		self
	}

	pub fn merge_policy(mut self, policy: MergePolicy) -> Self {
		self.merge_policy = policy;
		self
	}

	pub fn bootstrap(mut self, scope: BootstrapScope) -> Self {
		self.bootstrap = Some(scope);
		self
	}

	pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
		self.logger = logger;
		self
	}
}

impl std::fmt::Debug for SessionClientConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionClientConfig")
			.field("mode", &self.mode)
			.field("merge_policy", &self.merge_policy)
			.field("bootstrap", &self.bootstrap)
			.finish_non_exhaustive()
	}
}
