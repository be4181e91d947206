//! Listener registries.
//!
//! [`ListenerRegistry<T>`] stores callbacks in an [`IndexMap`] keyed by
//! [`ListenerId`], giving O(1) insertion and removal. Emission snapshots the
//! callbacks before invoking them so a callback may add or remove listeners
//! without deadlocking, and a panicking callback is caught and logged without
//! affecting the others.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::logger::Logger;

/// Unique identifier for a registered listener.
pub type ListenerId = u64;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a new globally-unique listener ID.
pub fn next_listener_id() -> ListenerId {
	NEXT_LISTENER_ID.fetch_add(1, Ordering::SeqCst)
}

/// Shared callback receiving `&T`.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Callback receiving raw notifications.
pub type NotificationCallback = Listener<Value>;

/// Registry of raw notification callbacks.
pub type NotificationRegistry = ListenerRegistry<Value>;

/// Set of callbacks for one event type.
pub struct ListenerRegistry<T: ?Sized> {
	name: &'static str,
	listeners: Mutex<IndexMap<ListenerId, Listener<T>>>,
}

impl<T: ?Sized> ListenerRegistry<T> {
	/// Creates an empty registry. `name` only appears in log lines.
	pub fn new(name: &'static str) -> Self {
		Self {
			name,
			listeners: Mutex::new(IndexMap::new()),
		}
	}

	/// Registers a callback and returns its id.
	pub fn add(&self, listener: Listener<T>) -> ListenerId {
		let id = next_listener_id();
		self.listeners.lock().insert(id, listener);
		id
	}

	/// Removes a callback. Returns false if the id was not registered here.
	///
	/// Removal swaps the last entry into the freed slot, so emission order is
	/// only insertion order until the first removal.
	pub fn remove(&self, id: ListenerId) -> bool {
		self.listeners.lock().swap_remove(&id).is_some()
	}

	pub fn contains(&self, id: ListenerId) -> bool {
		self.listeners.lock().contains_key(&id)
	}

	pub fn clear(&self) {
		self.listeners.lock().clear();
	}

	pub fn len(&self) -> usize {
		self.listeners.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.listeners.lock().is_empty()
	}

	/// Invokes every registered callback with `event`.
	///
	/// Returns the number of callbacks that completed without panicking.
	pub fn emit(&self, event: &T, logger: &dyn Logger) -> usize {
		let snapshot: Vec<(ListenerId, Listener<T>)> = self
			.listeners
			.lock()
			.iter()
			.map(|(id, listener)| (*id, Arc::clone(listener)))
			.collect();

		let mut delivered = 0;
		for (id, listener) in snapshot {
			match catch_unwind(AssertUnwindSafe(|| listener(event))) {
				Ok(()) => delivered += 1,
				Err(panic) => {
					let reason = panic
						.downcast_ref::<&str>()
						.map(|s| s.to_string())
						.or_else(|| panic.downcast_ref::<String>().cloned())
						.unwrap_or_else(|| "unknown panic".to_string());
					logger.error(format_args!(
						"Error in {} callback (listener={}): {}",
						self.name, id, reason
					));
				}
			}
		}
		delivered
	}
}

impl<T: ?Sized> std::fmt::Debug for ListenerRegistry<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ListenerRegistry")
			.field("name", &self.name)
			.field("len", &self.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::AtomicUsize;

	use serde_json::json;

	use super::*;
	use crate::logger::{LogLevel, RecordingLogger};

	#[test]
	fn test_listener_id_increments() {
		let id1 = next_listener_id();
		let id2 = next_listener_id();
		assert!(id2 > id1);
	}

	#[test]
	fn test_add_remove_clear() {
		let registry = NotificationRegistry::new("notification");
		let a = registry.add(Arc::new(|_: &Value| {}));
		let b = registry.add(Arc::new(|_: &Value| {}));
		assert_eq!(registry.len(), 2);

		assert!(registry.remove(a));
		assert!(!registry.remove(a));
		assert!(registry.contains(b));
		assert_eq!(registry.len(), 1);

		registry.clear();
		assert!(registry.is_empty());
	}

	#[test]
	fn test_emit_reaches_every_listener() {
		let registry = NotificationRegistry::new("notification");
		let hits = Arc::new(AtomicUsize::new(0));
		for _ in 0..3 {
			let hits = Arc::clone(&hits);
			registry.add(Arc::new(move |value: &Value| {
				assert_eq!(value["method"], "wallet_notify");
				hits.fetch_add(1, Ordering::SeqCst);
			}));
		}

		let delivered = registry.emit(&json!({"method": "wallet_notify"}), &RecordingLogger::new());
		assert_eq!(delivered, 3);
		assert_eq!(hits.load(Ordering::SeqCst), 3);
	}

	fn explode(_: &Value) {
		panic!("listener exploded");
	}

	#[test]
	fn test_panicking_listener_is_isolated() {
		let registry = NotificationRegistry::new("notification");
		let hits = Arc::new(AtomicUsize::new(0));

		let first = Arc::clone(&hits);
		registry.add(Arc::new(move |_: &Value| {
			first.fetch_add(1, Ordering::SeqCst);
		}));
		registry.add(Arc::new(explode));
		let last = Arc::clone(&hits);
		registry.add(Arc::new(move |_: &Value| {
			last.fetch_add(1, Ordering::SeqCst);
		}));

		let logger = RecordingLogger::new();
		let delivered = registry.emit(&json!({}), &logger);

		assert_eq!(delivered, 2);
		assert_eq!(hits.load(Ordering::SeqCst), 2);
		assert!(logger.contains(LogLevel::Error, "listener exploded"));
	}

	#[test]
	fn test_listener_may_unregister_itself() {
		let registry = Arc::new(NotificationRegistry::new("notification"));
		let slot = Arc::new(AtomicU64::new(0));

		let weak = Arc::downgrade(&registry);
		let own_id = Arc::clone(&slot);
		let id = registry.add(Arc::new(move |_: &Value| {
			if let Some(registry) = weak.upgrade() {
				registry.remove(own_id.load(Ordering::SeqCst));
			}
		}));
		slot.store(id, Ordering::SeqCst);

		registry.emit(&json!({}), &RecordingLogger::new());
		assert!(registry.is_empty());
	}
}
