//! The routing-data cache: a concurrent get-or-load map from id to a shared,
//! read-only payload (a transport network, a [`crate::SparseTileArray`]-based
//! sparse egress table, or an opportunity grid). Per §5/§9, this is an
//! injected data store keyed by id with a load function — never an ambient
//! singleton — so processors and batch workers can share the same built
//! tables without re-deserializing them on every request.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A concurrent read cache from `id -> Arc<V>`, populated lazily by
/// [`RoutingDataCache::get_or_load`]. Reads of an already-populated entry
/// never block on another id's load; two concurrent loads of the *same*
/// missing id may race and both run the loader, with the second writer's
/// value winning — acceptable here because loaders are pure functions of
/// `id` and the built value is immutable once shared.
pub struct RoutingDataCache<V> {
	entries: Mutex<HashMap<String, Arc<V>>>,
}

impl<V> RoutingDataCache<V> {
	#[must_use]
	pub fn new() -> RoutingDataCache<V> {
		RoutingDataCache { entries: Mutex::new(HashMap::new()) }
	}

	/// Returns the cached value for `id`, not the one computed by `load`.
	/// `None` on a cache miss (this method never loads).
	#[must_use]
	pub fn get(&self, id: &str) -> Option<Arc<V>> {
		self.entries.lock().expect("routing data cache lock poisoned").get(id).cloned()
	}

	/// Returns the cached value for `id`, or runs `load` to build it,
	/// shares it, and returns it. `load`'s error (data-not-found, fatal
	/// internal fault per §7) propagates to the caller without being
	/// cached.
	pub fn get_or_load(&self, id: &str, load: impl FnOnce() -> Result<V>) -> Result<Arc<V>> {
		if let Some(value) = self.get(id) {
			return Ok(value);
		}
		let value = Arc::new(load()?);
		self
			.entries
			.lock()
			.expect("routing data cache lock poisoned")
			.insert(id.to_string(), Arc::clone(&value));
		Ok(value)
	}

	/// Evicts `id`, if present. Used by tests and by callers that rebuild a
	/// network out from under the cache.
	pub fn invalidate(&self, id: &str) {
		self.entries.lock().expect("routing data cache lock poisoned").remove(id);
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.lock().expect("routing data cache lock poisoned").len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<V> Default for RoutingDataCache<V> {
	fn default() -> Self {
		RoutingDataCache::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[test]
	fn loads_once_and_shares_the_result() {
		let cache: RoutingDataCache<u32> = RoutingDataCache::new();
		let loads = AtomicUsize::new(0);
		let load = || {
			loads.fetch_add(1, Ordering::SeqCst);
			Ok(42)
		};
		let a = cache.get_or_load("network-1", load).unwrap();
		let b = cache.get_or_load("network-1", load).unwrap();
		assert_eq!(*a, 42);
		assert!(Arc::ptr_eq(&a, &b));
		assert_eq!(loads.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn miss_propagates_the_loader_error() {
		let cache: RoutingDataCache<u32> = RoutingDataCache::new();
		let result = cache.get_or_load("missing", || anyhow::bail!("data not found"));
		assert!(result.is_err());
		assert!(cache.get("missing").is_none());
	}

	#[test]
	fn invalidate_forces_a_reload() {
		let cache: RoutingDataCache<u32> = RoutingDataCache::new();
		cache.get_or_load("id", || Ok(1)).unwrap();
		cache.invalidate("id");
		let loads = AtomicUsize::new(0);
		let value = cache
			.get_or_load("id", || {
				loads.fetch_add(1, Ordering::SeqCst);
				Ok(2)
			})
			.unwrap();
		assert_eq!(*value, 2);
		assert_eq!(loads.load(Ordering::SeqCst), 1);
	}
}
