//! Thread-safe in-memory [`KeyValueStore`] scoped to the process lifetime.

// self
use crate::{
	_prelude::*,
	storage::{KeyValueStore, StorageFuture},
};

type StoreMap = Arc<RwLock<HashMap<String, String>>>;

/// In-process storage backend; the analogue of page-lifetime memory state.
///
/// Clones share the same underlying map, so independent components handed a
/// clone observe each other's writes, but separate processes never do.
#[derive(Clone, Debug, Default)]
pub struct MemoryKeyValueStore(StoreMap);
impl KeyValueStore for MemoryKeyValueStore {
	fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> StorageFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.to_owned(), value);

			Ok(())
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().remove(key);

			Ok(())
		})
	}

	fn keys(&self) -> StorageFuture<'_, Vec<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().keys().cloned().collect()) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn set_get_remove_round_trip() {
		let store = MemoryKeyValueStore::default();

		store.set("k", "v".into()).await.expect("Setting a value should succeed.");

		assert_eq!(
			store.get("k").await.expect("Fetching a stored value should succeed."),
			Some("v".into())
		);

		store.remove("k").await.expect("Removing a stored value should succeed.");
		store.remove("k").await.expect("Removing a missing key should still succeed.");

		assert_eq!(store.get("k").await.expect("Fetching a removed key should succeed."), None);
	}

	#[tokio::test]
	async fn clones_share_state() {
		let store = MemoryKeyValueStore::default();
		let view = store.clone();

		store.set("shared", "yes".into()).await.expect("Setting via one clone should succeed.");

		assert_eq!(
			view.get("shared").await.expect("Fetching via the other clone should succeed."),
			Some("yes".into())
		);
		assert_eq!(view.keys().await.expect("Listing keys should succeed."), vec!["shared"]);
	}
}
