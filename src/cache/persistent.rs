//! Durable [`TokenCache`] persisted through a [`KeyValueStore`].

// self
use crate::{
	_prelude::*,
	cache::{CacheFuture, CacheKey, CacheQuery, CachedToken, TokenCache},
	storage::{KeyValueStore, StorageError},
};

/// Cache backend persisting records through the shared key-value store, so
/// every scheduler (tab, process) sharing that store sees the same records.
#[derive(Clone)]
pub struct PersistentTokenCache {
	store: Arc<dyn KeyValueStore>,
}
impl PersistentTokenCache {
	/// Wraps the provided key-value store.
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self { store }
	}
}
impl TokenCache for PersistentTokenCache {
	fn get<'a>(
		&'a self,
		query: &'a CacheQuery,
		leeway: Duration,
	) -> CacheFuture<'a, Option<CachedToken>> {
		Box::pin(async move {
			let storage_key = query.key().storage_key();
			let Some(raw) = self.store.get(&storage_key).await? else { return Ok(None) };
			let token: CachedToken =
				serde_json::from_str(&raw).map_err(StorageError::serialization)?;

			if token.is_fresh_at(OffsetDateTime::now_utc(), leeway) {
				Ok(Some(token))
			} else {
				// Stale records are evicted on read so they never linger.
				self.store.remove(&storage_key).await?;

				Ok(None)
			}
		})
	}

	fn save(&self, token: CachedToken) -> CacheFuture<'_, ()> {
		Box::pin(async move {
			let storage_key = token.key().storage_key();
			let raw = serde_json::to_string(&token).map_err(StorageError::serialization)?;

			self.store.set(&storage_key, raw).await
		})
	}

	fn clear<'a>(&'a self, client_id: &'a str) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			let prefix = CacheKey::client_prefix(client_id);

			for key in self.store.keys().await? {
				if key.starts_with(&prefix) {
					self.store.remove(&key).await?;
				}
			}

			Ok(())
		})
	}
}
impl Debug for PersistentTokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("PersistentTokenCache(..)")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{cache::test_token, storage::MemoryKeyValueStore};

	fn build_cache() -> (PersistentTokenCache, Arc<MemoryKeyValueStore>) {
		let store = Arc::new(MemoryKeyValueStore::default());

		(PersistentTokenCache::new(store.clone()), store)
	}

	fn query() -> CacheQuery {
		CacheQuery {
			client_id: "client-1".into(),
			audience: "default".into(),
			scope: "openid".into(),
		}
	}

	#[tokio::test]
	async fn records_survive_via_the_shared_store() {
		let (cache, store) = build_cache();
		let now = OffsetDateTime::now_utc();

		cache
			.save(test_token("client-1", "default", "openid", now, Duration::hours(1)))
			.await
			.expect("Saving through the persistent cache should succeed.");

		// A second cache over the same store models another tab.
		let other_tab = PersistentTokenCache::new(store);
		let hit = other_tab
			.get(&query(), Duration::seconds(60))
			.await
			.expect("Fetching from the second cache should succeed.");

		assert!(hit.is_some(), "Both caches share the durable store.");
	}

	#[tokio::test]
	async fn stale_records_are_evicted_on_read() {
		let (cache, store) = build_cache();
		let issued = OffsetDateTime::now_utc() - Duration::hours(2);

		cache
			.save(test_token("client-1", "default", "openid", issued, Duration::hours(1)))
			.await
			.expect("Saving a stale record should succeed.");

		let miss = cache
			.get(&query(), Duration::ZERO)
			.await
			.expect("Fetching a stale record should succeed.");

		assert!(miss.is_none());
		assert!(
			store.keys().await.expect("Listing keys should succeed.").is_empty(),
			"Stale record should have been removed from the store."
		);
	}

	#[tokio::test]
	async fn clear_only_touches_cache_keys_of_the_client() {
		let (cache, store) = build_cache();
		let now = OffsetDateTime::now_utc();

		store
			.set("oidc-silent.is.authenticated", "true".into())
			.await
			.expect("Seeding an unrelated key should succeed.");
		cache
			.save(test_token("client-1", "default", "openid", now, Duration::hours(1)))
			.await
			.expect("Saving should succeed.");
		cache.clear("client-1").await.expect("Clearing the client should succeed.");

		let keys = store.keys().await.expect("Listing keys should succeed.");

		assert_eq!(keys, vec!["oidc-silent.is.authenticated".to_string()]);
	}
}
