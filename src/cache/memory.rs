//! Thread-safe in-memory [`TokenCache`] scoped to the process lifetime.

// self
use crate::{
	_prelude::*,
	cache::{CacheFuture, CacheKey, CacheQuery, CachedToken, TokenCache},
};

type CacheMap = Arc<RwLock<HashMap<CacheKey, CachedToken>>>;

/// In-process cache backend; never shared across schedulers.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenCache(CacheMap);
impl TokenCache for MemoryTokenCache {
	fn get<'a>(
		&'a self,
		query: &'a CacheQuery,
		leeway: Duration,
	) -> CacheFuture<'a, Option<CachedToken>> {
		let map = self.0.clone();

		Box::pin(async move {
			let key = query.key();
			let now = OffsetDateTime::now_utc();
			let mut guard = map.write();

			match guard.get(&key) {
				Some(token) if token.is_fresh_at(now, leeway) => Ok(Some(token.clone())),
				Some(_) => {
					// Stale records are evicted on read so they never linger.
					guard.remove(&key);

					Ok(None)
				},
				None => Ok(None),
			}
		})
	}

	fn save(&self, token: CachedToken) -> CacheFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(token.key(), token);

			Ok(())
		})
	}

	fn clear<'a>(&'a self, client_id: &'a str) -> CacheFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().retain(|key, _| key.client_id != client_id);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::cache::test_token;

	fn query(scope: &str) -> CacheQuery {
		CacheQuery { client_id: "client-1".into(), audience: "default".into(), scope: scope.into() }
	}

	#[tokio::test]
	async fn save_then_get_returns_fresh_records_only() {
		let cache = MemoryTokenCache::default();
		let now = OffsetDateTime::now_utc();

		cache
			.save(test_token("client-1", "default", "openid profile", now, Duration::hours(1)))
			.await
			.expect("Saving a fresh record should succeed.");

		let hit = cache
			.get(&query("openid profile"), Duration::seconds(60))
			.await
			.expect("Fetching a fresh record should succeed.");

		assert!(hit.is_some());

		let stale =
			test_token("client-1", "default", "email", now - Duration::hours(2), Duration::hours(1));

		cache.save(stale).await.expect("Saving a stale record should succeed.");

		let miss = cache
			.get(&query("email"), Duration::seconds(60))
			.await
			.expect("Fetching a stale record should succeed.");

		assert!(miss.is_none(), "Stale records must read as a miss.");
	}

	#[tokio::test]
	async fn scope_order_does_not_split_entries() {
		let cache = MemoryTokenCache::default();
		let now = OffsetDateTime::now_utc();

		cache
			.save(test_token("client-1", "default", "openid profile email", now, Duration::hours(1)))
			.await
			.expect("Saving should succeed.");

		let hit = cache
			.get(&query("email openid profile"), Duration::ZERO)
			.await
			.expect("Fetching with reordered scopes should succeed.");

		assert!(hit.is_some(), "Set-equal scope strings should hit the same entry.");
	}

	#[tokio::test]
	async fn clear_removes_only_the_named_client() {
		let cache = MemoryTokenCache::default();
		let now = OffsetDateTime::now_utc();

		cache
			.save(test_token("client-1", "default", "openid", now, Duration::hours(1)))
			.await
			.expect("Saving the first client's record should succeed.");
		cache
			.save(test_token("client-2", "default", "openid", now, Duration::hours(1)))
			.await
			.expect("Saving the second client's record should succeed.");
		cache.clear("client-1").await.expect("Clearing the first client should succeed.");

		assert!(
			cache
				.get(&query("openid"), Duration::ZERO)
				.await
				.expect("Fetching the cleared client should succeed.")
				.is_none()
		);

		let other = CacheQuery {
			client_id: "client-2".into(),
			audience: "default".into(),
			scope: "openid".into(),
		};

		assert!(
			cache
				.get(&other, Duration::ZERO)
				.await
				.expect("Fetching the surviving client should succeed.")
				.is_some()
		);
	}
}
