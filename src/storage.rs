//! Durable key-value storage contracts and the local authentication marker.
//!
//! The [`KeyValueStore`] trait stands in for per-origin durable browser
//! storage: transactions, cached tokens, lock leases, and the authentication
//! flag all persist through it under namespaced keys. Two backends ship with
//! the crate: an in-process map for page-lifetime state and a file-backed
//! snapshot visible to every process sharing the same path.

pub mod file;
pub mod memory;

pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;

// self
use crate::_prelude::*;

/// Storage key for the durable "is authenticated" hint.
const AUTH_FLAG_KEY: &str = "oidc-silent.is.authenticated";
/// Lifetime of the authentication hint before it is ignored.
const AUTH_FLAG_TTL: Duration = Duration::days(1);

/// Future type returned by [`KeyValueStore`] operations.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + 'a + Send>>;

/// Durable string-keyed storage contract shared by caches, transactions, and
/// lock leases.
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Fetches the value stored under `key`, if present.
	fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>>;

	/// Stores or replaces the value under `key`.
	fn set<'a>(&'a self, key: &'a str, value: String) -> StorageFuture<'a, ()>;

	/// Removes the value under `key`; removing a missing key is not an error.
	fn remove<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()>;

	/// Lists every key currently present.
	fn keys(&self) -> StorageFuture<'_, Vec<String>>;
}

/// Error type produced by [`KeyValueStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StorageError {
	/// Serialization failures surfaced by the backend or its callers.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl StorageError {
	/// Wraps a serde failure into a [`StorageError::Serialization`].
	pub fn serialization(e: impl Display) -> Self {
		Self::Serialization { message: e.to_string() }
	}
}

#[derive(Serialize, Deserialize)]
struct FlagRecord {
	value: bool,
	expires_at: OffsetDateTime,
}

/// Persists the local "is authenticated" hint with its one-day expiry.
pub async fn persist_authentication_flag(store: &dyn KeyValueStore) -> Result<(), StorageError> {
	let record =
		FlagRecord { value: true, expires_at: OffsetDateTime::now_utc() + AUTH_FLAG_TTL };
	let raw = serde_json::to_string(&record).map_err(StorageError::serialization)?;

	store.set(AUTH_FLAG_KEY, raw).await
}

/// Removes the local "is authenticated" hint.
pub async fn clear_authentication_flag(store: &dyn KeyValueStore) -> Result<(), StorageError> {
	store.remove(AUTH_FLAG_KEY).await
}

/// Reads the local "is authenticated" hint.
///
/// Expired or unparseable markers read as `false`. This is only ever a hint;
/// authoritative state comes from the session transport.
pub async fn peek_authentication_flag(store: &dyn KeyValueStore) -> Result<bool, StorageError> {
	let Some(raw) = store.get(AUTH_FLAG_KEY).await? else { return Ok(false) };
	let Ok(record) = serde_json::from_str::<FlagRecord>(&raw) else { return Ok(false) };

	Ok(record.value && record.expires_at > OffsetDateTime::now_utc())
}
