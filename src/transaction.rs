//! In-flight authorization transactions keyed by the OAuth `state` value.
//!
//! A transaction is created when an authorize URL is built and consumed
//! exactly once when the redirect callback (or the silent authorization
//! payload) is handled, on both the success and the error path. It persists
//! through the durable store because a redirect flow spans a full page
//! navigation.

// self
use crate::{
	_prelude::*,
	storage::{KeyValueStore, StorageError},
};

/// One in-flight authorization request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
	/// Replay-binding nonce for the ID token of this request.
	pub nonce: String,
	/// Opaque caller payload returned after the redirect.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub app_state: Option<JsonValue>,
	/// Merged scope string of this request.
	pub scope: String,
	/// Resource audience of this request, `"default"` when unspecified.
	pub audience: String,
	/// Redirect URI the authorize URL was built with.
	pub redirect_uri: Url,
}

/// Durable store for [`Transaction`] records.
#[derive(Clone)]
pub struct TransactionStore {
	store: Arc<dyn KeyValueStore>,
}
impl TransactionStore {
	const KEY_PREFIX: &'static str = "oidc-silent.txn.";

	/// Wraps the provided key-value store.
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self { store }
	}

	/// Persists the transaction under `state`, overwriting silently on
	/// collision; callers are responsible for using fresh random state.
	pub async fn create(&self, state: &str, transaction: Transaction) -> Result<(), StorageError> {
		let raw = serde_json::to_string(&transaction).map_err(StorageError::serialization)?;

		self.store.set(&Self::storage_key(state), raw).await
	}

	/// Returns the transaction stored under `state` without deleting it.
	pub async fn get(&self, state: &str) -> Result<Option<Transaction>, StorageError> {
		let Some(raw) = self.store.get(&Self::storage_key(state)).await? else { return Ok(None) };
		let transaction = serde_json::from_str(&raw).map_err(StorageError::serialization)?;

		Ok(Some(transaction))
	}

	/// Deletes the transaction under `state`; idempotent.
	pub async fn remove(&self, state: &str) -> Result<(), StorageError> {
		self.store.remove(&Self::storage_key(state)).await
	}

	fn storage_key(state: &str) -> String {
		format!("{}{state}", Self::KEY_PREFIX)
	}
}
impl Debug for TransactionStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TransactionStore(..)")
	}
}
