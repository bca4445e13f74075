//! Cooperative renewal mutexes serializing silent token renewal.
//!
//! Without this lock, N concurrently-opened schedulers each missing the cache
//! at the same moment would each trigger a renewal: redundant network calls
//! and potentially double-spent single-use authorization codes. Two
//! implementations ship with the crate: [`LocalRenewalMutex`] for a single
//! process, and [`StoreRenewalMutex`], a lease over the shared durable store
//! that excludes holders across independent processes.

// std
use std::time::Duration as StdDuration;
// crates.io
use async_lock::MutexGuardArc;
use rand::{Rng, distr::Alphanumeric};
use tokio::time::{self, Instant};
// self
use crate::{
	_prelude::*,
	error::TimeoutStage,
	storage::{KeyValueStore, StorageError},
};

/// Lock key used by the engine to serialize silent token renewal.
pub const RENEWAL_LOCK_KEY: &str = "token-silent-renewal";
/// Default bound on how long a waiter blocks before giving up.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::seconds(5);

const HOLDER_TOKEN_LEN: usize = 16;
/// A crashed holder's lease expires after this long.
const LEASE_TTL: Duration = Duration::seconds(10);
/// Settle delay between writing a lease and confirming ownership.
const CONFIRM_DELAY: StdDuration = StdDuration::from_millis(30);
/// Backoff between polls while another holder owns the lease.
const RETRY_DELAY: StdDuration = StdDuration::from_millis(50);

/// Future type returned by [`RenewalMutex`] operations.
pub type LockFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Named, cooperative mutex contract used to serialize token renewal.
pub trait RenewalMutex
where
	Self: Send + Sync,
{
	/// Blocks the calling flow (cooperatively) until the lock for `key` is
	/// obtained or `timeout` elapses, failing with a timeout error.
	fn acquire<'a>(&'a self, key: &'a str, timeout: Duration) -> LockFuture<'a, ()>;

	/// Releases the lock for `key`. Always succeeds, even when this caller
	/// never held the lock, since failure-path cleanup can race.
	fn release<'a>(&'a self, key: &'a str) -> LockFuture<'a, ()>;
}

/// In-process renewal mutex for deployments with a single scheduler.
#[derive(Default)]
pub struct LocalRenewalMutex {
	locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
	held: Mutex<HashMap<String, MutexGuardArc<()>>>,
}
impl RenewalMutex for LocalRenewalMutex {
	fn acquire<'a>(&'a self, key: &'a str, timeout: Duration) -> LockFuture<'a, ()> {
		Box::pin(async move {
			let mutex = {
				let mut locks = self.locks.lock();

				locks.entry(key.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
			};

			match time::timeout(to_std(timeout), mutex.lock_arc()).await {
				Ok(guard) => {
					self.held.lock().insert(key.to_owned(), guard);

					Ok(())
				},
				Err(_) => Err(Error::Timeout(TimeoutStage::LockAcquire)),
			}
		})
	}

	fn release<'a>(&'a self, key: &'a str) -> LockFuture<'a, ()> {
		Box::pin(async move {
			// Dropping the guard wakes the next waiter; absent guards are fine.
			self.held.lock().remove(key);

			Ok(())
		})
	}
}
impl Debug for LocalRenewalMutex {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("LocalRenewalMutex(..)")
	}
}

#[derive(Serialize, Deserialize)]
struct Lease {
	holder: String,
	expires_at: OffsetDateTime,
}

/// Renewal mutex implemented as a lease over the shared durable store.
///
/// Acquisition writes a candidate lease, waits a settle delay, and confirms
/// it still owns the entry before claiming the lock; losing candidates see
/// the winner's holder token and back off. Leases carry a TTL so a crashed
/// holder cannot wedge every other scheduler.
pub struct StoreRenewalMutex {
	store: Arc<dyn KeyValueStore>,
	held: Mutex<HashMap<String, String>>,
}
impl StoreRenewalMutex {
	const KEY_PREFIX: &'static str = "oidc-silent.lock.";

	/// Wraps the provided key-value store.
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self { store, held: Mutex::new(HashMap::new()) }
	}

	fn storage_key(key: &str) -> String {
		format!("{}{key}", Self::KEY_PREFIX)
	}

	async fn current_holder(&self, storage_key: &str) -> Result<Option<String>, StorageError> {
		let Some(raw) = self.store.get(storage_key).await? else { return Ok(None) };
		let Ok(lease) = serde_json::from_str::<Lease>(&raw) else {
			// Unparseable leases are treated as vacant and get overwritten.
			return Ok(None);
		};

		if lease.expires_at <= OffsetDateTime::now_utc() {
			return Ok(None);
		}

		Ok(Some(lease.holder))
	}
}
impl RenewalMutex for StoreRenewalMutex {
	fn acquire<'a>(&'a self, key: &'a str, timeout: Duration) -> LockFuture<'a, ()> {
		Box::pin(async move {
			let storage_key = Self::storage_key(key);
			let token = random_holder_token();
			let deadline = Instant::now() + to_std(timeout);

			loop {
				if self.current_holder(&storage_key).await?.is_none() {
					let lease = Lease {
						holder: token.clone(),
						expires_at: OffsetDateTime::now_utc() + LEASE_TTL,
					};
					let raw =
						serde_json::to_string(&lease).map_err(StorageError::serialization)?;

					self.store.set(&storage_key, raw).await?;
					time::sleep(CONFIRM_DELAY).await;

					if self.current_holder(&storage_key).await?.as_deref() == Some(&token) {
						self.held.lock().insert(key.to_owned(), token);

						return Ok(());
					}
				} else {
					time::sleep(RETRY_DELAY).await;
				}

				if Instant::now() >= deadline {
					return Err(Error::Timeout(TimeoutStage::LockAcquire));
				}
			}
		})
	}

	fn release<'a>(&'a self, key: &'a str) -> LockFuture<'a, ()> {
		Box::pin(async move {
			let Some(token) = self.held.lock().remove(key) else { return Ok(()) };
			let storage_key = Self::storage_key(key);

			// Only the lease we wrote is removed; a successor's lease stays put.
			if self.current_holder(&storage_key).await?.as_deref() == Some(&token) {
				self.store.remove(&storage_key).await?;
			}

			Ok(())
		})
	}
}
impl Debug for StoreRenewalMutex {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("StoreRenewalMutex(..)")
	}
}

fn random_holder_token() -> String {
	rand::rng().sample_iter(Alphanumeric).take(HOLDER_TOKEN_LEN).map(char::from).collect()
}

pub(crate) fn to_std(duration: Duration) -> StdDuration {
	duration.try_into().unwrap_or(StdDuration::ZERO)
}
