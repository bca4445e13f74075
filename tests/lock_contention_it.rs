// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use time::Duration;
// self
use oidc_silent::{
	error::{Error, TimeoutStage},
	lock::{RENEWAL_LOCK_KEY, RenewalMutex, StoreRenewalMutex},
	storage::MemoryKeyValueStore,
};

fn shared_mutexes() -> (StoreRenewalMutex, StoreRenewalMutex) {
	// Two mutexes over one store model two schedulers sharing an origin.
	let store = Arc::new(MemoryKeyValueStore::default());

	(StoreRenewalMutex::new(store.clone()), StoreRenewalMutex::new(store))
}

#[tokio::test]
async fn store_lease_excludes_across_instances() {
	let (first, second) = shared_mutexes();

	first
		.acquire(RENEWAL_LOCK_KEY, Duration::seconds(2))
		.await
		.expect("First scheduler should acquire the lease.");

	let err = second
		.acquire(RENEWAL_LOCK_KEY, Duration::milliseconds(200))
		.await
		.expect_err("Second scheduler should time out while the lease is held.");

	assert!(matches!(err, Error::Timeout(TimeoutStage::LockAcquire)));

	first.release(RENEWAL_LOCK_KEY).await.expect("Release should succeed.");
	second
		.acquire(RENEWAL_LOCK_KEY, Duration::seconds(2))
		.await
		.expect("Second scheduler should acquire after the release.");
}

#[tokio::test]
async fn release_only_removes_the_callers_own_lease() {
	let (first, second) = shared_mutexes();

	first
		.acquire(RENEWAL_LOCK_KEY, Duration::seconds(2))
		.await
		.expect("First scheduler should acquire the lease.");

	// A scheduler that never held the lock must not disturb the holder.
	second.release(RENEWAL_LOCK_KEY).await.expect("Defensive release should succeed.");

	let err = second
		.acquire(RENEWAL_LOCK_KEY, Duration::milliseconds(200))
		.await
		.expect_err("The lease should still be held after the defensive release.");

	assert!(matches!(err, Error::Timeout(TimeoutStage::LockAcquire)));
}

#[tokio::test]
async fn contended_critical_sections_never_overlap() {
	let (first, second) = shared_mutexes();
	let in_section = Arc::new(AtomicUsize::new(0));
	let overlaps = Arc::new(AtomicUsize::new(0));

	async fn critical(
		mutex: &StoreRenewalMutex,
		in_section: &AtomicUsize,
		overlaps: &AtomicUsize,
	) {
		mutex
			.acquire(RENEWAL_LOCK_KEY, Duration::seconds(5))
			.await
			.expect("Acquisition should succeed under contention.");

		if in_section.fetch_add(1, Ordering::SeqCst) > 0 {
			overlaps.fetch_add(1, Ordering::SeqCst);
		}

		tokio::time::sleep(std::time::Duration::from_millis(20)).await;
		in_section.fetch_sub(1, Ordering::SeqCst);
		mutex.release(RENEWAL_LOCK_KEY).await.expect("Release should succeed.");
	}

	tokio::join!(
		critical(&first, &in_section, &overlaps),
		critical(&second, &in_section, &overlaps),
	);

	assert_eq!(overlaps.load(Ordering::SeqCst), 0, "Holders must never overlap.");
}
