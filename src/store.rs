//! Lock-guarded persistence for one serialized credential.
//!
//! A [`Storage`] owns a single logical location (one file, one row, one slot). Every public
//! operation acquires that location's lock, performs one read-modify-write, and releases it, so
//! no two writers ever overlap. Backends implement the `locked_*` methods; those take a
//! [`StorageGuard`], which only [`Storage::acquire_lock`] hands out.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

// crates.io
use async_lock::MutexGuardArc;
// self
use crate::{_prelude::*, credentials::Credentials};

/// Boxed future returned by [`Storage`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Proof that the storage location lock is held.
///
/// Dropping the guard releases the lock.
pub struct StorageGuard(#[allow(dead_code)] MutexGuardArc<()>);
impl Debug for StorageGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("StorageGuard(..)")
	}
}

/// Persistence contract implemented by credential stores.
pub trait Storage
where
	Self: Send + Sync,
{
	/// Lock guarding this storage location.
	///
	/// Handles that point at the same location must return the same lock.
	fn location_lock(&self) -> Arc<AsyncMutex<()>>;

	/// Reads the stored credential while the lock is held.
	fn locked_get<'a>(&'a self, guard: &'a StorageGuard) -> StoreFuture<'a, Option<Credentials>>;

	/// Writes `credentials` while the lock is held.
	fn locked_put<'a>(
		&'a self,
		guard: &'a StorageGuard,
		credentials: &'a Credentials,
	) -> StoreFuture<'a, ()>;

	/// Removes the stored credential while the lock is held.
	fn locked_delete<'a>(&'a self, guard: &'a StorageGuard) -> StoreFuture<'a, ()>;

	/// Waits for exclusive access to the storage location.
	fn acquire_lock(&self) -> StoreFuture<'_, StorageGuard> {
		let lock = self.location_lock();

		Box::pin(async move { Ok(StorageGuard(lock.lock_arc().await)) })
	}

	/// Reads the stored credential under the lock.
	fn get(&self) -> StoreFuture<'_, Option<Credentials>> {
		Box::pin(async move {
			let guard = self.acquire_lock().await?;

			self.locked_get(&guard).await
		})
	}

	/// Writes `credentials` under the lock.
	fn put<'a>(&'a self, credentials: &'a Credentials) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let guard = self.acquire_lock().await?;

			self.locked_put(&guard, credentials).await
		})
	}

	/// Removes the stored credential under the lock.
	fn delete(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let guard = self.acquire_lock().await?;

			self.locked_delete(&guard).await
		})
	}
}

/// Reads the credential stored in `storage` and attaches the storage to it.
///
/// The returned credential writes back to `storage` after every refresh and revoke.
pub async fn load_attached(storage: &Arc<dyn Storage>) -> Result<Option<Arc<Credentials>>> {
	let Some(credentials) = storage.get().await? else {
		return Ok(None);
	};

	credentials.set_store(storage);

	Ok(Some(Arc::new(credentials)))
}

/// Error type produced by [`Storage`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Stored payload could not be encoded or decoded.
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
impl StoreError {
	pub(crate) fn serialization(e: impl Display) -> Self {
		Self::Serialization { message: e.to_string() }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn load_attached_wires_the_back_reference() {
		let backend = Arc::new(MemoryStorage::default());
		let storage: Arc<dyn Storage> = backend.clone();
		let credentials = Credentials::access_token_only("at-1", None).build();

		assert!(load_attached(&storage).await.expect("Empty load should succeed.").is_none());

		storage.put(&credentials).await.expect("Put should succeed.");

		let loaded = load_attached(&storage)
			.await
			.expect("Load should succeed.")
			.expect("Stored credential should be returned.");

		assert_eq!(loaded.access_token().as_ref().map(|t| t.expose()), Some("at-1"));
		assert!(loaded.store().is_some());
	}

	#[tokio::test]
	async fn lock_is_exclusive_per_location() {
		let storage = MemoryStorage::default();
		let guard = storage.acquire_lock().await.expect("First lock should be granted.");

		assert!(storage.location_lock().try_lock().is_none());

		drop(guard);

		assert!(storage.location_lock().try_lock().is_some());
	}
}
