//! Thread-safe in-memory [`Storage`] for tests and short-lived processes.

// self
use crate::{
	_prelude::*,
	credentials::Credentials,
	store::{Storage, StorageGuard, StoreError, StoreFuture},
};

/// Keeps one serialized credential in process memory.
///
/// Clones share the slot and the lock, so they behave like two handles on the same file.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
	lock: Arc<AsyncMutex<()>>,
	slot: Arc<Mutex<Option<String>>>,
}
impl MemoryStorage {
	/// Returns the serialized credential currently held, if any.
	pub fn snapshot(&self) -> Option<String> {
		self.slot.lock().clone()
	}
}
impl Storage for MemoryStorage {
	fn location_lock(&self) -> Arc<AsyncMutex<()>> {
		self.lock.clone()
	}

	fn locked_get<'a>(&'a self, _guard: &'a StorageGuard) -> StoreFuture<'a, Option<Credentials>> {
		let snapshot = self.snapshot();

		Box::pin(async move {
			snapshot
				.map(|json| Credentials::from_json(&json).map_err(StoreError::serialization))
				.transpose()
		})
	}

	fn locked_put<'a>(
		&'a self,
		_guard: &'a StorageGuard,
		credentials: &'a Credentials,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let json = credentials.to_json().map_err(StoreError::serialization)?;

			*self.slot.lock() = Some(json);

			Ok(())
		})
	}

	fn locked_delete<'a>(&'a self, _guard: &'a StorageGuard) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.slot.lock().take();

			Ok(())
		})
	}
}
