//! File-backed [`Storage`] holding one credential per JSON file.

// std
use std::{
	collections::HashMap,
	fs::{self, OpenOptions},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
	sync::LazyLock,
};
// self
use crate::{
	_prelude::*,
	credentials::Credentials,
	store::{Storage, StorageGuard, StoreError, StoreFuture},
};

static LOCATION_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>> =
	LazyLock::new(Default::default);

/// Persists a single credential to a JSON file readable only by its owner.
///
/// Every handle opened on the same path within a process shares one lock, and writes go through
/// a temporary file that is renamed into place.
#[derive(Clone, Debug)]
pub struct FileStorage {
	path: PathBuf,
	lock: Arc<AsyncMutex<()>>,
}
impl FileStorage {
	/// Creates a storage handle for `path`. The file is not touched until first use.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let lock = location_lock(&path);

		Self { path, lock }
	}

	/// Path of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read(&self) -> Result<Option<Credentials>, StoreError> {
		let bytes = match fs::read(&self.path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) =>
				return Err(StoreError::Backend {
					message: format!("Failed to read {}: {e}", self.path.display()),
				}),
		};

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(None);
		}

		let json = String::from_utf8(bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to decode {}: {e}", self.path.display()),
		})?;

		Credentials::from_json(&json).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", self.path.display()),
		})
	}
}
impl Storage for FileStorage {
	fn location_lock(&self) -> Arc<AsyncMutex<()>> {
		self.lock.clone()
	}

	fn locked_get<'a>(&'a self, _guard: &'a StorageGuard) -> StoreFuture<'a, Option<Credentials>> {
		Box::pin(async move { self.read() })
	}

	fn locked_put<'a>(
		&'a self,
		_guard: &'a StorageGuard,
		credentials: &'a Credentials,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let json = credentials.to_json().map_err(StoreError::serialization)?;

			write_private_file(&self.path, json.as_bytes()).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", self.path.display()),
			})
		})
	}

	fn locked_delete<'a>(&'a self, _guard: &'a StorageGuard) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			match fs::remove_file(&self.path) {
				Ok(()) => Ok(()),
				Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
				Err(e) => Err(StoreError::Backend {
					message: format!("Failed to remove {}: {e}", self.path.display()),
				}),
			}
		})
	}
}

/// Atomically replaces `path` with `contents`, leaving it readable and writable by the owner only.
///
/// Overwriting an existing file with looser permissions tightens them.
pub(crate) fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
	let mut tmp_path = path.to_path_buf().into_os_string();

	tmp_path.push(".tmp");

	let tmp_path = PathBuf::from(tmp_path);

	{
		let mut options = OpenOptions::new();

		options.write(true).create(true).truncate(true);

		#[cfg(unix)]
		{
			use std::os::unix::fs::OpenOptionsExt;

			options.mode(0o600);
		}

		let mut file = options.open(&tmp_path)?;

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;

			file.set_permissions(fs::Permissions::from_mode(0o600))?;
		}

		file.write_all(contents)?;
		file.sync_all()?;
	}

	fs::rename(&tmp_path, path)
}

fn location_lock(path: &Path) -> Arc<AsyncMutex<()>> {
	let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
	let mut locks = LOCATION_LOCKS.lock();

	locks.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	fn temp_path(label: &str) -> PathBuf {
		let unique = format!(
			"oauth2_credentials_file_storage_{label}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[tokio::test]
	async fn save_and_reload_round_trip() {
		let path = temp_path("round_trip");
		let storage = FileStorage::new(&path);
		let credentials = Credentials::refresh_token_grant("client", Some("secret"))
			.refresh_token("refresh-1")
			.access_token("access-1")
			.build();

		assert!(storage.get().await.expect("Missing file should read as empty.").is_none());

		storage.put(&credentials).await.expect("Failed to save credentials to file storage.");

		let reopened = FileStorage::new(&path);
		let fetched = reopened
			.get()
			.await
			.expect("Failed to read credentials from file storage.")
			.expect("File storage lost the credential after reopen.");

		assert_eq!(fetched.access_token().as_ref().map(|t| t.expose()), Some("access-1"));

		reopened.delete().await.expect("Failed to delete the stored credential.");

		assert!(!path.exists());

		reopened.delete().await.expect("Deleting a missing file should succeed.");
	}

	#[test]
	fn handles_on_one_path_share_a_lock() {
		let path = temp_path("shared_lock");
		let a = FileStorage::new(&path);
		let b = FileStorage::new(&path);
		let c = FileStorage::new(temp_path("other_lock"));

		assert!(Arc::ptr_eq(&a.location_lock(), &b.location_lock()));
		assert!(!Arc::ptr_eq(&a.location_lock(), &c.location_lock()));
	}

	#[tokio::test]
	async fn empty_file_reads_as_absent() {
		let path = temp_path("empty");

		fs::write(&path, b"").expect("Failed to create empty fixture file.");

		assert!(FileStorage::new(&path).get().await.expect("Empty file should load.").is_none());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file {}: {e}", path.display())
		});
	}

	#[cfg(unix)]
	#[test]
	fn private_files_are_owner_only_even_when_overwritten() {
		use std::os::unix::fs::PermissionsExt;

		let path = temp_path("private");

		fs::write(&path, b"{}").expect("Failed to create fixture file.");
		fs::set_permissions(&path, fs::Permissions::from_mode(0o644))
			.expect("Failed to loosen fixture permissions.");

		write_private_file(&path, b"{\"a\":1}").expect("Private write should succeed.");

		let mode = fs::metadata(&path).expect("Metadata should be readable.").permissions().mode();

		assert_eq!(mode & 0o777, 0o600);
		assert_eq!(fs::read(&path).expect("File should be readable."), b"{\"a\":1}");

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file {}: {e}", path.display())
		});
	}
}
