//! Application default credentials: locate a credential without explicit configuration.
//!
//! Sources are tried in order and the first hit wins:
//!
//! 1. the file named by [`GOOGLE_APPLICATION_CREDENTIALS`], which must exist when the variable is
//!    set;
//! 2. the well-known gcloud file (see [`well_known_file_path`]);
//! 3. a hosted runtime, either a managed platform announced through `SERVER_SOFTWARE` or a
//!    reachable compute metadata server.
//!
//! Runtime detection is memoized in a caller-owned [`DiscoveryCache`].

pub mod environment;
pub mod file;
pub mod probe;

pub use environment::*;
pub use file::*;
pub use probe::*;

// std
use std::path::{Path, PathBuf};
// self
use crate::{
	_prelude::*,
	credentials::Credentials,
	obs::{self, FlowKind},
};

/// Message of [`DiscoveryError::NotFound`].
pub const ADC_HELP_MSG: &str = "The Application Default Credentials are not available. They are \
	available if running in Google Compute Engine. Otherwise, the environment variable \
	GOOGLE_APPLICATION_CREDENTIALS must be defined pointing to a file defining the credentials. \
	See https://developers.google.com/accounts/docs/application-default-credentials for more \
	information.";
/// Announces a managed platform runtime.
pub const SERVER_SOFTWARE: &str = "SERVER_SOFTWARE";

const MANAGED_PRODUCTION_PREFIX: &str = "Google App Engine/";
const MANAGED_LOCAL_PREFIX: &str = "Development/";

/// No usable credential source.
#[derive(Debug, ThisError)]
pub enum DiscoveryError {
	/// Every source was tried and none produced credentials.
	#[error("{}", ADC_HELP_MSG)]
	NotFound,
	/// [`GOOGLE_APPLICATION_CREDENTIALS`] names a file that does not exist.
	#[error(
		"File {path} (pointed by GOOGLE_APPLICATION_CREDENTIALS environment variable) does not exist!"
	)]
	EnvironmentFileMissing {
		/// Value of the variable.
		path: String,
	},
}

/// Hosted runtime the process appears to run in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeEnvironment {
	/// Managed platform in production.
	ManagedProduction,
	/// Managed platform development server.
	ManagedLocal,
	/// Virtual machine with a metadata server.
	ComputeEngine,
	/// Nothing recognized.
	Unknown,
}
impl RuntimeEnvironment {
	/// Returns true when the runtime serves tokens from a metadata server.
	pub fn has_metadata_server(self) -> bool {
		!matches!(self, Self::Unknown)
	}
}

/// Memo of the detected [`RuntimeEnvironment`].
///
/// Share one cache between discoveries to probe at most once per process; call
/// [`reset`](Self::reset) to detect again.
#[derive(Debug, Default)]
pub struct DiscoveryCache(Mutex<Option<RuntimeEnvironment>>);
impl DiscoveryCache {
	/// Memoized runtime, if detection already ran.
	pub fn get(&self) -> Option<RuntimeEnvironment> {
		*self.0.lock()
	}

	/// Forgets the memoized runtime.
	pub fn reset(&self) {
		self.0.lock().take();
	}

	fn set(&self, runtime: RuntimeEnvironment) {
		*self.0.lock() = Some(runtime);
	}
}

/// Application default credentials resolver.
pub struct Discovery {
	environment: Arc<dyn Environment>,
	probe: Arc<dyn MetadataProbe>,
	cache: Arc<DiscoveryCache>,
}
impl Discovery {
	/// Resolver over `environment`, detecting metadata servers with `probe`.
	pub fn new(environment: Arc<dyn Environment>, probe: Arc<dyn MetadataProbe>) -> Self {
		Self { environment, probe, cache: Default::default() }
	}

	/// Resolver over the process environment with a one-second reqwest probe.
	#[cfg(feature = "reqwest")]
	pub fn from_os() -> Result<Self> {
		Ok(Self::new(Arc::new(OsEnvironment), Arc::new(HttpMetadataProbe::reqwest()?)))
	}

	/// Replaces the runtime memo, typically with one shared across resolvers.
	pub fn with_cache(mut self, cache: Arc<DiscoveryCache>) -> Self {
		self.cache = cache;

		self
	}

	/// Runtime memo in use.
	pub fn cache(&self) -> &Arc<DiscoveryCache> {
		&self.cache
	}

	/// Environment in use.
	pub fn environment(&self) -> &dyn Environment {
		self.environment.as_ref()
	}

	/// Finds application default credentials.
	pub async fn resolve(&self) -> Result<Credentials> {
		obs::observe(FlowKind::Discovery, "resolve", self.search()).await
	}

	async fn search(&self) -> Result<Credentials> {
		if let Some(path) = self.environment_file()? {
			return Ok(load_credential_file(&path, CredentialSource::EnvironmentVariable)?);
		}

		let well_known = well_known_file_path(self.environment.as_ref()).ok();

		if let Some(path) = well_known.filter(|path| path.is_file()) {
			return Ok(load_credential_file(&path, CredentialSource::WellKnownFile)?);
		}
		if self.runtime_environment().await.has_metadata_server() {
			return Ok(Credentials::metadata_server().build());
		}

		Err(DiscoveryError::NotFound.into())
	}

	/// File named by [`GOOGLE_APPLICATION_CREDENTIALS`]; it must be a regular file.
	pub fn environment_file(&self) -> Result<Option<PathBuf>> {
		let Some(path) = self.environment.var(GOOGLE_APPLICATION_CREDENTIALS) else {
			return Ok(None);
		};

		if !Path::new(&path).is_file() {
			return Err(DiscoveryError::EnvironmentFileMissing { path }.into());
		}

		Ok(Some(PathBuf::from(path)))
	}

	/// Detects the hosted runtime, consulting and filling the cache.
	///
	/// A managed platform marker short-circuits the metadata probe.
	pub async fn runtime_environment(&self) -> RuntimeEnvironment {
		if let Some(runtime) = self.cache.get() {
			return runtime;
		}

		let software = self.environment.var(SERVER_SOFTWARE).unwrap_or_default();
		let runtime = if software.starts_with(MANAGED_PRODUCTION_PREFIX) {
			RuntimeEnvironment::ManagedProduction
		} else if software.starts_with(MANAGED_LOCAL_PREFIX) {
			RuntimeEnvironment::ManagedLocal
		} else if self.probe.is_present().await {
			RuntimeEnvironment::ComputeEngine
		} else {
			RuntimeEnvironment::Unknown
		};

		self.cache.set(runtime);

		runtime
	}
}
impl Debug for Discovery {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Discovery").field("cache", &self.cache).finish()
	}
}

/// Loads credentials from a credential file given explicitly.
pub fn from_stream(path: impl AsRef<Path>) -> Result<Credentials> {
	Ok(load_credential_file(path.as_ref(), CredentialSource::Stream)?)
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		fs,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::credentials::RefreshGrant;

	#[derive(Default)]
	struct CountingProbe {
		present: bool,
		calls: AtomicUsize,
	}
	impl CountingProbe {
		fn present() -> Self {
			Self { present: true, ..Default::default() }
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl MetadataProbe for CountingProbe {
		fn is_present(&self) -> ProbeFuture<'_> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let present = self.present;

			Box::pin(async move { present })
		}
	}

	fn temp_dir(label: &str) -> PathBuf {
		let dir = std::env::temp_dir().join(format!(
			"oauth2-credentials-discovery-{label}-{}-{}",
			std::process::id(),
			rand::random::<u32>()
		));

		fs::create_dir_all(&dir).expect("Temp dir should be created.");

		dir
	}

	fn user_file(dir: &Path, name: &str) -> PathBuf {
		let path = dir.join(name);
		let body = json!({
			"type": "authorized_user",
			"client_id": "123",
			"client_secret": "secret",
			"refresh_token": "alabalaportocala",
		});

		fs::write(&path, body.to_string()).expect("Fixture should be written.");

		path
	}

	fn discovery(env: StaticEnvironment, probe: &Arc<CountingProbe>) -> Discovery {
		Discovery::new(Arc::new(env), probe.clone())
	}

	#[tokio::test]
	async fn environment_file_wins_without_probing() {
		let dir = temp_dir("env");
		let path = user_file(&dir, "env.json");
		let probe = Arc::new(CountingProbe::present());
		let env = StaticEnvironment::default()
			.with_var(GOOGLE_APPLICATION_CREDENTIALS, path.display().to_string())
			.with_var(CLOUDSDK_CONFIG, dir.display().to_string());
		let credentials =
			discovery(env, &probe).resolve().await.expect("Discovery should succeed.");

		assert!(matches!(credentials.grant(), RefreshGrant::RefreshToken { .. }));
		assert_eq!(probe.calls(), 0);
	}

	#[tokio::test]
	async fn directory_in_environment_variable_counts_as_missing() {
		let dir = temp_dir("directory");
		let probe = Arc::new(CountingProbe::present());
		let env = StaticEnvironment::default()
			.with_var(GOOGLE_APPLICATION_CREDENTIALS, dir.display().to_string())
			.with_var(CLOUDSDK_CONFIG, dir.display().to_string());
		let err = discovery(env, &probe).resolve().await.expect_err("Discovery should fail.");

		assert!(matches!(
			err,
			Error::Discovery(DiscoveryError::EnvironmentFileMissing { ref path })
				if *path == dir.display().to_string()
		));
		assert_eq!(probe.calls(), 0);
	}

	#[tokio::test]
	async fn missing_environment_file_fails_fast() {
		let dir = temp_dir("missing");
		let missing = dir.join("nonexistent");

		user_file(&dir, WELL_KNOWN_CREDENTIALS_FILE);

		let probe = Arc::new(CountingProbe::present());
		let env = StaticEnvironment::default()
			.with_var(GOOGLE_APPLICATION_CREDENTIALS, missing.display().to_string())
			.with_var(CLOUDSDK_CONFIG, dir.display().to_string());
		let err = discovery(env, &probe).resolve().await.expect_err("Discovery should fail.");

		assert_eq!(
			err.to_string(),
			format!(
				"File {} (pointed by GOOGLE_APPLICATION_CREDENTIALS environment variable) does \
				 not exist!",
				missing.display()
			)
		);
		assert_eq!(probe.calls(), 0);
	}

	#[tokio::test]
	async fn well_known_file_is_second() {
		let dir = temp_dir("well-known");

		user_file(&dir, WELL_KNOWN_CREDENTIALS_FILE);

		let probe = Arc::new(CountingProbe::present());
		let env = StaticEnvironment::default().with_var(CLOUDSDK_CONFIG, dir.display().to_string());
		let credentials =
			discovery(env, &probe).resolve().await.expect("Discovery should succeed.");

		assert_eq!(credentials.user_agent(), Some(ADC_USER_AGENT));
		assert_eq!(probe.calls(), 0);
	}

	#[tokio::test]
	async fn malformed_environment_file_names_its_source() {
		let dir = temp_dir("malformed");
		let path = dir.join("bad.json");

		fs::write(&path, "not json").expect("Fixture should be written.");

		let probe = Arc::new(CountingProbe::present());
		let env = StaticEnvironment::default()
			.with_var(GOOGLE_APPLICATION_CREDENTIALS, path.display().to_string());
		let err = discovery(env, &probe).resolve().await.expect_err("Discovery should fail.");

		assert!(err.to_string().starts_with(&format!(
			"An error was encountered while reading json file: {} (pointed to by \
			 GOOGLE_APPLICATION_CREDENTIALS environment variable):",
			path.display()
		)));
		assert_eq!(probe.calls(), 0);
	}

	#[tokio::test]
	async fn metadata_server_is_last() {
		let dir = temp_dir("metadata");
		let probe = Arc::new(CountingProbe::present());
		let env = StaticEnvironment::default().with_var(CLOUDSDK_CONFIG, dir.display().to_string());
		let credentials =
			discovery(env, &probe).resolve().await.expect("Discovery should succeed.");

		assert!(matches!(credentials.grant(), RefreshGrant::MetadataServer));
		assert_eq!(credentials.endpoints().token_uri, crate::provider::METADATA_TOKEN_URI);
		assert_eq!(probe.calls(), 1);
	}

	#[tokio::test]
	async fn nothing_found_uses_the_help_message() {
		let dir = temp_dir("nothing");
		let probe = Arc::new(CountingProbe::default());
		let env = StaticEnvironment::default().with_var(CLOUDSDK_CONFIG, dir.display().to_string());
		let err = discovery(env, &probe).resolve().await.expect_err("Discovery should fail.");

		assert_eq!(err.to_string(), ADC_HELP_MSG);
		assert!(matches!(err, Error::Discovery(DiscoveryError::NotFound)));
		assert_eq!(probe.calls(), 1);
	}

	#[tokio::test]
	async fn managed_platform_skips_the_probe() {
		for (software, expected) in [
			("Google App Engine/1.9", RuntimeEnvironment::ManagedProduction),
			("Development/2.0", RuntimeEnvironment::ManagedLocal),
		] {
			let probe = Arc::new(CountingProbe::default());
			let env = StaticEnvironment::default().with_var(SERVER_SOFTWARE, software);

			assert_eq!(discovery(env, &probe).runtime_environment().await, expected);
			assert_eq!(probe.calls(), 0);
		}
	}

	#[tokio::test]
	async fn runtime_is_memoized_until_reset() {
		let cache = Arc::new(DiscoveryCache::default());
		let probe = Arc::new(CountingProbe::default());
		let managed = StaticEnvironment::default().with_var(SERVER_SOFTWARE, "Development/XYZ");

		assert_eq!(
			discovery(managed, &probe).with_cache(cache.clone()).runtime_environment().await,
			RuntimeEnvironment::ManagedLocal
		);

		let plain = discovery(StaticEnvironment::default(), &probe).with_cache(cache.clone());

		assert_eq!(plain.runtime_environment().await, RuntimeEnvironment::ManagedLocal);
		assert_eq!(probe.calls(), 0);

		cache.reset();

		assert_eq!(plain.runtime_environment().await, RuntimeEnvironment::Unknown);
		assert_eq!(cache.get(), Some(RuntimeEnvironment::Unknown));
		assert_eq!(probe.calls(), 1);
	}

	#[test]
	fn from_stream_names_itself_in_errors() {
		let dir = temp_dir("stream");
		let path = dir.join("typeless.json");

		fs::write(&path, "{}").expect("Fixture should be written.");

		let err = from_stream(&path).expect_err("Typeless file should fail.");

		assert!(err.to_string().contains(" (provided as parameter to the from_stream() method): "));
		assert!(from_stream(user_file(&dir, "user.json")).is_ok());
	}
}
