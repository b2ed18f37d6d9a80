//! Application default credential files: parsing, validation, and the well-known location.

// std
use std::{
	fs,
	path::{Path, PathBuf},
};
// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	adc::Environment,
	credentials::{Credentials, ServiceAccountKey},
	error::ConfigError,
	store::file::write_private_file,
};

/// `type` of a user credential file produced by `gcloud auth login`.
pub const AUTHORIZED_USER: &str = "authorized_user";
/// `type` of a service-account key file.
pub const SERVICE_ACCOUNT: &str = "service_account";
/// Points at a credential file that takes precedence over every other source.
pub const GOOGLE_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
/// Overrides the gcloud configuration directory.
pub const CLOUDSDK_CONFIG: &str = "CLOUDSDK_CONFIG";
/// Name of the gcloud configuration directory.
pub const CLOUDSDK_CONFIG_DIRECTORY: &str = "gcloud";
/// File name of the well-known credential file.
pub const WELL_KNOWN_CREDENTIALS_FILE: &str = "application_default_credentials.json";
/// User agent given to user credentials loaded from a file.
pub const ADC_USER_AGENT: &str = "Rust client library";

const AUTHORIZED_USER_FIELDS: [&str; 3] = ["client_id", "client_secret", "refresh_token"];
const SERVICE_ACCOUNT_FIELDS: [&str; 4] =
	["client_id", "client_email", "private_key_id", "private_key"];

/// Where a credential file was found; named in error messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialSource {
	/// Named by [`GOOGLE_APPLICATION_CREDENTIALS`].
	EnvironmentVariable,
	/// The well-known gcloud location.
	WellKnownFile,
	/// Passed explicitly to [`from_stream`](crate::adc::from_stream).
	Stream,
}
impl CredentialSource {
	fn context(self) -> &'static str {
		match self {
			Self::EnvironmentVariable =>
				" (pointed to by GOOGLE_APPLICATION_CREDENTIALS environment variable)",
			Self::WellKnownFile =>
				" (produced automatically when running \"gcloud auth login\" command)",
			Self::Stream => " (provided as parameter to the from_stream() method)",
		}
	}
}

/// A credential file that could not be turned into credentials.
#[derive(Debug, ThisError)]
#[error("An error was encountered while reading json file: {path}{context}: {source}")]
pub struct CredentialFileError {
	/// File that failed.
	pub path: String,
	context: &'static str,
	/// What went wrong.
	#[source]
	pub source: CredentialFileProblem,
}
impl CredentialFileError {
	fn new(path: &Path, source: CredentialSource, problem: CredentialFileProblem) -> Self {
		Self { path: path.display().to_string(), context: source.context(), source: problem }
	}
}

/// Reason a credential file was rejected.
#[derive(Debug, ThisError)]
pub enum CredentialFileProblem {
	/// The file could not be read.
	#[error(transparent)]
	Io(#[from] std::io::Error),
	/// The file is not a JSON object.
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	/// `type` is absent or names an unsupported credential kind.
	#[error(
		"'type' field should be defined (and have one of the 'authorized_user' or 'service_account' values)"
	)]
	UnknownType,
	/// Required fields are absent, listed in validation order.
	#[error("The following field(s) must be defined: {}", .0.join(", "))]
	MissingFields(Vec<&'static str>),
}

/// Location of the well-known credential file for `environment`.
///
/// [`CLOUDSDK_CONFIG`] wins when set. Otherwise Windows uses `%APPDATA%\gcloud` (falling back to
/// `%SystemDrive%\gcloud`) and every other platform `$HOME/.config/gcloud`.
pub fn well_known_file_path(environment: &dyn Environment) -> Result<PathBuf> {
	if let Some(dir) = environment.var(CLOUDSDK_CONFIG) {
		return Ok(Path::new(&dir).join(WELL_KNOWN_CREDENTIALS_FILE));
	}

	if environment.is_windows() {
		let root = environment.var("APPDATA").unwrap_or_else(|| {
			format!("{}\\", environment.var("SystemDrive").unwrap_or_else(|| "C:".into()))
		});
		let root = root.trim_end_matches('\\');

		return Ok(PathBuf::from(format!(
			"{root}\\{CLOUDSDK_CONFIG_DIRECTORY}\\{WELL_KNOWN_CREDENTIALS_FILE}"
		)));
	}

	let home = environment.var("HOME").ok_or(ConfigError::WellKnownFileUnresolved)?;

	Ok(Path::new(&home)
		.join(".config")
		.join(CLOUDSDK_CONFIG_DIRECTORY)
		.join(WELL_KNOWN_CREDENTIALS_FILE))
}

/// Reads and validates the credential file at `path`.
pub(crate) fn load_credential_file(
	path: &Path,
	source: CredentialSource,
) -> Result<Credentials, CredentialFileError> {
	fs::read(path)
		.map_err(CredentialFileProblem::from)
		.and_then(|bytes| parse_credential_file(&bytes))
		.map_err(|problem| CredentialFileError::new(path, source, problem))
}

fn parse_credential_file(bytes: &[u8]) -> Result<Credentials, CredentialFileProblem> {
	let object = serde_json::from_slice::<Map<String, Value>>(bytes)?;
	let field = |name: &str| object.get(name).and_then(Value::as_str).map(ToOwned::to_owned);
	let require = |names: &[&'static str]| {
		let missing =
			names.iter().filter(|name| field(**name).is_none()).copied().collect::<Vec<_>>();

		if missing.is_empty() {
			Ok(())
		} else {
			Err(CredentialFileProblem::MissingFields(missing))
		}
	};

	match object.get("type").and_then(Value::as_str) {
		Some(AUTHORIZED_USER) => {
			require(&AUTHORIZED_USER_FIELDS)?;

			let client_id = field("client_id").unwrap_or_default();
			let client_secret = field("client_secret").unwrap_or_default();
			let refresh_token = field("refresh_token").unwrap_or_default();

			Ok(Credentials::refresh_token_grant(client_id, Some(&client_secret))
				.refresh_token(refresh_token)
				.user_agent(ADC_USER_AGENT)
				.build())
		},
		Some(SERVICE_ACCOUNT) => {
			require(&SERVICE_ACCOUNT_FIELDS)?;

			let key = ServiceAccountKey {
				client_id: field("client_id").unwrap_or_default(),
				client_email: field("client_email").unwrap_or_default(),
				private_key_id: field("private_key_id").unwrap_or_default(),
				private_key: field("private_key").unwrap_or_default(),
				token_uri: field("token_uri"),
			};

			Ok(Credentials::service_account(key).build())
		},
		_ => Err(CredentialFileProblem::UnknownType),
	}
}

/// Writes `credentials` in credential-file form to `path`, or to the well-known location.
///
/// Only user refresh-token and service-account credentials can be saved. The default location's
/// directory must already exist; it is never created. The file is readable by its owner only.
pub fn save_to_well_known_file(
	credentials: &Credentials,
	path: Option<&Path>,
	environment: &dyn Environment,
) -> Result<()> {
	let data = credentials.serialization_data()?;
	let path = match path {
		Some(path) => path.to_path_buf(),
		None => {
			let path = well_known_file_path(environment)?;
			let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

			if !dir.is_dir() {
				return Err(
					ConfigError::MissingConfigDirectory { dir: dir.display().to_string() }.into()
				);
			}

			path
		},
	};
	let json = serde_json::to_string_pretty(&data)
		.map_err(|source| ConfigError::CredentialsSerialize { source })?;

	write_private_file(&path, json.as_bytes()).map_err(|source| {
		ConfigError::CredentialsWrite { path: path.display().to_string(), source }
	})?;

	Ok(())
}
