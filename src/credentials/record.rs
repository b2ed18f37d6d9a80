//! Persisted JSON form of a credential.
//!
//! The record is flat: a `_class` discriminator plus whichever fields the variant uses. Unknown
//! fields are ignored, and an unparseable `token_expiry` loads as "no expiry known" rather than
//! failing the whole record.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	clock,
	credentials::{
		AssertionSigner, AssertionSource, Credentials, CredentialsBuilder, RefreshGrant,
		ServiceAccountKey,
	},
	error::ConfigError,
	provider::{METADATA_TOKEN_URI, ProviderEndpoints, RetryPolicy},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum CredentialsClass {
	#[serde(alias = "GoogleCredentials")]
	OAuth2Credentials,
	AccessTokenCredentials,
	#[serde(alias = "_ServiceAccountCredentials")]
	ServiceAccountCredentials,
	AssertionCredentials,
	#[serde(alias = "AppAssertionCredentials")]
	MetadataServerCredentials,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialsRecord {
	#[serde(rename = "_class")]
	class: Option<CredentialsClass>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	access_token: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	client_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	client_secret: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	refresh_token: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	token_expiry: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	auth_uri: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	token_uri: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	revoke_uri: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	token_info_uri: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	user_agent: Option<String>,
	#[serde(default)]
	invalid: bool,
	#[serde(default, skip_serializing_if = "ScopeSet::is_empty")]
	scopes: ScopeSet,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	id_token: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	token_response: Option<Map<String, Value>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	assertion_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	client_email: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	private_key_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	private_key: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	retry_policy: Option<RetryPolicy>,
}
impl CredentialsRecord {
	fn required(value: Option<String>, field: &'static str) -> Result<String> {
		value.ok_or_else(|| ConfigError::MissingCredentialField { field }.into())
	}

	fn into_builder(self, signer: Option<Arc<dyn AssertionSigner>>) -> Result<CredentialsBuilder> {
		let class = self.class.ok_or(ConfigError::MissingCredentialField { field: "_class" })?;
		let grant = match class {
			CredentialsClass::OAuth2Credentials => RefreshGrant::RefreshToken {
				client_id: Self::required(self.client_id, "client_id")?,
				client_secret: self.client_secret,
			},
			CredentialsClass::AccessTokenCredentials => RefreshGrant::BearerOnly,
			CredentialsClass::ServiceAccountCredentials => RefreshGrant::Assertion {
				assertion_type: self.assertion_type,
				source: AssertionSource::ServiceAccount(ServiceAccountKey {
					client_id: self.client_id.unwrap_or_default(),
					client_email: Self::required(self.client_email, "client_email")?,
					private_key_id: Self::required(self.private_key_id, "private_key_id")?,
					private_key: Self::required(self.private_key, "private_key")?,
					token_uri: None,
				}),
			},
			CredentialsClass::AssertionCredentials => RefreshGrant::Assertion {
				assertion_type: self.assertion_type,
				source: AssertionSource::Signer(signer.ok_or(ConfigError::MissingAssertionSigner)?),
			},
			CredentialsClass::MetadataServerCredentials => RefreshGrant::MetadataServer,
		};
		let defaults = if matches!(grant, RefreshGrant::MetadataServer) {
			ProviderEndpoints::google().with_token_uri(METADATA_TOKEN_URI)
		} else {
			ProviderEndpoints::google()
		};
		let endpoints = ProviderEndpoints {
			auth_uri: self.auth_uri.unwrap_or(defaults.auth_uri),
			token_uri: self.token_uri.unwrap_or(defaults.token_uri),
			revoke_uri: self.revoke_uri.unwrap_or(defaults.revoke_uri),
			token_info_uri: self.token_info_uri.unwrap_or(defaults.token_info_uri),
		};
		let mut builder = Credentials::builder(grant)
			.endpoints(endpoints)
			.invalid(self.invalid)
			.scopes(self.scopes);

		if let Some(token) = self.access_token {
			builder = builder.access_token(token);
		}
		if let Some(token) = self.refresh_token {
			builder = builder.refresh_token(token);
		}
		if let Some(expiry) =
			self.token_expiry.as_ref().and_then(Value::as_str).and_then(clock::parse_expiry)
		{
			builder = builder.token_expiry(expiry);
		}
		if let Some(user_agent) = self.user_agent {
			builder = builder.user_agent(user_agent);
		}
		if let Some(claims) = self.id_token {
			builder = builder.id_token(claims);
		}
		if let Some(response) = self.token_response {
			builder = builder.token_response(response);
		}
		if let Some(policy) = self.retry_policy {
			builder = builder.retry_policy(policy);
		}

		Ok(builder)
	}
}

impl Credentials {
	/// Serializes the credential to its persisted JSON form.
	///
	/// Every field except runtime handles (clock, strategy, storage) survives a round trip.
	pub fn to_json(&self) -> Result<String> {
		let state = self.state.read().clone();
		let endpoints = self.endpoints();
		let mut record = CredentialsRecord {
			access_token: state.access_token.map(TokenSecret::into_inner),
			refresh_token: state.refresh_token.map(TokenSecret::into_inner),
			token_expiry: state
				.token_expiry
				.map(clock::format_expiry)
				.transpose()
				.map_err(ConfigError::from)?
				.map(Value::String),
			auth_uri: Some(endpoints.auth_uri.clone()),
			token_uri: Some(endpoints.token_uri.clone()),
			revoke_uri: Some(endpoints.revoke_uri.clone()),
			token_info_uri: Some(endpoints.token_info_uri.clone()),
			user_agent: self.user_agent().map(ToOwned::to_owned),
			invalid: state.invalid,
			scopes: state.scopes,
			id_token: state.id_token,
			token_response: state.token_response,
			retry_policy: Some(self.retry_policy().clone()),
			..Default::default()
		};

		match self.grant() {
			RefreshGrant::BearerOnly =>
				record.class = Some(CredentialsClass::AccessTokenCredentials),
			RefreshGrant::RefreshToken { client_id, client_secret } => {
				record.class = Some(CredentialsClass::OAuth2Credentials);
				record.client_id = Some(client_id.to_owned());
				record.client_secret = client_secret.clone();
			},
			RefreshGrant::Assertion { assertion_type, source } => {
				record.assertion_type = assertion_type.clone();

				match source {
					AssertionSource::ServiceAccount(key) => {
						record.class = Some(CredentialsClass::ServiceAccountCredentials);
						record.client_id = Some(key.client_id.clone());
						record.client_email = Some(key.client_email.clone());
						record.private_key_id = Some(key.private_key_id.clone());
						record.private_key = Some(key.private_key.clone());
					},
					AssertionSource::Signer(_) =>
						record.class = Some(CredentialsClass::AssertionCredentials),
				}
			},
			RefreshGrant::MetadataServer =>
				record.class = Some(CredentialsClass::MetadataServerCredentials),
		}

		serde_json::to_string(&record)
			.map_err(|source| ConfigError::CredentialsSerialize { source }.into())
	}

	/// Restores a credential from its persisted JSON form.
	///
	/// Assertion credentials backed by a custom signer need
	/// [`from_json_with_signer`](Self::from_json_with_signer).
	pub fn from_json(json: &str) -> Result<Self> {
		Ok(decode_record(json)?.into_builder(None)?.build())
	}

	/// Restores a credential, supplying the signer that custom assertion credentials need.
	pub fn from_json_with_signer(json: &str, signer: Arc<dyn AssertionSigner>) -> Result<Self> {
		Ok(decode_record(json)?.into_builder(Some(signer))?.build())
	}

	/// Fields written to the well-known application default credentials file.
	///
	/// Only user refresh-token and service-account credentials have such a form.
	pub fn serialization_data(&self) -> Result<BTreeMap<&'static str, String>> {
		match self.grant() {
			RefreshGrant::RefreshToken { client_id, client_secret } => Ok(BTreeMap::from([
				("type", "authorized_user".to_owned()),
				("client_id", client_id.to_owned()),
				("client_secret", client_secret.clone().unwrap_or_default()),
				(
					"refresh_token",
					self.refresh_token().map(TokenSecret::into_inner).unwrap_or_default(),
				),
			])),
			RefreshGrant::Assertion { source: AssertionSource::ServiceAccount(key), .. } =>
				Ok(BTreeMap::from([
					("type", "service_account".to_owned()),
					("client_id", key.client_id.clone()),
					("client_email", key.client_email.clone()),
					("private_key_id", key.private_key_id.clone()),
					("private_key", key.private_key.clone()),
				])),
			grant => Err(ConfigError::Unsupported {
				kind: grant.kind(),
				operation: "application default serialization",
			}
			.into()),
		}
	}
}

fn decode_record(json: &str) -> Result<CredentialsRecord> {
	let de = &mut serde_json::Deserializer::from_str(json);

	serde_path_to_error::deserialize(de)
		.map_err(|source| ConfigError::CredentialsJson { source }.into())
}
