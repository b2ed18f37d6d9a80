//! How each credential variant mints a new access token.

// self
use crate::{
	_prelude::*,
	adc::{METADATA_FLAVOR, METADATA_FLAVOR_HEADER},
	auth::ScopeSet,
	credentials::{Credentials, ServiceAccountKey},
	http::{self, HttpRequest},
	provider::GrantType,
};

/// Refresh capability carried by a [`Credentials`].
#[derive(Clone)]
pub enum RefreshGrant {
	/// A bare access token; nothing can mint a new one.
	BearerOnly,
	/// Refresh-token grant on behalf of a user.
	RefreshToken {
		/// OAuth client identifier.
		client_id: String,
		/// OAuth client secret; absent for public clients.
		client_secret: Option<String>,
	},
	/// JWT-bearer assertion grant.
	Assertion {
		/// Optional `assertion_type` form field sent alongside the assertion.
		assertion_type: Option<String>,
		/// Producer of the signed assertion.
		source: AssertionSource,
	},
	/// Token served by the compute metadata server.
	MetadataServer,
}
impl RefreshGrant {
	/// Label naming the credential variant, also used as its persisted class.
	pub fn kind(&self) -> &'static str {
		match self {
			RefreshGrant::BearerOnly => "AccessTokenCredentials",
			RefreshGrant::RefreshToken { .. } => "OAuth2Credentials",
			RefreshGrant::Assertion { source: AssertionSource::ServiceAccount(_), .. } =>
				"ServiceAccountCredentials",
			RefreshGrant::Assertion { .. } => "AssertionCredentials",
			RefreshGrant::MetadataServer => "MetadataServerCredentials",
		}
	}

	/// Returns true when this grant can mint a new access token.
	pub fn is_refreshable(&self) -> bool {
		!matches!(self, RefreshGrant::BearerOnly)
	}
}
impl Debug for RefreshGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			RefreshGrant::BearerOnly => f.write_str("BearerOnly"),
			RefreshGrant::RefreshToken { client_id, client_secret } => f
				.debug_struct("RefreshToken")
				.field("client_id", client_id)
				.field("client_secret", &client_secret.as_ref().map(|_| "<redacted>"))
				.finish(),
			RefreshGrant::Assertion { assertion_type, source } => f
				.debug_struct("Assertion")
				.field("assertion_type", assertion_type)
				.field("source", source)
				.finish(),
			RefreshGrant::MetadataServer => f.write_str("MetadataServer"),
		}
	}
}

/// Where an assertion grant gets its signed assertion.
#[derive(Clone)]
pub enum AssertionSource {
	/// Signed locally with a service-account private key.
	ServiceAccount(ServiceAccountKey),
	/// Produced by a caller-supplied signer.
	Signer(Arc<dyn AssertionSigner>),
}
impl AssertionSource {
	fn generate(&self, ctx: &AssertionContext<'_>) -> Result<String> {
		match self {
			AssertionSource::ServiceAccount(key) => key.generate_assertion(ctx),
			AssertionSource::Signer(signer) => signer.generate_assertion(ctx),
		}
	}
}
impl Debug for AssertionSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			AssertionSource::ServiceAccount(key) =>
				f.debug_tuple("ServiceAccount").field(key).finish(),
			AssertionSource::Signer(_) => f.write_str("Signer(..)"),
		}
	}
}

/// Inputs available when producing an assertion.
#[derive(Clone, Copy, Debug)]
pub struct AssertionContext<'a> {
	/// Token endpoint the assertion is sent to; usually its audience.
	pub token_uri: &'a str,
	/// Requested scopes.
	pub scopes: &'a ScopeSet,
	/// Issue instant according to the credential's clock.
	pub now: OffsetDateTime,
}

/// Produces signed assertions for the JWT-bearer grant.
pub trait AssertionSigner
where
	Self: Send + Sync,
{
	/// Returns a freshly signed assertion.
	fn generate_assertion(&self, ctx: &AssertionContext<'_>) -> Result<String>;
}

impl Credentials {
	pub(crate) fn refresh_request(&self) -> Result<(GrantType, HttpRequest)> {
		let token_uri = self.endpoints().token_uri.as_str();

		match self.grant() {
			RefreshGrant::BearerOnly => Err(Error::UnrefreshableCredential),
			RefreshGrant::RefreshToken { client_id, client_secret } => {
				let refresh_token = self.refresh_token().ok_or(Error::UnrefreshableCredential)?;
				let mut form = BTreeMap::from([
					("grant_type".to_owned(), GrantType::RefreshToken.as_str().to_owned()),
					("client_id".to_owned(), client_id.to_owned()),
					("refresh_token".to_owned(), refresh_token.into_inner()),
				]);

				if let Some(secret) = client_secret {
					form.insert("client_secret".into(), secret.to_owned());
				}

				self.token_form_post(GrantType::RefreshToken, form)
			},
			RefreshGrant::Assertion { assertion_type, source } => {
				let scopes = self.scopes();
				let ctx = AssertionContext { token_uri, scopes: &scopes, now: self.now() };
				let mut form = BTreeMap::from([
					("grant_type".to_owned(), GrantType::JwtBearer.as_str().to_owned()),
					("assertion".to_owned(), source.generate(&ctx)?),
				]);

				if let Some(assertion_type) = assertion_type {
					form.insert("assertion_type".into(), assertion_type.to_owned());
				}

				self.token_form_post(GrantType::JwtBearer, form)
			},
			RefreshGrant::MetadataServer => {
				let scopes = self.scopes();
				let uri = if scopes.is_empty() {
					token_uri.to_owned()
				} else {
					let scopes = scopes.iter().collect::<Vec<_>>().join(",");

					http::update_query_params(token_uri, &[("scopes", scopes)])
				};

				let request = http::get(&uri, &[(METADATA_FLAVOR_HEADER, METADATA_FLAVOR)])?;

				Ok((GrantType::MetadataServer, request))
			},
		}
	}

	fn token_form_post(
		&self,
		grant: GrantType,
		mut form: BTreeMap<String, String>,
	) -> Result<(GrantType, HttpRequest)> {
		self.strategy.augment_token_request(grant, &mut form);

		let pairs = form.into_iter().collect::<Vec<_>>();

		Ok((grant, http::form_post(&self.endpoints().token_uri, &pairs, self.user_agent())?))
	}
}
