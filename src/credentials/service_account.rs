//! Service-account keys and the RS256 assertions they sign.

// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header};
// self
use crate::{
	_prelude::*,
	credentials::{AssertionContext, AssertionSigner},
};

/// Lifetime of a signed assertion, in seconds.
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Private key material of a service account, as found in its JSON key file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccountKey {
	/// OAuth client identifier of the account.
	pub client_id: String,
	/// Account email; the assertion issuer.
	pub client_email: String,
	/// Identifier of the signing key, sent as the JWT `kid`.
	pub private_key_id: String,
	/// PKCS#8 PEM private key.
	pub private_key: String,
	/// Token endpoint named by the key file, when present.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_uri: Option<String>,
}
impl Debug for ServiceAccountKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceAccountKey")
			.field("client_id", &self.client_id)
			.field("client_email", &self.client_email)
			.field("private_key_id", &self.private_key_id)
			.field("private_key", &"<redacted>")
			.finish()
	}
}
impl AssertionSigner for ServiceAccountKey {
	fn generate_assertion(&self, ctx: &AssertionContext<'_>) -> Result<String> {
		let issued_at = ctx.now.unix_timestamp();
		let claims = AssertionClaims {
			iss: &self.client_email,
			scope: ctx.scopes.normalized(),
			aud: ctx.token_uri,
			iat: issued_at,
			exp: issued_at + ASSERTION_LIFETIME_SECS,
		};
		let mut header = Header::new(Algorithm::RS256);

		header.kid = Some(self.private_key_id.clone());

		let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
			.map_err(Error::assertion_signing)?;

		jsonwebtoken::encode(&header, &claims, &key).map_err(Error::assertion_signing)
	}
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
	iss: &'a str,
	#[serde(skip_serializing_if = "String::is_empty")]
	scope: String,
	aud: &'a str,
	iat: i64,
	exp: i64,
}
