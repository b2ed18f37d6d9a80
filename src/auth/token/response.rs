//! Token endpoint payload normalization.
//!
//! Providers answer token requests with JSON, but a few still reply with
//! `application/x-www-form-urlencoded` bodies and name the lifetime field `expires` instead of
//! `expires_in`. [`TokenResponse::parse`] accepts both shapes.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, auth::TokenSecret, auth::decode_id_token};

/// Canonical token endpoint response.
#[derive(Clone, Debug)]
pub struct TokenResponse {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Declared lifetime in seconds.
	pub expires_in: Option<i64>,
	/// Decoded ID token claims.
	pub id_token: Option<Value>,
	/// Raw response body as a JSON object.
	pub raw: Map<String, Value>,
}
impl TokenResponse {
	/// Parses a token endpoint body, trying JSON first and form encoding second.
	pub fn parse(body: &[u8]) -> Result<Self> {
		Self::from_map(parse_body(body))
	}

	/// Builds a response from an already parsed body.
	pub fn from_map(raw: Map<String, Value>) -> Result<Self> {
		let access_token = raw
			.get("access_token")
			.and_then(Value::as_str)
			.map(TokenSecret::new)
			.ok_or_else(|| Error::InvalidTokenResponse {
				message: "Token endpoint response is missing access_token.".into(),
			})?;
		let refresh_token = raw.get("refresh_token").and_then(Value::as_str).map(TokenSecret::new);
		let expires_in = raw.get("expires_in").or_else(|| raw.get("expires")).and_then(lifetime);
		let id_token = match raw.get("id_token").and_then(Value::as_str) {
			Some(token) => Some(decode_id_token(token)?),
			None => None,
		};

		Ok(Self { access_token, refresh_token, expires_in, id_token, raw })
	}
}

/// OAuth error fields extracted from a failed response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OAuthErrorBody {
	/// The `error` field, flattened to text when the provider nests an object.
	pub error: Option<String>,
	/// The `error_description` field.
	pub error_description: Option<String>,
}
impl OAuthErrorBody {
	/// Extracts the error fields from a JSON or form-encoded body.
	pub fn parse(body: &[u8]) -> Self {
		let map = parse_body(body);
		let error = map.get("error").map(|value| match value {
			Value::String(text) => text.to_owned(),
			Value::Object(nested) => match nested.get("message").and_then(Value::as_str) {
				Some(message) => message.to_owned(),
				None => value.to_string(),
			},
			other => other.to_string(),
		});
		let error_description =
			map.get("error_description").and_then(Value::as_str).map(ToOwned::to_owned);

		Self { error, error_description }
	}

	/// Returns `error: error_description`, or just the error when no description is present.
	pub fn message(&self) -> Option<String> {
		let error = self.error.as_deref()?;

		Some(match self.error_description.as_deref() {
			Some(description) => format!("{error}: {description}"),
			None => error.to_owned(),
		})
	}
}

/// Parses a response body as a JSON object, falling back to form decoding.
pub fn parse_body(body: &[u8]) -> Map<String, Value> {
	if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
		return map;
	}

	url::form_urlencoded::parse(body)
		.map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
		.collect()
}

fn lifetime(value: &Value) -> Option<i64> {
	match value {
		Value::Number(number) =>
			number.as_i64().or_else(|| number.as_f64().map(|secs| secs as i64)),
		Value::String(text) => text.trim().parse().ok(),
		_ => None,
	}
}
