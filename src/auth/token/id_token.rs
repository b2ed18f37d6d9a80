//! ID token payload extraction.
//!
//! Only the claims segment is decoded. The signature is not checked; the token arrives over the
//! same TLS channel as the access token it accompanies.

// crates.io
use base64::{
	Engine as _, alphabet,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use serde_json::Value;
// self
use crate::_prelude::*;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
	&alphabet::URL_SAFE,
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Failures raised while decoding an ID token.
#[derive(Debug, ThisError)]
pub enum IdTokenError {
	/// The token is not a three-segment compact JWS.
	#[error("Wrong number of segments in ID token: expected 3, found {segments}.")]
	SegmentCount {
		/// Number of `.`-separated segments found.
		segments: usize,
	},
	/// The claims segment is not valid base64url.
	#[error("ID token payload is not valid base64url.")]
	Base64 {
		/// Underlying decoding failure.
		#[source]
		source: base64::DecodeError,
	},
	/// The claims segment is not valid JSON.
	#[error("ID token payload is not valid JSON.")]
	Json {
		/// Underlying parsing failure.
		#[source]
		source: serde_json::Error,
	},
}

/// Decodes the claims segment of a compact ID token.
pub fn decode_id_token(token: &str) -> Result<Value, IdTokenError> {
	let segments = token.split('.').collect::<Vec<_>>();

	if segments.len() != 3 {
		return Err(IdTokenError::SegmentCount { segments: segments.len() });
	}

	let payload = URL_SAFE_LENIENT
		.decode(segments[1].trim_end_matches('='))
		.map_err(|source| IdTokenError::Base64 { source })?;

	serde_json::from_slice(&payload).map_err(|source| IdTokenError::Json { source })
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn decodes_unpadded_payload() {
		let payload = URL_SAFE_NO_PAD.encode(br#"{"foo":"bar"}"#);
		let claims = decode_id_token(&format!("h.{payload}.s")).expect("Claims should decode.");

		assert_eq!(claims, json!({ "foo": "bar" }));
	}

	#[test]
	fn decodes_padded_payload() {
		let payload = URL_SAFE.encode(br#"{"sub":"123"}"#);

		assert!(payload.ends_with('='), "Fixture should carry padding.");

		let claims = decode_id_token(&format!("h.{payload}.s")).expect("Claims should decode.");

		assert_eq!(claims, json!({ "sub": "123" }));
	}

	#[test]
	fn rejects_wrong_segment_count() {
		let payload = URL_SAFE_NO_PAD.encode(br#"{"foo":"bar"}"#);
		let err = decode_id_token(&format!("h.{payload}"))
			.expect_err("Two-segment token should be rejected.");

		assert!(matches!(err, IdTokenError::SegmentCount { segments: 2 }));
		assert!(matches!(
			decode_id_token("a.b.c.d"),
			Err(IdTokenError::SegmentCount { segments: 4 })
		));
	}

	#[test]
	fn rejects_non_json_payload() {
		let payload = URL_SAFE_NO_PAD.encode(b"not json");

		assert!(matches!(
			decode_id_token(&format!("h.{payload}.s")),
			Err(IdTokenError::Json { .. })
		));
		assert!(matches!(decode_id_token("h.***.s"), Err(IdTokenError::Base64 { .. })));
	}
}
