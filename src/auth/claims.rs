//! Decoded ID token claims as produced by the injected verifier.

// self
use crate::_prelude::*;

/// Registered OIDC claims plus the flattened profile payload of an ID token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
	/// Issuer identifier the token was minted by.
	pub iss: String,
	/// Subject identifier for the end user.
	pub sub: String,
	/// Audience (the client identifier).
	pub aud: String,
	/// Expiry instant.
	#[serde(with = "time::serde::timestamp")]
	pub exp: OffsetDateTime,
	/// Issued-at instant.
	#[serde(with = "time::serde::timestamp")]
	pub iat: OffsetDateTime,
	/// Replay-binding nonce, present when the request carried one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
	/// Instant of the end user's last active authentication, when asserted.
	#[serde(default, with = "time::serde::timestamp::option", skip_serializing_if = "Option::is_none")]
	pub auth_time: Option<OffsetDateTime>,
	/// Remaining profile claims (name, email, picture, custom claims, ...).
	#[serde(flatten)]
	pub profile: JsonMap<String, JsonValue>,
}

/// Verifier output pairing the typed claims with the raw user payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecodedIdToken {
	/// Typed registered claims.
	pub claims: IdTokenClaims,
	/// The full decoded payload viewed as a user profile object.
	pub user: JsonMap<String, JsonValue>,
}
impl DecodedIdToken {
	/// Builds the decoded form from typed claims, deriving the user payload
	/// from the claims' own serialization.
	pub fn from_claims(claims: IdTokenClaims) -> Self {
		let user = match serde_json::to_value(&claims) {
			Ok(JsonValue::Object(map)) => map,
			_ => JsonMap::new(),
		};

		Self { claims, user }
	}
}
