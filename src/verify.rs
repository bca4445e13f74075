//! ID token verification boundary.
//!
//! Signature checking, JWKS retrieval, and claim validation policy live behind
//! [`IdTokenVerifier`]; the engine only states its expectations per exchange
//! and consumes the decoded result. A production deployment injects a JOSE
//! implementation here.

// self
use crate::{_prelude::*, auth::DecodedIdToken};

/// Per-exchange inputs the verifier must check the token against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdTokenExpectations {
	/// Required `iss` claim.
	pub issuer: String,
	/// Required `aud` claim, the client ID.
	pub audience: String,
	/// Required `nonce` claim; `None` for exchanges that did not carry one,
	/// such as a plain refresh-token-grant renewal.
	pub nonce: Option<String>,
	/// Tolerated clock skew for the time-based claims.
	pub leeway: Duration,
}

/// Verification failures reported by the injected verifier.
#[derive(Clone, Debug, ThisError)]
pub enum VerificationError {
	/// The compact JWT could not be decoded at all.
	#[error("ID token is malformed: {message}.")]
	Malformed {
		/// Decoder-specific detail.
		message: String,
	},
	/// The token's signature did not validate against the provider's keys.
	#[error("ID token signature is invalid.")]
	InvalidSignature,
	/// A claim did not match the stated expectations.
	#[error("ID token claim \"{claim}\" is invalid: {message}.")]
	ClaimMismatch {
		/// Claim name, e.g. `nonce`.
		claim: &'static str,
		/// Validator-specific detail.
		message: String,
	},
	/// The token is outside its validity window even with leeway applied.
	#[error("ID token is expired or not yet valid.")]
	OutsideValidityWindow,
}
impl VerificationError {
	/// Builds a [`ClaimMismatch`](Self::ClaimMismatch) for `claim`.
	pub fn claim(claim: &'static str, message: impl Into<String>) -> Self {
		Self::ClaimMismatch { claim, message: message.into() }
	}
}

/// Future type returned by [`IdTokenVerifier::verify`].
pub type VerifyFuture<'a> =
	Pin<Box<dyn Future<Output = Result<DecodedIdToken, VerificationError>> + 'a + Send>>;

/// Contract for ID token verification.
pub trait IdTokenVerifier
where
	Self: Send + Sync,
{
	/// Verifies `raw_id_token` against `expectations` and returns its decoded
	/// claims. Implementations must check the signature, the `iss`, `aud`,
	/// `exp` and `iat` claims, and the `nonce` claim when one is expected.
	fn verify<'a>(
		&'a self,
		raw_id_token: &'a str,
		expectations: &'a IdTokenExpectations,
	) -> VerifyFuture<'a>;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn claim_mismatch_names_the_claim() {
		let err = VerificationError::claim("nonce", "value does not match the transaction");

		assert!(err.to_string().contains("\"nonce\""));
		assert!(err.to_string().contains("value does not match the transaction"));
	}
}
