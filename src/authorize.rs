//! Authorization request construction and the silent authorization boundary.
//!
//! Building an authorize URL is pure: the engine mints random `state` and
//! `nonce` values, records the transaction, and hands the URL to the caller.
//! Actually performing the hidden round trip (an invisible iframe in a
//! browser shell, a headless webview elsewhere) is host-specific and lives
//! behind [`SilentAuthorizer`].

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

const RANDOM_STRING_LEN: usize = 32;

/// How the provider should deliver the authorization response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseMode {
	/// Query-string delivery on the redirect URI; used by interactive logins.
	Query,
	/// `web_message` delivery via a posted message; used by silent
	/// authorization so no navigation happens.
	WebMessage,
}
impl ResponseMode {
	const fn as_str(self) -> &'static str {
		match self {
			ResponseMode::Query => "query",
			ResponseMode::WebMessage => "web_message",
		}
	}
}

/// Inputs for one authorize URL.
#[derive(Clone, Debug)]
pub struct AuthorizeParams {
	/// OAuth client ID.
	pub client_id: String,
	/// Merged scope string, order preserved.
	pub scope: String,
	/// Resource audience, `"default"` when unspecified.
	pub audience: String,
	/// CSRF-binding state value.
	pub state: String,
	/// Replay-binding nonce value.
	pub nonce: String,
	/// URI the provider redirects or posts back to.
	pub redirect_uri: Url,
	/// Response delivery mode.
	pub response_mode: ResponseMode,
	/// `prompt=none` marker; set for silent authorization.
	pub prompt_none: bool,
	/// Extra authorization parameters forwarded verbatim (e.g. `connection`,
	/// `login_hint`).
	pub extra: Vec<(String, String)>,
}

/// Builds the full authorize URL for `params` on top of `authorize_endpoint`.
pub fn build_url(authorize_endpoint: &Url, params: &AuthorizeParams) -> Url {
	let mut url = authorize_endpoint.clone();

	{
		let mut query = url.query_pairs_mut();

		query
			.append_pair("client_id", &params.client_id)
			.append_pair("scope", &params.scope)
			.append_pair("audience", &params.audience)
			.append_pair("response_type", "code")
			.append_pair("response_mode", params.response_mode.as_str())
			.append_pair("state", &params.state)
			.append_pair("nonce", &params.nonce)
			.append_pair("redirect_uri", params.redirect_uri.as_str());

		if params.prompt_none {
			query.append_pair("prompt", "none");
		}
		for (key, value) in &params.extra {
			query.append_pair(key, value);
		}

		query.append_pair("auth0Client", &client_telemetry());
	}

	url
}

/// Mints a fresh alphanumeric `state` or `nonce` value.
pub fn random_string() -> String {
	rand::rng().sample_iter(Alphanumeric).take(RANDOM_STRING_LEN).map(char::from).collect()
}

/// Base64url-encoded client identification blob appended to every authorize
/// URL, mirroring what providers expect from their first-party SDKs.
fn client_telemetry() -> String {
	let blob = serde_json::json!({
		"name": "oidc-silent",
		"version": env!("CARGO_PKG_VERSION"),
	});

	URL_SAFE_NO_PAD.encode(blob.to_string())
}

/// Authorization response delivered by a silent authorization round trip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCodePayload {
	/// Single-use authorization code.
	pub code: String,
	/// Echoed state value; must match the transaction that built the URL.
	pub state: String,
}

/// Future type returned by [`SilentAuthorizer::authorize`].
pub type AuthorizeFuture<'a> = Pin<Box<dyn Future<Output = Result<AuthorizationCodePayload>> + 'a + Send>>;

/// Host-specific facility that runs a `prompt=none` authorization round trip
/// and returns the posted-back code payload.
///
/// Implementations surface the provider's in-band errors as
/// [`Error::LoginRequired`], [`Error::ConsentRequired`] or
/// [`Error::Authentication`] so the engine can branch on them.
pub trait SilentAuthorizer
where
	Self: Send + Sync,
{
	/// Navigates a hidden context to `authorize_url` and resolves with the
	/// authorization response it posts back.
	fn authorize(&self, authorize_url: Url) -> AuthorizeFuture<'_>;
}
