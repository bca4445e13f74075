//! Configuration and per-call option types for [`SilentClient`](crate::client::SilentClient).

// self
use crate::_prelude::*;

/// Scope requested with every authorization when no default override is set.
pub const DEFAULT_SCOPE: &str = "openid profile email";
/// Audience used when neither the configuration nor the call names one.
pub const DEFAULT_AUDIENCE: &str = "default";
/// Bound on the silent authorization round trip when none is configured.
pub const DEFAULT_AUTHORIZE_TIMEOUT: Duration = Duration::seconds(60);
/// Clock-skew leeway applied to ID token time-claim validation by default.
pub const DEFAULT_VERIFY_LEEWAY: Duration = Duration::seconds(60);

/// Construction-time configuration for [`SilentClient`](crate::client::SilentClient).
#[derive(Clone, Debug)]
pub struct ClientOptions {
	/// Identity provider domain, with or without a scheme; schemeless values
	/// get `https://`.
	pub domain: String,
	/// OAuth client identifier.
	pub client_id: String,
	/// Default redirect URI for login and silent authorization; individual
	/// logins may override it.
	pub redirect_uri: Option<Url>,
	/// Expected `iss` claim; defaults to `https://{domain}/`.
	pub issuer: Option<String>,
	/// Default resource audience; defaults to [`DEFAULT_AUDIENCE`].
	pub audience: Option<String>,
	/// Scope merged on top of the default scope for every request.
	pub scope: Option<String>,
	/// Selects the refresh-token grant as the silent renewal strategy and
	/// appends `offline_access` to the configured scope.
	pub use_refresh_tokens: bool,
	/// Cache backend label, `"memory"` or `"localstorage"`. Anything else
	/// fails construction immediately.
	pub cache_location: String,
	/// Clock-skew leeway for ID token time-claim validation; defaults to
	/// [`DEFAULT_VERIFY_LEEWAY`]. The cache freshness window is fixed at
	/// [`DEFAULT_FRESHNESS_LEEWAY`](crate::cache::DEFAULT_FRESHNESS_LEEWAY)
	/// and is not affected by this value.
	pub leeway: Option<Duration>,
	/// `max_age` authorization parameter, in seconds, when enforced.
	pub max_age: Option<u64>,
	/// Bound on the silent authorization round trip; defaults to
	/// [`DEFAULT_AUTHORIZE_TIMEOUT`].
	pub authorize_timeout: Option<Duration>,
	/// Replaces the built-in [`DEFAULT_SCOPE`] entirely when set.
	pub default_scope: Option<String>,
	/// Extra parameters appended verbatim to every authorize URL.
	pub extra_authorize_params: Vec<(String, String)>,
}
impl ClientOptions {
	/// Creates options with the required fields; everything else defaults.
	pub fn new(domain: impl Into<String>, client_id: impl Into<String>) -> Self {
		Self {
			domain: domain.into(),
			client_id: client_id.into(),
			redirect_uri: None,
			issuer: None,
			audience: None,
			scope: None,
			use_refresh_tokens: false,
			cache_location: "memory".into(),
			leeway: None,
			max_age: None,
			authorize_timeout: None,
			default_scope: None,
			extra_authorize_params: Vec::new(),
		}
	}
}

/// Per-call options for [`get_token_silently`](crate::client::SilentClient::get_token_silently)
/// and the cached read-only accessors.
#[derive(Clone, Debug, Default)]
pub struct GetTokenOptions {
	/// Audience override for this call.
	pub audience: Option<String>,
	/// Scope merged on top of the configured scope for this call.
	pub scope: Option<String>,
	/// Skips the cache query and forces a renewal.
	pub ignore_cache: bool,
	/// Silent authorization timeout override for this call.
	pub authorize_timeout: Option<Duration>,
	/// Extra parameters appended to the silent authorize URL for this call.
	pub extra_params: Vec<(String, String)>,
}

/// Per-call options for [`build_authorize_url`](crate::client::SilentClient::build_authorize_url).
#[derive(Clone, Debug, Default)]
pub struct RedirectLoginOptions {
	/// Redirect URI override for this login.
	pub redirect_uri: Option<Url>,
	/// Opaque caller payload returned by the redirect callback.
	pub app_state: Option<JsonValue>,
	/// Audience override for this login.
	pub audience: Option<String>,
	/// Scope merged on top of the configured scope for this login.
	pub scope: Option<String>,
	/// Extra parameters appended to this login's authorize URL.
	pub extra_params: Vec<(String, String)>,
}

/// Per-call options for [`logout`](crate::client::SilentClient::logout).
#[derive(Clone, Debug, Default)]
pub struct LogoutOptions {
	/// Also terminate the upstream identity provider session.
	pub federated: bool,
	/// Clear local state only; no logout URL is produced.
	pub local_only: bool,
	/// Where the provider should send the user after logging out.
	pub return_to: Option<Url>,
}
