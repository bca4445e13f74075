//! Token cache contracts and built-in backends.
//!
//! A cache miss is never an error; it is the normal trigger for renewal.
//! Saves always replace the whole record for their key; partial updates do
//! not exist.

pub mod memory;
pub mod persistent;

pub use memory::MemoryTokenCache;
pub use persistent::PersistentTokenCache;

// self
use crate::{
	_prelude::*,
	auth::{self, DecodedIdToken, TokenSecret},
	error::ConfigError,
	storage::StorageError,
};

/// Leeway applied by background interactive freshness checks.
pub const DEFAULT_FRESHNESS_LEEWAY: Duration = Duration::seconds(60);

/// Future type returned by [`TokenCache`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + 'a + Send>>;

/// Capability contract implemented by token cache backends.
pub trait TokenCache
where
	Self: Send + Sync,
{
	/// Returns the record matching the query if it is still fresh under the
	/// provided leeway; stale or absent records read as `None`.
	fn get<'a>(
		&'a self,
		query: &'a CacheQuery,
		leeway: Duration,
	) -> CacheFuture<'a, Option<CachedToken>>;

	/// Upserts a record, totally replacing any prior record for its key.
	fn save(&self, token: CachedToken) -> CacheFuture<'_, ()>;

	/// Removes every record belonging to the provided client.
	fn clear<'a>(&'a self, client_id: &'a str) -> CacheFuture<'a, ()>;
}

/// Lookup parameters for a cached token.
#[derive(Clone, Debug)]
pub struct CacheQuery {
	/// OAuth client identifier.
	pub client_id: String,
	/// Resource audience, `"default"` when unspecified.
	pub audience: String,
	/// Merged scope string for the request.
	pub scope: String,
}
impl CacheQuery {
	/// Derives the canonical key for this query.
	pub fn key(&self) -> CacheKey {
		CacheKey::new(&self.client_id, &self.audience, &self.scope)
	}
}

/// Canonical cache key: client + audience + scope fingerprint.
///
/// The scope component is the sorted fingerprint from [`auth::scope`], so
/// set-equal scope strings collide to the same entry regardless of the order
/// their fragments were merged in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
	/// OAuth client identifier.
	pub client_id: String,
	/// Resource audience.
	pub audience: String,
	/// Order-insensitive scope fingerprint.
	pub scope_fingerprint: String,
}
impl CacheKey {
	const KEY_PREFIX: &'static str = "oidc-silent.cache";

	/// Builds a key from the raw query components.
	pub fn new(client_id: &str, audience: &str, scope: &str) -> Self {
		Self {
			client_id: client_id.to_owned(),
			audience: audience.to_owned(),
			scope_fingerprint: auth::scope::fingerprint(scope),
		}
	}

	/// Renders the namespaced storage key used by durable backends.
	pub fn storage_key(&self) -> String {
		format!(
			"{}.{}.{}.{}",
			Self::KEY_PREFIX,
			self.client_id,
			self.audience,
			self.scope_fingerprint
		)
	}

	/// Storage-key prefix covering every record of the provided client.
	pub fn client_prefix(client_id: &str) -> String {
		format!("{}.{client_id}.", Self::KEY_PREFIX)
	}
}

/// A previously obtained token set with its expiry metadata.
#[derive(Clone, Serialize, Deserialize)]
pub struct CachedToken {
	/// Raw ID token; callers must avoid logging it.
	pub id_token: TokenSecret,
	/// Verified, decoded claims for the ID token.
	pub decoded: DecodedIdToken,
	/// OAuth client identifier the token was issued to.
	pub client_id: String,
	/// Resource audience the token was issued for.
	pub audience: String,
	/// Merged scope string the token was requested with.
	pub scope: String,
	/// Instant the record was derived at save time.
	pub issued_at: OffsetDateTime,
	/// Token lifetime relative to `issued_at`.
	pub expires_in: Duration,
}
impl CachedToken {
	/// Derives the canonical key this record is stored under.
	pub fn key(&self) -> CacheKey {
		CacheKey::new(&self.client_id, &self.audience, &self.scope)
	}

	/// Absolute expiry instant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.issued_at + self.expires_in
	}

	/// Returns `true` while `now < issued_at + expires_in - leeway`.
	pub fn is_fresh_at(&self, now: OffsetDateTime, leeway: Duration) -> bool {
		now < self.expires_at() - leeway
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("id_token", &"<redacted>")
			.field("client_id", &self.client_id)
			.field("audience", &self.audience)
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

/// Cache backend selection, decided at construction time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheLocation {
	/// In-process cache living only for the process lifetime.
	Memory,
	/// Durable cache persisted through the configured key-value store and
	/// visible to every scheduler sharing it.
	Persistent,
}
impl CacheLocation {
	/// Returns the configuration label for this location.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheLocation::Memory => "memory",
			CacheLocation::Persistent => "localstorage",
		}
	}
}
impl FromStr for CacheLocation {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"memory" => Ok(CacheLocation::Memory),
			"localstorage" => Ok(CacheLocation::Persistent),
			other => Err(ConfigError::InvalidCacheLocation { location: other.to_owned() }),
		}
	}
}
impl Display for CacheLocation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Token fixture shared by the cache backend unit tests.
#[cfg(test)]
pub(crate) fn test_token(
	client_id: &str,
	audience: &str,
	scope: &str,
	issued_at: OffsetDateTime,
	expires_in: Duration,
) -> CachedToken {
	let claims = crate::auth::IdTokenClaims {
		iss: "https://issuer.example.com/".into(),
		sub: "user-1".into(),
		aud: client_id.into(),
		exp: issued_at + expires_in,
		iat: issued_at,
		nonce: None,
		auth_time: None,
		profile: JsonMap::new(),
	};

	CachedToken {
		id_token: TokenSecret::new("header.payload.signature"),
		decoded: DecodedIdToken::from_claims(claims),
		client_id: client_id.into(),
		audience: audience.into(),
		scope: scope.into(),
		issued_at,
		expires_in,
	}
}
