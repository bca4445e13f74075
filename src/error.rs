//! Crate-level error types shared across the engine, transports, and stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Recovery branching is driven by the variant, never by matching on message
/// strings: [`requires_login`](Self::requires_login) selects the failures that
/// invalidate the session, [`is_recoverable`](Self::is_recoverable) the ones a
/// background session check may swallow.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::storage::StorageError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Session transport failure (network, HTTP status, malformed body).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// ID token verification failure reported by the injected verifier.
	#[error(transparent)]
	Verification(#[from] crate::verify::VerificationError),

	/// The provider requires an interactive login before tokens can be issued.
	#[error("Login required.")]
	LoginRequired,
	/// The provider requires the user to grant consent interactively.
	#[error("Consent required.")]
	ConsentRequired,
	/// Structured authentication failure returned via the redirect callback.
	#[error("Authentication error: {error}: {description}.")]
	Authentication {
		/// Provider error code (e.g. `access_denied`).
		error: String,
		/// Provider error description, empty when omitted.
		description: String,
		/// The `state` value the failure was correlated with.
		state: String,
		/// The caller's original application state, for UI recovery.
		app_state: Option<JsonValue>,
	},
	/// The callback `state` does not match any live transaction.
	#[error("Invalid state.")]
	InvalidState,
	/// The callback URL carried no query parameters to parse.
	#[error("There are no query params available for parsing.")]
	MissingQueryParams,
	/// The callback URL carried neither a `code` nor an `error` parameter.
	#[error("Callback URL is missing the authorization code.")]
	MissingAuthorizationCode,
	/// A bounded wait elapsed before the operation could complete.
	#[error("Timed out while {0}.")]
	Timeout(TimeoutStage),
}
impl Error {
	/// Returns `true` for failures that invalidate the current session and
	/// demand a fresh interactive login.
	pub fn requires_login(&self) -> bool {
		matches!(self, Error::LoginRequired | Error::ConsentRequired)
	}

	/// Returns `true` for failures a background session check may swallow;
	/// the caller's next explicit operation will surface the real state.
	pub fn is_recoverable(&self) -> bool {
		matches!(self, Error::LoginRequired | Error::ConsentRequired | Error::Timeout(_))
	}
}

/// Stages at which a bounded wait can elapse.
///
/// Distinguishing the two lets callers separate "try again shortly" (lock
/// contention) from "the hidden authorization round trip went nowhere".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeoutStage {
	/// Waiting to acquire the cross-process renewal mutex.
	LockAcquire,
	/// Waiting for the silent authorization round trip to post back.
	SilentAuthorization,
}
impl TimeoutStage {
	/// Returns a stable label suitable for error messages and span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TimeoutStage::LockAcquire => "acquiring the renewal lock",
			TimeoutStage::SilentAuthorization => "awaiting the silent authorization response",
		}
	}
}
impl Display for TimeoutStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised during construction or at the
/// top of an operation; never retried.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// The configured cache location is not a known backend.
	#[error("Invalid cache location \"{location}\".")]
	InvalidCacheLocation {
		/// The unrecognized location string, verbatim.
		location: String,
	},
	/// Logout was requested as both federated and local-only.
	#[error("It is invalid to set both the `federated` and `local_only` logout options.")]
	ConflictingLogoutOptions,
	/// The configured domain does not form a valid HTTPS URL.
	#[error("Domain does not form a valid URL.")]
	InvalidDomain {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A provider endpoint path could not be joined onto the domain URL.
	#[error("Provider endpoint URL could not be constructed.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// No redirect URI was supplied per-call or at construction.
	#[error("Redirect URI is required but was not configured.")]
	MissingRedirectUri,
	/// A required collaborator was not injected at construction.
	#[error("No {name} was configured.")]
	MissingCollaborator {
		/// Human-readable collaborator label.
		name: &'static str,
	},
	/// The session endpoint reported a non-positive token lifetime.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Session transport failures (network, HTTP status, malformed body).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// The session endpoint answered with an HTTP error status; the body is
	/// surfaced verbatim so callers can inspect the backend's payload.
	#[error("Session endpoint returned HTTP {status}: {body}.")]
	Status {
		/// HTTP status code (always >= 400).
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// The session endpoint responded with JSON that could not be parsed.
	#[error("Session endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the session endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Returns the HTTP status associated with the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			TransportError::Status { status, .. } => Some(*status),
			TransportError::ResponseParse { status, .. } => *status,
			TransportError::Network { .. } => None,
		}
	}

	/// Returns `true` when the failure is an HTTP 4xx client error; the
	/// refresh-token grant uses this to fall back to a silent authorization
	/// while the underlying session is still valid.
	pub fn is_client_error(&self) -> bool {
		matches!(self.status(), Some(status) if (400..500).contains(&status))
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
