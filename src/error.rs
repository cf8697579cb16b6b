//! Login-level error types shared by the listener, the token exchange, and the orchestrator.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical login error exposed by public APIs.
///
/// Every variant maps onto exactly one [`ErrorKind`] so callers (and the CLI exit code) can
/// branch on the category without matching nested errors.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem (authority, client, redirect target, listener bind).
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure while calling the token endpoint.
	#[error(transparent)]
	Network(#[from] TransportError),
	/// Token endpoint rejected the exchange or answered with an unusable body.
	#[error(transparent)]
	TokenExchange(#[from] TokenExchangeError),

	/// No callback arrived before the configured bound.
	#[error("No authorization callback arrived within {}s.", waited.as_secs())]
	Timeout {
		/// How long the listener waited.
		waited: StdDuration,
	},
	/// The user (or the surrounding process) aborted the flow before a callback arrived.
	#[error("Login was aborted before the authorization callback arrived.")]
	Aborted,
	/// Provider redirected back with an OAuth `error` instead of a code.
	#[error("Authorization was denied: {}.", description.as_deref().unwrap_or(error))]
	AuthorizationDenied {
		/// OAuth `error` code from the redirect.
		error: String,
		/// Optional `error_description` from the redirect.
		description: Option<String>,
	},
	/// Returned `state` did not match the nonce issued for this flow.
	#[error("Authorization state did not match; the callback was rejected.")]
	CsrfValidationFailed,
}
impl Error {
	/// Returns the category of this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Config(_) => ErrorKind::ConfigurationError,
			Self::Network(_) => ErrorKind::NetworkError,
			Self::TokenExchange(_) => ErrorKind::TokenExchangeFailed,
			Self::Timeout { .. } => ErrorKind::Timeout,
			Self::Aborted => ErrorKind::Aborted,
			Self::AuthorizationDenied { .. } => ErrorKind::AuthorizationDenied,
			Self::CsrfValidationFailed => ErrorKind::CsrfValidationFailed,
		}
	}
}

/// Error categories surfaced to the invoking command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// Malformed authority, client, or redirect configuration.
	ConfigurationError,
	/// No callback within the configured bound.
	Timeout,
	/// Provider returned an OAuth error on the redirect.
	AuthorizationDenied,
	/// State mismatch; treated as a potential attack.
	CsrfValidationFailed,
	/// Transport failure during the token exchange.
	NetworkError,
	/// Provider rejected the code/verifier or answered with a malformed body.
	TokenExchangeFailed,
	/// Explicit user abort.
	Aborted,
}
impl ErrorKind {
	/// Returns a stable label suitable for logs or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ConfigurationError => "configuration_error",
			Self::Timeout => "timeout",
			Self::AuthorizationDenied => "authorization_denied",
			Self::CsrfValidationFailed => "csrf_validation_failed",
			Self::NetworkError => "network_error",
			Self::TokenExchangeFailed => "token_exchange_failed",
			Self::Aborted => "aborted",
		}
	}

	/// Process exit code used by the command-line front end.
	pub const fn exit_code(self) -> u8 {
		match self {
			Self::ConfigurationError => 2,
			Self::Timeout => 3,
			Self::AuthorizationDenied => 4,
			Self::CsrfValidationFailed => 5,
			Self::NetworkError => 6,
			Self::TokenExchangeFailed => 7,
			Self::Aborted => 130,
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Authority base URL cannot be parsed or used as a base.
	#[error("Authority URL `{authority}` is invalid.")]
	InvalidAuthority {
		/// Raw authority value.
		authority: String,
		/// Underlying parsing failure, when the value did not parse at all.
		#[source]
		source: Option<url::ParseError>,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Redirect target cannot produce a usable loopback redirect URI.
	#[error("Redirect target is invalid: {reason}.")]
	InvalidRedirect {
		/// Why the redirect target was rejected.
		reason: String,
	},
	/// Client identifier is empty or contains whitespace.
	#[error("Client identifier must be non-empty and contain no whitespace.")]
	InvalidClientId,
	/// Externally supplied PKCE verifier violates RFC 7636.
	#[error("PKCE verifier must be 43-128 characters from the unreserved set.")]
	InvalidPkceVerifier,
	/// Request scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Callback timeout must be positive.
	#[error("Callback timeout must be greater than zero.")]
	ZeroTimeout,
	/// Loopback listener could not bind its port.
	#[error("Unable to bind the callback listener on {addr}.")]
	CallbackBind {
		/// Address that failed to bind.
		addr: String,
		/// Underlying socket error.
		#[source]
		source: std::io::Error,
	},
	/// A callback listener can only be started once.
	#[error("Callback listener was already started.")]
	ListenerAlreadyStarted,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	pub(crate) fn invalid_redirect(reason: impl Into<String>) -> Self {
		Self::InvalidRedirect { reason: reason.into() }
	}
}

/// Failures reported by the token endpoint after a response was received.
#[derive(Debug, ThisError)]
pub enum TokenExchangeError {
	/// Provider answered with a non-success status.
	#[error("Token endpoint rejected the exchange: {}.", description.as_deref().unwrap_or(error))]
	Rejected {
		/// OAuth `error` code (or `http_<status>` when the body carried none).
		error: String,
		/// Optional OAuth `error_description`.
		description: Option<String>,
		/// HTTP status code.
		status: u16,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code.
		status: u16,
	},
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned an `expires_in` string that is not a whole number.
	#[error("The expires_in value `{value}` is not a whole number of seconds.")]
	MalformedExpiresIn {
		/// Raw value as received.
		value: String,
	},
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint returned an empty access token.
	#[error("Token endpoint returned an empty access token.")]
	EmptyAccessToken,
}
impl TokenExchangeError {
	/// Returns the OAuth error code carried by a rejection, if any.
	pub fn oauth_error(&self) -> Option<&str> {
		match self {
			Self::Rejected { error, .. } => Some(error),
			_ => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
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
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
