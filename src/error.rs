//! Guard-level error types shared across the wrapper, session checker, and token carriers.

// self
use crate::_prelude::*;

/// Guard-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Message surfaced to the page when session expiry is confirmed.
pub const SESSION_EXPIRED_MESSAGE: &str =
	"Your session has expired. Please refresh the page to log in again.";

/// Canonical guard error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) on the primary request; never interpreted by the guard.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The session validity check could not be completed or reported a failure.
	#[error(transparent)]
	ValidityCheck(#[from] ValidityCheckError),

	/// The server-side session is no longer valid; the caller must re-authenticate.
	#[error("{message}")]
	SessionExpired {
		/// User-facing message handed to the notifier before rejection.
		message: String,
	},
	/// No anti-forgery token was obtainable for a mutating request under the conservative policy.
	#[error("Anti-forgery token is unavailable for a mutating request.")]
	TokenMissing,
	/// The keep-alive endpoint rejected or failed the extension request.
	#[error("Keep-alive endpoint reported a failure: {reason}.")]
	KeepAlive {
		/// Endpoint- or guard-supplied reason string.
		reason: String,
	},
}
impl Error {
	/// Builds a [`Error::SessionExpired`] carrying the fixed default message.
	pub fn session_expired() -> Self {
		Self::SessionExpired { message: SESSION_EXPIRED_MESSAGE.into() }
	}

	/// Builds a [`Error::SessionExpired`] with an overridden message.
	pub fn session_expired_with(message: impl Into<String>) -> Self {
		Self::SessionExpired { message: message.into() }
	}

	/// Returns `true` when this error is the session expiry signal.
	///
	/// Callers must branch on this kind tag instead of string-matching the message.
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::SessionExpired { .. })
	}
}

/// Configuration and validation failures raised by the guard.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Token value contains bytes that cannot be carried in an HTTP header.
	#[error("Token value cannot be encoded as a header value.")]
	InvalidTokenValue {
		/// Underlying header encoding failure.
		#[source]
		source: http::header::InvalidHeaderValue,
	},
	/// Configured endpoint path cannot be joined onto the request origin.
	#[error("Endpoint path cannot be joined onto the request origin.")]
	InvalidEndpointPath {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}

/// Transport-level failures (network, IO) on the primary request.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP transport reported a network failure.
	#[error("Network error occurred while executing the request.")]
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

/// Failures of the secondary session validity check, distinct from [`Error::SessionExpired`].
#[derive(Debug, ThisError)]
pub enum ValidityCheckError {
	/// Validity endpoint answered but flagged the check itself as failed.
	#[error("Session validity endpoint reported a failure: {}.", .reason.as_deref().unwrap_or("unknown error"))]
	Endpoint {
		/// Reason string taken from the endpoint's `error` field, when present.
		reason: Option<String>,
	},
	/// Validity endpoint returned a body that does not parse as the expected JSON shape.
	#[error("Session validity endpoint returned malformed JSON.")]
	MalformedBody {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Validity request itself could not be completed.
	#[error("Session validity request could not be completed.")]
	Probe {
		/// Underlying transport failure.
		#[source]
		source: TransportError,
	},
}
