//! Client-level error types shared by the dispatcher, credential sources, and transports.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary identity-provider failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No principal is signed in although one is required.
	#[error("No principal is signed in.")]
	Unauthenticated,
	/// The identity provider refused to mint a new credential.
	#[error("Credential refresh was denied: {reason}.")]
	RefreshDenied {
		/// Provider- or source-supplied reason string.
		reason: String,
	},
	/// The backend rejected the presented credential.
	#[error("Backend rejected the credential with status {status}.")]
	AuthorizationFailed {
		/// HTTP status code (always `401`).
		status: u16,
		/// Response body returned alongside the rejection.
		body: String,
	},
	/// The backend answered with a non-authorization error status.
	#[error("Backend returned status {status}: {body}.")]
	Server {
		/// HTTP status code.
		status: u16,
		/// Response body, lossily decoded as UTF-8.
		body: String,
	},
	/// The response body did not match the expected JSON shape.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured decoding failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Caller-supplied input cannot form a valid request.
	#[error("Request is invalid: {reason}.")]
	InvalidRequest {
		/// Why the request was rejected locally.
		reason: String,
	},
}
impl Error {
	/// Returns `true` for errors that end the session when they escape the retry stage.
	pub fn is_session_invalidating(&self) -> bool {
		matches!(
			self,
			Self::Unauthenticated | Self::RefreshDenied { .. } | Self::AuthorizationFailed { .. }
		)
	}

	/// Returns the HTTP status attached to the error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::AuthorizationFailed { status, .. } | Self::Server { status, .. } => Some(*status),
			Self::Transient(TransientError::TokenEndpoint { status, .. }) => *status,
			Self::Transient(TransientError::TokenResponseParse { status, .. }) => *status,
			_ => None,
		}
	}
}

impl From<crate::auth::IdentifierError> for Error {
	fn from(e: crate::auth::IdentifierError) -> Self {
		Self::InvalidRequest { reason: e.to_string() }
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A configured URL could not be parsed.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Configuration field that holds the URL.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A configured URL uses a scheme other than `http`/`https` or cannot carry a path.
	#[error("The {field} URL `{url}` must be an absolute http(s) URL.")]
	UnsupportedUrl {
		/// Configuration field that holds the URL.
		field: &'static str,
		/// Offending URL.
		url: String,
	},
	/// An environment variable holds an unusable value.
	#[error("Environment variable `{name}` has an invalid value `{value}`.")]
	InvalidEnv {
		/// Variable name.
		name: &'static str,
		/// Raw value.
		value: String,
	},

	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
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

/// Temporary identity-provider failures (safe to retry later).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or client-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Endpoint family that was being called.
		target: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete within its timeout.
	#[error("Request to {target} timed out.")]
	Timeout {
		/// Endpoint family that was being called.
		target: &'static str,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error raised while calling the backend API.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { target: "the shortener API", source: Box::new(src) }
	}

	/// Wraps a transport-specific network error raised while calling the token endpoint.
	pub fn token_endpoint(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { target: "the token endpoint", source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() {
			Self::Timeout { target: "the shortener API" }
		} else {
			Self::network(e)
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn session_invalidating_covers_auth_family_only() {
		assert!(Error::Unauthenticated.is_session_invalidating());
		assert!(Error::RefreshDenied { reason: "revoked".into() }.is_session_invalidating());
		assert!(
			Error::AuthorizationFailed { status: 401, body: String::new() }
				.is_session_invalidating()
		);
		assert!(!Error::Server { status: 500, body: "boom".into() }.is_session_invalidating());
		assert!(
			!Error::from(TransportError::Timeout { target: "the shortener API" })
				.is_session_invalidating()
		);
	}

	#[test]
	fn status_is_exposed_for_http_failures() {
		assert_eq!(Error::Server { status: 404, body: String::new() }.status(), Some(404));
		assert_eq!(Error::AuthorizationFailed { status: 401, body: String::new() }.status(), Some(401));
		assert_eq!(Error::Unauthenticated.status(), None);
	}

	#[test]
	fn transport_error_keeps_source() {
		let io = std::io::Error::other("socket closed");
		let err = Error::from(TransportError::network(io));
		let source = StdError::source(&err).expect("Transport error should expose its source.");

		assert!(source.to_string().contains("socket closed") || source.source().is_some());
	}
}
