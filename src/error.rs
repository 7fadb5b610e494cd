//! Gateway-level error types shared across the transport, refresh, and store layers.
//!
//! Every error type here is `Clone` so a single refresh failure can be delivered to each
//! request that was queued behind it.

// self
use crate::{_prelude::*, http::GatewayResponse};

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shared, clonable handle to an arbitrary error source.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Credential store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) while dispatching an application request.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Refresh endpoint failed; queued requests receive the same value.
	#[error("Token refresh failed: {0}")]
	Refresh(#[from] RefreshError),

	/// The request was rejected with `401 Unauthorized` and will not be retried.
	#[error("Request was rejected with 401 Unauthorized.")]
	Unauthorized {
		/// Response returned by the upstream service.
		response: Box<GatewayResponse>,
		/// `true` when the request had already been replayed after a refresh.
		retried: bool,
	},
	/// A refresh was required but no refresh token is held.
	#[error("Authentication is required; no refresh token is available.")]
	AuthenticationRequired,
	/// The in-flight refresh was dropped before this queued request could be replayed.
	#[error("Token refresh was abandoned before the queued request could be replayed.")]
	RefreshAbandoned,
}
impl Error {
	/// Returns `true` if the error leaves the gateway without usable credentials.
	pub fn requires_login(&self) -> bool {
		matches!(
			self,
			Self::AuthenticationRequired | Self::Refresh(RefreshError::Rejected { .. })
		)
	}
}

/// Configuration and validation failures raised by the gateway.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed.
	#[error("HTTP request could not be constructed.")]
	HttpRequest {
		/// Underlying request builder failure.
		#[source]
		source: SharedError,
	},
	/// A URL could not be parsed or joined.
	#[error("URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A relative path was resolved without a configured base URL.
	#[error("Gateway has no base URL configured.")]
	MissingBaseUrl,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}

	/// Wraps a request construction failure inside [`ConfigError`].
	pub fn http_request(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpRequest { source: Arc::new(src) }
	}
}
impl From<url::ParseError> for ConfigError {
	fn from(source: url::ParseError) -> Self {
		Self::InvalidUrl { source }
	}
}
impl From<oauth2::http::Error> for ConfigError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::http_request(e)
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures reported by a [`RefreshEndpoint`](crate::refresh::RefreshEndpoint).
#[derive(Clone, Debug, ThisError)]
pub enum RefreshError {
	/// The endpoint rejected the refresh token (expired, revoked, or unknown).
	#[error("Refresh endpoint rejected the refresh token: {reason}.")]
	Rejected {
		/// Endpoint- or gateway-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Client authentication against the token endpoint failed.
	#[error("Refresh endpoint rejected the client credentials: {reason}.")]
	InvalidClient {
		/// Endpoint-supplied reason string.
		reason: String,
	},
	/// Temporary upstream failure.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure while calling the refresh endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The refresh request could not be built.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Temporary failure variants (safe to retry).
#[derive(Clone, Debug, ThisError)]
pub enum TransientError {
	/// Endpoint returned an unexpected but non-fatal response.
	#[error("Refresh endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Endpoint responded with JSON that could not be parsed.
	#[error("Refresh endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure, including the offending JSON path.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while dispatching the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while dispatching the request.")]
	Io {
		/// Underlying IO failure.
		#[source]
		source: Arc<std::io::Error>,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Arc::new(src) }
	}
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		Self::Io { source: Arc::new(e) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
