//! Transport primitives for gateway-dispatched requests.
//!
//! The module exposes [`Transport`] alongside the [`GatewayRequest`] and
//! [`GatewayResponse`] descriptors so downstream crates can plug in any HTTP stack. The
//! gateway uses the same transport for application requests and for refresh calls, and
//! the OAuth 2.0 refresh endpoint publishes response details through
//! [`ResponseMetadataSlot`] so error mapping keeps the HTTP status and retry hints.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::http::{
	HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
	header::{CONTENT_TYPE, RETRY_AFTER},
};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`Transport::dispatch`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<GatewayResponse, TransportError>> + 'a + Send + Sync>>;

/// Abstraction over HTTP stacks capable of executing gateway requests.
///
/// The trait is the gateway's only dependency on an HTTP client. Implementations must
/// report every HTTP response, including `4xx`/`5xx`, as `Ok` so the gateway can inspect
/// the status; `Err` is reserved for network-level failures. Dispatch futures must be
/// `Send + Sync` so the `oauth2` adapter can drive them.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves once the full response body is available.
	fn dispatch(&self, request: GatewayRequest) -> TransportFuture<'_>;
}

/// Method, URL, headers, and body of a request routed through the gateway.
#[derive(Clone, Debug)]
pub struct GatewayRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL.
	pub url: Url,
	/// Request headers; the gateway's signer injects `Authorization` here.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
	retry: bool,
}
impl GatewayRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None, retry: false }
	}

	/// Creates a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Creates a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Creates a `PUT` request.
	pub fn put(url: Url) -> Self {
		Self::new(Method::PUT, url)
	}

	/// Creates a `PATCH` request.
	pub fn patch(url: Url) -> Self {
		Self::new(Method::PATCH, url)
	}

	/// Creates a `DELETE` request.
	pub fn delete(url: Url) -> Self {
		Self::new(Method::DELETE, url)
	}

	/// Sets (replacing) a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `value` as the JSON body and sets `Content-Type: application/json`.
	pub fn json<T>(mut self, value: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(value).map_err(ConfigError::http_request)?;

		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.body = Some(body);

		Ok(self)
	}

	/// Returns `true` if the gateway already replayed this request after a refresh.
	pub fn is_retry(&self) -> bool {
		self.retry
	}

	pub(crate) fn into_retry(mut self) -> Self {
		self.retry = true;

		self
	}
}

/// Status, headers, and body returned by a [`Transport`].
#[derive(Clone, Debug)]
pub struct GatewayResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Full response body.
	pub body: Vec<u8>,
}
impl GatewayResponse {
	/// Creates a response with the given status and body and no headers.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns `true` for `2xx` statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns `true` for `401 Unauthorized`.
	pub fn is_unauthorized(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED
	}

	/// Decodes the body as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Deserializes the body as JSON.
	pub fn json<T>(&self) -> serde_json::Result<T>
	where
		T: DeserializeOwned,
	{
		serde_json::from_slice(&self.body)
	}

	/// Parses the `Retry-After` header, if present.
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(&self.headers)
	}
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// [`Transport`] backed by a shared [`ReqwestClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn dispatch(&self, request: GatewayRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let GatewayRequest { method, url, headers, body, .. } = request;
			let mut builder = client.request(method, url).headers(headers);

			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(GatewayResponse { status, headers, body })
		})
	}
}

pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
