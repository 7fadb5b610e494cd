//! Refresh endpoints that exchange a refresh token for a new token pair.
//!
//! [`RefreshEndpoint`] is the seam the gateway calls when a `401` starts a refresh cycle.
//! Two implementations ship with the crate: [`JsonRefreshEndpoint`] for auth services that
//! accept `{"refresh_token": ...}` over JSON, and [`OAuth2RefreshEndpoint`] for RFC 6749
//! `grant_type=refresh_token` token endpoints. Both dispatch through a [`Transport`]
//! directly, so a `401` from the refresh endpoint is reported as a refresh failure instead
//! of re-entering the gateway's interception path.

mod oauth;

pub use oauth::*;

// crates.io
use oauth2::http::{HeaderValue, StatusCode, header::ACCEPT};
// self
use crate::{
	_prelude::*,
	auth::{RefreshedTokens, TokenSecret},
	error::{RefreshError, TransientError},
	http::{GatewayRequest, GatewayResponse, Transport},
};

/// Boxed future returned by [`RefreshEndpoint::refresh`].
pub type RefreshFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RefreshedTokens, RefreshError>> + 'a + Send>>;

/// Remote operation exchanging a refresh token for fresh credentials.
pub trait RefreshEndpoint
where
	Self: 'static + Send + Sync,
{
	/// Calls the endpoint with `refresh_token`.
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a>;
}

/// Refresh endpoint speaking a JSON body in both directions.
///
/// Sends `POST <url>` with `{"refresh_token": "<token>"}` and expects
/// `{"access_token": "...", "refresh_token": "..."}` back; camelCase field names are
/// accepted as well and the rotated refresh token is optional.
pub struct JsonRefreshEndpoint<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	url: Url,
}
impl<T> JsonRefreshEndpoint<T>
where
	T: ?Sized + Transport,
{
	/// Creates an endpoint that posts to `url` through `transport`.
	pub fn new(transport: impl Into<Arc<T>>, url: Url) -> Self {
		Self { transport: transport.into(), url }
	}

	/// Endpoint URL.
	pub fn url(&self) -> &Url {
		&self.url
	}
}
impl<T> Debug for JsonRefreshEndpoint<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("JsonRefreshEndpoint").field("url", &self.url.as_str()).finish()
	}
}
impl<T> RefreshEndpoint for JsonRefreshEndpoint<T>
where
	T: ?Sized + Transport,
{
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a> {
		Box::pin(async move {
			let request = GatewayRequest::post(self.url.clone())
				.header(ACCEPT, HeaderValue::from_static("application/json"))
				.json(&RefreshRequestBody { refresh_token: refresh_token.expose() })?;
			let response = self.transport.dispatch(request).await?;

			map_json_response(response)
		})
	}
}

#[derive(Serialize)]
struct RefreshRequestBody<'a> {
	refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponseBody {
	#[serde(alias = "accessToken")]
	access_token: String,
	#[serde(default, alias = "refreshToken")]
	refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponseBody {
	#[serde(default)]
	error: Option<String>,
	#[serde(default, alias = "errorDescription")]
	error_description: Option<String>,
	#[serde(default)]
	message: Option<String>,
}
impl ErrorResponseBody {
	fn reason(self) -> Option<String> {
		self.error_description.or(self.message).or(self.error)
	}
}

fn map_json_response(response: GatewayResponse) -> Result<RefreshedTokens, RefreshError> {
	let status = response.status;

	if status.is_success() {
		let mut de = serde_json::Deserializer::from_slice(&response.body);
		let body: RefreshResponseBody = serde_path_to_error::deserialize(&mut de).map_err(
			|source| TransientError::TokenResponseParse {
				source: Arc::new(source),
				status: Some(status.as_u16()),
			},
		)?;

		return Ok(RefreshedTokens::new(
			body.access_token,
			body.refresh_token.map(TokenSecret::new),
		));
	}

	let reason = serde_json::from_slice::<ErrorResponseBody>(&response.body)
		.ok()
		.and_then(ErrorResponseBody::reason)
		.unwrap_or_else(|| status_reason(status));

	Err(classify_status(status, reason, &response))
}

fn classify_status(
	status: StatusCode,
	reason: String,
	response: &GatewayResponse,
) -> RefreshError {
	match status.as_u16() {
		429 | 500..=599 => TransientError::TokenEndpoint {
			message: reason,
			status: Some(status.as_u16()),
			retry_after: response.retry_after(),
		}
		.into(),
		_ => RefreshError::Rejected { reason, status: Some(status.as_u16()) },
	}
}

fn status_reason(status: StatusCode) -> String {
	match status.canonical_reason() {
		Some(text) => format!("HTTP {} {text}", status.as_u16()),
		None => format!("HTTP {}", status.as_u16()),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::header::RETRY_AFTER;
	// self
	use super::*;

	fn response(status: StatusCode, body: &str) -> GatewayResponse {
		GatewayResponse::new(status, body.as_bytes().to_vec())
	}

	#[test]
	fn success_accepts_snake_and_camel_case() {
		let tokens = map_json_response(response(
			StatusCode::OK,
			r#"{"access_token":"A2","refresh_token":"R2"}"#,
		))
		.expect("Snake case payload should parse.");

		assert_eq!(tokens.access_token.expose(), "A2");
		assert_eq!(tokens.refresh_token.as_ref().map(TokenSecret::expose), Some("R2"));

		let tokens = map_json_response(response(StatusCode::OK, r#"{"accessToken":"A3"}"#))
			.expect("Camel case payload without rotation should parse.");

		assert_eq!(tokens.access_token.expose(), "A3");
		assert!(tokens.refresh_token.is_none());
	}

	#[test]
	fn malformed_success_reports_json_path() {
		let err = map_json_response(response(StatusCode::OK, r#"{"access_token":42}"#))
			.expect_err("Numeric access tokens must be rejected.");

		match err {
			RefreshError::Transient(TransientError::TokenResponseParse { source, status }) => {
				assert_eq!(status, Some(200));
				assert_eq!(source.path().to_string(), "access_token");
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn rejected_tokens_surface_endpoint_reason() {
		let err = map_json_response(response(
			StatusCode::UNAUTHORIZED,
			r#"{"error":"invalid_grant","error_description":"Refresh token expired"}"#,
		))
		.expect_err("401 from the refresh endpoint is a rejection.");

		match err {
			RefreshError::Rejected { reason, status } => {
				assert_eq!(reason, "Refresh token expired");
				assert_eq!(status, Some(401));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn throttling_is_transient_with_retry_hint() {
		let mut throttled = response(StatusCode::TOO_MANY_REQUESTS, "slow down");

		throttled.headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));

		match map_json_response(throttled).expect_err("429 must fail.") {
			RefreshError::Transient(TransientError::TokenEndpoint {
				message,
				status,
				retry_after,
			}) => {
				assert_eq!(message, "HTTP 429 Too Many Requests");
				assert_eq!(status, Some(429));
				assert_eq!(retry_after, Some(Duration::seconds(12)));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}
}
