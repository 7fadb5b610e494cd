//! Request signing hook that attaches the gateway's access token to outbound requests.

// crates.io
use oauth2::http::{HeaderValue, header::AUTHORIZATION};
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError, http::GatewayRequest};

/// Describes how an access token is attached to an outbound request.
///
/// The gateway calls the signer on every dispatch, including replays after a refresh, so a
/// signer must overwrite any credential a previous attempt attached.
pub trait RequestSigner
where
	Self: Send + Sync,
{
	/// Injects authorization state derived from `access_token` into `request`.
	fn sign(&self, request: &mut GatewayRequest, access_token: &TokenSecret) -> Result<()>;
}

/// Default signer producing `Authorization: Bearer <token>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerSigner;
impl RequestSigner for BearerSigner {
	fn sign(&self, request: &mut GatewayRequest, access_token: &TokenSecret) -> Result<()> {
		let mut value = HeaderValue::try_from(format!("Bearer {}", access_token.expose()))
			.map_err(ConfigError::http_request)?;

		value.set_sensitive(true);
		request.headers.insert(AUTHORIZATION, value);

		Ok(())
	}
}
