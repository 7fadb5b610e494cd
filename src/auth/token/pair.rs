//! Access/refresh credential pair and the tokens minted by a refresh call.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Access/refresh token pair owned by a gateway's credential store.
///
/// A missing access token means the session is unauthenticated. An access token without a
/// refresh token is a valid session that cannot be renewed once the access token expires.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
	/// Bearer credential attached to outgoing requests.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access_token: Option<TokenSecret>,
	/// Credential exchanged for a fresh access token after a `401`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
}
impl TokenPair {
	/// Creates a pair from an access token and an optional refresh token.
	pub fn new(access_token: impl Into<TokenSecret>, refresh_token: Option<TokenSecret>) -> Self {
		Self { access_token: Some(access_token.into()), refresh_token }
	}

	/// Returns `true` if an access token is present.
	pub fn is_authenticated(&self) -> bool {
		self.access_token.is_some()
	}

	/// Returns `true` if neither token is present.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none()
	}

	/// Applies a refresh result, keeping the current refresh token when none was rotated.
	pub fn rotate(&self, refreshed: RefreshedTokens) -> Self {
		Self {
			access_token: Some(refreshed.access_token),
			refresh_token: refreshed.refresh_token.or_else(|| self.refresh_token.clone()),
		}
	}
}
impl Debug for TokenPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenPair")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Tokens returned by a successful refresh call.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
	/// Newly minted access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, if the endpoint issued one.
	pub refresh_token: Option<TokenSecret>,
}
impl RefreshedTokens {
	/// Creates a refresh result.
	pub fn new(access_token: impl Into<TokenSecret>, refresh_token: Option<TokenSecret>) -> Self {
		Self { access_token: access_token.into(), refresh_token }
	}
}
impl Debug for RefreshedTokens {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshedTokens")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}
