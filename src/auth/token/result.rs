//! Token result returned by a successful code exchange.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, token::secret::TokenSecret},
	error::TokenExchangeError,
};

/// Tokens issued for one login.
///
/// The crate never caches or persists this value; handing it to a store is the caller's job.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResult {
	/// Access token; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// OpenID Connect ID token, when the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<TokenSecret>,
	/// Token type as reported by the provider (usually `Bearer`).
	pub token_type: String,
	/// Local instant the response was received.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
	/// Expiry instant derived from `issued_at + expires_in`.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
	/// Scopes the provider reported as granted, when echoed back.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<ScopeSet>,
}
impl TokenResult {
	/// Returns a builder for assembling a result from a token endpoint response.
	pub fn builder() -> TokenResultBuilder {
		TokenResultBuilder::default()
	}

	/// Returns `true` if the access token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Remaining lifetime at the provided instant (zero once expired).
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for TokenResult {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResult")
			.field("access_token", &"<redacted>")
			.field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("scope", &self.scope)
			.finish()
	}
}

/// Builder for [`TokenResult`].
#[derive(Clone, Debug, Default)]
pub struct TokenResultBuilder {
	access_token: Option<TokenSecret>,
	id_token: Option<TokenSecret>,
	token_type: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	scope: Option<ScopeSet>,
}
impl TokenResultBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the ID token value.
	pub fn id_token(mut self, token: impl Into<String>) -> Self {
		self.id_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the token type; defaults to `Bearer`.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets the issued-at instant; defaults to the current clock.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets the relative lifetime reported by `expires_in`.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Records the granted scopes.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Consumes the builder and produces a [`TokenResult`].
	pub fn build(self) -> Result<TokenResult, TokenExchangeError> {
		let access_token = self
			.access_token
			.filter(|token| !token.is_empty())
			.ok_or(TokenExchangeError::EmptyAccessToken)?;
		let expires_in = self.expires_in.ok_or(TokenExchangeError::MissingExpiresIn)?;

		if !expires_in.is_positive() {
			return Err(TokenExchangeError::NonPositiveExpiresIn);
		}

		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at =
			issued_at.checked_add(expires_in).ok_or(TokenExchangeError::ExpiresInOutOfRange)?;

		Ok(TokenResult {
			access_token,
			id_token: self.id_token,
			token_type: self.token_type.unwrap_or_else(|| "Bearer".into()),
			issued_at,
			expires_at,
			scope: self.scope,
		})
	}
}
