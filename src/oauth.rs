//! Authorization-code-for-token exchange (RFC 6749 §4.1.3 with the RFC 7636 verifier).

// std
use std::num::IntErrorKind;
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenResult},
	error::{TokenExchangeError, TransportError},
	http::{HttpReply, TokenHttpClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, flow_event},
};

const GRANT_TYPE: &str = "authorization_code";

/// One-shot token exchange client.
///
/// Performs exactly one POST per call; retry policy belongs to the caller.
pub struct TokenExchangeClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	http_client: Arc<C>,
}
impl<C> TokenExchangeClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a client over the provided transport.
	pub fn new(http_client: impl Into<Arc<C>>) -> Self {
		Self { http_client: http_client.into() }
	}

	/// Exchanges `code` and the PKCE `verifier` for tokens.
	///
	/// Sends `grant_type=authorization_code`, `code`, `redirect_uri`, `client_id`, and
	/// `code_verifier`. Non-2xx replies and unusable bodies fail with
	/// [`TokenExchangeError`]; transport failures fail with [`TransportError`].
	pub async fn exchange(
		&self,
		token_endpoint: &Url,
		client_id: &str,
		code: &str,
		verifier: &str,
		redirect_uri: &Url,
	) -> Result<TokenResult> {
		const KIND: FlowKind = FlowKind::TokenExchange;

		let span = FlowSpan::new(KIND, "exchange");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let form = [
					("grant_type", GRANT_TYPE),
					("code", code),
					("redirect_uri", redirect_uri.as_str()),
					("client_id", client_id),
					("code_verifier", verifier),
				];

				flow_event!(info, endpoint = %token_endpoint, "Exchanging authorization code.");

				let reply = self
					.http_client
					.post_form(token_endpoint, &form)
					.await
					.map_err(TransportError::network)?;

				flow_event!(debug, status = reply.status, "Token endpoint replied.");

				map_token_reply(reply, OffsetDateTime::now_utc())
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}
}
impl<C> Clone for TokenExchangeClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn clone(&self) -> Self {
		Self { http_client: self.http_client.clone() }
	}
}
impl<C> Debug for TokenExchangeClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenExchangeClient(..)")
	}
}

#[derive(Deserialize)]
struct TokenResponseBody {
	access_token: String,
	#[serde(default)]
	id_token: Option<String>,
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	expires_in: Option<ExpiresIn>,
	#[serde(default)]
	scope: Option<String>,
}

/// Some providers send `expires_in` as a numeric string.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
	Number(i64),
	Text(String),
}
impl ExpiresIn {
	fn seconds(&self) -> Result<i64, TokenExchangeError> {
		match self {
			Self::Number(secs) => Ok(*secs),
			Self::Text(raw) => raw.trim().parse::<i64>().map_err(|e| match e.kind() {
				IntErrorKind::PosOverflow | IntErrorKind::NegOverflow =>
					TokenExchangeError::ExpiresInOutOfRange,
				_ => TokenExchangeError::MalformedExpiresIn { value: raw.clone() },
			}),
		}
	}
}

#[derive(Default, Deserialize)]
struct ErrorResponseBody {
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}

fn map_token_reply(reply: HttpReply, received_at: OffsetDateTime) -> Result<TokenResult> {
	if !reply.is_success() {
		return Err(map_error_reply(&reply).into());
	}

	let mut de = serde_json::Deserializer::from_slice(&reply.body);
	let body: TokenResponseBody = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| TokenExchangeError::MalformedResponse { source, status: reply.status })?;
	let expires_in =
		body.expires_in.as_ref().ok_or(TokenExchangeError::MissingExpiresIn)?.seconds()?;

	if expires_in <= 0 {
		return Err(TokenExchangeError::NonPositiveExpiresIn.into());
	}
	// `time::Duration::seconds` panics beyond this bound.
	if expires_in > i64::MAX / 1_000_000_000 {
		return Err(TokenExchangeError::ExpiresInOutOfRange.into());
	}

	let mut builder = TokenResult::builder()
		.access_token(body.access_token)
		.issued_at(received_at)
		.expires_in(Duration::seconds(expires_in));

	if let Some(id_token) = body.id_token.filter(|token| !token.is_empty()) {
		builder = builder.id_token(id_token);
	}
	if let Some(token_type) = body.token_type {
		builder = builder.token_type(token_type);
	}
	if let Some(scope) = body.scope.and_then(|raw| ScopeSet::from_str(&raw).ok()) {
		builder = builder.scope(scope);
	}

	Ok(builder.build()?)
}

fn map_error_reply(reply: &HttpReply) -> TokenExchangeError {
	let parsed: ErrorResponseBody = serde_json::from_slice(&reply.body).unwrap_or_default();
	let error = parsed
		.error
		.filter(|value| !value.is_empty())
		.unwrap_or_else(|| format!("http_{}", reply.status));

	flow_event!(warn, status = reply.status, error = %error, "Token endpoint rejected the exchange.");

	TokenExchangeError::Rejected {
		error,
		description: parsed.error_description.filter(|value| !value.is_empty()),
		status: reply.status,
	}
}
