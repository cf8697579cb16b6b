//! Authorize URL construction for the Authorization Code + PKCE request.

// self
use crate::{
	_prelude::*,
	auth::{PkceParameters, ScopeSet, StateNonce},
	error::ConfigError,
	provider::{ProviderDescriptorError, is_loopback_host},
};

/// Builds the provider authorize URL for an Authorization Code + PKCE request.
///
/// Appends `response_type=code`, `client_id`, `redirect_uri`, `scope` (space-joined, omitted
/// when empty), `state`, `code_challenge`, and `code_challenge_method=S256`, keeping any query
/// the endpoint already carries.
pub fn build_authorize_url(
	authorization_endpoint: &Url,
	client_id: &str,
	redirect_uri: &Url,
	scopes: &ScopeSet,
	pkce: &PkceParameters,
	state: &StateNonce,
) -> Result<Url> {
	build_authorize_url_with_params(
		authorization_endpoint,
		client_id,
		redirect_uri,
		scopes,
		pkce,
		state,
		&[],
	)
}

/// Same as [`build_authorize_url`], then appends `extra` parameters (`prompt`, `login_hint`, …).
pub fn build_authorize_url_with_params(
	authorization_endpoint: &Url,
	client_id: &str,
	redirect_uri: &Url,
	scopes: &ScopeSet,
	pkce: &PkceParameters,
	state: &StateNonce,
	extra: &[(String, String)],
) -> Result<Url> {
	if authorization_endpoint.cannot_be_a_base() {
		return Err(ConfigError::InvalidAuthority {
			authority: authorization_endpoint.to_string(),
			source: None,
		}
		.into());
	}
	if authorization_endpoint.scheme() != "https"
		&& !(authorization_endpoint.scheme() == "http" && is_loopback_host(authorization_endpoint))
	{
		return Err(ConfigError::from(ProviderDescriptorError::InsecureEndpoint {
			endpoint: "authorization",
			url: authorization_endpoint.to_string(),
		})
		.into());
	}
	if client_id.is_empty() {
		return Err(ConfigError::InvalidClientId.into());
	}

	let mut url = authorization_endpoint.clone();

	url.set_fragment(None);

	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client_id);
	pairs.append_pair("redirect_uri", redirect_uri.as_str());

	if !scopes.is_empty() {
		pairs.append_pair("scope", &scopes.joined());
	}

	pairs.append_pair("state", state.as_str());
	pairs.append_pair("code_challenge", pkce.challenge());
	pairs.append_pair("code_challenge_method", pkce.method().as_str());

	for (key, value) in extra {
		pairs.append_pair(key, value);
	}

	drop(pairs);

	Ok(url)
}
