//! Per-attempt flow state and validation of the redirect the browser delivered.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, StateNonce},
	loopback::CallbackResult,
};

const MISSING_CODE: &str = "missing_code";

/// Per-attempt bookkeeping owned by one login.
#[derive(Clone, Debug)]
pub struct FlowState {
	/// CSRF nonce sent as `state`.
	pub state: StateNonce,
	/// Redirect URI sent in the authorize request and repeated in the token request.
	pub expected_redirect_uri: Url,
	/// Requested scopes.
	pub scopes: ScopeSet,
	/// When the attempt started.
	pub started_at: OffsetDateTime,
}
impl FlowState {
	/// Starts a new attempt with a fresh nonce.
	pub fn new(expected_redirect_uri: Url, scopes: ScopeSet) -> Self {
		Self {
			state: StateNonce::generate(),
			expected_redirect_uri,
			scopes,
			started_at: OffsetDateTime::now_utc(),
		}
	}

	/// Turns the callback into the authorization code, or the error that ends the flow.
	///
	/// Checks run in order: provider `error`, then `state`, then presence of `code`.
	pub fn validate_callback(&self, callback: CallbackResult) -> Result<String> {
		let CallbackResult { code, state, error, error_description } = callback;

		if let Some(error) = error {
			return Err(Error::AuthorizationDenied { error, description: error_description });
		}

		match state {
			Some(returned) if self.state.matches(&returned) => {},
			_ => return Err(Error::CsrfValidationFailed),
		}

		code.ok_or_else(|| Error::AuthorizationDenied {
			error: MISSING_CODE.into(),
			description: Some("The redirect carried neither a code nor an error".into()),
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::ErrorKind;

	fn flow() -> FlowState {
		let mut flow = FlowState::new(
			Url::parse("http://localhost:3000/auth/callback")
				.expect("Redirect fixture should parse."),
			ScopeSet::oidc_default(),
		);

		flow.state = StateNonce::from("expected".to_owned());

		flow
	}

	fn callback(query: &str) -> CallbackResult {
		CallbackResult::from_query(query)
	}

	#[test]
	fn matching_state_yields_the_code() {
		let code = flow()
			.validate_callback(callback("code=abc&state=expected"))
			.expect("Callback should validate.");

		assert_eq!(code, "abc");
	}

	#[test]
	fn provider_errors_are_denials() {
		let err = flow()
			.validate_callback(callback(
				"error=access_denied&error_description=User+cancelled&state=expected",
			))
			.expect_err("Error callback should fail.");

		assert_eq!(err.kind(), ErrorKind::AuthorizationDenied);
		assert_eq!(err.to_string(), "Authorization was denied: User cancelled.");
	}

	#[test]
	fn wrong_or_missing_state_is_a_csrf_failure() {
		for query in ["code=abc&state=WRONG", "code=abc"] {
			let err = flow().validate_callback(callback(query)).expect_err("State must match.");

			assert!(matches!(err, Error::CsrfValidationFailed));
		}
	}

	#[test]
	fn missing_code_is_a_denial() {
		let err =
			flow().validate_callback(callback("state=expected")).expect_err("Code is required.");

		match err {
			Error::AuthorizationDenied { error, .. } => assert_eq!(error, "missing_code"),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}
}
