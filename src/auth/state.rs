//! CSRF `state` nonces round-tripped through the authorization redirect.

// crates.io
use subtle::ConstantTimeEq;
// self
use crate::{_prelude::*, auth::pkce};

const STATE_LEN: usize = 32;

/// Opaque random nonce bound to one login attempt.
///
/// The nonce is independent from the PKCE verifier; comparing it against the returned `state`
/// runs in constant time.
#[derive(Clone, PartialEq, Eq)]
pub struct StateNonce(String);
impl StateNonce {
	/// Generates a fresh 32-character alphanumeric nonce.
	pub fn generate() -> Self {
		Self(pkce::random_string(STATE_LEN))
	}

	/// Returns the nonce as sent on the authorize URL.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns true when `returned` carries exactly this nonce.
	pub fn matches(&self, returned: &str) -> bool {
		self.0.as_bytes().ct_eq(returned.as_bytes()).into()
	}
}
impl AsRef<str> for StateNonce {
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}
impl Debug for StateNonce {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("StateNonce").field(&self.0).finish()
	}
}
impl From<String> for StateNonce {
	fn from(value: String) -> Self {
		Self(value)
	}
}
