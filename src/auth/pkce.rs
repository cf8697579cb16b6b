//! RFC 7636 proof key generation.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, error::ConfigError};

const PKCE_VERIFIER_LEN: usize = 64;
const PKCE_VERIFIER_MIN_LEN: usize = 43;
const PKCE_VERIFIER_MAX_LEN: usize = 128;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	#[default]
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}
impl Display for PkceCodeChallengeMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Verifier/challenge pair bound to one login attempt.
///
/// The verifier only leaves this value when the token exchange is built; `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct PkceParameters {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkceParameters {
	/// Generates a fresh verifier from the thread-local CSPRNG and derives its S256 challenge.
	pub fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);

		Self::derive(verifier)
	}

	/// Wraps an externally supplied verifier after checking the RFC 7636 length and alphabet.
	pub fn from_verifier(verifier: impl Into<String>) -> Result<Self> {
		let verifier = verifier.into();

		if !is_valid_verifier(&verifier) {
			return Err(ConfigError::InvalidPkceVerifier.into());
		}

		Ok(Self::derive(verifier))
	}

	/// Secret code verifier presented at the token endpoint. Callers must avoid logging it.
	pub fn verifier(&self) -> &str {
		&self.verifier
	}

	/// Code challenge sent on the authorize URL.
	pub fn challenge(&self) -> &str {
		&self.challenge
	}

	/// Challenge method (currently always `S256`).
	pub fn method(&self) -> PkceCodeChallengeMethod {
		self.method
	}

	fn derive(verifier: String) -> Self {
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}
impl Debug for PkceParameters {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkceParameters")
			.field("verifier", &"<redacted>")
			.field("challenge", &self.challenge)
			.field("method", &self.method)
			.finish()
	}
}

/// Returns `len` random alphanumeric characters drawn from the thread-local CSPRNG.
pub(crate) fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

/// Computes `base64url(sha256(verifier))` without padding.
pub fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	let digest = hasher.finalize();

	URL_SAFE_NO_PAD.encode(digest)
}

fn is_valid_verifier(verifier: &str) -> bool {
	(PKCE_VERIFIER_MIN_LEN..=PKCE_VERIFIER_MAX_LEN).contains(&verifier.len())
		&& verifier
			.bytes()
			.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}
