//! Transport primitives for the token exchange.
//!
//! The module exposes [`TokenHttpClient`] so callers can plug in any HTTP stack (or a fake in
//! tests) while the exchange logic in [`crate::oauth`] stays transport-agnostic. The client only
//! needs one operation: POST a form and hand back the status and body.

// self
use crate::_prelude::*;

/// Boxed future returned by [`TokenHttpClient::post_form`].
pub type HttpFuture<'a, E> = Pin<Box<dyn Future<Output = Result<HttpReply, E>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of posting a token request.
///
/// Implementations must be `Send + Sync + 'static` so one client can be shared across logins,
/// and must not follow redirects: token endpoints answer directly.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends `form` as an `application/x-www-form-urlencoded` POST to `url`, asking for JSON.
	///
	/// Any HTTP status is a successful transport outcome; only failures to obtain a response
	/// are errors.
	fn post_form<'a>(
		&'a self,
		url: &'a Url,
		form: &'a [(&'a str, &'a str)],
	) -> HttpFuture<'a, Self::TransportError>;
}

/// Status and raw body of a token endpoint response.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpReply {
	/// HTTP status code.
	pub status: u16,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpReply {
	/// Creates a reply from a status and body.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, body: body.into() }
	}

	/// Returns true for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}
impl Debug for HttpReply {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		// Bodies of successful replies carry tokens.
		f.debug_struct("HttpReply")
			.field("status", &self.status)
			.field("body_len", &self.body.len())
			.finish()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Per-request timeout applied by [`ReqwestHttpClient::new`].
	pub const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

	/// Builds a client with redirects disabled and a request timeout.
	pub fn new() -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.timeout(Self::REQUEST_TIMEOUT)
			.build()
			.map_err(crate::error::ConfigError::http_client_build)?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`]; configure it to not follow redirects.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn post_form<'a>(
		&'a self,
		url: &'a Url,
		form: &'a [(&'a str, &'a str)],
	) -> HttpFuture<'a, Self::TransportError> {
		Box::pin(async move {
			let response = self
				.0
				.post(url.clone())
				.header(reqwest::header::ACCEPT, "application/json")
				.form(form)
				.send()
				.await?;
			let status = response.status().as_u16();
			let body = response.bytes().await?.to_vec();

			Ok(HttpReply { status, body })
		})
	}
}
