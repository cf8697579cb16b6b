//! Plain-value login configuration handed in by the surrounding command.
//!
//! Nothing here reads the environment; the CLI (or any other caller) resolves flags and
//! variables and passes the results through [`LoginConfig::builder`].

// self
use crate::{
	_prelude::*,
	auth::ScopeSet,
	error::ConfigError,
	provider::{ProviderDescriptor, is_loopback_host},
};

/// Default loopback port used by the original command-line tool.
pub const DEFAULT_REDIRECT_PORT: u16 = 3000;
/// Default callback path.
pub const DEFAULT_REDIRECT_PATH: &str = "/auth/callback";
/// Default bound on the callback wait.
pub const DEFAULT_CALLBACK_TIMEOUT: StdDuration = StdDuration::from_secs(5 * 60);

const RESERVED_AUTHORIZE_PARAMS: [&str; 7] = [
	"response_type",
	"client_id",
	"redirect_uri",
	"scope",
	"state",
	"code_challenge",
	"code_challenge_method",
];

/// Where the provider redirects the browser after authorization.
///
/// The host only shapes the redirect URI; the listener always binds loopback addresses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectTarget {
	/// Host written into the redirect URI (`localhost`, `127.0.0.1`, or `[::1]`).
	pub host: String,
	/// Port to bind; `0` asks the OS for a free port.
	pub port: u16,
	/// Callback path, starting with `/`.
	pub path: String,
}
impl RedirectTarget {
	/// Creates a `localhost` target after validating the path.
	pub fn new(port: u16, path: impl Into<String>) -> Result<Self> {
		let target = Self { host: "localhost".into(), port, path: path.into() };

		target.validate()?;

		Ok(target)
	}

	/// Parses a full redirect URI such as `http://localhost:3000/auth/callback`.
	pub fn from_uri(uri: &str) -> Result<Self> {
		let url = Url::parse(uri)
			.map_err(|e| ConfigError::invalid_redirect(format!("`{uri}` does not parse: {e}")))?;

		if url.scheme() != "http" {
			return Err(ConfigError::invalid_redirect("loopback redirects use plain http").into());
		}

		let host = url
			.host_str()
			.ok_or_else(|| ConfigError::invalid_redirect("redirect URI has no host"))?
			.to_owned();
		let port = url
			.port()
			.ok_or_else(|| ConfigError::invalid_redirect("redirect URI must name a port"))?;
		let target = Self { host, port, path: url.path().to_owned() };

		if url.query().is_some() || url.fragment().is_some() {
			return Err(ConfigError::invalid_redirect("redirect URI must not carry a query").into());
		}

		target.validate()?;

		Ok(target)
	}

	/// Overrides the host written into the redirect URI.
	pub fn with_host(mut self, host: impl Into<String>) -> Result<Self> {
		self.host = host.into();
		self.validate()?;

		Ok(self)
	}

	/// Builds the redirect URI for the port the listener actually bound.
	pub fn redirect_uri(&self, bound_port: u16) -> Result<Url> {
		let raw = format!("http://{}:{bound_port}{}", self.host, self.path);

		Url::parse(&raw)
			.map_err(|e| ConfigError::invalid_redirect(format!("`{raw}` does not parse: {e}")).into())
	}

	/// Checks the loopback host and path shape.
	pub fn validate(&self) -> Result<()> {
		if !self.path.starts_with('/') || self.path.contains(['?', '#', ' ']) {
			return Err(ConfigError::invalid_redirect(format!(
				"callback path `{}` must start with `/` and carry no query",
				self.path
			))
			.into());
		}

		let probe = Url::parse(&format!("http://{}/", self.host)).map_err(|e| {
			ConfigError::invalid_redirect(format!("host `{}` does not parse: {e}", self.host))
		})?;

		if !is_loopback_host(&probe) {
			return Err(ConfigError::invalid_redirect(format!(
				"host `{}` is not a loopback host",
				self.host
			))
			.into());
		}

		Ok(())
	}
}
impl Default for RedirectTarget {
	fn default() -> Self {
		Self {
			host: "localhost".into(),
			port: DEFAULT_REDIRECT_PORT,
			path: DEFAULT_REDIRECT_PATH.into(),
		}
	}
}

/// Everything one login needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginConfig {
	/// OAuth 2.0 public client identifier.
	pub client_id: String,
	/// Provider endpoints.
	pub descriptor: ProviderDescriptor,
	/// Loopback redirect target.
	pub redirect: RedirectTarget,
	/// Requested scopes.
	pub scopes: ScopeSet,
	/// Upper bound on the wait for the browser redirect.
	pub callback_timeout: StdDuration,
	/// Additional authorize parameters such as `prompt` or `login_hint`.
	#[serde(default)]
	pub extra_authorize_params: Vec<(String, String)>,
}
impl LoginConfig {
	/// Starts a builder with the original tool's defaults (port 3000, `/auth/callback`,
	/// `openid profile email`, five-minute timeout).
	pub fn builder(
		client_id: impl Into<String>,
		descriptor: ProviderDescriptor,
	) -> LoginConfigBuilder {
		LoginConfigBuilder::new(client_id.into(), descriptor)
	}

	/// Re-checks invariants; deserialized configs bypass the builder.
	pub fn validate(&self) -> Result<()> {
		if self.client_id.is_empty() || self.client_id.chars().any(char::is_whitespace) {
			return Err(ConfigError::InvalidClientId.into());
		}
		if self.callback_timeout.is_zero() {
			return Err(ConfigError::ZeroTimeout.into());
		}
		if let Some((key, _)) = self
			.extra_authorize_params
			.iter()
			.find(|(key, _)| RESERVED_AUTHORIZE_PARAMS.contains(&key.as_str()))
		{
			return Err(ConfigError::invalid_redirect(format!(
				"authorize parameter `{key}` is managed by the login flow"
			))
			.into());
		}

		self.redirect.validate()
	}
}

/// Builder for [`LoginConfig`].
#[derive(Clone, Debug)]
pub struct LoginConfigBuilder {
	config: LoginConfig,
}
impl LoginConfigBuilder {
	fn new(client_id: String, descriptor: ProviderDescriptor) -> Self {
		Self {
			config: LoginConfig {
				client_id,
				descriptor,
				redirect: RedirectTarget::default(),
				scopes: ScopeSet::oidc_default(),
				callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
				extra_authorize_params: Vec::new(),
			},
		}
	}

	/// Overrides the redirect target.
	pub fn redirect(mut self, redirect: RedirectTarget) -> Self {
		self.config.redirect = redirect;

		self
	}

	/// Overrides the requested scopes.
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.config.scopes = scopes;

		self
	}

	/// Overrides the callback timeout.
	pub fn callback_timeout(mut self, timeout: StdDuration) -> Self {
		self.config.callback_timeout = timeout;

		self
	}

	/// Appends an extra authorize parameter.
	pub fn authorize_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.config.extra_authorize_params.push((key.into(), value.into()));

		self
	}

	/// Validates and returns the configuration.
	pub fn build(self) -> Result<LoginConfig> {
		self.config.validate()?;

		Ok(self.config)
	}
}
