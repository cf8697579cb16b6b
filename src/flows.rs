//! Login orchestration: PKCE, listener, browser hand-off, callback validation, token exchange.

pub mod authorize;
pub mod state;

pub use authorize::*;
pub use state::*;

// self
use crate::{
	_prelude::*,
	auth::{PkceParameters, TokenResult},
	config::LoginConfig,
	http::TokenHttpClient,
	loopback::CallbackListener,
	oauth::TokenExchangeClient,
	obs::{self, FlowKind, FlowSpan, flow_event},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Boxed error returned by a [`BrowserLauncher`].
pub type LaunchError = Box<dyn StdError + Send + Sync>;

/// Hands the authorize URL to whatever shows it to the user.
///
/// A failed launch does not end the login: the listener keeps waiting so the user can open the
/// URL by hand.
pub trait BrowserLauncher
where
	Self: Send + Sync,
{
	/// Presents `authorize_url` to the user.
	fn launch(&self, authorize_url: &Url) -> Result<(), LaunchError>;
}

/// [`Authenticator`] specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestAuthenticator = Authenticator<ReqwestHttpClient>;

/// Runs Authorization Code + PKCE logins for one [`LoginConfig`].
///
/// Logins through the same authenticator are serialized: the loopback port belongs to one flow
/// at a time, so concurrent callers queue instead of failing to bind.
pub struct Authenticator<C>
where
	C: ?Sized + TokenHttpClient,
{
	config: LoginConfig,
	exchange: TokenExchangeClient<C>,
	launcher: Arc<dyn BrowserLauncher>,
	flow_guard: Arc<AsyncMutex<()>>,
}
impl<C> Authenticator<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates an authenticator over a caller-provided transport.
	pub fn with_http_client(
		config: LoginConfig,
		http_client: impl Into<Arc<C>>,
		launcher: Arc<dyn BrowserLauncher>,
	) -> Result<Self> {
		config.validate()?;

		Ok(Self {
			config,
			exchange: TokenExchangeClient::new(http_client),
			launcher,
			flow_guard: Default::default(),
		})
	}

	/// Configuration driving each login.
	pub fn config(&self) -> &LoginConfig {
		&self.config
	}

	/// Runs one login, bounded only by the configured callback timeout.
	pub async fn login(&self) -> Result<TokenResult> {
		self.login_until(std::future::pending()).await
	}

	/// Runs one login that ends with [`Error::Aborted`] as soon as `abort` resolves, whether the
	/// callback or the token exchange is pending.
	pub async fn login_until<A>(&self, abort: A) -> Result<TokenResult>
	where
		A: Future<Output = ()>,
	{
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "login");
		let result = span
			.instrument(async move {
				let _singleflight = self.flow_guard.lock().await;

				obs::record_flow_outcome(KIND, obs::FlowOutcome::Attempt);

				let result = self.run(std::pin::pin!(abort)).await;

				obs::record_flow_result(KIND, &result);

				result
			})
			.await;

		match &result {
			Ok(_) => flow_event!(info, "Login completed."),
			Err(e) => flow_event!(warn, kind = %e.kind(), error = %e, "Login failed."),
		}

		result
	}

	async fn run<A>(&self, mut abort: Pin<&mut A>) -> Result<TokenResult>
	where
		A: Future<Output = ()>,
	{
		let config = &self.config;
		let pkce = PkceParameters::generate();
		// Bound before the URL leaves this process; dropping it on any early return frees the port.
		let mut listener = CallbackListener::new(config.redirect.clone());

		listener.listen().await?;

		let flow = FlowState::new(listener.redirect_uri()?, config.scopes.clone());
		let authorize_url = build_authorize_url_with_params(
			&config.descriptor.endpoints.authorization,
			&config.client_id,
			&flow.expected_redirect_uri,
			&flow.scopes,
			&pkce,
			&flow.state,
			&config.extra_authorize_params,
		)?;

		flow_event!(
			info,
			redirect_uri = %flow.expected_redirect_uri,
			"Waiting for the browser sign-in."
		);

		if let Err(e) = self.launcher.launch(&authorize_url) {
			flow_event!(
				warn,
				error = %e,
				"Browser launch failed; the URL must be opened manually."
			);
		}

		let callback = listener.wait(config.callback_timeout, abort.as_mut()).await?;

		flow_event!(
			debug,
			elapsed_secs = (OffsetDateTime::now_utc() - flow.started_at).whole_seconds(),
			"Callback received."
		);

		let code = flow.validate_callback(callback)?;
		let exchange = self.exchange.exchange(
			&config.descriptor.endpoints.token,
			&config.client_id,
			&code,
			pkce.verifier(),
			&flow.expected_redirect_uri,
		);

		tokio::select! {
			result = exchange => result,
			_ = abort => {
				flow_event!(info, "Token exchange aborted.");

				Err(Error::Aborted)
			},
		}
	}
}
#[cfg(feature = "reqwest")]
impl Authenticator<ReqwestHttpClient> {
	/// Creates an authenticator with its own reqwest transport.
	pub fn new(config: LoginConfig, launcher: Arc<dyn BrowserLauncher>) -> Result<Self> {
		Self::with_http_client(config, ReqwestHttpClient::new()?, launcher)
	}
}
impl<C> Debug for Authenticator<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Authenticator").field("config", &self.config).finish()
	}
}

/// Runs a single login with the default reqwest transport.
#[cfg(feature = "reqwest")]
pub async fn login(
	config: LoginConfig,
	launcher: impl 'static + BrowserLauncher,
) -> Result<TokenResult> {
	Authenticator::new(config, Arc::new(launcher))?.login().await
}
