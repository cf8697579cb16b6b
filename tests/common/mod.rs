//! Fixtures shared by the login integration tests: a scripted browser, a recording transport,
//! and config helpers pointing at an `httpmock` provider.

#![allow(dead_code)]

// std
use std::{
	collections::HashMap,
	net::{Ipv4Addr, TcpListener as StdTcpListener},
	sync::Arc,
	time::Duration as StdDuration,
};
// crates.io
use httpmock::MockServer;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
// self
use oauth2_loopback::{
	BrowserLauncher, LoginConfig, RedirectTarget,
	flows::LaunchError,
	http::{HttpFuture, ReqwestHttpClient, TokenHttpClient},
	provider::ProviderDescriptor,
	reqwest::{Client, Error as ReqwestError, redirect::Policy},
	url::Url,
};

pub const CLIENT_ID: &str = "client-it";
pub const CALLBACK_PATH: &str = "/auth/callback";

/// Reqwest client that never goes through a system proxy, so loopback requests stay local.
///
/// Accepts the self-signed certificates `httpmock` serves its HTTPS endpoints with.
pub fn direct_client() -> Client {
	Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.no_proxy()
		.redirect(Policy::none())
		.build()
		.expect("Direct reqwest client should build.")
}

/// Finds a port that is free right now.
pub fn free_port() -> u16 {
	StdTcpListener::bind((Ipv4Addr::LOCALHOST, 0))
		.and_then(|listener| listener.local_addr())
		.expect("An ephemeral port should be available.")
		.port()
}

pub fn descriptor(server: &MockServer) -> ProviderDescriptor {
	ProviderDescriptor::builder()
		.authorization_endpoint(
			Url::parse(&server.url("/authorize")).expect("Mock authorize endpoint should parse."),
		)
		.token_endpoint(Url::parse(&server.url("/token")).expect("Mock token endpoint should parse."))
		.build()
		.expect("Mock descriptor should build.")
}

pub fn redirect_target(port: u16) -> RedirectTarget {
	RedirectTarget::new(port, CALLBACK_PATH)
		.and_then(|target| target.with_host("127.0.0.1"))
		.expect("Loopback target should be valid.")
}

pub fn config(descriptor: ProviderDescriptor, port: u16, timeout: StdDuration) -> LoginConfig {
	LoginConfig::builder(CLIENT_ID, descriptor)
		.redirect(redirect_target(port))
		.callback_timeout(timeout)
		.build()
		.expect("Login config should build.")
}

/// What the scripted browser sends back to the loopback listener.
#[derive(Clone, Debug)]
pub enum Redirect {
	/// `code` plus the state taken from the authorize URL.
	Code(&'static str),
	/// `code` plus a forged state.
	ForgedState { code: &'static str, state: &'static str },
	/// Provider error, echoing the real state.
	Error { error: &'static str, description: &'static str },
	/// Never follows the redirect.
	Nothing,
}

/// What the scripted browser observed.
#[derive(Clone, Debug, Default)]
pub struct BrowserOutcome {
	pub stray_status: Option<u16>,
	pub callback_status: Option<u16>,
	pub callback_body: String,
}

/// Browser stand-in that follows the redirect with a scripted query.
pub struct ScriptedBrowser {
	redirect: Redirect,
	stray_first: bool,
	authorize_url: Mutex<Option<Url>>,
	task: Mutex<Option<JoinHandle<BrowserOutcome>>>,
}
impl ScriptedBrowser {
	pub fn new(redirect: Redirect) -> Arc<Self> {
		Arc::new(Self {
			redirect,
			stray_first: false,
			authorize_url: Mutex::new(None),
			task: Mutex::new(None),
		})
	}

	/// Requests `/favicon.ico` on the listener before the real redirect.
	pub fn with_stray_request(redirect: Redirect) -> Arc<Self> {
		Arc::new(Self {
			redirect,
			stray_first: true,
			authorize_url: Mutex::new(None),
			task: Mutex::new(None),
		})
	}

	pub fn authorize_url(&self) -> Url {
		self.authorize_url.lock().clone().expect("The browser should have been launched.")
	}

	pub fn authorize_params(&self) -> HashMap<String, String> {
		self.authorize_url().query_pairs().into_owned().collect()
	}

	pub fn redirect_uri(&self) -> Url {
		Url::parse(&self.authorize_params()["redirect_uri"]).expect("Redirect URI should parse.")
	}

	/// Waits for the scripted requests to finish.
	pub async fn finish(&self) -> BrowserOutcome {
		let task = self.task.lock().take();

		match task {
			Some(task) => task.await.expect("Browser task should not panic."),
			None => BrowserOutcome::default(),
		}
	}
}
impl BrowserLauncher for ScriptedBrowser {
	fn launch(&self, authorize_url: &Url) -> Result<(), LaunchError> {
		*self.authorize_url.lock() = Some(authorize_url.clone());

		let params: HashMap<String, String> = authorize_url.query_pairs().into_owned().collect();
		let redirect_uri = Url::parse(&params["redirect_uri"])?;
		let mut callback = redirect_uri.clone();

		match &self.redirect {
			Redirect::Code(code) => {
				callback
					.query_pairs_mut()
					.append_pair("code", code)
					.append_pair("state", &params["state"]);
			},
			Redirect::ForgedState { code, state } => {
				callback.query_pairs_mut().append_pair("code", code).append_pair("state", state);
			},
			Redirect::Error { error, description } => {
				callback
					.query_pairs_mut()
					.append_pair("error", error)
					.append_pair("error_description", description)
					.append_pair("state", &params["state"]);
			},
			Redirect::Nothing => return Ok(()),
		}

		let stray = self.stray_first.then(|| {
			let mut stray = redirect_uri.clone();

			stray.set_path("/favicon.ico");

			stray
		});
		let task = tokio::spawn(async move {
			let client = direct_client();
			let mut outcome = BrowserOutcome::default();

			if let Some(stray) = stray {
				let response = client.get(stray).send().await.expect("Stray request should complete.");

				outcome.stray_status = Some(response.status().as_u16());
			}

			let response =
				client.get(callback).send().await.expect("Callback request should complete.");

			outcome.callback_status = Some(response.status().as_u16());
			outcome.callback_body = response.text().await.expect("Callback page should be readable.");

			outcome
		});

		*self.task.lock() = Some(task);

		Ok(())
	}
}

/// Transport that records every form it posts before delegating to reqwest.
pub struct RecordingHttpClient {
	inner: ReqwestHttpClient,
	forms: Mutex<Vec<HashMap<String, String>>>,
}
impl RecordingHttpClient {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			inner: ReqwestHttpClient::with_client(direct_client()),
			forms: Mutex::new(Vec::new()),
		})
	}

	pub fn calls(&self) -> usize {
		self.forms.lock().len()
	}

	pub fn forms(&self) -> Vec<HashMap<String, String>> {
		self.forms.lock().clone()
	}
}
impl TokenHttpClient for RecordingHttpClient {
	type TransportError = ReqwestError;

	fn post_form<'a>(
		&'a self,
		url: &'a Url,
		form: &'a [(&'a str, &'a str)],
	) -> HttpFuture<'a, Self::TransportError> {
		self.forms
			.lock()
			.push(form.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect());

		self.inner.post_form(url, form)
	}
}
