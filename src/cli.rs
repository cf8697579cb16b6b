//! `oauth2-loopback` command-line front end.
//!
//! Flags resolve into a [`LoginConfig`]; the binary loads `.env` ([`load_env_file`]), parses,
//! installs reporting, and calls [`run`].

// std
use std::{
	io::{self, Write},
	path::PathBuf,
	process::ExitCode,
};
// crates.io
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenResult},
	config::{DEFAULT_REDIRECT_PATH, DEFAULT_REDIRECT_PORT, LoginConfig, RedirectTarget},
	error::ConfigError,
	flows::{Authenticator, BrowserLauncher, LaunchError},
	provider::ProviderDescriptor,
};

const DEFAULT_LOG_FILTER: &str = "oauth2_loopback=info";

/// Loads a `.env` file from the working directory or one of its parents.
///
/// Variables already set in the environment win. A missing file is not an error.
pub fn load_env_file() -> Result<Option<PathBuf>, dotenvy::Error> {
	env_file_outcome(dotenvy::dotenv())
}

fn env_file_outcome(
	loaded: Result<PathBuf, dotenvy::Error>,
) -> Result<Option<PathBuf>, dotenvy::Error> {
	match loaded {
		Ok(path) => Ok(Some(path)),
		Err(e) if e.not_found() => Ok(None),
		Err(e) => Err(e),
	}
}

/// Top-level command line.
#[derive(Debug, Parser)]
#[command(version, about, rename_all = "kebab-case")]
pub struct Cli {
	/// Subcommand to run.
	#[command(subcommand)]
	pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
	/// Sign in through the system browser and print the issued access token.
	Login(LoginArgs),
}

/// How the issued tokens are written to stdout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Access token only.
	#[default]
	Text,
	/// Full token result as JSON.
	Json,
}

/// Flags of the `login` subcommand.
#[derive(Debug, Args)]
#[command(rename_all = "kebab-case")]
pub struct LoginArgs {
	/// Application (client) identifier registered with the provider.
	#[arg(long, env = "AZURE_APP_CLIENT_ID")]
	pub client_id: String,
	/// Directory (tenant) identifier; yields the Entra authority.
	#[arg(long, env = "AZURE_DIRECTORY_TENANT_ID")]
	pub tenant: Option<String>,
	/// Authority base URL; overrides `--tenant`.
	#[arg(long)]
	pub authority: Option<String>,
	/// Explicit authorization endpoint; overrides the authority.
	#[arg(long, requires = "token_endpoint")]
	pub authorize_endpoint: Option<Url>,
	/// Explicit token endpoint; overrides the authority.
	#[arg(long, requires = "authorize_endpoint")]
	pub token_endpoint: Option<Url>,
	/// Loopback port; `0` picks a free one (the provider must accept any port).
	#[arg(long, default_value_t = DEFAULT_REDIRECT_PORT)]
	pub port: u16,
	/// Callback path on the loopback listener.
	#[arg(long, default_value = DEFAULT_REDIRECT_PATH)]
	pub callback_path: String,
	/// Host written into the redirect URI.
	#[arg(long, default_value = "localhost")]
	pub redirect_host: String,
	/// Space-separated scopes.
	#[arg(long, default_value = "openid profile email")]
	pub scope: ScopeSet,
	/// Seconds to wait for the browser redirect.
	#[arg(long, default_value_t = 300)]
	pub timeout_secs: u64,
	/// Optional `prompt` authorize parameter (e.g. `select_account`).
	#[arg(long)]
	pub prompt: Option<String>,
	/// Print the authorize URL instead of opening a browser.
	#[arg(long)]
	pub no_browser: bool,
	/// Output format for the issued tokens.
	#[arg(long, value_enum, default_value_t)]
	pub output: OutputFormat,
}
impl LoginArgs {
	/// Resolves the flags into a validated [`LoginConfig`].
	pub fn to_config(&self) -> Result<LoginConfig> {
		let descriptor = self.descriptor()?;
		let redirect =
			RedirectTarget::new(self.port, &self.callback_path)?.with_host(&self.redirect_host)?;
		let mut builder = LoginConfig::builder(&self.client_id, descriptor)
			.redirect(redirect)
			.scopes(self.scope.clone())
			.callback_timeout(StdDuration::from_secs(self.timeout_secs));

		if let Some(prompt) = &self.prompt {
			builder = builder.authorize_param("prompt", prompt);
		}

		builder.build()
	}

	fn descriptor(&self) -> Result<ProviderDescriptor> {
		if let (Some(authorization), Some(token)) = (&self.authorize_endpoint, &self.token_endpoint)
		{
			return ProviderDescriptor::builder()
				.authorization_endpoint(authorization.clone())
				.token_endpoint(token.clone())
				.build()
				.map_err(|e| ConfigError::from(e).into());
		}
		if let Some(authority) = &self.authority {
			return ProviderDescriptor::from_authority(authority);
		}

		match &self.tenant {
			Some(tenant) => ProviderDescriptor::entra(tenant),
			None => Err(ConfigError::InvalidAuthority {
				authority: "<none: pass --tenant, --authority, or explicit endpoints>".into(),
				source: None,
			}
			.into()),
		}
	}
}

/// Opens the authorize URL in the default browser.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBrowser;
impl BrowserLauncher for SystemBrowser {
	fn launch(&self, authorize_url: &Url) -> Result<(), LaunchError> {
		eprintln!(
			"Opening the sign-in page in your browser. If nothing happens, open:\n{authorize_url}"
		);

		open::that(authorize_url.as_str()).map_err(Into::into)
	}
}

/// Prints the authorize URL for the user to open.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrintUrl;
impl BrowserLauncher for PrintUrl {
	fn launch(&self, authorize_url: &Url) -> Result<(), LaunchError> {
		eprintln!("Open this URL in a browser to sign in:\n{authorize_url}");

		Ok(())
	}
}

#[derive(Serialize)]
struct JsonOutput<'a> {
	access_token: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	id_token: Option<&'a str>,
	token_type: &'a str,
	#[serde(with = "time::serde::rfc3339")]
	expires_at: OffsetDateTime,
	#[serde(skip_serializing_if = "Option::is_none")]
	scope: Option<String>,
}
impl<'a> From<&'a TokenResult> for JsonOutput<'a> {
	fn from(tokens: &'a TokenResult) -> Self {
		Self {
			access_token: tokens.access_token.expose(),
			id_token: tokens.id_token.as_ref().map(|token| token.expose()),
			token_type: &tokens.token_type,
			expires_at: tokens.expires_at,
			scope: tokens.scope.as_ref().map(ScopeSet::joined),
		}
	}
}

/// Installs the stderr `tracing` subscriber (`RUST_LOG` overrides the default filter).
pub fn init_tracing() {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

	// A subscriber installed by an embedding process wins.
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init();
}

/// Runs the parsed command and maps login failures to their exit codes.
///
/// Only failures outside the login itself (writing the output) surface as `Err`.
pub async fn run(cli: Cli) -> color_eyre::Result<ExitCode> {
	match cli.command {
		Command::Login(args) => run_login(args).await,
	}
}

async fn run_login(args: LoginArgs) -> color_eyre::Result<ExitCode> {
	let tokens = match login(&args).await {
		Ok(tokens) => tokens,
		Err(e) => return Ok(report_failure(&e)),
	};
	let mut stdout = io::stdout().lock();

	write_tokens(&mut stdout, &tokens, args.output)?;
	stdout.flush()?;

	Ok(ExitCode::SUCCESS)
}

async fn login(args: &LoginArgs) -> Result<TokenResult> {
	let config = args.to_config()?;
	let launcher: Arc<dyn BrowserLauncher> =
		if args.no_browser { Arc::new(PrintUrl) } else { Arc::new(SystemBrowser) };
	let authenticator = Authenticator::new(config, launcher)?;
	let abort = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::warn!(error = %e, "Ctrl-C handler unavailable; only the timeout ends the wait.");
			std::future::pending::<()>().await;
		}
	};

	authenticator.login_until(abort).await
}

fn write_tokens(
	out: &mut impl Write,
	tokens: &TokenResult,
	format: OutputFormat,
) -> io::Result<()> {
	match format {
		OutputFormat::Text => writeln!(out, "{}", tokens.access_token.expose()),
		OutputFormat::Json => {
			serde_json::to_writer_pretty(&mut *out, &JsonOutput::from(tokens))?;

			writeln!(out)
		},
	}
}

fn report_failure(error: &Error) -> ExitCode {
	let mut message = format!("error: {error}");
	let mut source = error.source();

	while let Some(cause) = source {
		message.push_str(&format!("\n  caused by: {cause}"));
		source = cause.source();
	}

	eprintln!("{message}");

	ExitCode::from(error.kind().exit_code())
}

#[cfg(test)]
mod tests {
	// crates.io
	use clap::CommandFactory;
	// self
	use super::*;
	use crate::ErrorKind;

	fn parse(args: &[&str]) -> LoginArgs {
		let cli = Cli::try_parse_from(args).expect("Arguments should parse.");

		match cli.command {
			Command::Login(args) => args,
		}
	}

	#[test]
	fn env_file_is_optional_but_loaded_when_present() {
		let missing = std::env::temp_dir().join("oauth2-loopback-absent").join(".env");

		assert!(
			env_file_outcome(dotenvy::from_path(&missing).map(|()| missing.clone()))
				.expect("A missing file should be ignored.")
				.is_none()
		);

		let dir = std::env::temp_dir().join(format!("oauth2-loopback-env-{}", std::process::id()));
		let path = dir.join(".env");

		std::fs::create_dir_all(&dir).expect("Temp dir should be creatable.");
		std::fs::write(&path, "OAUTH2_LOOPBACK_ENV_FILE_CHECK=loaded\n")
			.expect("Env file should be writable.");

		let loaded = env_file_outcome(dotenvy::from_path(&path).map(|()| path.clone()))
			.expect("Env file should load.");

		assert_eq!(loaded.as_deref(), Some(path.as_path()));
		assert_eq!(
			std::env::var("OAUTH2_LOOPBACK_ENV_FILE_CHECK").as_deref(),
			Ok("loaded")
		);

		let _ = std::fs::remove_dir_all(&dir);
	}

	#[test]
	fn command_definition_is_consistent() {
		Cli::command().debug_assert();
	}

	#[test]
	fn tenant_yields_entra_endpoints_and_defaults() {
		let config =
			parse(&["oauth2-loopback", "login", "--client-id", "app", "--tenant", "contoso"])
				.to_config()
				.expect("Config should resolve.");

		assert_eq!(
			config.descriptor.endpoints.authorization.as_str(),
			"https://login.microsoftonline.com/contoso/oauth2/v2.0/authorize"
		);
		assert_eq!(
			config.descriptor.endpoints.token.as_str(),
			"https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
		);
		assert_eq!(config.redirect, RedirectTarget::default());
		assert_eq!(config.scopes.joined(), "openid profile email");
		assert_eq!(config.callback_timeout, StdDuration::from_secs(300));
	}

	#[test]
	fn explicit_endpoints_override_the_authority() {
		let args = parse(&[
			"oauth2-loopback",
			"login",
			"--client-id",
			"app",
			"--authority",
			"https://ignored.example.com/t",
			"--authorize-endpoint",
			"https://idp.example.com/authorize",
			"--token-endpoint",
			"https://idp.example.com/token",
			"--scope",
			"openid offline_access",
			"--prompt",
			"select_account",
			"--port",
			"0",
			"--output",
			"json",
		]);
		let config = args.to_config().expect("Config should resolve.");

		assert_eq!(config.descriptor.endpoints.token.as_str(), "https://idp.example.com/token");
		assert_eq!(config.scopes.joined(), "openid offline_access");
		assert_eq!(config.redirect.port, 0);
		assert_eq!(
			config.extra_authorize_params,
			vec![("prompt".to_owned(), "select_account".to_owned())]
		);
		assert_eq!(args.output, OutputFormat::Json);
	}

	#[test]
	fn missing_authority_is_a_configuration_error() {
		let err = parse(&["oauth2-loopback", "login", "--client-id", "app"])
			.to_config()
			.expect_err("No authority source should fail.");

		assert_eq!(err.kind(), ErrorKind::ConfigurationError);
		assert_eq!(err.kind().exit_code(), 2);
	}

	#[test]
	fn json_output_includes_expiry_and_id_token() {
		let tokens = TokenResult::builder()
			.access_token("access")
			.id_token("identity")
			.issued_at(time::macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token fixture should build.");
		let mut out = Vec::new();

		write_tokens(&mut out, &tokens, OutputFormat::Json).expect("JSON should be written.");

		let value: serde_json::Value = serde_json::from_slice(&out).expect("Output is JSON.");

		assert_eq!(value["access_token"], "access");
		assert_eq!(value["id_token"], "identity");
		assert_eq!(value["token_type"], "Bearer");
		assert_eq!(value["expires_at"], "2025-01-01T01:00:00Z");

		let mut out = Vec::new();

		write_tokens(&mut out, &tokens, OutputFormat::Text).expect("Text should be written.");

		assert_eq!(out, b"access\n");
	}
}
