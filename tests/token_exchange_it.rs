#![cfg(feature = "reqwest")]

mod common;

// crates.io
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use common::{direct_client, free_port};
use oauth2_loopback::{
	Error, ErrorKind, ScopeSet, TokenExchangeClient, error::TokenExchangeError,
	http::ReqwestHttpClient, url::Url,
};

const CLIENT_ID: &str = "client-exchange";
const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

fn client() -> TokenExchangeClient<ReqwestHttpClient> {
	TokenExchangeClient::<ReqwestHttpClient>::new(ReqwestHttpClient::with_client(direct_client()))
}

fn redirect_uri() -> Url {
	Url::parse("http://127.0.0.1:3000/auth/callback").expect("Redirect URI fixture should parse.")
}

async fn exchange_against(server: &MockServer) -> Result<oauth2_loopback::TokenResult, Error> {
	let endpoint = Url::parse(&server.url("/token")).expect("Mock token endpoint should parse.");

	client().exchange(&endpoint, CLIENT_ID, "code-1", VERIFIER, &redirect_uri()).await
}

#[tokio::test]
async fn form_post_yields_tokens() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"at\",\"id_token\":\"idt\",\"expires_in\":1800,\
				 \"token_type\":\"Bearer\",\"scope\":\"openid profile\"}",
			);
		})
		.await;
	let before = OffsetDateTime::now_utc();
	let tokens = exchange_against(&server).await.expect("Exchange should succeed.");

	mock.assert_async().await;

	// The mock serves TLS with a self-signed certificate.
	assert!(server.url("/token").starts_with("https://"));

	assert_eq!(tokens.access_token.expose(), "at");
	assert_eq!(tokens.id_token.as_ref().map(|token| token.expose()), Some("idt"));
	assert_eq!(tokens.token_type, "Bearer");
	assert_eq!(
		tokens.scope,
		Some("openid profile".parse::<ScopeSet>().expect("Scopes should parse."))
	);
	assert!(tokens.expires_at >= before + Duration::seconds(1800));
	assert!(tokens.expires_at <= OffsetDateTime::now_utc() + Duration::seconds(1800));
}

#[tokio::test]
async fn numeric_string_expires_in_is_accepted() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"at\",\"expires_in\":\"3599\",\"token_type\":\"Bearer\"}");
		})
		.await;

	let before = OffsetDateTime::now_utc();
	let tokens = exchange_against(&server).await.expect("Exchange should succeed.");

	assert!(tokens.expires_at >= before + Duration::seconds(3599));
}

#[tokio::test]
async fn malformed_success_body_is_a_token_exchange_failure() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":42,\"expires_in\":3600}");
		})
		.await;

	let err = exchange_against(&server).await.expect_err("Malformed body should fail.");

	assert_eq!(err.kind(), ErrorKind::TokenExchangeFailed);
	assert!(matches!(
		err,
		Error::TokenExchange(TokenExchangeError::MalformedResponse { status: 200, .. })
	));
}

#[tokio::test]
async fn missing_expires_in_is_rejected() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"at\",\"token_type\":\"Bearer\"}");
		})
		.await;

	let err = exchange_against(&server).await.expect_err("Missing expiry should fail.");

	assert!(matches!(err, Error::TokenExchange(TokenExchangeError::MissingExpiresIn)));
}

#[tokio::test]
async fn non_json_error_page_maps_to_http_status() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503)
				.header("content-type", "text/html")
				.body("<html><body>Service Unavailable</body></html>");
		})
		.await;

	let err = exchange_against(&server).await.expect_err("503 should fail.");

	let rejected = match err {
		Error::TokenExchange(rejected) => rejected,
		other => panic!("Unexpected error variant: {other:?}."),
	};

	assert_eq!(rejected.oauth_error(), Some("http_503"));
	assert!(matches!(rejected, TokenExchangeError::Rejected { status: 503, .. }));
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
	let endpoint = Url::parse(&format!("http://127.0.0.1:{}/token", free_port()))
		.expect("Dead endpoint should parse.");
	let err = client()
		.exchange(&endpoint, CLIENT_ID, "code-1", VERIFIER, &redirect_uri())
		.await
		.expect_err("Nothing listens on the port.");

	assert_eq!(err.kind(), ErrorKind::NetworkError);
}
