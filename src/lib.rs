//! Command-line OAuth 2.0 Authorization Code + PKCE login over a one-shot loopback redirect
//! listener.
//!
//! The crate implements the client side of the flow from scratch: PKCE generation, the authorize
//! URL, a loopback listener that accepts exactly one redirect, and the code-for-token exchange.
//! [`flows::Authenticator`] sequences them and guarantees the listener is released on every
//! exit path.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
#[cfg(feature = "cli")] pub mod cli;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod loopback;
pub mod oauth;
pub mod obs;
pub mod provider;

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;

pub use auth::{PkceParameters, ScopeSet, StateNonce, TokenResult, TokenSecret};
pub use config::{LoginConfig, RedirectTarget};
pub use error::{Error, ErrorKind, Result};
#[cfg(feature = "reqwest")] pub use flows::login;
pub use flows::{Authenticator, BrowserLauncher, FlowState, build_authorize_url};
pub use loopback::{CallbackListener, CallbackResult, ListenerState, ListenerStatus, await_callback};
pub use oauth::TokenExchangeClient;
