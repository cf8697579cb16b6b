//! Provider descriptor data structures and authority helpers.
//!
//! The module exposes validated endpoint metadata plus builder utilities so a login can target
//! any provider that speaks the standard authorization-code grant.

/// Builder API for assembling provider descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Host used by [`ProviderDescriptor::entra`].
pub const ENTRA_LOGIN_HOST: &str = "https://login.microsoftonline.com";

const AUTHORIZE_SUFFIX: &str = "oauth2/v2.0/authorize";
const TOKEN_SUFFIX: &str = "oauth2/v2.0/token";

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint the browser is sent to.
	pub authorization: Url,
	/// Token endpoint used for the code exchange.
	pub token: Url,
}

/// Immutable provider descriptor consumed by the login flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Authority base URL the endpoints were derived from, when known.
	pub authority: Option<Url>,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
}
impl ProviderDescriptor {
	/// Creates a new builder for explicitly configured endpoints.
	pub fn builder() -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::default()
	}

	/// Derives endpoints from an authority base URL.
	///
	/// `https://login.example.com/tenant` yields
	/// `https://login.example.com/tenant/oauth2/v2.0/authorize` and the matching `token` URL.
	pub fn from_authority(authority: &str) -> Result<Self> {
		let invalid = |source| ConfigError::InvalidAuthority {
			authority: authority.to_owned(),
			source,
		};
		let mut base = Url::parse(authority.trim()).map_err(|e| invalid(Some(e)))?;

		if base.cannot_be_a_base() || base.query().is_some() || base.fragment().is_some() {
			return Err(invalid(None).into());
		}
		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());

			base.set_path(&path);
		}

		let authorization = base.join(AUTHORIZE_SUFFIX).map_err(|e| invalid(Some(e)))?;
		let token = base.join(TOKEN_SUFFIX).map_err(|e| invalid(Some(e)))?;
		let mut descriptor = Self::builder()
			.authorization_endpoint(authorization)
			.token_endpoint(token)
			.build()
			.map_err(ConfigError::from)?;

		descriptor.authority = Some(base);

		Ok(descriptor)
	}

	/// Descriptor for a Microsoft Entra tenant (`https://login.microsoftonline.com/{tenant}`).
	pub fn entra(tenant: &str) -> Result<Self> {
		if tenant.is_empty() || tenant.contains(|c: char| c.is_whitespace() || c == '/') {
			return Err(ConfigError::InvalidAuthority {
				authority: format!("{ENTRA_LOGIN_HOST}/{tenant}"),
				source: None,
			}
			.into());
		}

		Self::from_authority(&format!("{ENTRA_LOGIN_HOST}/{tenant}"))
	}
}
