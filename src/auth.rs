//! Auth-domain primitives: PKCE parameters, state nonces, scope sets, and token results.

pub mod pkce;
pub mod scope;
pub mod state;
pub mod token;

pub use pkce::*;
pub use scope::*;
pub use state::*;
pub use token::{result::*, secret::*};
