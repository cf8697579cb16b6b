//! Provider-facing descriptors.
//!
//! [`ProviderDescriptor`] carries the validated authorize and token endpoints, either derived
//! from an authority base URL or supplied explicitly through the builder.

pub mod descriptor;

pub use descriptor::*;
