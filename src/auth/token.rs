//! Token results returned by the exchange and the redacting secret wrapper they carry.

pub mod result;
pub mod secret;
