//! Test support: environment preparation, catalog seeding and a scriptable gateway double.
//! Compiled unconditionally so the integration suite runs under a plain `cargo test`.

#[cfg(feature = "sqlite")]
pub mod prepare_env;
#[cfg(feature = "sqlite")]
pub mod seed;
mod test_gateway;

pub use test_gateway::TestGateway;
