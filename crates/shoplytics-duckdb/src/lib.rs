pub mod backend;
pub mod criteria;
pub mod derivation;
pub mod lookup;
pub mod queries;
pub mod schema;
pub mod session;
mod tracking_impl;

pub use backend::DuckDbBackend;

/// Re-export the `duckdb` crate so consumers (especially tests) can use
/// `shoplytics_duckdb::duckdb::params!` without an extra dependency.
pub use duckdb;
