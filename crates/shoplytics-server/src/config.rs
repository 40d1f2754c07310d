/// Re-export `Config` from `shoplytics-core` for use within this crate.
///
/// All environment-variable parsing lives in `shoplytics-core` so it can be
/// shared with integration tests without depending on the full server.
pub use shoplytics_core::config::Config;
