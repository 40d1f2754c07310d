pub mod config;
pub mod error;
pub mod event;
pub mod event_types;
pub mod payload;
pub mod rollup;
pub mod tracking;
