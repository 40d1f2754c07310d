use std::sync::Arc;

use shoplytics_core::config::Config;
use shoplytics_core::event_types::EventTypes;
use shoplytics_core::tracking::TrackingBackend;
use shoplytics_duckdb::DuckDbBackend;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    /// The DuckDB backend, kept concrete for the health probe.
    pub db: Arc<DuckDbBackend>,

    /// The same backend behind the trait the handlers talk to.
    pub tracking: Arc<dyn TrackingBackend>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let db = Arc::new(db);
        Self {
            tracking: Arc::clone(&db) as Arc<dyn TrackingBackend>,
            db,
            config: Arc::new(config),
        }
    }

    /// The type table the backend was opened with.
    pub fn event_types(&self) -> &EventTypes {
        self.db.event_types()
    }
}
