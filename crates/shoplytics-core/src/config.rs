use crate::event_types::EventTypes;
use crate::rollup::DEFAULT_TOP_ITEMS_LIMIT;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    pub duckdb_memory_limit: String,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
    pub top_items_limit: usize,
    pub event_types: EventTypes,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            data_dir: "./data".to_string(),
            duckdb_memory_limit: "1GB".to_string(),
            cors_origins: Vec::new(),
            top_items_limit: DEFAULT_TOP_ITEMS_LIMIT,
            event_types: EventTypes::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("SHOPLYTICS_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("SHOPLYTICS_DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string()),
            duckdb_memory_limit: std::env::var("SHOPLYTICS_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            cors_origins: std::env::var("SHOPLYTICS_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            top_items_limit: std::env::var("SHOPLYTICS_TOP_ITEMS_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_TOP_ITEMS_LIMIT),
            event_types: match std::env::var("SHOPLYTICS_EVENT_TYPES") {
                Ok(raw) => EventTypes::with_overrides(&raw).map_err(|e| e.to_string())?,
                Err(_) => EventTypes::default(),
            },
        })
    }

    pub fn db_path(&self) -> String {
        format!("{}/shoplytics.db", self.data_dir)
    }
}
