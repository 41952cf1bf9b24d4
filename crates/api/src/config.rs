//! Process-wide configuration.
//!
//! Loaded from the environment once at startup; there is no refresh loop.
//! Changing a value means restarting the process.

/// Runtime configuration for the API server.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen address, e.g. "0.0.0.0:8080".
    pub bind_addr: String,
    /// Use the Postgres-backed movement log instead of the in-memory store.
    pub use_persistent_stores: bool,
    /// Postgres connection string; required when `use_persistent_stores`.
    pub database_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let use_persistent_stores = std::env::var("USE_PERSISTENT_STORES")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);
        let database_url = std::env::var("DATABASE_URL").ok();

        Self {
            bind_addr,
            use_persistent_stores,
            database_url,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            use_persistent_stores: false,
            database_url: None,
        }
    }
}
