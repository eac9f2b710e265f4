use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub query: QueryConfig,
    pub export: ExportConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the proxied ADX REST backend, without the `/api` suffix.
    pub base_url: String,
    pub http_timeout_seconds: u64,
    /// Transient-failure retries performed by the HTTP middleware.
    pub max_retries: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            http_timeout_seconds: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Point cap applied to chart series; raw rows are kept for export.
    pub max_chart_points: usize,
    /// Window used when no explicit range is given.
    pub default_window_hours: u32,
    /// Parallel latest-value fetches during a snapshot.
    pub snapshot_concurrency: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_chart_points: 5000,
            default_window_hours: 24,
            snapshot_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub output_dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Where the access/refresh token pair is stored between invocations.
    pub file: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file: ".prosumer-session.json".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("PROSUMER__").split("__"));
        Ok(figment.extract()?)
    }
}
