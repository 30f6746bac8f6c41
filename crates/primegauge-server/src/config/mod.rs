//! Service config loader (strict parsing).

pub mod schema;

use std::fs;

use primegauge_core::error::{PrimeGaugeError, Result};

pub use schema::{
    ExampleSection, ExportSection, HttpServerSection, MetricsSection, RegistrySource,
    ResourceConfig, ServerSection, ServiceConfig,
};

/// Env var naming the config file; falls back to [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_PATH_ENV: &str = "PRIMEGAUGE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "primegauge.yaml";

pub fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

pub fn load_from_file(path: &str) -> Result<ServiceConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| PrimeGaugeError::Internal(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ServiceConfig> {
    let cfg: ServiceConfig = serde_yaml::from_str(s)
        .map_err(|e| PrimeGaugeError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
