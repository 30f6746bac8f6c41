use std::collections::HashSet;
use std::net::SocketAddr;

use primegauge_core::error::{PrimeGaugeError, Result};
use serde::Deserialize;

use crate::obs::http::compile_ignore_patterns;

/// Paths owned by the ops endpoints.
const RESERVED_PREFIXES: [&str; 2] = ["/healthz", "/metrics"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub metrics: MetricsSection,

    #[serde(default)]
    pub example: ExampleSection,

    #[serde(default = "default_resources")]
    pub resources: Vec<ResourceConfig>,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PrimeGaugeError::UnsupportedVersion);
        }
        if self.resources.is_empty() {
            return Err(PrimeGaugeError::BadRequest("resources must not be empty".into()));
        }

        self.server.validate()?;
        self.metrics.validate()?;
        self.example.validate()?;

        let mut seen = HashSet::new();
        for r in &self.resources {
            r.validate()?;
            if RESERVED_PREFIXES.contains(&r.normalized_prefix().as_str()) {
                return Err(PrimeGaugeError::BadRequest(format!(
                    "resource prefix collides with an ops route: {}",
                    r.prefix
                )));
            }
            if !seen.insert(r.normalized_prefix()) {
                return Err(PrimeGaugeError::BadRequest(format!(
                    "duplicate resource prefix: {}",
                    r.prefix
                )));
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server.listen_addr()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            PrimeGaugeError::BadRequest(format!("server.listen must be a valid SocketAddr: {e}"))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Also the `application` common tag on every meter.
    #[serde(default = "default_project_id")]
    pub project_id: String,

    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(default = "default_true")]
    pub bind_runtime_metrics: bool,

    #[serde(default)]
    pub export: ExportSection,

    #[serde(default)]
    pub http_server: HttpServerSection,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            project_id: default_project_id(),
            resource_type: default_resource_type(),
            bind_runtime_metrics: true,
            export: ExportSection::default(),
            http_server: HttpServerSection::default(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(PrimeGaugeError::BadRequest(
                "metrics.project_id must not be empty".into(),
            ));
        }
        self.export.validate()?;
        compile_ignore_patterns(&self.http_server.ignore_patterns)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportSection {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub publish: bool,

    #[serde(default = "default_export_interval_ms")]
    pub interval_ms: u64,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            enabled: false,
            publish: true,
            interval_ms: default_export_interval_ms(),
        }
    }
}

impl ExportSection {
    pub fn validate(&self) -> Result<()> {
        if !(1000..=3_600_000).contains(&self.interval_ms) {
            return Err(PrimeGaugeError::BadRequest(
                "metrics.export.interval_ms must be between 1000 and 3600000".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpServerSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Full-path regexes excluded from `http.server.requests`.
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

impl Default for HttpServerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExampleSection {
    #[serde(default = "default_simulated_latency_ms")]
    pub simulated_latency_ms: u64,

    #[serde(default = "default_simulated_latency_steps")]
    pub simulated_latency_steps: u32,

    #[serde(default = "default_gauge_value")]
    pub gauge_value: f64,

    /// Tag not-prime outcomes with the historical `typxe` key so existing
    /// dashboards keep matching.
    #[serde(default = "default_true")]
    pub legacy_not_prime_tag: bool,
}

impl Default for ExampleSection {
    fn default() -> Self {
        Self {
            simulated_latency_ms: default_simulated_latency_ms(),
            simulated_latency_steps: default_simulated_latency_steps(),
            gauge_value: default_gauge_value(),
            legacy_not_prime_tag: true,
        }
    }
}

impl ExampleSection {
    pub fn validate(&self) -> Result<()> {
        if self.simulated_latency_ms > 60_000 {
            return Err(PrimeGaugeError::BadRequest(
                "example.simulated_latency_ms must be at most 60000".into(),
            ));
        }
        if self.simulated_latency_steps == 0 {
            return Err(PrimeGaugeError::BadRequest(
                "example.simulated_latency_steps must be at least 1".into(),
            ));
        }
        if !self.gauge_value.is_finite() {
            return Err(PrimeGaugeError::BadRequest(
                "example.gauge_value must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// Where a resource's meters live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrySource {
    /// The process-wide registry.
    #[default]
    Shared,
    /// A registry owned by this resource alone.
    Dedicated,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    pub prefix: String,

    #[serde(default)]
    pub registry: RegistrySource,

    /// Mount the greeting (`{prefix}/`) and meter dump (`{prefix}/print`).
    #[serde(default)]
    pub diagnostics: bool,
}

impl ResourceConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.prefix.starts_with('/') {
            return Err(PrimeGaugeError::BadRequest(format!(
                "resource prefix must start with '/': {}",
                self.prefix
            )));
        }
        if self.prefix.contains(':') || self.prefix.contains('*') {
            return Err(PrimeGaugeError::BadRequest(format!(
                "resource prefix must be a literal path: {}",
                self.prefix
            )));
        }
        Ok(())
    }

    /// Prefix without trailing slashes; the root becomes `/`.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.prefix.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_project_id() -> String {
    "fake-id".into()
}
fn default_resource_type() -> String {
    "global".into()
}
fn default_export_interval_ms() -> u64 {
    60_000
}
fn default_ignore_patterns() -> Vec<String> {
    vec!["/metrics".into(), "/healthz".into()]
}
fn default_simulated_latency_ms() -> u64 {
    3000
}
fn default_simulated_latency_steps() -> u32 {
    3
}
fn default_gauge_value() -> f64 {
    25.0
}
fn default_resources() -> Vec<ResourceConfig> {
    vec![
        ResourceConfig {
            prefix: "/example".into(),
            registry: RegistrySource::Dedicated,
            diagnostics: false,
        },
        ResourceConfig {
            prefix: "/".into(),
            registry: RegistrySource::Shared,
            diagnostics: true,
        },
    ]
}
