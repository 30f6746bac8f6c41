//! Shared application state for the primegauge server.
//!
//! Builds the process-wide registry, one `ExampleResource` per configured
//! prefix and the HTTP request timing, and owns the shutdown channel that
//! interrupts pending latency pauses.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use primegauge_core::error::Result;

use crate::config::{RegistrySource, ServiceConfig};
use crate::obs::export::Publisher;
use crate::obs::http::HttpServerMetrics;
use crate::obs::MeterRegistry;
use crate::resource::ExampleResource;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ServiceConfig,
    registry: Arc<MeterRegistry>,
    resources: Vec<Arc<ExampleResource>>,
    http_metrics: Option<Arc<HttpServerMetrics>>,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Build application state from a validated config.
    pub fn new(cfg: ServiceConfig) -> Result<Self> {
        let common_tags = [("application", cfg.metrics.project_id.as_str())];
        let registry = Arc::new(MeterRegistry::with_common_tags(&common_tags));
        let (shutdown, _) = watch::channel(false);

        let bind_runtime = cfg.metrics.enabled && cfg.metrics.bind_runtime_metrics;
        let mut resources = Vec::with_capacity(cfg.resources.len());
        for r in &cfg.resources {
            let prefix = r.normalized_prefix();
            // dedicated series stay distinct from the shared ones in `/metrics`
            let resource_registry = match r.registry {
                RegistrySource::Shared => Arc::clone(&registry),
                RegistrySource::Dedicated => Arc::new(MeterRegistry::with_common_tags(&[
                    common_tags[0],
                    ("resource", prefix.as_str()),
                ])),
            };
            let resource = ExampleResource::builder(prefix.clone())
                .registry(resource_registry)
                .options(cfg.example.clone())
                .diagnostics(r.diagnostics)
                .bind_runtime_metrics(bind_runtime)
                .interrupt(shutdown.subscribe())
                .build();
            tracing::info!(
                prefix = %resource.prefix(),
                registry = ?r.registry,
                diagnostics = r.diagnostics,
                "example resource ready"
            );
            resources.push(Arc::new(resource));
        }

        let http_metrics = if cfg.metrics.enabled && cfg.metrics.http_server.enabled {
            Some(Arc::new(HttpServerMetrics::new(
                Arc::clone(&registry),
                &cfg.metrics.http_server.ignore_patterns,
            )?))
        } else {
            None
        };

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                resources,
                http_metrics,
                shutdown,
            }),
        })
    }

    pub fn cfg(&self) -> &ServiceConfig {
        &self.inner.cfg
    }

    pub fn metrics_enabled(&self) -> bool {
        self.inner.cfg.metrics.enabled
    }

    /// The process-wide registry.
    pub fn registry(&self) -> Arc<MeterRegistry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn resources(&self) -> &[Arc<ExampleResource>] {
        &self.inner.resources
    }

    pub fn resource(&self, prefix: &str) -> Option<Arc<ExampleResource>> {
        self.inner.resources.iter().find(|r| r.prefix() == prefix).cloned()
    }

    /// Every distinct registry: the shared one first, then dedicated ones.
    pub fn registries(&self) -> Vec<Arc<MeterRegistry>> {
        let mut out = vec![self.registry()];
        for r in &self.inner.resources {
            if !out.iter().any(|reg| Arc::ptr_eq(reg, r.registry())) {
                out.push(Arc::clone(r.registry()));
            }
        }
        out
    }

    pub fn http_metrics(&self) -> Option<Arc<HttpServerMetrics>> {
        self.inner.http_metrics.clone()
    }

    /// Periodic publisher, if metrics export is switched on.
    pub fn publisher(&self) -> Option<Publisher> {
        let m = &self.inner.cfg.metrics;
        if !(m.enabled && m.export.enabled && m.export.publish) {
            return None;
        }
        Some(Publisher::new(
            self.registries(),
            Duration::from_millis(m.export.interval_ms),
            m.project_id.clone(),
            m.resource_type.clone(),
        ))
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Interrupt pending latency pauses and stop the publisher.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }
}
