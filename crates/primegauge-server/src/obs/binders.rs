//! Runtime metric binders.
//!
//! Each binder registers a handful of function gauges once; the values are
//! read at observation time (render, dump, export). Readings come from
//! `/proc` where available and report `NaN` elsewhere.

use std::fs;
use std::time::Instant;

use super::metrics::MeterRegistry;

/// Something that installs meters into a registry.
pub trait MeterBinder: Send + Sync {
    fn bind_to(&self, registry: &MeterRegistry);
}

/// Pull a `kB`/count field out of `/proc/self/status`.
fn proc_status_field(field: &str) -> Option<f64> {
    let status = fs::read_to_string("/proc/self/status").ok()?;
    parse_status_field(&status, field)
}

fn parse_status_field(status: &str, field: &str) -> Option<f64> {
    let line = status.lines().find(|l| l.starts_with(field))?;
    let rest = line[field.len()..].trim_start_matches(':').trim();
    let mut parts = rest.split_whitespace();
    let value: f64 = parts.next()?.parse().ok()?;
    match parts.next() {
        Some("kB") => Some(value * 1024.0),
        _ => Some(value),
    }
}

fn load_average_1m() -> Option<f64> {
    let s = fs::read_to_string("/proc/loadavg").ok()?;
    s.split_whitespace().next()?.parse().ok()
}

/// `process.memory.resident` and `process.memory.virtual`, in bytes.
pub struct ProcessMemoryMetrics;

impl MeterBinder for ProcessMemoryMetrics {
    fn bind_to(&self, registry: &MeterRegistry) {
        registry.gauge_fn("process.memory.resident", &[("unit", "bytes")], || {
            proc_status_field("VmRSS").unwrap_or(f64::NAN)
        });
        registry.gauge_fn("process.memory.virtual", &[("unit", "bytes")], || {
            proc_status_field("VmSize").unwrap_or(f64::NAN)
        });
    }
}

/// `process.threads.live`.
pub struct ThreadMetrics;

impl MeterBinder for ThreadMetrics {
    fn bind_to(&self, registry: &MeterRegistry) {
        registry.gauge_fn("process.threads.live", &[], || {
            proc_status_field("Threads").unwrap_or(f64::NAN)
        });
    }
}

/// `system.cpu.count` and `system.load.average.1m`.
pub struct ProcessorMetrics;

impl MeterBinder for ProcessorMetrics {
    fn bind_to(&self, registry: &MeterRegistry) {
        registry.gauge_fn("system.cpu.count", &[], || {
            std::thread::available_parallelism()
                .map(|n| n.get() as f64)
                .unwrap_or(f64::NAN)
        });
        registry.gauge_fn("system.load.average.1m", &[], || {
            load_average_1m().unwrap_or(f64::NAN)
        });
    }
}

/// `process.uptime` in seconds, measured from when the binder was created.
pub struct UptimeMetrics {
    started: Instant,
}

impl UptimeMetrics {
    pub fn new() -> Self {
        Self { started: Instant::now() }
    }
}

impl Default for UptimeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterBinder for UptimeMetrics {
    fn bind_to(&self, registry: &MeterRegistry) {
        let started = self.started;
        registry.gauge_fn("process.uptime", &[("unit", "seconds")], move || {
            started.elapsed().as_secs_f64()
        });
    }
}

/// The fixed binder set every resource installs at construction.
pub fn runtime_binders() -> Vec<Box<dyn MeterBinder>> {
    vec![
        Box::new(ProcessMemoryMetrics),
        Box::new(ThreadMetrics),
        Box::new(ProcessorMetrics),
        Box::new(UptimeMetrics::new()),
    ]
}

pub fn bind_runtime_metrics(registry: &MeterRegistry) {
    for binder in runtime_binders() {
        binder.bind_to(registry);
    }
}
