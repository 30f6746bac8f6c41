//! Observability: the meter registry, runtime binders, HTTP request timing
//! and the periodic publisher.
//!
//! `/metrics` renders the registries in Prometheus text format; the publisher
//! pushes the same rendering to the log sink on a fixed step.

pub mod binders;
pub mod export;
pub mod http;
pub mod metrics;

pub use metrics::{Counter, Gauge, Meter, MeterId, MeterRegistry, Sample, Timer};
