//! The instrumented example resource.
//!
//! One `ExampleResource` is mounted per configured prefix. It owns its parity
//! queue and latency injector and records into either the shared registry or
//! one of its own.

pub mod handlers;
pub mod latency;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use primegauge_core::error::{PrimeGaugeError, Result};
use primegauge_core::prime::{self, Verdict};
use primegauge_core::ParityQueue;

use crate::config::ExampleSection;
use crate::obs::binders::bind_runtime_metrics;
use crate::obs::{MeterRegistry, Sample};

pub use handlers::routes;
pub use latency::LatencyInjector;

/// Wraps the primality test on the odd path.
pub const PRIME_CHECK_TIMER: &str = "example.prime.number.timer.milli";
/// Entry-to-answer sample, stopped on the prime/not-prime branches only.
pub const PRIME_SAMPLE_TIMER: &str = "prime.timer";
/// The bare trial division.
pub const TEST_PRIME_TIMER: &str = "example.test.prime.number.timer";
pub const PRIME_COUNTER: &str = "example.prime.number";
pub const EXAMPLE_GAUGE: &str = "quarkus_example";

pub const OUTCOME_TAG_KEY: &str = "type";
/// Misspelled key kept for not-prime outcomes when `legacy_not_prime_tag` is on.
pub const LEGACY_NOT_PRIME_TAG_KEY: &str = "typxe";

pub const GREETING: &str = "Hello from primegauge";

pub struct ExampleResource {
    prefix: String,
    registry: Arc<MeterRegistry>,
    queue: ParityQueue,
    latency: LatencyInjector,
    gauge_value: f64,
    legacy_not_prime_tag: bool,
    diagnostics: bool,
}

impl ExampleResource {
    pub fn builder(prefix: impl Into<String>) -> ExampleResourceBuilder {
        ExampleResourceBuilder::new(prefix)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn registry(&self) -> &Arc<MeterRegistry> {
        &self.registry
    }

    pub fn diagnostics(&self) -> bool {
        self.diagnostics
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Classify `number` and record the outcome.
    pub async fn check_if_prime(&self, number: i64) -> Result<String> {
        let timer = self.registry.timer(PRIME_CHECK_TIMER, &[]);
        let sample = Sample::start();

        // early answers leave `sample` unstopped
        if let Some(verdict) = prime::precheck(number) {
            self.count(verdict);
            return Ok(verdict.message(number));
        }

        let is_prime = timer.record_future(self.test_prime_number(number)).await?;
        let verdict = if is_prime { Verdict::Prime } else { Verdict::NotPrime };
        self.count(verdict);
        sample.stop(&self.registry.timer(PRIME_SAMPLE_TIMER, &[]));

        Ok(verdict.message(number))
    }

    /// Registers the example gauge, waits out the synthetic latency, then runs
    /// the trial division on the blocking pool.
    pub async fn test_prime_number(&self, number: i64) -> Result<bool> {
        let timer = self.registry.timer(TEST_PRIME_TIMER, &[]);
        self.registry.gauge(EXAMPLE_GAUGE, &[], self.gauge_value);

        self.latency.run(&self.registry).await;

        tokio::task::spawn_blocking(move || timer.record(|| prime::is_prime(number)))
            .await
            .map_err(|e| PrimeGaugeError::Internal(format!("primality test failed: {e}")))
    }

    /// Even input is queued and echoed; odd input pops the front or yields 0.
    pub fn check_list_size(&self, number: i64) -> i64 {
        self.queue.probe(number)
    }

    /// Log every registered meter, sorted by id. Returns the logged lines.
    pub fn print_meters(&self) -> Vec<String> {
        self.registry
            .meters()
            .iter()
            .map(|meter| {
                let line = meter.to_string();
                tracing::info!(prefix = %self.prefix, id = %meter.id(), "{line}");
                line
            })
            .collect()
    }

    fn count(&self, verdict: Verdict) {
        let key = if verdict == Verdict::NotPrime && self.legacy_not_prime_tag {
            LEGACY_NOT_PRIME_TAG_KEY
        } else {
            OUTCOME_TAG_KEY
        };
        self.registry
            .counter(PRIME_COUNTER, &[(key, verdict.tag_value())])
            .increment();
    }
}

pub struct ExampleResourceBuilder {
    prefix: String,
    registry: Option<Arc<MeterRegistry>>,
    options: ExampleSection,
    diagnostics: bool,
    bind_runtime_metrics: bool,
    interrupt: Option<watch::Receiver<bool>>,
}

impl ExampleResourceBuilder {
    fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            registry: None,
            options: ExampleSection::default(),
            diagnostics: false,
            bind_runtime_metrics: false,
            interrupt: None,
        }
    }

    /// Record into `registry`. Without one the resource builds its own.
    pub fn registry(mut self, registry: Arc<MeterRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn options(mut self, options: ExampleSection) -> Self {
        self.options = options;
        self
    }

    pub fn diagnostics(mut self, on: bool) -> Self {
        self.diagnostics = on;
        self
    }

    pub fn bind_runtime_metrics(mut self, on: bool) -> Self {
        self.bind_runtime_metrics = on;
        self
    }

    /// Channel whose `true` interrupts pending latency pauses.
    pub fn interrupt(mut self, rx: watch::Receiver<bool>) -> Self {
        self.interrupt = Some(rx);
        self
    }

    pub fn build(self) -> ExampleResource {
        let registry = self.registry.unwrap_or_else(|| Arc::new(MeterRegistry::new()));
        if self.bind_runtime_metrics {
            bind_runtime_metrics(&registry);
        }

        let mut latency = LatencyInjector::new(
            Duration::from_millis(self.options.simulated_latency_ms),
            self.options.simulated_latency_steps,
        );
        if let Some(rx) = self.interrupt {
            latency = latency.with_interrupt(rx);
        }

        ExampleResource {
            prefix: self.prefix,
            registry,
            queue: ParityQueue::new(),
            latency,
            gauge_value: self.options.gauge_value,
            legacy_not_prime_tag: self.options.legacy_not_prime_tag,
            diagnostics: self.diagnostics,
        }
    }
}
