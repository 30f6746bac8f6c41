//! Synthetic latency so the example timers have something to measure.

use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::obs::MeterRegistry;

pub const LATENCY_TIMER: &str = "app.timer";

/// Waits `total` split over `steps` pauses and records the elapsed wall time
/// into `app.timer{type=ping}`.
///
/// Flipping the interrupt channel to `true` cuts the wait short. The
/// interruption is logged and the timer is recorded anyway.
#[derive(Debug, Clone)]
pub struct LatencyInjector {
    total: Duration,
    steps: u32,
    interrupt: Option<watch::Receiver<bool>>,
}

impl LatencyInjector {
    pub fn new(total: Duration, steps: u32) -> Self {
        Self {
            total,
            steps: steps.max(1),
            interrupt: None,
        }
    }

    pub fn with_interrupt(mut self, interrupt: watch::Receiver<bool>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    /// Returns the elapsed time that was recorded.
    pub async fn run(&self, registry: &MeterRegistry) -> Duration {
        let start = Instant::now();
        let timer = registry.timer(LATENCY_TIMER, &[("type", "ping")]);

        if !self.total.is_zero() {
            let pause = self.total / self.steps;
            let mut interrupt = self.interrupt.clone();
            for step in 0..self.steps {
                tracing::info!(step, "running example use case");
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = interrupted(interrupt.as_mut()) => {
                        tracing::warn!(step, "simulated latency interrupted");
                        break;
                    }
                }
            }
        }

        let elapsed = start.elapsed();
        timer.record_duration(elapsed);
        elapsed
    }
}

/// Resolves once the channel reads `true`. A missing or closed channel never
/// resolves.
async fn interrupted(rx: Option<&mut watch::Receiver<bool>>) {
    if let Some(rx) = rx {
        if rx.wait_for(|stop| *stop).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}
