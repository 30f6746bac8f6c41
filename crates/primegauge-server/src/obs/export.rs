//! Periodic metrics publisher.
//!
//! Renders every registry on a fixed step and ships the snapshot to the log
//! sink under the `primegauge::export` target. One last snapshot goes out when
//! shutdown is signalled.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::metrics::{render_all, MeterRegistry};

pub struct Publisher {
    registries: Vec<Arc<MeterRegistry>>,
    step: Duration,
    project_id: String,
    resource_type: String,
}

impl Publisher {
    pub fn new(
        registries: Vec<Arc<MeterRegistry>>,
        step: Duration,
        project_id: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            registries,
            step,
            project_id: project_id.into(),
            resource_type: resource_type.into(),
        }
    }

    /// Render and log one snapshot. Returns the number of meters published.
    pub fn publish(&self) -> usize {
        let mut body = String::new();
        let meters: usize = self.registries.iter().map(|r| r.len()).sum();
        render_all(&self.registries, &mut body);
        tracing::info!(
            target: "primegauge::export",
            project_id = %self.project_id,
            resource_type = %self.resource_type,
            meters,
            "published metrics snapshot"
        );
        tracing::debug!(target: "primegauge::export", "{body}");
        meters
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.step);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.publish();
                    }
                    stopped = async { shutdown.wait_for(|stop| *stop).await.is_ok() } => {
                        if stopped {
                            self.publish();
                        }
                        break;
                    }
                }
            }
            tracing::debug!(target: "primegauge::export", "publisher stopped");
        })
    }
}
