//! Periodic metrics publisher
//!
//! Publishes the listener's counters on the monitor subject once at start
//! and then every `stats_interval` until the listener stops.

use std::sync::Arc;
use std::time::SystemTime;

use spout_metrics::to_prometheus;
use tokio_util::sync::CancellationToken;

use crate::listener::Core;

pub(crate) async fn run(core: Arc<Core>, cancel: CancellationToken) {
    let labels = [
        ("component", "listener"),
        ("name", core.config.name.as_str()),
    ];

    loop {
        let lines = to_prometheus(&core.stats.snapshot(), SystemTime::now(), &labels);
        if let Err(e) = core.bus.publish(&core.config.monitor_subject, &lines).await {
            tracing::debug!(
                listener = %core.config.name,
                subject = %core.config.monitor_subject,
                error = %e,
                "failed to publish listener stats"
            );
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(core.config.stats_interval) => {}
        }
    }
}
