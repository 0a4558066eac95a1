use super::traits::{Observer, ObserverEvent, ObserverMetric};
use tracing::info;

/// Observer that emits `tracing` events.
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::ReviewModeChanged { enabled } => {
                info!(enabled = enabled, "review.mode");
            }
            ObserverEvent::ReviewQueued { id, title } => {
                info!(id = %id, title = %title, "review.queued");
            }
            ObserverEvent::ReviewResolved { id, edited } => {
                info!(id = %id, edited = edited, "review.resolved");
            }
            ObserverEvent::ReviewRejected { id } => {
                info!(id = %id, "review.rejected");
            }
            ObserverEvent::SessionCreated { role, primed } => {
                info!(role = %role, primed = primed, "session.created");
            }
            ObserverEvent::SessionReset { role } => {
                info!(role = %role, "session.reset");
            }
            ObserverEvent::BackendCall {
                role,
                model,
                duration,
                success,
            } => {
                let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                info!(role = %role, model = %model, duration_ms = ms, success = success, "backend.call");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::RequestLatency(d) => {
                let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
                info!(latency_ms = ms, "metric.request_latency");
            }
            ObserverMetric::TokensUsed(t) => {
                info!(tokens = t, "metric.tokens_used");
            }
            ObserverMetric::QueueDepth(d) => {
                info!(depth = d, "metric.queue_depth");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
