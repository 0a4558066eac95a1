use std::time::Duration;

/// Events the observer can record
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    ReviewModeChanged {
        enabled: bool,
    },
    ReviewQueued {
        id: String,
        title: String,
    },
    ReviewResolved {
        id: String,
        edited: bool,
    },
    ReviewRejected {
        id: String,
    },
    SessionCreated {
        role: String,
        primed: bool,
    },
    SessionReset {
        role: String,
    },
    BackendCall {
        role: String,
        model: String,
        duration: Duration,
        success: bool,
    },
}

/// Numeric metrics
#[derive(Debug, Clone)]
pub enum ObserverMetric {
    RequestLatency(Duration),
    TokensUsed(u64),
    QueueDepth(u64),
}

/// Sink for gate and registry events and metrics.
pub trait Observer: Send + Sync {
    /// Record a discrete event
    fn record_event(&self, event: &ObserverEvent);

    /// Record a numeric metric
    fn record_metric(&self, metric: &ObserverMetric);

    /// Human-readable name of this observer
    fn name(&self) -> &str;
}
