use super::types::{PendingRequest, PendingRequestData, ReviewOutcome};
use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::events::{EventBus, Subscription};
use crate::observability::{NoopObserver, Observer, ObserverEvent, ObserverMetric};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Head notification: the request a reviewer should look at, or `None`
/// once the queue drained.
pub type HeadEvent = Option<PendingRequestData>;

/// Human approval gate for outgoing generation payloads.
///
/// With review mode off, [`ReviewGate::submit_for_review`] hands the payload
/// straight back. With it on, every submission is queued FIFO and its caller
/// waits until a reviewer settles that entry. Observers only ever see the
/// head of the queue.
pub struct ReviewGate {
    review_mode: AtomicBool,
    head_only: bool,
    queue: Mutex<VecDeque<PendingRequest>>,
    /// Id of the head last announced to observers. Queue mutations and this
    /// field are only touched inside the bus dispatch section.
    announced: Mutex<Option<String>>,
    heads: EventBus<HeadEvent>,
    observer: Arc<dyn Observer>,
}

impl ReviewGate {
    pub fn new(review_mode: bool) -> Self {
        Self {
            review_mode: AtomicBool::new(review_mode),
            head_only: true,
            queue: Mutex::new(VecDeque::new()),
            announced: Mutex::new(None),
            heads: EventBus::default().latest_only(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn from_config(config: &ReviewConfig, observer: Arc<dyn Observer>) -> Self {
        Self::new(config.enabled)
            .with_head_only(config.head_only)
            .with_observer(observer)
    }

    /// When `false`, any queued id may be settled, not just the head.
    #[must_use]
    pub fn with_head_only(mut self, head_only: bool) -> Self {
        self.head_only = head_only;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Affects later submissions only; queued requests stay queued.
    pub fn set_review_mode(&self, enabled: bool) {
        let previous = self.review_mode.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            info!(enabled, "review mode changed");
            self.observer
                .record_event(&ObserverEvent::ReviewModeChanged { enabled });
        }
    }

    pub fn review_mode(&self) -> bool {
        self.review_mode.load(Ordering::Acquire)
    }

    /// Passes `prompt` through the gate.
    ///
    /// Returns the prompt unchanged when review mode is off. Otherwise queues
    /// a new request and waits for a reviewer: approval yields the (possibly
    /// edited) payload, rejection yields [`ReviewError::Cancelled`].
    ///
    /// Dropping the returned future leaves the entry queued; settling it later
    /// reaches nobody.
    pub async fn submit_for_review(
        &self,
        prompt: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<String, ReviewError> {
        let prompt = prompt.into();
        if !self.review_mode() {
            return Ok(prompt);
        }

        let data = PendingRequestData {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            prompt,
        };
        let id = data.id.clone();
        let title = data.title.clone();
        let (responder, settled) = oneshot::channel();

        self.heads.publish_returning(|| {
            let ((), depth, head) = self.with_queue(|queue| {
                queue.push_back(PendingRequest {
                    data,
                    responder,
                });
            });
            debug!(id = %id, title = %title, queue_depth = depth, "queued for review");
            self.observer.record_event(&ObserverEvent::ReviewQueued {
                id: id.clone(),
                title: title.clone(),
            });
            self.record_depth(depth);
            (self.head_change(head), ())
        });

        match settled.await {
            Ok(ReviewOutcome::Approved(prompt)) => Ok(prompt),
            // A responder dropped unanswered counts as a rejection.
            Ok(ReviewOutcome::Rejected) | Err(_) => Err(ReviewError::Cancelled { id, title }),
        }
    }

    /// Registers a head observer. If the queue is non-empty the listener is
    /// handed the current head before this returns.
    pub fn subscribe_to_pending_requests<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&HeadEvent) + Send + Sync + 'static,
    {
        self.heads
            .subscribe_with_replay(listener, || self.current_request().map(Some))
    }

    /// Async head observer. Receives announcements made after this call.
    pub fn head_receiver(&self) -> broadcast::Receiver<HeadEvent> {
        self.heads.receiver()
    }

    /// Approves request `id` with `new_prompt`. Returns `false` (and logs)
    /// when there is no such request to settle.
    pub fn resolve_pending_request(&self, id: &str, new_prompt: impl Into<String>) -> bool {
        self.settle(id, ReviewOutcome::Approved(new_prompt.into()))
    }

    /// Rejects request `id`; its caller fails with a cancellation. Returns
    /// `false` (and logs) when there is no such request to settle.
    pub fn reject_pending_request(&self, id: &str) -> bool {
        self.settle(id, ReviewOutcome::Rejected)
    }

    pub fn settle(&self, id: &str, outcome: ReviewOutcome) -> bool {
        self.heads.publish_returning(|| {
            let (request, depth, head) = self.with_queue(|queue| self.take(queue, id));
            let Some(request) = request else {
                return (None, false);
            };
            self.finish(request, outcome);
            self.record_depth(depth);
            (self.head_change(head), true)
        })
    }

    fn finish(&self, request: PendingRequest, outcome: ReviewOutcome) {
        let event = match &outcome {
            ReviewOutcome::Approved(prompt) => ObserverEvent::ReviewResolved {
                id: request.data.id.clone(),
                edited: *prompt != request.data.prompt,
            },
            ReviewOutcome::Rejected => ObserverEvent::ReviewRejected {
                id: request.data.id.clone(),
            },
        };
        info!(
            id = %request.data.id,
            title = %request.data.title,
            rejected = outcome.is_rejected(),
            "review request settled"
        );

        if request.responder.send(outcome).is_err() {
            debug!(id = %request.data.id, "review caller went away before settlement");
        }
        self.observer.record_event(&event);
    }

    /// Rejects everything still queued, head first. Returns how many
    /// requests were settled.
    pub fn reject_all(&self) -> usize {
        self.heads.publish_returning(|| {
            let (drained, _, head) =
                self.with_queue(|queue| queue.drain(..).collect::<Vec<_>>());
            let count = drained.len();
            if count == 0 {
                return (None, 0);
            }
            for request in drained {
                self.finish(request, ReviewOutcome::Rejected);
            }
            info!(count, "rejected all pending review requests");
            self.record_depth(0);
            (self.head_change(head), count)
        })
    }

    /// Projection of the queue head.
    pub fn current_request(&self) -> Option<PendingRequestData> {
        self.lock_queue().front().map(|request| request.data.clone())
    }

    pub fn pending_count(&self) -> usize {
        self.lock_queue().len()
    }

    /// Applies `mutate` under the queue lock and returns its result with the
    /// resulting depth and head. Callers run inside the bus dispatch section.
    fn with_queue<F, R>(&self, mutate: F) -> (R, usize, HeadEvent)
    where
        F: FnOnce(&mut VecDeque<PendingRequest>) -> R,
    {
        let mut queue = self.lock_queue();
        let result = mutate(&mut queue);
        (result, queue.len(), queue.front().map(|request| request.data.clone()))
    }

    fn take(&self, queue: &mut VecDeque<PendingRequest>, id: &str) -> Option<PendingRequest> {
        let position = queue.iter().position(|request| request.data.id == id);
        match position {
            Some(0) => queue.pop_front(),
            Some(index) if !self.head_only => queue.remove(index),
            Some(index) => {
                warn!(id, position = index, "review request is not at the head; ignoring");
                None
            }
            None => {
                warn!(id, "no pending review request with this id; ignoring");
                None
            }
        }
    }

    /// The head to announce, or `None` when observers already have it. The
    /// head bus is latest-only, so a head settled during delivery is never
    /// handed to listeners that have not seen it yet.
    fn head_change(&self, head: HeadEvent) -> Option<HeadEvent> {
        let head_id = head.as_ref().map(|request| request.id.clone());
        let mut announced = self.announced.lock().unwrap_or_else(PoisonError::into_inner);
        if *announced == head_id {
            return None;
        }
        *announced = head_id;
        Some(head)
    }

    fn record_depth(&self, depth: usize) {
        self.observer.record_metric(&ObserverMetric::QueueDepth(
            u64::try_from(depth).unwrap_or(u64::MAX),
        ));
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<PendingRequest>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ReviewGate {
    fn default() -> Self {
        Self::new(false)
    }
}
