use std::sync::Arc;

use storyforge::error::is_cancellation;
use storyforge::observability::Observer;
use storyforge::{ReviewError, ReviewGate, ReviewOutcome};
use tokio::task::JoinHandle;

use crate::backend_harness::{HeadRecorder, RecordingObserver, wait_for_pending};

type Caller = JoinHandle<Result<String, ReviewError>>;

struct Harness {
    gate: Arc<ReviewGate>,
    observer: Arc<RecordingObserver>,
}

impl Harness {
    fn new(head_only: bool) -> Self {
        let observer = Arc::new(RecordingObserver::default());
        let sink: Arc<dyn Observer> = Arc::clone(&observer) as Arc<dyn Observer>;
        let gate = ReviewGate::new(true)
            .with_head_only(head_only)
            .with_observer(sink);
        Self {
            gate: Arc::new(gate),
            observer,
        }
    }

    /// Queues one request and returns its id with the waiting caller.
    async fn queue(&self, prompt: &str, title: &str) -> (String, Caller) {
        let depth = self.gate.pending_count();
        let caller = {
            let gate = Arc::clone(&self.gate);
            let prompt = prompt.to_string();
            let title = title.to_string();
            tokio::spawn(async move { gate.submit_for_review(prompt, title).await })
        };
        wait_for_pending(&self.gate, depth + 1).await;
        let id = self.observer.queued_ids().pop().unwrap();
        (id, caller)
    }
}

#[tokio::test]
async fn resolve_hands_the_caller_the_new_prompt() {
    let h = Harness::new(true);
    let (id, caller) = h.queue("a red fox", "Image").await;

    assert!(h.gate.resolve_pending_request(&id, "a red fox at dusk"));
    assert_eq!(caller.await.unwrap().unwrap(), "a red fox at dusk");
    assert_eq!(h.gate.pending_count(), 0);
}

#[tokio::test]
async fn reject_cancels_only_that_caller() {
    let h = Harness::new(true);
    let (first_id, first) = h.queue("p1", "Scene 1").await;
    let (second_id, second) = h.queue("p2", "Scene 2").await;

    assert!(h.gate.reject_pending_request(&first_id));
    assert_eq!(h.gate.pending_count(), 1);
    assert_eq!(
        first.await.unwrap().unwrap_err(),
        ReviewError::Cancelled {
            id: first_id,
            title: "Scene 1".into()
        }
    );

    assert_eq!(h.gate.current_request().unwrap().id, second_id);
    assert!(h.gate.resolve_pending_request(&second_id, "p2"));
    assert_eq!(second.await.unwrap().unwrap(), "p2");
}

#[tokio::test]
async fn late_resolution_of_a_settled_id_is_a_noop() {
    let h = Harness::new(true);
    let recorder = HeadRecorder::attach(&h.gate);
    let (id, caller) = h.queue("p", "Outline").await;

    assert!(h.gate.resolve_pending_request(&id, "first"));
    let notifications = recorder.events().len();

    assert!(!h.gate.resolve_pending_request(&id, "second"));
    assert!(!h.gate.reject_pending_request(&id));
    assert_eq!(caller.await.unwrap().unwrap(), "first");
    assert_eq!(recorder.events().len(), notifications);
}

#[tokio::test]
async fn cancellation_stays_recognisable_through_anyhow() {
    let h = Harness::new(true);
    let (id, caller) = h.queue("p", "Scene 9").await;
    assert!(h.gate.settle(&id, ReviewOutcome::Rejected));

    let err = anyhow::Error::from(caller.await.unwrap().unwrap_err()).context("writing scene 9");
    assert!(is_cancellation(&err));
    assert!(!is_cancellation(&anyhow::anyhow!("connection reset")));
}

#[tokio::test]
async fn head_only_gate_ignores_non_head_ids() {
    let h = Harness::new(true);
    let (head_id, first) = h.queue("p1", "Scene 1").await;
    let (second_id, second) = h.queue("p2", "Scene 2").await;

    assert!(!h.gate.resolve_pending_request(&second_id, "jumped"));
    assert!(!h.gate.reject_pending_request(&second_id));
    assert_eq!(h.gate.pending_count(), 2);
    assert_eq!(h.gate.current_request().unwrap().id, head_id);

    assert!(h.gate.resolve_pending_request(&head_id, "p1"));
    assert!(h.gate.resolve_pending_request(&second_id, "p2"));
    assert_eq!(first.await.unwrap().unwrap(), "p1");
    assert_eq!(second.await.unwrap().unwrap(), "p2");
}

#[tokio::test]
async fn permissive_gate_settles_out_of_order_without_reannouncing() {
    let h = Harness::new(false);
    let recorder = HeadRecorder::attach(&h.gate);
    let (head_id, first) = h.queue("p1", "Scene 1").await;
    let (second_id, second) = h.queue("p2", "Scene 2").await;
    assert_eq!(recorder.titles(), vec!["Scene 1"]);

    assert!(h.gate.resolve_pending_request(&second_id, "p2 edited"));
    assert_eq!(second.await.unwrap().unwrap(), "p2 edited");
    assert_eq!(recorder.titles(), vec!["Scene 1"]);
    assert_eq!(h.gate.current_request().unwrap().id, head_id);

    assert!(h.gate.resolve_pending_request(&head_id, "p1"));
    assert_eq!(first.await.unwrap().unwrap(), "p1");
    assert_eq!(recorder.last(), Some(None));
}

#[tokio::test]
async fn toggling_review_mode_only_affects_new_submissions() {
    let h = Harness::new(true);
    let (id, queued) = h.queue("held", "Scene 1").await;

    h.gate.set_review_mode(false);
    assert_eq!(
        h.gate.submit_for_review("direct", "Scene 2").await.unwrap(),
        "direct"
    );
    assert_eq!(h.gate.pending_count(), 1);

    assert!(h.gate.resolve_pending_request(&id, "held"));
    assert_eq!(queued.await.unwrap().unwrap(), "held");
}
