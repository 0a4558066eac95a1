use std::sync::{Arc, Mutex, Weak};

use storyforge::{ReviewError, ReviewGate};
use tokio::task::JoinHandle;

use crate::backend_harness::{HeadRecorder, wait_for_pending};

type Caller = JoinHandle<Result<String, ReviewError>>;

fn submit(gate: &Arc<ReviewGate>, prompt: &str, title: &str) -> Caller {
    let gate = Arc::clone(gate);
    let prompt = prompt.to_string();
    let title = title.to_string();
    tokio::spawn(async move { gate.submit_for_review(prompt, title).await })
}

/// Submits in a fixed order: each request is queued before the next starts.
async fn submit_in_order(gate: &Arc<ReviewGate>, titles: &[&str]) -> Vec<Caller> {
    let mut callers = Vec::new();
    for title in titles {
        let depth = gate.pending_count();
        callers.push(submit(gate, &format!("{title} prompt"), title));
        wait_for_pending(gate, depth + 1).await;
    }
    callers
}

#[tokio::test]
async fn review_off_returns_prompt_without_queueing() {
    let gate = ReviewGate::new(false);
    let recorder = HeadRecorder::attach(&gate);

    for prompt in ["", "a plain prompt", "multi\nline\nprompt"] {
        let result = gate.submit_for_review(prompt, "Image").await.unwrap();
        assert_eq!(result, prompt);
    }

    assert_eq!(gate.pending_count(), 0);
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn concurrent_submissions_surface_one_head_at_a_time() {
    let gate = Arc::new(ReviewGate::new(true));
    let recorder = HeadRecorder::attach(&gate);
    let callers = submit_in_order(&gate, &["Scene 1", "Scene 2", "Scene 3", "Scene 4"]).await;

    // Only the first submission became head; the rest queued silently.
    assert_eq!(recorder.titles(), vec!["Scene 1"]);

    for n in 1..=4 {
        let head = gate.current_request().unwrap();
        assert_eq!(head.title, format!("Scene {n}"));
        assert_eq!(recorder.last(), Some(Some(head.clone())));
        assert!(gate.resolve_pending_request(&head.id, head.prompt.clone()));
    }

    assert_eq!(
        recorder.titles(),
        vec!["Scene 1", "Scene 2", "Scene 3", "Scene 4"]
    );
    assert_eq!(recorder.last(), Some(None));
    for (n, caller) in callers.into_iter().enumerate() {
        assert_eq!(caller.await.unwrap().unwrap(), format!("Scene {} prompt", n + 1));
    }
}

#[tokio::test]
async fn late_subscriber_is_handed_the_current_head() {
    let gate = Arc::new(ReviewGate::new(true));
    let callers = submit_in_order(&gate, &["Outline", "Scene 1", "Scene 2"]).await;

    let recorder = HeadRecorder::attach(&gate);
    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].as_ref().unwrap().title, "Outline");

    recorder.detach();
    assert_eq!(gate.reject_all(), 3);
    for caller in callers {
        assert!(caller.await.unwrap().unwrap_err().is_cancellation());
    }
}

#[tokio::test]
async fn subscribing_to_an_empty_queue_replays_nothing() {
    let gate = ReviewGate::new(true);
    let recorder = HeadRecorder::attach(&gate);
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn resolving_scene_one_advances_the_head_to_scene_two() {
    let gate = Arc::new(ReviewGate::new(true));
    let recorder = HeadRecorder::attach(&gate);
    let mut callers = submit_in_order(&gate, &["Scene 1", "Scene 2"]).await;

    let first = recorder.last().flatten().unwrap();
    assert_eq!(first.title, "Scene 1");

    assert!(gate.resolve_pending_request(&first.id, "Scene 1 EDITED"));
    let second = recorder.last().flatten().unwrap();
    assert_eq!(second.title, "Scene 2");

    let scene_two = callers.pop().unwrap();
    let scene_one = callers.pop().unwrap();
    assert_eq!(scene_one.await.unwrap().unwrap(), "Scene 1 EDITED");

    gate.reject_pending_request(&second.id);
    assert!(scene_two.await.unwrap().unwrap_err().is_cancellation());
}

#[tokio::test]
async fn listener_settling_inside_its_callback_keeps_order() {
    let gate = Arc::new(ReviewGate::new(true));
    let recorder = HeadRecorder::attach(&gate);
    let callers = submit_in_order(&gate, &["A", "B", "C"]).await;

    let weak: Weak<ReviewGate> = Arc::downgrade(&gate);
    let approver = gate.subscribe_to_pending_requests(move |head| {
        if let (Some(request), Some(gate)) = (head, weak.upgrade()) {
            gate.resolve_pending_request(&request.id, format!("{} ok", request.title));
        }
    });

    assert_eq!(gate.pending_count(), 0);
    assert_eq!(recorder.titles(), vec!["A", "B", "C"]);
    assert_eq!(recorder.last(), Some(None));
    for (caller, title) in callers.into_iter().zip(["A", "B", "C"]) {
        assert_eq!(caller.await.unwrap().unwrap(), format!("{title} ok"));
    }
    approver.unsubscribe();
}

#[tokio::test]
async fn later_listener_is_never_handed_a_head_settled_earlier_in_the_pass() {
    let gate = Arc::new(ReviewGate::new(true));

    let weak: Weak<ReviewGate> = Arc::downgrade(&gate);
    let approver = gate.subscribe_to_pending_requests(move |head| {
        if let (Some(request), Some(gate)) = (head, weak.upgrade()) {
            gate.resolve_pending_request(&request.id, format!("{} ok", request.title));
        }
    });

    let stale = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let watcher = {
        let weak: Weak<ReviewGate> = Arc::downgrade(&gate);
        let stale = Arc::clone(&stale);
        let seen = Arc::clone(&seen);
        gate.subscribe_to_pending_requests(move |head| {
            let Some(gate) = weak.upgrade() else {
                return;
            };
            let current = gate.current_request();
            if head.as_ref().map(|r| &r.id) != current.as_ref().map(|r| &r.id) {
                stale.lock().unwrap().push(format!(
                    "saw {:?} but head is {:?}",
                    head.as_ref().map(|r| r.title.clone()),
                    current.map(|r| r.title),
                ));
            }
            seen.lock().unwrap().push(head.as_ref().map(|r| r.title.clone()));
        })
    };

    assert_eq!(gate.submit_for_review("p1", "Scene 1").await.unwrap(), "Scene 1 ok");
    assert_eq!(gate.submit_for_review("p2", "Scene 2").await.unwrap(), "Scene 2 ok");

    let stale = stale.lock().unwrap().clone();
    assert!(stale.is_empty(), "watcher saw settled heads: {stale:?}");
    assert_eq!(*seen.lock().unwrap(), vec![None, None]);
    assert_eq!(gate.pending_count(), 0);

    watcher.unsubscribe();
    approver.unsubscribe();
}

#[tokio::test]
async fn async_receiver_follows_head_changes() {
    let gate = Arc::new(ReviewGate::new(true));
    let mut heads = gate.head_receiver();
    let callers = submit_in_order(&gate, &["one", "two"]).await;

    assert_eq!(heads.recv().await.unwrap().unwrap().title, "one");
    let id = gate.current_request().unwrap().id;
    gate.resolve_pending_request(&id, "1");
    assert_eq!(heads.recv().await.unwrap().unwrap().title, "two");

    gate.reject_all();
    assert!(heads.recv().await.unwrap().is_none());
    for caller in callers {
        let _ = caller.await.unwrap();
    }
}
