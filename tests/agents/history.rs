use std::sync::{Arc, Mutex, Weak};

use storyforge::agents::{MessageEvent, PromptMetadata};
use storyforge::llm::ChatTurn;
use storyforge::usage::{UsageMeter, default_pricing};
use storyforge::{AgentRole, AgentSessionRegistry, MessageRole};

use crate::backend_harness::ScriptedBackend;

fn registry_with(backend: &Arc<ScriptedBackend>) -> Arc<AgentSessionRegistry> {
    Arc::new(AgentSessionRegistry::new(Arc::clone(backend) as _, 0.7))
}

fn kinds_and_content(registry: &AgentSessionRegistry, role: AgentRole) -> Vec<(MessageRole, String)> {
    registry
        .get_history(role)
        .into_iter()
        .map(|message| (message.role, message.content))
        .collect()
}

#[tokio::test]
async fn get_agent_twice_primes_once() {
    let backend = Arc::new(ScriptedBackend::echoing());
    let registry = registry_with(&backend);
    let events = Arc::new(Mutex::new(Vec::<MessageEvent>::new()));
    let sink = Arc::clone(&events);
    let _sub = registry.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

    let first = registry.get_agent(AgentRole::Director, "echo-1", Some("Direct the film."), None);
    let second = registry.get_agent(AgentRole::Director, "echo-1", Some("Something else."), None);

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        kinds_and_content(&registry, AgentRole::Director),
        vec![(MessageRole::System, "Direct the film.".to_string())]
    );
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn history_follows_exchange_order() {
    let backend = Arc::new(ScriptedBackend::new(vec![Ok("reply A"), Ok("reply B")]));
    let registry = registry_with(&backend);
    let session = registry.get_agent(AgentRole::Screenwriter, "echo-1", Some("Write."), None);

    let a = registry
        .send_message(AgentRole::Screenwriter, &session, "A", None)
        .await
        .unwrap();
    let b = registry
        .send_message(AgentRole::Screenwriter, &session, "B", None)
        .await
        .unwrap();

    assert_eq!((a.as_str(), b.as_str()), ("reply A", "reply B"));
    assert_eq!(
        kinds_and_content(&registry, AgentRole::Screenwriter),
        vec![
            (MessageRole::System, "Write.".to_string()),
            (MessageRole::User, "A".to_string()),
            (MessageRole::Model, "reply A".to_string()),
            (MessageRole::User, "B".to_string()),
            (MessageRole::Model, "reply B".to_string()),
        ]
    );

    // The backend sees priming plus every earlier exchange.
    let seen = backend.seen();
    assert_eq!(seen[0].history.len(), 2);
    assert_eq!(
        seen[1].history[2..],
        [ChatTurn::user("A"), ChatTurn::model("reply A")]
    );
}

#[tokio::test]
async fn subscribers_run_in_order_and_see_the_recorded_message() {
    let backend = Arc::new(ScriptedBackend::new(vec![Ok("ok")]));
    let registry = registry_with(&backend);
    let log = Arc::new(Mutex::new(Vec::<String>::new()));

    let weak: Weak<AgentSessionRegistry> = Arc::downgrade(&registry);
    let first_log = Arc::clone(&log);
    let _first = registry.subscribe(move |event| {
        let registry = weak.upgrade().unwrap();
        let last = registry.get_history(event.role).pop().unwrap();
        assert_eq!(last.id, event.message.id);
        first_log
            .lock()
            .unwrap()
            .push(format!("first:{}", event.message.role));
    });
    let second_log = Arc::clone(&log);
    let _second = registry.subscribe(move |event| {
        second_log
            .lock()
            .unwrap()
            .push(format!("second:{}", event.message.role));
    });

    let session = registry.get_agent(AgentRole::Analyst, "echo-1", Some("Analyse."), None);
    registry
        .send_message(AgentRole::Analyst, &session, "shots?", None)
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "first:system",
            "second:system",
            "first:user",
            "second:user",
            "first:model",
            "second:model",
        ]
    );
}

#[tokio::test]
async fn failed_call_keeps_only_the_user_message() {
    let backend = Arc::new(ScriptedBackend::new(vec![Err("rate limited"), Ok("done")]));
    let registry = registry_with(&backend);
    let session = registry.get_agent(AgentRole::Designer, "echo-1", None, None);

    let err = registry
        .send_message(AgentRole::Designer, &session, "castle", None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "rate limited");
    assert!(!storyforge::error::is_cancellation(&err));
    assert_eq!(
        kinds_and_content(&registry, AgentRole::Designer),
        vec![(MessageRole::User, "castle".to_string())]
    );

    registry
        .send_message(AgentRole::Designer, &session, "castle again", None)
        .await
        .unwrap();
    let history = kinds_and_content(&registry, AgentRole::Designer);
    assert_eq!(history.len(), 3);
    assert_eq!(history[2], (MessageRole::Model, "done".to_string()));

    // The failed exchange never reached the backend-visible turns.
    assert!(session.turns().await.iter().all(|turn| turn.text != "castle"));
}

#[tokio::test]
async fn structured_replies_carry_data_and_prose_does_not() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Ok("```json\n{\"shots\": [1, 2]}\n```"),
        Ok("Just prose, no payload."),
    ]));
    let registry = registry_with(&backend);
    let session = registry.get_agent(AgentRole::Analyst, "echo-1", None, None);

    for text in ["break it down", "describe"] {
        registry
            .send_message(AgentRole::Analyst, &session, text, None)
            .await
            .unwrap();
    }

    let history = registry.get_history(AgentRole::Analyst);
    assert_eq!(history[1].data.as_ref().unwrap()["shots"][1], 2);
    assert!(history[3].data.is_none());
    assert_eq!(history[3].content, "Just prose, no payload.");
}

#[tokio::test]
async fn metadata_travels_with_the_user_message() {
    let backend = Arc::new(ScriptedBackend::echoing());
    let registry = registry_with(&backend);
    let session = registry.get_agent(
        AgentRole::Videographer,
        "echo-1",
        Some("Move the camera."),
        Some(PromptMetadata::for_model("echo-1").with_template("{{instruction}}")),
    );

    let metadata = PromptMetadata::for_model("echo-1")
        .with_template("Animate {{shot}}")
        .with_final_prompt("Animate shot 4, slower");
    registry
        .send_message(AgentRole::Videographer, &session, "Animate shot 4, slower", Some(metadata))
        .await
        .unwrap();

    let history = registry.get_history(AgentRole::Videographer);
    assert_eq!(history[0].dynamic_prompt.as_deref(), Some("{{instruction}}"));
    assert_eq!(history[1].dynamic_prompt.as_deref(), Some("Animate {{shot}}"));
    assert_eq!(history[1].final_prompt.as_deref(), Some("Animate shot 4, slower"));
    assert_eq!(history[2].model.as_deref(), Some("echo-1"));
}

#[tokio::test]
async fn injected_memory_is_recorded_and_sent_with_later_turns() {
    let backend = Arc::new(ScriptedBackend::echoing());
    let registry = registry_with(&backend);
    let session = registry.get_agent(AgentRole::Screenwriter, "echo-1", None, None);

    registry
        .inject_message(
            AgentRole::Screenwriter,
            storyforge::AgentMessage::new(
                AgentRole::Screenwriter,
                MessageRole::Model,
                "Scene 1 is already written: the storm.",
            ),
        )
        .await;
    registry
        .send_message(AgentRole::Screenwriter, &session, "Write scene 2", None)
        .await
        .unwrap();

    assert_eq!(
        kinds_and_content(&registry, AgentRole::Screenwriter),
        vec![
            (
                MessageRole::Model,
                "Scene 1 is already written: the storm.".to_string()
            ),
            (MessageRole::User, "Write scene 2".to_string()),
            (MessageRole::Model, "re: Write scene 2".to_string()),
        ]
    );
    assert_eq!(
        backend.seen()[0].history,
        vec![ChatTurn::model("Scene 1 is already written: the storm.")]
    );
}

#[tokio::test]
async fn concurrent_sends_on_one_session_keep_pairs_together() {
    let backend = Arc::new(ScriptedBackend::echoing());
    let registry = registry_with(&backend);
    let session = registry.get_agent(AgentRole::Reviewer, "echo-1", None, None);

    let mut tasks = Vec::new();
    for n in 0..6 {
        let registry = Arc::clone(&registry);
        let session = Arc::clone(&session);
        tasks.push(tokio::spawn(async move {
            registry
                .send_message(AgentRole::Reviewer, &session, &format!("note {n}"), None)
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let history = kinds_and_content(&registry, AgentRole::Reviewer);
    assert_eq!(history.len(), 12);
    for pair in history.chunks(2) {
        assert_eq!(pair[0].0, MessageRole::User);
        assert_eq!(pair[1], (MessageRole::Model, format!("re: {}", pair[0].1)));
    }
}

#[tokio::test]
async fn usage_is_metered_per_successful_call() {
    let backend = Arc::new(ScriptedBackend::new(vec![Ok("one"), Err("boom"), Ok("two")]));
    let meter = Arc::new(UsageMeter::new(default_pricing()));
    let registry = AgentSessionRegistry::new(Arc::clone(&backend) as _, 0.7)
        .with_usage(Arc::clone(&meter));
    let session = registry.get_agent(AgentRole::Director, "gpt-4o", None, None);

    for text in ["a", "b", "c"] {
        let _ = registry
            .send_message(AgentRole::Director, &session, text, None)
            .await;
    }

    let summary = meter.summary();
    assert_eq!(summary.record_count, 2);
    assert_eq!(summary.total_input_tokens, 6);
    assert_eq!(summary.total_output_tokens, 10);
    assert_eq!(meter.records()[0].label, "director");
}
