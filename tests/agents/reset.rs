use std::sync::{Arc, Mutex};

use storyforge::error::SessionError;
use storyforge::{AgentRole, AgentSessionRegistry, MessageRole};

use crate::backend_harness::ScriptedBackend;

fn registry(backend: &Arc<ScriptedBackend>) -> AgentSessionRegistry {
    AgentSessionRegistry::new(Arc::clone(backend) as _, 0.7)
}

#[tokio::test]
async fn reset_clears_history_and_next_get_agent_reprimes() {
    let backend = Arc::new(ScriptedBackend::echoing());
    let registry = registry(&backend);
    let primed = Arc::new(Mutex::new(0_usize));
    let counter = Arc::clone(&primed);
    let _sub = registry.subscribe(move |event| {
        if event.message.role == MessageRole::System {
            *counter.lock().unwrap() += 1;
        }
    });

    let old = registry.get_agent(AgentRole::Director, "echo-1", Some("Direct."), None);
    for text in ["first idea", "second idea"] {
        registry
            .send_message(AgentRole::Director, &old, text, None)
            .await
            .unwrap();
    }
    assert_eq!(registry.get_history(AgentRole::Director).len(), 5);

    registry.reset_memory(AgentRole::Director);
    assert!(registry.get_history(AgentRole::Director).is_empty());
    assert!(registry.session(AgentRole::Director).is_none());

    let fresh = registry.get_agent(AgentRole::Director, "echo-1", Some("Direct."), None);
    assert!(!Arc::ptr_eq(&old, &fresh));
    let history = registry.get_history(AgentRole::Director);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, MessageRole::System);
    assert_eq!(*primed.lock().unwrap(), 2);

    // Only the priming exchange survives into the new conversation.
    registry
        .send_message(AgentRole::Director, &fresh, "third idea", None)
        .await
        .unwrap();
    assert_eq!(backend.seen().last().unwrap().history.len(), 2);
}

#[tokio::test]
async fn handle_from_before_reset_is_stale() {
    let backend = Arc::new(ScriptedBackend::echoing());
    let registry = registry(&backend);
    let old = registry.get_agent(AgentRole::Screenwriter, "echo-1", None, None);

    registry.reset_memory(AgentRole::Screenwriter);
    let _fresh = registry.get_agent(AgentRole::Screenwriter, "echo-1", None, None);

    let err = registry
        .send_message(AgentRole::Screenwriter, &old, "hello?", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SessionError>(),
        Some(SessionError::Stale { .. })
    ));
    assert!(registry.get_history(AgentRole::Screenwriter).is_empty());
    assert!(backend.seen().is_empty());
}

#[tokio::test]
async fn reset_leaves_other_roles_alone() {
    let backend = Arc::new(ScriptedBackend::echoing());
    let registry = registry(&backend);
    let _director = registry.get_agent(AgentRole::Director, "echo-1", Some("Direct."), None);
    let _designer = registry.get_agent(AgentRole::Designer, "echo-1", Some("Design."), None);

    registry.reset_memory(AgentRole::Director);
    registry.reset_memory(AgentRole::Videographer);

    assert_eq!(registry.get_history(AgentRole::Designer).len(), 1);
    assert_eq!(registry.active_roles(), vec![AgentRole::Designer]);
}
