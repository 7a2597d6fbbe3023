use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::agent_engine::chat::ChatEntry;
use crate::agent_engine::state::AgentState;
use crate::llm::types::StreamChunk;

/// Everything the engine reports while a turn is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    ChatAppended { entry: ChatEntry },
    StreamChunk { chunk: StreamChunk },
    StateChanged { state: AgentState },
}

/// Fan-out channel between the engine and whoever is watching (the shell, tests).
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event dropped: no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::StreamChunkKind;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.emit(SessionEvent::StreamChunk {
            chunk: StreamChunk {
                kind: StreamChunkKind::Content,
                content: "hi".into(),
            },
        });
        match rx.recv().await.unwrap() {
            SessionEvent::StreamChunk { chunk } => assert_eq!(chunk.content, "hi"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.emit(SessionEvent::StateChanged {
            state: AgentState::Idle,
        });
    }
}
