//! In-memory conversation state store.
//!
//! Keeps every checkpointed version of each message's state plus the
//! suspended-machine table used by `resume`. This is the hand-off point
//! to the persistence collaborator: sealed records are read from here.

use std::collections::HashMap;

use tokio::sync::Mutex;

use genesis_types::ConversationState;

/// A machine parked at `waiting_for_feedback`.
#[derive(Debug, Clone)]
pub struct Suspended {
    /// The state at suspension; `state.node` names the node to re-enter.
    pub state: ConversationState,
    /// Required parameters still unbound when the executor suspended.
    pub missing_params: Vec<String>,
}

/// Versioned state snapshots and the suspension table.
#[derive(Default)]
pub struct StateStore {
    /// Checkpoint history keyed by (conversation_id, message_id).
    checkpoints: Mutex<HashMap<(String, String), Vec<ConversationState>>>,
    /// At most one suspended machine per conversation.
    suspended: Mutex<HashMap<String, Suspended>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a checkpoint (a clone of the current state).
    pub async fn checkpoint(&self, state: &ConversationState) {
        let key = (state.conversation_id.clone(), state.message_id.clone());
        self.checkpoints
            .lock()
            .await
            .entry(key)
            .or_default()
            .push(state.clone());
    }

    /// The latest checkpoint for a message.
    pub async fn latest(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Option<ConversationState> {
        self.checkpoints
            .lock()
            .await
            .get(&(conversation_id.to_string(), message_id.to_string()))
            .and_then(|versions| versions.last().cloned())
    }

    /// The latest checkpoint of the most recently updated message in a
    /// conversation.
    pub async fn latest_in_conversation(&self, conversation_id: &str) -> Option<ConversationState> {
        let checkpoints = self.checkpoints.lock().await;
        checkpoints
            .iter()
            .filter(|((conv, _), _)| conv == conversation_id)
            .filter_map(|(_, versions)| versions.last())
            .max_by_key(|state| state.updated_at)
            .cloned()
    }

    /// Park a suspended machine. Replaces any previous suspension for
    /// the conversation.
    pub async fn suspend(&self, suspended: Suspended) {
        self.suspended
            .lock()
            .await
            .insert(suspended.state.conversation_id.clone(), suspended);
    }

    /// Take (and clear) the suspended machine for a conversation.
    pub async fn take_suspended(&self, conversation_id: &str) -> Option<Suspended> {
        self.suspended.lock().await.remove(conversation_id)
    }
}
