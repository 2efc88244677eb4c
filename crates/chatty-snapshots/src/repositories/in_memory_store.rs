use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::message_store::{BoxFuture, MessagePatch, MessageStore, QueuedAction, StoreAction};
use crate::models::Message;

/// Store operations that can be counted and made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    QueueAction,
    DeleteMessage,
    SetSelectedSnapshotIndex,
    UpdateMessage,
}

#[derive(Default)]
struct InMemoryState {
    histories: HashMap<String, Vec<Message>>,
    active_character_id: Option<String>,
    queued_actions: Vec<QueuedAction>,
    failing: HashSet<StoreOperation>,
    calls: HashMap<StoreOperation, usize>,
    without_selection_writes: bool,
}

impl InMemoryState {
    /// Count the call and report whether it should be rejected
    fn record(&mut self, operation: StoreOperation) -> StoreResult<()> {
        *self.calls.entry(operation).or_insert(0) += 1;
        if self.failing.contains(&operation) {
            return Err(StoreError::Rejected {
                message: format!("{:?} failed", operation),
            });
        }
        Ok(())
    }

    fn message_mut(&mut self, character_id: &str, message_id: &str) -> StoreResult<&mut Message> {
        self.histories
            .get_mut(character_id)
            .and_then(|history| history.iter_mut().find(|m| m.id == message_id))
            .ok_or_else(|| StoreError::NotFound {
                message_id: message_id.to_string(),
            })
    }
}

/// In-memory message store.
/// Useful for testing and development
#[derive(Clone, Default)]
pub struct InMemoryMessageStore {
    inner: Arc<Mutex<InMemoryState>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a character's history and make it the active one
    pub fn with_character(self, character_id: &str, messages: Vec<Message>) -> Self {
        {
            let mut state = self.inner.lock();
            state.histories.insert(character_id.to_string(), messages);
            state.active_character_id = Some(character_id.to_string());
        }
        self
    }

    /// Behave like a backend without the dedicated selection endpoint
    pub fn without_selection_writes(self) -> Self {
        self.inner.lock().without_selection_writes = true;
        self
    }

    pub fn set_active_character(&self, character_id: Option<&str>) {
        self.inner.lock().active_character_id = character_id.map(str::to_string);
    }

    pub fn set_history(&self, character_id: &str, messages: Vec<Message>) {
        self.inner
            .lock()
            .histories
            .insert(character_id.to_string(), messages);
    }

    pub fn history(&self, character_id: &str) -> Vec<Message> {
        self.inner
            .lock()
            .histories
            .get(character_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn message(&self, character_id: &str, message_id: &str) -> Option<Message> {
        self.inner
            .lock()
            .histories
            .get(character_id)
            .and_then(|history| history.iter().find(|m| m.id == message_id).cloned())
    }

    /// Make every subsequent call of `operation` fail (or succeed again)
    pub fn fail(&self, operation: StoreOperation, failing: bool) {
        let mut state = self.inner.lock();
        if failing {
            state.failing.insert(operation);
        } else {
            state.failing.remove(&operation);
        }
    }

    pub fn call_count(&self, operation: StoreOperation) -> usize {
        self.inner
            .lock()
            .calls
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn queued_actions(&self) -> Vec<QueuedAction> {
        self.inner.lock().queued_actions.clone()
    }
}

impl MessageStore for InMemoryMessageStore {
    fn active_history(&self) -> Vec<Message> {
        let state = self.inner.lock();
        state
            .active_character_id
            .as_ref()
            .and_then(|id| state.histories.get(id))
            .cloned()
            .unwrap_or_default()
    }

    fn active_character_id(&self) -> Option<String> {
        self.inner.lock().active_character_id.clone()
    }

    fn queue_action(
        &self,
        character_id: &str,
        action: StoreAction,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        let character_id = character_id.to_string();

        Box::pin(async move {
            let mut state = inner.lock();
            state.record(StoreOperation::QueueAction)?;

            state.queued_actions.push(QueuedAction {
                request_id: Uuid::new_v4().to_string(),
                character_id,
                action,
            });

            Ok(())
        })
    }

    fn delete_message(
        &self,
        character_id: &str,
        message_id: &str,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        let character_id = character_id.to_string();
        let message_id = message_id.to_string();

        Box::pin(async move {
            let mut state = inner.lock();
            state.record(StoreOperation::DeleteMessage)?;

            let history = state
                .histories
                .get_mut(&character_id)
                .ok_or_else(|| StoreError::NotFound {
                    message_id: message_id.clone(),
                })?;
            let before = history.len();
            history.retain(|m| m.id != message_id);
            if history.len() == before {
                return Err(StoreError::NotFound { message_id });
            }

            Ok(())
        })
    }

    fn set_selected_snapshot_index(
        &self,
        character_id: &str,
        message_id: &str,
        index: usize,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        let character_id = character_id.to_string();
        let message_id = message_id.to_string();

        Box::pin(async move {
            let mut state = inner.lock();
            state.record(StoreOperation::SetSelectedSnapshotIndex)?;
            if state.without_selection_writes {
                return Err(StoreError::Unsupported {
                    operation: "set_selected_snapshot_index",
                });
            }

            let message = state.message_mut(&character_id, &message_id)?;
            message.metadata.selected_snapshot_index = Some(index);

            Ok(())
        })
    }

    fn update_message(
        &self,
        character_id: &str,
        message_id: &str,
        patch: MessagePatch,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        let character_id = character_id.to_string();
        let message_id = message_id.to_string();

        Box::pin(async move {
            let mut state = inner.lock();
            state.record(StoreOperation::UpdateMessage)?;

            let message = state.message_mut(&character_id, &message_id)?;
            patch.apply_to(message);

            Ok(())
        })
    }
}
