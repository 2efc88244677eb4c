use std::sync::Arc;

use tracing::{debug, info, warn};

use super::hooks::{ConfirmRequest, ControllerHooks};
use crate::models::{Message, NextStep, SharedSnapshotManager};
use crate::repositories::{MessageStore, StoreAction};
use crate::settings::SnapshotSettings;

/// What a user action ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Stale or invalid request; nothing changed
    Ignored,
    /// The displayed version moved
    Moved { active_index: usize },
    /// A regeneration for this message is already in flight
    AlreadyPending,
    RegenerationQueued,
    RegenerationFailed,
    /// The user declined the confirmation
    Cancelled,
    Deleted,
    DeleteFailed,
}

/// Turns prev/next/delete clicks into snapshot state changes and store calls.
pub struct MessageActionController {
    manager: SharedSnapshotManager,
    store: Arc<dyn MessageStore>,
    hooks: ControllerHooks,
    settings: SnapshotSettings,
}

impl MessageActionController {
    pub fn new(
        manager: SharedSnapshotManager,
        store: Arc<dyn MessageStore>,
        hooks: ControllerHooks,
        settings: SnapshotSettings,
    ) -> Self {
        Self {
            manager,
            store,
            hooks,
            settings,
        }
    }

    pub fn manager(&self) -> &SharedSnapshotManager {
        &self.manager
    }

    fn current_character_id(&self) -> Option<String> {
        let character_id = match &self.hooks.current_character_id {
            Some(hook) => hook(),
            None => self.store.active_character_id(),
        };
        character_id.filter(|id| !id.is_empty())
    }

    fn active_history(&self) -> Vec<Message> {
        match &self.hooks.active_history {
            Some(hook) => hook(),
            None => self.store.active_history(),
        }
    }

    /// Show the previous version of a message
    pub async fn handle_snapshot_prev(&self, message_id: &str) -> ActionOutcome {
        let character_id = self.current_character_id();

        let (active_index, persist) = {
            let mut manager = self.manager.lock();
            let Some(state) = manager.step_back(message_id) else {
                debug!(message_id = %message_id, "Nothing before the displayed snapshot");
                return ActionOutcome::Ignored;
            };
            let persist = character_id
                .as_deref()
                .map(|character_id| manager.persist_selection(character_id, message_id, &state));
            (state.active_index(), persist)
        };

        self.hooks.re_render();
        if let Some(persist) = persist {
            persist.await;
        }

        ActionOutcome::Moved { active_index }
    }

    /// Show the next version, or request a new one when already at the latest
    pub async fn handle_snapshot_next(&self, message_id: &str) -> ActionOutcome {
        if self.manager.lock().state_by_id(message_id).is_none() {
            debug!(message_id = %message_id, "No snapshot state for message");
            return ActionOutcome::Ignored;
        }
        let Some(character_id) = self.current_character_id() else {
            debug!(message_id = %message_id, "No active character, ignoring next");
            return ActionOutcome::Ignored;
        };

        let (step, persist) = {
            let mut manager = self.manager.lock();
            let step = manager.advance_or_begin_regeneration(message_id);
            let persist = match &step {
                NextStep::Advanced(state) | NextStep::Regenerate(state) => {
                    Some(manager.persist_selection(&character_id, message_id, state))
                }
                NextStep::Untracked | NextStep::AlreadyPending => None,
            };
            (step, persist)
        };

        match step {
            NextStep::Untracked => ActionOutcome::Ignored,
            NextStep::AlreadyPending => {
                debug!(message_id = %message_id, "Regeneration already pending");
                ActionOutcome::AlreadyPending
            }
            NextStep::Advanced(state) => {
                self.hooks.re_render();
                if let Some(persist) = persist {
                    persist.await;
                }
                ActionOutcome::Moved {
                    active_index: state.active_index(),
                }
            }
            NextStep::Regenerate(_) => {
                // Render the loading state before the request goes out.
                self.hooks.re_render();
                // Selection persistence runs alongside the request, never ahead of it.
                let persist = async {
                    if let Some(persist) = persist {
                        persist.await;
                    }
                };
                let ((), outcome) = futures::join!(
                    persist,
                    self.request_regeneration(&character_id, message_id)
                );
                outcome
            }
        }
    }

    async fn request_regeneration(&self, character_id: &str, message_id: &str) -> ActionOutcome {
        let messages = self.active_history();
        info!(message_id = %message_id, history_len = messages.len(), "Requesting snapshot regeneration");

        match self
            .store
            .queue_action(character_id, StoreAction::regenerate(message_id, messages))
            .await
        {
            Ok(()) => ActionOutcome::RegenerationQueued,
            Err(e) => {
                self.manager.lock().set_pending(message_id, false);
                warn!(message_id = %message_id, error = ?e, "Failed to queue regeneration");
                self.hooks
                    .notify_error(message_id, &format!("Failed to regenerate message: {}", e));
                self.hooks.re_render();
                ActionOutcome::RegenerationFailed
            }
        }
    }

    /// Delete a message after confirmation
    pub async fn handle_delete(&self, message_id: &str) -> ActionOutcome {
        let Some(character_id) = self.current_character_id() else {
            debug!(message_id = %message_id, "No active character, ignoring delete");
            return ActionOutcome::Ignored;
        };

        if self.settings.confirm_delete {
            let request = ConfirmRequest::delete(&self.settings.delete_prompt, message_id);
            if !self.hooks.confirm(request).await {
                debug!(message_id = %message_id, "Delete cancelled");
                return ActionOutcome::Cancelled;
            }
        }

        match self.store.delete_message(&character_id, message_id).await {
            Ok(()) => {
                self.manager.lock().evict(message_id);
                info!(message_id = %message_id, "Deleted message");
                self.hooks.re_render();
                ActionOutcome::Deleted
            }
            Err(e) => {
                warn!(message_id = %message_id, error = ?e, "Failed to delete message");
                self.hooks
                    .notify_error(message_id, &format!("Failed to delete message: {}", e));
                ActionOutcome::DeleteFailed
            }
        }
    }
}
