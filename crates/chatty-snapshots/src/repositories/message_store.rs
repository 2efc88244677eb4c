use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::error::{StoreError, StoreResult};
use crate::models::Message;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Action queued on the backend for a character's conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum StoreAction {
    /// Produce a new snapshot for `message_id` given the visible history
    #[serde(rename = "regen")]
    Regenerate {
        message_id: String,
        messages: Vec<Message>,
    },
}

impl StoreAction {
    pub fn regenerate(message_id: impl Into<String>, messages: Vec<Message>) -> Self {
        StoreAction::Regenerate {
            message_id: message_id.into(),
            messages,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StoreAction::Regenerate { .. } => "regen",
        }
    }
}

/// An action accepted by a store, tagged with the request id the store assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub request_id: String,
    pub character_id: String,
    #[serde(flatten)]
    pub action: StoreAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_snapshot_index: Option<usize>,
}

/// Partial message update; only the fields that are set are applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePatch {
    #[serde(default)]
    pub metadata: MetadataPatch,
}

impl MessagePatch {
    pub fn selected_snapshot_index(index: usize) -> Self {
        Self {
            metadata: MetadataPatch {
                selected_snapshot_index: Some(index),
            },
        }
    }

    pub fn apply_to(&self, message: &mut Message) {
        if let Some(index) = self.metadata.selected_snapshot_index {
            message.metadata.selected_snapshot_index = Some(index);
        }
    }
}

/// Authoritative message source the snapshot engine reads from and writes through.
///
/// Reads are synchronous views of the store's current state; writes are
/// asynchronous and may fail. Implementations must be cheap to query since
/// `active_history` is called on every navigation that persists a selection.
pub trait MessageStore: Send + Sync + 'static {
    /// Current ordered message list of the active conversation
    fn active_history(&self) -> Vec<Message>;

    /// Character (conversation) currently shown, if any
    fn active_character_id(&self) -> Option<String>;

    /// Queue a backend action; resolves once the action was accepted
    fn queue_action(
        &self,
        character_id: &str,
        action: StoreAction,
    ) -> BoxFuture<'static, StoreResult<()>>;

    /// Delete a single message from a character's history
    fn delete_message(
        &self,
        character_id: &str,
        message_id: &str,
    ) -> BoxFuture<'static, StoreResult<()>>;

    /// Dedicated selection persistence. Stores without it keep this default,
    /// which makes callers fall back to `update_message`.
    fn set_selected_snapshot_index(
        &self,
        _character_id: &str,
        _message_id: &str,
        _index: usize,
    ) -> BoxFuture<'static, StoreResult<()>> {
        Box::pin(async {
            Err(StoreError::Unsupported {
                operation: "set_selected_snapshot_index",
            })
        })
    }

    /// Generic partial message update
    fn update_message(
        &self,
        character_id: &str,
        message_id: &str,
        patch: MessagePatch,
    ) -> BoxFuture<'static, StoreResult<()>>;
}
