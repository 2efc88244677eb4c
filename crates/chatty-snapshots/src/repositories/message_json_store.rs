use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::message_store::{BoxFuture, MessagePatch, MessageStore, QueuedAction, StoreAction};
use crate::models::Message;

/// On-disk layout of one character's history
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CharacterHistoryFile {
    character_id: String,
    messages: Vec<Message>,
}

#[derive(Default)]
struct JsonStoreState {
    active_character_id: Option<String>,
    histories: HashMap<String, Vec<Message>>,
    queued_actions: Vec<QueuedAction>,
}

/// JSON file-based message store.
/// Stores each character's history as a separate file in ~/.config/chatty/snapshots/
///
/// Histories are cached in memory once opened so reads stay synchronous;
/// every mutation rewrites the character's file atomically. Queued actions
/// are kept in memory for a worker to drain with `take_queued_actions`.
pub struct MessageJsonStore {
    histories_dir: PathBuf,
    inner: Arc<Mutex<JsonStoreState>>,
}

impl MessageJsonStore {
    pub fn new() -> StoreResult<Self> {
        let histories_dir = dirs::config_dir()
            .ok_or_else(|| StoreError::InitializationError {
                message: "Could not determine config directory".to_string(),
            })?
            .join("chatty")
            .join("snapshots");

        Ok(Self::with_dir(histories_dir))
    }

    pub fn with_dir(histories_dir: impl Into<PathBuf>) -> Self {
        Self {
            histories_dir: histories_dir.into(),
            inner: Arc::new(Mutex::new(JsonStoreState::default())),
        }
    }

    /// Character ids become file names, so anything that could leave `dir` is rejected
    fn history_path(dir: &Path, character_id: &str) -> StoreResult<PathBuf> {
        if character_id.is_empty()
            || character_id.contains(['/', '\\'])
            || character_id.contains("..")
        {
            return Err(StoreError::Rejected {
                message: format!("Invalid character id: {:?}", character_id),
            });
        }
        Ok(dir.join(format!("{}.json", character_id)))
    }

    /// Load a character's history from disk (missing file means empty) and make it active
    pub async fn open_character(&self, character_id: &str) -> StoreResult<()> {
        let path = Self::history_path(&self.histories_dir, character_id)?;

        let messages = tokio::task::spawn_blocking(move || -> StoreResult<Vec<Message>> {
            if !path.exists() {
                return Ok(Vec::new());
            }
            let content = std::fs::read_to_string(&path)?;
            let file: CharacterHistoryFile = serde_json::from_str(&content)?;
            Ok(file.messages)
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;

        debug!(character_id = %character_id, count = messages.len(), "Opened character history");

        let mut state = self.inner.lock();
        state
            .histories
            .insert(character_id.to_string(), messages);
        state.active_character_id = Some(character_id.to_string());
        Ok(())
    }

    /// Write a character's history to disk, then replace the cached copy
    pub async fn save_history(&self, character_id: &str, messages: Vec<Message>) -> StoreResult<()> {
        write_history(
            self.histories_dir.clone(),
            CharacterHistoryFile {
                character_id: character_id.to_string(),
                messages: messages.clone(),
            },
        )
        .await?;

        self.inner
            .lock()
            .histories
            .insert(character_id.to_string(), messages);
        Ok(())
    }

    pub fn take_queued_actions(&self) -> Vec<QueuedAction> {
        std::mem::take(&mut self.inner.lock().queued_actions)
    }

    /// Apply `edit` to a copy of the cached history and persist it. The cache
    /// only takes the edited copy once the file is written.
    fn edit_message<F>(
        &self,
        character_id: &str,
        message_id: &str,
        edit: F,
    ) -> BoxFuture<'static, StoreResult<()>>
    where
        F: FnOnce(&mut Vec<Message>, usize),
    {
        let mut messages = {
            let state = self.inner.lock();
            let Some(history) = state.histories.get(character_id) else {
                return not_found(message_id);
            };
            history.clone()
        };
        let Some(position) = messages.iter().position(|m| m.id == message_id) else {
            return not_found(message_id);
        };
        edit(&mut messages, position);

        let histories_dir = self.histories_dir.clone();
        let inner = self.inner.clone();
        let character_id = character_id.to_string();
        Box::pin(async move {
            write_history(
                histories_dir,
                CharacterHistoryFile {
                    character_id: character_id.clone(),
                    messages: messages.clone(),
                },
            )
            .await?;

            inner.lock().histories.insert(character_id, messages);
            Ok(())
        })
    }
}

fn not_found(message_id: &str) -> BoxFuture<'static, StoreResult<()>> {
    let message_id = message_id.to_string();
    Box::pin(async move { Err(StoreError::NotFound { message_id }) })
}

fn write_history(
    histories_dir: PathBuf,
    file: CharacterHistoryFile,
) -> BoxFuture<'static, StoreResult<()>> {
    Box::pin(async move {
        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            // Ensure directory exists
            std::fs::create_dir_all(&histories_dir)?;

            let path = MessageJsonStore::history_path(&histories_dir, &file.character_id)?;
            let json = serde_json::to_string_pretty(&file)?;

            // Write to file atomically (write to temp, then rename)
            let temp_path = path.with_extension("json.tmp");
            std::fs::write(&temp_path, json)?;
            std::fs::rename(&temp_path, &path)?;

            Ok(())
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    })
}

impl MessageStore for MessageJsonStore {
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
        let mut state = self.inner.lock();
        if !state.histories.contains_key(character_id) {
            return Box::pin(async { Err(StoreError::NoActiveCharacter) });
        }

        let request_id = Uuid::new_v4().to_string();
        debug!(request_id = %request_id, action = action.name(), "Queued action");
        state.queued_actions.push(QueuedAction {
            request_id,
            character_id: character_id.to_string(),
            action,
        });

        Box::pin(async { Ok(()) })
    }

    fn delete_message(
        &self,
        character_id: &str,
        message_id: &str,
    ) -> BoxFuture<'static, StoreResult<()>> {
        self.edit_message(character_id, message_id, |history, position| {
            history.remove(position);
        })
    }

    fn set_selected_snapshot_index(
        &self,
        character_id: &str,
        message_id: &str,
        index: usize,
    ) -> BoxFuture<'static, StoreResult<()>> {
        self.edit_message(character_id, message_id, move |history, position| {
            history[position].metadata.selected_snapshot_index = Some(index);
        })
    }

    fn update_message(
        &self,
        character_id: &str,
        message_id: &str,
        patch: MessagePatch,
    ) -> BoxFuture<'static, StoreResult<()>> {
        self.edit_message(character_id, message_id, move |history, position| {
            patch.apply_to(&mut history[position]);
        })
    }
}
