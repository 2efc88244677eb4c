use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::message::Message;
use super::snapshot_state::{SnapshotState, SnapshotView};
use crate::repositories::{BoxFuture, MessagePatch, MessageStore};

/// Manager shared between the host's render loop and the action controller.
/// The lock is only held for synchronous bookkeeping, never across an await.
pub type SharedSnapshotManager = Arc<Mutex<SnapshotManager>>;

/// Result of a best-effort selection write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Nothing to write (invalid input, unknown message, or already up to date)
    Skipped,
    Persisted,
    PersistedViaFallback,
    /// Both the dedicated and the fallback write failed
    Failed,
}

/// What `advance_or_begin_regeneration` decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Untracked,
    /// Moved one entry forward
    Advanced(SnapshotState),
    /// Already at the latest entry with a regeneration in flight
    AlreadyPending,
    /// Marked pending; the caller must request the regeneration
    Regenerate(SnapshotState),
}

/// Per-message snapshot history reconciled against the store's message list.
pub struct SnapshotManager {
    states: HashMap<String, SnapshotState>,
    pending: HashSet<String>,
    store: Arc<dyn MessageStore>,
}

impl SnapshotManager {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            states: HashMap::new(),
            pending: HashSet::new(),
            store,
        }
    }

    pub fn shared(store: Arc<dyn MessageStore>) -> SharedSnapshotManager {
        Arc::new(Mutex::new(Self::new(store)))
    }

    /// Drop all tracked state, e.g. when switching conversations
    pub fn reset(&mut self) {
        self.states.clear();
        self.pending.clear();
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    pub fn set_pending(&mut self, id: &str, pending: bool) {
        if pending {
            self.pending.insert(id.to_string());
        } else {
            self.pending.remove(id);
        }
    }

    pub fn state(&self, message: &Message) -> Option<&SnapshotState> {
        if !message.is_snapshot_eligible() {
            return None;
        }
        self.states.get(&message.id)
    }

    pub fn state_by_id(&self, id: &str) -> Option<&SnapshotState> {
        self.states.get(id)
    }

    pub fn view(&self, message: &Message) -> Option<SnapshotView> {
        self.state(message)
            .map(|state| SnapshotView::new(&message.id, state, self.is_pending(&message.id)))
    }

    pub fn tracked_count(&self) -> usize {
        self.states.len()
    }

    pub fn selected_index_from_message(message: &Message) -> Option<usize> {
        message.metadata.selected_snapshot_index
    }

    /// Forget a message entirely. Returns whether it was tracked.
    pub fn evict(&mut self, id: &str) -> bool {
        self.pending.remove(id);
        self.states.remove(id).is_some()
    }

    /// Move one entry back; `None` if untracked or already at the oldest entry
    pub fn step_back(&mut self, id: &str) -> Option<SnapshotState> {
        let state = self.states.get_mut(id)?;
        if state.active_index == 0 {
            return None;
        }
        state.active_index -= 1;
        state.refresh_follow();
        Some(state.clone())
    }

    /// Move one entry forward, or claim the regeneration slot when at the latest entry.
    /// The pending check and mark happen together so only one caller can win.
    pub fn advance_or_begin_regeneration(&mut self, id: &str) -> NextStep {
        let Some(state) = self.states.get_mut(id) else {
            return NextStep::Untracked;
        };

        if state.active_index < state.latest_index {
            state.active_index += 1;
            state.refresh_follow();
            return NextStep::Advanced(state.clone());
        }

        if self.pending.contains(id) {
            return NextStep::AlreadyPending;
        }

        self.pending.insert(id.to_string());
        state.follow_latest = true;
        NextStep::Regenerate(state.clone())
    }

    /// Write the displayed index back to the store, best effort.
    ///
    /// The returned future never fails: a rejected dedicated write falls back
    /// to a generic metadata patch, and a rejected fallback is only logged.
    pub fn persist_selection(
        &self,
        character_id: &str,
        message_id: &str,
        state: &SnapshotState,
    ) -> BoxFuture<'static, PersistOutcome> {
        let index = state.active_index;
        if character_id.is_empty() || message_id.is_empty() || !state.is_valid_index(index) {
            return Box::pin(async { PersistOutcome::Skipped });
        }

        let history = self.store.active_history();
        let Some(live) = history.iter().find(|m| m.id == message_id) else {
            debug!(message_id = %message_id, "Message not in active history, skipping selection persist");
            return Box::pin(async { PersistOutcome::Skipped });
        };
        if Self::selected_index_from_message(live) == Some(index) {
            return Box::pin(async { PersistOutcome::Skipped });
        }

        let store = self.store.clone();
        let character_id = character_id.to_string();
        let message_id = message_id.to_string();

        Box::pin(async move {
            let primary = store
                .set_selected_snapshot_index(&character_id, &message_id, index)
                .await;
            let Err(primary_error) = primary else {
                return PersistOutcome::Persisted;
            };
            debug!(message_id = %message_id, error = %primary_error, "Selection write rejected, trying metadata update");

            match store
                .update_message(
                    &character_id,
                    &message_id,
                    MessagePatch::selected_snapshot_index(index),
                )
                .await
            {
                Ok(()) => PersistOutcome::PersistedViaFallback,
                Err(e) => {
                    warn!(message_id = %message_id, index, error = ?e, "Failed to persist snapshot selection");
                    PersistOutcome::Failed
                }
            }
        })
    }

    /// Reconcile tracked state with the store's current message list.
    ///
    /// Calling this twice with the same list leaves every state unchanged.
    pub fn sync_from_messages(&mut self, messages: &[Message]) {
        let present: HashSet<&str> = messages.iter().map(|m| m.id.as_str()).collect();

        let before = self.states.len();
        self.states.retain(|id, _| present.contains(id.as_str()));
        self.pending.retain(|id| present.contains(id.as_str()));
        let evicted = before - self.states.len();

        for message in messages.iter().filter(|m| m.is_snapshot_eligible()) {
            self.reconcile(message);
        }

        debug!(
            tracked = self.states.len(),
            evicted,
            pending = self.pending.len(),
            "Synced snapshot state"
        );
    }

    fn reconcile(&mut self, message: &Message) {
        let text = message.text();
        let history = message.snapshot_history();

        let state = self.states.entry(message.id.clone()).or_insert_with(|| {
            let entries = history
                .map(<[String]>::to_vec)
                .unwrap_or_else(|| vec![text.to_string()]);
            SnapshotState::from_entries(entries)
        });
        let was_following = state.follow_latest;
        let previous_synced = state.last_synced_text.clone();

        if let Some(history) = history {
            state.replace_entries(history.to_vec());
        }

        if message.is_streaming() {
            // Partial text is only ever appended so older versions stay intact.
            if state.latest_text() != text {
                let latest = state.push_latest(text);
                state.active_index = latest;
                state.follow_latest = true;
                state.last_synced_text = text.to_string();
            }
            return;
        }

        let mut resurfaced = None;
        let mut updated_latest = false;
        if state.latest_text() != text {
            match state.entries.iter().position(|entry| entry == text) {
                Some(position) => {
                    state.entries[position] = text.to_string();
                    resurfaced = Some(position);
                }
                None => {
                    state.push_latest(text);
                }
            }
            updated_latest = true;
        } else {
            let latest = state.latest_index;
            state.entries[latest] = text.to_string();
        }

        // A reader who stepped back keeps their version even when an older text resurfaces.
        state.active_index = match resurfaced {
            Some(position) if was_following => position,
            _ if was_following || state.entries.len() == 1 => state.latest_index,
            _ => state.active_index.min(state.latest_index),
        };
        state.refresh_follow();

        if let Some(selected) =
            Self::selected_index_from_message(message).filter(|i| state.is_valid_index(*i))
        {
            state.active_index = selected;
            state.refresh_follow();
        }

        // Settled text means no regeneration is in flight for this message.
        if self.pending.remove(&message.id) {
            debug!(
                message_id = %message.id,
                new_text = updated_latest && text != previous_synced,
                "Cleared pending regeneration"
            );
        }

        state.last_synced_text = text.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{InMemoryMessageStore, StoreOperation};

    fn manager() -> (SnapshotManager, InMemoryMessageStore) {
        let store = InMemoryMessageStore::new().with_character("char-1", Vec::new());
        (SnapshotManager::new(Arc::new(store.clone())), store)
    }

    fn assert_invariants(manager: &SnapshotManager) {
        for state in manager.states.values() {
            assert!(!state.entries.is_empty());
            assert_eq!(state.latest_index, state.entries.len() - 1);
            assert!(state.active_index <= state.latest_index);
            assert_eq!(state.follow_latest, state.active_index == state.latest_index);
        }
    }

    fn entries(manager: &SnapshotManager, id: &str) -> Vec<String> {
        manager.state_by_id(id).unwrap().entries().to_vec()
    }

    #[test]
    fn test_first_sync_creates_single_entry() {
        let (mut manager, _) = manager();
        manager.sync_from_messages(&[Message::assistant("m1", "hello")]);

        let state = manager.state_by_id("m1").unwrap();
        assert_eq!(state.entries(), ["hello".to_string()]);
        assert_eq!(state.active_index(), 0);
        assert!(state.follow_latest());
        assert_invariants(&manager);
    }

    #[test]
    fn test_ineligible_messages_are_not_tracked() {
        let (mut manager, _) = manager();
        let messages = vec![
            Message::user("u1", "hi"),
            Message::assistant("img", "").with_kind(crate::models::MessageKind::Image),
            Message::assistant("aud", "").with_kind(crate::models::MessageKind::Audio),
        ];
        manager.sync_from_messages(&messages);

        assert_eq!(manager.tracked_count(), 0);
        for message in &messages {
            assert!(manager.state(message).is_none());
        }
    }

    #[test]
    fn test_settled_text_change_appends_and_follows() {
        let (mut manager, _) = manager();
        manager.sync_from_messages(&[Message::assistant("m1", "hello")]);
        manager.sync_from_messages(&[Message::assistant("m1", "hello there")]);

        let state = manager.state_by_id("m1").unwrap();
        assert_eq!(entries(&manager, "m1"), vec!["hello", "hello there"]);
        assert_eq!(state.active_index(), 1);
        assert!(state.follow_latest());
        assert_invariants(&manager);
    }

    #[test]
    fn test_older_selection_is_not_yanked_forward() {
        let (mut manager, _) = manager();
        manager.sync_from_messages(&[Message::assistant("m1", "a")]);
        manager.sync_from_messages(&[Message::assistant("m1", "b")]);
        manager.step_back("m1").unwrap();

        manager.sync_from_messages(&[Message::assistant("m1", "c")]);

        let state = manager.state_by_id("m1").unwrap();
        assert_eq!(state.len(), 3);
        assert_eq!(state.active_index(), 0);
        assert!(!state.follow_latest());
        assert_invariants(&manager);
    }

    #[test]
    fn test_streaming_appends_partial_text() {
        let (mut manager, _) = manager();
        manager.sync_from_messages(&[Message::assistant("m1", "first")]);

        manager.sync_from_messages(&[Message::assistant("m1", "se").with_streaming(true)]);
        manager.sync_from_messages(&[Message::assistant("m1", "second").with_streaming(true)]);

        let state = manager.state_by_id("m1").unwrap();
        assert_eq!(entries(&manager, "m1"), vec!["first", "se", "second"]);
        assert_eq!(state.active_index(), 2);
        assert!(state.follow_latest());
        assert_eq!(state.last_synced_text(), "second");
        assert_invariants(&manager);
    }

    #[test]
    fn test_streaming_keeps_pending_until_settled() {
        let (mut manager, _) = manager();
        manager.sync_from_messages(&[Message::assistant("m1", "a")]);
        manager.set_pending("m1", true);

        manager.sync_from_messages(&[Message::assistant("m1", "b").with_streaming(true)]);
        assert!(manager.is_pending("m1"));

        manager.sync_from_messages(&[Message::assistant("m1", "b")]);
        assert!(!manager.is_pending("m1"));
    }

    #[test]
    fn test_backend_history_overwrites_local_entries() {
        let (mut manager, _) = manager();
        manager.sync_from_messages(&[Message::assistant("m1", "p").with_streaming(true)]);
        manager.sync_from_messages(&[Message::assistant("m1", "pa").with_streaming(true)]);

        let settled = Message::assistant("m1", "final").with_snapshots(["old", "final"]);
        manager.sync_from_messages(std::slice::from_ref(&settled));

        let state = manager.state_by_id("m1").unwrap();
        assert_eq!(entries(&manager, "m1"), vec!["old", "final"]);
        assert_eq!(state.active_index(), 1);
        assert_invariants(&manager);
    }

    #[test]
    fn test_initial_sync_with_history_and_divergent_text() {
        let (mut manager, _) = manager();
        let message = Message::assistant("m1", "third").with_snapshots(["one", "two"]);
        manager.sync_from_messages(std::slice::from_ref(&message));

        let state = manager.state_by_id("m1").unwrap();
        assert_eq!(entries(&manager, "m1"), vec!["one", "two", "third"]);
        assert_eq!(state.active_index(), 2);
        assert_invariants(&manager);
    }

    #[test]
    fn test_resurfaced_text_selects_existing_entry() {
        let (mut manager, _) = manager();
        manager.sync_from_messages(&[Message::assistant("m1", "a")]);
        manager.sync_from_messages(&[Message::assistant("m1", "b")]);
        manager.sync_from_messages(&[Message::assistant("m1", "a")]);

        let state = manager.state_by_id("m1").unwrap();
        assert_eq!(entries(&manager, "m1"), vec!["a", "b"]);
        assert_eq!(state.active_index(), 0);
        assert!(!state.follow_latest());
        assert_invariants(&manager);
    }

    #[test]
    fn test_resurfaced_text_keeps_stepped_back_view() {
        let (mut manager, _) = manager();
        for text in ["a", "b", "c"] {
            manager.sync_from_messages(&[Message::assistant("m1", text)]);
        }
        manager.step_back("m1");
        assert_eq!(manager.state_by_id("m1").unwrap().active_index(), 1);

        manager.sync_from_messages(&[Message::assistant("m1", "a")]);
        manager.sync_from_messages(&[Message::assistant("m1", "a")]);

        let state = manager.state_by_id("m1").unwrap();
        assert_eq!(entries(&manager, "m1"), vec!["a", "b", "c"]);
        assert_eq!(state.active_index(), 1);
        assert!(!state.follow_latest());
        assert_invariants(&manager);
    }

    #[test]
    fn test_remote_selection_overrides_once_settled() {
        let (mut manager, _) = manager();
        let message = Message::assistant("m1", "c")
            .with_snapshots(["a", "b", "c"])
            .with_selected_snapshot_index(1);
        manager.sync_from_messages(std::slice::from_ref(&message));

        let state = manager.state_by_id("m1").unwrap();
        assert_eq!(state.active_index(), 1);
        assert!(!state.follow_latest());
        assert_invariants(&manager);
    }

    #[test]
    fn test_remote_selection_ignored_while_streaming_or_out_of_range() {
        let (mut manager, _) = manager();
        manager.sync_from_messages(&[Message::assistant("m1", "z")]);
        let streaming = Message::assistant("m1", "a")
            .with_streaming(true)
            .with_selected_snapshot_index(0);
        manager.sync_from_messages(&[streaming]);
        assert_eq!(manager.state_by_id("m1").unwrap().active_index(), 1);

        let out_of_range = Message::assistant("m2", "x").with_selected_snapshot_index(5);
        manager.sync_from_messages(std::slice::from_ref(&out_of_range));
        assert_eq!(manager.state_by_id("m2").unwrap().active_index(), 0);
        assert_invariants(&manager);
    }

    #[test]
    fn test_sync_is_idempotent() {
        let (mut manager, _) = manager();
        manager.sync_from_messages(&[Message::assistant("m1", "a"), Message::assistant("m2", "x")]);

        let frames = vec![
            vec![
                Message::assistant("m1", "b").with_snapshots(["a", "q"]),
                Message::assistant("m2", "y").with_streaming(true),
            ],
            vec![
                Message::assistant("m1", "a"),
                Message::assistant("m2", "y").with_selected_snapshot_index(0),
            ],
        ];

        for frame in frames {
            manager.sync_from_messages(&frame);
            let first: Vec<_> = ["m1", "m2"]
                .iter()
                .map(|id| manager.state_by_id(id).cloned())
                .collect();
            manager.sync_from_messages(&frame);
            let second: Vec<_> = ["m1", "m2"]
                .iter()
                .map(|id| manager.state_by_id(id).cloned())
                .collect();
            assert_eq!(first, second);
            assert_invariants(&manager);
        }
    }

    #[test]
    fn test_missing_messages_are_evicted() {
        let (mut manager, _) = manager();
        manager.sync_from_messages(&[Message::assistant("m1", "a"), Message::assistant("m2", "b")]);
        manager.set_pending("m1", true);

        manager.sync_from_messages(&[Message::assistant("m2", "b")]);

        assert!(manager.state_by_id("m1").is_none());
        assert!(!manager.is_pending("m1"));
        assert!(manager.state_by_id("m2").is_some());
    }

    #[test]
    fn test_reset_clears_everything() {
        let (mut manager, _) = manager();
        manager.sync_from_messages(&[Message::assistant("m1", "a")]);
        manager.set_pending("m1", true);
        manager.reset();

        assert_eq!(manager.tracked_count(), 0);
        assert!(!manager.is_pending("m1"));
    }

    #[test]
    fn test_advance_claims_regeneration_once() {
        let (mut manager, _) = manager();
        manager.sync_from_messages(&[Message::assistant("m1", "a")]);

        assert!(matches!(
            manager.advance_or_begin_regeneration("m1"),
            NextStep::Regenerate(_)
        ));
        assert!(manager.is_pending("m1"));
        assert_eq!(
            manager.advance_or_begin_regeneration("m1"),
            NextStep::AlreadyPending
        );
        assert_eq!(
            manager.advance_or_begin_regeneration("missing"),
            NextStep::Untracked
        );
    }

    #[test]
    fn test_step_back_stops_at_oldest() {
        let (mut manager, _) = manager();
        manager.sync_from_messages(&[Message::assistant("m1", "a")]);
        assert!(manager.step_back("m1").is_none());
        assert!(manager.step_back("missing").is_none());
    }

    #[tokio::test]
    async fn test_persist_selection_uses_dedicated_write() {
        let (mut manager, store) = manager();
        let messages = vec![Message::assistant("m1", "a"), Message::assistant("m1", "b")];
        store.set_history("char-1", vec![messages[1].clone()]);
        manager.sync_from_messages(&messages[..1]);
        manager.sync_from_messages(&messages[1..]);
        let state = manager.step_back("m1").unwrap();

        let outcome = manager.persist_selection("char-1", "m1", &state).await;

        assert_eq!(outcome, PersistOutcome::Persisted);
        assert_eq!(store.call_count(StoreOperation::SetSelectedSnapshotIndex), 1);
        assert_eq!(store.call_count(StoreOperation::UpdateMessage), 0);
        let stored = store.message("char-1", "m1").unwrap();
        assert_eq!(stored.metadata.selected_snapshot_index, Some(0));
    }

    #[tokio::test]
    async fn test_persist_selection_falls_back_to_update() {
        let (mut manager, store) = manager();
        store.set_history("char-1", vec![Message::assistant("m1", "a")]);
        store.fail(StoreOperation::SetSelectedSnapshotIndex, true);
        manager.sync_from_messages(&store.active_history());
        let state = manager.state_by_id("m1").unwrap().clone();

        let outcome = manager.persist_selection("char-1", "m1", &state).await;

        assert_eq!(outcome, PersistOutcome::PersistedViaFallback);
        assert_eq!(store.call_count(StoreOperation::UpdateMessage), 1);
        let stored = store.message("char-1", "m1").unwrap();
        assert_eq!(stored.metadata.selected_snapshot_index, Some(0));
    }

    #[tokio::test]
    async fn test_persist_selection_swallows_double_failure() {
        let (mut manager, store) = manager();
        store.set_history("char-1", vec![Message::assistant("m1", "a")]);
        store.fail(StoreOperation::SetSelectedSnapshotIndex, true);
        store.fail(StoreOperation::UpdateMessage, true);
        manager.sync_from_messages(&store.active_history());
        let state = manager.state_by_id("m1").unwrap().clone();

        let outcome = manager.persist_selection("char-1", "m1", &state).await;

        assert_eq!(outcome, PersistOutcome::Failed);
        assert_eq!(manager.state_by_id("m1").unwrap().active_index(), 0);
    }

    #[tokio::test]
    async fn test_persist_selection_skips_redundant_and_invalid_writes() {
        let (mut manager, store) = manager();
        store.set_history(
            "char-1",
            vec![Message::assistant("m1", "a").with_selected_snapshot_index(0)],
        );
        manager.sync_from_messages(&store.active_history());
        let state = manager.state_by_id("m1").unwrap().clone();

        assert_eq!(
            manager.persist_selection("char-1", "m1", &state).await,
            PersistOutcome::Skipped
        );
        assert_eq!(
            manager.persist_selection("", "m1", &state).await,
            PersistOutcome::Skipped
        );
        assert_eq!(
            manager.persist_selection("char-1", "gone", &state).await,
            PersistOutcome::Skipped
        );
        assert_eq!(store.call_count(StoreOperation::SetSelectedSnapshotIndex), 0);
        assert_eq!(store.call_count(StoreOperation::UpdateMessage), 0);
    }
}
