use serde::Serialize;

/// Version history tracked for one assistant message.
///
/// `entries` is never empty, `latest_index` is always `entries.len() - 1`
/// and `active_index` stays within `0..=latest_index`. `follow_latest`
/// mirrors `active_index == latest_index` after every mutation made through
/// `SnapshotManager`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotState {
    pub(crate) entries: Vec<String>,
    pub(crate) active_index: usize,
    pub(crate) latest_index: usize,
    pub(crate) follow_latest: bool,
    pub(crate) last_synced_text: String,
}

impl SnapshotState {
    /// Start tracking a message, showing its newest entry
    pub(crate) fn from_entries(entries: Vec<String>) -> Self {
        debug_assert!(!entries.is_empty());
        let latest_index = entries.len().saturating_sub(1);
        let last_synced_text = entries.last().cloned().unwrap_or_default();
        Self {
            entries,
            active_index: latest_index,
            latest_index,
            follow_latest: true,
            last_synced_text,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn latest_index(&self) -> usize {
        self.latest_index
    }

    pub fn follow_latest(&self) -> bool {
        self.follow_latest
    }

    pub fn last_synced_text(&self) -> &str {
        &self.last_synced_text
    }

    pub fn active_text(&self) -> &str {
        self.entries
            .get(self.active_index)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn latest_text(&self) -> &str {
        self.entries
            .get(self.latest_index)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn is_valid_index(&self, index: usize) -> bool {
        index < self.entries.len()
    }

    pub(crate) fn refresh_follow(&mut self) {
        self.follow_latest = self.active_index == self.latest_index;
    }

    /// Swap in a backend history wholesale, keeping the active index in range
    pub(crate) fn replace_entries(&mut self, entries: Vec<String>) {
        if entries.is_empty() {
            return;
        }
        self.entries = entries;
        self.latest_index = self.entries.len() - 1;
        self.active_index = self.active_index.min(self.latest_index);
        self.last_synced_text = self.entries[self.latest_index].clone();
        self.refresh_follow();
    }

    /// Append a new newest entry and return its index
    pub(crate) fn push_latest(&mut self, text: &str) -> usize {
        self.entries.push(text.to_string());
        self.latest_index = self.entries.len() - 1;
        self.latest_index
    }
}

/// Render model for one message's version switcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotView {
    pub message_id: String,
    /// 1-based position of the displayed version
    pub position: usize,
    pub total: usize,
    pub text: String,
    pub pending: bool,
    pub is_latest: bool,
    pub can_go_prev: bool,
    /// Next either advances or requests a regeneration; blocked only while one is pending
    pub can_go_next: bool,
}

impl SnapshotView {
    pub(crate) fn new(message_id: &str, state: &SnapshotState, pending: bool) -> Self {
        let is_latest = state.active_index == state.latest_index;
        Self {
            message_id: message_id.to_string(),
            position: state.active_index + 1,
            total: state.entries.len(),
            text: state.active_text().to_string(),
            pending,
            is_latest,
            can_go_prev: state.active_index > 0,
            can_go_next: !(is_latest && pending),
        }
    }
}
