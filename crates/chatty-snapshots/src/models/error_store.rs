use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::Receiver;
use std::time::SystemTime;

use parking_lot::Mutex;

#[derive(Clone, Debug, PartialEq)]
pub enum ErrorLevel {
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct ErrorEntry {
    pub timestamp: SystemTime,
    pub level: ErrorLevel,
    pub message: String,
    pub target: String,
    /// Message the event was about, when the event carried a `message_id` field
    pub message_id: Option<String>,
    pub fields: HashMap<String, String>,
}

impl ErrorEntry {
    /// Entry for an error reported to the user rather than captured from tracing
    pub fn notification(message: impl Into<String>, message_id: Option<&str>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            level: ErrorLevel::Error,
            message: message.into(),
            target: "notify".to_string(),
            message_id: message_id.map(str::to_string),
            fields: HashMap::new(),
        }
    }
}

/// Bounded log of recent warnings and errors, oldest dropped first
pub struct ErrorStore {
    entries: Mutex<VecDeque<ErrorEntry>>,
    max_entries: usize,
}

impl ErrorStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn add_entry(&self, entry: ErrorEntry) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    /// Move everything the collector layer has buffered into the store
    pub fn drain_from(&self, receiver: &Receiver<ErrorEntry>) -> usize {
        let mut drained = 0;
        while let Ok(entry) = receiver.try_recv() {
            self.add_entry(entry);
            drained += 1;
        }
        drained
    }

    pub fn get_all_entries(&self) -> Vec<ErrorEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn entries_for_message(&self, message_id: &str) -> Vec<ErrorEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.message_id.as_deref() == Some(message_id))
            .cloned()
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == ErrorLevel::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == ErrorLevel::Warning)
            .count()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
