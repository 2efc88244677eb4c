//! Snapshot history for assistant messages in chatty conversations.
//!
//! [`SnapshotManager`] keeps every generated version of an assistant message,
//! reconciled against the store's message list on each update, and
//! [`MessageActionController`] handles the prev/next/delete controls on top
//! of it. Both talk to the backend only through the [`MessageStore`] trait.

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;
pub mod settings;

pub use controllers::{ActionOutcome, ConfirmRequest, ControllerHooks, MessageActionController};
pub use models::{
    ErrorEntry, ErrorLevel, ErrorStore, Message, MessageKind, MessageRole, PersistOutcome,
    SharedSnapshotManager, SnapshotManager, SnapshotState, SnapshotView,
};
pub use repositories::{
    InMemoryMessageStore, MessageJsonStore, MessagePatch, MessageStore, StoreAction, StoreError,
    StoreResult,
};
pub use settings::{SettingsJsonRepository, SettingsRepository, SnapshotSettings};
