pub mod error_store;
pub mod message;
pub mod snapshot_manager;
pub mod snapshot_state;

pub use error_store::{ErrorEntry, ErrorLevel, ErrorStore};
pub use message::{Message, MessageContent, MessageKind, MessageMetadata, MessageRole};
pub use snapshot_manager::{NextStep, PersistOutcome, SharedSnapshotManager, SnapshotManager};
pub use snapshot_state::{SnapshotState, SnapshotView};
