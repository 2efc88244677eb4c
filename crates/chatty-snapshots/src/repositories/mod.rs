pub mod error;
pub mod in_memory_store;
pub mod message_json_store;
pub mod message_store;

pub use error::{StoreError, StoreResult};
pub use in_memory_store::{InMemoryMessageStore, StoreOperation};
pub use message_json_store::MessageJsonStore;
pub use message_store::{
    BoxFuture, MessagePatch, MessageStore, MetadataPatch, QueuedAction, StoreAction,
};
