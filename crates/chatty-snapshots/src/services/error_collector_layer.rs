use crate::models::{ErrorEntry, ErrorLevel};
use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::time::SystemTime;
use tracing::{
    Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::Layer;

/// Field name the snapshot code uses to tag events with the message they concern
const MESSAGE_ID_FIELD: &str = "message_id";

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    message_id: Option<String>,
    fields: HashMap<String, String>,
}

impl FieldVisitor {
    fn store(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            MESSAGE_ID_FIELD => self.message_id = Some(value),
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.store(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field, value.to_string());
    }
}

/// Tracing layer that forwards WARN and ERROR events to an `ErrorStore` feed
pub struct ErrorCollectorLayer {
    sender: SyncSender<ErrorEntry>,
}

impl ErrorCollectorLayer {
    pub fn new(capacity: usize) -> (Self, Receiver<ErrorEntry>) {
        let (tx, rx) = sync_channel(capacity.max(1));
        (Self { sender: tx }, rx)
    }
}

impl<S> Layer<S> for ErrorCollectorLayer
where
    S: Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        if !matches!(*metadata.level(), Level::WARN | Level::ERROR) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let entry = ErrorEntry {
            timestamp: SystemTime::now(),
            level: if *metadata.level() == Level::ERROR {
                ErrorLevel::Error
            } else {
                ErrorLevel::Warning
            },
            message: visitor.message.unwrap_or_default(),
            target: metadata.target().to_string(),
            message_id: visitor.message_id,
            fields: visitor.fields,
        };

        // Drop when full; logging must never block the UI loop.
        let _ = self.sender.try_send(entry);
    }
}
