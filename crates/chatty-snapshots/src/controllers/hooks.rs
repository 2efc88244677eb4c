use std::sync::Arc;

use futures::FutureExt;
use tracing::warn;

use crate::models::{ErrorEntry, ErrorStore, Message};
use crate::repositories::BoxFuture;
use crate::settings::DeletePrompt;

/// What the host is asked to confirm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmRequest {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
    pub message_id: String,
}

impl ConfirmRequest {
    pub fn delete(prompt: &DeletePrompt, message_id: &str) -> Self {
        Self {
            title: prompt.title.clone(),
            message: prompt.message.clone(),
            confirm_label: prompt.confirm_label.clone(),
            message_id: message_id.to_string(),
        }
    }
}

pub type ErrorHook = Arc<dyn Fn(&str) + Send + Sync>;
pub type ConfirmHook = Arc<dyn Fn(ConfirmRequest) -> BoxFuture<'static, bool> + Send + Sync>;
pub type RenderHook = Arc<dyn Fn() + Send + Sync>;
pub type HistoryHook = Arc<dyn Fn() -> Vec<Message> + Send + Sync>;
pub type CharacterHook = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Callbacks the host UI plugs into the controller. Unset hooks fall back to
/// defaults: errors are logged and recorded into the error store when one is
/// attached, confirmations approve, re-render does
/// nothing, history and character id come from the store.
#[derive(Clone, Default)]
pub struct ControllerHooks {
    pub(crate) notify_error: Option<ErrorHook>,
    pub(crate) confirm_action: Option<ConfirmHook>,
    pub(crate) re_render: Option<RenderHook>,
    pub(crate) active_history: Option<HistoryHook>,
    pub(crate) current_character_id: Option<CharacterHook>,
    pub(crate) error_store: Option<Arc<ErrorStore>>,
}

impl ControllerHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_error(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.notify_error = Some(Arc::new(hook));
        self
    }

    /// Record failures here when no `on_error` hook is installed
    pub fn with_error_store(mut self, error_store: Arc<ErrorStore>) -> Self {
        self.error_store = Some(error_store);
        self
    }

    pub fn on_confirm<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ConfirmRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = bool> + Send + 'static,
    {
        self.confirm_action = Some(Arc::new(move |request: ConfirmRequest| hook(request).boxed()));
        self
    }

    pub fn on_re_render(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.re_render = Some(Arc::new(hook));
        self
    }

    pub fn with_active_history(
        mut self,
        hook: impl Fn() -> Vec<Message> + Send + Sync + 'static,
    ) -> Self {
        self.active_history = Some(Arc::new(hook));
        self
    }

    pub fn with_current_character_id(
        mut self,
        hook: impl Fn() -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.current_character_id = Some(Arc::new(hook));
        self
    }

    pub(crate) fn notify_error(&self, message_id: &str, message: &str) {
        if let Some(hook) = &self.notify_error {
            hook(message);
            return;
        }
        if let Some(error_store) = &self.error_store {
            error_store.add_entry(ErrorEntry::notification(message, Some(message_id)));
        }
        warn!(message_id = %message_id, error = %message, "Snapshot action failed");
    }

    pub(crate) fn confirm(&self, request: ConfirmRequest) -> BoxFuture<'static, bool> {
        match &self.confirm_action {
            Some(hook) => hook(request),
            None => async { true }.boxed(),
        }
    }

    pub(crate) fn re_render(&self) {
        if let Some(hook) = &self.re_render {
            hook();
        }
    }
}
