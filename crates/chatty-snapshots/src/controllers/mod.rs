pub mod hooks;
pub mod message_action_controller;

pub use hooks::{ConfirmRequest, ControllerHooks};
pub use message_action_controller::{ActionOutcome, MessageActionController};
