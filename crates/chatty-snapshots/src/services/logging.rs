use std::sync::mpsc::Receiver;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

use super::error_collector_layer::ErrorCollectorLayer;
use crate::models::ErrorEntry;
use crate::settings::SnapshotSettings;

/// Build the filter from `RUST_LOG`, falling back to the configured directive
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber: fmt output plus the error collector.
///
/// Returns the receiving end of the collector; drain it into an
/// `ErrorStore` to surface warnings in the UI.
pub fn init_tracing(settings: &SnapshotSettings) -> Result<Receiver<ErrorEntry>, TryInitError> {
    let (collector, receiver) = ErrorCollectorLayer::new(settings.error_store_capacity);

    tracing_subscriber::registry()
        .with(env_filter(&settings.log_filter))
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(collector)
        .try_init()?;

    Ok(receiver)
}
