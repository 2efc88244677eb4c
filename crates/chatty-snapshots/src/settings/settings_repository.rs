use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use super::snapshot_settings::SnapshotSettings;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Path error: {0}")]
    PathError(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait SettingsRepository: Send + Sync + 'static {
    /// Load settings from storage, defaults when nothing was saved yet
    fn load(&self) -> BoxFuture<'static, SettingsResult<SnapshotSettings>>;

    /// Save settings to storage
    fn save(&self, settings: SnapshotSettings) -> BoxFuture<'static, SettingsResult<()>>;
}
