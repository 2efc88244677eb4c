use std::path::PathBuf;

use super::settings_repository::{BoxFuture, SettingsError, SettingsRepository, SettingsResult};
use super::snapshot_settings::SnapshotSettings;

pub struct SettingsJsonRepository {
    file_path: PathBuf,
}

impl SettingsJsonRepository {
    /// Create repository with XDG-compliant path
    pub fn new() -> SettingsResult<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SettingsError::PathError("Cannot determine config directory".into()))?;

        Ok(Self::with_path(
            config_dir.join("chatty").join("snapshot_settings.json"),
        ))
    }

    pub fn with_path(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> SettingsError {
    SettingsError::IoError(e.to_string())
}

impl SettingsRepository for SettingsJsonRepository {
    fn load(&self) -> BoxFuture<'static, SettingsResult<SnapshotSettings>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let contents = tokio::task::spawn_blocking(move || {
                if !path.exists() {
                    return Ok(None);
                }
                std::fs::read_to_string(&path).map(Some)
            })
            .await
            .map_err(join_error)?
            .map_err(|e| SettingsError::IoError(e.to_string()))?;

            let Some(contents) = contents else {
                return Ok(SnapshotSettings::default());
            };

            serde_json::from_str(&contents)
                .map_err(|e| SettingsError::SerializationError(e.to_string()))
        })
    }

    fn save(&self, settings: SnapshotSettings) -> BoxFuture<'static, SettingsResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let json = serde_json::to_string_pretty(&settings)
                .map_err(|e| SettingsError::SerializationError(e.to_string()))?;

            tokio::task::spawn_blocking(move || {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| SettingsError::IoError(e.to_string()))?;
                }

                // Write atomically using temp file + rename
                let temp_path = path.with_extension("json.tmp");
                std::fs::write(&temp_path, &json)
                    .map_err(|e| SettingsError::IoError(e.to_string()))?;
                std::fs::rename(&temp_path, &path)
                    .map_err(|e| SettingsError::IoError(e.to_string()))?;

                Ok::<(), SettingsError>(())
            })
            .await
            .map_err(join_error)?
        })
    }
}
