use serde::{Deserialize, Serialize};

/// Text of the confirmation shown before a message is deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeletePrompt {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
}

impl Default for DeletePrompt {
    fn default() -> Self {
        Self {
            title: "Delete message".to_string(),
            message: "Delete this message and all of its versions?".to_string(),
            confirm_label: "Delete".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    /// Ask before deleting; when false the confirm hook is never called
    pub confirm_delete: bool,
    pub delete_prompt: DeletePrompt,
    /// Default tracing directive, overridden by `RUST_LOG`
    pub log_filter: String,
    pub error_store_capacity: usize,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            confirm_delete: true,
            delete_prompt: DeletePrompt::default(),
            log_filter: "info".to_string(),
            error_store_capacity: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: SnapshotSettings =
            serde_json::from_str(r#"{"confirm_delete": false, "delete_prompt": {"title": "Remove"}}"#)
                .unwrap();

        assert!(!settings.confirm_delete);
        assert_eq!(settings.delete_prompt.title, "Remove");
        assert_eq!(settings.delete_prompt.confirm_label, "Delete");
        assert_eq!(settings.log_filter, "info");
        assert_eq!(settings.error_store_capacity, 100);
    }
}
