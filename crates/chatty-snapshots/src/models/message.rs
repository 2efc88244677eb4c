use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    /// Any role the backend sends that this crate does not act on
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Audio,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(default)]
    pub text: String,
}

/// Recognized metadata fields; anything else the backend sends is dropped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default)]
    pub streaming: bool,

    #[serde(
        default,
        deserialize_with = "lenient_snapshot_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub selected_snapshot_index: Option<usize>,
}

/// Accepts any JSON value and keeps it only if it is a non-negative integer.
fn lenient_snapshot_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let index = match value {
        serde_json::Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u32::MAX as f64)
                .map(|f| f as u64)
        }),
        _ => None,
    };
    Ok(index.and_then(|i| usize::try_from(i).ok()))
}

/// A chat message as owned by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub content: MessageContent,
    /// Full version history as known to the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshots: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

impl Message {
    pub fn new(id: impl Into<String>, role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            kind: MessageKind::Text,
            content: MessageContent { text: text.into() },
            snapshots: None,
            metadata: MessageMetadata::default(),
        }
    }

    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, MessageRole::User, text)
    }

    pub fn assistant(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, MessageRole::Assistant, text)
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.metadata.streaming = streaming;
        self
    }

    pub fn with_snapshots<I, S>(mut self, snapshots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.snapshots = Some(snapshots.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_selected_snapshot_index(mut self, index: usize) -> Self {
        self.metadata.selected_snapshot_index = Some(index);
        self
    }

    pub fn text(&self) -> &str {
        &self.content.text
    }

    pub fn is_streaming(&self) -> bool {
        self.metadata.streaming
    }

    /// Only assistant text messages carry snapshot history
    pub fn is_snapshot_eligible(&self) -> bool {
        self.role == MessageRole::Assistant && self.kind == MessageKind::Text
    }

    /// Backend-provided history, if present and non-empty
    pub fn snapshot_history(&self) -> Option<&[String]> {
        self.snapshots.as_deref().filter(|s| !s.is_empty())
    }
}
