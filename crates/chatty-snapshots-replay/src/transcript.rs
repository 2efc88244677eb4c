use std::path::Path;

use anyhow::{Context, Result};
use chatty_snapshots::Message;
use serde::Deserialize;

/// One recorded event: a new authoritative message list or a user click
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayStep {
    Sync(Vec<Message>),
    Prev(String),
    Next(String),
    Delete(String),
}

impl ReplayStep {
    pub fn label(&self) -> String {
        match self {
            ReplayStep::Sync(messages) => format!("sync({})", messages.len()),
            ReplayStep::Prev(id) => format!("prev({})", id),
            ReplayStep::Next(id) => format!("next({})", id),
            ReplayStep::Delete(id) => format!("delete({})", id),
        }
    }
}

pub fn parse(contents: &str) -> Result<Vec<ReplayStep>> {
    serde_json::from_str(contents).context("Failed to parse transcript")
}

pub fn load(path: &Path) -> Result<Vec<ReplayStep>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript {}", path.display()))?;
    parse(&contents)
}
