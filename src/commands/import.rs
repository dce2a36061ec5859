//! Import of exported chat messages
//!
//! The export format is a JSON array of message objects using camelCase
//! keys: `chatId`, `role`, `content` and optionally `imagePath`,
//! `provider`, `model` and `timestamp` (RFC 3339). Any `id` in the file is
//! ignored; the database assigns fresh ids.

use crate::error::{CtxtrimError, Result};
use crate::message::{Message, Role};
use crate::storage::SqliteStorage;
use anyhow::Context;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Deserialize;
use std::path::Path;

/// One message as found in an export file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    /// Owning chat
    pub chat_id: i64,
    /// `user` or `assistant`
    pub role: String,
    /// Message body
    #[serde(default)]
    pub content: String,
    /// Attached screenshot
    #[serde(default)]
    pub image_path: Option<String>,
    /// Provider that handled the message
    #[serde(default)]
    pub provider: Option<String>,
    /// Model that handled the message
    #[serde(default)]
    pub model: Option<String>,
    /// Creation time; import time when absent
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ImportRecord {
    /// Converts the record, rejecting unknown roles
    pub fn into_message(self) -> Result<Message> {
        let role: Role = self.role.parse()?;
        let mut message = Message::new(self.chat_id, role, self.content);
        message.image_path = self.image_path;
        message.provider = self.provider;
        message.model = self.model;
        if let Some(timestamp) = self.timestamp {
            message.timestamp = timestamp;
        }
        Ok(message)
    }
}

/// Parses an export file into messages
///
/// # Errors
///
/// Returns an IO error if the file cannot be read, a serialization error if
/// it is not a JSON array of records, or a storage error naming the first
/// record with an unknown role
pub fn read_export(path: &Path) -> Result<Vec<Message>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read export file {}", path.display()))?;
    let records: Vec<ImportRecord> =
        serde_json::from_str(&contents).map_err(CtxtrimError::Serialization)?;

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            record
                .into_message()
                .with_context(|| format!("Invalid record at index {}", index))
        })
        .collect()
}

/// Imports an export file into the store and returns the stored messages
pub fn run_import(storage: &SqliteStorage, path: &Path) -> Result<Vec<Message>> {
    let messages = read_export(path)?;
    tracing::info!(
        count = messages.len(),
        path = %path.display(),
        "Importing messages"
    );

    let stored = storage.import_messages(messages)?;

    let mut chats: Vec<i64> = stored.iter().map(|m| m.chat_id).collect();
    chats.sort_unstable();
    chats.dedup();

    println!(
        "{}",
        format!(
            "Imported {} messages into {} chat(s)",
            stored.len(),
            chats.len()
        )
        .green()
    );
    Ok(stored)
}
