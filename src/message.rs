//! Chat message model
//!
//! Messages are owned by the surrounding application's message store. This
//! crate only reads them, except for the synthesized summary message that a
//! compression writes back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CtxtrimError;

/// Provider sentinel carried by synthesized summary messages
pub const SUMMARY_PROVIDER: &str = "system";

/// Model sentinel carried by synthesized summary messages
pub const SUMMARY_MODEL: &str = "summary";

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text (and screenshots) sent by the user
    User,
    /// Model responses, and synthesized summaries
    Assistant,
}

impl Role {
    /// Returns the lowercase wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CtxtrimError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(CtxtrimError::Storage(format!("Unknown message role: {}", other))),
        }
    }
}

/// A single message in a chat
///
/// Within a chat, messages are ordered by `timestamp` ascending. `provider`
/// and `model` are usually only present on assistant messages and record the
/// model that actually answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Store-assigned identifier, `None` until persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Owning chat
    pub chat_id: i64,
    /// Message author
    pub role: Role,
    /// Message body; markdown, code and LaTeX are opaque here
    #[serde(default)]
    pub content: String,
    /// Attached screenshot, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// Provider that produced or consumed the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model id used for the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a new, unpersisted message stamped with the current time
    pub fn new(chat_id: i64, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            chat_id,
            role,
            content: content.into(),
            image_path: None,
            provider: None,
            model: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use ctxtrim::message::{Message, Role};
    ///
    /// let msg = Message::user(1, "What is on my screen?");
    /// assert_eq!(msg.role, Role::User);
    /// assert!(msg.provider.is_none());
    /// ```
    pub fn user(chat_id: i64, content: impl Into<String>) -> Self {
        Self::new(chat_id, Role::User, content)
    }

    /// Creates a new assistant message
    pub fn assistant(chat_id: i64, content: impl Into<String>) -> Self {
        Self::new(chat_id, Role::Assistant, content)
    }

    /// Sets the store identifier
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Attaches an image reference
    pub fn with_image(mut self, image_path: impl Into<String>) -> Self {
        self.image_path = Some(image_path.into());
        self
    }

    /// Records the provider and model that handled the message
    ///
    /// # Examples
    ///
    /// ```
    /// use ctxtrim::message::Message;
    ///
    /// let msg = Message::assistant(1, "Looks like a stack trace.")
    ///     .with_provider_model("claude", "claude-3-5-haiku-20241022");
    /// assert_eq!(msg.provider.as_deref(), Some("claude"));
    /// ```
    pub fn with_provider_model(
        mut self,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        self.provider = Some(provider.into());
        self.model = Some(model.into());
        self
    }

    /// Overrides the creation time
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns true if this message is a synthesized conversation summary
    pub fn is_summary(&self) -> bool {
        self.role == Role::Assistant
            && self.provider.as_deref() == Some(SUMMARY_PROVIDER)
            && self.model.as_deref() == Some(SUMMARY_MODEL)
    }
}

/// Builds a summary message standing in for a compressed prefix of a chat
///
/// The message is structurally a normal assistant [`Message`] so it can be
/// stored alongside the rest of the chat, but carries the
/// `system`/`summary` provider and model sentinels.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use ctxtrim::message::{make_summary_message, Role};
///
/// let summary = make_summary_message("Earlier we discussed Rust.", 3, Utc::now());
/// assert_eq!(summary.role, Role::Assistant);
/// assert!(summary.is_summary());
/// assert!(summary.id.is_none());
/// ```
pub fn make_summary_message(
    content: impl Into<String>,
    chat_id: i64,
    timestamp: DateTime<Utc>,
) -> Message {
    Message {
        id: None,
        chat_id,
        role: Role::Assistant,
        content: content.into(),
        image_path: None,
        provider: Some(SUMMARY_PROVIDER.to_string()),
        model: Some(SUMMARY_MODEL.to_string()),
        timestamp,
    }
}
