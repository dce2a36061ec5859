//! Test utilities for ctxtrim
//!
//! Builders for realistic chats with predictable token sizes.

use chrono::{Duration, TimeZone, Utc};

use crate::message::Message;

/// Builds a chat of `pairs` user/assistant exchanges
///
/// Every message carries a store id (1-based, in order), chat id 1 and a
/// timestamp one minute after the previous one. Contents are plain words of
/// roughly `tokens_per_message` estimated tokens; assistant messages are
/// tagged with an OpenAI provider/model.
pub fn conversation(pairs: usize, tokens_per_message: usize) -> Vec<Message> {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
    let body = "tok ".repeat(tokens_per_message);

    (0..pairs * 2)
        .map(|i| {
            let timestamp = start + Duration::minutes(i as i64);
            let message = if i % 2 == 0 {
                Message::user(1, format!("{}{}", body, i))
            } else {
                Message::assistant(1, format!("{}{}", body, i))
                    .with_provider_model("openai", "gpt-4o")
            };
            message.with_id(i as i64 + 1).with_timestamp(timestamp)
        })
        .collect()
}
