use chrono::{Duration, TimeZone, Utc};
use ctxtrim::message::Message;
use ctxtrim::storage::SqliteStorage;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn create_temp_storage() -> (SqliteStorage, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("history.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (storage, tmp)
}

/// Builds `pairs` user/assistant exchanges for chat `chat_id`
///
/// Each message body is `words` repetitions of a four-character word, so its
/// content estimate is roughly `words` tokens. Messages are unpersisted
/// (no ids), one minute apart, and assistant replies are tagged
/// openai/gpt-4o.
#[allow(dead_code)]
pub fn sample_chat(chat_id: i64, pairs: usize, words: usize) -> Vec<Message> {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let body = "tok ".repeat(words);

    (0..pairs * 2)
        .map(|i| {
            let timestamp = start + Duration::minutes(i as i64);
            if i % 2 == 0 {
                Message::user(chat_id, format!("{}{}", body, i)).with_timestamp(timestamp)
            } else {
                Message::assistant(chat_id, format!("{}{}", body, i))
                    .with_provider_model("openai", "gpt-4o")
                    .with_timestamp(timestamp)
            }
        })
        .collect()
}

/// A chat with varied content: questions, markdown, code and an image
#[allow(dead_code)]
pub fn mixed_chat(chat_id: i64) -> Vec<Message> {
    let start = Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap();
    let turns: Vec<Message> = vec![
        Message::user(chat_id, "How do I configure the reverse proxy for websockets?")
            .with_image("/tmp/nginx.png"),
        Message::assistant(
            chat_id,
            "You should use `proxy_set_header Upgrade $http_upgrade;` in the location block.\n\n```nginx\nlocation /ws {\n  proxy_pass http://backend;\n}\n```",
        )
        .with_provider_model("claude", "claude-3-5-haiku-20241022"),
        Message::user(chat_id, "What about **timeouts** on idle connections?"),
        Message::assistant(
            chat_id,
            "# Timeouts\n\nTry raising `proxy_read_timeout` to 3600s. I recommend keeping heartbeats enabled.",
        )
        .with_provider_model("deepseek", "deepseek-chat"),
        Message::user(chat_id, "> The connection still drops after a minute, any idea?"),
        Message::assistant(chat_id, "Check the load balancer idle timeout as well.")
            .with_provider_model("openai", "gpt-4o-mini"),
    ];

    turns
        .into_iter()
        .enumerate()
        .map(|(i, m)| m.with_timestamp(start + Duration::minutes(i as i64)))
        .collect()
}
