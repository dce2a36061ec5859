/*!
Command handlers for the CLI

Each submodule backs one or more subcommands:

- `import`   Load a JSON message export into the history database
- `inspect`  List chats, per-message tokens and chat costs
- `optimize` Preview a strategy and compress a chat in place
- `pricing`  Look up or list pricing rates

Handlers print either a table or, with `--json`, pretty JSON.
*/

use crate::error::{CtxtrimError, Result};

pub mod import;
pub mod inspect;
pub mod optimize;
pub mod pricing;

/// Print a value as pretty JSON on stdout
pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(CtxtrimError::Serialization)?;
    println!("{}", json);
    Ok(())
}

/// Format a USD amount for tables
pub(crate) fn format_usd(amount: f64) -> String {
    format!("${:.6}", amount)
}

/// Shorten text to a single table-friendly line
pub(crate) fn preview_text(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > max_chars || text.lines().nth(1).is_some() {
        let short: String = line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", short)
    } else {
        line.to_string()
    }
}
