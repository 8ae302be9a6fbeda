//! History command: print the saved conversation.

use anyhow::Result;
use console::style;
use ragline_types::chat::Message;

use crate::cli::chat::renderer::{cache_footer, message_body, role_label};
use crate::state::AppState;

/// Print the persisted conversation, or its last `limit` messages.
pub async fn show_history(state: &AppState, limit: Option<usize>, json: bool) -> Result<()> {
    let mut conversation = state.conversation();
    let messages = conversation.load().await;
    let shown = tail(messages, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(shown)?);
        return Ok(());
    }

    if messages.len() <= 1 {
        println!();
        println!("  {}", style("No conversation yet.").dim());
        println!();
        return Ok(());
    }

    println!();
    if shown.len() < messages.len() {
        println!(
            "  {}",
            style(format!("... {} earlier message(s)", messages.len() - shown.len())).dim()
        );
    }
    for message in shown {
        println!("  {} {}", role_label(message), message_body(message));
        if let Some(footer) = cache_footer(message) {
            println!("  {}", style(footer).dim());
        }
    }
    println!();
    Ok(())
}

fn tail(messages: &[Message], limit: Option<usize>) -> &[Message] {
    match limit {
        Some(n) if n < messages.len() => &messages[messages.len() - n..],
        _ => messages,
    }
}
