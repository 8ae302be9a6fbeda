//! Reset command: clear the saved conversation and retrieval context.

use anyhow::Result;
use console::style;
use dialoguer::Confirm;

use crate::state::AppState;

pub async fn reset_conversation(state: &AppState, force: bool, json: bool) -> Result<()> {
    let mut conversation = state.conversation();
    let before = conversation.load().await.len();

    if !force && !json && before > 1 {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete the saved conversation ({} messages)?",
                style(before).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let after = conversation.reset().await.len();
    tracing::info!(removed = before.saturating_sub(after), "conversation reset");

    if json {
        let out = serde_json::json!({
            "reset": true,
            "messages_before": before,
            "messages_after": after,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!("  {} Conversation cleared.", style("✓").green().bold());
        println!();
    }
    Ok(())
}
