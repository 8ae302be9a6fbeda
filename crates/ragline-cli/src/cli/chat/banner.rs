//! Welcome banner display for chat sessions.

use console::style;
use ragline_types::config::ServerConfig;

/// Print the welcome banner at the start of a chat session.
///
/// Shows the backend endpoints, where the conversation is kept, and how many
/// messages were restored from a previous session.
pub fn print_welcome_banner(server: &ServerConfig, storage: &str, restored: usize) {
    println!();
    println!("  {} {}", style("◆").cyan(), style("ragline").cyan().bold());
    println!("  {}", style("Ask questions about your documents.").dim());
    println!();
    println!("  {}  {}", style("Backend:").bold(), style(&server.base_url).dim());
    println!("  {}  {}", style("Channel:").bold(), style(&server.channel_url).dim());
    println!("  {}  {}", style("Storage:").bold(), style(storage).dim());
    if restored > 1 {
        println!(
            "  {}  {}",
            style("History:").bold(),
            style(format!("{restored} messages restored")).dim()
        );
    }
    println!();
    println!("  {}", style("Type /help for commands, Ctrl+D to exit").dim());
    println!("  {}", style("---").dim());
}
