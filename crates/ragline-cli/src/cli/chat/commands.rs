//! Slash command parsing for the chat loop.
//!
//! Commands start with `/` and provide in-chat controls for the
//! conversation, the generation channel, and retrieval evidence.

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Clear the terminal screen.
    Clear,
    /// Exit the chat session.
    Exit,
    /// Reset the conversation to the intro message.
    Reset,
    /// Drop the generation channel and open a new one.
    Reconnect,
    /// Reprint the conversation.
    History,
    /// Show the evidence behind the last answer.
    Sources,
    /// Request autocomplete candidates for partial input.
    Suggest(String),
    /// Show turn and connection state.
    Status,
    /// Unknown command.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd.to_lowercase(), arg.trim()),
        None => (trimmed.to_lowercase(), ""),
    };

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/clear" | "/cls" => Some(ChatCommand::Clear),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        "/reset" | "/new" => Some(ChatCommand::Reset),
        "/reconnect" => Some(ChatCommand::Reconnect),
        "/history" => Some(ChatCommand::History),
        "/sources" | "/src" => Some(ChatCommand::Sources),
        "/status" => Some(ChatCommand::Status),
        "/suggest" | "/s" => {
            if arg.is_empty() {
                Some(ChatCommand::Unknown("/suggest requires some text".to_string()))
            } else {
                Some(ChatCommand::Suggest(arg.to_string()))
            }
        }
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

/// Help text listing all available commands.
pub fn help_text() -> String {
    let rows = [
        ("/help", "Show this help message"),
        ("/reset", "Clear the conversation"),
        ("/reconnect", "Reopen the generation channel"),
        ("/history", "Show the conversation"),
        ("/sources", "Show sources for the last answer"),
        ("/suggest <text>", "Suggest questions starting with <text>"),
        ("/status", "Show turn and connection state"),
        ("/clear", "Clear the screen"),
        ("/exit", "End the chat session"),
    ];

    let mut out = format!("\n  {}\n\n", style("Available commands:").bold());
    for (cmd, what) in rows {
        out.push_str(&format!("  {}  {}\n", style(format!("{cmd:<16}")).cyan(), what));
    }
    out.push_str(&format!(
        "\n  {}\n\n",
        style("Ctrl+D to exit. The conversation is saved between sessions.").dim()
    ));
    out
}
