//! Async readline input handling for the chat loop.
//!
//! Wraps `rustyline_async::Readline` to provide async line reading with
//! proper handling of EOF (Ctrl+D) and interrupt (Ctrl+C) signals. The prompt
//! carries a connection marker that follows the generation channel state.

use console::style;
use rustyline_async::{Readline, ReadlineError, ReadlineEvent, SharedWriter};

/// Events produced by the input handler.
#[derive(Debug)]
pub enum InputEvent {
    /// User submitted a line (trimmed).
    Message(String),
    /// End of file (Ctrl+D).
    Eof,
    /// Interrupt signal (Ctrl+C).
    Interrupted,
}

/// Async input handler wrapping rustyline_async.
pub struct ChatInput {
    rl: Readline,
    connected: bool,
}

impl ChatInput {
    /// Create a new chat input handler.
    ///
    /// Returns the input handler and a `SharedWriter` that can be used to
    /// print output without interfering with the readline prompt.
    pub fn new(connected: bool) -> Result<(Self, SharedWriter), ReadlineError> {
        let (rl, stdout) = Readline::new(prompt(connected))?;
        Ok((Self { rl, connected }, stdout))
    }

    /// Switch the prompt's connection marker. No-op if unchanged.
    pub fn set_connected(&mut self, connected: bool) {
        if self.connected != connected {
            self.connected = connected;
            let _ = self.rl.update_prompt(&prompt(connected));
        }
    }

    /// Read a line of input.
    ///
    /// Cancel safe: the partially typed line lives in the `Readline`, so
    /// dropping this future inside `select!` loses nothing.
    pub async fn read_line(&mut self) -> InputEvent {
        match self.rl.readline().await {
            Ok(ReadlineEvent::Line(line)) => InputEvent::Message(line.trim().to_string()),
            Ok(ReadlineEvent::Eof) => InputEvent::Eof,
            Ok(ReadlineEvent::Interrupted) => InputEvent::Interrupted,
            Err(_) => InputEvent::Eof,
        }
    }

    /// Make `line` reachable with the up arrow.
    pub fn remember(&mut self, line: &str) {
        let _ = self.rl.add_history_entry(line.to_string());
    }

    /// Clear the terminal screen.
    pub fn clear(&mut self) {
        let _ = self.rl.clear();
    }

    /// Print anything still buffered in the shared writer.
    pub fn flush(&mut self) {
        let _ = self.rl.flush();
    }
}

/// Prompt text: a green dot when the channel is open, red otherwise.
fn prompt(connected: bool) -> String {
    let marker = if connected {
        style("●").green()
    } else {
        style("●").red()
    };
    format!("  {} {} ", marker, style("You >").green().bold())
}
