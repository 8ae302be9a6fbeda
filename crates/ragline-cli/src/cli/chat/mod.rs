//! Interactive terminal chat.
//!
//! Streams answers as they arrive, prints notifications above the prompt,
//! and offers slash commands for reset, reconnect, sources, and suggestions.
//! Entry point: `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;
