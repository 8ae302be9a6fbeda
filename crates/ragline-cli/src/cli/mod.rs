//! CLI command definitions for the `ragline` binary.
//!
//! Uses clap derive macros for argument parsing. Running `ragline` with no
//! subcommand starts an interactive chat.

pub mod ask;
pub mod chat;
pub mod history;
pub mod reset;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Chat with your documents from the terminal.
#[derive(Parser)]
#[command(name = "ragline", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Read configuration from this file instead of the data directory.
    #[arg(long, global = true, env = "RAGLINE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Keep the conversation in memory only; nothing is read or written on disk.
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// Write log lines to stderr as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Start an interactive chat session (the default).
    Chat,

    /// Ask a single question and print the answer.
    Ask {
        /// The question. Multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Seconds to wait for the generation channel to open.
        #[arg(long, default_value_t = 10)]
        connect_timeout: u64,
    },

    /// Print the saved conversation.
    #[command(alias = "log")]
    History {
        /// Show only the last N messages.
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Clear the saved conversation back to the intro message.
    Reset {
        /// Skip confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },

    /// Show configuration, storage, and backend reachability.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Wait for Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_defaults_to_none() {
        let cli = Cli::parse_from(["ragline"]);
        assert!(cli.command.is_none());
        assert!(!cli.ephemeral);
    }

    #[test]
    fn ask_joins_words_and_accepts_global_flags() {
        let cli = Cli::parse_from(["ragline", "ask", "what", "is", "rag", "--json", "--ephemeral"]);
        assert!(cli.json);
        assert!(cli.ephemeral);
        match cli.command {
            Some(Commands::Ask {
                query,
                connect_timeout,
            }) => {
                assert_eq!(query.join(" "), "what is rag");
                assert_eq!(connect_timeout, 10);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::parse_from(["ragline", "-vv", "status"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Some(Commands::Status)));
    }

    #[test]
    fn reset_force_short_flag() {
        let cli = Cli::parse_from(["ragline", "reset", "-f"]);
        assert!(matches!(cli.command, Some(Commands::Reset { force: true })));
    }
}
