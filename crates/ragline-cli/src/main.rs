//! ragline CLI entry point.
//!
//! Binary name: `ragline`
//!
//! Parses CLI arguments, sets up tracing, loads configuration and storage,
//! then dispatches to the command handler. With no subcommand, starts an
//! interactive chat.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use ragline_observe::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,ragline_cli=debug,ragline_core=debug,ragline_infra=debug",
        _ => "trace",
    };
    let mut options = TracingOptions::new(filter);
    options.json = cli.log_json;
    options.enable_otel = cli.otel;
    if let Err(err) = init_tracing(&options) {
        eprintln!("failed to initialize tracing: {err}");
    }

    let command = cli.command.clone().unwrap_or(Commands::Chat);

    // Shell completions don't need app state
    if let Commands::Completions { shell } = command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(shell, &mut cmd, "ragline", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(cli.config.as_deref(), cli.ephemeral).await?;

    let result = match command {
        Commands::Chat => cli::chat::loop_runner::run_chat_loop(&state).await,
        Commands::Ask {
            query,
            connect_timeout,
        } => cli::ask::ask(&state, &query.join(" "), connect_timeout, cli.json, cli.quiet).await,
        Commands::History { limit } => cli::history::show_history(&state, limit, cli.json).await,
        Commands::Reset { force } => cli::reset::reset_conversation(&state, force, cli.json).await,
        Commands::Status => cli::status::status(&state, cli.json).await,
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    state.close().await;
    shutdown_tracing();
    result
}
