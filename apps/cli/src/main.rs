//! biogate CLI - chat with an assistant after biometric phone authentication.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::Context;
use tracing::debug;

/// biogate - Chat assistant gated by biometric phone authentication.
#[derive(Parser)]
#[command(name = "biogate")]
#[command(about = "Chat assistant gated by biometric phone authentication")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Mirror logs to stderr
    #[arg(long, global = true)]
    log_stderr: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the widget and chat interactively (default)
    Chat,

    /// List the countries available for phone authentication
    Countries {
        /// Filter by dial code or name prefix
        query: Option<String>,
    },

    /// Show the saved session
    Status,

    /// Forget the saved session and transcript
    Reset,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let ctx = match Context::load() {
        Ok(ctx) => ctx,
        Err(e) => {
            output::print_error(&format!("{:#}", e), &cli.format);
            std::process::exit(1);
        }
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| ctx.config.log_level.clone());
    widget_config_and_utils::init_logging("cli", &level, Some(&ctx.paths), cli.log_stderr);
    debug!(base_dir = %ctx.paths.base_dir().display(), "biogate starting");

    let result = match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => commands::chat(&ctx).await,
        Commands::Countries { query } => commands::countries(&ctx, query.as_deref(), &cli.format).await,
        Commands::Status => commands::status(&ctx, &cli.format),
        Commands::Reset => commands::reset(&ctx, &cli.format),
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e), &cli.format);
        std::process::exit(1);
    }
}
