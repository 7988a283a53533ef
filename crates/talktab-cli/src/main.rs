use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "talktab")]
#[command(about = "Talking Tables - edit DBML schemas by conversation", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./config.toml, then ~/.config/talktab/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive schema-editing conversation
    Chat {
        /// Conversation to resume (a new one is started when omitted)
        #[arg(long)]
        session: Option<String>,
    },
    /// Check that the schema validation service is reachable
    Health,
    /// Validate a DBML file against the validation service
    Validate {
        /// Candidate schema file
        #[arg(long = "new")]
        new_file: PathBuf,
        /// Previously accepted schema file, used as the diff baseline
        #[arg(long = "old")]
        old_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat { session } => commands::chat::run(cli.config, session).await?,
        Commands::Health => commands::health::run(cli.config).await?,
        Commands::Validate { new_file, old_file } => {
            commands::validate::run(cli.config, new_file, old_file).await?
        }
    }

    Ok(())
}
