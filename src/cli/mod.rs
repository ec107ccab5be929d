use clap::{Parser, Subcommand};

pub mod config;
pub mod run;
pub mod version;

#[derive(Parser)]
#[command(name = "gatehouse")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Onboarding gate and event announcements for group chats", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot service
    Run {
        /// Path to config file (default: ~/.local/share/gatehouse/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Path to the state snapshot (default: next to the config file)
        #[arg(long)]
        state: Option<String>,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run { config, state } => run::execute(config, state).await,
        Commands::Version => version::execute(),
    }
}
