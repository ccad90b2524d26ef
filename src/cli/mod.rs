pub mod app;
pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "homebase")]
#[command(about = "Homebase CLI - journal, secrets and code projects from the terminal")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Sign in, sign out and session status")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Journal entries")]
    Journal {
        #[command(subcommand)]
        cmd: commands::journal::JournalCommands,
    },

    #[command(about = "Stored secrets")]
    Secrets {
        #[command(subcommand)]
        cmd: commands::secrets::SecretsCommands,
    },

    #[command(about = "Code projects and AI generation")]
    Projects {
        #[command(subcommand)]
        cmd: commands::projects::ProjectsCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, output_format).await,
        Commands::Journal { cmd } => commands::journal::handle(cmd, output_format).await,
        Commands::Secrets { cmd } => commands::secrets::handle(cmd, output_format).await,
        Commands::Projects { cmd } => commands::projects::handle(cmd, output_format).await,
    }
}
