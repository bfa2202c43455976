//! GridPin CLI - a duress-aware ATM in your terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{login, logs, register, speak, users};

/// GridPin - grid pattern PINs with a duress mode
#[derive(Parser)]
#[command(name = "gridpin", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new card holder
    Register {
        /// Card holder name (prompted if omitted)
        #[arg(long)]
        name: Option<String>,
        /// Pattern cell as row,col; repeat four times (interactive if omitted)
        #[arg(long = "pattern")]
        pattern: Vec<String>,
        /// Duress PIN (prompted if omitted)
        #[arg(long)]
        duress_pin: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Log in at the ATM and run transactions
    Login {
        /// Card holder name
        name: String,
    },

    /// List registered card holders
    Users {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Synthesize speech to a WAV file
    Speak {
        /// Text to read aloud
        text: String,
        /// Output file
        #[arg(short, long, default_value = "speech.wav")]
        out: PathBuf,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Register { name, pattern, duress_pin, json } => {
            register::run(name, pattern, duress_pin, json)
        }
        Commands::Login { name } => login::run(&name),
        Commands::Users { json } => users::run(json),
        Commands::Speak { text, out } => speak::run(&text, &out),
        Commands::Logs { command } => logs::run(command),
    }
}
