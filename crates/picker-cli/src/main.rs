//! picker: file-picker session tool.
//!
//! Builds the launch form for a SharePoint or OneDrive picker and drives
//! simulated picker sessions through the host protocol.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use tracing::error;

use crate::config::{Config, Mode};

/// picker: file-picker host tool
#[derive(Parser)]
#[command(name = "picker", version, about = "Launch and simulate embedded file-picker sessions")]
struct Cli {
    /// Config file path
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Picker deployment: odsp or consumer
    #[arg(short, long, global = true)]
    mode: Option<Mode>,

    /// SharePoint web URL (odsp mode)
    #[arg(short, long = "base-url", global = true)]
    base_url: Option<String>,

    /// Print bearer tokens instead of redacting them
    #[arg(long = "show-token", global = true)]
    show_token: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the form that loads the picker into a frame
    Launch,

    /// Run a scripted session: handshake, authenticate, then pick or close
    Simulate {
        /// Item id to pick (repeatable); closes the picker when omitted
        #[arg(long = "item")]
        items: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries JSON output.
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("picker_cli=debug,picker_host=debug,picker_core=debug")
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("picker_cli=warn,picker_host=warn")
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    // Load config file.
    let config_path = cli
        .config
        .as_deref()
        .map(config::expand_tilde)
        .unwrap_or_else(config::default_path);
    let mut cfg = match Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("picker: {e:#}");
            std::process::exit(1);
        }
    };

    // CLI flags override config.
    if let Some(mode) = cli.mode {
        cfg.picker.mode = mode;
    }
    if let Some(base_url) = cli.base_url {
        cfg.picker.base_url = base_url;
    }

    let result = match cli.command {
        Command::Launch => commands::launch::run(&cfg, cli.show_token).await,
        Command::Simulate { items } => {
            commands::simulate::run(&cfg, &items, cli.show_token).await
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("picker: {e:#}");
        std::process::exit(1);
    }
}
