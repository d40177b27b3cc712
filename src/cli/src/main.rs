//! Protogen CLI - run sandboxed protobuf code-generation plugins locally.
//!
//! Provides generate, plugin catalog, and configuration commands.

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use protogen_core::config::Config;
use protogen_core::telemetry::init_logging;

use commands::{config, generate, plugins, Context};
use output::OutputFormat;

/// Protogen - sandboxed protobuf plugin runner
#[derive(Parser)]
#[command(
    name = "protogen",
    version,
    about = "Protogen - sandboxed protobuf plugin runner",
    long_about = "Resolve code-generation plugins from the catalog and run them in hardened containers.",
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output_format: OutputFormat,

    /// Configuration file (TOML)
    #[arg(short, long = "config", global = true, env = "PROTOGEN_CONFIG")]
    config_file: Option<PathBuf>,

    /// Read plugins from a JSON catalog file instead of the database
    #[arg(long, global = true, env = "PROTOGEN_CATALOG")]
    catalog: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a plugin on a CodeGeneratorRequest
    Generate(generate::GenerateArgs),

    /// Plugin catalog operations
    #[command(subcommand)]
    Plugins(plugins::PluginCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config_file.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging).context("Failed to initialize logging")?;

    let ctx = Context {
        config,
        catalog_file: cli.catalog,
    };
    let format = cli.output_format;

    match cli.command {
        Commands::Generate(args) => generate::execute(args, &ctx).await,
        Commands::Plugins(cmd) => plugins::execute(cmd, &ctx, format).await,
        Commands::Config(cmd) => config::execute(cmd, &ctx, format).await,
    }
}
