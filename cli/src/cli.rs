//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, GatewayOverrides, OutputFlags};
use crate::commands;

/// Time-bounded ephemeral environments
#[derive(Parser)]
#[command(
    name = "reclaim",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Dispatch gateway endpoint, e.g. https://gw.example.com/terraform
    #[arg(long, global = true, env = "RECLAIM_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Dispatch gateway API key
    #[arg(long, global = true, env = "RECLAIM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision an environment and destroy it when its lifetime runs out
    Up(commands::up::UpArgs),

    /// Destroy a previously provisioned environment
    Destroy(commands::destroy::DestroyArgs),

    /// Show the status of a run
    Status(commands::status::StatusArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            verbose: _,
            endpoint,
            api_key,
            command,
        } = self;
        let yes = matches!(&command, Command::Destroy(args) if args.yes);
        let app = AppContext::new(AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes },
            gateway: GatewayOverrides { endpoint, api_key },
        });

        match command {
            Command::Up(args) => commands::up::run(&app, &args).await,
            Command::Destroy(args) => commands::destroy::run(&app, &args).await,
            Command::Status(args) => commands::status::run(&app, &args).await,
            Command::Config(cmd) => commands::config::run(&app, cmd),
            Command::Version => commands::version::run(&app),
        }
    }
}
