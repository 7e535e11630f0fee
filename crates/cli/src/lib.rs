pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use provy_core::config::AppConfig;

#[derive(Debug, Parser)]
#[command(
    name = "provy",
    about = "Provy operator CLI",
    long_about = "Chat with the provisioning assistant, compute subnet allocation plans, and inspect runtime readiness.",
    after_help = "Examples:\n  provy plan --parent 10.0.0.0/16 --subnet public:62 --subnet private:14 --nat\n  provy chat\n  provy doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive chat session with the assistant")]
    Chat {
        #[arg(long, default_value = "operator", help = "User id attributed to the session")]
        user: String,
    },
    #[command(about = "Compute a subnet allocation plan without provisioning anything")]
    Plan {
        #[arg(long, help = "Parent CIDR block, e.g. 10.0.0.0/16")]
        parent: String,
        #[arg(
            long = "subnet",
            value_name = "TIER:HOSTS",
            help = "Repeatable subnet request, e.g. --subnet public:62"
        )]
        subnets: Vec<String>,
        #[arg(long, help = "Request an internet gateway even with no public subnets")]
        internet_gateway: bool,
        #[arg(long, help = "Request a NAT gateway for private subnets")]
        nat: bool,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, provider readiness, and allocation self-checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat { user } => commands::chat::run(&user),
        Command::Plan { parent, subnets, internet_gateway, nat, json } => {
            commands::plan::run(&parent, &subnets, internet_gateway, nat, json)
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}

pub(crate) fn init_logging(config: &AppConfig) {
    use provy_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}
