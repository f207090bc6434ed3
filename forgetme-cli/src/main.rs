use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod app;
mod config;
mod notifications_cmd;
mod premium_cmd;
mod reminders_cmd;
mod scheduler_file;
mod state;
mod storage;
mod task_cmd;

use app::App;

#[derive(Parser, Debug)]
#[command(
    name = "forgetme",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("FORGETME_BUILD_SHA"), ")"),
    about = "Forget Me Note: daily tasks with reminders that know when to stop"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Daily tasks
    Task {
        #[command(subcommand)]
        command: task_cmd::TaskCommand,
    },

    /// Task reminders (premium)
    Reminder {
        #[command(subcommand)]
        command: reminders_cmd::RemindersCommand,
    },

    /// Premium entitlement
    Premium {
        #[command(subcommand)]
        command: premium_cmd::PremiumCommand,
    },

    /// Local notification scheduler: inspect, permission, simulate delivery
    Notifications {
        #[command(subcommand)]
        command: notifications_cmd::NotificationsCommand,
    },

    /// Manage ~/.forgetme/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config.toml if missing
    Init,
    /// Print the effective configuration
    Check,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FORGETME_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config(),
            ConfigCommand::Check => config::config_check(),
        },
        command => run(command).await,
    }
}

async fn run(command: Command) -> Result<()> {
    let mut app = App::open().await?;
    app.intro_once().await?;

    let result = match command {
        Command::Task { command } => task_cmd::run(&mut app, command).await,
        Command::Reminder { command } => reminders_cmd::run(&mut app, command).await,
        Command::Premium { command } => premium_cmd::run(&mut app, command).await,
        Command::Notifications { command } => notifications_cmd::run(&mut app, command).await,
        Command::Config { .. } => Ok(()),
    };

    // Scheduler state must be flushed even when the command failed halfway.
    app.close()?;
    result
}
