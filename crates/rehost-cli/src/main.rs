use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "rehost",
    about = "Reconcile cluster manager hostnames with the local host table",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Settings file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true, env = "REHOST_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect hostname drift and rename the cluster's hosts.
    ///
    /// Stops the control-node service and every member agent, applies
    /// the old → new mapping on the control node, then repoints and
    /// restarts everything.
    Run {
        #[command(flatten)]
        overrides: commands::Overrides,
        /// Compute and write the mapping, but change nothing.
        #[arg(long)]
        dry_run: bool,
        /// Use this mapping artifact instead of pairing hosts by position.
        #[arg(long)]
        mapping: Option<PathBuf>,
        /// Wait for this machine's hostname to appear in the host table.
        #[arg(long)]
        wait_for_hosts: bool,
        /// Show the rename command's prompts instead of answering them.
        #[arg(long)]
        no_auto_confirm: bool,
    },
    /// Compute and write the mapping without stopping, renaming or
    /// restarting anything.
    ///
    /// The control-node service is started if it is down, since the
    /// registered hostnames are read from its API.
    Plan {
        #[command(flatten)]
        overrides: commands::Overrides,
    },
    /// Show control-node and agent service status.
    Status {
        #[command(flatten)]
        overrides: commands::Overrides,
    },
    /// Print the resolved settings and API endpoint.
    ShowConfig {
        #[command(flatten)]
        overrides: commands::Overrides,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rehost=debug"));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run {
            overrides,
            dry_run,
            mapping,
            wait_for_hosts,
            no_auto_confirm,
        } => {
            let options = commands::run::RunOptions {
                dry_run,
                mapping,
                wait_for_hosts,
                auto_confirm: !no_auto_confirm,
            };
            commands::run::run(config, &overrides, options).await
        }
        Commands::Plan { overrides } => {
            let options = commands::run::RunOptions {
                dry_run: true,
                ..Default::default()
            };
            commands::run::run(config, &overrides, options).await
        }
        Commands::Status { overrides } => commands::status::status(config, &overrides).await,
        Commands::ShowConfig { overrides } => commands::show_config::show_config(config, &overrides),
    }
}
