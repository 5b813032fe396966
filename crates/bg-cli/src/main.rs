//! `browsergrid`: the developer-facing CLI. Every subcommand is a thin HTTP
//! call against a running `bg-daemon` — unlike the teacher's `mqk` binary,
//! this one never opens a database connection directly.

mod archive;
mod client;
mod commands;
mod manifest;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use client::Client;

#[derive(Parser)]
#[command(name = "browsergrid")]
#[command(about = "Browsergrid control-plane CLI", long_about = None)]
struct Cli {
    /// Base URL of the bg-daemon HTTP API.
    #[arg(long, global = true, env = "BROWSERGRID_API_URL", default_value = "http://127.0.0.1:8732")]
    api_url: String,

    /// Bearer token sent with every request, if the daemon requires one.
    #[arg(long, global = true, env = "BROWSERGRID_API_KEY")]
    api_key: Option<String>,

    /// Enable verbose (debug-level) logging.
    #[arg(long, global = true, env = "BROWSERGRID_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a starter browsergrid.json manifest in a directory.
    Init {
        /// Target directory; defaults to the current one.
        dir: Option<PathBuf>,
    },

    /// Package and upload a directory, then register it as a deployment.
    Deploy {
        /// Directory containing browsergrid.json; defaults to the current one.
        dir: Option<PathBuf>,
    },

    /// Deployment inspection commands.
    Deployments {
        #[command(subcommand)]
        cmd: DeploymentsCmd,
    },

    /// Print a run's captured output/error.
    Logs {
        /// Run id.
        run_id: Uuid,
    },

    /// Adjust a pool's scheduled instance floor.
    Scale {
        /// Pool id.
        pool_id: Uuid,

        #[arg(long)]
        instances: u32,
    },
}

#[derive(Subcommand)]
enum DeploymentsCmd {
    /// List deployments.
    List,
    /// Show one deployment's full detail.
    Show { id: Uuid },
    /// Delete a deployment.
    Delete { id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let client = Client::new(cli.api_url, cli.api_key);

    match cli.cmd {
        Commands::Init { dir } => commands::init::init(dir).await,
        Commands::Deploy { dir } => commands::deploy::deploy(&client, dir).await,
        Commands::Deployments { cmd } => match cmd {
            DeploymentsCmd::List => commands::deployments::list(&client).await,
            DeploymentsCmd::Show { id } => commands::deployments::show(&client, id).await,
            DeploymentsCmd::Delete { id } => commands::deployments::delete(&client, id).await,
        },
        Commands::Logs { run_id } => commands::logs::logs(&client, run_id).await,
        Commands::Scale { pool_id, instances } => commands::scale::scale(&client, pool_id, instances).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
