//! `achub` — spawn, talk to, and journal a run of one or more coding agents.

mod config;
mod console;
mod error;
mod hub;
mod journal;

use std::path::PathBuf;
use std::process::ExitCode;

use achub_router::RouteMode;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "achub", version, about = "Local multi-agent hub for coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Spawn the configured agent(s) and run a task to completion.
    Run {
        /// Path to the hub config file.
        #[arg(long, value_name = "PATH")]
        config: PathBuf,
        /// The task text to send to the agent(s).
        #[arg(long)]
        task: String,
        /// Restrict the run to a single configured agent id.
        #[arg(long)]
        agent: Option<String>,
        /// How to distribute the task across agents.
        #[arg(long, default_value = "single")]
        route: String,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("ACHUB_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let code = match cli.command {
        Command::Run { config, task, agent, route } => run(config, task, agent, route).await,
    };
    ExitCode::from(code as u8)
}

async fn run(config_path: PathBuf, task: String, agent: Option<String>, route: String) -> i32 {
    let Some(mode) = RouteMode::parse(&route) else {
        eprintln!("error: unknown routing mode {route:?} (expected single, broadcast, round-robin, moderator)");
        return 2;
    };

    let cfg = match config::load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            return 2;
        }
    };

    let hub = hub::Hub::new(cfg);
    let run = hub.run_task(&task, agent.as_deref(), mode);

    tokio::select! {
        code = run => code,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted.");
            130
        }
    }
}
