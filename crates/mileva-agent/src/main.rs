//! Mileva agent binary: runs the outreach voice agent worker.
//!
//! `start` warms the worker up and serves the health and dispatch endpoints
//! until SIGTERM/SIGINT. `connect --room <name>` warms up and runs a single
//! job in the given room until the room closes or the process is interrupted.

use clap::{Parser, Subcommand};
use mileva_agent::{app, config, entry, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mileva-agent", version, about = "Mileva outreach voice agent")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Warm up and accept jobs over HTTP.
    Start,
    /// Warm up and run one job in the given room.
    Connect {
        #[arg(long)]
        room: String,
    },
}

fn resolve_config_path(cli_arg: Option<String>) -> (Option<String>, &'static str) {
    if let Some(path) = cli_arg.filter(|value| !value.trim().is_empty()) {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("MILEVA_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    // Local overrides such as LLAMA_BASE_URL; absence is not an error.
    let env_file_loaded = dotenvy::from_filename(".env.local").is_ok();

    let cli = Cli::parse();
    let (resolved_config_path, config_source) = resolve_config_path(cli.config);
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the worker cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        env_file_loaded,
        "resolved startup configuration path"
    );

    let worker = Arc::new(entry::worker(&config));
    worker
        .prewarm()
        .await
        .expect("worker warm-up failed — no jobs can be accepted without a voice activity detector");

    match cli.command {
        Command::Start => {
            let app = app(AppState {
                worker: Arc::clone(&worker),
            });
            let addr = SocketAddr::new(config.server.host, config.server.port);

            tracing::info!(%addr, livekit_url = %config.livekit.url, "starting mileva agent worker");

            let listener = TcpListener::bind(addr)
                .await
                .expect("failed to bind to address — is another process using this port?");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .expect("server error");
        }
        Command::Connect { room } => {
            let job = worker
                .dispatch(&room)
                .expect("failed to dispatch job for the requested room");
            tracing::info!(job_id = %job.id, room = %job.room, "running single job");
            tokio::select! {
                () = worker.wait_job(job.id) => {
                    tracing::info!(job_id = %job.id, "job room closed, exiting");
                }
                () = shutdown_signal() => {}
            }
        }
    }

    worker.shutdown().await;
    tracing::info!("mileva agent shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_connect_with_room() {
        let cli = Cli::try_parse_from(["mileva-agent", "connect", "--room", "outreach-1"]).unwrap();
        match cli.command {
            Command::Connect { room } => assert_eq!(room, "outreach-1"),
            Command::Start => panic!("expected connect"),
        }
        assert!(cli.config.is_none());
    }

    #[test]
    fn cli_accepts_global_config_flag() {
        let cli =
            Cli::try_parse_from(["mileva-agent", "start", "--config", "/etc/mileva.toml"]).unwrap();
        assert!(matches!(cli.command, Command::Start));
        assert_eq!(cli.config.as_deref(), Some("/etc/mileva.toml"));
    }

    #[test]
    fn connect_requires_room() {
        assert!(Cli::try_parse_from(["mileva-agent", "connect"]).is_err());
    }

    #[test]
    fn cli_arg_takes_precedence() {
        let (path, source) = resolve_config_path(Some("custom.toml".to_string()));
        assert_eq!(path.as_deref(), Some("custom.toml"));
        assert_eq!(source, "cli-arg");
    }
}
