//! Raspberry Control daemon.
//!
//! # Usage
//!
//! ```bash
//! # Detach into the background, log to ~/.local/share/rpictl_agent/agent.log
//! rpictl_agent
//!
//! # Foreground with TLS on a custom port
//! rpictl_agent --no-daemon --use-ssl -p 8443
//! ```
//!
//! Set `RUST_LOG` to tune logging (default `rpictl_agent=info`).

use std::fs::{self, File};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rpictl_agent::config::{AgentConfig, Args};
use rpictl_agent::notify;
use rpictl_agent::state::AppState;
use rpictl_agent::{tls, ws};

fn state_dir() -> PathBuf {
    dirs_next::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("rpictl_agent")
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = AgentConfig::from_env(&args);

    if config.daemonize {
        daemonize()?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    runtime.block_on(run(config))
}

fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let dir = state_dir();
    fs::create_dir_all(&dir).context("Failed to create log directory")?;
    let log_path = dir.join("agent.log");

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = File::create(&log_path).context("Failed to create log file for stderr")?;

    Daemonize::new()
        .pid_file(dir.join("agent.pid"))
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")?;

    Ok(())
}

async fn run(config: AgentConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("rpictl_agent=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Raspberry Control daemon starting"
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown.cancel();
    });

    let port = config.port;
    let use_ssl = config.use_ssl;
    let event_socket = config.event_socket.clone();
    let state = AppState::new(config, cancel.clone());
    info!(revision = state.board.revision(), "board identified");

    let (events_tx, events_rx) = mpsc::channel(16);
    tokio::spawn(notify::run_event_loop(
        state.broadcaster.clone(),
        events_rx,
        cancel.clone(),
    ));
    match notify::bind_event_socket(&event_socket) {
        Ok(listener) => {
            tokio::spawn(notify::serve_event_socket(
                listener,
                event_socket,
                events_tx,
                cancel.clone(),
            ));
        }
        Err(e) => warn!(
            socket = %event_socket.display(),
            error = %e,
            "can't open event socket, notifications won't be available"
        ),
    }

    let app = ws::routes(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    if use_ssl {
        let (cert, key) = tls::ensure_self_signed_cert()?;
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
            .await
            .context("Failed to load TLS certificate")?;
        let handle = axum_server::Handle::new();
        let stopper = handle.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            stopper.graceful_shutdown(Some(Duration::from_secs(2)));
        });
        info!(%addr, "Raspberry Control agent listening (wss)");
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!(addr = %listener.local_addr()?, "Raspberry Control agent listening (ws)");
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;
    }

    info!("Raspberry Control daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
    Ok(())
}
