// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `paseod`: the daemon binary entry point (`spec.md` §6, `SPEC_FULL.md`
//! §10). Parses CLI flags, resolves `$PASEO_HOME` and `config.json`, wires
//! every subsystem together behind a [`hub::HubCtx`], and runs the `/ws`
//! accept loop until a signal asks it to stop.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use paseo_daemon::agent_manager::AgentManager;
use paseo_daemon::checkout::CheckoutEngine;
use paseo_daemon::config::{Config, ListenAddress, LogFormat};
use paseo_daemon::files::DownloadTokenStore;
use paseo_daemon::hub::{self, HubCtx};
use paseo_daemon::subscriptions::SubscriptionHub;
use paseo_daemon::timeline_store::TimelineStore;
use paseo_daemon::{config, env, persistence, DaemonError};
use paseo_term::TerminalService;

#[derive(Parser)]
#[command(name = "paseod", version, about = "Paseo coding-agent host daemon")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon in the foreground (the default when no subcommand is given).
    Serve(ServeArgs),
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Listen address: `host:port`, `:port`, or `unix:<path>`. Overrides `config.json`.
    #[arg(long)]
    listen: Option<String>,

    /// Overrides `$PASEO_HOME` (default `~/.paseo`, or the `PASEO_HOME` env var).
    #[arg(long)]
    paseo_home: Option<PathBuf>,

    /// Overrides the configured log format.
    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(v: LogFormatArg) -> Self {
        match v {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

fn main() -> Result<(), DaemonError> {
    let cli = Cli::parse();
    let args = match cli.command {
        Some(Command::Serve(args)) => args,
        None => ServeArgs::default(),
    };

    let runtime = tokio::runtime::Runtime::new().map_err(DaemonError::Io)?;
    runtime.block_on(serve(args))
}

async fn serve(args: ServeArgs) -> Result<(), DaemonError> {
    let paseo_home = env::paseo_home(args.paseo_home)?;
    config::ensure_layout(&paseo_home)?;

    let mut config = Config::load(&paseo_home)?;
    if let Some(listen) = args.listen {
        config.listen = ListenAddress::parse(&listen)?;
    }
    if let Some(log_format) = args.log_format {
        config.log_format = log_format.into();
    }

    let _log_guard = init_logging(&paseo_home, &config);

    let server_id = persistence::server_id(&paseo_home)?;
    info!(%server_id, paseo_home = %paseo_home.display(), "starting paseod");

    let subscriptions = Arc::new(SubscriptionHub::new());
    let timeline = Arc::new(TimelineStore::new());
    let agents = Arc::new(AgentManager::new(paseo_home.clone(), timeline, subscriptions.clone()));
    agents.load_from_disk().map_err(|e| DaemonError::Config(e.to_string()))?;

    let terminals = Arc::new(TerminalService::new());
    let checkout = Arc::new(CheckoutEngine::new(subscriptions.clone()));
    let downloads = Arc::new(DownloadTokenStore::new());

    let ctx = Arc::new(HubCtx::new(
        server_id,
        paseo_home,
        config,
        agents,
        terminals,
        checkout,
        downloads,
        subscriptions,
    ));

    let shutdown = CancellationToken::new();
    let hub_shutdown = shutdown.clone();
    let hub_ctx = ctx.clone();
    let hub_task = tokio::spawn(async move { hub::serve(hub_ctx, hub_shutdown).await });

    wait_for_signal().await;
    info!("shutdown signal received, draining agents and terminals");
    shutdown.cancel();

    hub::shutdown_agents(&ctx).await;
    for terminal in ctx.terminals.list_all() {
        let _ = ctx.terminals.kill(&terminal.id).await;
    }

    match hub_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "hub listener exited with an error"),
        Err(e) => error!(error = %e, "hub listener task panicked"),
    }

    info!("paseod stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let sigterm = signal(SignalKind::terminate());
    let sigint = signal(SignalKind::interrupt());
    let (mut sigterm, mut sigint) = match (sigterm, sigint) {
        (Ok(term), Ok(int)) => (term, int),
        _ => {
            // Handler installation only fails if the runtime's signal driver
            // itself couldn't start; ctrl_c is a fallback that share its plumbing.
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Initializes `tracing` with `RUST_LOG` taking precedence over the
/// configured level (`SPEC_FULL.md` §11), writing to `daemon.log` under
/// `$PASEO_HOME` via a non-blocking rolling-free appender. Returns the guard
/// that must stay alive for the life of the process to flush buffered logs.
fn init_logging(paseo_home: &std::path::Path, config: &Config) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::never(paseo_home, "daemon.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(non_blocking).with_ansi(false);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }
    guard
}
