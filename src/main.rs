use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use jobwatch::config::{CliArgs, WatchConfig};
use jobwatch::server;
use jobwatch::state::{SharedState, WatchState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // Keep the guard alive so buffered file output is flushed on exit.
    let _log_guard = init_tracing(&args)?;

    info!("Starting jobwatch v{}", env!("CARGO_PKG_VERSION"));
    let config = WatchConfig::from_args(args)?;
    info!("Backend: {}", config.backend_url);
    info!("Status stream: {}", config.ws_url);

    let port = config.port;
    let startup_views = config.startup_views.clone();
    let state: SharedState = Arc::new(WatchState::new(config)?);

    {
        let state = state.clone();
        tokio::spawn(async move {
            let permission = state.refresh_permission().await;
            info!("Push permission: {:?}", permission);
        });
    }

    for kind in startup_views {
        let id = state.mount_view(kind.clone()).await;
        info!("Startup view {} mounted as {}", kind, id);
    }

    let router = server::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("jobwatch listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await?;

    info!("jobwatch shutting down");
    state.unmount_all().await;

    Ok(())
}

fn init_tracing(
    args: &CliArgs,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "jobwatch=info,tower_http=info".into());

    match &args.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {:?}", path))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}

async fn shutdown_signal(state: SharedState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
    let _ = state.shutdown_tx.send(());
}
