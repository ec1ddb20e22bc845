//! `kubelink` binary

use kubelink_server::{logging, KubelinkServer, ServerConfig, ServerDependencies};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;
    let _guard = logging::init_tracing(&config.logs_dir())?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.data_dir.display(),
        "[Main] Starting kubelink"
    );

    let dependencies = ServerDependencies::open(&config)?;
    let server = KubelinkServer::new(config, dependencies)?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("[Main] Shutdown requested");
            signal.cancel();
        }
    });

    server.run(shutdown).await
}
