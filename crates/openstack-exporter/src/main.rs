//! OpenStack Exporter binary.

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use openstack_exporter::{build_exporter, create_router, AppState, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openstack_exporter=info,openstack_exporter_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line args
    let args = Args::parse();
    let config = args.into_config()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listen_address,
        telemetry_path = %config.telemetry_path,
        "starting openstack exporter"
    );

    // Without a database the exporter has nothing to serve.
    let exporter = build_exporter(&config).await?;

    let listen_address = config.listen_address.clone();
    let app = create_router(AppState::new(exporter, config));

    let listener = tokio::net::TcpListener::bind(&listen_address).await?;
    info!("listening on {}", listen_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("exporter shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl+c");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}
