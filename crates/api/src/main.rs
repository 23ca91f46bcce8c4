use anyhow::Context;

use warden_api::app::{self, AppServices};
use warden_infra::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::init();

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    let services = AppServices::from_config(&config).context("failed to set up the column store")?;
    let router = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router).await?;
    Ok(())
}
