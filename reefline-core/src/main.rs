use anyhow::Result;
use reefline_core::{config::Config, server, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let prometheus_handle = telemetry::init(&config.telemetry);

    info!("Starting Reefline Core");
    info!(
        base_domain = %config.tenancy.base_domain,
        platform_org = %config.tenancy.platform_org_slug,
        "HTTP server listening on {}",
        config.http_addr()
    );

    server::run(config, prometheus_handle).await
}
