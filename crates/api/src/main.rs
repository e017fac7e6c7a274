use anyhow::Context;

use warden_infra::WardenConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WardenConfig::load().context("failed to load configuration")?;
    warden_observability::init(config.log.format);

    if config.session.uses_insecure_secret() {
        tracing::warn!("session.secret not set; using insecure dev default");
    }

    let app = warden_api::app::build_app(&config).await?;

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
