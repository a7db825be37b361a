use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use workgate::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let settings = Settings::from_env();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "server",
        "workgate starting: RUST_LOG='{}', http_port={}, base_url='{}', oauth={}",
        rust_log,
        settings.http_port,
        settings.base_url,
        settings.oauth_authorize_url.is_some()
    );

    workgate::server::run_with_settings(settings).await
}
