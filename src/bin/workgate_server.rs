//!
//! workgate server binary
//! ----------------------
//! Command-line entry point for the workgate HTTP server. Configuration comes from
//! CLI flags, then `WORKGATE_*` environment variables, then built-in defaults.

use anyhow::Result;
use std::env;

use workgate::config::Settings;

fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    arg_value(args, flag).and_then(|v| v.parse::<u16>().ok())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Layer CLI flags over environment-derived settings.
fn apply_args(mut settings: Settings, args: &[String]) -> Settings {
    if let Some(port) = parse_port_arg(args, "--http-port") {
        settings.http_port = port;
    }
    if let Some(base) = arg_value(args, "--base-url") {
        settings.base_url = base;
    }
    if let Some(url) = arg_value(args, "--oauth-authorize-url") {
        settings.oauth_authorize_url = Some(url);
    }
    if has_flag(args, "--insecure-cookies") {
        settings.secure_cookies = false;
    }
    settings
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("workgate Server\n\nUSAGE:\n  workgate_server [--http-port N] [--base-url URL] [--oauth-authorize-url URL] [--insecure-cookies]\n\nOPTIONS:\n  --http-port N                HTTP port (env: WORKGATE_HTTP_PORT, default 7878)\n  --base-url URL               Public origin used for OAuth redirect_to (env: WORKGATE_BASE_URL)\n  --oauth-authorize-url URL    Identity provider authorize endpoint (env: WORKGATE_OAUTH_AUTHORIZE_URL)\n  --insecure-cookies           Omit the Secure cookie attribute, for plain-HTTP local use (env: WORKGATE_SECURE_COOKIES=false)\n");
        return Ok(());
    }

    let settings = apply_args(Settings::from_env(), &args);
    println!("workgate starting using port: http={}, base_url={}", settings.http_port, settings.base_url);
    tracing::info!(target: "server", "Using port: http={}, secure_cookies={}", settings.http_port, settings.secure_cookies);
    workgate::server::run_with_settings(settings).await
}
