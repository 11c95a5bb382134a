#![cfg(not(tarpaulin_include))]

use campaign_analytics::app;
use campaign_analytics::config::ServerConfig;
use clap::Parser;

/// Main entry point for the dashboard web server
///
/// Initializes logging (default filter `info`, overridable with `RUST_LOG`),
/// parses the server flags and serves the dashboard until shut down.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    log::info!(
        "starting dashboard (static dir {}, session ttl {}s, upload limit {} MB)",
        config.static_dir.display(),
        config.session_ttl_secs,
        config.max_upload_mb
    );

    app::run(config).await
}
