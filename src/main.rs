use log::info;
use sheet_portal::months::all_months;
use sheet_portal::{PortalConfig, app};

/// Main entry point for the portal web server
///
/// Loads the configuration named by `PORTAL_CONFIG` (or
/// `config/portal.json`), then serves the portal on the configured
/// address. Log output is controlled with `RUST_LOG` and defaults to `info`.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = PortalConfig::from_env()?;
    info!(
        "Starting portal with {} account(s) and {} admin month(s)",
        config.accounts.len(),
        all_months(&config.avail_months_admin).len()
    );

    app::run(config).await
}
