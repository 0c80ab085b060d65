use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info};
use wende::config::Config;
use wende::dashboard::Dashboard;
use wende::logging::init_logging;
use wende::sources::Sources;
use wende::web::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    info!("Wende {} starting up", env!("CARGO_PKG_VERSION"));

    let sources = Sources::from_config(&config).context("Failed to set up data sources")?;
    let dashboard = Dashboard::new(&config, sources).context("Failed to create dashboard")?;
    let snapshot_rx = dashboard.subscribe_snapshot();
    let dashboard = Arc::new(Mutex::new(dashboard));

    // Spawn web server
    let web_state = AppState::new(dashboard.clone(), snapshot_rx);
    let host = config.web.host.clone();
    let port = config.web.port;
    let web_task = tokio::spawn(async move {
        if let Err(e) = wende::web::serve(web_state, &host, port).await {
            error!("Web server error: {}", e);
        }
    });

    // Periodic refresh; the first tick fires immediately
    let refresh_dashboard = dashboard.clone();
    let period = Duration::from_secs(config.refresh_interval_secs);
    let refresh_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let update = refresh_dashboard
                .lock()
                .await
                .update(chrono::Utc::now())
                .await;
            for failure in &update.failures {
                error!("{} refresh failed: {}", failure.component, failure.message);
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");
    refresh_task.abort();
    web_task.abort();
    Ok(())
}
