#[macro_use]
extern crate rocket;

use std::sync::Arc;

use anyhow::Context;
use sensor_readings::config::Config;
use sensor_readings::forward::DisplayForwarder;
use sensor_readings::store::PgStore;
use sensor_readings::{ServerState, build_rocket, server_figment};

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // diesel connects synchronously; keep it off the async workers.
    let database_url = config.database_url.clone();
    let store = rocket::tokio::task::spawn_blocking(move || PgStore::connect(&database_url))
        .await?
        .context("Failed to connect to the readings database")?;

    let notifier = DisplayForwarder::new(config.display_url.clone(), config.display_timeout)
        .context("Failed to build the display client")?;

    let state = ServerState {
        store: Arc::new(store),
        notifier: Arc::new(notifier),
    };

    let rocket = build_rocket(server_figment(), state, &config.frontend_dir);
    info!(
        "Forwarding readings to {} (timeout {:?})",
        config.display_url, config.display_timeout
    );

    let _ = rocket
        .launch()
        .await
        .map_err(|err| anyhow::anyhow!("Rocket failed: {err}"))?;
    Ok(())
}
