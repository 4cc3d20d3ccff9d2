use std::env;

use anyhow::Context;
use chrono::{Duration, Utc};
use rand::Rng;
use sensor_readings::config::Config;
use sensor_readings::models::Reading;
use sensor_readings::store::{PgStore, ReadingStore};
use serde_json::json;

const DEFAULT_COUNT: usize = 10;

fn main() -> anyhow::Result<()> {
    let count = match env::args().nth(1) {
        Some(arg) => arg.parse().context("count must be a positive integer")?,
        None => DEFAULT_COUNT,
    };

    let config = Config::from_env()?;
    let store = PgStore::connect(&config.database_url)?;
    let mut rng = rand::rng();
    let now = Utc::now();

    for i in 0..count {
        let at = now - Duration::minutes((count - 1 - i) as i64);
        let reading: Reading = json!({
            "t1": (rng.random_range(15.0..35.0_f64) * 100.0).round() / 100.0,
            "t2": (rng.random_range(15.0..35.0_f64) * 100.0).round() / 100.0,
        })
        .as_object()
        .cloned()
        .unwrap_or_default();

        store.insert(&reading, at)?;
        println!("Inserted {} at {}", serde_json::Value::Object(reading), at);
    }

    Ok(())
}
