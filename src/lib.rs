#[macro_use]
extern crate rocket;

use std::path::Path;

use rocket::fs::{FileServer, Options};
use rocket::{Build, Rocket, figment::Figment, figment::providers::Env};

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod forward;
pub mod localize;
pub mod models;
pub mod routes;
pub mod schema;
pub mod store;

pub use routes::ServerState;

pub const DEFAULT_PORT: u16 = 5000;

/// Rocket settings: every interface on port 5000 unless `ROCKET_ADDRESS` / `ROCKET_PORT` say otherwise.
pub fn server_figment() -> Figment {
    rocket::Config::figment()
        .merge(("address", "0.0.0.0"))
        .merge(("port", DEFAULT_PORT))
        .merge(Env::prefixed("ROCKET_").ignore(&["PROFILE"]).global())
}

pub fn build_rocket(figment: Figment, state: ServerState, frontend_dir: &Path) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(state)
        .attach(routes::Cors)
        .mount("/", routes::api())
        .mount("/", FileServer::new(frontend_dir, Options::Index | Options::Missing))
        .register("/", catchers![routes::default_catcher])
}
