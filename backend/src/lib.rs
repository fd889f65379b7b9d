pub mod catchers;
pub mod config;
pub mod error;
pub mod events;
pub mod routes;
pub mod store;

use std::sync::Mutex;

use rocket::{catchers, fairing::{self, AdHoc}, figment::Figment, routes, Build, Rocket};
use shared::VoteLedger;
use tracing::{error, info};

use crate::{
    catchers::{bad_request, internal_error, not_found, unprocessable},
    config::Config,
    events::{announce_subscriptions, EventBus},
    routes::{api, deliver_event, stream_events, AppState},
    store::JsonFileStore,
};

pub fn rocket() -> Rocket<Build> {
    rocket_with(rocket::Config::figment())
}

pub fn rocket_with(figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(AdHoc::try_on_ignite("Vote ledger", load_state))
        .attach(AdHoc::on_shutdown("Shutdown log", |_| Box::pin(async move {
            info!("Gracefully shutting down voting service");
        })))
        .mount("/", routes![api, deliver_event, stream_events])
        .register("/", catchers![bad_request, unprocessable, not_found, internal_error])
}

async fn load_state(rocket: Rocket<Build>) -> fairing::Result {
    let config: Config = match rocket.figment().extract() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid service configuration: {}", e);
            return Err(rocket);
        }
    };

    let path = config.store_file();
    let ledger = match JsonFileStore::open(&path).and_then(VoteLedger::open) {
        Ok(ledger) => ledger,
        Err(e) => {
            error!("Failed to load vote store {}: {}", path.display(), e);
            return Err(rocket);
        }
    };
    info!("📋 Loaded {} voted entities from {}", ledger.ledger().len(), path.display());

    let bus = EventBus::new(config.event_capacity);
    announce_subscriptions(&bus, &config);

    Ok(rocket.manage(AppState {
        votes: Mutex::new(ledger),
        bus,
        config,
    }))
}
