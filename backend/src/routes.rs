use std::path::PathBuf;

use rocket::{State, Shutdown, get, post, http::Status, serde::json::Json};
use rocket::response::stream::{Event, EventStream};
use rocket::tokio::select;
use rocket::tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, instrument, warn};
use shared::{Command, Request, Response};
use crate::{
    config::Config,
    error::ApiError,
    events::{decode_payload, handle_event, EventBus},
    store::VoteStore,
};

pub struct AppState {
    pub votes: VoteStore,
    pub bus: EventBus,
    pub config: Config,
}

/// Runs one command against the ledger. A successful vote is announced on
/// `voted_topic` once the ledger lock is released.
pub fn dispatch(state: &AppState, command: Command) -> Result<Response, ApiError> {
    match command {
        Command::CastVote { entity_id, direction, owner_id } => {
            let entity_id = state.votes
                .lock()
                .map_err(|_| ApiError::LockPoisoned)?
                .set_vote(&entity_id, direction, &owner_id)?;
            state.bus.publish(&state.config.voted_topic, &entity_id);
            Ok(Response::ok(&entity_id)?)
        }
        Command::ReadVotes { entity_id, owner_id } => {
            let tally = state.votes
                .lock()
                .map_err(|_| ApiError::LockPoisoned)?
                .votes_for_entity(&entity_id, &owner_id)?;
            Ok(Response::ok(&tally)?)
        }
        Command::ReadSubscriptions => Ok(Response::ok(&state.config.subscriptions())?),
    }
}

#[instrument(skip(state, request), fields(path = %request.path()))]
#[post("/api", data = "<request>")]
pub async fn api(state: &State<AppState>, request: Json<Request>) -> Result<Json<Response>, ApiError> {
    let result = Command::try_from(&*request)
        .map_err(ApiError::from)
        .and_then(|command| dispatch(state, command));

    match &result {
        Ok(_) => debug!("Request handled"),
        Err(e) if e.reply().status >= 500 => error!("Request failed: {}", e),
        Err(e) => debug!("Request rejected: {}", e),
    }
    result.map(Json)
}

#[instrument(skip(state, body), fields(topic = %topic.display()))]
#[post("/events/<topic..>", data = "<body>")]
pub async fn deliver_event(state: &State<AppState>, topic: PathBuf, body: String) -> Status {
    let topic = topic.to_string_lossy();
    handle_event(&state.votes, &state.config, &topic, decode_payload(&body));
    Status::Accepted
}

/// Server-sent events. A new subscriber first receives the retained
/// subscription announcement, then every event published after it connected.
#[get("/events")]
pub async fn stream_events(state: &State<AppState>, mut end: Shutdown) -> EventStream![] {
    let mut subscription = state.bus.subscribe();
    EventStream! {
        loop {
            let notification = select! {
                msg = subscription.recv() => match msg {
                    Ok(notification) => notification,
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event subscriber lagged");
                        continue;
                    }
                },
                _ = &mut end => break,
            };

            yield Event::json(&notification).event(notification.topic.clone());
        }
    }
}
