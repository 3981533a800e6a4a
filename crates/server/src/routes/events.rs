use std::time::Duration;

use axum::{
    Extension, Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use deployment::Deployment;
use futures_util::{Stream, StreamExt};

use crate::{DeploymentImpl, http::auth::AuthUser};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Live feed of the caller's outbox events.
pub async fn stream_events(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    tracing::debug!(
        user_id = %user.user_id,
        subscribers = deployment.events().subscriber_count(),
        "event stream opened"
    );
    let stream = deployment
        .events()
        .stream_for_user(user.user_id)
        .map(|event| {
            Event::default()
                .event(event.event_type.as_str())
                .json_data(&event)
        });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/events", get(stream_events))
}
