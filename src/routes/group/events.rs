use axum::{
    extract::{
        Extension, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::{Receiver, error::RecvError};
use uuid::Uuid;

use crate::{
    AppState, common::AppPath, error::AppResult, events::GroupEvent, middleware::AuthUser,
};

use super::guard::load_group_for_member;

/// Streams the group's expense events as JSON text frames until either side
/// goes away. Membership is checked once, before the upgrade.
pub async fn group_events(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(group_id): AppPath<Uuid>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    load_group_for_member(&state, group_id, caller.id).await?;
    let events = state.events.subscribe(group_id);
    tracing::debug!(group_id = %group_id, user_id = %caller.id, "event subscriber connected");
    Ok(ws.on_upgrade(move |socket| forward_events(socket, events, group_id)))
}

async fn forward_events(socket: WebSocket, mut events: Receiver<GroupEvent>, group_id: Uuid) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to encode group event");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(group_id = %group_id, skipped, "event subscriber lagging");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!(group_id = %group_id, "event subscriber disconnected");
}
