use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::Role;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(user_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    if !state.users.contains_key(&user_id) {
        return Err(AppError::UserNotFound(user_id));
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let events = state.notifier.subscribe(user_id);
    let channel_id = Uuid::new_v4();

    let mut went_online = false;
    if let Some(mut user) = state.users.get_mut(&user_id) {
        user.channel_id = Some(channel_id);
        if user.role == Role::Courier && !user.is_online {
            user.is_online = true;
            went_online = true;
        }
    }
    if went_online {
        state.metrics.couriers_online.inc();
    }

    info!(user_id = %user_id, "realtime channel connected");

    let mut event_stream = UnboundedReceiverStream::new(events);
    let send_task = tokio::spawn(async move {
        while let Some(event) = event_stream.next().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize realtime event");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.notifier.unsubscribe(user_id);

    let mut went_offline = false;
    if let Some(mut user) = state.users.get_mut(&user_id) {
        // A newer connection may have replaced this one already.
        if user.channel_id == Some(channel_id) {
            user.channel_id = None;
            if user.role == Role::Courier && user.is_online {
                user.is_online = false;
                went_offline = true;
            }
        }
    }
    if went_offline {
        state.metrics.couriers_online.dec();
    }

    info!(user_id = %user_id, "realtime channel disconnected");
}
