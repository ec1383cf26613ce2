//! `/ws/alerts`: one hub observer per socket
//!
//! The socket is registered as a [`ChannelObserver`]; events the hub pushes
//! into the channel are written to the socket as JSON text frames. Client
//! frames other than close and ping are ignored.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use error_common::{log_error, EngineError};
use events_bus::ChannelObserver;
use futures::{sink::SinkExt, stream::StreamExt};
use tracing::{debug, info};
use uuid::Uuid;

use crate::AppState;

pub async fn alerts_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_alert_socket(socket, state))
}

async fn handle_alert_socket(socket: WebSocket, state: AppState) {
    let connection_id = format!("ws_{}", Uuid::new_v4());
    let (observer, mut events) = ChannelObserver::channel(state.observer_buffer);
    let observer_id = state.service.observer_subscribe(Arc::new(observer)).await;
    info!(connection = %connection_id, observer = %observer_id, "Alert socket connected");

    let (mut sender, mut receiver) = socket.split();

    tokio::select! {
        _ = async {
            while let Some(event) = events.recv().await {
                let frame = match event.to_json() {
                    Ok(frame) => frame,
                    Err(e) => {
                        log_error("alert socket encode", &EngineError::WebSocketError(e.to_string()));
                        continue;
                    }
                };
                if sender.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
        } => {},

        _ = async {
            while let Some(msg) = receiver.next().await {
                match msg {
                    Ok(Message::Close(_)) => break,
                    Ok(Message::Text(text)) => {
                        debug!(connection = %connection_id, bytes = text.len(), "Ignoring client frame");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log_error("alert socket", &EngineError::WebSocketError(e.to_string()));
                        break;
                    }
                }
            }
        } => {}
    }

    // the hub may already have pruned us after a failed delivery
    state.service.observer_unsubscribe(observer_id).await;
    info!(connection = %connection_id, observer = %observer_id, "Alert socket closed");
}
