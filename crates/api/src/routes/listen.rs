//! Websocket stream of document lifecycle events.
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use draftline_core::events::types::DocumentEvent;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/listen", get(listen))
}

async fn listen(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

async fn stream_events(mut socket: WebSocket, state: AppState) {
    let mut events = state.event_bus().subscribe();
    if send(&mut socket, &DocumentEvent::Welcome).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            received = events.recv() => {
                let event = match received {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "listener lagged, asking it to reconnect");
                        DocumentEvent::Reconnect
                    }
                    Err(RecvError::Closed) => break,
                };
                if send(&mut socket, &event).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!("listener disconnected");
}

async fn send(socket: &mut WebSocket, event: &DocumentEvent) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode event");
            return Ok(());
        }
    };
    socket.send(Message::Text(text.into())).await
}
