use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::airdrop::registry::TaskEvent;
use crate::airdrop::service::AirdropService;
use crate::api::handler::AppState;
use crate::error::AppResult;

/// Progress stream for one task: a snapshot first, then every event until the
/// task finishes.
/// GET /airdrop/tasks/:id/stream
pub async fn stream_airdrop(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    // subscribe before the snapshot so no event falls between the two
    let events = state.service.subscribe(id)?;
    let service = state.service.clone();

    Ok(ws.on_upgrade(move |socket| handle_task_stream(socket, service, id, events)))
}

fn snapshot_message(service: &AirdropService, id: Uuid) -> Option<(Message, bool)> {
    let view = service.get_task_status(id).ok()?;
    let finished = view.status.is_terminal();
    let text = json!({ "event": "snapshot", "task": view }).to_string();
    Some((Message::Text(text), finished))
}

async fn handle_task_stream(
    socket: WebSocket,
    service: Arc<AirdropService>,
    id: Uuid,
    mut events: broadcast::Receiver<TaskEvent>,
) {
    let (mut sender, mut receiver) = socket.split();

    let Some((snapshot, finished)) = snapshot_message(&service, id) else {
        return;
    };
    if sender.send(snapshot).await.is_err() || finished {
        let _ = sender.close().await;
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                let message = match event {
                    Ok(event) => {
                        let finished = matches!(event, TaskEvent::Finished { .. });
                        match serde_json::to_string(&event) {
                            Ok(text) => (Message::Text(text), finished),
                            Err(e) => {
                                warn!("⚠️  Could not encode event for task {}: {}", id, e);
                                continue;
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Stream for task {} lagged by {} events, resending snapshot", id, skipped);
                        match snapshot_message(&service, id) {
                            Some(snapshot) => snapshot,
                            None => break,
                        }
                    }
                    Err(RecvError::Closed) => break,
                };

                let (message, finished) = message;
                if sender.send(message).await.is_err() || finished {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    let _ = sender.close().await;
}
