use axum::{
    Json,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::AppState;
use crate::realtime::{DeliveryEvent, DeliveryStats, EventCategory};

#[derive(Deserialize)]
pub struct WsQuery {
    pub user_id: i64,
}

/// Frames a connected client may send upstream. Everything else the socket
/// receives is ignored.
#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientFrame {
    Subscribe { category: EventCategory },
    Unsubscribe { category: EventCategory },
}

/// `GET /ws?user_id=N` upgrades to a websocket carrying delivery frames.
/// The first frame is always the connection-lifecycle greeting.
pub async fn ws_connect(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_socket(socket, state, query.user_id))
}

async fn run_socket(socket: WebSocket, state: AppState, user_id: i64) {
    let (handle, mut outbox) = state.delivery.connect(user_id);
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = outbox.recv() => {
                match frame {
                    Some(frame) => {
                        if sink.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    // Registry evicted this channel; nothing more will come.
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => handle_client_frame(&state, user_id, &text),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("websocket error for user {user_id}: {e}");
                        break;
                    }
                }
            }
        }
    }

    let _ = sink.close().await;
    state.delivery.disconnect(handle);
}

fn handle_client_frame(state: &AppState, user_id: i64, text: &str) {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Subscribe { category }) => {
            state.delivery.subscribe(user_id, category);
            debug!("user {user_id} subscribed to {category}");
        }
        Ok(ClientFrame::Unsubscribe { category }) => {
            state.delivery.unsubscribe(user_id, category);
            debug!("user {user_id} unsubscribed from {category}");
        }
        Err(e) => debug!("unparseable frame from user {user_id}: {e}"),
    }
}

#[utoipa::path(
    post,
    path = "/events",
    request_body = DeliveryEvent,
    responses(
        (status = 202, description = "Event accepted for delivery")
    ),
    tag = "realtime"
)]
pub async fn publish_event(
    State(state): State<AppState>,
    Json(event): Json<DeliveryEvent>,
) -> StatusCode {
    // Fire-and-forget: the producer never learns who was connected.
    state.delivery.deliver(&event);
    StatusCode::ACCEPTED
}

#[derive(Deserialize, ToSchema)]
pub struct SubscriptionRequest {
    pub user_id: i64,
    pub categories: Vec<EventCategory>,
}

#[utoipa::path(
    post,
    path = "/subscriptions",
    request_body = SubscriptionRequest,
    responses(
        (status = 204, description = "Filter narrowed to the given categories")
    ),
    tag = "realtime"
)]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscriptionRequest>,
) -> StatusCode {
    for category in req.categories {
        state.delivery.subscribe(req.user_id, category);
    }
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    delete,
    path = "/subscriptions",
    request_body = SubscriptionRequest,
    responses(
        (status = 204, description = "Categories removed from the filter")
    ),
    tag = "realtime"
)]
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscriptionRequest>,
) -> StatusCode {
    for category in req.categories {
        state.delivery.unsubscribe(req.user_id, category);
    }
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, description = "Live delivery counters", body = DeliveryStats)
    ),
    tag = "realtime"
)]
pub async fn delivery_stats(State(state): State<AppState>) -> Json<DeliveryStats> {
    Json(state.delivery.stats())
}
