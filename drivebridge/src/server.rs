use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicU64, Ordering},
};

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use drive_protocol::SimulatorMessage;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::driver::{BridgeEvent, PeerHandle};

#[derive(Clone)]
pub struct WsState {
    events: mpsc::Sender<BridgeEvent>,
    active_peer: Arc<Mutex<Option<u64>>>,
    next_peer_id: Arc<AtomicU64>,
}

impl WsState {
    pub fn new(events: mpsc::Sender<BridgeEvent>) -> Self {
        Self {
            events,
            active_peer: Arc::new(Mutex::new(None)),
            next_peer_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Claim the driving slot. Only one simulator may hold it at a time.
    fn claim_peer(&self) -> Option<u64> {
        let mut slot = lock_slot(&self.active_peer);
        if slot.is_some() {
            return None;
        }
        let id = self.next_peer_id.fetch_add(1, Ordering::Relaxed);
        *slot = Some(id);
        Some(id)
    }

    fn release_peer(&self, peer_id: u64) {
        let mut slot = lock_slot(&self.active_peer);
        if *slot == Some(peer_id) {
            *slot = None;
        }
    }
}

fn lock_slot(slot: &Mutex<Option<u64>>) -> MutexGuard<'_, Option<u64>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn router(state: WsState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    let Some(peer_id) = state.claim_peer() else {
        warn!("refusing connection, a simulator is already attached");
        return (StatusCode::CONFLICT, "a simulator is already connected").into_response();
    };
    let upgrade_state = state.clone();
    ws.on_failed_upgrade(move |error| {
        warn!(peer = peer_id, %error, "websocket upgrade failed");
        upgrade_state.release_peer(peer_id);
    })
    .on_upgrade(move |socket| peer_session(socket, state, peer_id))
    .into_response()
}

/// Socket task for the connected simulator: forwards its telemetry to the
/// control loop and drains the loop's commands back onto the wire.
async fn peer_session(mut socket: WebSocket, state: WsState, peer_id: u64) {
    let (commands, mut replies) = mpsc::unbounded_channel();
    let peer = PeerHandle {
        id: peer_id,
        commands,
    };

    if state
        .events
        .send(BridgeEvent::PeerConnected { peer })
        .await
        .is_err()
    {
        state.release_peer(peer_id);
        return;
    }

    loop {
        tokio::select! {
            reply = replies.recv() => {
                let Some(reply) = reply else { break };
                match serde_json::to_string(&reply) {
                    Ok(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(error) => warn!(peer = peer_id, %error, "failed to encode command"),
                }
            }
            incoming = socket.recv() => {
                let Some(Ok(message)) = incoming else { break };
                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<SimulatorMessage>(text.as_str()) {
                            Ok(SimulatorMessage::Telemetry(frame)) => {
                                if state
                                    .events
                                    .send(BridgeEvent::Telemetry { peer_id, frame })
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            Err(error) => {
                                warn!(peer = peer_id, %error, "dropping unreadable message");
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    // The departure must be queued before the slot opens up, so the next
    // peer's arrival cannot overtake it in the event order.
    let _ = state
        .events
        .send(BridgeEvent::PeerDisconnected { peer_id })
        .await;
    state.release_peer(peer_id);
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::{WsState, router};
    use crate::driver::BridgeEvent;

    fn state() -> (WsState, mpsc::Receiver<BridgeEvent>) {
        let (events, receiver) = mpsc::channel(4);
        (WsState::new(events), receiver)
    }

    #[tokio::test]
    async fn healthz_responds_ok() {
        let (state, _events) = state();
        let app = router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn plain_get_on_the_socket_route_is_rejected() {
        let (state, _events) = state();
        let app = router(state);
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[test]
    fn the_peer_slot_admits_one_simulator_at_a_time() {
        let (state, _events) = state();

        let first = state.claim_peer().unwrap();
        assert!(state.claim_peer().is_none());

        state.release_peer(first);
        let second = state.claim_peer().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn releasing_a_stale_peer_id_keeps_the_slot() {
        let (state, _events) = state();

        let holder = state.claim_peer().unwrap();
        state.release_peer(holder + 1);
        assert!(state.claim_peer().is_none());
    }
}
