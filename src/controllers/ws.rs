//! WebSocket интерактивной сессии.
//!
//! Задача сокета - единственный владелец `FloorPlanSession`. Входящие
//! сообщения, кадры, ответы сети и изменения реестра сходятся в одном
//! `select!`, поэтому состояние сессии меняет только этот цикл.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::BookingClient;
use crate::session::{ClientMessage, EffectResult, FloorPlanSession, SessionEffect};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_handler))
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

async fn run_session(mut socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    info!("Floor plan session {} opened", session_id);

    let mut session = FloorPlanSession::new(state.session_context(), state.config.session_settings());
    let (results_tx, mut results_rx) = mpsc::unbounded_channel::<EffectResult>();
    let mut versions = state.registry.subscribe();
    let mut frames = tokio::time::interval(state.config.interaction.frame());
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        let effects = tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(msg) => session.handle(msg, Instant::now()),
                    Err(e) => {
                        debug!("Session {}: ignoring malformed message: {}", session_id, e);
                        Vec::new()
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => Vec::new(),
                Some(Err(e)) => {
                    warn!("Session {}: socket error: {}", session_id, e);
                    break;
                }
            },
            Some(result) = results_rx.recv() => session.apply(result, Instant::now()),
            Ok(()) = versions.changed() => {
                session.on_registry_changed(Instant::now());
                Vec::new()
            }
            _ = frames.tick() => {
                if !session.tick(Instant::now()) {
                    continue;
                }
                Vec::new()
            }
        };

        for effect in effects {
            spawn_effect(effect, state.booking.clone(), results_tx.clone());
        }

        for message in session.take_messages() {
            let payload = match serde_json::to_string(&message) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Session {}: failed to encode message: {}", session_id, e);
                    continue;
                }
            };
            if socket.send(Message::Text(payload.into())).await.is_err() {
                info!("Floor plan session {} closed by peer", session_id);
                return;
            }
        }
    }

    info!("Floor plan session {} closed", session_id);
}

/// Сетевой шаг бронирования в отдельной задаче; результат уходит обратно в цикл сессии.
fn spawn_effect(effect: SessionEffect, client: BookingClient, results: mpsc::UnboundedSender<EffectResult>) {
    tokio::spawn(async move {
        let result = match effect {
            SessionEffect::ValidatePayment { attempt, order } => EffectResult::PaymentValidated {
                attempt,
                result: client.validate_payment_method(&order).await.map_err(|e| e.to_string()),
            },
            SessionEffect::InitiateGateway { attempt, product_key, quantity } => EffectResult::GatewayReady {
                attempt,
                result: client.initiate_gateway_session(&product_key, quantity).await.map_err(|e| e.to_string()),
            },
            SessionEffect::SubmitBooking { attempt, order } => EffectResult::Submitted {
                attempt,
                result: client.submit_booking(&order).await.map_err(|e| e.to_string()),
            },
        };
        // сессия могла закрыться, пока шёл запрос
        let _ = results.send(result);
    });
}
