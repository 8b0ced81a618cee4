//! Chat WebSocket endpoint
//!
//! Protocol: client sends `{"type":"user","text":"..."}`, server answers
//! `{"type":"assistant","text":"..."}` and closes with
//! `{"type":"end","job_id":"..."}`. Idle sessions are reprompted once, then
//! ended.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use call_agent_agent::{AgentResponse, Channel, ProfileKey, SessionEnd};
use call_agent_core::TenantId;

use crate::session::SessionHandle;
use crate::state::AppState;
use crate::ServerError;

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub tenant: Uuid,
    #[serde(default)]
    pub profile: Option<ProfileKey>,
}

#[derive(Debug, Deserialize)]
struct ClientMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

pub async fn chat_handler(
    upgrade: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| chat_session(socket, state, query))
}

async fn chat_session(mut socket: WebSocket, state: AppState, query: ChatQuery) {
    let tenant = TenantId(query.tenant);
    let profile = query.profile.unwrap_or(ProfileKey::Trades);

    let session = match state.sessions.open(tenant, Channel::Chat, profile).await {
        Ok(session) => session,
        Err(ServerError::Overloaded) => {
            let _ = socket
                .send(Message::Text(
                    serde_json::json!({ "type": "error", "code": "overloaded" }).to_string(),
                ))
                .await;
            let _ = socket.close().await;
            return;
        }
        Err(error) => {
            tracing::warn!(%error, "Chat session rejected");
            let _ = socket.close().await;
            return;
        }
    };

    let greeting = session.engine.start();
    if send_assistant(&mut socket, &greeting.text).await.is_err() {
        state.sessions.close(session.id, SessionEnd::Error).await;
        return;
    }

    let idle = Duration::from_secs(state.settings.session.chat_idle_s);
    let mut end = SessionEnd::HungUp;

    loop {
        let message = tokio::time::timeout(idle, socket.recv()).await;

        let response: Option<AgentResponse> = match message {
            // Idle timeout: one reprompt, then the session is abandoned
            Err(_) => {
                let response = session.engine.handle_idle_timeout();
                if response.end_session {
                    end = SessionEnd::Abandoned;
                }
                Some(response)
            }
            Ok(None) | Ok(Some(Err(_))) => break,
            Ok(Some(Ok(Message::Close(_)))) => break,
            Ok(Some(Ok(Message::Text(text)))) => {
                session.touch();
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) if message.kind == "user" => {
                        match session.engine.handle_user_text(&message.text).await {
                            Ok(response) => Some(response),
                            Err(error) => {
                                tracing::warn!(session = %session.id, %error, "Turn failed");
                                break;
                            }
                        }
                    }
                    _ => None,
                }
            }
            Ok(Some(Ok(_))) => None,
        };

        let Some(response) = response else { continue };

        if send_assistant(&mut socket, &response.text).await.is_err() {
            break;
        }

        if response.end_session {
            if end != SessionEnd::Abandoned {
                end = if response.escalated {
                    SessionEnd::Escalated
                } else {
                    SessionEnd::Completed
                };
            }
            let job_id = response.job.as_ref().map(|j| j.id);
            let _ = socket
                .send(Message::Text(
                    serde_json::json!({ "type": "end", "job_id": job_id }).to_string(),
                ))
                .await;
            break;
        }
    }

    let _ = socket.close().await;
    close_session(&state, &session, end).await;
}

async fn send_assistant(socket: &mut WebSocket, text: &str) -> Result<(), axum::Error> {
    socket
        .send(Message::Text(
            serde_json::json!({ "type": "assistant", "text": text }).to_string(),
        ))
        .await
}

async fn close_session(state: &AppState, session: &Arc<SessionHandle>, end: SessionEnd) {
    state.sessions.close(session.id, end).await;
}
